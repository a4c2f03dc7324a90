use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use rustyline::{DefaultEditor, error::ReadlineError};

use skipdex::{
    CompareOp, DataType, IndexConfig, KeyColumn, KeySchema, Predicate, Rid, ScanItem,
    ScanRequest, SkipIndex, SortOrder, Value, diagnostics,
    storage::{
        buffer::{BufferPool, BufferPoolHandle},
        pagemgr::FilePageManager,
    },
    txn::{LockTable, MemoryChangeLog, Transaction, TxnId},
    types::value::format_key,
};

const PROMPT: &str = "skipdex> ";

const HELP: &str = "\
commands:
  insert <key> <rid>            key: comma separated values, rid: node,device,block,record
  delete <key> <rid>
  replace <key> <old rid> <new rid>
  get <key>
  scan [<col> <op> <literal> [and ...]] [project <col,...>]
  levels
  flush
  quit";

struct Args {
    path: PathBuf,
    columns: Vec<KeyColumn>,
    unique: bool,
    debug: u8,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut path = None;
    let mut columns = None;
    let mut unique = false;
    let mut debug = 0u8;
    let mut config = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(level) = arg.strip_prefix("--debug=") {
            debug = level.parse().context("--debug expects a number")?;
        } else if arg == "--unique" {
            unique = true;
        } else if arg == "--columns" {
            let spec = args.next().context("--columns needs a value")?;
            columns = Some(parse_columns(&spec)?);
        } else if arg == "--config" {
            config = Some(PathBuf::from(args.next().context("--config needs a path")?));
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            bail!("unexpected argument '{arg}'");
        }
    }

    Ok(Args {
        path: path.context("usage: skipdex <file> --columns int,varchar:desc [--unique]")?,
        columns: columns.unwrap_or_else(|| vec![KeyColumn::asc("c0", DataType::Int)]),
        unique,
        debug,
        config,
    })
}

/// `int,varchar(10):desc` -> columns c0, c1, ...
fn parse_columns(spec: &str) -> Result<Vec<KeyColumn>> {
    spec.split(',')
        .enumerate()
        .map(|(i, part)| {
            let (ty, order) = match part.split_once(':') {
                Some((ty, "desc")) => (ty, SortOrder::Desc),
                Some((ty, "asc")) | Some((ty, "")) => (ty, SortOrder::Asc),
                Some((_, other)) => bail!("unknown sort order '{other}'"),
                None => (part, SortOrder::Asc),
            };
            Ok(KeyColumn::new(format!("c{i}"), DataType::parse(ty)?, order))
        })
        .collect()
}

struct Shell {
    index: SkipIndex,
    pool: BufferPoolHandle,
    locks: Arc<LockTable>,
    log: Arc<MemoryChangeLog>,
    next_txn: u64,
}

impl Shell {
    fn open(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                IndexConfig::from_json(&text)?
            }
            None => IndexConfig::default(),
        };

        let pm = FilePageManager::open(&args.path)
            .with_context(|| format!("opening {}", args.path.display()))?;
        let pool = BufferPool::new(Box::new(pm)).into_handle();
        let log = Arc::new(MemoryChangeLog::new());
        let locks = Arc::new(LockTable::with_timeout(config.lock_wait_timeout()));
        let schema = KeySchema::new(args.columns.clone());

        let fresh = pool.lock().num_blocks() == 0;
        let index = if fresh {
            SkipIndex::create("shell", pool.clone(), log.clone(), schema, args.unique, config)?
        } else {
            SkipIndex::open("shell", pool.clone(), log.clone(), schema, config)?
        };

        println!(
            "{} index {} ({} key columns{})",
            if fresh { "created" } else { "opened" },
            args.path.display(),
            index.schema().len(),
            if index.is_unique() { ", unique" } else { "" }
        );

        Ok(Self {
            index,
            pool,
            locks,
            log,
            next_txn: 1,
        })
    }

    /// Runs `op` in its own transaction; a failure undoes its logged changes.
    fn autocommit<T>(&mut self, op: impl FnOnce(&SkipIndex, &mut Transaction) -> Result<T>) -> Result<T> {
        let id = TxnId(self.next_txn);
        self.next_txn += 1;

        let mut txn = Transaction::begin(id, self.locks.clone());
        match op(&self.index, &mut txn) {
            Ok(out) => {
                txn.commit();
                Ok(out)
            }
            Err(e) => {
                let undone = self.log.rollback(id, &self.pool)?;
                drop(txn);
                if undone > 0 {
                    println!("rolled back {undone} change(s)");
                }
                Err(e)
            }
        }
    }

    fn parse_key(&self, text: &str) -> Result<Vec<Value>> {
        let schema = self.index.schema();
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != schema.len() {
            bail!("key needs {} values, got {}", schema.len(), parts.len());
        }

        schema
            .columns()
            .iter()
            .zip(parts)
            .map(|(col, part)| Ok(Value::parse_as(part, col.data_type)?))
            .collect()
    }

    fn parse_scan(&self, words: &[&str]) -> Result<ScanRequest> {
        let schema = self.index.schema();
        let (preds, projection) = match words.iter().position(|w| w.eq_ignore_ascii_case("project")) {
            Some(at) => (&words[..at], words.get(at + 1)),
            None => (words, None),
        };

        let mut predicates = Vec::new();
        let clauses = preds
            .split(|w| w.eq_ignore_ascii_case("and"))
            .filter(|_| !preds.is_empty());
        for clause in clauses {
            let [col, op, literal] = clause else {
                bail!("expected '<col> <op> <literal>', got '{}'", clause.join(" "));
            };
            let idx = schema
                .position(col)
                .with_context(|| format!("no key column '{col}'"))?;
            let op = CompareOp::parse(op).with_context(|| format!("unknown operator '{op}'"))?;
            let ty = match op {
                CompareOp::Like | CompareOp::NotLike => DataType::Varchar { max_len: None },
                _ => schema.columns()[idx].data_type,
            };
            predicates.push(Predicate::column(idx, op, Value::parse_as(literal, ty)?));
        }

        let mut request = ScanRequest::from_conjunction(predicates);
        if let Some(cols) = projection {
            let cols = cols
                .split(',')
                .map(|c| schema.position(c).with_context(|| format!("no key column '{c}'")))
                .collect::<Result<Vec<_>>>()?;
            request = request.project(cols);
        }
        Ok(request)
    }

    /// Returns `false` when the shell should exit.
    fn execute(&mut self, line: &str) -> Result<bool> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((command, rest)) = words.split_first() else {
            return Ok(true);
        };

        match (command.to_ascii_lowercase().as_str(), rest) {
            ("quit" | "exit", _) => return Ok(false),
            ("help", _) => println!("{HELP}"),

            ("insert", [key, rid]) => {
                let (key, rid) = (self.parse_key(key)?, parse_rid(rid)?);
                self.autocommit(|index, txn| Ok(index.insert(txn, &key, rid)?))?;
                println!("ok");
            }
            ("delete", [key, rid]) => {
                let (key, rid) = (self.parse_key(key)?, parse_rid(rid)?);
                self.autocommit(|index, txn| Ok(index.delete(txn, &key, rid)?))?;
                println!("ok");
            }
            ("replace", [key, old, new]) => {
                let (key, old, new) = (self.parse_key(key)?, parse_rid(old)?, parse_rid(new)?);
                self.autocommit(|index, txn| Ok(index.replace(txn, &key, old, new)?))?;
                println!("ok");
            }
            ("get", [key]) => {
                let key = self.parse_key(key)?;
                match self.autocommit(|index, txn| Ok(index.get(txn, &key)?))? {
                    Some(entry) => println!("{} -> {}", format_key(&entry.key), entry.rid),
                    None => println!("not found"),
                }
            }
            ("scan", words) => {
                let request = self.parse_scan(words)?;
                let items = self.autocommit(|index, txn| {
                    let scan = index.scan(txn, request);
                    Ok(scan.collect::<Result<Vec<_>, _>>()?)
                })?;
                for item in &items {
                    match item {
                        ScanItem::Rid(rid) => println!("{rid}"),
                        ScanItem::Tuple(values) => println!("{}", format_key(values)),
                    }
                }
                println!("{} row(s)", items.len());
            }
            ("levels", []) => {
                let sizes = self.autocommit(|index, txn| Ok(index.level_sizes(txn)?))?;
                for (level, size) in sizes.iter().enumerate() {
                    println!("level {level}: {size}");
                }
            }
            ("flush", []) => {
                self.index.flush()?;
                println!("flushed");
            }
            _ => bail!("unrecognised command, try 'help'"),
        }

        Ok(true)
    }
}

fn parse_rid(text: &str) -> Result<Rid> {
    let parts = text
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("bad rid '{text}'"))?;

    match parts.as_slice() {
        [node, device, block, record] => Ok(Rid::new(*node, *device, *block, *record)),
        _ => bail!("rid needs four parts, got '{text}'"),
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    diagnostics::init(diagnostics::level_from_u8(args.debug));

    let mut shell = Shell::open(&args)?;
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;

    println!("type 'help' for commands");
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match shell.execute(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("error: {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) => println!("^C"),
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("error reading input: {e}");
                break;
            }
        }
    }

    shell.index.flush()?;
    Ok(())
}
