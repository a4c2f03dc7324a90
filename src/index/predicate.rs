//! Predicates over index key columns.
//!
//! A predicate compares two operands, each either a key column (by position
//! in the index key) or a literal. Evaluation sees a candidate row as the
//! decoded key values in index column order.

use std::{cmp::Ordering, fmt};

use crate::{
    error::{IndexError, IndexResult},
    types::value::{Value, compare_values},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

impl CompareOp {
    /// The operator that holds with the operands swapped. LIKE has no mirror.
    pub fn flip(self) -> Option<CompareOp> {
        match self {
            CompareOp::Eq => Some(CompareOp::Eq),
            CompareOp::NotEq => Some(CompareOp::NotEq),
            CompareOp::Lt => Some(CompareOp::Gt),
            CompareOp::LtEq => Some(CompareOp::GtEq),
            CompareOp::Gt => Some(CompareOp::Lt),
            CompareOp::GtEq => Some(CompareOp::LtEq),
            CompareOp::Like | CompareOp::NotLike => None,
        }
    }

    /// Whether `left op right` holds given `left.cmp(right)`. Pattern operators never do.
    pub fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::NotEq => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::LtEq => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::GtEq => ord != Ordering::Less,
            CompareOp::Like | CompareOp::NotLike => false,
        }
    }

    pub fn parse(text: &str) -> Option<CompareOp> {
        let op = match text.to_ascii_lowercase().as_str() {
            "=" | "==" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::NotEq,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::LtEq,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::GtEq,
            "like" => CompareOp::Like,
            "notlike" | "not_like" => CompareOp::NotLike,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Position of the column in the index key.
    Column(usize),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, row: &'a [Value]) -> IndexResult<&'a Value> {
        match self {
            Operand::Literal(v) => Ok(v),
            Operand::Column(idx) => row.get(*idx).ok_or_else(|| {
                IndexError::InvalidScan(format!(
                    "predicate refers to key column {idx}, row has {}",
                    row.len()
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

impl Predicate {
    pub fn new(left: Operand, op: CompareOp, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// `column op literal`.
    pub fn column(column: usize, op: CompareOp, literal: Value) -> Self {
        Self::new(Operand::Column(column), op, Operand::Literal(literal))
    }

    pub fn is_left_column(&self) -> bool {
        matches!(self.left, Operand::Column(_))
    }

    pub fn is_right_column(&self) -> bool {
        matches!(self.right, Operand::Column(_))
    }

    pub fn left_literal(&self) -> Option<&Value> {
        match &self.left {
            Operand::Literal(v) => Some(v),
            Operand::Column(_) => None,
        }
    }

    pub fn right_literal(&self) -> Option<&Value> {
        match &self.right {
            Operand::Literal(v) => Some(v),
            Operand::Column(_) => None,
        }
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// Highest column position the predicate touches.
    pub fn max_column(&self) -> Option<usize> {
        let col = |o: &Operand| match o {
            Operand::Column(c) => Some(*c),
            Operand::Literal(_) => None,
        };
        col(&self.left).max(col(&self.right))
    }

    /// Normalises `column op literal` and `literal op column` to
    /// `(column, op, literal)`. Anything else yields `None`.
    pub fn column_literal(&self) -> Option<(usize, CompareOp, &Value)> {
        match (&self.left, &self.right) {
            (Operand::Column(c), Operand::Literal(v)) => Some((*c, self.op, v)),
            (Operand::Literal(v), Operand::Column(c)) => Some((*c, self.op.flip()?, v)),
            _ => None,
        }
    }

    /// Evaluates the predicate against `row`. A NULL operand never passes.
    pub fn passes(&self, row: &[Value]) -> IndexResult<bool> {
        let left = self.left.resolve(row)?;
        let right = self.right.resolve(row)?;

        if left.is_null() || right.is_null() {
            return Ok(false);
        }

        match self.op {
            CompareOp::Like | CompareOp::NotLike => {
                let (Some(text), Some(pattern)) = (left.as_str(), right.as_str()) else {
                    return Err(IndexError::InvalidScan(format!(
                        "{} needs string operands, got {left} and {right}",
                        self.op
                    )));
                };
                let matched = like_match(text, pattern);
                Ok(matched == (self.op == CompareOp::Like))
            }
            op => Ok(op.holds(compare_values(left, right))),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = |o: &Operand| match o {
            Operand::Column(c) => format!("#{c}"),
            Operand::Literal(v) => v.to_string(),
        };
        write!(
            f,
            "{} {} {}",
            operand(&self.left),
            self.op,
            operand(&self.right)
        )
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    // position of the last `%` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, at)) => {
                    p = star + 1;
                    t = at + 1;
                    backtrack = Some((star, at + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

/// Literal prefix of a LIKE pattern, and whether the pattern is exactly
/// `prefix%`. `None` when the pattern starts with a wildcard.
pub fn like_prefix(pattern: &str) -> Option<(String, bool)> {
    let cut = pattern
        .find(['%', '_'])
        .unwrap_or(pattern.len());
    if cut == 0 {
        return None;
    }

    let prefix = pattern[..cut].to_string();
    let pure = &pattern[cut..] == "%";
    Some((prefix, pure))
}

/// Smallest string greater than every string starting with `prefix`, if any.
pub fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut code = last as u32 + 1;
        while code <= char::MAX as u32 {
            if let Some(next) = char::from_u32(code) {
                chars.push(next);
                return Some(chars.into_iter().collect());
            }
            code += 1;
        }
    }
    None
}
