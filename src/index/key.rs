//! Key schema, on-page key codec and the row comparator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
    error::{IndexError, IndexResult},
    index::layout::{KEY_NOT_NULL, KEY_NULL},
    storage::page::PageId,
    types::{
        datatype::DataType,
        value::{Value, compare_values},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub data_type: DataType,
    pub order: SortOrder,
}

impl KeyColumn {
    pub fn new(name: impl Into<String>, data_type: DataType, order: SortOrder) -> Self {
        Self {
            name: name.into(),
            data_type,
            order,
        }
    }

    pub fn asc(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, SortOrder::Asc)
    }

    pub fn desc(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, SortOrder::Desc)
    }
}

/// Column types and directions of an index key, fixed when the index is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    columns: Vec<KeyColumn>,
}

impl KeySchema {
    pub fn new(columns: Vec<KeyColumn>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&KeyColumn> {
        self.columns.get(idx)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Encodes a full key: per column a null flag, then the typed payload.
    pub fn encode_key(&self, values: &[Value]) -> IndexResult<Vec<u8>> {
        if values.len() != self.columns.len() {
            return Err(IndexError::Encoding(format!(
                "key has {} values, index has {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        let mut out = Vec::new();
        for (col, value) in self.columns.iter().zip(values) {
            encode_column(col, value, &mut out)?;
        }
        Ok(out)
    }

    pub fn decode_key(&self, input: &mut &[u8], page_id: PageId) -> IndexResult<Vec<Value>> {
        self.columns
            .iter()
            .map(|col| decode_column(col.data_type, input, page_id))
            .collect()
    }

    /// Column-wise comparison honouring each column's direction.
    ///
    /// Only the common prefix is compared, so a shorter key equals every key it
    /// is a prefix of.
    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (idx, (x, y)) in a.iter().zip(b).enumerate() {
            let ord = compare_values(x, y);
            let ord = match self.columns.get(idx).map(|c| c.order) {
                Some(SortOrder::Desc) => ord.reverse(),
                _ => ord,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn encode_column(col: &KeyColumn, value: &Value, out: &mut Vec<u8>) -> IndexResult<()> {
    if value.is_null() {
        out.push(KEY_NULL);
        return Ok(());
    }

    let mismatch = || {
        IndexError::Encoding(format!(
            "value {value} does not fit column '{}' of type {}",
            col.name, col.data_type
        ))
    };

    out.push(KEY_NOT_NULL);
    match (col.data_type, value) {
        (DataType::Int, Value::Int32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (DataType::Int, Value::Int64(v)) => {
            let v = i32::try_from(*v).map_err(|_| mismatch())?;
            out.extend_from_slice(&v.to_le_bytes());
        }

        (DataType::Long, Value::Int32(v)) => out.extend_from_slice(&(*v as i64).to_le_bytes()),
        (DataType::Long, Value::Int64(v)) => out.extend_from_slice(&v.to_le_bytes()),

        (DataType::Double, Value::Float64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (DataType::Double, Value::Int32(v)) => out.extend_from_slice(&(*v as f64).to_le_bytes()),
        (DataType::Double, Value::Int64(v)) => out.extend_from_slice(&(*v as f64).to_le_bytes()),

        (DataType::Date, Value::Date(v)) => out.extend_from_slice(&v.to_le_bytes()),

        (DataType::Char | DataType::Varchar { .. }, Value::String(s)) => {
            if let DataType::Varchar { max_len: Some(max) } = col.data_type {
                if s.chars().count() > max as usize {
                    return Err(IndexError::Encoding(format!(
                        "value for '{}' exceeds VARCHAR({max})",
                        col.name
                    )));
                }
            }
            let bytes = s.as_bytes();
            let len = i32::try_from(bytes.len()).map_err(|_| mismatch())?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(bytes);
        }

        _ => return Err(mismatch()),
    }

    Ok(())
}

fn take<'a>(input: &mut &'a [u8], n: usize, page_id: PageId, what: &str) -> IndexResult<&'a [u8]> {
    if input.len() < n {
        return Err(IndexError::corrupted(
            page_id,
            format!("unexpected end of key reading {what}"),
        ));
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn decode_column(ty: DataType, input: &mut &[u8], page_id: PageId) -> IndexResult<Value> {
    let flag = take(input, 1, page_id, "null flag")?[0];
    match flag {
        KEY_NULL => return Ok(Value::Null),
        KEY_NOT_NULL => {}
        other => {
            return Err(IndexError::corrupted(
                page_id,
                format!("invalid key null flag {other}"),
            ));
        }
    }

    let mut b4 = [0u8; 4];
    let mut b8 = [0u8; 8];

    let value = match ty {
        DataType::Int => {
            b4.copy_from_slice(take(input, 4, page_id, "INT")?);
            Value::Int32(i32::from_le_bytes(b4))
        }
        DataType::Long => {
            b8.copy_from_slice(take(input, 8, page_id, "LONG")?);
            Value::Int64(i64::from_le_bytes(b8))
        }
        DataType::Double => {
            b8.copy_from_slice(take(input, 8, page_id, "DOUBLE")?);
            Value::Float64(f64::from_le_bytes(b8))
        }
        DataType::Date => {
            b4.copy_from_slice(take(input, 4, page_id, "DATE")?);
            Value::Date(i32::from_le_bytes(b4))
        }
        DataType::Char | DataType::Varchar { .. } => {
            b4.copy_from_slice(take(input, 4, page_id, "string length")?);
            let len = i32::from_le_bytes(b4);
            let len = usize::try_from(len).map_err(|_| {
                IndexError::corrupted(page_id, format!("negative string length {len}"))
            })?;
            let raw = take(input, len, page_id, "string bytes")?;
            let s = std::str::from_utf8(raw)
                .map_err(|_| IndexError::corrupted(page_id, "invalid UTF-8 in key"))?;
            Value::String(s.to_string())
        }
    };

    Ok(value)
}
