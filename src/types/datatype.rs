//! Column types an index key may be built from.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Long,
    Double,
    Date, // days since epoch
    Char,
    Varchar { max_len: Option<u32> },
}

impl DataType {
    /// Parses the shell's column spelling (`int`, `long`, `varchar(20)`, ...).
    pub fn parse(text: &str) -> IndexResult<Self> {
        let lower = text.trim().to_ascii_lowercase();
        match lower.as_str() {
            "int" | "integer" => Ok(DataType::Int),
            "long" | "bigint" => Ok(DataType::Long),
            "double" => Ok(DataType::Double),
            "date" => Ok(DataType::Date),
            "char" => Ok(DataType::Char),
            "varchar" => Ok(DataType::Varchar { max_len: None }),
            s if s.starts_with("varchar(") && s.ends_with(')') => {
                let len = s["varchar(".len()..s.len() - 1]
                    .parse::<u32>()
                    .map_err(|_| IndexError::Encoding(format!("bad varchar length in '{text}'")))?;
                Ok(DataType::Varchar { max_len: Some(len) })
            }
            _ => Err(IndexError::Encoding(format!("unknown column type '{text}'"))),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Long => write!(f, "LONG"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Date => write!(f, "DATE"),
            DataType::Char => write!(f, "CHAR"),
            DataType::Varchar { max_len: Some(n) } => write!(f, "VARCHAR({n})"),
            DataType::Varchar { max_len: None } => write!(f, "VARCHAR"),
        }
    }
}
