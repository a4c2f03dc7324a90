pub mod config;
pub mod diagnostics;
pub mod error;

pub mod index;
pub mod storage;
pub mod txn;
pub mod types;

pub use config::IndexConfig;
pub use error::{IndexError, IndexResult};
pub use index::{
    key::{KeyColumn, KeySchema, SortOrder},
    predicate::{CompareOp, Operand, Predicate},
    record::Rid,
    scan::{IndexScan, ScanItem, ScanPhase, ScanRequest},
    skip_index::{IndexEntry, SkipIndex},
};
pub use types::{datatype::DataType, value::Value};
