pub mod lock;
pub mod log;
pub mod transaction;

use std::fmt;

pub use lock::{LockManager, LockMode, LockTable};
pub use log::{ChangeLog, ChangeRecord, MemoryChangeLog};
pub use transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
