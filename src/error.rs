use thiserror::Error;

use crate::{index::record::Rid, storage::page::PageId, txn::TxnId};

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index '{index}': unique constraint violated for key {key}")]
    UniqueConstraintViolation { index: String, key: String },

    #[error("index '{index}': no live entry for key {key} with rid {rid}")]
    RecordNotFound { index: String, key: String, rid: Rid },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("page {page_id} not found")]
    PageNotFound { page_id: PageId },

    #[error("corrupted page {page_id} ({reason})")]
    CorruptedPage { page_id: PageId, reason: String },

    #[error("record of {size} bytes does not fit in a page (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("txn {txn} timed out waiting for a lock on page {page_id}")]
    LockTimeout { txn: TxnId, page_id: PageId },

    #[error("txn {0} has already finished")]
    TransactionFinished(TxnId),

    #[error("change log failure: {0}")]
    LogFailure(String),

    #[error("index '{index}' expects {expected} key columns, file has {found}")]
    SchemaMismatch {
        index: String,
        expected: usize,
        found: usize,
    },

    #[error("index '{0}' already exists")]
    AlreadyExists(String),

    #[error("index '{0}' has not been created")]
    NotInitialized(String),

    #[error("invalid scan: {0}")]
    InvalidScan(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub(crate) fn corrupted(page_id: PageId, reason: impl Into<String>) -> Self {
        IndexError::CorruptedPage {
            page_id,
            reason: reason.into(),
        }
    }
}
