use thiserror::Error;

use crate::buffer::BufferError;
use crate::file::FileError;
use crate::record::RecordError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Scan operators out of range: low takes GT/GTE, high takes LT/LTE")]
    BadOpcodes,

    #[error("Bad scan range: low value exceeds high value")]
    BadScanrange,

    #[error("No key in the index satisfies the scan criteria")]
    NoSuchKeyFound,

    #[error("No scan has been initialized")]
    ScanNotInitialized,

    #[error("Index scan has passed its last matching entry")]
    IndexScanCompleted,

    #[error("Malformed index data: {0}")]
    Corrupted(String),
}
