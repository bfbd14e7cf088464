use thiserror::Error;

use crate::buffer::BufferError;
use crate::file::{FileError, PageId};

use super::record::SlotId;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Invalid record size: {0}")]
    InvalidRecordSize(usize),

    #[error("Record length {actual} does not match relation record size {expected}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("No record at page {page_no} slot {slot_id}")]
    RecordNotFound { page_no: PageId, slot_id: SlotId },

    /// Raised by `FileScan` once the relation is exhausted; the normal
    /// termination signal of an index build.
    #[error("End of file reached")]
    EndOfFile,

    #[error("Malformed record page: {0}")]
    Corrupted(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
