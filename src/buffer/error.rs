use thiserror::Error;

use crate::file::{FileError, PageId};

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Buffer pool exceeded: all frames are pinned")]
    BufferExceeded,

    #[error("Page {page_no} of file {file} is pinned")]
    PagePinned { file: String, page_no: PageId },

    #[error("Page {page_no} of file {file} is not pinned")]
    PageNotPinned { file: String, page_no: PageId },

    #[error("Invalid frame {frame_no}: dirty={dirty} valid={valid} refbit={refbit}")]
    BadBuffer {
        frame_no: usize,
        dirty: bool,
        valid: bool,
        refbit: bool,
    },

    /// Miss signal from the frame directory; caught at every call site
    /// inside the buffer manager and never returned from its public API.
    #[error("Page not present in the frame directory")]
    HashNotFound,
}

pub type BufferResult<T> = Result<T, BufferError>;
