mod buffer_manager;
mod error;
mod frame;
mod hash_table;

pub use buffer_manager::{BufMgr, BufStats};
pub use error::{BufferError, BufferResult};
pub use frame::{FrameDesc, FrameId};

/// Default number of frames in the buffer pool
pub const BUF_POOL_SIZE: usize = 1024;
