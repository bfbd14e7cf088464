pub mod buffer;
pub mod file;
pub mod index;
pub mod record;

pub use buffer::{BufMgr, BufStats, BufferError};
pub use file::{FileHandle, PagedFileManager, PAGE_SIZE, PageId};
pub use index::{AttrType, BTreeIndex, IndexError, Operator};
pub use record::{FileScan, RecordId, RelationFile};
