mod error;
mod page;
mod record;
mod relation_file;

pub use error::{RecordError, RecordResult};
pub use page::RecordPage;
pub use record::{RID_SIZE, RecordId, SlotId};
pub use relation_file::{FileScan, RelationFile};
