use crate::file::{FileHandle, INVALID_PAGE, PageId};

/// Index of a frame in the buffer pool
pub type FrameId = usize;

/// Bookkeeping for one buffer pool frame
///
/// Invariants: `valid` implies the frame directory maps `(file, page_no)` to
/// `frame_no`; `pin_count > 0` implies `valid`; an invalid frame has
/// `pin_count == 0`, `dirty == false` and `refbit == false`.
#[derive(Debug, Clone)]
pub struct FrameDesc {
    /// Stable identity, equal to the frame's index in the descriptor table
    pub frame_no: FrameId,
    /// Owning file, `None` while the frame is invalid
    pub file: Option<FileHandle>,
    /// Page identity within `file`, meaningful only when `valid`
    pub page_no: PageId,
    /// Number of outstanding pins
    pub pin_count: u32,
    /// Set when an unpin reported the page modified; sticky until flush or eviction
    pub dirty: bool,
    /// True iff the frame holds a resident page
    pub valid: bool,
    /// Clock second-chance bit, set on every access
    pub refbit: bool,
}

impl FrameDesc {
    pub fn new(frame_no: FrameId) -> Self {
        Self {
            frame_no,
            file: None,
            page_no: INVALID_PAGE,
            pin_count: 0,
            dirty: false,
            valid: false,
            refbit: false,
        }
    }

    /// Stamp the descriptor for a page just brought into this frame
    pub fn set(&mut self, file: FileHandle, page_no: PageId) {
        self.file = Some(file);
        self.page_no = page_no;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.refbit = true;
    }

    /// Reset the descriptor for reuse; keeps only `frame_no`
    pub fn clear(&mut self) {
        self.file = None;
        self.page_no = INVALID_PAGE;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.refbit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_invalid() {
        let desc = FrameDesc::new(3);
        assert_eq!(desc.frame_no, 3);
        assert!(desc.file.is_none());
        assert!(!desc.valid);
        assert!(!desc.dirty);
        assert!(!desc.refbit);
        assert_eq!(desc.pin_count, 0);
    }

    #[test]
    fn test_set_and_clear() {
        let mut desc = FrameDesc::new(0);
        let mut manager = crate::file::PagedFileManager::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.db");
        manager.create_file(&path).unwrap();
        let handle = manager.open_file(&path).unwrap();

        desc.set(handle, 7);
        assert_eq!(desc.file, Some(handle));
        assert_eq!(desc.page_no, 7);
        assert_eq!(desc.pin_count, 1);
        assert!(desc.valid);
        assert!(desc.refbit);
        assert!(!desc.dirty);

        desc.dirty = true;
        desc.clear();
        assert!(desc.file.is_none());
        assert_eq!(desc.page_no, INVALID_PAGE);
        assert_eq!(desc.pin_count, 0);
        assert!(!desc.valid);
        assert!(!desc.dirty);
        assert!(!desc.refbit);
        assert_eq!(desc.frame_no, 0);
    }
}
