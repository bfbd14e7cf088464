use std::collections::HashMap;

use crate::file::{FileHandle, PageId};

use super::error::{BufferError, BufferResult};
use super::frame::FrameId;

/// Directory mapping resident `(file, page)` pairs to their frames
pub(crate) struct FrameDirectory {
    map: HashMap<(FileHandle, PageId), FrameId>,
}

impl FrameDirectory {
    /// Sized to roughly 1.2x the frame count, rounded to an odd integer
    /// (the load factor rule of the open-addressed table this replaces).
    pub fn for_pool(num_bufs: usize) -> Self {
        let capacity = ((num_bufs * 6 / 5) & !1) + 1;
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Record that a page has been brought into a frame
    pub fn insert(&mut self, file: FileHandle, page_no: PageId, frame_no: FrameId) {
        self.map.insert((file, page_no), frame_no);
    }

    /// Find the frame holding a page. `HashNotFound` is the normal miss
    /// signal, not an exceptional condition.
    pub fn lookup(&self, file: FileHandle, page_no: PageId) -> BufferResult<FrameId> {
        self.map
            .get(&(file, page_no))
            .copied()
            .ok_or(BufferError::HashNotFound)
    }

    /// Drop a page's entry. Removing an absent entry is a no-op.
    pub fn remove(&mut self, file: FileHandle, page_no: PageId) {
        self.map.remove(&(file, page_no));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::PagedFileManager;
    use tempfile::TempDir;

    fn test_handle() -> (TempDir, FileHandle) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.db");
        let mut manager = PagedFileManager::new();
        manager.create_file(&path).unwrap();
        let handle = manager.open_file(&path).unwrap();
        (dir, handle)
    }

    #[test]
    fn test_lookup_miss_is_hash_not_found() {
        let (_dir, handle) = test_handle();
        let directory = FrameDirectory::for_pool(8);
        let result = directory.lookup(handle, 1);
        assert!(matches!(result, Err(BufferError::HashNotFound)));
    }

    #[test]
    fn test_insert_lookup_remove() {
        let (_dir, handle) = test_handle();
        let mut directory = FrameDirectory::for_pool(8);

        directory.insert(handle, 4, 2);
        assert_eq!(directory.lookup(handle, 4).unwrap(), 2);

        directory.remove(handle, 4);
        assert!(matches!(
            directory.lookup(handle, 4),
            Err(BufferError::HashNotFound)
        ));

        // removing again is harmless
        directory.remove(handle, 4);
    }
}
