use std::path::Path;

use crate::buffer::BufMgr;
use crate::file::{FileHandle, PageId};

use super::error::{RecordError, RecordResult};
use super::page::RecordPage;
use super::record::{RecordId, SlotId};

/// Heap file of fixed-size byte records
///
/// Every page of a relation file is a record page; records never move once
/// inserted, so a `RecordId` stays valid for the life of the relation.
pub struct RelationFile {
    file: FileHandle,
    record_size: usize,
    /// Last page an insert landed on; records are never deleted, so earlier
    /// pages never regain space and the search can start here.
    last_insert_page: PageId,
}

impl RelationFile {
    /// Create a new relation file with one empty record page
    pub fn create<P: AsRef<Path>>(
        bm: &mut BufMgr,
        path: P,
        record_size: usize,
    ) -> RecordResult<Self> {
        if RecordPage::calculate_slot_count(record_size) == 0 {
            return Err(RecordError::InvalidRecordSize(record_size));
        }

        bm.file_manager_mut().create_file(&path)?;
        let file = bm.file_manager_mut().open_file(&path)?;

        let (page_no, bytes) = bm.alloc_page(file)?;
        RecordPage::init(bytes, record_size)?;
        bm.unpin(file, page_no, true)?;

        Ok(Self {
            file,
            record_size,
            last_insert_page: page_no,
        })
    }

    /// Open an existing relation file, adopting its record size
    pub fn open<P: AsRef<Path>>(bm: &mut BufMgr, path: P) -> RecordResult<Self> {
        let file = bm.file_manager_mut().open_file(&path)?;

        let bytes = bm.read_page(file, 1)?;
        let record_size = RecordPage::from_buffer(bytes).map(|page| page.record_size());
        bm.unpin(file, 1, false)?;

        Ok(Self {
            file,
            record_size: record_size?,
            last_insert_page: 1,
        })
    }

    pub fn file(&self) -> FileHandle {
        self.file
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Insert a record into the first page with a free slot, appending a new
    /// page when every existing one is full
    pub fn insert_record(&mut self, bm: &mut BufMgr, record: &[u8]) -> RecordResult<RecordId> {
        if record.len() != self.record_size {
            return Err(RecordError::RecordSizeMismatch {
                expected: self.record_size,
                actual: record.len(),
            });
        }

        let page_count = bm.file_manager_mut().page_count(self.file)?;
        for page_no in self.last_insert_page..=page_count {
            let bytes = bm.read_page(self.file, page_no)?;
            let stored = Self::store_in_page(bytes, record);
            match stored {
                Ok(Some(slot_id)) => {
                    bm.unpin(self.file, page_no, true)?;
                    self.last_insert_page = page_no;
                    return Ok(RecordId::new(page_no, slot_id));
                }
                Ok(None) => bm.unpin(self.file, page_no, false)?,
                Err(e) => {
                    bm.unpin(self.file, page_no, false)?;
                    return Err(e);
                }
            }
        }

        // every page is full: grow the file
        let (page_no, bytes) = bm.alloc_page(self.file)?;
        let stored = RecordPage::init(bytes, self.record_size)
            .and_then(|mut page| page.set_record(0, record).map(|_| ()));
        bm.unpin(self.file, page_no, true)?;
        stored?;

        self.last_insert_page = page_no;
        Ok(RecordId::new(page_no, 0))
    }

    /// Fetch the bytes of a record
    pub fn get_record(&self, bm: &mut BufMgr, rid: RecordId) -> RecordResult<Vec<u8>> {
        let bytes = bm.read_page(self.file, rid.page_no)?;
        let record = RecordPage::from_buffer(bytes).and_then(|page| {
            page.record(rid.slot_id)
                .map(|record| record.to_vec())
                .map_err(|_| RecordError::RecordNotFound {
                    page_no: rid.page_no,
                    slot_id: rid.slot_id,
                })
        });
        bm.unpin(self.file, rid.page_no, false)?;
        record
    }

    fn store_in_page(bytes: &mut [u8], record: &[u8]) -> RecordResult<Option<SlotId>> {
        let mut page = RecordPage::from_buffer(bytes)?;
        match page.find_free_slot() {
            Some(slot_id) => {
                page.set_record(slot_id, record)?;
                Ok(Some(slot_id))
            }
            None => Ok(None),
        }
    }
}

/// Sequential scan over every record of a relation, in (page, slot) order
///
/// Pages are pinned only for the duration of each `scan_next` call. The scan
/// signals exhaustion with `RecordError::EndOfFile`.
pub struct FileScan {
    file: FileHandle,
    page_count: PageId,
    next_page: PageId,
    next_slot: SlotId,
}

impl FileScan {
    pub fn new<P: AsRef<Path>>(bm: &mut BufMgr, path: P) -> RecordResult<Self> {
        let file = bm.file_manager_mut().open_file(&path)?;
        let page_count = bm.file_manager_mut().page_count(file)?;
        Ok(Self {
            file,
            page_count,
            next_page: 1,
            next_slot: 0,
        })
    }

    /// The next used record slot, or `EndOfFile` past the last one
    pub fn scan_next(&mut self, bm: &mut BufMgr) -> RecordResult<(RecordId, Vec<u8>)> {
        while self.next_page <= self.page_count {
            let page_no = self.next_page;
            let bytes = bm.read_page(self.file, page_no)?;
            let found = Self::next_in_page(bytes, page_no, self.next_slot);
            bm.unpin(self.file, page_no, false)?;

            match found? {
                Some((rid, record)) => {
                    self.next_slot = rid.slot_id + 1;
                    return Ok((rid, record));
                }
                None => {
                    self.next_page += 1;
                    self.next_slot = 0;
                }
            }
        }
        Err(RecordError::EndOfFile)
    }

    fn next_in_page(
        bytes: &mut [u8],
        page_no: PageId,
        from_slot: SlotId,
    ) -> RecordResult<Option<(RecordId, Vec<u8>)>> {
        let page = RecordPage::from_buffer(bytes)?;
        for slot_id in from_slot..page.slot_count() as SlotId {
            if page.is_slot_used(slot_id) {
                let record = page.record(slot_id)?.to_vec();
                return Ok(Some((RecordId::new(page_no, slot_id), record)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::PagedFileManager;
    use tempfile::TempDir;

    fn setup(num_bufs: usize) -> (TempDir, BufMgr) {
        let temp_dir = tempfile::tempdir().unwrap();
        let bm = BufMgr::with_capacity(PagedFileManager::new(), num_bufs);
        (temp_dir, bm)
    }

    fn record_bytes(tag: u8, size: usize) -> Vec<u8> {
        let mut record = vec![tag; size];
        record[0] = tag;
        record
    }

    #[test]
    fn test_insert_and_get() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        let mut relation = RelationFile::create(&mut bm, &path, 16).unwrap();

        let rid_a = relation
            .insert_record(&mut bm, &record_bytes(1, 16))
            .unwrap();
        let rid_b = relation
            .insert_record(&mut bm, &record_bytes(2, 16))
            .unwrap();
        assert_ne!(rid_a, rid_b);

        assert_eq!(relation.get_record(&mut bm, rid_a).unwrap()[0], 1);
        assert_eq!(relation.get_record(&mut bm, rid_b).unwrap()[0], 2);
    }

    #[test]
    fn test_insert_grows_past_one_page() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        // large records keep the per-page slot count small
        let record_size = 2000;
        let mut relation = RelationFile::create(&mut bm, &path, record_size).unwrap();
        let per_page = RecordPage::calculate_slot_count(record_size);

        let total = per_page * 2 + 1;
        let mut rids = Vec::new();
        for i in 0..total {
            let record = record_bytes((i % 251) as u8, record_size);
            rids.push(relation.insert_record(&mut bm, &record).unwrap());
        }

        assert!(rids.iter().any(|rid| rid.page_no > 1));
        for (i, rid) in rids.iter().enumerate() {
            let record = relation.get_record(&mut bm, *rid).unwrap();
            assert_eq!(record[0], (i % 251) as u8);
        }
    }

    #[test]
    fn test_wrong_record_size_rejected() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        let mut relation = RelationFile::create(&mut bm, &path, 16).unwrap();

        let result = relation.insert_record(&mut bm, &[0u8; 8]);
        assert!(matches!(result, Err(RecordError::RecordSizeMismatch { .. })));
    }

    #[test]
    fn test_get_missing_record() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        let relation = RelationFile::create(&mut bm, &path, 16).unwrap();

        let result = relation.get_record(&mut bm, RecordId::new(1, 5));
        assert!(matches!(result, Err(RecordError::RecordNotFound { .. })));
    }

    #[test]
    fn test_open_adopts_record_size() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");

        {
            let mut relation = RelationFile::create(&mut bm, &path, 24).unwrap();
            relation.insert_record(&mut bm, &record_bytes(9, 24)).unwrap();
        }
        let file = {
            let relation = RelationFile::open(&mut bm, &path).unwrap();
            assert_eq!(relation.record_size(), 24);
            relation.file()
        };
        bm.flush_file(file).unwrap();
    }

    #[test]
    fn test_scan_visits_every_record_in_order() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        let record_size = 2000;
        let mut relation = RelationFile::create(&mut bm, &path, record_size).unwrap();
        let per_page = RecordPage::calculate_slot_count(record_size);
        let total = per_page + 3;

        let mut expected = Vec::new();
        for i in 0..total {
            let record = record_bytes((i % 251) as u8, record_size);
            expected.push(relation.insert_record(&mut bm, &record).unwrap());
        }

        let mut scan = FileScan::new(&mut bm, &path).unwrap();
        let mut seen = Vec::new();
        loop {
            match scan.scan_next(&mut bm) {
                Ok((rid, record)) => {
                    assert_eq!(record[0], (seen.len() % 251) as u8);
                    seen.push(rid);
                }
                Err(RecordError::EndOfFile) => break,
                Err(e) => panic!("unexpected scan error: {e}"),
            }
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_scan_empty_relation() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        RelationFile::create(&mut bm, &path, 16).unwrap();

        let mut scan = FileScan::new(&mut bm, &path).unwrap();
        assert!(matches!(
            scan.scan_next(&mut bm),
            Err(RecordError::EndOfFile)
        ));
    }

    #[test]
    fn test_scan_leaves_no_pins() {
        let (dir, mut bm) = setup(8);
        let path = dir.path().join("rel.db");
        let mut relation = RelationFile::create(&mut bm, &path, 16).unwrap();
        for i in 0..5 {
            relation
                .insert_record(&mut bm, &record_bytes(i, 16))
                .unwrap();
        }

        let mut scan = FileScan::new(&mut bm, &path).unwrap();
        while scan.scan_next(&mut bm).is_ok() {}

        // a pinned page would make this fail with PagePinned
        bm.flush_file(relation.file()).unwrap();
    }
}
