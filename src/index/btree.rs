use std::path::Path;

use log::debug;

use crate::buffer::BufMgr;
use crate::file::{FileHandle, INVALID_PAGE, PageId};
use crate::record::{FileScan, RecordError, RecordId};

use super::error::{IndexError, IndexResult};
use super::node::{IndexMeta, LEAF_CAPACITY, LeafNode, NONLEAF_CAPACITY, NonLeafNode};
use super::{AttrType, Operator};

/// Page number of the index meta page
const META_PAGE_NO: PageId = 1;

/// B+-tree index over integer keys, backed by buffer-pool pages
///
/// The root page stays pinned for the whole life of the index; `close`
/// releases it, rewrites the meta page and flushes the file. A pool of at
/// least two frames is therefore required for any useful work.
pub struct BTreeIndex {
    file: FileHandle,
    relation_name: String,
    attr_byte_offset: usize,
    attr_type: AttrType,
    root_page_no: PageId,
    /// Entries inserted over the index lifetime
    leaf_occupancy: u32,
    /// Internal-node insertions, root creations included
    node_occupancy: u32,
    leaf_cap: usize,
    node_cap: usize,
    scan: Option<ScanState>,
}

/// State of the one scan an index can run at a time
struct ScanState {
    high_val: i32,
    high_op: Operator,
    /// Leaf currently pinned for the scan
    current_page_no: PageId,
    /// Decoded copy of the pinned leaf
    current_leaf: LeafNode,
    /// Slot cursor within `current_leaf`
    next_entry: usize,
}

impl BTreeIndex {
    /// Open the index on `relation_path` keyed by the integer at
    /// `attr_byte_offset` in each record, creating and bulk-building it from
    /// the relation when no index file exists yet.
    ///
    /// Returns the index and the index file name, `"<relation>.<offset>"`.
    pub fn open<P: AsRef<Path>>(
        bm: &mut BufMgr,
        relation_path: P,
        attr_byte_offset: usize,
        attr_type: AttrType,
    ) -> IndexResult<(Self, String)> {
        Self::open_with_capacity(
            bm,
            relation_path,
            attr_byte_offset,
            attr_type,
            LEAF_CAPACITY,
            NONLEAF_CAPACITY,
        )
    }

    /// `open` with explicit node fan-outs. An existing index must be
    /// reopened with the capacities that built it.
    pub fn open_with_capacity<P: AsRef<Path>>(
        bm: &mut BufMgr,
        relation_path: P,
        attr_byte_offset: usize,
        attr_type: AttrType,
        leaf_cap: usize,
        node_cap: usize,
    ) -> IndexResult<(Self, String)> {
        assert!(
            (2..=LEAF_CAPACITY).contains(&leaf_cap) && (2..=NONLEAF_CAPACITY).contains(&node_cap),
            "node capacities must be between 2 and the page-derived maximums"
        );

        let relation_path = relation_path.as_ref();
        let index_name = format!("{}.{}", relation_path.display(), attr_byte_offset);

        let index = if Path::new(&index_name).exists() {
            Self::open_existing(bm, &index_name, leaf_cap, node_cap)?
        } else {
            Self::create(
                bm,
                relation_path,
                &index_name,
                attr_byte_offset,
                attr_type,
                leaf_cap,
                node_cap,
            )?
        };

        Ok((index, index_name))
    }

    fn open_existing(
        bm: &mut BufMgr,
        index_name: &str,
        leaf_cap: usize,
        node_cap: usize,
    ) -> IndexResult<Self> {
        let file = bm.file_manager_mut().open_file(index_name)?;

        let bytes = bm.read_page(file, META_PAGE_NO)?;
        let meta = IndexMeta::decode(bytes);
        bm.unpin(file, META_PAGE_NO, false)?;
        let meta = meta?;
        debug!("opened existing index file {index_name}");

        // pin the root for the index lifetime
        bm.read_page(file, meta.root_page_no)?;

        Ok(Self {
            file,
            relation_name: meta.relation_name,
            attr_byte_offset: meta.attr_byte_offset as usize,
            attr_type: meta.attr_type,
            root_page_no: meta.root_page_no,
            leaf_occupancy: meta.leaf_occupancy,
            node_occupancy: meta.node_occupancy,
            leaf_cap,
            node_cap,
            scan: None,
        })
    }

    fn create(
        bm: &mut BufMgr,
        relation_path: &Path,
        index_name: &str,
        attr_byte_offset: usize,
        attr_type: AttrType,
        leaf_cap: usize,
        node_cap: usize,
    ) -> IndexResult<Self> {
        bm.file_manager_mut().create_file(index_name)?;
        let file = bm.file_manager_mut().open_file(index_name)?;
        debug!("created index file {index_name}");

        let (meta_page_no, _) = bm.alloc_page(file)?;
        debug_assert_eq!(meta_page_no, META_PAGE_NO);

        // the root starts as an empty leaf and keeps its pin
        let (root_page_no, root_bytes) = bm.alloc_page(file)?;
        LeafNode::new().encode(root_bytes)?;

        let relation_name = relation_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| relation_path.display().to_string());

        let mut index = Self {
            file,
            relation_name,
            attr_byte_offset,
            attr_type,
            root_page_no,
            leaf_occupancy: 0,
            node_occupancy: 0,
            leaf_cap,
            node_cap,
            scan: None,
        };

        index.meta().encode(bm.pinned_page_mut(file, meta_page_no)?)?;
        bm.unpin(file, meta_page_no, true)?;

        // build from the relation: one pass, one insert per record
        let mut scan = FileScan::new(bm, relation_path)?;
        loop {
            match scan.scan_next(bm) {
                Ok((rid, record)) => {
                    let key = key_at(&record, index.attr_byte_offset)?;
                    index.insert(bm, key, rid)?;
                }
                Err(RecordError::EndOfFile) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(index)
    }

    pub fn file(&self) -> FileHandle {
        self.file
    }

    pub fn root_page_no(&self) -> PageId {
        self.root_page_no
    }

    pub fn leaf_occupancy(&self) -> u32 {
        self.leaf_occupancy
    }

    pub fn node_occupancy(&self) -> u32 {
        self.node_occupancy
    }

    fn meta(&self) -> IndexMeta {
        IndexMeta {
            relation_name: self.relation_name.clone(),
            attr_byte_offset: self.attr_byte_offset as u32,
            attr_type: self.attr_type,
            root_page_no: self.root_page_no,
            leaf_occupancy: self.leaf_occupancy,
            node_occupancy: self.node_occupancy,
        }
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Insert `(key, rid)`. Splits propagate upward by re-descending to each
    /// parent; a split past the old root grows the tree by one level.
    pub fn insert(&mut self, bm: &mut BufMgr, key: i32, rid: RecordId) -> IndexResult<()> {
        self.leaf_occupancy += 1;

        let (leaf_page_no, mut leaf, depth) = self.find_leaf(bm, key)?;

        if leaf.len() < self.leaf_cap {
            leaf.insert(key, rid);
            self.write_leaf(bm, leaf_page_no, &leaf)?;
            bm.unpin(self.file, leaf_page_no, true)?;
            return Ok(());
        }

        // Split the leaf. The trailing entries move to a new right sibling;
        // the new entry goes to whichever side its insertion index selects.
        // The boundary is the post-split seam: an index below ceil(cap / 2)
        // orders before the moved tail and must stay left.
        let (right_page_no, _) = bm.alloc_page(self.file)?;
        let insert_left = leaf.insert_index(key) < (self.leaf_cap + 1) / 2;
        let copy_num = (self.leaf_cap + insert_left as usize) / 2;
        let split_at = self.leaf_cap - copy_num;

        let mut right = LeafNode {
            keys: leaf.keys.split_off(split_at),
            rids: leaf.rids.split_off(split_at),
            right_sib_page_no: leaf.right_sib_page_no,
        };
        if insert_left {
            leaf.insert(key, rid);
        } else {
            right.insert(key, rid);
        }
        leaf.right_sib_page_no = right_page_no;

        // promote the right leaf's minimum
        let mut promoted_key = right.keys[0];
        let mut promoted_page = right_page_no;

        self.write_leaf(bm, right_page_no, &right)?;
        self.write_leaf(bm, leaf_page_no, &leaf)?;
        bm.unpin(self.file, right_page_no, true)?;
        bm.unpin(self.file, leaf_page_no, true)?;

        // the split node's first key still routes to it; that locates parents
        let mut child_page = leaf_page_no;
        let mut child_first_key = leaf.keys[0];

        let mut remaining = depth as isize - 1;
        while remaining >= 0 {
            let parent_page = self.find_parent(bm, child_page, child_first_key)?;
            let mut node = self.read_nonleaf(bm, parent_page)?;
            self.node_occupancy += 1;

            if node.len() < self.node_cap {
                node.insert_entry(promoted_key, promoted_page);
                self.write_nonleaf(bm, parent_page, &node)?;
                bm.unpin(self.file, parent_page, true)?;
                return Ok(());
            }

            // Split the internal node around its median; the middle key
            // moves up and leaves this level entirely.
            let (right_page, _) = bm.alloc_page(self.file)?;
            node.insert_entry(promoted_key, promoted_page);
            let mid = node.len() / 2;

            let mut right_node = NonLeafNode::new(node.level);
            right_node.keys = node.keys.split_off(mid + 1);
            right_node.children = node.children.split_off(mid + 1);
            promoted_key = node.keys[mid];
            node.keys.truncate(mid);
            promoted_page = right_page;

            self.write_nonleaf(bm, parent_page, &node)?;
            self.write_nonleaf(bm, right_page, &right_node)?;
            bm.unpin(self.file, parent_page, true)?;
            bm.unpin(self.file, right_page, true)?;

            child_page = parent_page;
            child_first_key = node.keys[0];
            remaining -= 1;
        }

        // the walk passed the old root: grow the tree
        let old_root = self.root_page_no;
        let (new_root_page, _) = bm.alloc_page(self.file)?;

        let mut root = NonLeafNode::new(if self.node_occupancy == 0 { 1 } else { 0 });
        root.keys.push(promoted_key);
        root.children.push(old_root);
        root.children.push(promoted_page);
        self.node_occupancy += 1;

        self.write_nonleaf(bm, new_root_page, &root)?;
        self.root_page_no = new_root_page;

        // the new root keeps its pin as the lifetime pin; the old root's is stale
        bm.unpin(self.file, old_root, true)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Descent
    // ------------------------------------------------------------------

    /// Walk from the root to the leaf that routes `key`. The leaf page is
    /// left pinned; `depth` is its distance from the root. Interior nodes
    /// are unpinned clean as the walk passes them.
    fn find_leaf(&self, bm: &mut BufMgr, key: i32) -> IndexResult<(PageId, LeafNode, usize)> {
        let mut page_no = self.root_page_no;

        if self.node_occupancy == 0 {
            // no internal nodes yet: the root is the leaf
            return Ok((page_no, self.read_leaf(bm, page_no)?, 0));
        }

        let mut depth = 0;
        loop {
            let node = self.read_nonleaf(bm, page_no)?;
            let child = node.children[node.route(key)];
            bm.unpin(self.file, page_no, false)?;
            depth += 1;

            if node.level == 1 {
                return Ok((child, self.read_leaf(bm, child)?, depth));
            }
            page_no = child;
        }
    }

    /// Find the parent of `target` by re-descending from the root.
    /// `route_key` must be a key stored in `target` (its first key); the
    /// parent is the node whose child pointer equals `target`. The parent of
    /// the root is the root itself.
    fn find_parent(
        &self,
        bm: &mut BufMgr,
        target: PageId,
        route_key: i32,
    ) -> IndexResult<PageId> {
        if target == self.root_page_no {
            return Ok(target);
        }

        let mut page_no = self.root_page_no;
        loop {
            let node = self.read_nonleaf(bm, page_no)?;
            let child = node.children[node.route(route_key)];
            bm.unpin(self.file, page_no, false)?;

            if child == target {
                return Ok(page_no);
            }
            if node.level == 1 {
                return Err(IndexError::Corrupted(format!(
                    "page {target} is not reachable from the root"
                )));
            }
            page_no = child;
        }
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Position a scan on the first entry inside the given range
    ///
    /// On success the starting leaf stays pinned until the scan advances
    /// past it or `end_scan` runs. A failed start leaves no scan executing
    /// and no page pinned. Starting a scan terminates any scan in progress.
    pub fn start_scan(
        &mut self,
        bm: &mut BufMgr,
        low_val: i32,
        low_op: Operator,
        high_val: i32,
        high_op: Operator,
    ) -> IndexResult<()> {
        if !matches!(low_op, Operator::Gt | Operator::Gte)
            || !matches!(high_op, Operator::Lt | Operator::Lte)
        {
            return Err(IndexError::BadOpcodes);
        }
        if self.leaf_occupancy == 0 {
            return Err(IndexError::NoSuchKeyFound);
        }
        if self.scan.is_some() {
            self.end_scan(bm)?;
        }
        if low_val > high_val {
            return Err(IndexError::BadScanrange);
        }

        let (mut page_no, mut leaf, _) = self.find_leaf(bm, low_val)?;
        loop {
            for next_entry in 0..leaf.len() {
                let key = leaf.keys[next_entry];
                if past_upper_bound(key, high_val, high_op) {
                    bm.unpin(self.file, page_no, false)?;
                    return Err(IndexError::NoSuchKeyFound);
                }
                if meets_lower_bound(key, low_val, low_op) {
                    self.scan = Some(ScanState {
                        high_val,
                        high_op,
                        current_page_no: page_no,
                        current_leaf: leaf,
                        next_entry,
                    });
                    return Ok(());
                }
            }

            let next = leaf.right_sib_page_no;
            bm.unpin(self.file, page_no, false)?;
            if next == INVALID_PAGE {
                return Err(IndexError::NoSuchKeyFound);
            }
            leaf = self.read_leaf(bm, next)?;
            page_no = next;
        }
    }

    /// Record id of the next entry in range
    ///
    /// Exhausting the current leaf moves the scan to the right sibling.
    /// `IndexScanCompleted` leaves the scan live (and its leaf pinned)
    /// until `end_scan`.
    pub fn scan_next(&mut self, bm: &mut BufMgr) -> IndexResult<RecordId> {
        let file = self.file;
        let scan = self.scan.as_mut().ok_or(IndexError::ScanNotInitialized)?;

        if scan.next_entry >= scan.current_leaf.len() {
            let next = scan.current_leaf.right_sib_page_no;
            if next == INVALID_PAGE {
                return Err(IndexError::IndexScanCompleted);
            }

            bm.unpin(file, scan.current_page_no, false)?;
            let bytes = bm.read_page(file, next)?;
            let leaf = match LeafNode::decode(bytes) {
                Ok(leaf) => leaf,
                Err(e) => {
                    bm.unpin(file, next, false)?;
                    return Err(e);
                }
            };
            scan.current_page_no = next;
            scan.current_leaf = leaf;
            scan.next_entry = 0;
        }

        let key = scan.current_leaf.keys[scan.next_entry];
        if past_upper_bound(key, scan.high_val, scan.high_op) {
            return Err(IndexError::IndexScanCompleted);
        }

        let rid = scan.current_leaf.rids[scan.next_entry];
        scan.next_entry += 1;
        Ok(rid)
    }

    /// Terminate the scan in progress and release its leaf
    pub fn end_scan(&mut self, bm: &mut BufMgr) -> IndexResult<()> {
        let scan = self.scan.take().ok_or(IndexError::ScanNotInitialized)?;
        bm.unpin(self.file, scan.current_page_no, false)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Close the index: end any live scan, rewrite the meta page, release
    /// the lifetime root pin, flush and close the index file.
    pub fn close(mut self, bm: &mut BufMgr) -> IndexResult<()> {
        if self.scan.is_some() {
            self.end_scan(bm)?;
        }

        let bytes = bm.read_page(self.file, META_PAGE_NO)?;
        let encoded = self.meta().encode(bytes);
        bm.unpin(self.file, META_PAGE_NO, true)?;
        encoded?;

        bm.unpin(self.file, self.root_page_no, true)?;
        bm.flush_file(self.file)?;
        bm.file_manager_mut().close_file(self.file)?;
        debug!("closed index on {}", self.relation_name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node I/O
    // ------------------------------------------------------------------

    /// Read and decode a leaf, leaving its page pinned
    fn read_leaf(&self, bm: &mut BufMgr, page_no: PageId) -> IndexResult<LeafNode> {
        let bytes = bm.read_page(self.file, page_no)?;
        let node = LeafNode::decode(bytes);
        if node.is_err() {
            bm.unpin(self.file, page_no, false)?;
        }
        node
    }

    /// Read and decode an internal node, leaving its page pinned
    fn read_nonleaf(&self, bm: &mut BufMgr, page_no: PageId) -> IndexResult<NonLeafNode> {
        let bytes = bm.read_page(self.file, page_no)?;
        let node = NonLeafNode::decode(bytes);
        if node.is_err() {
            bm.unpin(self.file, page_no, false)?;
        }
        node
    }

    /// Encode a leaf back into its pinned page
    fn write_leaf(&self, bm: &mut BufMgr, page_no: PageId, node: &LeafNode) -> IndexResult<()> {
        node.encode(bm.pinned_page_mut(self.file, page_no)?)
    }

    /// Encode an internal node back into its pinned page
    fn write_nonleaf(
        &self,
        bm: &mut BufMgr,
        page_no: PageId,
        node: &NonLeafNode,
    ) -> IndexResult<()> {
        node.encode(bm.pinned_page_mut(self.file, page_no)?)
    }
}

/// Integer key at `offset` in a record's bytes
fn key_at(record: &[u8], offset: usize) -> IndexResult<i32> {
    let bytes = record.get(offset..offset + 4).ok_or_else(|| {
        IndexError::Corrupted(format!("record too short for a key at offset {offset}"))
    })?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// True when `key` falls outside the scan's upper bound
fn past_upper_bound(key: i32, high_val: i32, high_op: Operator) -> bool {
    key > high_val || (key == high_val && high_op == Operator::Lt)
}

/// True when `key` satisfies the scan's lower bound
fn meets_lower_bound(key: i32, low_val: i32, low_op: Operator) -> bool {
    match low_op {
        Operator::Gte => key >= low_val,
        Operator::Gt => key > low_val,
        _ => false,
    }
}
