//! Document storage and index maintenance for one collection. Per spec
//! §4.7, grounded on the teacher's `PageWriteGuard`/`PageReadGuard`
//! discipline, generalized from raw page slices to whole documents
//! serialized through `bson`.

use rand::rngs::ThreadRng;

use crate::bson::{self, BsonDocument, BsonValue};
use crate::common::{Error, PageAddress, PageId, Result};
use crate::pager::Snapshot;
use crate::storage::page::{Page, PageHeader, PageType};

use super::data_page::{self};
use super::index_info::{IndexInfo, IndexOptions, IndexStructure};

/// A document's storage location: either it fit in one data-page slot, or
/// it chains through one or more `Extend` pages.
#[derive(Debug, Clone, Copy)]
enum Stored {
    Inline(PageAddress),
    Chained { head: PageAddress, first_extend: PageId, total_len: u32 },
}

const CHAIN_MARKER: u8 = 0xFE;

/// In-memory collection state: where its documents live and which indexes
/// are defined over them. One instance per open collection; the pager
/// `Snapshot` for the active transaction is passed into every operation.
pub struct CollectionService {
    pub name: String,
    head_data_page: Option<PageId>,
    indexes: Vec<IndexInfo>,
}

impl CollectionService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_data_page: None,
            indexes: Vec::new(),
        }
    }

    /// Resume a collection already known to the header page, picking its
    /// document chain back up at `head`.
    pub fn with_head_page(name: impl Into<String>, head: Option<PageId>) -> Self {
        Self {
            name: name.into(),
            head_data_page: head,
            indexes: Vec::new(),
        }
    }

    pub fn head_data_page(&self) -> Option<PageId> {
        self.head_data_page
    }

    pub fn indexes(&self) -> &[IndexInfo] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Resolve an index-scan result (a raw storage address) back to its
    /// document, for callers bypassing `scan`/`find_by_id`.
    pub fn read_by_address(&self, snapshot: &mut Snapshot, address: PageAddress) -> Result<BsonDocument> {
        match self.read_stored(snapshot, address)? {
            Stored::Inline(addr) => {
                let page = snapshot.get_page(addr.page_id)?;
                let bytes = data_page::read(page.body(), addr.slot)
                    .ok_or_else(|| Error::DocumentNotFound(format!("{addr}")))?;
                bson::from_slice(bytes)
            }
            Stored::Chained { first_extend, total_len, .. } => {
                let full = self.read_chain(snapshot, first_extend, total_len)?;
                bson::from_slice(&full)
            }
        }
    }

    fn document_key(doc: &BsonDocument) -> Result<BsonValue> {
        doc.get("_id")
            .cloned()
            .ok_or_else(|| Error::InvalidExpression("document missing _id".into()))
    }

    fn index_key(doc: &BsonDocument, path: &[String]) -> BsonValue {
        doc.get_path(path).cloned().unwrap_or(BsonValue::Null)
    }

    /// Insert a document, assigning `_id` if absent. Writes the document
    /// bytes, then re-evaluates and inserts into every defined index.
    pub fn insert(&mut self, snapshot: &mut Snapshot, mut doc: BsonDocument) -> Result<PageAddress> {
        if doc.get("_id").is_none() {
            doc.set("_id", BsonValue::ObjectId(crate::bson::ObjectId::new()));
        }
        let bytes = bson::to_vec(&doc)?;
        let stored = self.write_document(snapshot, &bytes)?;
        let address = stored.head_address();

        let mut rng = rand::thread_rng();
        for index in &mut self.indexes {
            let key = Self::index_key(&doc, &index.path);
            insert_into_index(index, key, address, &mut rng)?;
        }
        Ok(address)
    }

    /// Replace a document's contents. Re-evaluates every index's key,
    /// removing the stale entry and inserting the new one; rewrites the
    /// document in place if the new bytes fit in the existing slot,
    /// otherwise relocates it (and every index's stored address).
    pub fn update(&mut self, snapshot: &mut Snapshot, id: &BsonValue, mut doc: BsonDocument) -> Result<PageAddress> {
        let (old_doc, old_address) = self
            .find_by_id(snapshot, id)?
            .ok_or_else(|| Error::DocumentNotFound(format!("{id:?}")))?;
        doc.set("_id", id.clone());
        let bytes = bson::to_vec(&doc)?;

        let new_address = if let Stored::Inline(addr) = self.read_stored(snapshot, old_address)? {
            let page = snapshot.get_page_mut(addr.page_id)?;
            let body = page.body_mut();
            if data_page::overwrite(body, addr.slot, &bytes).is_ok() {
                page.update_checksum();
                addr
            } else {
                self.free_document(snapshot, old_address)?;
                self.write_document(snapshot, &bytes)?.head_address()
            }
        } else {
            self.free_document(snapshot, old_address)?;
            self.write_document(snapshot, &bytes)?.head_address()
        };

        let mut rng = rand::thread_rng();
        for index in &mut self.indexes {
            remove_from_index(index, &old_doc, old_address);
            let key = Self::index_key(&doc, &index.path);
            insert_into_index(index, key, new_address, &mut rng)?;
        }
        Ok(new_address)
    }

    /// Remove a document from every index and free its storage.
    pub fn delete(&mut self, snapshot: &mut Snapshot, id: &BsonValue) -> Result<()> {
        let (doc, address) = self
            .find_by_id(snapshot, id)?
            .ok_or_else(|| Error::DocumentNotFound(format!("{id:?}")))?;
        for index in &mut self.indexes {
            remove_from_index(index, &doc, address);
        }
        self.free_document(snapshot, address)
    }

    pub fn find_by_id(&self, snapshot: &mut Snapshot, id: &BsonValue) -> Result<Option<(BsonDocument, PageAddress)>> {
        for (doc, address) in self.scan(snapshot)? {
            if &Self::document_key(&doc)? == id {
                return Ok(Some((doc, address)));
            }
        }
        Ok(None)
    }

    /// Full collection scan: walk every data page from `head_data_page`,
    /// decoding every non-tombstoned slot.
    pub fn scan(&self, snapshot: &mut Snapshot) -> Result<Vec<(BsonDocument, PageAddress)>> {
        let mut out = Vec::new();
        let Some(head) = self.head_data_page else {
            return Ok(out);
        };
        let mut current = Some(head);
        while let Some(page_id) = current {
            let page = snapshot.get_page(page_id)?;
            let next = page.header().next_page_id;
            let slot_count = data_page::slot_len(page.body());
            for slot in 0..slot_count {
                let Some(bytes) = data_page::read(page.body(), slot) else {
                    continue;
                };
                if bytes.first() == Some(&CHAIN_MARKER) {
                    let (first_extend, total_len) = decode_chain_header(bytes);
                    let full = self.read_chain(snapshot, first_extend, total_len)?;
                    out.push((bson::from_slice(&full)?, PageAddress::new(page_id, slot)));
                } else {
                    out.push((bson::from_slice(bytes)?, PageAddress::new(page_id, slot)));
                }
            }
            current = if next == crate::storage::page::NO_PAGE {
                None
            } else {
                Some(PageId::new(next))
            };
        }
        Ok(out)
    }

    /// Full scan building (or rebuilding) one index from scratch, matching
    /// whatever documents currently exist in the collection.
    pub fn ensure_index(&mut self, snapshot: &mut Snapshot, name: &str, path: Vec<String>, options: IndexOptions) -> Result<()> {
        self.indexes.retain(|idx| idx.name != name);
        let mut index = IndexInfo::new(name, path.clone(), &options);
        let mut rng = rand::thread_rng();
        for (doc, address) in self.scan(snapshot)? {
            let key = Self::index_key(&doc, &path);
            insert_into_index(&mut index, key, address, &mut rng)?;
        }
        self.indexes.push(index);
        Ok(())
    }

    fn read_stored(&self, snapshot: &mut Snapshot, address: PageAddress) -> Result<Stored> {
        let page = snapshot.get_page(address.page_id)?;
        let bytes = data_page::read(page.body(), address.slot)
            .ok_or_else(|| Error::DocumentNotFound(format!("{address}")))?;
        if bytes.first() == Some(&CHAIN_MARKER) {
            let (first_extend, total_len) = decode_chain_header(bytes);
            Ok(Stored::Chained { head: address, first_extend, total_len })
        } else {
            Ok(Stored::Inline(address))
        }
    }

    fn read_chain(&self, snapshot: &mut Snapshot, mut page_id: PageId, total_len: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(total_len as usize);
        loop {
            let page = snapshot.get_page(page_id)?;
            let body = page.body();
            let take = (total_len as usize - out.len()).min(body.len());
            out.extend_from_slice(&body[..take]);
            let next = page.header().next_page_id;
            if out.len() >= total_len as usize || next == crate::storage::page::NO_PAGE {
                break;
            }
            page_id = PageId::new(next);
        }
        Ok(out)
    }

    /// Write a new document's bytes: a single data-page slot if it fits,
    /// else a chain pointer slot plus a run of `Extend` pages.
    fn write_document(&mut self, snapshot: &mut Snapshot, bytes: &[u8]) -> Result<Stored> {
        let body_capacity = crate::common::config::PAGE_SIZE - PageHeader::SIZE;
        if data_page::required_space(bytes.len()) <= body_capacity {
            let page_id = self.data_page_with_room(snapshot, data_page::required_space(bytes.len()))?;
            let page = snapshot.get_page_mut(page_id)?;
            let slot = data_page::insert(page.body_mut(), bytes)?;
            page.update_checksum();
            return Ok(Stored::Inline(PageAddress::new(page_id, slot)));
        }

        let first_extend = self.write_extend_chain(snapshot, bytes)?;
        let mut marker = Vec::with_capacity(9);
        marker.push(CHAIN_MARKER);
        marker.extend_from_slice(&first_extend.0.to_le_bytes());
        marker.extend_from_slice(&(bytes.len() as u32).to_le_bytes());

        let page_id = self.data_page_with_room(snapshot, data_page::required_space(marker.len()))?;
        let page = snapshot.get_page_mut(page_id)?;
        let slot = data_page::insert(page.body_mut(), &marker)?;
        page.update_checksum();
        Ok(Stored::Chained { head: PageAddress::new(page_id, slot), first_extend, total_len: bytes.len() as u32 })
    }

    fn write_extend_chain(&mut self, snapshot: &mut Snapshot, bytes: &[u8]) -> Result<PageId> {
        let body_capacity = crate::common::config::PAGE_SIZE - PageHeader::SIZE;
        let chunks: Vec<&[u8]> = bytes.chunks(body_capacity).collect();
        let mut page_ids = Vec::with_capacity(chunks.len());
        for _ in &chunks {
            page_ids.push(snapshot.allocate_page()?);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let next = if i + 1 < page_ids.len() { page_ids[i + 1].0 } else { crate::storage::page::NO_PAGE };
            let mut header = PageHeader::new(PageType::Extend, page_ids[i].0);
            header.next_page_id = next;
            let mut page = Page::new();
            page.set_header(&header);
            page.body_mut()[..chunk.len()].copy_from_slice(chunk);
            page.update_checksum();
            snapshot.put_new_page(page_ids[i], page);
        }
        Ok(page_ids[0])
    }

    /// Find (or allocate) a data page in the collection's chain with at
    /// least `needed` free bytes.
    fn data_page_with_room(&mut self, snapshot: &mut Snapshot, needed: usize) -> Result<PageId> {
        let mut current = self.head_data_page;
        let mut last = None;
        while let Some(page_id) = current {
            let page = snapshot.get_page(page_id)?;
            if data_page::free_space(page.body()) >= needed {
                return Ok(page_id);
            }
            let next = page.header().next_page_id;
            last = Some(page_id);
            current = if next == crate::storage::page::NO_PAGE { None } else { Some(PageId::new(next)) };
        }

        let new_id = snapshot.allocate_page()?;
        let mut header = PageHeader::new(PageType::Data, new_id.0);
        if let Some(prev_id) = last {
            header.prev_page_id = prev_id.0;
        }
        let mut page = Page::new();
        page.set_header(&header);
        data_page::init(page.body_mut());
        page.update_checksum();
        snapshot.put_new_page(new_id, page);

        if let Some(prev_id) = last {
            let prev = snapshot.get_page_mut(prev_id)?;
            let mut prev_header = prev.header();
            prev_header.next_page_id = new_id.0;
            prev.set_header(&prev_header);
            prev.update_checksum();
        } else {
            self.head_data_page = Some(new_id);
        }
        Ok(new_id)
    }

    fn free_document(&mut self, snapshot: &mut Snapshot, address: PageAddress) -> Result<()> {
        let page = snapshot.get_page_mut(address.page_id)?;
        data_page::delete(page.body_mut(), address.slot);
        page.update_checksum();
        Ok(())
    }
}

fn decode_chain_header(bytes: &[u8]) -> (PageId, u32) {
    let first_extend = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
    let total_len = u32::from_le_bytes(bytes[5..9].try_into().unwrap());
    (PageId::new(first_extend), total_len)
}

impl Stored {
    fn head_address(&self) -> PageAddress {
        match self {
            Stored::Inline(addr) => *addr,
            Stored::Chained { head, .. } => *head,
        }
    }
}

fn insert_into_index(index: &mut IndexInfo, key: BsonValue, address: PageAddress, rng: &mut ThreadRng) -> Result<()> {
    match &mut index.structure {
        IndexStructure::SkipList(skip_list) => {
            skip_list.insert(key, address, rng)?;
        }
        IndexStructure::Vector(vector) => {
            if let BsonValue::Vector(v) = key {
                vector.insert(address, v)?;
            }
        }
        IndexStructure::SpatialPoint(points) => {
            if let Some(point) = as_point(&key) {
                points.insert(point, address, rng);
            }
        }
        IndexStructure::SpatialShape(shapes) => {
            if let Some(point) = as_point(&key) {
                shapes.insert(address, point, [point.0, point.1, point.0, point.1]);
            }
        }
    }
    Ok(())
}

fn remove_from_index(index: &mut IndexInfo, doc: &BsonDocument, address: PageAddress) {
    let key = doc.get_path(&index.path).cloned().unwrap_or(BsonValue::Null);
    match &mut index.structure {
        IndexStructure::SkipList(skip_list) => {
            skip_list.delete_address(&key, address);
        }
        IndexStructure::Vector(vector) => {
            vector.remove(address);
        }
        IndexStructure::SpatialPoint(points) => {
            if let Some(point) = as_point(&key) {
                points.remove(point, address);
            }
        }
        IndexStructure::SpatialShape(shapes) => {
            shapes.remove(address);
        }
    }
}

fn as_point(v: &BsonValue) -> Option<(f64, f64)> {
    match v {
        BsonValue::Array(items) if items.len() == 2 => Some((items[0].as_f64()?, items[1].as_f64()?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::{LockMode, WalIndex};
    use crate::storage::DiskService;
    use tempfile::tempdir;

    fn new_disk() -> (tempfile::TempDir, DiskService) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coll.db");
        (dir, DiskService::create(&path).unwrap())
    }

    #[test]
    fn test_insert_and_scan() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("people");

        let mut doc = BsonDocument::new();
        doc.set("name", BsonValue::String("Ada".into()));
        let address = coll.insert(&mut snapshot, doc).unwrap();

        let results = coll.scan(&mut snapshot).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, address);
        assert!(matches!(results[0].0.get("name"), Some(BsonValue::String(s)) if s == "Ada"));
    }

    #[test]
    fn test_insert_assigns_object_id() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("people");
        let doc = BsonDocument::new();
        coll.insert(&mut snapshot, doc).unwrap();
        let results = coll.scan(&mut snapshot).unwrap();
        assert!(matches!(results[0].0.get("_id"), Some(BsonValue::ObjectId(_))));
    }

    #[test]
    fn test_update_relocates_when_grown() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("people");

        let mut doc = BsonDocument::new();
        doc.set("_id", BsonValue::Int32(1));
        doc.set("bio", BsonValue::String("short".into()));
        coll.insert(&mut snapshot, doc).unwrap();

        let mut updated = BsonDocument::new();
        updated.set("bio", BsonValue::String("x".repeat(8000)));
        coll.update(&mut snapshot, &BsonValue::Int32(1), updated).unwrap();

        let found = coll.find_by_id(&mut snapshot, &BsonValue::Int32(1)).unwrap();
        assert!(found.is_some());
        assert!(matches!(found.unwrap().0.get("bio"), Some(BsonValue::String(s)) if s.len() == 8000));
    }

    #[test]
    fn test_delete_removes_document() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("people");

        let mut doc = BsonDocument::new();
        doc.set("_id", BsonValue::Int32(7));
        coll.insert(&mut snapshot, doc).unwrap();
        coll.delete(&mut snapshot, &BsonValue::Int32(7)).unwrap();

        assert!(coll.find_by_id(&mut snapshot, &BsonValue::Int32(7)).unwrap().is_none());
    }

    #[test]
    fn test_ensure_index_then_insert_updates_it() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("people");

        coll.ensure_index(&mut snapshot, "age_idx", vec!["age".into()], IndexOptions::default()).unwrap();

        let mut doc = BsonDocument::new();
        doc.set("age", BsonValue::Int32(30));
        coll.insert(&mut snapshot, doc).unwrap();

        let index = &coll.indexes()[0];
        match &index.structure {
            IndexStructure::SkipList(sl) => {
                assert!(sl.find(&BsonValue::Int32(30)).is_some());
            }
            _ => panic!("expected skip list"),
        }
    }

    #[test]
    fn test_document_spanning_multiple_pages_chains_through_extend() {
        let (_dir, mut disk) = new_disk();
        let wal = WalIndex::new();
        let mut snapshot = Snapshot::new(LockMode::Write, 0, &wal, &mut disk);
        let mut coll = CollectionService::new("blobs");

        let mut doc = BsonDocument::new();
        doc.set("_id", BsonValue::Int32(1));
        doc.set("payload", BsonValue::String("y".repeat(20_000)));
        coll.insert(&mut snapshot, doc).unwrap();

        let (found, _) = coll.find_by_id(&mut snapshot, &BsonValue::Int32(1)).unwrap().unwrap();
        assert!(matches!(found.get("payload"), Some(BsonValue::String(s)) if s.len() == 20_000));
    }
}
