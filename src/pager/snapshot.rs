//! Per-transaction page cache, resolving reads through the three-step
//! lookup of spec §4.3: snapshot cache, then the WAL index, then the data
//! file.

use std::collections::HashMap;

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::{DiskService, PageOrigin};

use super::wal_index::WalIndex;

/// Whether a snapshot may mutate the pages it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

struct CachedPage {
    page: Page,
    dirty: bool,
}

/// A transaction's private view of the database.
pub struct Snapshot<'a> {
    mode: LockMode,
    version: i32,
    cache: HashMap<PageId, CachedPage>,
    wal: &'a WalIndex,
    disk: &'a mut DiskService,
    next_page_id: u32,
}

impl<'a> Snapshot<'a> {
    pub fn new(mode: LockMode, version: i32, wal: &'a WalIndex, disk: &'a mut DiskService) -> Self {
        let next_page_id = disk.data_page_count();
        Self {
            mode,
            version,
            cache: HashMap::new(),
            wal,
            disk,
            next_page_id,
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Reserve a fresh page id for a new page this transaction will write
    /// (a collection, data, index, or extend page). Only valid in write
    /// mode; the reserved id is not visible to readers until this
    /// transaction's dirty pages are flushed and confirmed.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if self.mode != LockMode::Write {
            return Err(Error::ReadOnlyDatabase);
        }
        let id = PageId::new(self.next_page_id);
        self.next_page_id += 1;
        Ok(id)
    }

    /// Read-only access to a page: snapshot cache, else WAL, else the data
    /// file, caching the result either way.
    pub fn get_page(&mut self, page_id: PageId) -> Result<&Page> {
        if !self.cache.contains_key(&page_id) {
            let page = self.load(page_id)?;
            self.cache.insert(page_id, CachedPage { page, dirty: false });
        }
        Ok(&self.cache.get(&page_id).unwrap().page)
    }

    /// Mutable access, only valid for a write-mode snapshot. Pages are
    /// duplicated on first mutation (copy-on-write) and marked dirty so the
    /// commit path knows to persist them.
    pub fn get_page_mut(&mut self, page_id: PageId) -> Result<&mut Page> {
        if self.mode != LockMode::Write {
            return Err(Error::ReadOnlyDatabase);
        }
        if !self.cache.contains_key(&page_id) {
            let page = self.load(page_id)?;
            self.cache.insert(page_id, CachedPage { page, dirty: false });
        }
        let entry = self.cache.get_mut(&page_id).unwrap();
        entry.dirty = true;
        Ok(&mut entry.page)
    }

    /// Install a brand-new page (from `allocate_page`) directly into the
    /// dirty set without going through `load`.
    pub fn put_new_page(&mut self, page_id: PageId, page: Page) {
        self.cache.insert(page_id, CachedPage { page, dirty: true });
    }

    fn load(&mut self, page_id: PageId) -> Result<Page> {
        if let Some(position) = self.wal.get_page_index(page_id, self.version) {
            self.disk.read_page(page_id, PageOrigin::Log(position.log_position))
        } else {
            self.disk.read_page(page_id, PageOrigin::Data)
        }
    }

    /// Drain every page this snapshot mutated, in page-id order so the log
    /// is written deterministically.
    pub fn into_dirty_pages(self) -> Vec<(PageId, Page)> {
        let mut dirty: Vec<(PageId, Page)> = self
            .cache
            .into_iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, cached)| (id, cached.page))
            .collect();
        dirty.sort_by_key(|(id, _)| *id);
        dirty
    }
}
