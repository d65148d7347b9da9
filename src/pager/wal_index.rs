//! Maps `(PageID, version)` to a concrete page location, across the log and
//! the data file.
//!
//! Grounded on `anatawa12-litedb-rs`'s `WalIndexService`: a transaction-id
//! counter, a page-id → version-list index, `confirm_transaction`, and
//! `restore_index`, de-asynced to blocking calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering as AtomicOrdering};

use parking_lot::RwLock;

use crate::common::PageId;
use crate::storage::{DiskService, PageOrigin};

/// One committed version of a page: the transaction-relative version number
/// and the byte position in the log file it was written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub version: i32,
    pub log_position: u64,
}

/// Tracks every confirmed version of every page that currently lives in the
/// log, resolving reads to the newest version visible to a given
/// transaction.
pub struct WalIndex {
    last_transaction_id: AtomicU32,
    current_read_version: AtomicI32,
    index: RwLock<HashMap<PageId, Vec<PagePosition>>>,
}

impl WalIndex {
    pub fn new() -> Self {
        Self {
            last_transaction_id: AtomicU32::new(0),
            current_read_version: AtomicI32::new(0),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate the next transaction id.
    pub fn next_transaction_id(&self) -> u32 {
        self.last_transaction_id.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    /// The version a newly opened read transaction should see: every
    /// confirmed commit up to this value is visible, nothing after.
    pub fn current_read_version(&self) -> i32 {
        self.current_read_version.load(AtomicOrdering::SeqCst)
    }

    /// Record one page's position for an in-flight (not yet confirmed)
    /// version. Called as dirty pages are appended to the log.
    pub fn add_version(&self, page_id: PageId, version: i32, log_position: u64) {
        self.index
            .write()
            .entry(page_id)
            .or_default()
            .push(PagePosition { version, log_position });
    }

    /// Mark a transaction's version as durable and visible to new readers.
    /// Called once the trailing confirm page has been written.
    pub fn confirm_transaction(&self, version: i32) {
        let mut current = self.current_read_version.load(AtomicOrdering::SeqCst);
        while version > current {
            match self.current_read_version.compare_exchange(
                current,
                version,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Resolve the newest version of `page_id` visible at `version` (a
    /// transaction's own in-progress writes use their own private version
    /// number, greater than anything yet confirmed).
    pub fn get_page_index(&self, page_id: PageId, version: i32) -> Option<PagePosition> {
        let index = self.index.read();
        index
            .get(&page_id)?
            .iter()
            .filter(|p| p.version <= version)
            .max_by_key(|p| p.version)
            .copied()
    }

    /// Drop every recorded position for a page once a checkpoint has moved
    /// it into the data file.
    pub fn clear_page(&self, page_id: PageId) {
        self.index.write().remove(&page_id);
    }

    /// Every page id currently tracked in the log, for a checkpoint to walk.
    pub fn tracked_pages(&self) -> Vec<PageId> {
        self.index.read().keys().copied().collect()
    }

    /// Number of log pages recorded across every tracked page, a rough
    /// proxy for log size the `CHECKPOINT` pragma compares against.
    pub fn tracked_version_count(&self) -> usize {
        self.index.read().values().map(|v| v.len()).sum()
    }

    /// Walk the log, re-populating the index from confirmed transactions
    /// only. Used on reopen after an unclean shutdown: incomplete
    /// transactions (no trailing confirmed page) are silently discarded,
    /// per the engine's durability invariant.
    pub fn restore_index(&self, disk: &mut DiskService) {
        let mut position = 0u64;
        let mut pending: Vec<(PageId, i32, u64)> = Vec::new();
        let mut max_version = 0i32;

        while position < disk.log_len() {
            let page = match disk.read_page(PageId::INVALID, PageOrigin::Log(position)) {
                Ok(p) => p,
                Err(_) => break,
            };
            let header = page.header();
            let version = header.transaction_id as i32;
            pending.push((PageId::new(header.page_id), version, position));
            max_version = max_version.max(version);

            if header.is_confirmed {
                for (pid, v, pos) in pending.drain(..) {
                    self.add_version(pid, v, pos);
                }
                self.confirm_transaction(version);
            }

            position += disk.physical_page_size();
        }
    }
}

impl Default for WalIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_increment() {
        let wal = WalIndex::new();
        assert_eq!(wal.next_transaction_id(), 1);
        assert_eq!(wal.next_transaction_id(), 2);
    }

    #[test]
    fn test_get_page_index_picks_newest_visible_version() {
        let wal = WalIndex::new();
        let page_id = PageId::new(5);
        wal.add_version(page_id, 1, 100);
        wal.add_version(page_id, 3, 200);
        wal.add_version(page_id, 5, 300);

        assert_eq!(wal.get_page_index(page_id, 4).unwrap().log_position, 200);
        assert_eq!(wal.get_page_index(page_id, 5).unwrap().log_position, 300);
        assert!(wal.get_page_index(page_id, 0).is_none());
    }

    #[test]
    fn test_confirm_transaction_is_monotonic() {
        let wal = WalIndex::new();
        wal.confirm_transaction(5);
        wal.confirm_transaction(2);
        assert_eq!(wal.current_read_version(), 5);
    }

    #[test]
    fn test_clear_page_drops_all_versions() {
        let wal = WalIndex::new();
        let page_id = PageId::new(1);
        wal.add_version(page_id, 1, 0);
        wal.clear_page(page_id);
        assert!(wal.get_page_index(page_id, 1).is_none());
    }
}
