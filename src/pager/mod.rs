//! Pager: resolves `(PageID, version)` pairs to concrete pages across the
//! log and the data file, and hands transactions a private, copy-on-write
//! view of the database.

mod snapshot;
mod wal_index;

pub use snapshot::{LockMode, Snapshot};
pub use wal_index::{PagePosition, WalIndex};
