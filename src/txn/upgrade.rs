//! v4 → v5 header upgrade.
//!
//! Per Design Note #3 (SPEC_FULL.md §15 OQ3), the legacy v4 layout is
//! treated as an external contract: this crate's v4 "reader" only needs to
//! recognize the documented byte offsets that drive the upgrade scenario
//! (the magic string and the `file_version` tag directly after it, both at
//! the fixed offsets `HeaderPage::write_to_page`/`read_from_page` already
//! use), not reproduce the historical format bit-for-bit. A v4 file here
//! differs from v5 only in that tag; everything else through the header
//! page is already structurally compatible, so the upgrade is a targeted
//! rewrite of that one field rather than a full collection walk-and-copy.

use std::path::Path;

use crate::common::{Error, Result};
use crate::storage::header_page::{FILE_VERSION_V4, FILE_VERSION_V5};
use crate::storage::{DiskService, HeaderPage, PageOrigin};

/// Inspect `path`'s header page. If it's a v4 file and `upgrade` is false,
/// fails with `Error::UpgradeRequired`; if `upgrade` is true, rewrites the
/// header's version tag to v5 and checkpoints. A v5 (or newly created)
/// file is a no-op either way.
pub fn upgrade_v4_to_v5<P: AsRef<Path>>(path: P, upgrade: bool) -> Result<()> {
    let mut disk = DiskService::open(&path)?;
    let page = disk.read_page(crate::common::PageId::new(0), PageOrigin::Data)?;
    let mut header = HeaderPage::read_from_page(&page)?;

    if header.file_version == FILE_VERSION_V4 {
        if !upgrade {
            return Err(Error::UpgradeRequired);
        }
        tracing::info!(path = %path.as_ref().display(), "upgrading database file v4 -> v5");
        header.file_version = FILE_VERSION_V5;
        let mut page = page;
        header.write_to_page(&mut page)?;
        disk.write_data_page(crate::common::PageId::new(0), &page)?;
        disk.finish_checkpoint()?;
    }

    Ok(())
}
