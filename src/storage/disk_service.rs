//! Disk service: owns the data file (committed pages) and the log file
//! (uncommitted and recently committed pages), plus optional per-page
//! encryption and checksum verification.
//!
//! Grounded on the teacher's `DiskManager` (`page_id * PAGE_SIZE` seek math,
//! `fsync`-after-write durability) split across two streams per spec §2.2,
//! and on `wal_index_service.rs`'s `checkpoint_internal` for the checkpoint
//! algorithm (de-asynced to direct blocking calls).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::encryption::{AesCbcCodec, ENCRYPTED_PAGE_SIZE};
use super::page::Page;

/// Where a page came from, for reads that must resolve `(PageID,
/// TransactionID)` through the WAL before falling back to the data file.
#[derive(Debug, Clone, Copy)]
pub enum PageOrigin {
    /// The committed data file, at `page_id * physical_page_size()`.
    Data,
    /// The log file, at an absolute byte offset previously returned by
    /// `append_log_page`.
    Log(u64),
}

/// Owns the two on-disk regions and the optional page codec.
pub struct DiskService {
    data: File,
    log: File,
    data_page_count: u32,
    log_len: u64,
    encryption: Option<AesCbcCodec>,
}

fn log_path(data_path: &Path) -> PathBuf {
    let mut p = data_path.as_os_str().to_owned();
    p.push("-log");
    PathBuf::from(p)
}

impl DiskService {
    /// Create a new, empty database: a fresh data file and an empty log
    /// file alongside it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        let log = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(log_path(path.as_ref()))?;

        Ok(Self {
            data,
            log,
            data_page_count: 0,
            log_len: 0,
            encryption: None,
        })
    }

    /// Open an existing database. The log file is created empty if it
    /// doesn't exist (a clean shutdown truncates it at checkpoint).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = OpenOptions::new().read(true).write(true).open(&path)?;
        let data_page_count = (data.metadata()?.len() / PAGE_SIZE as u64) as u32;

        let log = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(log_path(path.as_ref()))?;
        let log_len = log.metadata()?.len();

        Ok(Self {
            data,
            log,
            data_page_count,
            log_len,
            encryption: None,
        })
    }

    /// Enable page encryption for every page except page 0 (which must
    /// stay plaintext: it carries the salt the key is derived from).
    pub fn set_encryption(&mut self, codec: AesCbcCodec) {
        self.encryption = Some(codec);
    }

    /// On-disk footprint of one page, including the IV prefix when
    /// encryption is enabled. Callers walking the log sequentially (restore
    /// on reopen) step by this amount, not by `PAGE_SIZE`.
    pub fn physical_page_size(&self) -> u64 {
        if self.encryption.is_some() {
            ENCRYPTED_PAGE_SIZE as u64
        } else {
            PAGE_SIZE as u64
        }
    }

    pub fn data_page_count(&self) -> u32 {
        self.data_page_count
    }

    fn decode_page(&self, page_id: PageId, raw: Vec<u8>) -> Result<Page> {
        let bytes: [u8; PAGE_SIZE] = match (&self.encryption, page_id.0) {
            (Some(codec), id) if id != 0 => codec.decrypt_page(&raw)?,
            _ => raw.try_into().map_err(|_| {
                Error::DatabaseCorrupted("short page read".to_string())
            })?,
        };

        let mut page = Page::new();
        page.as_mut_slice().copy_from_slice(&bytes);
        if !page.verify_checksum() {
            return Err(Error::DatabaseCorrupted(format!(
                "checksum mismatch on page {}",
                page_id.0
            )));
        }
        Ok(page)
    }

    fn encode_page(&self, page_id: PageId, page: &Page) -> Vec<u8> {
        match (&self.encryption, page_id.0) {
            (Some(codec), id) if id != 0 => {
                let bytes: [u8; PAGE_SIZE] = page.as_slice().try_into().unwrap();
                codec.encrypt_page(&bytes).to_vec()
            }
            _ => page.as_slice().to_vec(),
        }
    }

    /// Read a page from either the data file or a known log position.
    pub fn read_page(&mut self, page_id: PageId, origin: PageOrigin) -> Result<Page> {
        let physical_size = self.physical_page_size() as usize;
        let mut raw = vec![0u8; physical_size];

        match origin {
            PageOrigin::Data => {
                if page_id.0 >= self.data_page_count {
                    return Err(Error::PageNotFound(page_id.0));
                }
                let offset = page_id.0 as u64 * self.physical_page_size();
                self.data.seek(SeekFrom::Start(offset))?;
                self.data.read_exact(&mut raw)?;
            }
            PageOrigin::Log(position) => {
                self.log.seek(SeekFrom::Start(position))?;
                self.log.read_exact(&mut raw)?;
            }
        }

        self.decode_page(page_id, raw)
    }

    /// Append one page to the log, returning its absolute byte position.
    pub fn append_log_page(&mut self, page_id: PageId, page: &Page) -> Result<u64> {
        let position = self.log_len;
        let bytes = self.encode_page(page_id, page);
        self.log.seek(SeekFrom::End(0))?;
        self.log.write_all(&bytes)?;
        self.log.sync_all()?;
        self.log_len += bytes.len() as u64;
        Ok(position)
    }

    /// Append several pages to the log in one pass, returning each page's
    /// starting position in the same order. Used on commit, so a group of
    /// dirty pages plus the trailing confirm page land contiguously.
    pub fn append_log_pages(&mut self, pages: &[(PageId, &Page)]) -> Result<Vec<u64>> {
        let mut positions = Vec::with_capacity(pages.len());
        self.log.seek(SeekFrom::End(0))?;
        for (page_id, page) in pages {
            positions.push(self.log_len);
            let bytes = self.encode_page(*page_id, page);
            self.log.write_all(&bytes)?;
            self.log_len += bytes.len() as u64;
        }
        self.log.sync_all()?;
        Ok(positions)
    }

    /// Write a page directly into the data file at its own `page_id`,
    /// extending the file with zeroed pages if necessary. Used by
    /// checkpoint to move confirmed log pages into the data file.
    pub fn write_data_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        while self.data_page_count <= page_id.0 {
            let offset = self.data_page_count as u64 * self.physical_page_size();
            self.data.seek(SeekFrom::Start(offset))?;
            self.data.write_all(&vec![0u8; self.physical_page_size() as usize])?;
            self.data_page_count += 1;
        }

        let offset = page_id.0 as u64 * self.physical_page_size();
        self.data.seek(SeekFrom::Start(offset))?;
        let bytes = self.encode_page(page_id, page);
        self.data.write_all(&bytes)?;
        Ok(())
    }

    /// Flush the data file and truncate the log to empty. Call after every
    /// page a checkpoint is moving has already been written via
    /// `write_data_page`.
    pub fn finish_checkpoint(&mut self) -> Result<()> {
        self.data.sync_all()?;
        self.log.set_len(0)?;
        self.log.seek(SeekFrom::Start(0))?;
        self.log_len = 0;
        Ok(())
    }

    pub fn log_len(&self) -> u64 {
        self.log_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{PageHeader, PageType};
    use tempfile::tempdir;

    fn page_with_marker(page_id: u32, marker: u8) -> Page {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Data, page_id));
        page.as_mut_slice()[100] = marker;
        page.update_checksum();
        page
    }

    #[test]
    fn test_log_append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut disk = DiskService::create(&path).unwrap();

        let page = page_with_marker(1, 0xAB);
        let pos = disk.append_log_page(PageId::new(1), &page).unwrap();

        let back = disk.read_page(PageId::new(1), PageOrigin::Log(pos)).unwrap();
        assert_eq!(back.as_slice()[100], 0xAB);
    }

    #[test]
    fn test_checkpoint_moves_page_into_data_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut disk = DiskService::create(&path).unwrap();

        let page = page_with_marker(3, 0xCD);
        disk.write_data_page(PageId::new(3), &page).unwrap();
        disk.finish_checkpoint().unwrap();

        assert_eq!(disk.log_len(), 0);
        let back = disk.read_page(PageId::new(3), PageOrigin::Data).unwrap();
        assert_eq!(back.as_slice()[100], 0xCD);
    }

    #[test]
    fn test_read_missing_data_page_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut disk = DiskService::create(&path).unwrap();
        assert!(disk.read_page(PageId::new(0), PageOrigin::Data).is_err());
    }

    #[test]
    fn test_corrupted_checksum_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut disk = DiskService::create(&path).unwrap();

        let mut page = page_with_marker(0, 0x11);
        // Corrupt after the checksum was computed.
        page.as_mut_slice()[200] = 0xFF;
        disk.write_data_page(PageId::new(0), &page).unwrap();

        let err = disk.read_page(PageId::new(0), PageOrigin::Data).unwrap_err();
        assert!(matches!(err, Error::DatabaseCorrupted(_)));
    }

    #[test]
    fn test_encrypted_roundtrip_via_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut disk = DiskService::create(&path).unwrap();
        disk.set_encryption(AesCbcCodec::derive("pw", &[3u8; 16]));

        let page = page_with_marker(2, 0x77);
        let pos = disk.append_log_page(PageId::new(2), &page).unwrap();

        let back = disk.read_page(PageId::new(2), PageOrigin::Log(pos)).unwrap();
        assert_eq!(back.as_slice()[100], 0x77);
    }
}
