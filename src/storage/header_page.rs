//! Page 0: file magic, creation metadata, pragmas, and the free-list and
//! collection-list pointers every other page is reached from.

use crate::common::config::{DEFAULT_CHECKPOINT_PAGES, DEFAULT_TIMEOUT_SECONDS, ENCRYPTION_SALT_LEN};
use crate::common::{CaseSensitivity, Collation, Error, Result};
use crate::io::{BufferReader, BufferSliceMut, BufferWriter};

use super::page::Page;
use super::page_header::{PageHeader, PageType, NO_PAGE};

/// File-format magic, kept byte-for-byte compatible with the legacy format
/// so a v4 file can be recognized before the upgrade path rewrites it.
pub const MAGIC: &[u8; 27] = b"** This is a LiteDB file **";

pub const FILE_VERSION_V4: u8 = 4;
pub const FILE_VERSION_V5: u8 = 5;

/// Persistent engine settings stored in the header page's pragma block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pragmas {
    pub user_version: i32,
    pub collation: Collation,
    pub timeout_seconds: u32,
    pub utc_date: bool,
    pub checkpoint_pages: u32,
    pub limit_size: u64,
}

impl Default for Pragmas {
    fn default() -> Self {
        Self {
            user_version: 0,
            collation: Collation::Binary,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            utc_date: true,
            checkpoint_pages: DEFAULT_CHECKPOINT_PAGES,
            limit_size: u64::MAX,
        }
    }
}

fn collation_tag(c: &Collation) -> u8 {
    match c {
        Collation::Binary => 0,
        Collation::Locale(CaseSensitivity::Exact) => 1,
        Collation::Locale(CaseSensitivity::IgnoreCase) => 2,
        Collation::Locale(CaseSensitivity::IgnoreCaseAndAccents) => 3,
    }
}

fn collation_from_tag(tag: u8) -> Collation {
    match tag {
        1 => Collation::Locale(CaseSensitivity::Exact),
        2 => Collation::Locale(CaseSensitivity::IgnoreCase),
        3 => Collation::Locale(CaseSensitivity::IgnoreCaseAndAccents),
        _ => Collation::Binary,
    }
}

/// Parsed content of page 0.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPage {
    pub file_version: u8,
    /// UTC ticks (100ns intervals since `0001-01-01`) the file was created.
    pub creation_time: i64,
    pub salt: [u8; ENCRYPTION_SALT_LEN],
    pub pragmas: Pragmas,
    /// Head of the free/empty page list, or `NO_PAGE`.
    pub free_empty_page_list: u32,
    /// Highest allocated page id; the next allocation extends the file.
    pub last_page_id: u32,
    /// Collection name → collection page id, insertion order preserved.
    pub collections: Vec<(String, u32)>,
}

impl Default for HeaderPage {
    fn default() -> Self {
        Self {
            file_version: FILE_VERSION_V5,
            creation_time: 0,
            salt: [0u8; ENCRYPTION_SALT_LEN],
            pragmas: Pragmas::default(),
            free_empty_page_list: NO_PAGE,
            last_page_id: 0,
            collections: Vec::new(),
        }
    }
}

impl HeaderPage {
    pub fn collection_page_id(&self, name: &str) -> Option<u32> {
        self.collections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    pub fn add_collection(&mut self, name: impl Into<String>, page_id: u32) {
        self.collections.push((name.into(), page_id));
    }

    pub fn remove_collection(&mut self, name: &str) {
        self.collections.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Serialize into page 0's header + body.
    pub fn write_to_page(&self, page: &mut Page) -> Result<()> {
        let header = PageHeader::new(PageType::Header, 0);
        page.set_header(&header);

        {
            let mut w = BufferWriter::new(BufferSliceMut::new(page.body_mut()));
            w.write_raw(MAGIC)?;
            w.write_byte(self.file_version)?;
            w.write_i64(self.creation_time)?;
            w.write_array(&self.salt)?;
            w.write_i32(self.pragmas.user_version)?;
            w.write_byte(collation_tag(&self.pragmas.collation))?;
            w.write_u32(self.pragmas.timeout_seconds)?;
            w.write_bool(self.pragmas.utc_date)?;
            w.write_u32(self.pragmas.checkpoint_pages)?;
            w.write_u64(self.pragmas.limit_size)?;
            w.write_u32(self.free_empty_page_list)?;
            w.write_u32(self.last_page_id)?;
            w.write_u16(self.collections.len() as u16)?;
            for (name, page_id) in &self.collections {
                w.write_cstring(name)?;
                w.write_u32(*page_id)?;
            }
        }

        page.update_checksum();
        Ok(())
    }

    /// Parse page 0. Fails with `Error::DatabaseCorrupted` if the magic
    /// doesn't match or the checksum is invalid.
    pub fn read_from_page(page: &Page) -> Result<Self> {
        if !page.verify_checksum() {
            return Err(Error::DatabaseCorrupted("header page checksum mismatch".into()));
        }

        let mut r = BufferReader::single(page.body());
        let magic_bytes = r.read_bytes(MAGIC.len())?;
        if magic_bytes != MAGIC {
            return Err(Error::DatabaseCorrupted("bad file magic".into()));
        }

        let file_version = r.read_byte()?;
        let creation_time = r.read_i64()?;
        let salt = r.read_array::<ENCRYPTION_SALT_LEN>()?;
        let user_version = r.read_i32()?;
        let collation = collation_from_tag(r.read_byte()?);
        let timeout_seconds = r.read_u32()?;
        let utc_date = r.read_bool()?;
        let checkpoint_pages = r.read_u32()?;
        let limit_size = r.read_u64()?;
        let free_empty_page_list = r.read_u32()?;
        let last_page_id = r.read_u32()?;
        let collection_count = r.read_u16()?;

        let mut collections = Vec::with_capacity(collection_count as usize);
        for _ in 0..collection_count {
            let name = r.read_cstring()?;
            let page_id = r.read_u32()?;
            collections.push((name, page_id));
        }

        Ok(Self {
            file_version,
            creation_time,
            salt,
            pragmas: Pragmas {
                user_version,
                collation,
                timeout_seconds,
                utc_date,
                checkpoint_pages,
                limit_size,
            },
            free_empty_page_list,
            last_page_id,
            collections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_empty_header() {
        let header = HeaderPage::default();
        let mut page = Page::new();
        header.write_to_page(&mut page).unwrap();

        let back = HeaderPage::read_from_page(&page).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_roundtrip_with_collections_and_pragmas() {
        let mut header = HeaderPage {
            creation_time: 123456789,
            ..Default::default()
        };
        header.pragmas.user_version = 7;
        header.pragmas.collation = Collation::Locale(CaseSensitivity::IgnoreCase);
        header.add_collection("items", 1);
        header.add_collection("orders", 5);

        let mut page = Page::new();
        header.write_to_page(&mut page).unwrap();

        let back = HeaderPage::read_from_page(&page).unwrap();
        assert_eq!(back.collection_page_id("ITEMS"), Some(1));
        assert_eq!(back.collection_page_id("orders"), Some(5));
        assert_eq!(back.pragmas.user_version, 7);
        assert_eq!(back.pragmas.collation, Collation::Locale(CaseSensitivity::IgnoreCase));
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let mut page = Page::new();
        HeaderPage::default().write_to_page(&mut page).unwrap();
        page.as_mut_slice()[PageHeader::SIZE] = 0x00;
        page.update_checksum();

        let err = HeaderPage::read_from_page(&page).unwrap_err();
        assert!(matches!(err, Error::DatabaseCorrupted(_)));
    }

    #[test]
    fn test_remove_collection() {
        let mut header = HeaderPage::default();
        header.add_collection("a", 1);
        header.add_collection("b", 2);
        header.remove_collection("a");
        assert_eq!(header.collection_page_id("a"), None);
        assert_eq!(header.collection_page_id("b"), Some(2));
    }
}
