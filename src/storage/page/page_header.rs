//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - [`PageType`] discriminator
//! - Page-chain links (`prev_page_id`/`next_page_id`) for extend chains
//! - Collection/transaction ownership for WAL resolution
//! - CRC32 checksum for integrity and LSN for WAL/recovery

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Page 0: file magic, pragmas, free-list and collection-list pointers.
    Header = 1,
    /// A collection's metadata page (name, index definitions, head pointer).
    Collection = 2,
    /// A skip-list index node page.
    Index = 3,
    /// A document data page.
    Data = 4,
    /// Overflow page for a document that doesn't fit in one data page.
    Extend = 5,
    /// Page on the free list, available for reuse.
    Empty = 6,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Header,
            2 => PageType::Collection,
            3 => PageType::Index,
            4 => PageType::Data,
            5 => PageType::Extend,
            6 => PageType::Empty,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (42 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     page_id (little-endian)
/// 5       4     prev_page_id
/// 9       4     next_page_id
/// 13      2     items_count
/// 15      2     free_bytes
/// 17      4     col_id
/// 21      4     transaction_id
/// 25      1     is_confirmed (bool as u8)
/// 26      4     col_free_data_page_list
/// 30      4     checksum (CRC32, little-endian)
/// 34      8     lsn (Log Sequence Number, little-endian)
/// ```
///
/// # Checksum
/// Computed over the entire page with the checksum field itself zeroed, so
/// verification needs no special-cased skip logic at the call site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub page_id: u32,
    pub prev_page_id: u32,
    pub next_page_id: u32,
    pub items_count: u16,
    pub free_bytes: u16,
    pub col_id: u32,
    pub transaction_id: u32,
    pub is_confirmed: bool,
    pub col_free_data_page_list: u32,
    pub checksum: u32,
    pub lsn: u64,
}

/// Sentinel `page_id`/`prev_page_id`/`next_page_id` meaning "no page".
pub const NO_PAGE: u32 = u32::MAX;

impl PageHeader {
    pub const SIZE: usize = 42;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_PAGE_ID: usize = 1;
    pub const OFFSET_PREV_PAGE_ID: usize = 5;
    pub const OFFSET_NEXT_PAGE_ID: usize = 9;
    pub const OFFSET_ITEMS_COUNT: usize = 13;
    pub const OFFSET_FREE_BYTES: usize = 15;
    pub const OFFSET_COL_ID: usize = 17;
    pub const OFFSET_TRANSACTION_ID: usize = 21;
    pub const OFFSET_IS_CONFIRMED: usize = 25;
    pub const OFFSET_COL_FREE_DATA_PAGE_LIST: usize = 26;
    pub const OFFSET_CHECKSUM: usize = 30;
    pub const OFFSET_LSN: usize = 34;

    /// Create a new header with the given page type and id. Every link
    /// field defaults to `NO_PAGE`; `free_bytes` defaults to the full body.
    pub fn new(page_type: PageType, page_id: u32) -> Self {
        use crate::common::config::PAGE_SIZE;
        Self {
            page_type,
            page_id,
            prev_page_id: NO_PAGE,
            next_page_id: NO_PAGE,
            items_count: 0,
            free_bytes: (PAGE_SIZE - Self::SIZE) as u16,
            col_id: NO_PAGE,
            transaction_id: 0,
            is_confirmed: false,
            col_free_data_page_list: NO_PAGE,
            checksum: 0,
            lsn: 0,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let u32_at = |off: usize| -> u32 {
            u32::from_le_bytes(data[off..off + 4].try_into().unwrap())
        };
        let u16_at = |off: usize| -> u16 {
            u16::from_le_bytes(data[off..off + 2].try_into().unwrap())
        };

        Self {
            page_type: PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]),
            page_id: u32_at(Self::OFFSET_PAGE_ID),
            prev_page_id: u32_at(Self::OFFSET_PREV_PAGE_ID),
            next_page_id: u32_at(Self::OFFSET_NEXT_PAGE_ID),
            items_count: u16_at(Self::OFFSET_ITEMS_COUNT),
            free_bytes: u16_at(Self::OFFSET_FREE_BYTES),
            col_id: u32_at(Self::OFFSET_COL_ID),
            transaction_id: u32_at(Self::OFFSET_TRANSACTION_ID),
            is_confirmed: data[Self::OFFSET_IS_CONFIRMED] != 0,
            col_free_data_page_list: u32_at(Self::OFFSET_COL_FREE_DATA_PAGE_LIST),
            checksum: u32_at(Self::OFFSET_CHECKSUM),
            lsn: u64::from_le_bytes(
                data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8].try_into().unwrap(),
            ),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]
            .copy_from_slice(&self.page_id.to_le_bytes());
        data[Self::OFFSET_PREV_PAGE_ID..Self::OFFSET_PREV_PAGE_ID + 4]
            .copy_from_slice(&self.prev_page_id.to_le_bytes());
        data[Self::OFFSET_NEXT_PAGE_ID..Self::OFFSET_NEXT_PAGE_ID + 4]
            .copy_from_slice(&self.next_page_id.to_le_bytes());
        data[Self::OFFSET_ITEMS_COUNT..Self::OFFSET_ITEMS_COUNT + 2]
            .copy_from_slice(&self.items_count.to_le_bytes());
        data[Self::OFFSET_FREE_BYTES..Self::OFFSET_FREE_BYTES + 2]
            .copy_from_slice(&self.free_bytes.to_le_bytes());
        data[Self::OFFSET_COL_ID..Self::OFFSET_COL_ID + 4]
            .copy_from_slice(&self.col_id.to_le_bytes());
        data[Self::OFFSET_TRANSACTION_ID..Self::OFFSET_TRANSACTION_ID + 4]
            .copy_from_slice(&self.transaction_id.to_le_bytes());
        data[Self::OFFSET_IS_CONFIRMED] = self.is_confirmed as u8;
        data[Self::OFFSET_COL_FREE_DATA_PAGE_LIST..Self::OFFSET_COL_FREE_DATA_PAGE_LIST + 4]
            .copy_from_slice(&self.col_free_data_page_list.to_le_bytes());
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8].copy_from_slice(&self.lsn.to_le_bytes());
    }

    /// Compute CRC32 checksum of a page, with the checksum field zeroed.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::Header);
        assert_eq!(PageType::from_u8(4), PageType::Data);
        assert_eq!(PageType::from_u8(6), PageType::Empty);
        assert_eq!(PageType::from_u8(255), PageType::Invalid);
    }

    #[test]
    fn test_page_header_new_defaults() {
        let header = PageHeader::new(PageType::Data, 5);
        assert_eq!(header.page_type, PageType::Data);
        assert_eq!(header.page_id, 5);
        assert_eq!(header.prev_page_id, NO_PAGE);
        assert_eq!(header.next_page_id, NO_PAGE);
        assert_eq!(header.free_bytes, (PAGE_SIZE - PageHeader::SIZE) as u16);
    }

    #[test]
    fn test_page_header_roundtrip() {
        let original = PageHeader {
            page_type: PageType::Index,
            page_id: 7,
            prev_page_id: 3,
            next_page_id: 9,
            items_count: 12,
            free_bytes: 1000,
            col_id: 2,
            transaction_id: 0xDEAD,
            is_confirmed: true,
            col_free_data_page_list: NO_PAGE,
            checksum: 0xDEADBEEF,
            lsn: 0x123456789ABCDEF0,
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        original.write_to(&mut buffer);

        let recovered = PageHeader::from_bytes(&buffer);
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;
        let checksum1 = PageHeader::compute_checksum(&page_data);

        page_data[PageHeader::OFFSET_CHECKSUM] = 0xFF;
        page_data[PageHeader::OFFSET_CHECKSUM + 1] = 0xFF;
        let checksum2 = PageHeader::compute_checksum(&page_data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verify() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let mut header = PageHeader::new(PageType::Data, 0);
        header.checksum = PageHeader::compute_checksum(&page_data);
        assert!(header.verify_checksum(&page_data));

        page_data[100] = 0xFF;
        assert!(!header.verify_checksum(&page_data));
    }
}
