//! Document storage: a collection's data pages, its defined indexes, and
//! the insert/update/delete/ensure_index operations spec §4.7 describes.

mod data_page;
mod index_info;
mod service;

pub use index_info::{IndexInfo, IndexKind, IndexOptions, IndexStructure};
pub use service::CollectionService;
