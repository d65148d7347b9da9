//! Index structures: a collation-aware skip list, plus the vector and
//! spatial specializations.

pub mod skip_list;
pub mod spatial;
pub mod vector;

pub use skip_list::{IndexNode, SkipList};
