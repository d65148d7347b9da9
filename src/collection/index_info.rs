//! Per-collection index metadata plus the in-memory structure it backs.
//! Grounded on spec §4.4-§4.6: one collection can hold any mix of skip-list,
//! vector, and spatial indexes, each keyed by a dotted field path.

use crate::common::Collation;
use crate::index::spatial::{PointIndex, ShapeIndex};
use crate::index::vector::{Metric, VectorIndex};
use crate::index::SkipList;

/// Which structure `IndexInfo::structure` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    SkipList,
    Vector,
    SpatialPoint,
    SpatialShape,
}

/// The live index structure, already sized/typed for its kind.
pub enum IndexStructure {
    SkipList(SkipList),
    Vector(VectorIndex),
    SpatialPoint(PointIndex),
    SpatialShape(ShapeIndex),
}

/// Options passed to `ensure_index`; only the fields relevant to `kind`
/// are consulted.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub unique: bool,
    pub collation: Collation,
    pub kind: IndexKind,
    pub vector_dimensions: u16,
    pub vector_metric: Metric,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            unique: false,
            collation: Collation::Binary,
            kind: IndexKind::SkipList,
            vector_dimensions: 0,
            vector_metric: Metric::Euclidean,
        }
    }
}

/// One index defined on a collection.
pub struct IndexInfo {
    pub name: String,
    pub path: Vec<String>,
    pub unique: bool,
    pub structure: IndexStructure,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, path: Vec<String>, options: &IndexOptions) -> Self {
        let structure = match options.kind {
            IndexKind::SkipList => {
                IndexStructure::SkipList(SkipList::new(options.collation.clone(), options.unique))
            }
            IndexKind::Vector => {
                IndexStructure::Vector(VectorIndex::new(options.vector_dimensions, options.vector_metric))
            }
            IndexKind::SpatialPoint => IndexStructure::SpatialPoint(PointIndex::new()),
            IndexKind::SpatialShape => IndexStructure::SpatialShape(ShapeIndex::new()),
        };
        Self {
            name: name.into(),
            path,
            unique: options.unique,
            structure,
        }
    }
}
