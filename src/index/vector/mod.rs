//! Flat vector index: linear-scan nearest-neighbor search over fixed-length
//! `f32` vectors. Per spec §4.5 — no approximation structure in v1.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::common::{Error, PageAddress, Result};

/// Distance/similarity metric used by a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Cosine,
    DotProduct,
}

impl Metric {
    /// Smaller is always "closer", regardless of metric: `DotProduct`
    /// negates the raw dot product so `TopKNear`'s comparator stays
    /// metric-agnostic, and a zero vector's cosine distance is defined as
    /// `1.0` (maximally dissimilar) rather than `NaN`.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Metric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
            Metric::DotProduct => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

struct Entry {
    data: PageAddress,
    vector: Vec<f32>,
}

/// Fixed-dimension vector store with brute-force nearest-neighbor queries.
pub struct VectorIndex {
    dimensions: u16,
    metric: Metric,
    entries: Vec<Entry>,
}

impl VectorIndex {
    pub fn new(dimensions: u16, metric: Metric) -> Self {
        Self {
            dimensions,
            metric,
            entries: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> u16 {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions as usize {
            return Err(Error::VectorDimensionMismatch {
                expected: self.dimensions,
                actual: vector.len() as u16,
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, data: PageAddress, vector: Vec<f32>) -> Result<()> {
        self.check_dimensions(&vector)?;
        self.entries.push(Entry { data, vector });
        Ok(())
    }

    pub fn remove(&mut self, data: PageAddress) {
        self.entries.retain(|e| e.data != data);
    }

    /// Every entry within `max_distance` of `target`, unordered.
    pub fn where_near(&self, target: &[f32], max_distance: f32) -> Result<Vec<PageAddress>> {
        self.check_dimensions(target)?;
        Ok(self
            .entries
            .iter()
            .filter(|e| self.metric.distance(&e.vector, target) <= max_distance)
            .map(|e| e.data)
            .collect())
    }

    /// The `k` nearest entries to `target`, ascending by distance, ties
    /// broken by `PageAddress` for determinism. Uses a capacity-`k` max-heap
    /// so memory stays `O(k)` regardless of collection size.
    pub fn top_k_near(&self, target: &[f32], k: usize) -> Result<Vec<(PageAddress, f32)>> {
        self.check_dimensions(target)?;

        #[derive(PartialEq)]
        struct HeapItem {
            distance: f32,
            data: PageAddress,
        }
        impl Eq for HeapItem {}
        impl PartialOrd for HeapItem {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for HeapItem {
            fn cmp(&self, other: &Self) -> Ordering {
                self.distance
                    .partial_cmp(&other.distance)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| self.data.cmp(&other.data))
            }
        }

        let mut heap: BinaryHeap<HeapItem> = BinaryHeap::with_capacity(k + 1);
        for entry in &self.entries {
            let distance = self.metric.distance(&entry.vector, target);
            heap.push(HeapItem { distance, data: entry.data });
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut out: Vec<(PageAddress, f32)> = heap.into_iter().map(|h| (h.data, h.distance)).collect();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;

    fn addr(n: u32) -> PageAddress {
        PageAddress::new(PageId::new(n), 0)
    }

    #[test]
    fn test_dimension_mismatch_on_insert() {
        let mut idx = VectorIndex::new(3, Metric::Euclidean);
        let err = idx.insert(addr(1), vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::VectorDimensionMismatch { .. }));
    }

    #[test]
    fn test_top_k_near_euclidean() {
        let mut idx = VectorIndex::new(2, Metric::Euclidean);
        idx.insert(addr(1), vec![0.0, 0.0]).unwrap();
        idx.insert(addr(2), vec![10.0, 0.0]).unwrap();
        idx.insert(addr(3), vec![1.0, 0.0]).unwrap();

        let top = idx.top_k_near(&[0.0, 0.0], 2).unwrap();
        assert_eq!(top[0].0, addr(1));
        assert_eq!(top[1].0, addr(3));
    }

    #[test]
    fn test_cosine_zero_vector_is_maximally_distant() {
        let metric = Metric::Cosine;
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_where_near_filters_by_radius() {
        let mut idx = VectorIndex::new(1, Metric::Euclidean);
        idx.insert(addr(1), vec![0.0]).unwrap();
        idx.insert(addr(2), vec![5.0]).unwrap();

        let near = idx.where_near(&[0.0], 1.0).unwrap();
        assert_eq!(near, vec![addr(1)]);
    }

    #[test]
    fn test_remove_drops_entry() {
        let mut idx = VectorIndex::new(1, Metric::Euclidean);
        idx.insert(addr(1), vec![0.0]).unwrap();
        idx.remove(addr(1));
        assert!(idx.is_empty());
    }
}
