//! Morton-coded point index and MBB-pruned shape index. Per spec §3/§4.6.

use crate::bson::BsonValue;
use crate::common::{Collation, PageAddress};

use super::skip_list::SkipList;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Z-order (Morton) encoding over latitude/longitude, quantized to a
/// 32-bit grid per axis and interleaved into a `u64`.
pub struct Morton;

fn spread_bits(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000FFFF0000FFFF;
    x = (x | (x << 8)) & 0x00FF00FF00FF00FF;
    x = (x | (x << 4)) & 0x0F0F0F0F0F0F0F0F;
    x = (x | (x << 2)) & 0x3333333333333333;
    x = (x | (x << 1)) & 0x5555555555555555;
    x
}

fn quantize(value: f64, min: f64, max: f64) -> u32 {
    let clamped = value.clamp(min, max);
    let ratio = (clamped - min) / (max - min);
    (ratio * u32::MAX as f64) as u32
}

fn dequantize(code: u32, min: f64, max: f64) -> f64 {
    min + (code as f64 / u32::MAX as f64) * (max - min)
}

impl Morton {
    pub fn encode(lat: f64, lon: f64) -> u64 {
        let x = spread_bits(quantize(lat, -90.0, 90.0));
        let y = spread_bits(quantize(lon, -180.0, 180.0));
        x | (y << 1)
    }

    pub fn decode(code: u64) -> (f64, f64) {
        let lat_code = unspread_bits(code);
        let lon_code = unspread_bits(code >> 1);
        (
            dequantize(lat_code, -90.0, 90.0),
            dequantize(lon_code, -180.0, 180.0),
        )
    }
}

fn unspread_bits(mut x: u64) -> u32 {
    x &= 0x5555555555555555;
    x = (x | (x >> 1)) & 0x3333333333333333;
    x = (x | (x >> 2)) & 0x0F0F0F0F0F0F0F0F;
    x = (x | (x >> 4)) & 0x00FF00FF00FF00FF;
    x = (x | (x >> 8)) & 0x0000FFFF0000FFFF;
    x = (x | (x >> 16)) & 0x00000000FFFFFFFF;
    x as u32
}

/// Great-circle distance in meters (haversine).
pub fn haversine_distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// A skip list keyed by Morton code, for point data.
pub struct PointIndex {
    list: SkipList,
}

impl PointIndex {
    pub fn new() -> Self {
        Self {
            list: SkipList::new(Collation::Binary, false),
        }
    }

    pub fn insert(&mut self, point: (f64, f64), data: PageAddress, rng: &mut impl rand::Rng) {
        let code = Morton::encode(point.0, point.1);
        self.list
            .insert(BsonValue::Int64(code as i64), data, rng)
            .expect("morton code never exceeds MAX_INDEX_KEY_LENGTH");
    }

    /// Remove the entry for `point`/`data`, leaving any other point that
    /// happens to share the same Morton code untouched.
    pub fn remove(&mut self, point: (f64, f64), data: PageAddress) -> bool {
        let code = Morton::encode(point.0, point.1);
        self.list.delete_address(&BsonValue::Int64(code as i64), data)
    }

    /// Every point whose bounding Morton range `[min_code, max_code]`
    /// overlaps the query box; callers confirm with an exact predicate
    /// since the Z-order range over-approximates the box.
    pub fn range_query(&self, min_code: u64, max_code: u64) -> Vec<PageAddress> {
        self.list
            .range(
                &BsonValue::Int64(min_code as i64),
                &BsonValue::Int64(max_code as i64),
                (true, true),
            )
            .into_iter()
            .map(|n| n.data)
            .collect()
    }
}

impl Default for PointIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// One shape's minimum bounding box, `[min_lat, min_lon, max_lat, max_lon]`.
pub type Mbb = [f64; 4];

struct ShapeEntry {
    data: PageAddress,
    centroid_code: u64,
    mbb: Mbb,
}

/// Stores a shape's centroid Morton code and MBB; queries prune by MBB
/// overlap before any exact geometric test runs.
pub struct ShapeIndex {
    entries: Vec<ShapeEntry>,
}

fn mbb_overlaps(a: &Mbb, b: &Mbb) -> bool {
    a[0] <= b[2] && b[0] <= a[2] && a[1] <= b[3] && b[1] <= a[3]
}

impl ShapeIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, data: PageAddress, centroid: (f64, f64), mbb: Mbb) {
        self.entries.push(ShapeEntry {
            data,
            centroid_code: Morton::encode(centroid.0, centroid.1),
            mbb,
        });
    }

    pub fn remove(&mut self, data: PageAddress) {
        self.entries.retain(|e| e.data != data);
    }

    /// MBB-pruned candidates overlapping `query_mbb`; not yet confirmed
    /// against the exact geometry.
    pub fn candidates(&self, query_mbb: &Mbb) -> Vec<PageAddress> {
        self.entries
            .iter()
            .filter(|e| mbb_overlaps(&e.mbb, query_mbb))
            .map(|e| e.data)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ShapeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-polygon via ray casting. `polygon` is a closed ring of
/// `(lat, lon)` vertices.
pub fn point_in_polygon(point: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if ((yi > point.1) != (yj > point.1))
            && (point.0 < (xj - xi) * (point.1 - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether two line segments (each a pair of `(lat, lon)` endpoints)
/// intersect.
pub fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);
    ((d1 > 0.0) != (d2 > 0.0)) && ((d3 > 0.0) != (d4 > 0.0))
}

/// Sutherland–Hodgman polygon clipping against a convex clip polygon, used
/// to verify containment against a clipped region rather than a bare
/// point.
pub fn clip_polygon(subject: &[(f64, f64)], clip: &[(f64, f64)]) -> Vec<(f64, f64)> {
    fn is_inside(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0) >= 0.0
    }
    fn intersection(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> (f64, f64) {
        let a1 = b.1 - a.1;
        let b1 = a.0 - b.0;
        let c1 = a1 * a.0 + b1 * a.1;
        let a2 = d.1 - c.1;
        let b2 = c.0 - d.0;
        let c2 = a2 * c.0 + b2 * c.1;
        let det = a1 * b2 - a2 * b1;
        if det.abs() < f64::EPSILON {
            return a;
        }
        ((b2 * c1 - b1 * c2) / det, (a1 * c2 - a2 * c1) / det)
    }

    let mut output = subject.to_vec();
    let n = clip.len();
    for i in 0..n {
        if output.is_empty() {
            break;
        }
        let clip_a = clip[i];
        let clip_b = clip[(i + 1) % n];
        let input = output;
        output = Vec::new();
        let m = input.len();
        for j in 0..m {
            let current = input[j];
            let prev = input[(j + m - 1) % m];
            let current_inside = is_inside(current, clip_a, clip_b);
            let prev_inside = is_inside(prev, clip_a, clip_b);
            if current_inside {
                if !prev_inside {
                    output.push(intersection(prev, current, clip_a, clip_b));
                }
                output.push(current);
            } else if prev_inside {
                output.push(intersection(prev, current, clip_a, clip_b));
            }
        }
    }
    output
}
