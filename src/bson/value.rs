//! `BsonValue` — the tagged-union value model shared by documents, index
//! keys, and sort keys. Every value implements a total order under a
//! configurable `Collation`.

use super::decimal::Decimal128;
use super::document::BsonDocument;
use super::guid::Guid;
use super::object_id::ObjectId;
use crate::common::Collation;
use std::cmp::Ordering;
use std::fmt;

/// Discriminator for `BsonValue`, used for `$type` queries and schema
/// introspection. Field order here is cosmetic; ordering between values
/// is decided by `type_rank`, not by this enum's discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BsonType {
    MinValue,
    Null,
    Int32,
    Int64,
    Double,
    Decimal,
    String,
    Document,
    Array,
    Binary,
    ObjectId,
    Guid,
    Boolean,
    DateTime,
    Vector,
    MaxValue,
}

/// A single value in the document model. Cheap to clone for scalars;
/// `Document`/`Array`/`String`/`Binary`/`Vector` clone their backing heap
/// allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    MinValue,
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal128),
    String(String),
    Document(BsonDocument),
    Array(Vec<BsonValue>),
    Binary(Vec<u8>),
    ObjectId(ObjectId),
    Guid(Guid),
    Boolean(bool),
    /// UTC ticks: 100-nanosecond intervals since `0001-01-01T00:00:00Z`,
    /// matching the .NET `DateTime.Ticks` convention the file format uses.
    DateTime(i64),
    /// Fixed-length float array for nearest-neighbor indexing.
    Vector(Vec<f32>),
    MaxValue,
}

impl BsonValue {
    pub fn bson_type(&self) -> BsonType {
        match self {
            BsonValue::MinValue => BsonType::MinValue,
            BsonValue::Null => BsonType::Null,
            BsonValue::Int32(_) => BsonType::Int32,
            BsonValue::Int64(_) => BsonType::Int64,
            BsonValue::Double(_) => BsonType::Double,
            BsonValue::Decimal(_) => BsonType::Decimal,
            BsonValue::String(_) => BsonType::String,
            BsonValue::Document(_) => BsonType::Document,
            BsonValue::Array(_) => BsonType::Array,
            BsonValue::Binary(_) => BsonType::Binary,
            BsonValue::ObjectId(_) => BsonType::ObjectId,
            BsonValue::Guid(_) => BsonType::Guid,
            BsonValue::Boolean(_) => BsonType::Boolean,
            BsonValue::DateTime(_) => BsonType::DateTime,
            BsonValue::Vector(_) => BsonType::Vector,
            BsonValue::MaxValue => BsonType::MaxValue,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            BsonValue::Int32(_) | BsonValue::Int64(_) | BsonValue::Double(_) | BsonValue::Decimal(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BsonValue::Int32(v) => Some(*v as f64),
            BsonValue::Int64(v) => Some(*v as f64),
            BsonValue::Double(v) => Some(*v),
            BsonValue::Decimal(v) => Some(v.to_f64()),
            _ => None,
        }
    }

    /// Relative rank used to order values of different `BsonType`s.
    /// `MinValue`/`MaxValue` are handled as sentinels outside this table in
    /// `compare`, so their position here is unused.
    fn type_rank(&self) -> u8 {
        match self.bson_type() {
            BsonType::Null => 0,
            BsonType::Int32 | BsonType::Int64 | BsonType::Double | BsonType::Decimal => 1,
            BsonType::String => 2,
            BsonType::Document => 3,
            BsonType::Array => 4,
            BsonType::Binary => 5,
            BsonType::Vector => 5, // compares alongside Binary: both opaque byte-ish payloads
            BsonType::ObjectId => 6,
            BsonType::Guid => 7,
            BsonType::DateTime => 8,
            BsonType::Boolean => 9,
            BsonType::MinValue | BsonType::MaxValue => unreachable!("handled as sentinels"),
        }
    }

    /// Total order used by index keys and sorts.
    pub fn compare(&self, other: &Self, collation: &Collation) -> Ordering {
        match (self, other) {
            (BsonValue::MinValue, BsonValue::MinValue) => Ordering::Equal,
            (BsonValue::MinValue, _) => Ordering::Less,
            (_, BsonValue::MinValue) => Ordering::Greater,
            (BsonValue::MaxValue, BsonValue::MaxValue) => Ordering::Equal,
            (BsonValue::MaxValue, _) => Ordering::Greater,
            (_, BsonValue::MaxValue) => Ordering::Less,
            _ => {
                if self.is_number() && other.is_number() {
                    return numeric_compare(self, other);
                }
                let (ra, rb) = (self.type_rank(), other.type_rank());
                if ra != rb {
                    return ra.cmp(&rb);
                }
                same_type_compare(self, other, collation)
            }
        }
    }
}

fn numeric_compare(a: &BsonValue, b: &BsonValue) -> Ordering {
    if let (BsonValue::Decimal(x), BsonValue::Decimal(y)) = (a, b) {
        return x.cmp(y);
    }
    a.as_f64()
        .unwrap()
        .partial_cmp(&b.as_f64().unwrap())
        .unwrap_or(Ordering::Equal)
}

fn same_type_compare(a: &BsonValue, b: &BsonValue, collation: &Collation) -> Ordering {
    match (a, b) {
        (BsonValue::Null, BsonValue::Null) => Ordering::Equal,
        (BsonValue::String(x), BsonValue::String(y)) => collation.compare_str(x, y),
        (BsonValue::Document(x), BsonValue::Document(y)) => x.compare(y, collation),
        (BsonValue::Array(x), BsonValue::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let c = xi.compare(yi, collation);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        (BsonValue::Binary(x), BsonValue::Vector(_)) => {
            let _ = x;
            Ordering::Less // arbitrary but stable: Binary sorts before Vector within shared rank
        }
        (BsonValue::Vector(_), BsonValue::Binary(_)) => Ordering::Greater,
        (BsonValue::Binary(x), BsonValue::Binary(y)) => x.cmp(y),
        (BsonValue::Vector(x), BsonValue::Vector(y)) => x
            .iter()
            .zip(y.iter())
            .find_map(|(xi, yi)| xi.partial_cmp(yi).filter(|o| *o != Ordering::Equal))
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (BsonValue::ObjectId(x), BsonValue::ObjectId(y)) => x.cmp(y),
        (BsonValue::Guid(x), BsonValue::Guid(y)) => x.cmp(y),
        (BsonValue::DateTime(x), BsonValue::DateTime(y)) => x.cmp(y),
        (BsonValue::Boolean(x), BsonValue::Boolean(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl fmt::Display for BsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BsonValue::MinValue => write!(f, "MinValue"),
            BsonValue::MaxValue => write!(f, "MaxValue"),
            BsonValue::Null => write!(f, "null"),
            BsonValue::Int32(v) => write!(f, "{}", v),
            BsonValue::Int64(v) => write!(f, "{}", v),
            BsonValue::Double(v) => write!(f, "{}", v),
            BsonValue::Decimal(v) => write!(f, "{}", v),
            BsonValue::String(v) => write!(f, "{:?}", v),
            BsonValue::Document(v) => write!(f, "{:?}", v),
            BsonValue::Array(v) => write!(f, "{:?}", v),
            BsonValue::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
            BsonValue::ObjectId(v) => write!(f, "{}", v),
            BsonValue::Guid(v) => write!(f, "{}", v),
            BsonValue::Boolean(v) => write!(f, "{}", v),
            BsonValue::DateTime(v) => write!(f, "DateTime({})", v),
            BsonValue::Vector(v) => write!(f, "Vector({} dims)", v.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CaseSensitivity;

    fn cmp(a: BsonValue, b: BsonValue) -> Ordering {
        a.compare(&b, &Collation::Binary)
    }

    #[test]
    fn test_sentinels_bound_everything() {
        assert_eq!(cmp(BsonValue::MinValue, BsonValue::Null), Ordering::Less);
        assert_eq!(cmp(BsonValue::MaxValue, BsonValue::Boolean(true)), Ordering::Greater);
        assert_eq!(cmp(BsonValue::MinValue, BsonValue::MaxValue), Ordering::Less);
    }

    #[test]
    fn test_type_rank_order() {
        assert_eq!(cmp(BsonValue::Null, BsonValue::Int32(0)), Ordering::Less);
        assert_eq!(cmp(BsonValue::Int32(100), BsonValue::String("a".into())), Ordering::Less);
        assert_eq!(
            cmp(BsonValue::String("z".into()), BsonValue::Document(BsonDocument::new())),
            Ordering::Less
        );
        assert_eq!(cmp(BsonValue::DateTime(0), BsonValue::Boolean(false)), Ordering::Less);
    }

    #[test]
    fn test_numeric_cross_type_compare() {
        assert_eq!(cmp(BsonValue::Int32(2), BsonValue::Double(2.0)), Ordering::Equal);
        assert_eq!(cmp(BsonValue::Int64(3), BsonValue::Double(2.5)), Ordering::Greater);
    }

    #[test]
    fn test_locale_collation_on_strings() {
        let a = BsonValue::String("CAFE".into());
        let b = BsonValue::String("café".into());
        let collation = Collation::Locale(CaseSensitivity::IgnoreCaseAndAccents);
        assert_eq!(a.compare(&b, &collation), Ordering::Equal);
    }

    #[test]
    fn test_array_lexicographic_compare() {
        let a = BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(2)]);
        let b = BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(3)]);
        assert_eq!(cmp(a, b), Ordering::Less);
    }
}
