//! Built-in functions callable from an `Expr::Call`. Aggregates operate on
//! an already-materialized `BsonValue::Array` argument (the planner is
//! responsible for feeding `Map`/`Filter` the per-item results before an
//! aggregate consumes them).

use crate::bson::BsonValue;
use crate::common::{Error, Result};
use crate::index::spatial::{haversine_distance_m, point_in_polygon};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Any,
    All,
    SpatialNear,
    SpatialWithin,
    SpatialWithinBox,
    SpatialIntersects,
    SpatialContains,
    Upper,
    Lower,
    Length,
}

fn as_array(v: &BsonValue) -> Result<&[BsonValue]> {
    match v {
        BsonValue::Array(items) => Ok(items),
        _ => Err(Error::InvalidCast("expected an array argument".into())),
    }
}

fn as_point(v: &BsonValue) -> Result<(f64, f64)> {
    match v {
        BsonValue::Array(items) if items.len() == 2 => {
            let lat = items[0].as_f64().ok_or_else(|| Error::InvalidCast("point lat must be numeric".into()))?;
            let lon = items[1].as_f64().ok_or_else(|| Error::InvalidCast("point lon must be numeric".into()))?;
            Ok((lat, lon))
        }
        _ => Err(Error::InvalidCast("expected a [lat, lon] point".into())),
    }
}

impl Function {
    pub fn apply(&self, args: &[BsonValue]) -> Result<BsonValue> {
        match self {
            Function::Count => Ok(BsonValue::Int32(as_array(&args[0])?.len() as i32)),
            Function::Sum => {
                let sum: f64 = as_array(&args[0])?.iter().filter_map(|v| v.as_f64()).sum();
                Ok(BsonValue::Double(sum))
            }
            Function::Avg => {
                let items = as_array(&args[0])?;
                let values: Vec<f64> = items.iter().filter_map(|v| v.as_f64()).collect();
                if values.is_empty() {
                    return Ok(BsonValue::Null);
                }
                Ok(BsonValue::Double(values.iter().sum::<f64>() / values.len() as f64))
            }
            Function::Min => as_array(&args[0])?
                .iter()
                .filter_map(|v| v.as_f64())
                .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
                .map(BsonValue::Double)
                .ok_or_else(|| Error::InvalidCast("Min of empty array".into())),
            Function::Max => as_array(&args[0])?
                .iter()
                .filter_map(|v| v.as_f64())
                .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
                .map(BsonValue::Double)
                .ok_or_else(|| Error::InvalidCast("Max of empty array".into())),
            Function::Any => Ok(BsonValue::Boolean(
                as_array(&args[0])?.iter().any(|v| matches!(v, BsonValue::Boolean(true))),
            )),
            Function::All => Ok(BsonValue::Boolean(
                as_array(&args[0])?.iter().all(|v| matches!(v, BsonValue::Boolean(true))),
            )),
            Function::SpatialNear => {
                let a = as_point(&args[0])?;
                let b = as_point(&args[1])?;
                Ok(BsonValue::Double(haversine_distance_m(a, b)))
            }
            Function::SpatialWithinBox => {
                let point = as_point(&args[0])?;
                let min = as_point(&args[1])?;
                let max = as_point(&args[2])?;
                let inside = point.0 >= min.0 && point.0 <= max.0 && point.1 >= min.1 && point.1 <= max.1;
                Ok(BsonValue::Boolean(inside))
            }
            Function::SpatialWithin | Function::SpatialContains => {
                let point = as_point(&args[0])?;
                let polygon_items = as_array(&args[1])?;
                let mut polygon = Vec::with_capacity(polygon_items.len());
                for item in polygon_items {
                    polygon.push(as_point(item)?);
                }
                Ok(BsonValue::Boolean(point_in_polygon(point, &polygon)))
            }
            Function::SpatialIntersects => {
                // Conservative approximation: two polygons intersect if any
                // vertex of one lies inside the other.
                let poly_a: Result<Vec<(f64, f64)>> = as_array(&args[0])?.iter().map(as_point).collect();
                let poly_b: Result<Vec<(f64, f64)>> = as_array(&args[1])?.iter().map(as_point).collect();
                let (poly_a, poly_b) = (poly_a?, poly_b?);
                let intersects = poly_a.iter().any(|p| point_in_polygon(*p, &poly_b))
                    || poly_b.iter().any(|p| point_in_polygon(*p, &poly_a));
                Ok(BsonValue::Boolean(intersects))
            }
            Function::Upper => match &args[0] {
                BsonValue::String(s) => Ok(BsonValue::String(s.to_uppercase())),
                _ => Err(Error::InvalidCast("Upper requires a string".into())),
            },
            Function::Lower => match &args[0] {
                BsonValue::String(s) => Ok(BsonValue::String(s.to_lowercase())),
                _ => Err(Error::InvalidCast("Lower requires a string".into())),
            },
            Function::Length => match &args[0] {
                BsonValue::String(s) => Ok(BsonValue::Int32(s.chars().count() as i32)),
                BsonValue::Array(items) => Ok(BsonValue::Int32(items.len() as i32)),
                BsonValue::Binary(b) => Ok(BsonValue::Int32(b.len() as i32)),
                _ => Err(Error::InvalidCast("Length requires a string, array, or binary".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count() {
        let args = [BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(2)])];
        assert_eq!(Function::Count.apply(&args).unwrap(), BsonValue::Int32(2));
    }

    #[test]
    fn test_avg_of_empty_is_null() {
        let args = [BsonValue::Array(vec![])];
        assert_eq!(Function::Avg.apply(&args).unwrap(), BsonValue::Null);
    }

    #[test]
    fn test_sum() {
        let args = [BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(2), BsonValue::Int32(3)])];
        assert_eq!(Function::Sum.apply(&args).unwrap(), BsonValue::Double(6.0));
    }

    #[test]
    fn test_spatial_within_box() {
        let args = [
            BsonValue::Array(vec![BsonValue::Double(5.0), BsonValue::Double(5.0)]),
            BsonValue::Array(vec![BsonValue::Double(0.0), BsonValue::Double(0.0)]),
            BsonValue::Array(vec![BsonValue::Double(10.0), BsonValue::Double(10.0)]),
        ];
        assert_eq!(Function::SpatialWithinBox.apply(&args).unwrap(), BsonValue::Boolean(true));
    }

    #[test]
    fn test_upper_lower() {
        let args = [BsonValue::String("Ada".into())];
        assert_eq!(Function::Upper.apply(&args).unwrap(), BsonValue::String("ADA".into()));
        assert_eq!(Function::Lower.apply(&args).unwrap(), BsonValue::String("ada".into()));
    }
}
