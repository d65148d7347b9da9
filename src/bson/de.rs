//! Decode the on-disk canonical byte layout back into `BsonValue`s.

use super::decimal::Decimal128;
use super::document::BsonDocument;
use super::guid::Guid;
use super::object_id::ObjectId;
use super::value::BsonValue;
use crate::common::{Error, Result};
use crate::io::BufferReader;

mod tag {
    pub const MIN_VALUE: u8 = 0x00;
    pub const NULL: u8 = 0x0A;
    pub const INT32: u8 = 0x10;
    pub const INT64: u8 = 0x12;
    pub const DOUBLE: u8 = 0x01;
    pub const DECIMAL: u8 = 0x13;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const VECTOR: u8 = 0x05;
    pub const BINARY: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const GUID: u8 = 0x23;
    pub const BOOLEAN: u8 = 0x08;
    pub const DATE_TIME: u8 = 0x09;
    pub const MAX_VALUE: u8 = 0x7F;
}

/// Decode a document previously produced by `ser::to_vec`.
pub fn from_slice(data: &[u8]) -> Result<BsonDocument> {
    let mut r = BufferReader::single(data);
    read_document(&mut r)
}

fn read_document(r: &mut BufferReader) -> Result<BsonDocument> {
    let _len = r.read_i32()?;
    let mut doc = BsonDocument::new();
    loop {
        let t = r.read_byte()?;
        if t == 0 {
            break;
        }
        let key = r.read_cstring()?;
        let value = read_value(r, t)?;
        doc.set(key, value);
    }
    Ok(doc)
}

fn read_array(r: &mut BufferReader) -> Result<Vec<BsonValue>> {
    let _len = r.read_i32()?;
    let mut items = Vec::new();
    loop {
        let t = r.read_byte()?;
        if t == 0 {
            break;
        }
        items.push(read_value(r, t)?);
    }
    Ok(items)
}

fn read_value(r: &mut BufferReader, type_tag: u8) -> Result<BsonValue> {
    Ok(match type_tag {
        tag::MIN_VALUE => BsonValue::MinValue,
        tag::MAX_VALUE => BsonValue::MaxValue,
        tag::NULL => BsonValue::Null,
        tag::INT32 => BsonValue::Int32(r.read_i32()?),
        tag::INT64 => BsonValue::Int64(r.read_i64()?),
        tag::DOUBLE => BsonValue::Double(r.read_f64()?),
        tag::DECIMAL => BsonValue::Decimal(Decimal128::from_bytes(r.read_array::<16>()?)),
        tag::STRING => BsonValue::String(r.read_bson_string()?),
        tag::DOCUMENT => BsonValue::Document(read_document(r)?),
        tag::ARRAY => BsonValue::Array(read_array(r)?),
        tag::BINARY => {
            let len = r.read_i32()?;
            if len < 0 {
                return Err(Error::DatabaseCorrupted("negative binary length".into()));
            }
            let _subtype = r.read_byte()?;
            BsonValue::Binary(r.read_bytes(len as usize)?)
        }
        tag::OBJECT_ID => BsonValue::ObjectId(ObjectId::from_bytes(r.read_array::<12>()?)),
        tag::GUID => BsonValue::Guid(Guid::from_bytes(r.read_array::<16>()?)),
        tag::BOOLEAN => BsonValue::Boolean(r.read_bool()?),
        tag::DATE_TIME => BsonValue::DateTime(r.read_i64()?),
        tag::VECTOR => {
            let dims = r.read_u16()? as usize;
            let mut values = Vec::with_capacity(dims);
            for _ in 0..dims {
                values.push(r.read_f32()?);
            }
            BsonValue::Vector(values)
        }
        other => return Err(Error::DatabaseCorrupted(format!("unknown BSON type tag {:#x}", other))),
    })
}

#[cfg(test)]
mod tests {
    use super::super::ser::to_vec;
    use super::*;

    #[test]
    fn test_unknown_tag_is_corruption_error() {
        let data = [4u8, 0, 0, 0, 0xEE, 0];
        let err = from_slice(&data).unwrap_err();
        assert!(matches!(err, Error::DatabaseCorrupted(_)));
    }

    #[test]
    fn test_empty_document_roundtrip() {
        let doc = BsonDocument::new();
        let bytes = to_vec(&doc).unwrap();
        let back = from_slice(&bytes).unwrap();
        assert!(back.is_empty());
    }
}
