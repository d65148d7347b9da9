//! Encode `BsonValue`/`BsonDocument` into the on-disk canonical byte layout.

use super::document::BsonDocument;
use super::value::BsonValue;
use crate::common::Result;
use crate::io::{BufferSliceMut, BufferWriter};

/// Type tags written before each value's payload. Not MongoDB BSON's wire
/// tags: this format never leaves the engine, so the tag space is free to
/// fit Guid/Vector/sentinels alongside the usual scalars. `VECTOR` takes
/// `0x05` per the file format's canonical layout; `BINARY` moves off that
/// byte and carries a subtype byte in its payload instead, the way LiteDB's
/// own Binary values do.
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

/// Binary subtype byte, written after the length so a future subtype
/// (UUID, function, user-defined) can be added without a format break.
const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

/// Serialize a document to a freshly allocated byte vector.
pub fn to_vec(doc: &BsonDocument) -> Result<Vec<u8>> {
    let len = document_size(doc);
    let mut buf = vec![0u8; len];
    {
        let mut w = BufferWriter::new(BufferSliceMut::new(&mut buf));
        write_document(&mut w, doc)?;
    }
    Ok(buf)
}

fn write_document(w: &mut BufferWriter, doc: &BsonDocument) -> Result<()> {
    w.write_i32(document_size(doc) as i32)?;
    for (key, value) in doc.iter() {
        w.write_byte(type_tag(value))?;
        w.write_cstring(key)?;
        write_value(w, value)?;
    }
    w.write_byte(0)
}

fn write_array(w: &mut BufferWriter, items: &[BsonValue]) -> Result<()> {
    w.write_i32(array_size(items) as i32)?;
    for item in items {
        w.write_byte(type_tag(item))?;
        write_value(w, item)?;
    }
    w.write_byte(0)
}

fn write_value(w: &mut BufferWriter, value: &BsonValue) -> Result<()> {
    match value {
        BsonValue::MinValue | BsonValue::MaxValue | BsonValue::Null => Ok(()),
        BsonValue::Int32(v) => w.write_i32(*v),
        BsonValue::Int64(v) => w.write_i64(*v),
        BsonValue::Double(v) => w.write_f64(*v),
        BsonValue::Decimal(v) => w.write_array(&v.to_bytes()),
        BsonValue::String(v) => w.write_bson_string(v),
        BsonValue::Document(v) => write_document(w, v),
        BsonValue::Array(v) => write_array(w, v),
        BsonValue::Binary(v) => {
            w.write_i32(v.len() as i32)?;
            w.write_byte(BINARY_SUBTYPE_GENERIC)?;
            w.write_raw(v)
        }
        BsonValue::ObjectId(v) => w.write_array(&v.0),
        BsonValue::Guid(v) => w.write_array(&v.0),
        BsonValue::Boolean(v) => w.write_bool(*v),
        BsonValue::DateTime(v) => w.write_i64(*v),
        BsonValue::Vector(v) => {
            w.write_u16(v.len() as u16)?;
            for f in v {
                w.write_f32(*f)?;
            }
            Ok(())
        }
    }
}

fn type_tag(value: &BsonValue) -> u8 {
    match value {
        BsonValue::MinValue => tag::MIN_VALUE,
        BsonValue::Null => tag::NULL,
        BsonValue::Int32(_) => tag::INT32,
        BsonValue::Int64(_) => tag::INT64,
        BsonValue::Double(_) => tag::DOUBLE,
        BsonValue::Decimal(_) => tag::DECIMAL,
        BsonValue::String(_) => tag::STRING,
        BsonValue::Document(_) => tag::DOCUMENT,
        BsonValue::Array(_) => tag::ARRAY,
        BsonValue::Binary(_) => tag::BINARY,
        BsonValue::ObjectId(_) => tag::OBJECT_ID,
        BsonValue::Guid(_) => tag::GUID,
        BsonValue::Boolean(_) => tag::BOOLEAN,
        BsonValue::DateTime(_) => tag::DATE_TIME,
        BsonValue::Vector(_) => tag::VECTOR,
        BsonValue::MaxValue => tag::MAX_VALUE,
    }
}

fn value_size(value: &BsonValue) -> usize {
    match value {
        BsonValue::MinValue | BsonValue::MaxValue | BsonValue::Null => 0,
        BsonValue::Int32(_) => 4,
        BsonValue::Int64(_) => 8,
        BsonValue::Double(_) => 8,
        BsonValue::Decimal(_) => 16,
        BsonValue::String(v) => 4 + v.len() + 1,
        BsonValue::Document(v) => document_size(v),
        BsonValue::Array(v) => array_size(v),
        BsonValue::Binary(v) => 4 + 1 + v.len(),
        BsonValue::ObjectId(_) => 12,
        BsonValue::Guid(_) => 16,
        BsonValue::Boolean(_) => 1,
        BsonValue::DateTime(_) => 8,
        BsonValue::Vector(v) => 2 + v.len() * 4,
    }
}

fn document_size(doc: &BsonDocument) -> usize {
    let mut size = 4 + 1; // length prefix + terminator
    for (key, value) in doc.iter() {
        size += 1 + key.len() + 1; // tag + cstring key
        size += value_size(value);
    }
    size
}

fn array_size(items: &[BsonValue]) -> usize {
    let mut size = 4 + 1;
    for item in items {
        size += 1 + value_size(item);
    }
    size
}
