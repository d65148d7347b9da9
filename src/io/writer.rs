//! `BufferWriter` — little-endian primitive writes into a `BufferSliceMut`.

use super::slice::BufferSliceMut;
use crate::common::{Error, Result};

/// Writes little-endian primitives and strings into a single mutable
/// buffer, advancing an internal cursor as it goes.
///
/// Unlike `BufferReader`, writes never scatter across pages: callers
/// allocate a contiguous scratch buffer for the whole document before
/// handing it off to the page-chain writer, which does the splitting.
pub struct BufferWriter<'a> {
    data: BufferSliceMut<'a>,
    pos: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(data: BufferSliceMut<'a>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let buf = self.data.as_bytes_mut();
        if self.pos + bytes.len() > buf.len() {
            return Err(Error::UnexpectedEndOfStream);
        }
        buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_byte(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_byte(v as u8)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_array<const N: usize>(&mut self, v: &[u8; N]) -> Result<()> {
        self.write_bytes(v)
    }

    /// Write raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)
    }

    /// Write a NUL-terminated string. Rejects embedded NULs: a cstring
    /// cannot represent them and silently truncating would corrupt data
    /// on read-back.
    pub fn write_cstring(&mut self, s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(Error::InvalidNullCharInString);
        }
        self.write_bytes(s.as_bytes())?;
        self.write_byte(0)
    }

    /// Write a BSON-canonical string: `i32` length (including the trailing
    /// NUL) followed by the bytes and a NUL terminator.
    pub fn write_bson_string(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        self.write_i32(bytes.len() as i32 + 1)?;
        self.write_bytes(bytes)?;
        self.write_byte(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_primitives_roundtrip() {
        let mut buf = [0u8; 16];
        {
            let mut w = BufferWriter::new(BufferSliceMut::new(&mut buf));
            w.write_i32(42).unwrap();
            w.write_u64(7).unwrap();
            w.write_bool(true).unwrap();
        }

        use super::super::reader::BufferReader;
        let mut r = BufferReader::single(&buf);
        assert_eq!(r.read_i32().unwrap(), 42);
        assert_eq!(r.read_u64().unwrap(), 7);
        assert!(r.read_bool().unwrap());
    }

    #[test]
    fn test_write_past_end_fails() {
        let mut buf = [0u8; 2];
        let mut w = BufferWriter::new(BufferSliceMut::new(&mut buf));
        assert!(w.write_i32(1).is_err());
    }

    #[test]
    fn test_cstring_rejects_embedded_nul() {
        let mut buf = [0u8; 16];
        let mut w = BufferWriter::new(BufferSliceMut::new(&mut buf));
        let err = w.write_cstring("ab\0cd").unwrap_err();
        assert!(matches!(err, Error::InvalidNullCharInString));
    }

    #[test]
    fn test_bson_string_roundtrip() {
        let mut buf = [0u8; 16];
        {
            let mut w = BufferWriter::new(BufferSliceMut::new(&mut buf));
            w.write_bson_string("hi").unwrap();
        }

        use super::super::reader::BufferReader;
        let mut r = BufferReader::single(&buf);
        assert_eq!(r.read_bson_string().unwrap(), "hi");
    }
}
