//! `BufferReader` — little-endian primitive reads over one or more
//! `BufferSlice`s, as if they were a single contiguous stream.
//!
//! Used both directly (page headers) and as the primitive layer underneath
//! `bson::de` (document/array/value decoding).

use super::pool::BufferPool;
use super::slice::BufferSlice;
use crate::common::{Error, Result};

/// Reads little-endian primitives and strings from one or more byte
/// segments, advancing a single logical position across all of them.
///
/// Scatter reads happen when a document's bytes span an extend-page chain:
/// each page contributes one segment, and a multi-byte primitive that
/// straddles a segment boundary is reassembled via a rented scratch buffer.
pub struct BufferReader<'a> {
    segments: Vec<BufferSlice<'a>>,
    /// Index of the segment the read head currently sits in.
    seg_index: usize,
    /// Offset within `segments[seg_index]`.
    seg_offset: usize,
    pool: Option<&'a BufferPool>,
}

impl<'a> BufferReader<'a> {
    /// Build a reader over a single contiguous slice.
    pub fn single(data: &'a [u8]) -> Self {
        Self {
            segments: vec![BufferSlice::new(data)],
            seg_index: 0,
            seg_offset: 0,
            pool: None,
        }
    }

    /// Build a reader over several discontiguous slices, read in order.
    pub fn scatter(segments: Vec<BufferSlice<'a>>) -> Self {
        Self {
            segments,
            seg_index: 0,
            seg_offset: 0,
            pool: None,
        }
    }

    /// Attach a buffer pool so cross-segment primitive reads can rent a
    /// scratch buffer instead of allocating one each time.
    pub fn with_pool(mut self, pool: &'a BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Absolute logical position across all segments.
    pub fn position(&self) -> usize {
        self.segments[..self.seg_index]
            .iter()
            .map(|s| s.len())
            .sum::<usize>()
            + self.seg_offset
    }

    /// Whether every segment has been fully consumed.
    pub fn is_eof(&self) -> bool {
        self.seg_index >= self.segments.len()
    }

    fn remaining_in_segment(&self) -> usize {
        if self.seg_index >= self.segments.len() {
            0
        } else {
            self.segments[self.seg_index].len() - self.seg_offset
        }
    }

    fn advance_segment(&mut self) {
        self.seg_index += 1;
        self.seg_offset = 0;
    }

    /// Read `len` bytes, copying across segment boundaries if necessary.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;

        while remaining > 0 {
            if self.seg_index >= self.segments.len() {
                return Err(Error::UnexpectedEndOfStream);
            }

            let avail = self.remaining_in_segment();
            if avail == 0 {
                self.advance_segment();
                continue;
            }

            let take = avail.min(remaining);
            let seg = self.segments[self.seg_index].as_bytes();
            out.extend_from_slice(&seg[self.seg_offset..self.seg_offset + take]);
            self.seg_offset += take;
            remaining -= take;

            if self.seg_offset == self.segments[self.seg_index].len() {
                self.advance_segment();
            }
        }

        Ok(out)
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.seg_index >= self.segments.len() || self.remaining_in_segment() == 0 {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(self.segments[self.seg_index].as_bytes()[self.seg_offset])
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    /// Read a fixed-length byte array (GUID, ObjectId, Decimal mantissa...).
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let b = self.read_bytes(N)?;
        b.try_into()
            .map_err(|_| Error::UnexpectedEndOfStream)
    }

    /// Read exactly `len` bytes as a (lossy) UTF-8 string.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a NUL-terminated string (classic C-string).
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut buf = self.pool.map(|p| p.rent(64)).unwrap_or_default();
        loop {
            let b = self.read_byte()?;
            if b == 0 {
                break;
            }
            buf.push(b);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read a BSON-canonical string: `i32` length (including the trailing
    /// NUL) followed by that many bytes, the last of which is the NUL.
    pub fn read_bson_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len < 1 {
            return Err(Error::UnexpectedEndOfStream);
        }
        let body = self.read_bytes(len as usize - 1)?;
        let _nul = self.read_byte()?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
