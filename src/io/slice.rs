//! Page-aligned buffer slices: offset+length views over a byte array.

/// A read-only view over a contiguous range of bytes, usually a page or a
/// span of the scratch region used by the sort service.
#[derive(Debug, Clone, Copy)]
pub struct BufferSlice<'a> {
    data: &'a [u8],
}

impl<'a> BufferSlice<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// A mutable view over a contiguous range of bytes.
pub struct BufferSliceMut<'a> {
    data: &'a mut [u8],
}

impl<'a> BufferSliceMut<'a> {
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_slice_basics() {
        let data = [1u8, 2, 3, 4];
        let slice = BufferSlice::new(&data);
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_buffer_slice_mut() {
        let mut data = [0u8; 4];
        {
            let mut slice = BufferSliceMut::new(&mut data);
            slice.as_bytes_mut()[0] = 0xFF;
        }
        assert_eq!(data[0], 0xFF);
    }
}
