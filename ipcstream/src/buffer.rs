use crate::consts::padding_len;
use crate::types::NativeType;
use bytes::{Bytes, BytesMut};
use std::ops::Deref;

/// An immutable, cheaply clonable byte region.
///
/// Buffers decoded from one message are ranges into that message's body:
/// slicing shares the underlying allocation, which stays alive as long as
/// any slice of it does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_slice_ref<T: NativeType>(values: &[T]) -> Self {
        let mut buf = Vec::with_capacity(values.len() * T::WIDTH);
        for value in values {
            value.extend_le(&mut buf);
        }
        Self::from(buf)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zero-copy view of `len` bytes starting at `offset`. Panics when the
    /// range is out of bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        Self {
            data: self.data.slice(offset..offset + len),
        }
    }

    /// Whether both buffers view the same bytes of the same allocation.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        self.data.as_ptr() == other.data.as_ptr() && self.len() == other.len()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for Buffer {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<&[u8]> for Buffer {
    fn from(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }
}

/// Append-only byte storage that freezes into a [`Buffer`].
#[derive(Debug, Default)]
pub struct MutableBuffer {
    data: BytesMut,
}

impl MutableBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn push<T: NativeType>(&mut self, value: T) {
        value.extend_le(&mut self.data);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn extend_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Zero fills up to the next multiple of 8 and returns the padding added.
    pub fn pad_to_alignment(&mut self) -> usize {
        let padding = padding_len(self.len());
        self.extend_zeros(padding);
        padding
    }

    pub fn freeze(self) -> Buffer {
        Buffer::from(self.data.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_shares_allocation() {
        let buf = Buffer::from(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let slice = buf.slice(2, 4);
        assert_eq!(slice.as_slice(), &[3, 4, 5, 6]);
        assert_eq!(slice.as_ptr(), buf.as_slice()[2..].as_ptr());
        assert!(slice.slice(1, 2).ptr_eq(&buf.slice(3, 2)));
        assert!(!slice.ptr_eq(&Buffer::from(&[3, 4, 5, 6][..])));
    }

    #[test]
    fn test_from_slice_ref() {
        let buf = Buffer::from_slice_ref(&[1_i32, -1]);
        #[rustfmt::skip]
        assert_eq!(buf.as_slice(), &[0x01, 0x00, 0x00, 0x00,
                                     0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_mutable_buffer_padding() {
        let mut buf = MutableBuffer::default();
        assert_eq!(buf.pad_to_alignment(), 0);
        buf.push(7_u16);
        buf.extend_from_slice(&[0xAB]);
        assert_eq!(buf.pad_to_alignment(), 5);
        assert_eq!(buf.pad_to_alignment(), 0);
        let frozen = buf.freeze();
        assert_eq!(frozen.as_slice(), &[0x07, 0x00, 0xAB, 0, 0, 0, 0, 0]);
    }
}
