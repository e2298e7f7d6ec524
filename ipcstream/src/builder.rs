//! Append-only builders for flat arrays.
//!
//! Nested arrays are assembled from finished children with
//! [`ArrayData::try_new`].

use crate::array::ArrayData;
use crate::bit_util;
use crate::buffer::{Buffer, MutableBuffer};
use crate::error::Result;
use crate::schema::DataType;
use crate::types::NativeType;
use std::convert::TryFrom;
use std::marker::PhantomData;

#[derive(Debug, Default)]
pub struct BitmapBuilder {
    buffer: MutableBuffer,
    len: usize,
    unset: usize,
}

impl BitmapBuilder {
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            buffer: MutableBuffer::with_capacity(bit_util::bytes_for(bits)),
            len: 0,
            unset: 0,
        }
    }

    pub fn append(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.buffer.extend_zeros(1);
        }
        if bit {
            bit_util::set_bit(self.buffer.as_mut_slice(), self.len);
        } else {
            self.unset += 1;
        }
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn unset_count(&self) -> usize {
        self.unset
    }

    pub fn finish(self) -> Buffer {
        self.buffer.freeze()
    }
}

/// Validity tracking shared by the typed builders: the bitmap is only
/// emitted when at least one null was appended.
#[derive(Debug, Default)]
struct NullTracker {
    bitmap: BitmapBuilder,
}

impl NullTracker {
    fn append(&mut self, valid: bool) {
        self.bitmap.append(valid);
    }

    fn len(&self) -> usize {
        self.bitmap.len()
    }

    fn null_count(&self) -> usize {
        self.bitmap.unset_count()
    }

    fn finish(self) -> (usize, Buffer) {
        match self.bitmap.unset_count() {
            0 => (0, Buffer::empty()),
            null_count => (null_count, self.bitmap.finish()),
        }
    }
}

#[derive(Debug)]
pub struct PrimitiveBuilder<T: NativeType> {
    values: MutableBuffer,
    nulls: NullTracker,
    _type: PhantomData<T>,
}

impl<T: NativeType> Default for PrimitiveBuilder<T> {
    fn default() -> Self {
        Self {
            values: MutableBuffer::default(),
            nulls: NullTracker::default(),
            _type: PhantomData,
        }
    }
}

impl<T: NativeType> PrimitiveBuilder<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: MutableBuffer::with_capacity(capacity * T::WIDTH),
            nulls: NullTracker {
                bitmap: BitmapBuilder::with_capacity(capacity),
            },
            _type: PhantomData,
        }
    }

    pub fn append_value(&mut self, value: T) {
        self.values.push(value);
        self.nulls.append(true);
    }

    pub fn append_null(&mut self) {
        self.values.extend_zeros(T::WIDTH);
        self.nulls.append(false);
    }

    pub fn append_option(&mut self, value: Option<T>) {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.nulls.null_count()
    }

    pub fn finish(self) -> Result<ArrayData> {
        let len = self.len();
        let (null_count, validity) = self.nulls.finish();
        ArrayData::try_new(
            T::DATA_TYPE,
            len,
            null_count,
            0,
            vec![validity, self.values.freeze()],
            vec![],
        )
    }
}

#[derive(Debug, Default)]
pub struct BooleanBuilder {
    values: BitmapBuilder,
    nulls: NullTracker,
}

impl BooleanBuilder {
    pub fn append_value(&mut self, value: bool) {
        self.values.append(value);
        self.nulls.append(true);
    }

    pub fn append_null(&mut self) {
        self.values.append(false);
        self.nulls.append(false);
    }

    pub fn append_option(&mut self, value: Option<bool>) {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Result<ArrayData> {
        let len = self.len();
        let (null_count, validity) = self.nulls.finish();
        ArrayData::try_new(
            DataType::Boolean,
            len,
            null_count,
            0,
            vec![validity, self.values.finish()],
            vec![],
        )
    }
}

/// Builds Binary or Utf8 arrays. Utf8 contents are checked on `finish`.
#[derive(Debug)]
pub struct BinaryBuilder {
    data_type: DataType,
    offsets: Vec<usize>,
    values: MutableBuffer,
    nulls: NullTracker,
}

impl BinaryBuilder {
    pub fn new_binary() -> Self {
        Self::new(DataType::Binary)
    }

    pub fn new_utf8() -> Self {
        Self::new(DataType::Utf8)
    }

    fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            offsets: vec![0],
            values: MutableBuffer::default(),
            nulls: NullTracker::default(),
        }
    }

    pub fn append_value<V: AsRef<[u8]>>(&mut self, value: V) {
        self.values.extend_from_slice(value.as_ref());
        self.offsets.push(self.values.len());
        self.nulls.append(true);
    }

    pub fn append_null(&mut self) {
        self.offsets.push(self.values.len());
        self.nulls.append(false);
    }

    pub fn append_option<V: AsRef<[u8]>>(&mut self, value: Option<V>) {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Result<ArrayData> {
        let len = self.len();
        let mut offsets = MutableBuffer::with_capacity(self.offsets.len() * 4);
        if len > 0 {
            for offset in self.offsets {
                offsets.push(i32::try_from(offset)?);
            }
        }
        let (null_count, validity) = self.nulls.finish();
        ArrayData::try_new(
            self.data_type,
            len,
            null_count,
            0,
            vec![validity, offsets.freeze(), self.values.freeze()],
            vec![],
        )
    }
}
