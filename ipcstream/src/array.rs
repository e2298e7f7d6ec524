use crate::bit_util;
use crate::buffer::Buffer;
use crate::error::{IpcError, Result};
use crate::layout::{min_buffer_len, BufferRole, OFFSET_WIDTH};
use crate::schema::DataType;
use crate::types::NativeType;
use std::ops::Range;

/// A typed column: buffers laid out per [`DataType::buffer_roles`] plus one
/// child per nested field.
///
/// Logical element `i` lives at physical position `offset + i`. Struct
/// children are addressed with the parent's offset as well; list offsets
/// address the child's logical positions.
#[derive(Clone, Debug)]
pub struct ArrayData {
    data_type: DataType,
    len: usize,
    null_count: usize,
    offset: usize,
    buffers: Vec<Buffer>,
    children: Vec<ArrayData>,
}

impl ArrayData {
    /// `buffers` holds one entry per layout role. An empty validity buffer
    /// means "no nulls" and requires `null_count == 0`.
    pub fn try_new(
        data_type: DataType,
        len: usize,
        null_count: usize,
        offset: usize,
        buffers: Vec<Buffer>,
        children: Vec<ArrayData>,
    ) -> Result<Self> {
        let data = Self {
            data_type,
            len,
            null_count,
            offset,
            buffers,
            children,
        };
        data.validate()?;
        Ok(data)
    }

    /// A zero-length array of `data_type` whose buffers are all empty.
    pub fn new_empty(data_type: &DataType) -> Self {
        Self {
            data_type: data_type.clone(),
            len: 0,
            null_count: 0,
            offset: 0,
            buffers: vec![Buffer::empty(); data_type.buffer_roles().len()],
            children: data_type
                .children()
                .iter()
                .map(|child| Self::new_empty(child.data_type()))
                .collect(),
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn children(&self) -> &[ArrayData] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&ArrayData> {
        self.children.get(index)
    }

    pub fn buffer(&self, role: BufferRole) -> Option<&Buffer> {
        self.data_type
            .buffer_roles()
            .iter()
            .position(|r| *r == role)
            .and_then(|index| self.buffers.get(index))
    }

    /// The validity bitmap, or `None` when the array has no nulls and
    /// carries no bitmap.
    pub fn validity(&self) -> Option<&Buffer> {
        self.buffer(BufferRole::Validity).filter(|buf| !buf.is_empty())
    }

    pub fn is_valid(&self, i: usize) -> bool {
        assert!(i < self.len, "index {i} out of bounds for length {}", self.len);
        match self.validity() {
            Some(validity) => bit_util::get_bit(validity, self.offset + i),
            None => self.null_count == 0,
        }
    }

    pub fn is_null(&self, i: usize) -> bool {
        !self.is_valid(i)
    }

    /// Value `i` of a fixed-width numeric array. Panics when `T` does not
    /// match the data type.
    pub fn value<T: NativeType>(&self, i: usize) -> Option<T> {
        assert_eq!(T::DATA_TYPE, self.data_type, "value type does not match array type");
        if !self.is_valid(i) {
            return None;
        }
        let start = (self.offset + i) * T::WIDTH;
        self.buffer(BufferRole::Values)
            .map(|values| T::from_le_slice(&values[start..start + T::WIDTH]))
    }

    pub fn bool_value(&self, i: usize) -> Option<bool> {
        assert_eq!(self.data_type, DataType::Boolean, "not a boolean array");
        if !self.is_valid(i) {
            return None;
        }
        self.buffer(BufferRole::Values)
            .map(|values| bit_util::get_bit(values, self.offset + i))
    }

    pub fn binary_value(&self, i: usize) -> Option<&[u8]> {
        assert!(
            matches!(self.data_type, DataType::Binary | DataType::Utf8),
            "not a variable-length array"
        );
        if !self.is_valid(i) {
            return None;
        }
        let range = self.offset_range(i);
        self.buffer(BufferRole::Values).map(|values| &values[range])
    }

    pub fn str_value(&self, i: usize) -> Option<&str> {
        assert_eq!(self.data_type, DataType::Utf8, "not a utf8 array");
        self.binary_value(i)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Child positions covered by list element `i`.
    pub fn list_range(&self, i: usize) -> Option<Range<usize>> {
        assert!(matches!(self.data_type, DataType::List(_)), "not a list array");
        if !self.is_valid(i) {
            return None;
        }
        Some(self.offset_range(i))
    }

    /// Zero-copy view of `len` elements starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset.checked_add(len).map_or(false, |end| end <= self.len),
            "slice {offset}+{len} out of bounds for length {}",
            self.len
        );
        let null_count = match self.validity() {
            Some(validity) => bit_util::count_unset_bits(validity, self.offset + offset, len),
            None => 0,
        };
        Self {
            data_type: self.data_type.clone(),
            len,
            null_count,
            offset: self.offset + offset,
            buffers: self.buffers.clone(),
            children: self.children.clone(),
        }
    }

    pub(crate) fn offset_at(&self, position: usize) -> usize {
        let offsets = self.buffer(BufferRole::Offsets).map_or(&[][..], |buf| buf.as_slice());
        read_offset(offsets, position).unwrap_or(0)
    }

    fn offset_range(&self, i: usize) -> Range<usize> {
        self.offset_at(self.offset + i)..self.offset_at(self.offset + i + 1)
    }

    fn validate(&self) -> Result<()> {
        let roles = self.data_type.buffer_roles();
        if self.buffers.len() != roles.len() {
            return Err(invalid(format!(
                "{:?} takes {} buffers, got {}",
                self.data_type,
                roles.len(),
                self.buffers.len()
            )));
        }

        let child_fields = self.data_type.children();
        if self.children.len() != child_fields.len() {
            return Err(invalid(format!(
                "{:?} takes {} children, got {}",
                self.data_type,
                child_fields.len(),
                self.children.len()
            )));
        }
        for (child, field) in self.children.iter().zip(child_fields) {
            if child.data_type() != field.data_type() {
                return Err(invalid(format!(
                    "child {:?} has type {:?}, expected {:?}",
                    field.name(),
                    child.data_type(),
                    field.data_type()
                )));
            }
        }

        if self.null_count > self.len {
            return Err(invalid(format!(
                "null count {} exceeds length {}",
                self.null_count, self.len
            )));
        }

        let end = self.offset.checked_add(self.len).ok_or_else(|| {
            invalid(format!("offset {} + length {} overflows", self.offset, self.len))
        })?;
        for (buffer, &role) in self.buffers.iter().zip(roles) {
            if role == BufferRole::Validity && buffer.is_empty() {
                if self.null_count != 0 {
                    return Err(invalid(format!(
                        "{} nulls declared without a validity buffer",
                        self.null_count
                    )));
                }
                continue;
            }
            let required = min_buffer_len(&self.data_type, role, end).ok_or_else(|| {
                invalid(format!("{role} buffer for {end} elements overflows"))
            })?;
            if buffer.len() < required {
                return Err(invalid(format!(
                    "{role} buffer is {} bytes, {required} required",
                    buffer.len()
                )));
            }
        }

        if let Some(validity) = self.validity() {
            let counted = bit_util::count_unset_bits(validity, self.offset, self.len);
            if counted != self.null_count {
                return Err(IpcError::NullCountMismatch {
                    declared: self.null_count,
                    counted,
                });
            }
        }

        match &self.data_type {
            DataType::Binary | DataType::Utf8 => {
                let values_len = self.buffer(BufferRole::Values).map_or(0, |buf| buf.len());
                self.validate_offsets(values_len)?;
                if self.data_type == DataType::Utf8 {
                    self.validate_utf8()?;
                }
            }
            DataType::List(_) => {
                let child_len = self.children.first().map_or(0, |child| child.len());
                self.validate_offsets(child_len)?;
            }
            DataType::Struct(_) => {
                for child in self.children.iter() {
                    if child.len() < end {
                        return Err(invalid(format!(
                            "struct child has length {}, {end} required",
                            child.len()
                        )));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn validate_offsets(&self, limit: usize) -> Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        let offsets = self.buffer(BufferRole::Offsets).map_or(&[][..], |buf| buf.as_slice());
        let mut prev = read_offset(offsets, self.offset)?;
        for position in self.offset + 1..=self.offset + self.len {
            let current = read_offset(offsets, position)?;
            if current < prev {
                return Err(IpcError::InvalidOffsets {
                    reason: format!("offset {current} at position {position} is below {prev}"),
                });
            }
            prev = current;
        }
        if prev > limit {
            return Err(IpcError::InvalidOffsets {
                reason: format!("last offset {prev} exceeds {limit}"),
            });
        }
        Ok(())
    }

    fn validate_utf8(&self) -> Result<()> {
        let values = self.buffer(BufferRole::Values).map_or(&[][..], |buf| buf.as_slice());
        for i in 0..self.len {
            if !self.is_valid(i) {
                continue;
            }
            let range = self.offset_range(i);
            if std::str::from_utf8(&values[range]).is_err() {
                return Err(invalid(format!("utf8 value {i} is not valid UTF-8")));
            }
        }
        Ok(())
    }

    fn fixed_value_bytes(&self, i: usize, width: usize) -> &[u8] {
        let start = (self.offset + i) * width;
        self.buffer(BufferRole::Values)
            .map_or(&[][..], |values| &values[start..start + width])
    }

    fn value_eq(&self, i: usize, other: &Self, j: usize) -> bool {
        match &self.data_type {
            DataType::Boolean => self.bool_value(i) == other.bool_value(j),
            DataType::Binary | DataType::Utf8 => self.binary_value(i) == other.binary_value(j),
            DataType::List(_) => {
                match (self.list_range(i), other.list_range(j), self.child(0), other.child(0)) {
                    (Some(a), Some(b), Some(child_a), Some(child_b)) => {
                        a.len() == b.len()
                            && child_a.slice(a.start, a.len()) == child_b.slice(b.start, b.len())
                    }
                    _ => false,
                }
            }
            DataType::Struct(_) => self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.slice(self.offset + i, 1) == b.slice(other.offset + j, 1)),
            data_type => match data_type.byte_width() {
                Some(width) => self.fixed_value_bytes(i, width) == other.fixed_value_bytes(j, width),
                None => false,
            },
        }
    }
}

/// Logical equality: physical offsets, padding, and bytes under null slots
/// are ignored.
impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        if self.data_type != other.data_type
            || self.len != other.len
            || self.null_count != other.null_count
        {
            return false;
        }
        (0..self.len).all(|i| {
            let valid = self.is_valid(i);
            valid == other.is_valid(i) && (!valid || self.value_eq(i, other, i))
        })
    }
}

fn invalid(reason: String) -> IpcError {
    IpcError::InvalidArray { reason }
}

pub(crate) fn read_offset(offsets: &[u8], position: usize) -> Result<usize> {
    let start = position * OFFSET_WIDTH;
    let raw = offsets
        .get(start..start + OFFSET_WIDTH)
        .ok_or_else(|| IpcError::InvalidOffsets {
            reason: format!("offset {position} lies past the offsets buffer"),
        })?;
    let value = i32::from_le_slice(raw);
    usize::try_from(value).map_err(|_| IpcError::InvalidOffsets {
        reason: format!("offset {value} at position {position} is negative"),
    })
}
