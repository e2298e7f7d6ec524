//! Buffer layout signatures.
//!
//! Every [`DataType`] declares the ordered list of buffers one array of that
//! type owns. Children are not part of that list: each child contributes its
//! own block of buffers right after its parent, in declaration order. The
//! encoder and decoder both walk types through [`DataType::buffer_roles`] so
//! they agree on which buffer table entry belongs to which buffer.

use crate::bit_util;
use crate::schema::{DataType, Schema};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    Validity,
    Offsets,
    Values,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validity => f.write_str("validity"),
            Self::Offsets => f.write_str("offsets"),
            Self::Values => f.write_str("values"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferRequirement {
    role: BufferRole,
    min_len: usize,
}

impl BufferRequirement {
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }
}

const PRIMITIVE_ROLES: &[BufferRole] = &[BufferRole::Validity, BufferRole::Values];
const VARIABLE_ROLES: &[BufferRole] = &[BufferRole::Validity, BufferRole::Offsets, BufferRole::Values];
const LIST_ROLES: &[BufferRole] = &[BufferRole::Validity, BufferRole::Offsets];
const STRUCT_ROLES: &[BufferRole] = &[BufferRole::Validity];

pub(crate) const OFFSET_WIDTH: usize = 4;

impl DataType {
    pub fn buffer_roles(&self) -> &'static [BufferRole] {
        match self {
            Self::Binary | Self::Utf8 => VARIABLE_ROLES,
            Self::List(_) => LIST_ROLES,
            Self::Struct(_) => STRUCT_ROLES,
            _ => PRIMITIVE_ROLES,
        }
    }

    /// Buffers required by one array of this type holding `length` elements,
    /// children excluded. `None` when a minimum does not fit in `usize`.
    pub fn required_layout(&self, length: usize) -> Option<Vec<BufferRequirement>> {
        self.buffer_roles()
            .iter()
            .map(|&role| {
                min_buffer_len(self, role, length).map(|min_len| BufferRequirement { role, min_len })
            })
            .collect()
    }

    /// Buffers consumed by this type and all of its descendants.
    pub(crate) fn buffer_count(&self) -> usize {
        self.buffer_roles().len()
            + self
                .children()
                .iter()
                .map(|child| child.data_type().buffer_count())
                .sum::<usize>()
    }

    /// Field nodes consumed by this type and all of its descendants.
    pub(crate) fn node_count(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(|child| child.data_type().node_count())
            .sum::<usize>()
    }
}

impl Schema {
    pub(crate) fn buffer_count(&self) -> usize {
        self.fields()
            .iter()
            .map(|field| field.data_type().buffer_count())
            .sum()
    }

    pub(crate) fn node_count(&self) -> usize {
        self.fields()
            .iter()
            .map(|field| field.data_type().node_count())
            .sum()
    }
}

/// Smallest byte length a buffer in `role` may have for `length` elements.
///
/// The values buffer of Binary/Utf8 depends on the offsets it is paired
/// with, so its static minimum is zero. An offsets buffer for zero elements
/// may be empty. Lengths come off the wire, so the result is `None` when the
/// minimum overflows.
pub fn min_buffer_len(data_type: &DataType, role: BufferRole, length: usize) -> Option<usize> {
    match role {
        BufferRole::Validity => Some(bit_util::bytes_for(length)),
        BufferRole::Offsets if length == 0 => Some(0),
        BufferRole::Offsets => length.checked_add(1)?.checked_mul(OFFSET_WIDTH),
        BufferRole::Values => match data_type {
            DataType::Boolean => Some(bit_util::bytes_for(length)),
            _ => data_type
                .byte_width()
                .map_or(Some(0), |width| length.checked_mul(width)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_primitive_layout() {
        let layout = DataType::Int32.required_layout(3).unwrap();
        assert_eq!(
            layout
                .iter()
                .map(|req| (req.role(), req.min_len()))
                .collect::<Vec<_>>(),
            vec![(BufferRole::Validity, 1), (BufferRole::Values, 12)]
        );
    }

    #[test]
    fn test_boolean_values_are_bit_packed() {
        let layout = DataType::Boolean.required_layout(10).unwrap();
        assert_eq!(layout[0].min_len(), 2);
        assert_eq!(layout[1].min_len(), 2);
    }

    #[test]
    fn test_variable_length_layout() {
        let layout = DataType::Utf8.required_layout(4).unwrap();
        assert_eq!(
            layout
                .iter()
                .map(|req| (req.role(), req.min_len()))
                .collect::<Vec<_>>(),
            vec![
                (BufferRole::Validity, 1),
                (BufferRole::Offsets, 20),
                (BufferRole::Values, 0)
            ]
        );
    }

    #[test]
    fn test_zero_length_layout_is_empty() {
        for data_type in [DataType::Float64, DataType::Binary, DataType::Boolean] {
            assert!(data_type
                .required_layout(0)
                .unwrap()
                .iter()
                .all(|req| req.min_len() == 0));
        }
    }

    #[test]
    fn test_overflowing_lengths() {
        assert_eq!(min_buffer_len(&DataType::Int64, BufferRole::Values, usize::MAX / 4), None);
        assert_eq!(min_buffer_len(&DataType::Utf8, BufferRole::Offsets, usize::MAX), None);
        assert_eq!(
            min_buffer_len(&DataType::Boolean, BufferRole::Validity, usize::MAX),
            Some(usize::MAX / 8 + 1)
        );
        assert!(DataType::Int32.required_layout(1 << 62).is_none());
    }

    #[test]
    fn test_nested_counts() {
        // struct<a: int64, tags: list<utf8>>
        let data_type = DataType::Struct(vec![
            Field::new("a", DataType::Int64, false),
            Field::new(
                "tags",
                DataType::List(Box::new(Field::new("item", DataType::Utf8, true))),
                true,
            ),
        ]);
        assert_eq!(data_type.buffer_roles(), &[BufferRole::Validity]);
        // struct(1) + int64(2) + list(2) + utf8(3)
        assert_eq!(data_type.buffer_count(), 8);
        assert_eq!(data_type.node_count(), 4);

        let schema = Schema::with_fields(vec![
            Field::new("s", data_type, true),
            Field::new("b", DataType::Boolean, true),
        ]);
        assert_eq!(schema.buffer_count(), 10);
        assert_eq!(schema.node_count(), 5);
    }
}
