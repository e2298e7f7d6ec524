use super::metadata::encode_metadata;
use crate::array::{read_offset, ArrayData};
use crate::batch::RecordBatch;
use crate::bit_util;
use crate::buffer::{Buffer, MutableBuffer};
use crate::error::Result;
use crate::layout::BufferRole;
use crate::message::{BatchHeader, BufferSpec, FieldNode, MessageHeader};
use crate::schema::DataType;
use std::convert::TryFrom;

/// Accumulates the body of one record batch message together with its
/// field node and buffer tables.
#[derive(Debug, Default)]
struct BodyWriter {
    body: MutableBuffer,
    nodes: Vec<FieldNode>,
    buffers: Vec<BufferSpec>,
}

impl BodyWriter {
    fn push_buffer(&mut self, bytes: &[u8]) {
        let offset = self.body.len();
        self.body.extend_from_slice(bytes);
        self.body.pad_to_alignment();
        self.buffers.push(BufferSpec::new(offset, bytes.len()));
    }

    /// Bits `[offset, offset + len)` of a bitmap, re-based to bit 0.
    /// Byte-aligned ranges are written straight from the source.
    fn push_bitmap(&mut self, bitmap: &[u8], offset: usize, len: usize) {
        if offset % 8 == 0 {
            let start = offset / 8;
            self.push_buffer(&bitmap[start..start + bit_util::bytes_for(len)]);
        } else {
            self.push_buffer(&bit_util::rebase(bitmap, offset, len));
        }
    }

    /// Offsets `[offset, offset + len]` rebased to start at zero. Returns the
    /// range of the child or values buffer they address.
    fn push_offsets(&mut self, array: &ArrayData) -> Result<(usize, usize)> {
        if array.is_empty() {
            self.push_buffer(&[]);
            return Ok((0, 0));
        }

        let offsets = array.buffer(BufferRole::Offsets).map_or(&[][..], |buf| buf.as_slice());
        let first = read_offset(offsets, array.offset())?;
        let last = read_offset(offsets, array.offset() + array.len())?;

        let mut rebased = MutableBuffer::with_capacity((array.len() + 1) * 4);
        for position in array.offset()..=array.offset() + array.len() {
            let value = read_offset(offsets, position)? - first;
            rebased.push(i32::try_from(value)?);
        }
        self.push_buffer(rebased.as_slice());

        Ok((first, last - first))
    }

    fn push_array(&mut self, array: &ArrayData) -> Result<()> {
        let offset = array.offset();
        let len = array.len();
        self.nodes.push(FieldNode::new(len, array.null_count()));

        match array.validity() {
            Some(validity) if array.null_count() > 0 => self.push_bitmap(validity, offset, len),
            _ => self.push_buffer(&[]),
        }

        let values = array.buffer(BufferRole::Values).map_or(&[][..], |buf| buf.as_slice());
        match array.data_type() {
            DataType::Boolean => self.push_bitmap(values, offset, len),
            DataType::Binary | DataType::Utf8 => {
                let (start, count) = self.push_offsets(array)?;
                self.push_buffer(&values[start..start + count]);
            }
            DataType::List(_) => {
                let (start, count) = self.push_offsets(array)?;
                if let Some(child) = array.child(0) {
                    self.push_array(&child.slice(start, count))?;
                }
            }
            DataType::Struct(_) => {
                for child in array.children() {
                    self.push_array(&child.slice(offset, len))?;
                }
            }
            data_type => {
                let width = data_type.byte_width().unwrap_or(0);
                self.push_buffer(&values[offset * width..(offset + len) * width]);
            }
        }

        Ok(())
    }
}

/// Encodes a batch into its metadata block and padded body.
///
/// Arrays are written pre-order (parent first, then each child in field
/// order) and normalized to offset zero, so sliced arrays only contribute
/// the bytes they cover.
pub fn encode_batch(batch: &RecordBatch) -> Result<(Vec<u8>, Buffer)> {
    let mut writer = BodyWriter::default();
    for column in batch.columns() {
        writer.push_array(column)?;
    }

    let body = writer.body.freeze();
    let header = BatchHeader::new(batch.num_rows(), writer.nodes, writer.buffers);
    let metadata = encode_metadata(&MessageHeader::RecordBatch(header), body.len())?;

    Ok((metadata, body))
}
