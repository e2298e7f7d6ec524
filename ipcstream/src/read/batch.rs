use super::metadata::decode_metadata;
use crate::array::ArrayData;
use crate::batch::RecordBatch;
use crate::buffer::Buffer;
use crate::error::{IpcError, Result};
use crate::layout::{min_buffer_len, BufferRole};
use crate::message::{BatchHeader, BufferSpec, FieldNode, MessageHeader};
use crate::schema::{DataType, SchemaRef};
use std::iter::Enumerate;
use std::slice::Iter;

/// Walks the node and buffer tables of one message in pre-order, slicing
/// buffers out of the shared body.
struct ArrayReader<'a> {
    nodes: Iter<'a, FieldNode>,
    buffers: Enumerate<Iter<'a, BufferSpec>>,
    body: &'a Buffer,
}

impl<'a> ArrayReader<'a> {
    fn next_buffer(
        &mut self,
        data_type: &DataType,
        role: BufferRole,
        node: &FieldNode,
    ) -> Result<Buffer> {
        let (index, spec) = self
            .buffers
            .next()
            .ok_or_else(|| IpcError::corrupt("buffer table ended early"))?;

        let end = spec
            .offset()
            .checked_add(spec.length())
            .filter(|end| *end <= self.body.len())
            .ok_or(IpcError::BufferOutOfBounds {
                index,
                offset: spec.offset(),
                length: spec.length(),
                body_len: self.body.len(),
            })?;

        // an empty validity buffer stands for "no nulls"
        let absent_validity = role == BufferRole::Validity && spec.length() == 0;
        if !absent_validity || node.null_count() > 0 {
            // a minimum that overflows can never be satisfied
            let expected = min_buffer_len(data_type, role, node.length()).unwrap_or(usize::MAX);
            if spec.length() < expected {
                return Err(IpcError::InvalidBufferLength {
                    index,
                    role,
                    expected,
                    actual: spec.length(),
                });
            }
        }

        Ok(self.body.slice(spec.offset(), end - spec.offset()))
    }

    fn read_array(&mut self, data_type: &DataType) -> Result<ArrayData> {
        let node = *self
            .nodes
            .next()
            .ok_or_else(|| IpcError::corrupt("field node table ended early"))?;

        let buffers = data_type
            .buffer_roles()
            .iter()
            .map(|&role| self.next_buffer(data_type, role, &node))
            .collect::<Result<Vec<_>>>()?;

        let children = data_type
            .children()
            .iter()
            .map(|child| self.read_array(child.data_type()))
            .collect::<Result<Vec<_>>>()?;

        ArrayData::try_new(
            data_type.clone(),
            node.length(),
            node.null_count(),
            0,
            buffers,
            children,
        )
    }
}

/// Rebuilds a batch from a parsed header and its body. Every buffer of the
/// result is a view into `body`.
pub(crate) fn decode_batch_header(
    header: &BatchHeader,
    body: &Buffer,
    schema: &SchemaRef,
) -> Result<RecordBatch> {
    let expected = schema.node_count();
    if header.nodes().len() != expected {
        return Err(IpcError::NodeCountMismatch {
            expected,
            actual: header.nodes().len(),
        });
    }
    let expected = schema.buffer_count();
    if header.buffers().len() != expected {
        return Err(IpcError::BufferCountMismatch {
            expected,
            actual: header.buffers().len(),
        });
    }

    let mut reader = ArrayReader {
        nodes: header.nodes().iter(),
        buffers: header.buffers().iter().enumerate(),
        body,
    };
    let columns = schema
        .fields()
        .iter()
        .map(|field| reader.read_array(field.data_type()))
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new_with_num_rows(schema.clone(), columns, header.num_rows())
}

/// Decodes a record batch message against the stream schema.
pub fn decode_batch(metadata: &[u8], body: &Buffer, schema: &SchemaRef) -> Result<RecordBatch> {
    match decode_metadata(metadata)?.into_header() {
        MessageHeader::RecordBatch(header) => decode_batch_header(&header, body, schema),
        MessageHeader::Schema(_) => Err(IpcError::corrupt("expected a record batch message")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BinaryBuilder, BooleanBuilder, PrimitiveBuilder};
    use crate::schema::{Field, Schema};
    use crate::write::batch::encode_batch;
    use crate::write::metadata::encode_metadata;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn int32_schema(nullable: bool) -> SchemaRef {
        Arc::new(Schema::with_fields(vec![Field::new("v", DataType::Int32, nullable)]))
    }

    fn batch_metadata(num_rows: usize, nodes: Vec<FieldNode>, buffers: Vec<BufferSpec>, body_len: usize) -> Vec<u8> {
        encode_metadata(
            &MessageHeader::RecordBatch(BatchHeader::new(num_rows, nodes, buffers)),
            body_len,
        )
        .unwrap()
    }

    #[test]
    fn test_decode_int32() {
        #[rustfmt::skip]
        let body = Buffer::from(vec![0x01, 0x00, 0x00, 0x00,
                                     0x02, 0x00, 0x00, 0x00,
                                     0x03, 0x00, 0x00, 0x00,
                                     0x00, 0x00, 0x00, 0x00]);
        let metadata = batch_metadata(
            3,
            vec![FieldNode::new(3, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 12)],
            16,
        );
        assert_matches!(decode_batch(&metadata, &body, &int32_schema(false)), Ok(batch) => {
            let column = batch.column(0).unwrap();
            assert_eq!(batch.num_rows(), 3);
            assert_eq!(column.offset(), 0);
            assert!(column.validity().is_none());
            assert_eq!((0..3).map(|i| column.value::<i32>(i)).collect::<Vec<_>>(),
                       vec![Some(1), Some(2), Some(3)]);
        });
    }

    #[test]
    fn test_decoded_buffers_share_the_body() {
        let body = Buffer::from(vec![0; 16]);
        let metadata = batch_metadata(
            2,
            vec![FieldNode::new(2, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(8, 8)],
            16,
        );
        let batch = decode_batch(&metadata, &body, &int32_schema(false)).unwrap();
        let values = batch.column(0).unwrap().buffer(BufferRole::Values).unwrap();
        assert!(values.ptr_eq(&body.slice(8, 8)));
    }

    #[test]
    fn test_buffer_count_mismatch() {
        let metadata = batch_metadata(0, vec![FieldNode::new(0, 0)], vec![BufferSpec::new(0, 0)], 0);
        assert_matches!(
            decode_batch(&metadata, &Buffer::empty(), &int32_schema(true)),
            Err(IpcError::BufferCountMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_node_count_mismatch() {
        let metadata = batch_metadata(0, vec![], vec![BufferSpec::new(0, 0); 2], 0);
        assert_matches!(
            decode_batch(&metadata, &Buffer::empty(), &int32_schema(true)),
            Err(IpcError::NodeCountMismatch { expected: 1, actual: 0 })
        );
    }

    #[test]
    fn test_buffer_out_of_bounds() {
        let metadata = batch_metadata(
            2,
            vec![FieldNode::new(2, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(8, 8)],
            8,
        );
        assert_matches!(
            decode_batch(&metadata, &Buffer::from(vec![0; 8]), &int32_schema(true)),
            Err(IpcError::BufferOutOfBounds { index: 1, offset: 8, length: 8, body_len: 8 })
        );
    }

    #[test]
    fn test_short_values_buffer() {
        let metadata = batch_metadata(
            3,
            vec![FieldNode::new(3, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 8)],
            8,
        );
        assert_matches!(
            decode_batch(&metadata, &Buffer::from(vec![0; 8]), &int32_schema(true)),
            Err(IpcError::InvalidBufferLength { index: 1, role: BufferRole::Values, expected: 12, actual: 8 })
        );
    }

    #[test]
    fn test_huge_node_length() {
        let metadata = batch_metadata(
            1 << 62,
            vec![FieldNode::new(1 << 62, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 0)],
            0,
        );
        assert_matches!(
            decode_batch(&metadata, &Buffer::empty(), &int32_schema(false)),
            Err(IpcError::InvalidBufferLength { index: 1, role: BufferRole::Values, expected: usize::MAX, actual: 0 })
        );

        let metadata = batch_metadata(
            usize::MAX,
            vec![FieldNode::new(usize::MAX, 0)],
            vec![BufferSpec::new(0, 0); 3],
            0,
        );
        let schema = Arc::new(Schema::with_fields(vec![Field::new("s", DataType::Utf8, false)]));
        assert_matches!(
            decode_batch(&metadata, &Buffer::empty(), &schema),
            Err(IpcError::InvalidBufferLength { index: 1, role: BufferRole::Offsets, .. })
        );
    }

    #[test]
    fn test_missing_validity_with_nulls() {
        let metadata = batch_metadata(
            2,
            vec![FieldNode::new(2, 1)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 8)],
            8,
        );
        assert_matches!(
            decode_batch(&metadata, &Buffer::from(vec![0; 8]), &int32_schema(true)),
            Err(IpcError::InvalidBufferLength { index: 0, role: BufferRole::Validity, expected: 1, actual: 0 })
        );
    }

    #[test]
    fn test_null_count_mismatch() {
        #[rustfmt::skip]
        let body = Buffer::from(vec![0b00000011, 0, 0, 0, 0, 0, 0, 0,
                                     1, 0, 0, 0, 2, 0, 0, 0]);
        let metadata = batch_metadata(
            2,
            vec![FieldNode::new(2, 1)],
            vec![BufferSpec::new(0, 1), BufferSpec::new(8, 8)],
            16,
        );
        assert_matches!(
            decode_batch(&metadata, &body, &int32_schema(true)),
            Err(IpcError::NullCountMismatch { declared: 1, counted: 0 })
        );
    }

    #[test]
    fn test_offsets_past_values() {
        #[rustfmt::skip]
        let body = Buffer::from(vec![0, 0, 0, 0, 9, 0, 0, 0,
                                     b'a', b'b', b'c', 0, 0, 0, 0, 0]);
        let metadata = batch_metadata(
            1,
            vec![FieldNode::new(1, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 8), BufferSpec::new(8, 3)],
            16,
        );
        let schema = Arc::new(Schema::with_fields(vec![Field::new("s", DataType::Utf8, false)]));
        assert_matches!(
            decode_batch(&metadata, &body, &schema),
            Err(IpcError::InvalidOffsets { .. })
        );
    }

    #[test]
    fn test_row_count_disagrees_with_columns() {
        let metadata = batch_metadata(
            5,
            vec![FieldNode::new(2, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 8)],
            8,
        );
        assert_matches!(
            decode_batch(&metadata, &Buffer::from(vec![0; 8]), &int32_schema(true)),
            Err(IpcError::InvalidBatch { .. })
        );
    }

    #[test]
    fn test_schema_metadata_rejected() {
        let metadata = encode_metadata(&MessageHeader::Schema(Schema::with_fields(vec![])), 0).unwrap();
        assert_matches!(
            decode_batch(&metadata, &Buffer::empty(), &int32_schema(true)),
            Err(IpcError::CorruptStream { .. })
        );
    }

    #[test]
    fn test_nested_roundtrip() {
        // list<struct<id: uint32, name: utf8>>, flags: boolean
        let item = DataType::Struct(vec![
            Field::new("id", DataType::UInt32, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        let schema = Arc::new(Schema::with_fields(vec![
            Field::new("items", DataType::List(Box::new(Field::new("item", item.clone(), true))), true),
            Field::new("flags", DataType::Boolean, true),
        ]));

        let mut ids = PrimitiveBuilder::<u32>::default();
        let mut names = BinaryBuilder::new_utf8();
        for i in 0..5 {
            ids.append_value(i * 10);
            names.append_option(if i == 2 { None } else { Some(format!("n{i}")) });
        }
        let items = ArrayData::try_new(
            item,
            5,
            0,
            0,
            vec![Buffer::empty()],
            vec![ids.finish().unwrap(), names.finish().unwrap()],
        )
        .unwrap();
        let lists = ArrayData::try_new(
            schema.fields()[0].data_type().clone(),
            3,
            1,
            0,
            vec![Buffer::from(vec![0b101]), Buffer::from_slice_ref(&[0_i32, 2, 2, 5])],
            vec![items],
        )
        .unwrap();
        let mut flags = BooleanBuilder::default();
        flags.append_value(true);
        flags.append_null();
        flags.append_value(false);

        let batch = RecordBatch::try_new(schema.clone(), vec![lists, flags.finish().unwrap()]).unwrap();
        let (metadata, body) = encode_batch(&batch).unwrap();
        let decoded = decode_batch(&metadata, &body, &schema).unwrap();
        assert_eq!(decoded, batch);

        let list = decoded.column(0).unwrap();
        assert_eq!(list.list_range(2), Some(2..5));
        let names = list.child(0).unwrap().child(1).unwrap();
        assert_eq!(names.str_value(2), None);
        assert_eq!(names.str_value(4), Some("n4"));
    }
}
