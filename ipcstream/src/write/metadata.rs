use crate::consts::{MAX_NESTING_DEPTH, METADATA_VERSION};
use crate::error::{IpcError, Result};
use crate::message::{BatchHeader, MessageHeader};
use crate::schema::{DataType, Field, Schema};
use std::convert::TryFrom;
use std::io::Write;

fn write_uleb<W: Write>(out: &mut W, value: usize) -> Result<()> {
    leb128::write::unsigned(out, u64::try_from(value)?)?;
    Ok(())
}

fn write_type<W: Write>(out: &mut W, data_type: &DataType, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(IpcError::malformed(format!(
            "types nest deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }

    out.write_all(&[data_type.type_tag()])?;                   // 1 byte  - type tag
    match data_type {
        DataType::List(child) => write_field(out, child, depth + 1)?,
        DataType::Struct(children) => {
            if children.is_empty() {
                return Err(IpcError::malformed("struct types need at least one field"));
            }
            write_uleb(out, children.len())?;                  // ? bytes - child count
            for child in children {
                write_field(out, child, depth + 1)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn write_field<W: Write>(out: &mut W, field: &Field, depth: usize) -> Result<()> {
    write_uleb(out, field.name().len())?;                      // ? bytes - name length
    out.write_all(field.name().as_bytes())?;                   // ? bytes - name
    out.write_all(&[u8::from(field.is_nullable())])?;          // 1 byte  - nullable flag
    write_type(out, field.data_type(), depth)
}

fn write_schema<W: Write>(out: &mut W, schema: &Schema) -> Result<()> {
    write_uleb(out, schema.fields().len())?;                   // ? bytes - field count
    for field in schema.fields() {
        write_field(out, field, 1)?;
    }
    Ok(())
}

fn write_batch_header<W: Write>(out: &mut W, header: &BatchHeader) -> Result<()> {
    write_uleb(out, header.num_rows())?;                       // ? bytes - row count
    write_uleb(out, header.nodes().len())?;                    // ? bytes - node count
    for node in header.nodes() {
        write_uleb(out, node.length())?;                       // ? bytes - node length
        write_uleb(out, node.null_count())?;                   // ? bytes - node null count
    }
    write_uleb(out, header.buffers().len())?;                  // ? bytes - buffer count
    for buffer in header.buffers() {
        write_uleb(out, buffer.offset())?;                     // ? bytes - buffer offset
        write_uleb(out, buffer.length())?;                     // ? bytes - buffer length
    }
    Ok(())
}

/// Serializes a metadata block. The result is not padded; the framer pads
/// it when writing.
pub fn encode_metadata(header: &MessageHeader, body_len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_all(&[METADATA_VERSION, header.kind().type_tag()])?; // 2 bytes - version, type
    write_uleb(&mut buf, body_len)?;                           // ? bytes - body length
    match header {
        MessageHeader::Schema(schema) => write_schema(&mut buf, schema)?,
        MessageHeader::RecordBatch(batch) => write_batch_header(&mut buf, batch)?,
    }
    Ok(buf)
}

/// Metadata of a schema message. Schema messages have no body.
pub fn encode_schema(schema: &Schema) -> Result<Vec<u8>> {
    encode_metadata(&MessageHeader::Schema(schema.clone()), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BufferSpec, FieldNode};
    use assert_matches::assert_matches;

    #[test]
    fn test_encode_schema() {
        let schema = Schema::with_fields(vec![
            Field::new("id", DataType::Int32, false),
            Field::new(
                "tags",
                DataType::List(Box::new(Field::new("t", DataType::Utf8, true))),
                true,
            ),
        ]);
        #[rustfmt::skip]
        assert_eq!(encode_schema(&schema).unwrap(),
                   &[0x01, // metadata version
                     0x01, // message type: schema
                     0x00, // body length
                     0x02, // field count
                     0x02, // name length
                     b'i',
                     b'd',
                     0x00, // not nullable
                     0x04, // type: int32
                     0x04, // name length
                     b't',
                     b'a',
                     b'g',
                     b's',
                     0x01, // nullable
                     0x20, // type: list
                     0x01, // child name length
                     b't',
                     0x01, // nullable
                     0x11]); // type: utf8
    }

    #[test]
    fn test_encode_struct() {
        let schema = Schema::with_fields(vec![Field::new(
            "p",
            DataType::Struct(vec![
                Field::new("x", DataType::Float64, false),
                Field::new("y", DataType::Boolean, true),
            ]),
            false,
        )]);
        #[rustfmt::skip]
        assert_eq!(encode_schema(&schema).unwrap(),
                   &[0x01, // metadata version
                     0x01, // message type: schema
                     0x00, // body length
                     0x01, // field count
                     0x01, // name length
                     b'p',
                     0x00, // not nullable
                     0x21, // type: struct
                     0x02, // child count
                     0x01, // name length
                     b'x',
                     0x00, // not nullable
                     0x0B, // type: float64
                     0x01, // name length
                     b'y',
                     0x01, // nullable
                     0x01]); // type: boolean
    }

    #[test]
    fn test_encode_empty_struct_fails() {
        let schema = Schema::with_fields(vec![Field::new("s", DataType::Struct(vec![]), true)]);
        assert_matches!(encode_schema(&schema), Err(IpcError::MalformedSchema { .. }));
    }

    #[test]
    fn test_encode_too_deep_fails() {
        let mut data_type = DataType::Int8;
        for _ in 0..MAX_NESTING_DEPTH {
            data_type = DataType::List(Box::new(Field::new("i", data_type, true)));
        }
        let schema = Schema::with_fields(vec![Field::new("deep", data_type, true)]);
        assert_matches!(encode_schema(&schema), Err(IpcError::MalformedSchema { .. }));
    }

    #[test]
    fn test_encode_batch_header() {
        let header = BatchHeader::new(
            3,
            vec![FieldNode::new(3, 0)],
            vec![BufferSpec::new(0, 0), BufferSpec::new(0, 200)],
        );
        #[rustfmt::skip]
        assert_eq!(encode_metadata(&MessageHeader::RecordBatch(header), 200).unwrap(),
                   &[0x01, // metadata version
                     0x02, // message type: record batch
                     0xC8, // body length = 200
                     0x01,
                     0x03, // row count
                     0x01, // node count
                     0x03, // node length
                     0x00, // node null count
                     0x02, // buffer count
                     0x00, // validity offset
                     0x00, // validity length
                     0x00, // values offset
                     0xC8, // values length = 200
                     0x01]);
    }
}
