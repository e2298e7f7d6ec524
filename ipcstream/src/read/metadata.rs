use crate::consts::{MAX_NESTING_DEPTH, METADATA_VERSION, RECORD_BATCH_MESSAGE, SCHEMA_MESSAGE};
use crate::error::{IpcError, Result};
use crate::message::{BatchHeader, BufferSpec, FieldNode, MessageHeader, MessageKind, Metadata};
use crate::schema::{DataType, Field, Schema};
use nom::{multi::length_data, number::complete::le_u8, IResult};
use nom_leb128::leb128_u64;
use std::convert::TryFrom;
use std::str;

fn uleb(input: &[u8]) -> IResult<&[u8], usize, IpcError> {
    let (input, value) = leb128_u64(input)?;
    let value = usize::try_from(value).map_err(|e| nom::Err::Failure(IpcError::from(e)))?;
    Ok((input, value))
}

/// Counts come from untrusted input, so preallocation is capped by what the
/// remaining input could possibly hold.
fn capacity_for(count: usize, input: &[u8]) -> usize {
    count.min(input.len())
}

fn malformed<I, T>(reason: String) -> IResult<I, T, IpcError> {
    Err(nom::Err::Failure(IpcError::malformed(reason)))
}

fn parse_type(input: &[u8], depth: usize) -> IResult<&[u8], DataType, IpcError> {
    if depth > MAX_NESTING_DEPTH {
        return malformed(format!("types nest deeper than {MAX_NESTING_DEPTH} levels"));
    }

    let (input, type_tag) = le_u8(input)?;
    let data_type = match type_tag {
        0x01 => DataType::Boolean,
        0x02 => DataType::Int8,
        0x03 => DataType::Int16,
        0x04 => DataType::Int32,
        0x05 => DataType::Int64,
        0x06 => DataType::UInt8,
        0x07 => DataType::UInt16,
        0x08 => DataType::UInt32,
        0x09 => DataType::UInt64,
        0x0A => DataType::Float32,
        0x0B => DataType::Float64,
        0x10 => DataType::Binary,
        0x11 => DataType::Utf8,
        0x20 => {
            let (input, child) = parse_field(input, depth + 1)?;
            return Ok((input, DataType::List(Box::new(child))));
        }
        0x21 => {
            let (mut input, child_count) = uleb(input)?;
            if child_count == 0 {
                return malformed("struct type without fields".to_string());
            }
            let mut children = Vec::with_capacity(capacity_for(child_count, input));
            for _ in 0..child_count {
                let (rest, child) = parse_field(input, depth + 1)?;
                input = rest;
                children.push(child);
            }
            return Ok((input, DataType::Struct(children)));
        }
        _ => return malformed(format!("unknown type tag {type_tag:#04X}")),
    };

    Ok((input, data_type))
}

fn parse_field(input: &[u8], depth: usize) -> IResult<&[u8], Field, IpcError> {
    let (input, name) = length_data(uleb)(input)?;
    let (input, nullable) = le_u8(input)?;
    let (input, data_type) = parse_type(input, depth)?;

    let name = match str::from_utf8(name) {
        Ok(name) => name,
        Err(_) => return malformed("field name is not valid UTF-8".to_string()),
    };
    let nullable = match nullable {
        0x00 => false,
        0x01 => true,
        flag => return malformed(format!("invalid nullable flag {flag:#04X}")),
    };

    Ok((input, Field::new(name, data_type, nullable)))
}

fn parse_schema(input: &[u8]) -> IResult<&[u8], Schema, IpcError> {
    let (mut input, field_count) = uleb(input)?;
    let mut fields = Vec::with_capacity(capacity_for(field_count, input));
    for _ in 0..field_count {
        let (rest, field) = parse_field(input, 1)?;
        input = rest;
        fields.push(field);
    }
    Ok((input, Schema::with_fields(fields)))
}

fn parse_batch_header(input: &[u8]) -> IResult<&[u8], BatchHeader, IpcError> {
    let (input, num_rows) = uleb(input)?;

    let (mut input, node_count) = uleb(input)?;
    let mut nodes = Vec::with_capacity(capacity_for(node_count, input));
    for _ in 0..node_count {
        let (rest, length) = uleb(input)?;
        let (rest, null_count) = uleb(rest)?;
        input = rest;
        nodes.push(FieldNode::new(length, null_count));
    }

    let (mut input, buffer_count) = uleb(input)?;
    let mut buffers = Vec::with_capacity(capacity_for(buffer_count, input));
    for _ in 0..buffer_count {
        let (rest, offset) = uleb(input)?;
        let (rest, length) = uleb(rest)?;
        input = rest;
        buffers.push(BufferSpec::new(offset, length));
    }

    Ok((input, BatchHeader::new(num_rows, nodes, buffers)))
}

/// Message kind and declared body length.
pub(crate) fn parse_prelude(input: &[u8]) -> IResult<&[u8], (MessageKind, usize), IpcError> {
    let (input, version) = le_u8(input)?;
    if version != METADATA_VERSION {
        return Err(nom::Err::Failure(IpcError::corrupt(format!(
            "unsupported metadata version {version:#04X}"
        ))));
    }
    let (input, type_tag) = le_u8(input)?;
    let kind = match type_tag {
        SCHEMA_MESSAGE => MessageKind::Schema,
        RECORD_BATCH_MESSAGE => MessageKind::RecordBatch,
        _ => {
            return Err(nom::Err::Failure(IpcError::corrupt(format!(
                "unknown message type {type_tag:#04X}"
            ))))
        }
    };
    let (input, body_len) = uleb(input)?;
    Ok((input, (kind, body_len)))
}

/// Converts a parser result, reporting running out of input or malformed
/// primitives through `wrap`.
fn finish<T>(
    result: IResult<&[u8], T, IpcError>,
    wrap: fn(String) -> IpcError,
) -> Result<(&[u8], T)> {
    match result {
        Ok(parsed) => Ok(parsed),
        Err(nom::Err::Incomplete(needed)) => {
            Err(wrap(format!("metadata truncated, needed {needed:?}")))
        }
        Err(nom::Err::Error(IpcError::ParseError { error_kind }))
        | Err(nom::Err::Failure(IpcError::ParseError { error_kind })) => {
            Err(wrap(format!("metadata truncated or invalid ({error_kind:?})")))
        }
        Err(nom::Err::Error(IpcError::BoundsError { source }))
        | Err(nom::Err::Failure(IpcError::BoundsError { source })) => {
            Err(wrap(format!("metadata value out of range ({source})")))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
    }
}

/// Decodes a metadata block. Bytes after the header are padding and are
/// ignored.
pub fn decode_metadata(metadata: &[u8]) -> Result<Metadata> {
    let (input, (kind, body_len)) = finish(parse_prelude(metadata), IpcError::corrupt::<String>)?;
    let header = match kind {
        MessageKind::Schema => {
            let (_padding, schema) = finish(parse_schema(input), IpcError::malformed::<String>)?;
            MessageHeader::Schema(schema)
        }
        MessageKind::RecordBatch => {
            let (_padding, header) = finish(parse_batch_header(input), IpcError::corrupt::<String>)?;
            MessageHeader::RecordBatch(header)
        }
    };
    Ok(Metadata::new(header, body_len))
}

/// Decodes the metadata block of a schema message.
pub fn decode_schema(metadata: &[u8]) -> Result<Schema> {
    match decode_metadata(metadata)?.into_header() {
        MessageHeader::Schema(schema) => Ok(schema),
        MessageHeader::RecordBatch(_) => Err(IpcError::corrupt("expected a schema message")),
    }
}
