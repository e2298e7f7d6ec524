use super::framer::read_message;
use super::metadata::decode_metadata;
use crate::message::{MessageHeader, Metadata};
use crate::schema::{DataType, Schema};
use humansize::{file_size_opts, FileSize};
use std::io::Cursor;
use term_table::row::Row;
use term_table::table_cell::{Alignment, TableCell};
use term_table::Table;

fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

fn italic(s: &str) -> String {
    format!("\x1b[3m{s}\x1b[0m")
}

fn human_size(bytes: usize) -> String {
    let human = bytes
        .file_size(file_size_opts::BINARY)
        .unwrap_or_else(|e| e);
    format!("{human} ({})", italic(&bytes.to_string()))
}

fn cell<T: ToString>(content: T, col_span: usize, alignment: Alignment) -> TableCell {
    TableCell::builder(content)
        .col_span(col_span)
        .alignment(alignment)
        .build()
}

fn type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::List(child) => format!("List<{}>", type_name(child.data_type())),
        DataType::Struct(children) => format!(
            "Struct<{}>",
            children
                .iter()
                .map(|child| format!("{}: {}", child.name(), type_name(child.data_type())))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        data_type => format!("{data_type:?}"),
    }
}

fn format_schema(schema: &Schema) -> String {
    let mut table = Table::new();

    table.add_row(Row::new(vec![cell(
        bold("Schema"),
        3,
        Alignment::Center,
    )]));
    table.add_row(Row::new(vec![
        cell("Field", 1, Alignment::Center),
        cell("Type", 1, Alignment::Center),
        cell("Nullable", 1, Alignment::Center),
    ]));
    for field in schema.fields() {
        table.add_row(Row::new(vec![
            TableCell::new(bold(field.name())),
            TableCell::new(type_name(field.data_type())),
            cell(field.is_nullable().to_string(), 1, Alignment::Right),
        ]));
    }

    table.render()
}

fn message_row(index: usize, metadata_len: usize, metadata: &Metadata) -> Row {
    let (kind, rows, nodes, buffers) = match metadata.header() {
        MessageHeader::Schema(schema) => ("Schema", String::new(), schema.fields().len(), 0),
        MessageHeader::RecordBatch(header) => (
            "Record Batch",
            header.num_rows().to_string(),
            header.nodes().len(),
            header.buffers().len(),
        ),
    };
    Row::new(vec![
        cell(index.to_string(), 1, Alignment::Right),
        TableCell::new(kind),
        cell(human_size(metadata_len), 1, Alignment::Right),
        cell(human_size(metadata.body_len()), 1, Alignment::Right),
        cell(rows, 1, Alignment::Right),
        cell(nodes.to_string(), 1, Alignment::Right),
        cell(buffers.to_string(), 1, Alignment::Right),
    ])
}

/// Renders the schema and a table of every message in an encoded stream.
/// Reading stops at the first error, which is rendered as the last row.
pub fn inspect(input: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut cursor = Cursor::new(input);

    // Schema
    let first = read_message(&mut cursor)
        .map_err(|e| format!("Error Reading Schema Message: {e}"))?
        .ok_or_else(|| "Error Reading Schema Message: stream is empty".to_string())?;
    let first_metadata =
        decode_metadata(first.metadata()).map_err(|e| format!("Error Decoding Schema: {e}"))?;
    match first_metadata.header() {
        MessageHeader::Schema(schema) => out.push_str(&format_schema(schema)),
        MessageHeader::RecordBatch(_) => {
            return Err("Error Decoding Schema: first message is not a schema".to_string())
        }
    }
    out.push_str("\n\n");

    // Messages
    let mut table = Table::new();
    table.add_row(Row::new(vec![cell(
        bold("Messages"),
        7,
        Alignment::Center,
    )]));
    table.add_row(Row::new(
        ["#", "Kind", "Metadata", "Body", "Rows", "Nodes", "Buffers"]
            .into_iter()
            .map(|title| cell(title, 1, Alignment::Center))
            .collect::<Vec<_>>(),
    ));
    table.add_row(message_row(0, first.metadata().len(), &first_metadata));

    let mut index = 1;
    loop {
        let outcome = read_message(&mut cursor).and_then(|maybe_message| {
            maybe_message
                .map(|message| {
                    decode_metadata(message.metadata())
                        .map(|metadata| (message.metadata().len(), metadata))
                })
                .transpose()
        });
        match outcome {
            Ok(Some((metadata_len, metadata))) => {
                table.add_row(message_row(index, metadata_len, &metadata));
                index += 1;
            }
            Ok(None) => {
                table.add_row(Row::new(vec![cell(
                    italic(&format!("end of stream after {} bytes", cursor.position())),
                    7,
                    Alignment::Center,
                )]));
                break;
            }
            Err(e) => {
                table.add_row(Row::new(vec![cell(
                    format!("{e}"),
                    7,
                    Alignment::Left,
                )]));
                break;
            }
        }
    }
    out.push_str(&table.render());

    Ok(out)
}
