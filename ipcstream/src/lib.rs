//! Streaming columnar record batches.
//!
//! A stream is a schema message, any number of record batch messages, and an
//! end-of-stream marker. Every message is a length-prefixed metadata block
//! followed by a body whose buffers all start on 8-byte boundaries, so the
//! decoded arrays are views into the bytes read from the wire.
//!
//! ```
//! use ipcstream::builder::PrimitiveBuilder;
//! use ipcstream::schema::{DataType, Field, Schema};
//! use ipcstream::{RecordBatch, StreamReader, StreamWriter, WriterOptions};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::with_fields(vec![Field::new("v", DataType::Int32, false)]));
//! let mut builder = PrimitiveBuilder::<i32>::default();
//! builder.append_value(1);
//! builder.append_value(2);
//! let batch = RecordBatch::try_new(schema.clone(), vec![builder.finish()?])?;
//!
//! let mut writer =
//!     StreamWriter::try_new_with_options(Vec::new(), schema, WriterOptions { leave_open: true })?;
//! writer.write_batch(&batch)?;
//! let bytes = writer.into_inner()?;
//!
//! let mut reader = StreamReader::try_new(&bytes[..])?;
//! assert_eq!(reader.read_next_batch()?, Some(batch));
//! assert_eq!(reader.read_next_batch()?, None);
//! # Ok::<(), ipcstream::error::IpcError>(())
//! ```

pub mod array;
#[cfg(feature = "tokio")]
pub mod async_stream;
pub mod batch;
pub mod bit_util;
pub mod buffer;
pub mod builder;
mod consts;
pub mod error;
pub mod layout;
pub mod message;
pub mod read;
pub mod schema;
pub mod types;
pub mod write;

pub use array::ArrayData;
pub use batch::RecordBatch;
pub use buffer::{Buffer, MutableBuffer};
pub use error::{IpcError, Result};
pub use read::batch::decode_batch;
pub use read::framer::{read_message, read_message_with_options, RawMessage, ReaderOptions};
pub use read::metadata::{decode_metadata, decode_schema};
pub use read::stream::StreamReader;
pub use schema::{DataType, Field, Schema, SchemaRef};
pub use write::batch::encode_batch;
pub use write::framer::{write_eos, write_message};
pub use write::metadata::{encode_metadata, encode_schema};
pub use write::stream::{StreamWriter, WriterOptions};

#[cfg(feature = "tokio")]
pub use async_stream::{AsyncStreamReader, AsyncStreamWriter};
