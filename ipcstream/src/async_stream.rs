//! Stream writer and reader over tokio's async I/O traits.
//!
//! Encoding and decoding are synchronous; only the sink and source are
//! awaited. There is no end-of-stream marker on drop: call
//! [`AsyncStreamWriter::finish`].

use crate::batch::RecordBatch;
use crate::buffer::Buffer;
use crate::consts::{padded_len, EOS_MARKER};
use crate::error::{IpcError, Result};
use crate::message::MessageHeader;
use crate::read::batch::decode_batch_header;
use crate::read::framer::{declared_body_len, finish_section, metadata_len_from_prefix, RawMessage, ReaderOptions};
use crate::read::metadata::decode_metadata;
use crate::schema::SchemaRef;
use crate::write::batch::encode_batch;
use crate::write::framer::Frame;
use crate::write::metadata::encode_schema;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

async fn write_message<W: AsyncWrite + Unpin>(
    out: &mut W,
    metadata: &[u8],
    body: &[u8],
) -> Result<usize> {
    let frame = Frame::new(metadata, body)?;
    for part in frame.parts() {
        out.write_all(part).await?;
    }
    Ok(frame.len())
}

#[derive(Debug)]
pub struct AsyncStreamWriter<W: AsyncWrite + Unpin> {
    sink: W,
    schema: SchemaRef,
    finished: bool,
    batches_written: usize,
}

impl<W: AsyncWrite + Unpin> AsyncStreamWriter<W> {
    pub async fn try_new(mut sink: W, schema: SchemaRef) -> Result<Self> {
        let metadata = encode_schema(&schema)?;
        let written = write_message(&mut sink, &metadata, &[]).await?;
        debug!(fields = schema.fields().len(), bytes = written, "wrote stream schema");

        Ok(Self {
            sink,
            schema,
            finished: false,
            batches_written: 0,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if self.finished {
            return Err(IpcError::WriterClosed);
        }
        if batch.schema().as_ref() != self.schema.as_ref() {
            return Err(IpcError::SchemaMismatch);
        }

        let (metadata, body) = encode_batch(batch)?;
        let written = write_message(&mut self.sink, &metadata, &body).await?;
        self.batches_written += 1;
        trace!(
            batch = self.batches_written,
            rows = batch.num_rows(),
            bytes = written,
            "wrote record batch"
        );
        Ok(())
    }

    /// Writes the end-of-stream marker and flushes. Calling it again is a
    /// no-op.
    pub async fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.sink.write_all(&EOS_MARKER).await?;
        self.sink.flush().await?;
        self.finished = true;
        debug!(batches = self.batches_written, "wrote end of stream");
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Hands back the sink. Unless `finish` was awaited first, the stream
    /// has no end-of-stream marker.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

async fn read_fully<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

async fn read_section<R: AsyncRead + Unpin>(source: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0; padded_len(len)];
    let filled = read_fully(source, &mut buf).await?;
    finish_section(buf, filled, len, what)
}

async fn read_message<R: AsyncRead + Unpin>(
    source: &mut R,
    options: &ReaderOptions,
) -> Result<Option<RawMessage>> {
    let mut prefix = [0; 8];
    let filled = read_fully(source, &mut prefix).await?;
    let metadata_len = match metadata_len_from_prefix(&prefix, filled, options)? {
        Some(len) => len,
        None => return Ok(None),
    };
    let metadata = read_section(source, metadata_len, "metadata").await?;
    let body_len = declared_body_len(&metadata, options)?;
    let body = read_section(source, body_len, "message body").await?;

    Ok(Some(RawMessage::new(metadata, Buffer::from(body))))
}

#[derive(Debug)]
pub struct AsyncStreamReader<R: AsyncRead + Unpin> {
    source: R,
    schema: SchemaRef,
    options: ReaderOptions,
    finished: bool,
    batches_read: usize,
}

impl<R: AsyncRead + Unpin> AsyncStreamReader<R> {
    pub async fn try_new(source: R) -> Result<Self> {
        Self::try_new_with_options(source, ReaderOptions::default()).await
    }

    pub async fn try_new_with_options(mut source: R, options: ReaderOptions) -> Result<Self> {
        let message = read_message(&mut source, &options)
            .await?
            .ok_or_else(|| IpcError::corrupt("stream ended before its schema message"))?;
        let schema = match decode_metadata(message.metadata())?.into_header() {
            MessageHeader::Schema(schema) => Arc::new(schema),
            MessageHeader::RecordBatch(_) => {
                return Err(IpcError::corrupt("stream does not start with a schema message"))
            }
        };
        debug!(fields = schema.fields().len(), "read stream schema");

        Ok(Self {
            source,
            schema,
            options,
            finished: false,
            batches_read: 0,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn read_next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.finished {
            return Ok(None);
        }

        let message = match read_message(&mut self.source, &self.options).await? {
            Some(message) => message,
            None => {
                self.finished = true;
                debug!(batches = self.batches_read, "read end of stream");
                return Ok(None);
            }
        };

        match decode_metadata(message.metadata())?.into_header() {
            MessageHeader::RecordBatch(header) => {
                let batch = decode_batch_header(&header, message.body(), &self.schema)?;
                self.batches_read += 1;
                trace!(batch = self.batches_read, rows = batch.num_rows(), "read record batch");
                Ok(Some(batch))
            }
            MessageHeader::Schema(_) => Err(IpcError::corrupt(
                "schema message in the middle of the stream",
            )),
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
