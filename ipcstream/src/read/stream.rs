use super::batch::decode_batch_header;
use super::framer::{read_message_with_options, ReaderOptions};
use super::metadata::decode_metadata;
use crate::batch::RecordBatch;
use crate::error::{IpcError, Result};
use crate::message::MessageHeader;
use crate::schema::SchemaRef;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reads the schema message on construction, then one batch per call until
/// the end-of-stream marker.
#[derive(Debug)]
pub struct StreamReader<R: Read> {
    source: R,
    schema: SchemaRef,
    options: ReaderOptions,
    finished: bool,
    batches_read: usize,
}

impl<R: Read> StreamReader<R> {
    pub fn try_new(source: R) -> Result<Self> {
        Self::try_new_with_options(source, ReaderOptions::default())
    }

    pub fn try_new_with_options(mut source: R, options: ReaderOptions) -> Result<Self> {
        let message = read_message_with_options(&mut source, &options)?
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

    /// True once the end-of-stream marker was read.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn batches_read(&self) -> usize {
        self.batches_read
    }

    /// The next batch, or `None` once the stream has ended. Keeps returning
    /// `None` after that.
    pub fn read_next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.finished {
            return Ok(None);
        }

        let message = match read_message_with_options(&mut self.source, &self.options)? {
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
                trace!(
                    batch = self.batches_read,
                    rows = batch.num_rows(),
                    body_bytes = message.body().len(),
                    "read record batch"
                );
                Ok(Some(batch))
            }
            MessageHeader::Schema(_) => Err(IpcError::corrupt(
                "schema message in the middle of the stream",
            )),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Yields batches until the end of the stream. The first error is yielded
/// once and ends the iteration.
impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.read_next_batch().transpose();
        if let Some(Err(_)) = next {
            self.finished = true;
        }
        next
    }
}
