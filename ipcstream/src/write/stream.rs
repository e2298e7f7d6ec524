use super::batch::encode_batch;
use super::framer::{write_eos, write_message};
use super::metadata::encode_schema;
use crate::batch::RecordBatch;
use crate::error::{IpcError, Result};
use crate::schema::SchemaRef;
use std::io::Write;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Keep the sink after `finish` so it can be reclaimed with
    /// [`StreamWriter::into_inner`]. When false the sink is dropped once the
    /// end-of-stream marker is flushed.
    pub leave_open: bool,
}

/// Writes a schema message on construction, one message per batch, and the
/// end-of-stream marker on [`finish`](StreamWriter::finish) or drop.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    sink: Option<W>,
    schema: SchemaRef,
    options: WriterOptions,
    finished: bool,
    batches_written: usize,
}

impl<W: Write> StreamWriter<W> {
    pub fn try_new(sink: W, schema: SchemaRef) -> Result<Self> {
        Self::try_new_with_options(sink, schema, WriterOptions::default())
    }

    pub fn try_new_with_options(mut sink: W, schema: SchemaRef, options: WriterOptions) -> Result<Self> {
        let metadata = encode_schema(&schema)?;
        let written = write_message(&mut sink, &metadata, &[])?;
        debug!(fields = schema.fields().len(), bytes = written, "wrote stream schema");

        Ok(Self {
            sink: Some(sink),
            schema,
            options,
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

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if self.finished {
            return Err(IpcError::WriterClosed);
        }
        if batch.schema().as_ref() != self.schema.as_ref() {
            return Err(IpcError::SchemaMismatch);
        }
        let sink = self.sink.as_mut().ok_or(IpcError::WriterClosed)?;

        let (metadata, body) = encode_batch(batch)?;
        let written = write_message(sink, &metadata, &body)?;
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
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let sink = self.sink.as_mut().ok_or(IpcError::WriterClosed)?;
        write_eos(sink)?;
        sink.flush()?;
        self.finished = true;
        debug!(batches = self.batches_written, "wrote end of stream");

        if !self.options.leave_open {
            self.sink = None;
        }
        Ok(())
    }

    /// The sink, unless it was dropped by `finish`.
    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.sink.as_mut()
    }

    /// Finishes the stream and hands back the sink. Fails with
    /// `WriterClosed` when the sink was already dropped.
    pub fn into_inner(mut self) -> Result<W> {
        if !self.finished {
            self.options.leave_open = true;
            self.finish()?;
        }
        self.sink.take().ok_or(IpcError::WriterClosed)
    }
}

impl<W: Write> Drop for StreamWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish() {
                warn!(error = %e, "failed to finish stream on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PrimitiveBuilder;
    use crate::schema::{DataType, Field, Schema};
    use assert_matches::assert_matches;
    use std::io;
    use std::sync::Arc;

    fn schema() -> SchemaRef {
        Arc::new(Schema::with_fields(vec![Field::new("v", DataType::Int8, false)]))
    }

    fn batch(schema: &SchemaRef, values: &[i8]) -> RecordBatch {
        let mut builder = PrimitiveBuilder::<i8>::default();
        values.iter().for_each(|v| builder.append_value(*v));
        RecordBatch::try_new(schema.clone(), vec![builder.finish().unwrap()]).unwrap()
    }

    #[test]
    fn test_schema_written_on_construction() {
        let writer = StreamWriter::try_new_with_options(
            vec![],
            schema(),
            WriterOptions { leave_open: true },
        )
        .unwrap();
        #[rustfmt::skip]
        assert_eq!(writer.get_ref().unwrap(),
                   &[0xFF, 0xFF, 0xFF, 0xFF, // continuation marker
                     0x08, 0x00, 0x00, 0x00, // metadata length
                     0x01, // metadata version
                     0x01, // message type: schema
                     0x00, // body length
                     0x01, // field count
                     0x01, // name length
                     b'v',
                     0x00, // not nullable
                     0x02]); // type: int8
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut writer = StreamWriter::try_new_with_options(
            vec![],
            schema(),
            WriterOptions { leave_open: true },
        )
        .unwrap();
        assert!(writer.finish().is_ok());
        assert!(writer.finish().is_ok());
        let buf = writer.into_inner().unwrap();
        assert_eq!(buf.len(), 16 + 8);
        assert_eq!(&buf[16..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_write_after_finish() {
        let schema = schema();
        let mut writer = StreamWriter::try_new(vec![], schema.clone()).unwrap();
        writer.finish().unwrap();
        assert!(writer.is_finished());
        assert!(writer.get_ref().is_none());
        assert_matches!(writer.write_batch(&batch(&schema, &[1])), Err(IpcError::WriterClosed));
        assert_matches!(writer.into_inner(), Err(IpcError::WriterClosed));
    }

    #[test]
    fn test_schema_mismatch() {
        let mut writer = StreamWriter::try_new(vec![], schema()).unwrap();
        let other = Arc::new(Schema::with_fields(vec![Field::new("v", DataType::Int8, true)]));
        assert_matches!(writer.write_batch(&batch(&other, &[1])), Err(IpcError::SchemaMismatch));
        assert_eq!(writer.batches_written(), 0);
    }

    #[test]
    fn test_structurally_equal_schema_accepted() {
        let mut writer = StreamWriter::try_new(vec![], schema()).unwrap();
        assert!(writer.write_batch(&batch(&schema(), &[1, 2])).is_ok());
        assert_eq!(writer.batches_written(), 1);
    }

    #[test]
    fn test_into_inner_finishes() {
        let schema = schema();
        let mut writer = StreamWriter::try_new(vec![], schema.clone()).unwrap();
        writer.write_batch(&batch(&schema, &[5])).unwrap();
        let buf = writer.into_inner().unwrap();
        assert!(buf.ends_with(&[0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00]));
    }

    /// Records whether it was dropped.
    struct Tracked<'a> {
        buf: Vec<u8>,
        dropped: &'a std::cell::Cell<bool>,
    }

    impl Write for Tracked<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    #[test]
    fn test_leave_open() {
        let dropped = std::cell::Cell::new(false);
        let sink = Tracked {
            buf: vec![],
            dropped: &dropped,
        };
        let mut writer =
            StreamWriter::try_new_with_options(sink, schema(), WriterOptions { leave_open: true })
                .unwrap();
        writer.finish().unwrap();
        assert!(!dropped.get());
        assert!(writer.get_mut().unwrap().write_all(b"more").is_ok());
        assert!(writer.get_ref().unwrap().buf.ends_with(b"more"));

        let closed = std::cell::Cell::new(false);
        let sink = Tracked {
            buf: vec![],
            dropped: &closed,
        };
        let mut writer = StreamWriter::try_new(sink, schema()).unwrap();
        writer.finish().unwrap();
        assert!(closed.get());
    }

    #[derive(Debug)]
    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_io_failure_surfaces() {
        assert_matches!(
            StreamWriter::try_new(FailingSink, schema()),
            Err(IpcError::IOError { source }) => {
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
        );
    }
}
