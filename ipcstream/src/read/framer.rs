use super::metadata::parse_prelude;
use crate::buffer::Buffer;
use crate::consts::{padded_len, CONTINUATION_MARKER};
use crate::error::{IpcError, Result};
use std::io::{ErrorKind, Read};

/// Allocation limits applied while reading messages. A message declaring a
/// larger metadata block or body is rejected as corrupt before anything is
/// allocated for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderOptions {
    pub max_metadata_len: usize,
    pub max_body_len: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_metadata_len: 16 * 1024 * 1024,
            max_body_len: 1024 * 1024 * 1024,
        }
    }
}

/// One framed message: metadata without its trailing frame padding, and
/// the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    metadata: Vec<u8>,
    body: Buffer,
}

impl RawMessage {
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn body(&self) -> &Buffer {
        &self.body
    }

    pub fn into_parts(self) -> (Vec<u8>, Buffer) {
        (self.metadata, self.body)
    }

    pub(crate) fn new(metadata: Vec<u8>, body: Buffer) -> Self {
        Self { metadata, body }
    }
}

/// Checks the continuation marker and returns the declared metadata length,
/// or `None` for the end-of-stream marker.
fn decode_prefix(prefix: &[u8; 8], options: &ReaderOptions) -> Result<Option<usize>> {
    if prefix[..4] != CONTINUATION_MARKER {
        return Err(IpcError::corrupt(format!(
            "expected continuation marker, found {:02X?}",
            &prefix[..4]
        )));
    }
    let mut raw = [0; 4];
    raw.copy_from_slice(&prefix[4..]);
    let metadata_len = usize::try_from(u32::from_le_bytes(raw))?;
    if metadata_len == 0 {
        return Ok(None);
    }
    if metadata_len > options.max_metadata_len {
        return Err(IpcError::corrupt(format!(
            "metadata length {metadata_len} exceeds the limit of {}",
            options.max_metadata_len
        )));
    }
    Ok(Some(metadata_len))
}

/// Interprets a prefix of which `filled` bytes could be read. `None` when the
/// input ended cleanly at the message boundary or at the end-of-stream marker.
pub(crate) fn metadata_len_from_prefix(
    prefix: &[u8; 8],
    filled: usize,
    options: &ReaderOptions,
) -> Result<Option<usize>> {
    match filled {
        0 => Ok(None),
        8 => decode_prefix(prefix, options),
        n => Err(IpcError::corrupt(format!(
            "stream ends inside a message prefix after {n} bytes"
        ))),
    }
}

/// Checks that a section read into `buf` (sized to the padded length) was
/// complete, and strips the padding.
pub(crate) fn finish_section(mut buf: Vec<u8>, filled: usize, len: usize, what: &str) -> Result<Vec<u8>> {
    if filled < buf.len() {
        return Err(IpcError::corrupt(format!(
            "stream ends inside the {what}: expected {} bytes, found {filled}",
            buf.len()
        )));
    }
    buf.truncate(len);
    Ok(buf)
}

/// Body length declared by a metadata block.
pub(crate) fn declared_body_len(metadata: &[u8], options: &ReaderOptions) -> Result<usize> {
    let (_, (_kind, body_len)) = parse_prelude(metadata).map_err(|e| match IpcError::from(e) {
        e @ IpcError::CorruptStream { .. } => e,
        e => IpcError::corrupt(format!("unreadable metadata prelude: {e}")),
    })?;
    if body_len > options.max_body_len {
        return Err(IpcError::corrupt(format!(
            "body length {body_len} exceeds the limit of {}",
            options.max_body_len
        )));
    }
    Ok(body_len)
}

/// Fills `buf` as far as the source allows and returns the number of bytes
/// read. Only a zero-byte read ends the loop early.
fn read_fully<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn read_section<R: Read>(source: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0; padded_len(len)];
    let filled = read_fully(source, &mut buf)?;
    finish_section(buf, filled, len, what)
}

/// Reads the next message. Returns `None` at the end-of-stream marker, or
/// when the source is exhausted exactly at a message boundary.
pub fn read_message<R: Read>(source: &mut R) -> Result<Option<RawMessage>> {
    read_message_with_options(source, &ReaderOptions::default())
}

pub fn read_message_with_options<R: Read>(
    source: &mut R,
    options: &ReaderOptions,
) -> Result<Option<RawMessage>> {
    let mut prefix = [0; 8];
    let filled = read_fully(source, &mut prefix)?;
    let metadata_len = match metadata_len_from_prefix(&prefix, filled, options)? {
        Some(len) => len,
        None => return Ok(None),
    };
    let metadata = read_section(source, metadata_len, "metadata")?;
    let body_len = declared_body_len(&metadata, options)?;
    let body = read_section(source, body_len, "message body")?;

    Ok(Some(RawMessage::new(metadata, Buffer::from(body))))
}
