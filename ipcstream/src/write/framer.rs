use crate::consts::{padded_len, padding_len, CONTINUATION_MARKER, EOS_MARKER};
use crate::error::Result;
use std::convert::TryFrom;
use std::io::Write;

const ZEROS: [u8; 8] = [0; 8];

/// Frame prefix for a metadata block of `metadata_len` bytes: the marker and
/// the padded metadata length.
pub(crate) fn message_prefix(metadata_len: usize) -> Result<[u8; 8]> {
    let declared = u32::try_from(padded_len(metadata_len))?;
    let mut prefix = [0; 8];
    prefix[..4].copy_from_slice(&CONTINUATION_MARKER);
    prefix[4..].copy_from_slice(&declared.to_le_bytes());
    Ok(prefix)
}

/// One framed message, borrowed from its metadata and body. Sync and async
/// writers both emit [`Frame::parts`] in order.
pub(crate) struct Frame<'a> {
    prefix: [u8; 8],
    metadata: &'a [u8],
    body: &'a [u8],
}

impl<'a> Frame<'a> {
    pub(crate) fn new(metadata: &'a [u8], body: &'a [u8]) -> Result<Self> {
        Ok(Self {
            prefix: message_prefix(metadata.len())?,
            metadata,
            body,
        })
    }

    #[rustfmt::skip]
    pub(crate) fn parts(&self) -> [&[u8]; 5] {
        [&self.prefix[..],                              // 8 bytes - marker, metadata length
         self.metadata,                                 // ? bytes - metadata
         &ZEROS[..padding_len(self.metadata.len())],    // ? bytes - metadata padding
         self.body,                                     // ? bytes - body
         &ZEROS[..padding_len(self.body.len())]]        // ? bytes - body padding
    }

    /// Bytes on the wire, padding included.
    pub(crate) fn len(&self) -> usize {
        self.prefix.len() + padded_len(self.metadata.len()) + padded_len(self.body.len())
    }
}

/// Writes one framed message and returns the number of bytes written.
/// Metadata and body are each zero padded to a multiple of 8.
pub fn write_message<W: Write>(out: &mut W, metadata: &[u8], body: &[u8]) -> Result<usize> {
    let frame = Frame::new(metadata, body)?;
    for part in frame.parts() {
        out.write_all(part)?;
    }
    Ok(frame.len())
}

pub fn write_eos<W: Write>(out: &mut W) -> Result<usize> {
    out.write_all(&EOS_MARKER)?;
    Ok(EOS_MARKER.len())
}
