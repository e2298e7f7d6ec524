use crate::layout::BufferRole;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Malformed Schema: {reason}")]
    MalformedSchema { reason: String },

    #[error("Schema Mismatch: batch schema differs from the stream schema")]
    SchemaMismatch,

    #[error("Corrupt Stream: {reason}")]
    CorruptStream { reason: String },

    #[error("Invalid Buffer Length: buffer {index} ({role}) is {actual} bytes, expected at least {expected}")]
    InvalidBufferLength {
        index: usize,
        role: BufferRole,
        expected: usize,
        actual: usize,
    },

    #[error("Buffer Count Mismatch: schema requires {expected} buffers, metadata lists {actual}")]
    BufferCountMismatch { expected: usize, actual: usize },

    #[error("Node Count Mismatch: schema requires {expected} field nodes, metadata lists {actual}")]
    NodeCountMismatch { expected: usize, actual: usize },

    #[error("Buffer Out Of Bounds: buffer {index} spans {offset}..{offset}+{length} but the body is {body_len} bytes")]
    BufferOutOfBounds {
        index: usize,
        offset: usize,
        length: usize,
        body_len: usize,
    },

    #[error("Null Count Mismatch: declared {declared}, validity bitmap has {counted}")]
    NullCountMismatch { declared: usize, counted: usize },

    #[error("Invalid Offsets: {reason}")]
    InvalidOffsets { reason: String },

    #[error("Invalid Array: {reason}")]
    InvalidArray { reason: String },

    #[error("Invalid Record Batch: {reason}")]
    InvalidBatch { reason: String },

    #[error("Stream Writer Closed")]
    WriterClosed,

    #[error("Parse Error: {error_kind:?}")]
    ParseError { error_kind: nom::error::ErrorKind },

    #[error("Parse Incomplete: {needed:?}")]
    ParseIncompleteError { needed: nom::Needed },

    #[error("Numeric Bounds Error")]
    BoundsError {
        #[from]
        source: std::num::TryFromIntError,
    },

    #[error("IO Error")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}

impl IpcError {
    pub(crate) fn corrupt<S: Into<String>>(reason: S) -> Self {
        Self::CorruptStream {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedSchema {
            reason: reason.into(),
        }
    }
}

impl<I> nom::error::ParseError<I> for IpcError {
    fn from_error_kind(_input: I, kind: nom::error::ErrorKind) -> Self {
        IpcError::ParseError { error_kind: kind }
    }

    fn append(_input: I, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I> nom::error::ContextError<I> for IpcError {}

impl From<nom::Err<IpcError>> for IpcError {
    fn from(error: nom::Err<IpcError>) -> Self {
        match error {
            nom::Err::Incomplete(needed) => IpcError::ParseIncompleteError { needed },
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

pub type Result<T, E = IpcError> = std::result::Result<T, E>;
