//! Message metadata shared by the encoder and the decoder.

use crate::schema::Schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Schema,
    RecordBatch,
}

impl MessageKind {
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Self::Schema => crate::consts::SCHEMA_MESSAGE,
            Self::RecordBatch => crate::consts::RECORD_BATCH_MESSAGE,
        }
    }
}

/// Length and null count of one array, listed in pre-order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldNode {
    length: usize,
    null_count: usize,
}

impl FieldNode {
    pub fn new(length: usize, null_count: usize) -> Self {
        Self { length, null_count }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }
}

/// Location of one buffer inside a message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSpec {
    offset: usize,
    length: usize,
}

impl BufferSpec {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchHeader {
    num_rows: usize,
    nodes: Vec<FieldNode>,
    buffers: Vec<BufferSpec>,
}

impl BatchHeader {
    pub fn new(num_rows: usize, nodes: Vec<FieldNode>, buffers: Vec<BufferSpec>) -> Self {
        Self {
            num_rows,
            nodes,
            buffers,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    pub fn buffers(&self) -> &[BufferSpec] {
        &self.buffers
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageHeader {
    Schema(Schema),
    RecordBatch(BatchHeader),
}

impl MessageHeader {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Schema(_) => MessageKind::Schema,
            Self::RecordBatch(_) => MessageKind::RecordBatch,
        }
    }
}

/// Decoded metadata block: the header plus the declared body length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    header: MessageHeader,
    body_len: usize,
}

impl Metadata {
    pub fn new(header: MessageHeader, body_len: usize) -> Self {
        Self { header, body_len }
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn into_header(self) -> MessageHeader {
        self.header
    }

    pub fn body_len(&self) -> usize {
        self.body_len
    }
}
