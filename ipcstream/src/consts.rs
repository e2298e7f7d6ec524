pub(crate) const CONTINUATION_MARKER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
pub(crate) const EOS_MARKER: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00];

/// Every metadata block, buffer, and body starts on a multiple of this.
pub(crate) const ALIGNMENT: usize = 8;

pub(crate) const METADATA_VERSION: u8 = 0x01;

pub(crate) const SCHEMA_MESSAGE: u8 = 0x01;
pub(crate) const RECORD_BATCH_MESSAGE: u8 = 0x02;

pub(crate) const MAX_NESTING_DEPTH: usize = 64;

pub(crate) const fn padding_len(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

pub(crate) const fn padded_len(len: usize) -> usize {
    len + padding_len(len)
}
