//! Bitmaps are packed least-significant bit first: element `i` lives in bit
//! `i % 8` of byte `i / 8`.

pub fn bytes_for(bits: usize) -> usize {
    bits / 8 + usize::from(bits % 8 != 0)
}

pub fn get_bit(data: &[u8], i: usize) -> bool {
    data[i / 8] & (1 << (i % 8)) != 0
}

pub fn set_bit(data: &mut [u8], i: usize) {
    data[i / 8] |= 1 << (i % 8);
}

pub fn unset_bit(data: &mut [u8], i: usize) {
    data[i / 8] &= !(1 << (i % 8));
}

/// Number of set bits in `[offset, offset + len)`.
pub fn count_set_bits(data: &[u8], offset: usize, len: usize) -> usize {
    let end = offset + len;
    let mut i = offset;
    let mut count = 0;

    // leading partial byte
    while i < end && i % 8 != 0 {
        count += usize::from(get_bit(data, i));
        i += 1;
    }
    // whole bytes
    while i + 8 <= end {
        count += data[i / 8].count_ones() as usize;
        i += 8;
    }
    // trailing partial byte
    while i < end {
        count += usize::from(get_bit(data, i));
        i += 1;
    }

    count
}

pub fn count_unset_bits(data: &[u8], offset: usize, len: usize) -> usize {
    len - count_set_bits(data, offset, len)
}

/// Copies the bits `[offset, offset + len)` into a fresh bitmap starting at
/// bit 0. Bits past `len` in the last byte are zero.
pub fn rebase(data: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let byte_offset = offset / 8;
    let shift = offset % 8;
    let mut out = vec![0; bytes_for(len)];

    if shift == 0 {
        let n = out.len();
        out.copy_from_slice(&data[byte_offset..byte_offset + n]);
    } else {
        for (i, byte) in out.iter_mut().enumerate() {
            let src = byte_offset + i;
            let low = data[src] >> shift;
            let high = data.get(src + 1).map_or(0, |next| next << (8 - shift));
            *byte = low | high;
        }
    }

    let trailing = len % 8;
    if let (Some(last), true) = (out.last_mut(), trailing != 0) {
        *last &= (1 << trailing) - 1;
    }

    out
}
