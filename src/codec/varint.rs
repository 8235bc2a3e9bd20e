//! Unsigned varint primitives shared by the header codec and the frame reader.
//!
//! Values are written seven bits at a time, least significant group first,
//! with the high bit of each byte set when another byte follows.

use bytes::BufMut;

/// Maximum number of bytes a `u64` varint can occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Returned when a varint exceeds its permitted maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VarintOverflow;

/// Return the number of bytes needed to encode `value`.
///
/// # Examples
///
/// ```
/// use sessionwire::codec::uvarint_len;
///
/// assert_eq!(uvarint_len(0), 1);
/// assert_eq!(uvarint_len(127), 1);
/// assert_eq!(uvarint_len(128), 2);
/// assert_eq!(uvarint_len(u64::MAX), 10);
/// ```
#[must_use]
pub fn uvarint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append the varint encoding of `value` to `dst`, returning the bytes written.
pub fn put_uvarint<B: BufMut + ?Sized>(dst: &mut B, mut value: u64) -> usize {
    let mut written = 1;
    while value >= 0x80 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "masked to the low seven bits"
        )]
        dst.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
        written += 1;
    }
    #[expect(clippy::cast_possible_truncation, reason = "value < 0x80 here")]
    dst.put_u8(value as u8);
    written
}

/// Incremental varint decoder bounded by a maximum value.
///
/// Bytes are fed one at a time so the same state machine serves buffered
/// slices and bytes pulled from a socket.
#[derive(Clone, Copy, Debug)]
pub(crate) struct UvarintDecoder {
    max: u64,
    value: u64,
    shift: u32,
    consumed: usize,
}

impl UvarintDecoder {
    pub(crate) const fn new(max: u64) -> Self {
        Self {
            max,
            value: 0,
            shift: 0,
            consumed: 0,
        }
    }

    /// Number of bytes fed so far.
    pub(crate) const fn consumed(&self) -> usize { self.consumed }

    /// Feed the next byte. Returns the decoded value once the final byte
    /// arrives and `None` while more bytes are required.
    pub(crate) fn push(&mut self, byte: u8) -> Result<Option<u64>, VarintOverflow> {
        self.consumed += 1;
        if self.consumed > MAX_VARINT_LEN || (self.shift == 63 && byte > 1) {
            return Err(VarintOverflow);
        }
        self.value |= u64::from(byte & 0x7f) << self.shift;
        // Lower groups arrive first, so a partial value above the bound can
        // only grow.
        if self.value > self.max {
            return Err(VarintOverflow);
        }
        if byte & 0x80 == 0 {
            return Ok(Some(self.value));
        }
        self.shift += 7;
        Ok(None)
    }
}

/// Decode a varint from the front of `src` without consuming it.
///
/// Returns `Ok(None)` when `src` ends before the final byte.
pub(crate) fn decode_uvarint(src: &[u8], max: u64) -> Result<Option<(u64, usize)>, VarintOverflow> {
    let mut decoder = UvarintDecoder::new(max);
    for &byte in src {
        if let Some(value) = decoder.push(byte)? {
            return Ok(Some((value, decoder.consumed())));
        }
    }
    Ok(None)
}
