//! LEB128 varints.
//!
//! Seven payload bits per byte, least significant group first; a set high
//! bit means another byte follows. A `u64` needs at most [`MAX_VARINT_LEN`]
//! bytes, and the last of those may only carry a single payload bit.

use crate::error::{ClueError, Result};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the encoding of `value` to `out`.
pub fn write_u64(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode one varint from the front of `bytes`, returning the value and the
/// number of bytes it occupied.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        let payload = u64::from(byte & 0x7F);
        if i == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(ClueError::invalid_data("varint overflows u64"));
        }
        value |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if bytes.len() >= MAX_VARINT_LEN {
        Err(ClueError::invalid_data("varint longer than 10 bytes"))
    } else {
        Err(ClueError::invalid_data("incomplete varint"))
    }
}
