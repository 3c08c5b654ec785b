//! Structured binary encoding helpers.
//!
//! [`StructReader`] decodes little-endian integers, varints and
//! length-prefixed strings out of a block already read from storage. Every
//! short read is reported as a corrupt segment, naming the segment the block
//! came from. [`StructWriter`] is the encoding counterpart.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{ClueError, Result};
use crate::util::varint;

/// Cursor over an in-memory block of a segment file.
#[derive(Debug)]
pub struct StructReader<'a> {
    segment: &'a str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> StructReader<'a> {
    /// Create a reader over `data`; `segment` names the source in errors.
    pub fn new(segment: &'a str, data: &'a [u8]) -> Self {
        StructReader {
            segment,
            data,
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Build a corrupt-segment error for this reader's segment.
    pub fn corrupt<S: Into<String>>(&self, reason: S) -> ClueError {
        ClueError::corrupt(self.segment, reason)
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.corrupt(format!(
                "truncated {what} at offset {} (need {len} bytes, have {})",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2, "u16")?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4, "u32")?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8, "u64")?))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, used) = varint::decode_u64(&self.data[self.pos..])
            .map_err(|e| self.corrupt(format!("{e} at offset {}", self.pos)))?;
        self.pos += used;
        Ok(value)
    }

    /// Read a `u16` length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| self.corrupt(format!("invalid UTF-8 string ending at {}", self.pos)))
    }
}

/// Growable little-endian encoder.
#[derive(Debug, Default)]
pub struct StructWriter {
    buf: Vec<u8>,
}

impl StructWriter {
    pub fn new() -> Self {
        StructWriter::default()
    }

    pub fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.buf.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        varint::write_u64(&mut self.buf, value);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a `u16` length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len: u16 = value.len().try_into().map_err(|_| {
            ClueError::invalid_argument(format!(
                "string of {} bytes exceeds u16::MAX",
                value.len()
            ))
        })?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
