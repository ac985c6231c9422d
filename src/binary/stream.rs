//! Bounds-checked little-endian access to an in-memory FBX buffer.
//!
//! Reading works over a borrowed slice (a loaded buffer or a memory map);
//! writing appends to a `Vec<u8>`, whose length is always the absolute
//! position of the next byte.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::format::{CodecContext, Width};
use crate::util::{Error, Result};

/// Cursor over an input buffer.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    /// Total buffer length.
    #[inline]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the cursor.
    #[inline]
    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }

    /// Move the cursor to an absolute position within the buffer.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(Error::UnexpectedEof(pos));
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::UnexpectedEof(self.pos as u64 + len as u64))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Everything from the cursor to the end of the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Read one width-dependent header field, widened to `u64`.
    pub fn read_field(&mut self, ctx: CodecContext) -> Result<u64> {
        match ctx.width {
            Width::Narrow => Ok(self.read_u32()? as u64),
            Width::Wide => self.read_u64(),
        }
    }
}

/// Append one width-dependent header field.
///
/// Narrow documents cannot address past 4 GiB; larger values are a write
/// failure rather than a silent truncation.
pub fn write_field(out: &mut Vec<u8>, ctx: CodecContext, value: u64) -> Result<()> {
    match ctx.width {
        Width::Narrow => {
            let v = u32::try_from(value).map_err(|_| {
                Error::other(format!("value {} does not fit a 32-bit header field", value))
            })?;
            out.write_u32::<LittleEndian>(v)?;
        }
        Width::Wide => out.write_u64::<LittleEndian>(value)?,
    }
    Ok(())
}

/// Overwrite a field previously written at `at` (the back-patch step).
pub fn patch_field(out: &mut [u8], at: usize, ctx: CodecContext, value: u64) -> Result<()> {
    match ctx.width {
        Width::Narrow => {
            let v = u32::try_from(value).map_err(|_| {
                Error::other(format!("offset {} does not fit a 32-bit header field", value))
            })?;
            LittleEndian::write_u32(&mut out[at..at + 4], v);
        }
        Width::Wide => LittleEndian::write_u64(&mut out[at..at + 8], value),
    }
    Ok(())
}
