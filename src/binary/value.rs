//! Tagged leaf values (properties) and their binary encoding.
//!
//! ```text
//! scalar:  code:u8  value (2/1/4/8/4/8 bytes for Y/C/I/L/F/D)
//! string:  code:u8  len:u32  bytes[len]            (S, R)
//! array:   code:u8  count:u32  encoding:u32  byte_len:u32  bytes[byte_len]
//! ```
//!
//! Array payloads are packed little-endian elements, zlib-compressed when
//! `encoding != 0`. Arrays are always written uncompressed.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::format::{MAX_ARRAY_BYTES, MAX_DEFLATE_RATIO};
use super::stream::ByteReader;
use crate::core::compression::inflate;
use crate::util::{Error, Result};

/// Single-character type code preceding every property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    I16 = b'Y',
    U8 = b'C',
    I32 = b'I',
    I64 = b'L',
    F32 = b'F',
    F64 = b'D',
    I32Array = b'i',
    I64Array = b'l',
    F32Array = b'f',
    F64Array = b'd',
    U8Array = b'b',
    String = b'S',
    Raw = b'R',
}

impl TypeCode {
    /// Decode a type byte.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            b'Y' => Self::I16,
            b'C' => Self::U8,
            b'I' => Self::I32,
            b'L' => Self::I64,
            b'F' => Self::F32,
            b'D' => Self::F64,
            b'i' => Self::I32Array,
            b'l' => Self::I64Array,
            b'f' => Self::F32Array,
            b'd' => Self::F64Array,
            b'b' => Self::U8Array,
            b'S' => Self::String,
            b'R' => Self::Raw,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    /// Element size for array codes, `None` for everything else.
    pub fn element_size(self) -> Option<usize> {
        match self {
            Self::I32Array | Self::F32Array => Some(4),
            Self::I64Array | Self::F64Array => Some(8),
            Self::U8Array => Some(1),
            _ => None,
        }
    }
}

/// One tagged leaf value of a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    I16(i16),
    U8(u8),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    U8Array(Vec<u8>),
    String(String),
    Raw(Vec<u8>),
}

impl Property {
    /// Type code of this value.
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::I16(_) => TypeCode::I16,
            Self::U8(_) => TypeCode::U8,
            Self::I32(_) => TypeCode::I32,
            Self::I64(_) => TypeCode::I64,
            Self::F32(_) => TypeCode::F32,
            Self::F64(_) => TypeCode::F64,
            Self::I32Array(_) => TypeCode::I32Array,
            Self::I64Array(_) => TypeCode::I64Array,
            Self::F32Array(_) => TypeCode::F32Array,
            Self::F64Array(_) => TypeCode::F64Array,
            Self::U8Array(_) => TypeCode::U8Array,
            Self::String(_) => TypeCode::String,
            Self::Raw(_) => TypeCode::Raw,
        }
    }

    /// Element count for arrays, `None` for scalars and strings.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Self::I32Array(v) => Some(v.len()),
            Self::I64Array(v) => Some(v.len()),
            Self::F32Array(v) => Some(v.len()),
            Self::F64Array(v) => Some(v.len()),
            Self::U8Array(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Exact number of bytes [`write`](Self::write) will emit.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Self::I16(_) => 2,
            Self::U8(_) => 1,
            Self::I32(_) | Self::F32(_) => 4,
            Self::I64(_) | Self::F64(_) => 8,
            Self::String(s) => 4 + s.len(),
            Self::Raw(b) => 4 + b.len(),
            other => {
                let code = other.type_code();
                let n = other.array_len().unwrap_or(0);
                12 + n * code.element_size().unwrap_or(0)
            }
        }
    }

    /// Read one property: type byte then payload.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let byte = r.read_u8()?;
        let code = TypeCode::from_u8(byte).ok_or(Error::UnknownPropertyType(byte))?;
        match code {
            TypeCode::I16 => Ok(Self::I16(r.read_i16()?)),
            TypeCode::U8 => Ok(Self::U8(r.read_u8()?)),
            TypeCode::I32 => Ok(Self::I32(r.read_i32()?)),
            TypeCode::I64 => Ok(Self::I64(r.read_i64()?)),
            TypeCode::F32 => Ok(Self::F32(r.read_f32()?)),
            TypeCode::F64 => Ok(Self::F64(r.read_f64()?)),
            TypeCode::String => {
                let len = r.read_u32()? as usize;
                Ok(Self::String(String::from_utf8(r.take(len)?.to_vec())?))
            }
            TypeCode::Raw => {
                let len = r.read_u32()? as usize;
                Ok(Self::Raw(r.take(len)?.to_vec()))
            }
            array => read_array(array, r),
        }
    }

    /// Append type byte and payload to `out`.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(self.type_code().as_u8());
        match self {
            Self::I16(v) => out.write_i16::<LittleEndian>(*v)?,
            Self::U8(v) => out.push(*v),
            Self::I32(v) => out.write_i32::<LittleEndian>(*v)?,
            Self::I64(v) => out.write_i64::<LittleEndian>(*v)?,
            Self::F32(v) => out.write_f32::<LittleEndian>(*v)?,
            Self::F64(v) => out.write_f64::<LittleEndian>(*v)?,
            Self::String(s) => write_blob(out, s.as_bytes())?,
            Self::Raw(b) => write_blob(out, b)?,
            Self::I32Array(v) => {
                write_array_header(out, v.len(), 4)?;
                v.iter().try_for_each(|x| out.write_i32::<LittleEndian>(*x))?;
            }
            Self::I64Array(v) => {
                write_array_header(out, v.len(), 8)?;
                v.iter().try_for_each(|x| out.write_i64::<LittleEndian>(*x))?;
            }
            Self::F32Array(v) => {
                write_array_header(out, v.len(), 4)?;
                v.iter().try_for_each(|x| out.write_f32::<LittleEndian>(*x))?;
            }
            Self::F64Array(v) => {
                write_array_header(out, v.len(), 8)?;
                v.iter().try_for_each(|x| out.write_f64::<LittleEndian>(*x))?;
            }
            Self::U8Array(v) => {
                write_array_header(out, v.len(), 1)?;
                out.extend_from_slice(v);
            }
        }
        Ok(())
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::I16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        match self {
            Self::I32Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64_slice(&self) -> Option<&[i64]> {
        match self {
            Self::I64Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            Self::F32Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            Self::F64Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8_slice(&self) -> Option<&[u8]> {
        match self {
            Self::U8Array(v) => Some(v),
            _ => None,
        }
    }
}

/// Read the array header and payload for an array type code.
fn read_array(code: TypeCode, r: &mut ByteReader<'_>) -> Result<Property> {
    let elem_size = code
        .element_size()
        .ok_or(Error::UnknownPropertyType(code.as_u8()))?;
    let count = r.read_u32()?;
    let encoding = r.read_u32()?;
    let compressed_len = r.read_u32()?;

    // Some writers emit garbage lengths alongside an empty array.
    if count == 0 {
        return Ok(decode_elements(code, &[], 0));
    }
    if compressed_len == 0 {
        return Err(Error::CorruptArrayLength { count });
    }

    let byte_len = count as u64 * elem_size as u64;
    if byte_len > MAX_ARRAY_BYTES {
        return Err(Error::ArrayTooLarge {
            bytes: byte_len,
            reason: "exceeds the per-array ceiling",
        });
    }

    if encoding == 0 {
        let bytes = r.take(byte_len as usize)?;
        Ok(decode_elements(code, bytes, count as usize))
    } else {
        if byte_len > compressed_len as u64 * MAX_DEFLATE_RATIO {
            return Err(Error::ArrayTooLarge {
                bytes: byte_len,
                reason: "beyond the maximum DEFLATE ratio for its compressed size",
            });
        }
        let compressed = r.take(compressed_len as usize)?;
        let bytes = inflate(compressed, byte_len as usize)?;
        Ok(decode_elements(code, &bytes, count as usize))
    }
}

/// Unpack little-endian elements. `bytes` holds exactly `count` elements.
fn decode_elements(code: TypeCode, bytes: &[u8], count: usize) -> Property {
    match code {
        TypeCode::I32Array => {
            let mut v = vec![0i32; count];
            LittleEndian::read_i32_into(bytes, &mut v);
            Property::I32Array(v)
        }
        TypeCode::I64Array => {
            let mut v = vec![0i64; count];
            LittleEndian::read_i64_into(bytes, &mut v);
            Property::I64Array(v)
        }
        TypeCode::F32Array => {
            let mut v = vec![0f32; count];
            LittleEndian::read_f32_into(bytes, &mut v);
            Property::F32Array(v)
        }
        TypeCode::F64Array => {
            let mut v = vec![0f64; count];
            LittleEndian::read_f64_into(bytes, &mut v);
            Property::F64Array(v)
        }
        _ => Property::U8Array(bytes.to_vec()),
    }
}

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::other(format!("{} byte string exceeds u32 length", bytes.len())))?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Uncompressed array header: count, encoding 0, payload byte length.
fn write_array_header(out: &mut Vec<u8>, count: usize, elem_size: usize) -> Result<()> {
    let too_long = || Error::other(format!("array of {} elements exceeds u32 length", count));
    let n = u32::try_from(count).map_err(|_| too_long())?;
    let byte_len = u32::try_from(count * elem_size).map_err(|_| too_long())?;
    out.write_u32::<LittleEndian>(n)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(byte_len)?;
    Ok(())
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.type_code().as_char();
        match self {
            Self::I16(v) => write!(f, "{}:{}", code, v),
            Self::U8(v) => write!(f, "{}:{}", code, v),
            Self::I32(v) => write!(f, "{}:{}", code, v),
            Self::I64(v) => write!(f, "{}:{}", code, v),
            Self::F32(v) => write!(f, "{}:{}", code, v),
            Self::F64(v) => write!(f, "{}:{}", code, v),
            Self::String(s) => write!(f, "{}:{:?}", code, s.replace("\u{0}\u{1}", "::")),
            Self::Raw(b) => write!(f, "{}:<{} bytes>", code, b.len()),
            other => write!(f, "{}[{}]", code, other.array_len().unwrap_or(0)),
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Property {
            fn from(v: $t) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

impl_from! {
    i16 => I16,
    u8 => U8,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Vec<i32> => I32Array,
    Vec<i64> => I64Array,
    Vec<f32> => F32Array,
    Vec<f64> => F64Array,
    String => String,
}

impl From<bool> for Property {
    fn from(v: bool) -> Self {
        Self::U8(v as u8)
    }
}

impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
