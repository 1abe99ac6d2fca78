//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! All integers on the wire are big-endian (network byte order).

use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, I64 as I64BE, U16 as U16BE, U32 as U32BE};

use crate::error::{Error, Result};

fn short(what: &str, have: usize, need: usize) -> Error {
    Error::Framing(format!("{what}: buffer too short: {have} < {need}"))
}

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&b, rest)) => Ok((b, rest)),
        None => Err(short("read_u8", 0, 1)),
    }
}

/// Read 2-byte big-endian signed integer.
#[inline]
pub fn read_i16(data: &[u8]) -> Result<(i16, &[u8])> {
    let (head, rest) = data
        .split_at_checked(2)
        .ok_or_else(|| short("read_i16", data.len(), 2))?;
    let value = I16BE::read_from_bytes(head)
        .map_err(|e| Error::Framing(format!("read_i16: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 2-byte big-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (head, rest) = data
        .split_at_checked(2)
        .ok_or_else(|| short("read_u16", data.len(), 2))?;
    let value = U16BE::read_from_bytes(head)
        .map_err(|e| Error::Framing(format!("read_u16: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 4-byte big-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    let (head, rest) = data
        .split_at_checked(4)
        .ok_or_else(|| short("read_i32", data.len(), 4))?;
    let value = I32BE::read_from_bytes(head)
        .map_err(|e| Error::Framing(format!("read_i32: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 4-byte big-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (head, rest) = data
        .split_at_checked(4)
        .ok_or_else(|| short("read_u32", data.len(), 4))?;
    let value = U32BE::read_from_bytes(head)
        .map_err(|e| Error::Framing(format!("read_u32: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 8-byte big-endian signed integer.
#[inline]
pub fn read_i64(data: &[u8]) -> Result<(i64, &[u8])> {
    let (head, rest) = data
        .split_at_checked(8)
        .ok_or_else(|| short("read_i64", data.len(), 8))?;
    let value = I64BE::read_from_bytes(head)
        .map_err(|e| Error::Framing(format!("read_i64: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    data.split_at_checked(len)
        .ok_or_else(|| short("read_bytes", data.len(), len))
}

/// Read a null-terminated string (PostgreSQL String type).
///
/// Returns the string bytes (without the terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Framing(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read a null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Framing(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Validate an entire payload as UTF-8 text.
#[inline]
pub fn read_text(data: &[u8]) -> Result<&str> {
    simdutf8::compat::from_utf8(data)
        .map_err(|e| Error::Decode(format!("invalid UTF-8 text: {e}")))
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte big-endian signed integer.
#[inline]
pub fn write_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 4-byte big-endian signed integer.
#[inline]
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 4-byte big-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 8-byte big-endian signed integer.
#[inline]
pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write a null-terminated string from &str.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Message builder helper that handles the length field.
///
/// PostgreSQL message format:
/// - Kind byte (1 byte) - NOT included in the length
/// - Length (4 bytes) - includes itself
/// - Payload (Length - 4 bytes)
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Start building a message with a kind byte.
    pub fn new(buf: &'a mut Vec<u8>, kind: u8) -> Self {
        buf.push(kind);
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        Self { buf, start }
    }

    /// Start building a startup-family message (no kind byte).
    pub fn new_startup(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        Self { buf, start }
    }

    /// Get mutable access to the underlying buffer.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        self.buf
    }

    /// Write a u8.
    pub fn write_u8(&mut self, value: u8) {
        write_u8(self.buf, value);
    }

    /// Write an i16.
    pub fn write_i16(&mut self, value: i16) {
        write_i16(self.buf, value);
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) {
        write_i32(self.buf, value);
    }

    /// Write a u32.
    pub fn write_u32(&mut self, value: u32) {
        write_u32(self.buf, value);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        write_bytes(self.buf, data);
    }

    /// Write a null-terminated string.
    pub fn write_cstr(&mut self, s: &str) {
        write_cstr(self.buf, s);
    }

    /// Finish the message and fill in the length field.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}
