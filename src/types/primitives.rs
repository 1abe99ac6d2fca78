//! Primitive type codecs: bool, integers, floats, text family, bytea,
//! uuid, and the raw fallback.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::codec::read_text;
use crate::session::SessionState;
use crate::value::Value;

// === bool ===

/// Decode bool text format.
pub fn bool_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    match bytes {
        b"t" => Ok(Value::Bool(true)),
        b"f" => Ok(Value::Bool(false)),
        _ => Err(Error::Decode(format!(
            "invalid boolean literal: {:?}",
            String::from_utf8_lossy(bytes)
        ))),
    }
}

/// Decode bool binary format.
pub fn bool_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    match bytes {
        [0] => Ok(Value::Bool(false)),
        [1] => Ok(Value::Bool(true)),
        _ => Err(Error::Decode(format!(
            "invalid boolean payload of {} bytes",
            bytes.len()
        ))),
    }
}

// === integers ===

macro_rules! int_codec {
    ($text:ident, $binary:ident, $ty:ty, $variant:ident, $len:literal) => {
        /// Decode from decimal text.
        pub fn $text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
            let s = read_text(bytes)?;
            s.parse::<$ty>()
                .map(Value::$variant)
                .map_err(|e| Error::Decode(format!("invalid integer {s:?}: {e}")))
        }

        /// Decode from big-endian binary.
        pub fn $binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
            let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                Error::Decode(format!(
                    concat!("invalid ", stringify!($variant), " length: {}"),
                    bytes.len()
                ))
            })?;
            Ok(Value::$variant(<$ty>::from_be_bytes(arr)))
        }
    };
}

int_codec!(int2_text, int2_binary, i16, Int2, 2);
int_codec!(int4_text, int4_binary, i32, Int4, 4);
int_codec!(int8_text, int8_binary, i64, Int8, 8);

// oid/xid/cid are unsigned 32-bit; they widen into Int8.

/// Decode an unsigned 32-bit catalog value from text.
pub fn oid_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    s.parse::<u32>()
        .map(|v| Value::Int8(i64::from(v)))
        .map_err(|e| Error::Decode(format!("invalid oid {s:?}: {e}")))
}

/// Decode an unsigned 32-bit catalog value from binary.
pub fn oid_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid oid length: {}", bytes.len())))?;
    Ok(Value::Int8(i64::from(u32::from_be_bytes(arr))))
}

// === floats ===

macro_rules! float_codec {
    ($text:ident, $binary:ident, $ty:ty, $variant:ident, $len:literal) => {
        /// Decode from text; accepts NaN and ±Infinity spellings.
        pub fn $text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
            let s = read_text(bytes)?;
            s.parse::<$ty>()
                .map(Value::$variant)
                .map_err(|e| Error::Decode(format!("invalid float {s:?}: {e}")))
        }

        /// Decode from big-endian IEEE-754 binary.
        pub fn $binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
            let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                Error::Decode(format!(
                    concat!("invalid ", stringify!($variant), " length: {}"),
                    bytes.len()
                ))
            })?;
            Ok(Value::$variant(<$ty>::from_be_bytes(arr)))
        }
    };
}

float_codec!(float4_text, float4_binary, f32, Float4, 4);
float_codec!(float8_text, float8_binary, f64, Float8, 8);

// === text family ===

/// Decode any text-family value (text, varchar, bpchar, name, json, ...).
/// Binary and text representations are both the UTF-8 bytes.
pub fn text_any(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Text(read_text(bytes)?.into()))
}

/// Decode jsonb binary format: a version byte followed by JSON text.
pub fn jsonb_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    match bytes.split_first() {
        Some((1, rest)) => Ok(Value::Text(read_text(rest)?.into())),
        Some((version, _)) => Err(Error::Decode(format!("unknown jsonb version {version}"))),
        None => Err(Error::Decode("empty jsonb payload".into())),
    }
}

// === bytea ===

/// Decode bytea text format (`\x` hex).
pub fn bytea_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let Some(hex) = bytes.strip_prefix(b"\\x") else {
        return Err(Error::Decode("bytea text must start with \\x".into()));
    };
    if hex.len() % 2 != 0 {
        return Err(Error::Decode("odd number of bytea hex digits".into()));
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    for pair in hex.chunks_exact(2) {
        let hi = hex_nibble(pair[0])?;
        let lo = hex_nibble(pair[1])?;
        out.push(hi << 4 | lo);
    }
    Ok(Value::Bytes(out))
}

fn hex_nibble(b: u8) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Error::Decode(format!("invalid bytea hex digit {:?}", b as char))),
    }
}

/// Decode bytea binary format (raw bytes).
pub fn bytea_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Bytes(bytes.to_vec()))
}

// === uuid ===

/// Decode uuid text format.
pub fn uuid_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    Uuid::parse_str(s)
        .map(Value::Uuid)
        .map_err(|e| Error::Decode(format!("invalid uuid {s:?}: {e}")))
}

/// Decode uuid binary format (16 raw bytes).
pub fn uuid_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Uuid::from_slice(bytes)
        .map(Value::Uuid)
        .map_err(|e| Error::Decode(format!("invalid uuid payload: {e}")))
}

// === raw fallback ===

/// Raw text decoder used for unregistered OIDs and raw-result mode.
pub fn raw_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Text(read_text(bytes)?.into()))
}

/// Raw binary decoder used for unregistered OIDs and raw-result mode.
pub fn raw_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Bytes(bytes.to_vec()))
}
