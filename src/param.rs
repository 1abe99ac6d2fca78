//! Parameter encoding: mapping input values to (OID, format, payload).
//!
//! The encoder picks a binary server type wherever one fits and falls
//! back to a textual rendering with the `unknown` OID when the value
//! cannot be expressed in a binary layout. Small payloads stay inline;
//! larger ones own a heap buffer that is dropped once the Bind message
//! has been assembled.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::protocol::types::{FormatCode, Oid, oid};
use crate::types::datetime::{Interval, PG_EPOCH, USECS_PER_SEC};
use crate::types::network::{Cidr, Inet};
use crate::types::numeric::{self, Numeric};

/// An input parameter value for one `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// SQL NULL
    Null,
    /// boolean
    Bool(bool),
    /// Integer; encodes as int4 when it fits 32 bits, else int8.
    Int(i64),
    /// Wide integer; falls back to a decimal string beyond 64 bits.
    BigInt(i128),
    /// float8
    Float(f64),
    /// numeric
    Numeric(Numeric),
    /// text
    Text(String),
    /// bytea
    Bytes(Vec<u8>),
    /// uuid
    Uuid(Uuid),
    /// date
    Date(NaiveDate),
    /// time without time zone
    Time(NaiveTime),
    /// time with a fixed offset
    TimeTz(NaiveTime, FixedOffset),
    /// timestamp without time zone
    Timestamp(NaiveDateTime),
    /// timestamp with time zone
    TimestampTz(DateTime<FixedOffset>),
    /// interval
    Interval(Interval),
    /// inet
    Inet(Inet),
    /// cidr
    Cidr(Cidr),
    /// Any other value, stringified, with an optional OID hint.
    Other {
        /// Textual rendering sent to the server.
        text: String,
        /// Declared parameter type; `None` leaves it to the server.
        oid: Option<Oid>,
    },
}

/// Encoded payload of one parameter.
///
/// `Inline` holds payloads of at most eight bytes without allocating;
/// anything larger owns a heap buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamData {
    /// NULL, sent as length −1.
    Null,
    /// Payload stored inline.
    Inline {
        /// Number of meaningful bytes.
        len: u8,
        /// Payload bytes, front-filled.
        bytes: [u8; 8],
    },
    /// Heap-allocated payload.
    Heap(Vec<u8>),
}

impl ParamData {
    fn inline(payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= 8);
        let mut bytes = [0u8; 8];
        bytes[..payload.len()].copy_from_slice(payload);
        ParamData::Inline {
            len: payload.len() as u8,
            bytes,
        }
    }

    fn from_vec(payload: Vec<u8>) -> Self {
        if payload.len() <= 8 {
            ParamData::inline(&payload)
        } else {
            ParamData::Heap(payload)
        }
    }

    /// The payload bytes; `None` for NULL.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParamData::Null => None,
            ParamData::Inline { len, bytes } => Some(&bytes[..*len as usize]),
            ParamData::Heap(v) => Some(v),
        }
    }
}

/// One encoded parameter, ready for a Bind message.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedParam {
    /// Parameter type OID declared in Parse/Bind.
    pub oid: Oid,
    /// Wire format of the payload.
    pub format: FormatCode,
    /// The payload itself.
    pub data: ParamData,
}

impl EncodedParam {
    fn binary(oid: Oid, data: ParamData) -> Self {
        Self {
            oid,
            format: FormatCode::Binary,
            data,
        }
    }

    fn text(oid: Oid, s: String) -> Self {
        Self {
            oid,
            format: FormatCode::Text,
            data: ParamData::from_vec(s.into_bytes()),
        }
    }
}

impl Param {
    /// Encode this value, choosing the server type from its shape.
    pub fn encode(&self) -> EncodedParam {
        match self {
            Param::Null => EncodedParam {
                oid: 0,
                format: FormatCode::Binary,
                data: ParamData::Null,
            },
            Param::Bool(v) => {
                EncodedParam::binary(oid::BOOL, ParamData::inline(&[u8::from(*v)]))
            }
            Param::Int(v) => encode_int(*v),
            Param::BigInt(v) => match i64::try_from(*v) {
                Ok(v) => encode_int(v),
                Err(_) => EncodedParam::text(oid::UNKNOWN, v.to_string()),
            },
            Param::Float(v) => {
                EncodedParam::binary(oid::FLOAT8, ParamData::inline(&v.to_be_bytes()))
            }
            Param::Numeric(v) => {
                let mut payload = Vec::with_capacity(16);
                numeric::encode_binary(v, &mut payload);
                EncodedParam::binary(oid::NUMERIC, ParamData::from_vec(payload))
            }
            Param::Text(s) => EncodedParam {
                oid: oid::TEXT,
                format: FormatCode::Text,
                data: ParamData::from_vec(s.clone().into_bytes()),
            },
            Param::Bytes(b) => {
                EncodedParam::binary(oid::BYTEA, ParamData::from_vec(b.clone()))
            }
            Param::Uuid(u) => {
                EncodedParam::binary(oid::UUID, ParamData::Heap(u.as_bytes().to_vec()))
            }
            Param::Date(d) => {
                let days = d.signed_duration_since(PG_EPOCH).num_days() as i32;
                EncodedParam::binary(oid::DATE, ParamData::inline(&days.to_be_bytes()))
            }
            Param::Time(t) => {
                EncodedParam::binary(oid::TIME, ParamData::inline(&time_usecs(t).to_be_bytes()))
            }
            Param::TimeTz(t, offset) => {
                let mut payload = Vec::with_capacity(12);
                payload.extend_from_slice(&time_usecs(t).to_be_bytes());
                // the wire carries seconds west of UTC
                payload.extend_from_slice(&(-offset.local_minus_utc()).to_be_bytes());
                EncodedParam::binary(oid::TIMETZ, ParamData::Heap(payload))
            }
            Param::Timestamp(dt) => match timestamp_usecs(dt) {
                Some(usecs) => {
                    EncodedParam::binary(oid::TIMESTAMP, ParamData::inline(&usecs.to_be_bytes()))
                }
                None => EncodedParam::text(
                    oid::UNKNOWN,
                    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                ),
            },
            Param::TimestampTz(dt) => match timestamp_usecs(&dt.naive_utc()) {
                Some(usecs) => EncodedParam::binary(
                    oid::TIMESTAMPTZ,
                    ParamData::inline(&usecs.to_be_bytes()),
                ),
                None => EncodedParam::text(
                    oid::UNKNOWN,
                    dt.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string(),
                ),
            },
            Param::Interval(iv) => {
                let mut payload = Vec::with_capacity(16);
                payload.extend_from_slice(&iv.usecs.to_be_bytes());
                payload.extend_from_slice(&iv.days.to_be_bytes());
                payload.extend_from_slice(&iv.months.to_be_bytes());
                EncodedParam::binary(oid::INTERVAL, ParamData::Heap(payload))
            }
            Param::Inet(v) => EncodedParam::text(oid::INET, v.to_string()),
            Param::Cidr(v) => EncodedParam::text(oid::CIDR, v.to_string()),
            Param::Other { text, oid: hint } => {
                EncodedParam::text(hint.unwrap_or(oid::UNKNOWN), text.clone())
            }
        }
    }
}

fn encode_int(v: i64) -> EncodedParam {
    match i32::try_from(v) {
        Ok(v) => EncodedParam::binary(oid::INT4, ParamData::inline(&v.to_be_bytes())),
        Err(_) => EncodedParam::binary(oid::INT8, ParamData::inline(&v.to_be_bytes())),
    }
}

fn time_usecs(t: &NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * USECS_PER_SEC + i64::from(t.nanosecond()) / 1000
}

fn timestamp_usecs(dt: &NaiveDateTime) -> Option<i64> {
    let epoch = PG_EPOCH.and_hms_opt(0, 0, 0)?;
    dt.signed_duration_since(epoch).num_microseconds()
}

// === conversions for call-site ergonomics ===

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i16> for Param {
    fn from(v: i16) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<i128> for Param {
    fn from(v: i128) -> Self {
        Param::BigInt(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&[u8]> for Param {
    fn from(v: &[u8]) -> Self {
        Param::Bytes(v.to_vec())
    }
}

impl From<Uuid> for Param {
    fn from(v: Uuid) -> Self {
        Param::Uuid(v)
    }
}

impl From<NaiveDate> for Param {
    fn from(v: NaiveDate) -> Self {
        Param::Date(v)
    }
}

impl From<NaiveDateTime> for Param {
    fn from(v: NaiveDateTime) -> Self {
        Param::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Param
where
    Param: From<T>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Param::from(v),
            None => Param::Null,
        }
    }
}
