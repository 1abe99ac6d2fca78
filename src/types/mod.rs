//! Per-OID value codec registry.
//!
//! Every supported OID maps to a [`TypeCodec`]: a pair of decode
//! functions, one per wire format. Composite codecs (arrays, ranges,
//! multiranges) are thin wrappers that hand the matching element codec
//! to a shared generic decoder. Unregistered OIDs fall back to [`RAW`],
//! which returns text as-is and binary as raw bytes.

pub mod array;
pub mod datetime;
pub mod network;
pub mod numeric;
pub mod primitives;
pub mod range;

use crate::error::Result;
use crate::protocol::types::{FormatCode, Oid, oid};
use crate::session::SessionState;
use crate::value::Value;

/// A decode function: session state and payload in, value out.
pub type DecodeFn = fn(&SessionState, &[u8]) -> Result<Value>;

/// Text and binary decoders for one PostgreSQL type.
pub struct TypeCodec {
    /// The OID this codec decodes.
    pub oid: Oid,
    /// Text-format decoder.
    pub text: DecodeFn,
    /// Binary-format decoder.
    pub binary: DecodeFn,
}

impl TypeCodec {
    /// The decoder for the given wire format.
    pub fn decoder(&self, format: FormatCode) -> DecodeFn {
        match format {
            FormatCode::Text => self.text,
            FormatCode::Binary => self.binary,
        }
    }
}

macro_rules! codec {
    ($name:ident, $oid:expr, $text:path, $binary:path) => {
        pub static $name: TypeCodec = TypeCodec {
            oid: $oid,
            text: $text,
            binary: $binary,
        };
    };
}

macro_rules! array_codec {
    ($name:ident, $oid:expr, $elem:ident, $delim:expr) => {
        pub static $name: TypeCodec = TypeCodec {
            oid: $oid,
            text: {
                fn text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    array::decode_text(session, bytes, &$elem, $delim)
                }
                text
            },
            binary: {
                fn binary(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    array::decode_binary(session, bytes, &$elem)
                }
                binary
            },
        };
    };
    ($name:ident, $oid:expr, $elem:ident) => {
        array_codec!($name, $oid, $elem, b',');
    };
}

macro_rules! range_codec {
    ($name:ident, $oid:expr, $elem:ident) => {
        pub static $name: TypeCodec = TypeCodec {
            oid: $oid,
            text: {
                fn text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    range::decode_text(session, bytes, &$elem)
                }
                text
            },
            binary: {
                fn binary(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    range::decode_binary(session, bytes, &$elem)
                }
                binary
            },
        };
    };
}

macro_rules! multirange_codec {
    ($name:ident, $oid:expr, $elem:ident) => {
        pub static $name: TypeCodec = TypeCodec {
            oid: $oid,
            text: {
                fn text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    range::decode_multirange_text(session, bytes, &$elem)
                }
                text
            },
            binary: {
                fn binary(session: &SessionState, bytes: &[u8]) -> Result<Value> {
                    range::decode_multirange_binary(session, bytes, &$elem)
                }
                binary
            },
        };
    };
}

// Scalars
codec!(BOOL, oid::BOOL, primitives::bool_text, primitives::bool_binary);
codec!(BYTEA, oid::BYTEA, primitives::bytea_text, primitives::bytea_binary);
codec!(CHAR, oid::CHAR, primitives::text_any, primitives::text_any);
codec!(NAME, oid::NAME, primitives::text_any, primitives::text_any);
codec!(INT2, oid::INT2, primitives::int2_text, primitives::int2_binary);
codec!(INT4, oid::INT4, primitives::int4_text, primitives::int4_binary);
codec!(INT8, oid::INT8, primitives::int8_text, primitives::int8_binary);
codec!(OID, oid::OID, primitives::oid_text, primitives::oid_binary);
codec!(XID, oid::XID, primitives::oid_text, primitives::oid_binary);
codec!(CID, oid::CID, primitives::oid_text, primitives::oid_binary);
codec!(TEXT, oid::TEXT, primitives::text_any, primitives::text_any);
codec!(VARCHAR, oid::VARCHAR, primitives::text_any, primitives::text_any);
codec!(BPCHAR, oid::BPCHAR, primitives::text_any, primitives::text_any);
codec!(JSON, oid::JSON, primitives::text_any, primitives::text_any);
codec!(JSONB, oid::JSONB, primitives::text_any, primitives::jsonb_binary);
codec!(XML, oid::XML, primitives::text_any, primitives::text_any);
codec!(FLOAT4, oid::FLOAT4, primitives::float4_text, primitives::float4_binary);
codec!(FLOAT8, oid::FLOAT8, primitives::float8_text, primitives::float8_binary);
codec!(UNKNOWN, oid::UNKNOWN, primitives::text_any, primitives::raw_binary);
codec!(NUMERIC, oid::NUMERIC, numeric::numeric_text, numeric::numeric_binary);
codec!(DATE, oid::DATE, datetime::date_text, datetime::date_binary);
codec!(TIME, oid::TIME, datetime::time_text, datetime::time_binary);
codec!(TIMETZ, oid::TIMETZ, datetime::timetz_text, datetime::timetz_binary);
codec!(TIMESTAMP, oid::TIMESTAMP, datetime::timestamp_text, datetime::timestamp_binary);
codec!(TIMESTAMPTZ, oid::TIMESTAMPTZ, datetime::timestamptz_text, datetime::timestamptz_binary);
codec!(INTERVAL, oid::INTERVAL, datetime::interval_text, datetime::interval_binary);
codec!(UUID, oid::UUID, primitives::uuid_text, primitives::uuid_binary);
codec!(INET, oid::INET, network::inet_text, network::inet_binary);
codec!(CIDR, oid::CIDR, network::cidr_text, network::cidr_binary);
// box has no structured value here; kept for its semicolon array delimiter
codec!(BOX, oid::BOX, primitives::text_any, primitives::raw_binary);

// Fallback codec for unregistered OIDs and raw-result mode.
codec!(RAW, oid::UNKNOWN, primitives::raw_text, primitives::raw_binary);

// Arrays
array_codec!(BOOL_ARRAY, oid::BOOL_ARRAY, BOOL);
array_codec!(BYTEA_ARRAY, oid::BYTEA_ARRAY, BYTEA);
array_codec!(INT2_ARRAY, oid::INT2_ARRAY, INT2);
array_codec!(INT4_ARRAY, oid::INT4_ARRAY, INT4);
array_codec!(INT8_ARRAY, oid::INT8_ARRAY, INT8);
array_codec!(TEXT_ARRAY, oid::TEXT_ARRAY, TEXT);
array_codec!(VARCHAR_ARRAY, oid::VARCHAR_ARRAY, VARCHAR);
array_codec!(BPCHAR_ARRAY, oid::BPCHAR_ARRAY, BPCHAR);
array_codec!(FLOAT4_ARRAY, oid::FLOAT4_ARRAY, FLOAT4);
array_codec!(FLOAT8_ARRAY, oid::FLOAT8_ARRAY, FLOAT8);
array_codec!(NUMERIC_ARRAY, oid::NUMERIC_ARRAY, NUMERIC);
array_codec!(UUID_ARRAY, oid::UUID_ARRAY, UUID);
array_codec!(DATE_ARRAY, oid::DATE_ARRAY, DATE);
array_codec!(TIME_ARRAY, oid::TIME_ARRAY, TIME);
array_codec!(TIMESTAMP_ARRAY, oid::TIMESTAMP_ARRAY, TIMESTAMP);
array_codec!(TIMESTAMPTZ_ARRAY, oid::TIMESTAMPTZ_ARRAY, TIMESTAMPTZ);
array_codec!(INTERVAL_ARRAY, oid::INTERVAL_ARRAY, INTERVAL);
array_codec!(INET_ARRAY, oid::INET_ARRAY, INET);
array_codec!(CIDR_ARRAY, oid::CIDR_ARRAY, CIDR);
array_codec!(JSON_ARRAY, oid::JSON_ARRAY, JSON);
array_codec!(JSONB_ARRAY, oid::JSONB_ARRAY, JSONB);
array_codec!(BOX_ARRAY, oid::BOX_ARRAY, BOX, b';');

// Ranges
range_codec!(INT4RANGE, oid::INT4RANGE, INT4);
range_codec!(INT8RANGE, oid::INT8RANGE, INT8);
range_codec!(NUMRANGE, oid::NUMRANGE, NUMERIC);
range_codec!(TSRANGE, oid::TSRANGE, TIMESTAMP);
range_codec!(TSTZRANGE, oid::TSTZRANGE, TIMESTAMPTZ);
range_codec!(DATERANGE, oid::DATERANGE, DATE);

// Multiranges
multirange_codec!(INT4MULTIRANGE, oid::INT4MULTIRANGE, INT4);
multirange_codec!(INT8MULTIRANGE, oid::INT8MULTIRANGE, INT8);
multirange_codec!(NUMMULTIRANGE, oid::NUMMULTIRANGE, NUMERIC);
multirange_codec!(TSMULTIRANGE, oid::TSMULTIRANGE, TIMESTAMP);
multirange_codec!(TSTZMULTIRANGE, oid::TSTZMULTIRANGE, TIMESTAMPTZ);
multirange_codec!(DATEMULTIRANGE, oid::DATEMULTIRANGE, DATE);

/// Look up the codec for an OID, falling back to [`RAW`].
pub fn lookup(type_oid: Oid) -> &'static TypeCodec {
    match type_oid {
        oid::BOOL => &BOOL,
        oid::BYTEA => &BYTEA,
        oid::CHAR => &CHAR,
        oid::NAME => &NAME,
        oid::INT2 => &INT2,
        oid::INT4 => &INT4,
        oid::INT8 => &INT8,
        oid::OID => &OID,
        oid::XID => &XID,
        oid::CID => &CID,
        oid::TEXT => &TEXT,
        oid::VARCHAR => &VARCHAR,
        oid::BPCHAR => &BPCHAR,
        oid::JSON => &JSON,
        oid::JSONB => &JSONB,
        oid::XML => &XML,
        oid::FLOAT4 => &FLOAT4,
        oid::FLOAT8 => &FLOAT8,
        oid::UNKNOWN => &UNKNOWN,
        oid::NUMERIC => &NUMERIC,
        oid::DATE => &DATE,
        oid::TIME => &TIME,
        oid::TIMETZ => &TIMETZ,
        oid::TIMESTAMP => &TIMESTAMP,
        oid::TIMESTAMPTZ => &TIMESTAMPTZ,
        oid::INTERVAL => &INTERVAL,
        oid::UUID => &UUID,
        oid::INET => &INET,
        oid::CIDR => &CIDR,
        oid::BOX => &BOX,
        oid::BOOL_ARRAY => &BOOL_ARRAY,
        oid::BYTEA_ARRAY => &BYTEA_ARRAY,
        oid::INT2_ARRAY => &INT2_ARRAY,
        oid::INT4_ARRAY => &INT4_ARRAY,
        oid::INT8_ARRAY => &INT8_ARRAY,
        oid::TEXT_ARRAY => &TEXT_ARRAY,
        oid::VARCHAR_ARRAY => &VARCHAR_ARRAY,
        oid::BPCHAR_ARRAY => &BPCHAR_ARRAY,
        oid::FLOAT4_ARRAY => &FLOAT4_ARRAY,
        oid::FLOAT8_ARRAY => &FLOAT8_ARRAY,
        oid::NUMERIC_ARRAY => &NUMERIC_ARRAY,
        oid::UUID_ARRAY => &UUID_ARRAY,
        oid::DATE_ARRAY => &DATE_ARRAY,
        oid::TIME_ARRAY => &TIME_ARRAY,
        oid::TIMESTAMP_ARRAY => &TIMESTAMP_ARRAY,
        oid::TIMESTAMPTZ_ARRAY => &TIMESTAMPTZ_ARRAY,
        oid::INTERVAL_ARRAY => &INTERVAL_ARRAY,
        oid::INET_ARRAY => &INET_ARRAY,
        oid::CIDR_ARRAY => &CIDR_ARRAY,
        oid::JSON_ARRAY => &JSON_ARRAY,
        oid::JSONB_ARRAY => &JSONB_ARRAY,
        oid::BOX_ARRAY => &BOX_ARRAY,
        oid::INT4RANGE => &INT4RANGE,
        oid::INT8RANGE => &INT8RANGE,
        oid::NUMRANGE => &NUMRANGE,
        oid::TSRANGE => &TSRANGE,
        oid::TSTZRANGE => &TSTZRANGE,
        oid::DATERANGE => &DATERANGE,
        oid::INT4MULTIRANGE => &INT4MULTIRANGE,
        oid::INT8MULTIRANGE => &INT8MULTIRANGE,
        oid::NUMMULTIRANGE => &NUMMULTIRANGE,
        oid::TSMULTIRANGE => &TSMULTIRANGE,
        oid::TSTZMULTIRANGE => &TSTZMULTIRANGE,
        oid::DATEMULTIRANGE => &DATEMULTIRANGE,
        _ => &RAW,
    }
}
