//! Decoded result values and result-set containers.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::protocol::types::{FormatCode, Oid};
use crate::types::datetime::Interval;
use crate::types::network::{Cidr, Inet};
use crate::types::numeric::Numeric;
use crate::types::range::PgRange;

/// A single decoded result value.
///
/// Each variant corresponds to a family of PostgreSQL types the codec
/// registry knows how to decode. Values outside the registry (or decoded
/// in raw mode) surface as `Text` or `Bytes`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// boolean
    Bool(bool),
    /// int2
    Int2(i16),
    /// int4
    Int4(i32),
    /// int8
    Int8(i64),
    /// float4
    Float4(f32),
    /// float8
    Float8(f64),
    /// numeric (finite, NaN or ±infinity)
    Numeric(Numeric),
    /// text family (text, varchar, bpchar, name, json, xml, unknown, ...)
    Text(String),
    /// bytea or any raw binary payload
    Bytes(Vec<u8>),
    /// uuid
    Uuid(Uuid),
    /// date
    Date(NaiveDate),
    /// time without time zone
    Time(NaiveTime),
    /// time with a fixed-offset time zone
    TimeTz(NaiveTime, FixedOffset),
    /// timestamp without time zone
    Timestamp(NaiveDateTime),
    /// timestamp with time zone, offset resolved for the session zone
    TimestampTz(DateTime<FixedOffset>),
    /// interval
    Interval(Interval),
    /// inet (host address with optional prefix)
    Inet(Inet),
    /// cidr (network address)
    Cidr(Cidr),
    /// array of values, possibly nested
    Array(Vec<Value>),
    /// range
    Range(Box<PgRange>),
    /// multirange
    Multirange(Vec<PgRange>),
}

impl Value {
    /// True for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as i32, widening int2 and narrowing nothing.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int2(v) => Some(*v as i32),
            Value::Int4(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as i64, widening smaller integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int2(v) => Some(*v as i64),
            Value::Int4(v) => Some(*v as i64),
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as f64, widening float4.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float4(v) => Some(*v as f64),
            Value::Float8(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as &str for text-family values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Result column descriptor from a RowDescription message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: u32,
    /// Column attribute number within the table (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: i16,
    /// Type modifier (type-specific)
    pub type_modifier: i32,
    /// Format code of values in this column
    pub format: FormatCode,
}

/// One row of decoded values.
pub type Row = Vec<Value>;

/// One (fields, rows, tag) triple.
///
/// A Simple Query batch yields one `ResultSet` per statement; an
/// Extended Query cycle yields exactly one.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Column descriptors; empty for statements that return no rows.
    pub fields: Arc<[Field]>,
    /// Decoded rows in server order.
    pub rows: Vec<Row>,
    /// Command tag, e.g. "SELECT 1".
    pub tag: String,
}

impl ResultSet {
    /// Rows affected according to the command tag, when the tag carries one.
    pub fn rows_affected(&self) -> Option<u64> {
        let mut parts = self.tag.split_whitespace();
        let command = parts.next()?;
        let count = match command {
            "INSERT" => parts.nth(1),
            "SELECT" | "UPDATE" | "DELETE" | "MERGE" | "COPY" | "MOVE" | "FETCH" => parts.next(),
            _ => None,
        }?;
        count.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_affected() {
        let rs = ResultSet {
            fields: Arc::from(Vec::new()),
            rows: Vec::new(),
            tag: "INSERT 0 3".into(),
        };
        assert_eq!(rs.rows_affected(), Some(3));

        let rs = ResultSet {
            fields: Arc::from(Vec::new()),
            rows: Vec::new(),
            tag: "SELECT 12".into(),
        };
        assert_eq!(rs.rows_affected(), Some(12));

        let rs = ResultSet {
            fields: Arc::from(Vec::new()),
            rows: Vec::new(),
            tag: "BEGIN".into(),
        };
        assert_eq!(rs.rows_affected(), None);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int2(7).as_i64(), Some(7));
        assert_eq!(Value::Int8(7).as_i32(), None);
        assert!(Value::Null.is_null());
        assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
    }
}
