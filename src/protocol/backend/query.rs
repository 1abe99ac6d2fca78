//! Query result backend messages.

use std::mem::size_of;

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U16 as U16BE, U32 as U32BE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::read_cstr;
use crate::protocol::types::FormatCode;
use crate::value::Field;

// Fixed-size trailer of one field description (follows the name).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct FieldTail {
    table_oid: U32BE,
    column_id: I16BE,
    type_oid: U32BE,
    type_size: I16BE,
    type_modifier: I32BE,
    format: U16BE,
}

/// RowDescription message - the column list of a result set.
#[derive(Debug)]
pub struct RowDescription {
    /// Parsed column descriptors.
    pub fields: Vec<Field>,
}

impl RowDescription {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (head, mut data) = payload
            .split_at_checked(2)
            .ok_or_else(|| Error::Framing("RowDescription missing field count".into()))?;
        let num_fields = u16::from_be_bytes([head[0], head[1]]) as usize;

        const TAIL_SIZE: usize = size_of::<FieldTail>();

        let mut fields = Vec::with_capacity(num_fields);
        for _ in 0..num_fields {
            let (name, rest) = read_cstr(data)?;
            let (tail_bytes, rest) = rest
                .split_at_checked(TAIL_SIZE)
                .ok_or_else(|| Error::Framing("truncated field description".into()))?;
            let tail = FieldTail::read_from_bytes(tail_bytes)
                .map_err(|e| Error::Framing(format!("field description: {e:?}")))?;

            fields.push(Field {
                name: name.to_string(),
                table_oid: tail.table_oid.get(),
                column_id: tail.column_id.get(),
                type_oid: tail.type_oid.get(),
                type_size: tail.type_size.get(),
                type_modifier: tail.type_modifier.get(),
                format: FormatCode::from_u16(tail.format.get()),
            });
            data = rest;
        }

        if !data.is_empty() {
            return Err(Error::Framing(format!(
                "{} trailing bytes after RowDescription",
                data.len()
            )));
        }
        Ok(Self { fields })
    }
}

/// DataRow message - one row, each column NULL or length-prefixed.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    num_columns: u16,
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Parse a DataRow message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (head, columns_data) = payload
            .split_at_checked(2)
            .ok_or_else(|| Error::Framing("DataRow missing column count".into()))?;
        Ok(Self {
            num_columns: u16::from_be_bytes([head[0], head[1]]),
            columns_data,
        })
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// True when the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Iterate the column payloads; `None` is NULL.
    ///
    /// The iterator fails with a framing error if the payload runs out
    /// before the declared column count.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.columns_data,
            columns_left: self.num_columns,
        }
    }
}

/// Iterator over the column values of a DataRow.
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
    columns_left: u16,
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.columns_left == 0 {
            return None;
        }
        self.columns_left -= 1;

        let Some((len_bytes, rest)) = self.remaining.split_at_checked(4) else {
            return Some(Err(Error::Framing("truncated DataRow column".into())));
        };
        let len = i32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        self.remaining = rest;

        if len == -1 {
            return Some(Ok(None));
        }
        if len < 0 {
            return Some(Err(Error::Framing(format!("negative column length {len}"))));
        }
        match self.remaining.split_at_checked(len as usize) {
            Some((value, rest)) => {
                self.remaining = rest;
                Some(Ok(Some(value)))
            }
            None => Some(Err(Error::Framing("truncated DataRow column".into()))),
        }
    }
}

/// CommandComplete message - a statement finished; carries its tag.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag, e.g. "SELECT 5" or "DISCARD ALL".
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (tag, _) = read_cstr(payload)?;
        Ok(Self { tag })
    }

    /// True for tags that invalidate every server-side prepared statement.
    pub fn wipes_statements(&self) -> bool {
        matches!(self.tag, "DISCARD ALL" | "DEALLOCATE ALL")
    }
}

/// EmptyQueryResponse message - the query string was empty.
#[derive(Debug, Clone, Copy)]
pub struct EmptyQueryResponse;

impl EmptyQueryResponse {
    /// Parse an EmptyQueryResponse message from payload bytes.
    pub fn parse(_payload: &[u8]) -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::oid;

    fn row_description_payload(columns: &[(&str, u32, u16)]) -> Vec<u8> {
        let mut out = (columns.len() as u16).to_be_bytes().to_vec();
        for (name, type_oid, format) in columns {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.extend_from_slice(&0_u32.to_be_bytes()); // table oid
            out.extend_from_slice(&0_i16.to_be_bytes()); // column id
            out.extend_from_slice(&type_oid.to_be_bytes());
            out.extend_from_slice(&(-1_i16).to_be_bytes()); // type size
            out.extend_from_slice(&(-1_i32).to_be_bytes()); // type modifier
            out.extend_from_slice(&format.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_row_description() {
        let payload = row_description_payload(&[("id", oid::INT4, 1), ("name", oid::TEXT, 0)]);
        let desc = RowDescription::parse(&payload).unwrap();
        assert_eq!(desc.fields.len(), 2);
        assert_eq!(desc.fields[0].name, "id");
        assert_eq!(desc.fields[0].type_oid, oid::INT4);
        assert_eq!(desc.fields[0].format, FormatCode::Binary);
        assert_eq!(desc.fields[1].format, FormatCode::Text);
    }

    #[test]
    fn test_row_description_trailing_bytes() {
        let mut payload = row_description_payload(&[("id", oid::INT4, 1)]);
        payload.push(0);
        assert!(RowDescription::parse(&payload).is_err());
    }

    #[test]
    fn test_data_row_iteration() {
        let mut payload = 3_u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&2_i32.to_be_bytes());
        payload.extend_from_slice(b"42");
        payload.extend_from_slice(&(-1_i32).to_be_bytes());
        payload.extend_from_slice(&0_i32.to_be_bytes());

        let row = DataRow::parse(&payload).unwrap();
        assert_eq!(row.len(), 3);
        let cols: Vec<_> = row.iter().collect::<Result<_>>().unwrap();
        assert_eq!(cols, vec![Some(&b"42"[..]), None, Some(&b""[..])]);
    }

    #[test]
    fn test_data_row_truncated() {
        let mut payload = 1_u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&10_i32.to_be_bytes());
        payload.extend_from_slice(b"short");

        let row = DataRow::parse(&payload).unwrap();
        assert!(row.iter().next().unwrap().is_err());
    }

    #[test]
    fn test_command_complete() {
        let c = CommandComplete::parse(b"SELECT 1\0").unwrap();
        assert_eq!(c.tag, "SELECT 1");
        assert!(!c.wipes_statements());

        let c = CommandComplete::parse(b"DISCARD ALL\0").unwrap();
        assert!(c.wipes_statements());
    }
}
