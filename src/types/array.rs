//! Array decoding, text and binary wire grammars.
//!
//! Both decoders are parameterised by the element codec; the text
//! decoder also takes the element delimiter (`,` for every type except
//! the `box` family, which uses `;`).

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i32, read_u32};
use crate::session::SessionState;
use crate::types::TypeCodec;
use crate::value::Value;

/// Maximum array dimensions accepted, matching the server limit.
pub const MAX_DIMENSIONS: usize = 6;

/// Decode array text format: `{...}` with recursive nesting.
pub fn decode_text(
    session: &SessionState,
    bytes: &[u8],
    elem: &TypeCodec,
    delim: u8,
) -> Result<Value> {
    let mut parser = TextParser { data: bytes, pos: 0 };
    let value = parser.parse_array(session, elem, delim, 1)?;
    if parser.pos != bytes.len() {
        return Err(Error::Decode(format!(
            "trailing bytes after array at offset {}",
            parser.pos
        )));
    }
    Ok(value)
}

struct TextParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl TextParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        let b = self
            .peek()
            .ok_or_else(|| Error::Decode("unterminated array literal".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let b = self.bump()?;
        if b != expected {
            return Err(Error::Decode(format!(
                "expected {:?} at offset {} in array literal, found {:?}",
                expected as char,
                self.pos - 1,
                b as char
            )));
        }
        Ok(())
    }

    fn parse_array(
        &mut self,
        session: &SessionState,
        elem: &TypeCodec,
        delim: u8,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_DIMENSIONS {
            return Err(Error::Decode(format!(
                "array nesting exceeds {MAX_DIMENSIONS} dimensions"
            )));
        }
        self.expect(b'{')?;

        let mut items = Vec::new();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }

        loop {
            let item = match self.peek() {
                Some(b'{') => self.parse_array(session, elem, delim, depth + 1)?,
                Some(b'"') => {
                    let unquoted = self.parse_quoted()?;
                    (elem.text)(session, &unquoted)?
                }
                _ => {
                    let token = self.parse_bare(delim)?;
                    // unquoted NULL is the null literal, case-sensitively
                    if token == b"NULL" {
                        Value::Null
                    } else {
                        (elem.text)(session, token)?
                    }
                }
            };
            items.push(item);

            let b = self.bump()?;
            if b == delim {
                continue;
            }
            if b == b'}' {
                return Ok(Value::Array(items));
            }
            return Err(Error::Decode(format!(
                "expected {:?} or '}}' in array literal, found {:?}",
                delim as char, b as char
            )));
        }
    }

    // A quoted element: `\` escapes the next byte, `""` escapes a quote.
    fn parse_quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.bump()? {
                b'\\' => out.push(self.bump()?),
                b'"' => {
                    if self.peek() == Some(b'"') {
                        self.pos += 1;
                        out.push(b'"');
                    } else {
                        return Ok(out);
                    }
                }
                b => out.push(b),
            }
        }
    }

    fn parse_bare(&mut self, delim: u8) -> Result<&[u8]> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == delim || b == b'}' {
                if start == self.pos {
                    return Err(Error::Decode("empty element in array literal".into()));
                }
                return Ok(&self.data[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(Error::Decode("unterminated array literal".into()))
    }
}

/// Decode array binary format.
///
/// Layout: u32 dimension count, i32 has-nulls flag, u32 element OID,
/// then per dimension (i32 size, i32 lower bound), then row-major
/// values, each length-prefixed (−1 is NULL).
pub fn decode_binary(session: &SessionState, bytes: &[u8], elem: &TypeCodec) -> Result<Value> {
    let (ndims, rest) = read_u32(bytes)?;
    let (_has_nulls, rest) = read_i32(rest)?;
    let (elem_oid, mut rest) = read_u32(rest)?;

    if ndims == 0 {
        return Ok(Value::Array(Vec::new()));
    }
    let ndims = ndims as usize;
    if ndims > MAX_DIMENSIONS {
        return Err(Error::Decode(format!(
            "array has {ndims} dimensions, maximum is {MAX_DIMENSIONS}"
        )));
    }
    if elem_oid != elem.oid {
        return Err(Error::Decode(format!(
            "array element OID {elem_oid} does not match expected {}",
            elem.oid
        )));
    }

    let mut dims = Vec::with_capacity(ndims);
    for _ in 0..ndims {
        let (dim, r) = read_i32(rest)?;
        let (_lower_bound, r) = read_i32(r)?;
        if dim < 0 {
            return Err(Error::Decode(format!("negative array dimension {dim}")));
        }
        dims.push(dim as usize);
        rest = r;
    }

    let value = read_values(session, &mut rest, &dims, elem)?;
    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after array values",
            rest.len()
        )));
    }
    Ok(value)
}

fn read_values<'a>(
    session: &SessionState,
    data: &mut &'a [u8],
    dims: &[usize],
    elem: &TypeCodec,
) -> Result<Value> {
    let (&dim, inner) = dims
        .split_first()
        .ok_or_else(|| Error::Decode("array dimension underflow".into()))?;
    let mut items = Vec::with_capacity(dim);
    for _ in 0..dim {
        if inner.is_empty() {
            let (len, rest) = read_i32(data)?;
            *data = rest;
            if len == -1 {
                items.push(Value::Null);
            } else {
                let len = len as usize;
                let (payload, rest) = data.split_at_checked(len).ok_or_else(|| {
                    Error::Decode(format!("truncated array element of {len} bytes"))
                })?;
                *data = rest;
                items.push((elem.binary)(session, payload)?);
            }
        } else {
            items.push(read_values(session, data, inner, elem)?);
        }
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{INT4, TEXT};

    fn session() -> SessionState {
        SessionState::new()
    }

    #[test]
    fn test_text_nested_with_null() {
        let v = decode_text(&session(), b"{{1,2},{3,NULL}}", &INT4, b',').unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Value::Array(vec![Value::Int4(1), Value::Int4(2)]),
                Value::Array(vec![Value::Int4(3), Value::Null]),
            ])
        );
    }

    #[test]
    fn test_text_quoted_elements() {
        let v = decode_text(&session(), br#"{"a,b","c"}"#, &TEXT, b',').unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Text("a,b".into()), Value::Text("c".into())])
        );
    }

    #[test]
    fn test_text_escapes() {
        let v = decode_text(&session(), br#"{"he said \"hi\"","a""b","c\\d"}"#, &TEXT, b',')
            .unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Value::Text("he said \"hi\"".into()),
                Value::Text("a\"b".into()),
                Value::Text("c\\d".into()),
            ])
        );
    }

    #[test]
    fn test_text_null_is_case_sensitive() {
        let v = decode_text(&session(), b"{NULL,null}", &TEXT, b',').unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Null, Value::Text("null".into())])
        );
    }

    #[test]
    fn test_text_empty_array() {
        assert_eq!(
            decode_text(&session(), b"{}", &INT4, b',').unwrap(),
            Value::Array(vec![])
        );
    }

    #[test]
    fn test_text_depth_limit() {
        // six dimensions parse
        let six = b"{{{{{{1}}}}}}";
        assert!(decode_text(&session(), six, &INT4, b',').is_ok());
        // seven do not
        let seven = b"{{{{{{{1}}}}}}}";
        assert!(decode_text(&session(), seven, &INT4, b',').is_err());
    }

    #[test]
    fn test_text_idempotent_on_canonical_input() {
        let input: &[u8] = b"{{1,2},{3,4}}";
        let a = decode_text(&session(), input, &INT4, b',').unwrap();
        let b = decode_text(&session(), input, &INT4, b',').unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_trailing_garbage_rejected() {
        assert!(decode_text(&session(), b"{1}x", &INT4, b',').is_err());
        assert!(decode_text(&session(), b"{1", &INT4, b',').is_err());
    }

    fn binary_array(ndims: u32, elem_oid: u32, dims: &[(i32, i32)], values: &[Option<&[u8]>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ndims.to_be_bytes());
        out.extend_from_slice(&1_i32.to_be_bytes());
        out.extend_from_slice(&elem_oid.to_be_bytes());
        for (dim, lower) in dims {
            out.extend_from_slice(&dim.to_be_bytes());
            out.extend_from_slice(&lower.to_be_bytes());
        }
        for value in values {
            match value {
                None => out.extend_from_slice(&(-1_i32).to_be_bytes()),
                Some(payload) => {
                    out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
                    out.extend_from_slice(payload);
                }
            }
        }
        out
    }

    #[test]
    fn test_binary_two_dimensional() {
        let payload = binary_array(
            2,
            crate::protocol::types::oid::INT4,
            &[(2, 1), (2, 1)],
            &[
                Some(&1_i32.to_be_bytes()),
                Some(&2_i32.to_be_bytes()),
                Some(&3_i32.to_be_bytes()),
                None,
            ],
        );
        let v = decode_binary(&session(), &payload, &INT4).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Value::Array(vec![Value::Int4(1), Value::Int4(2)]),
                Value::Array(vec![Value::Int4(3), Value::Null]),
            ])
        );
    }

    #[test]
    fn test_binary_wrong_element_oid() {
        let payload = binary_array(
            1,
            crate::protocol::types::oid::INT8,
            &[(1, 1)],
            &[Some(&1_i32.to_be_bytes())],
        );
        assert!(decode_binary(&session(), &payload, &INT4).is_err());
    }

    #[test]
    fn test_binary_too_many_dimensions() {
        let payload = binary_array(7, crate::protocol::types::oid::INT4, &[], &[]);
        assert!(decode_binary(&session(), &payload, &INT4).is_err());
    }

    #[test]
    fn test_binary_truncated_value() {
        let mut payload = binary_array(
            1,
            crate::protocol::types::oid::INT4,
            &[(1, 1)],
            &[Some(&1_i32.to_be_bytes())],
        );
        payload.truncate(payload.len() - 2);
        assert!(decode_binary(&session(), &payload, &INT4).is_err());
    }
}
