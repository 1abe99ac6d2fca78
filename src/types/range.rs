//! Range and multirange decoding, text and binary wire grammars.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i32, read_u8, read_u32};
use crate::session::SessionState;
use crate::types::TypeCodec;
use crate::value::Value;

// Flag bits of the binary range header byte.
const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

/// One bound of a range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeBound {
    /// Bound value; absent for an infinite or empty bound.
    pub value: Option<Value>,
    /// Whether the bound is inclusive.
    pub inclusive: bool,
    /// Whether the bound extends to infinity.
    pub infinite: bool,
}

/// A decoded range value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PgRange {
    /// True for the canonical empty range.
    pub empty: bool,
    /// Lower bound.
    pub lower: RangeBound,
    /// Upper bound.
    pub upper: RangeBound,
}

impl PgRange {
    /// The canonical empty range.
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Default::default()
        }
    }

    /// The two-character bounds string, e.g. `"[)"`.
    pub fn bounds(&self) -> &'static str {
        match (self.lower.inclusive, self.upper.inclusive) {
            (true, true) => "[]",
            (true, false) => "[)",
            (false, true) => "(]",
            (false, false) => "()",
        }
    }
}

/// Decode range binary format.
pub fn decode_binary(session: &SessionState, bytes: &[u8], elem: &TypeCodec) -> Result<Value> {
    let (range, rest) = parse_binary_range(session, bytes, elem)?;
    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after range",
            rest.len()
        )));
    }
    Ok(Value::Range(Box::new(range)))
}

fn parse_binary_range<'a>(
    session: &SessionState,
    bytes: &'a [u8],
    elem: &TypeCodec,
) -> Result<(PgRange, &'a [u8])> {
    let (flags, mut rest) = read_u8(bytes)?;

    const KNOWN: u8 = RANGE_EMPTY | RANGE_LB_INC | RANGE_UB_INC | RANGE_LB_INF | RANGE_UB_INF;
    if flags & !KNOWN != 0 {
        return Err(Error::Decode(format!("invalid range flags 0x{flags:02X}")));
    }

    if flags & RANGE_EMPTY != 0 {
        return Ok((PgRange::empty(), rest));
    }

    let mut read_bound = |present: bool| -> Result<Option<Value>> {
        if !present {
            return Ok(None);
        }
        let (len, r) = read_i32(rest)?;
        rest = r;
        if len == -1 {
            return Ok(None);
        }
        let (payload, r) = rest
            .split_at_checked(len as usize)
            .ok_or_else(|| Error::Decode(format!("truncated range bound of {len} bytes")))?;
        rest = r;
        (elem.binary)(session, payload).map(Some)
    };

    let lower_value = read_bound(flags & RANGE_LB_INF == 0)?;
    let upper_value = read_bound(flags & RANGE_UB_INF == 0)?;

    let range = PgRange {
        empty: false,
        lower: RangeBound {
            value: lower_value,
            inclusive: flags & RANGE_LB_INC != 0,
            infinite: flags & RANGE_LB_INF != 0,
        },
        upper: RangeBound {
            value: upper_value,
            inclusive: flags & RANGE_UB_INC != 0,
            infinite: flags & RANGE_UB_INF != 0,
        },
    };
    Ok((range, rest))
}

/// Decode range text format.
///
/// Either the literal `empty`, or `[`/`(`, optional value, `,`,
/// optional value, `]`/`)`. An absent value means an infinite bound.
pub fn decode_text(session: &SessionState, bytes: &[u8], elem: &TypeCodec) -> Result<Value> {
    let (range, consumed) = parse_text_range(session, bytes, elem)?;
    if consumed != bytes.len() {
        return Err(Error::Decode(format!(
            "trailing bytes after range at offset {consumed}"
        )));
    }
    Ok(Value::Range(Box::new(range)))
}

fn parse_text_range(
    session: &SessionState,
    bytes: &[u8],
    elem: &TypeCodec,
) -> Result<(PgRange, usize)> {
    if bytes.starts_with(b"empty") {
        return Ok((PgRange::empty(), 5));
    }

    let mut pos = 0;
    let open = *bytes
        .first()
        .ok_or_else(|| Error::Decode("empty range literal".into()))?;
    if open != b'[' && open != b'(' {
        return Err(Error::Decode(format!(
            "range literal must open with '[' or '(', found {:?}",
            open as char
        )));
    }
    pos += 1;

    let (lower_raw, next) = scan_bound(bytes, pos, b',')?;
    pos = next + 1;
    let (upper_raw, next) = scan_bound(bytes, pos, b']')?;
    pos = next;
    let close = bytes[pos];
    if close != b']' && close != b')' {
        return Err(Error::Decode(format!(
            "range literal must close with ']' or ')', found {:?}",
            close as char
        )));
    }
    pos += 1;

    let mut decode_bound = |raw: Option<Vec<u8>>| -> Result<Option<Value>> {
        raw.map(|b| (elem.text)(session, &b)).transpose()
    };

    let lower_value = decode_bound(lower_raw)?;
    let upper_value = decode_bound(upper_raw)?;

    let range = PgRange {
        empty: false,
        lower: RangeBound {
            inclusive: open == b'[' && lower_value.is_some(),
            infinite: lower_value.is_none(),
            value: lower_value,
        },
        upper: RangeBound {
            inclusive: close == b']' && upper_value.is_some(),
            infinite: upper_value.is_none(),
            value: upper_value,
        },
    };
    Ok((range, pos))
}

// Scan one bound up to an unquoted `,` (terminator b',') or an unquoted
// closing bracket (terminator b']' scans for both `]` and `)`).
// Returns the unquoted bound bytes (None when absent) and the index of
// the terminator.
fn scan_bound(bytes: &[u8], start: usize, terminator: u8) -> Result<(Option<Vec<u8>>, usize)> {
    let mut out = Vec::new();
    let mut pos = start;
    let mut quoted = false;
    let mut any = false;

    while pos < bytes.len() {
        let b = bytes[pos];
        if quoted {
            match b {
                b'\\' => {
                    pos += 1;
                    let escaped = *bytes
                        .get(pos)
                        .ok_or_else(|| Error::Decode("unterminated range literal".into()))?;
                    out.push(escaped);
                }
                b'"' => {
                    if bytes.get(pos + 1) == Some(&b'"') {
                        out.push(b'"');
                        pos += 1;
                    } else {
                        quoted = false;
                    }
                }
                _ => out.push(b),
            }
        } else {
            let done = match terminator {
                b',' => b == b',',
                _ => b == b']' || b == b')',
            };
            if done {
                let value = if any { Some(out) } else { None };
                return Ok((value, pos));
            }
            match b {
                b'"' => {
                    quoted = true;
                    any = true;
                }
                b'\\' => {
                    pos += 1;
                    let escaped = *bytes
                        .get(pos)
                        .ok_or_else(|| Error::Decode("unterminated range literal".into()))?;
                    out.push(escaped);
                    any = true;
                }
                _ => {
                    out.push(b);
                    any = true;
                }
            }
        }
        pos += 1;
    }
    Err(Error::Decode("unterminated range literal".into()))
}

/// Decode multirange binary format: u32 range count, then each range as
/// an i32-length-prefixed binary range payload.
pub fn decode_multirange_binary(
    session: &SessionState,
    bytes: &[u8],
    elem: &TypeCodec,
) -> Result<Value> {
    let (count, mut rest) = read_u32(bytes)?;
    let mut ranges = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, r) = read_i32(rest)?;
        let (payload, r) = r
            .split_at_checked(len.max(0) as usize)
            .ok_or_else(|| Error::Decode(format!("truncated multirange entry of {len} bytes")))?;
        rest = r;
        let (range, extra) = parse_binary_range(session, payload, elem)?;
        if !extra.is_empty() {
            return Err(Error::Decode(format!(
                "{} trailing bytes in multirange entry",
                extra.len()
            )));
        }
        ranges.push(range);
    }
    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after multirange",
            rest.len()
        )));
    }
    Ok(Value::Multirange(ranges))
}

/// Decode multirange text format: `{range,range,...}`.
pub fn decode_multirange_text(
    session: &SessionState,
    bytes: &[u8],
    elem: &TypeCodec,
) -> Result<Value> {
    if bytes.first() != Some(&b'{') {
        return Err(Error::Decode("multirange literal must open with '{'".into()));
    }
    let mut pos = 1;
    let mut ranges = Vec::new();

    if bytes.get(pos) == Some(&b'}') {
        pos += 1;
    } else {
        loop {
            let (range, consumed) = parse_text_range(session, &bytes[pos..], elem)?;
            ranges.push(range);
            pos += consumed;
            match bytes.get(pos) {
                Some(b',') => pos += 1,
                Some(b'}') => {
                    pos += 1;
                    break;
                }
                _ => {
                    return Err(Error::Decode(
                        "expected ',' or '}' in multirange literal".into(),
                    ));
                }
            }
        }
    }

    if pos != bytes.len() {
        return Err(Error::Decode(format!(
            "trailing bytes after multirange at offset {pos}"
        )));
    }
    Ok(Value::Multirange(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INT4;

    fn session() -> SessionState {
        SessionState::new()
    }

    fn int4_range_binary(flags: u8, bounds: &[i32]) -> Vec<u8> {
        let mut out = vec![flags];
        for b in bounds {
            out.extend_from_slice(&4_i32.to_be_bytes());
            out.extend_from_slice(&b.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_binary_closed_open() {
        let payload = int4_range_binary(RANGE_LB_INC, &[1, 10]);
        let Value::Range(range) = decode_binary(&session(), &payload, &INT4).unwrap() else {
            panic!()
        };
        assert!(!range.empty);
        assert_eq!(range.lower.value, Some(Value::Int4(1)));
        assert_eq!(range.upper.value, Some(Value::Int4(10)));
        assert_eq!(range.bounds(), "[)");
    }

    #[test]
    fn test_binary_empty() {
        let payload = int4_range_binary(RANGE_EMPTY, &[]);
        let Value::Range(range) = decode_binary(&session(), &payload, &INT4).unwrap() else {
            panic!()
        };
        assert!(range.empty);
    }

    #[test]
    fn test_binary_infinite_lower() {
        let payload = int4_range_binary(RANGE_LB_INF, &[5]);
        let Value::Range(range) = decode_binary(&session(), &payload, &INT4).unwrap() else {
            panic!()
        };
        assert!(range.lower.infinite);
        assert_eq!(range.lower.value, None);
        assert_eq!(range.upper.value, Some(Value::Int4(5)));
    }

    #[test]
    fn test_binary_bad_flags() {
        let payload = int4_range_binary(0x40, &[]);
        assert!(decode_binary(&session(), &payload, &INT4).is_err());
    }

    #[test]
    fn test_text_basic() {
        let Value::Range(range) = decode_text(&session(), b"[1,10)", &INT4).unwrap() else {
            panic!()
        };
        assert_eq!(range.lower.value, Some(Value::Int4(1)));
        assert!(range.lower.inclusive);
        assert_eq!(range.upper.value, Some(Value::Int4(10)));
        assert!(!range.upper.inclusive);
    }

    #[test]
    fn test_text_empty_literal() {
        let Value::Range(range) = decode_text(&session(), b"empty", &INT4).unwrap() else {
            panic!()
        };
        assert!(range.empty);
    }

    #[test]
    fn test_text_open_bounds() {
        let Value::Range(range) = decode_text(&session(), b"(,5]", &INT4).unwrap() else {
            panic!()
        };
        assert!(range.lower.infinite);
        assert!(!range.lower.inclusive);
        assert_eq!(range.upper.value, Some(Value::Int4(5)));
        assert!(range.upper.inclusive);
    }

    #[test]
    fn test_text_quoted_bound() {
        use crate::types::TEXT;
        let Value::Range(range) =
            decode_text(&session(), br#"["a,b","c"]"#, &TEXT).unwrap()
        else {
            panic!()
        };
        assert_eq!(range.lower.value, Some(Value::Text("a,b".into())));
        assert_eq!(range.upper.value, Some(Value::Text("c".into())));
    }

    #[test]
    fn test_multirange_binary() {
        let first = int4_range_binary(RANGE_LB_INC, &[1, 3]);
        let second = int4_range_binary(RANGE_LB_INC, &[5, 9]);
        let mut payload = Vec::new();
        payload.extend_from_slice(&2_u32.to_be_bytes());
        for range in [&first, &second] {
            payload.extend_from_slice(&(range.len() as i32).to_be_bytes());
            payload.extend_from_slice(range);
        }
        let Value::Multirange(ranges) =
            decode_multirange_binary(&session(), &payload, &INT4).unwrap()
        else {
            panic!()
        };
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].lower.value, Some(Value::Int4(5)));
    }

    #[test]
    fn test_multirange_text() {
        let Value::Multirange(ranges) =
            decode_multirange_text(&session(), b"{[1,3),[5,9)}", &INT4).unwrap()
        else {
            panic!()
        };
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].upper.value, Some(Value::Int4(3)));

        let Value::Multirange(ranges) =
            decode_multirange_text(&session(), b"{}", &INT4).unwrap()
        else {
            panic!()
        };
        assert!(ranges.is_empty());
    }
}
