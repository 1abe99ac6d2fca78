//! numeric values and the base-10000 wire codec.
//!
//! Binary layout: header (ndigits u16, weight i16, sign u16, dscale u16)
//! followed by ndigits base-10000 digits. The weight is the power of
//! 10000 of the first digit.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i16, read_text, read_u16};
use crate::session::SessionState;
use crate::value::Value;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const NBASE: u16 = 10000;
const DEC_DIGITS: usize = 4;

/// A PostgreSQL numeric value.
///
/// The wire type carries NaN and signed infinities alongside finite
/// decimals, so those are preserved here rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// A finite decimal value.
    Finite(Decimal),
    /// Not-a-number.
    NaN,
    /// Positive infinity.
    Infinity,
    /// Negative infinity.
    NegInfinity,
}

impl Numeric {
    /// The finite decimal, if this value is finite.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Numeric::Finite(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<Decimal> for Numeric {
    fn from(d: Decimal) -> Self {
        Numeric::Finite(d)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Finite(d) => write!(f, "{d}"),
            Numeric::NaN => write!(f, "NaN"),
            Numeric::Infinity => write!(f, "Infinity"),
            Numeric::NegInfinity => write!(f, "-Infinity"),
        }
    }
}

impl FromStr for Numeric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NaN" => Ok(Numeric::NaN),
            "Infinity" | "inf" => Ok(Numeric::Infinity),
            "-Infinity" | "-inf" => Ok(Numeric::NegInfinity),
            _ => Decimal::from_str_exact(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map(Numeric::Finite)
                .map_err(|e| Error::Decode(format!("invalid numeric {s:?}: {e}"))),
        }
    }
}

/// Decode numeric text format.
pub fn numeric_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    Ok(Value::Numeric(s.parse()?))
}

/// Decode numeric binary format.
pub fn numeric_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Numeric(parse_binary(bytes)?))
}

/// Parse the binary payload into a [`Numeric`].
pub fn parse_binary(bytes: &[u8]) -> Result<Numeric> {
    if bytes.len() < 8 {
        return Err(Error::Decode(format!(
            "truncated numeric header: {} bytes",
            bytes.len()
        )));
    }
    let (ndigits, rest) = read_u16(bytes)?;
    let (weight, rest) = read_i16(rest)?;
    let (sign, rest) = read_u16(rest)?;
    let (dscale, rest) = read_u16(rest)?;

    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        NUMERIC_NAN => return Ok(Numeric::NaN),
        NUMERIC_PINF => return Ok(Numeric::Infinity),
        NUMERIC_NINF => return Ok(Numeric::NegInfinity),
        _ => return Err(Error::Decode(format!("invalid numeric sign 0x{sign:04X}"))),
    };

    let ndigits = ndigits as usize;
    if rest.len() < ndigits * 2 {
        return Err(Error::Decode(format!(
            "truncated numeric: {} digit bytes for {} digits",
            rest.len(),
            ndigits
        )));
    }

    // Mantissa as base-10 digits, then a decimal exponent in base 10.
    let mut mantissa = String::with_capacity(ndigits * DEC_DIGITS + 1);
    for i in 0..ndigits {
        let digit = u16::from_be_bytes([rest[i * 2], rest[i * 2 + 1]]);
        if digit >= NBASE {
            return Err(Error::Decode(format!("invalid base-10000 digit {digit}")));
        }
        if mantissa.is_empty() {
            mantissa.push_str(&digit.to_string());
        } else {
            mantissa.push_str(&format!("{digit:04}"));
        }
    }
    if mantissa.is_empty() {
        mantissa.push('0');
    }

    let exponent = (weight as i32 + 1 - ndigits as i32) * DEC_DIGITS as i32;

    let mut literal = String::with_capacity(mantissa.len() + 8);
    if negative {
        literal.push('-');
    }
    if exponent >= 0 {
        literal.push_str(&mantissa);
        for _ in 0..exponent {
            literal.push('0');
        }
    } else {
        let frac_len = (-exponent) as usize;
        if mantissa.len() > frac_len {
            let split = mantissa.len() - frac_len;
            literal.push_str(&mantissa[..split]);
            literal.push('.');
            literal.push_str(&mantissa[split..]);
        } else {
            literal.push_str("0.");
            for _ in 0..(frac_len - mantissa.len()) {
                literal.push('0');
            }
            literal.push_str(&mantissa);
        }
    }

    let mut value = Decimal::from_str_exact(&literal)
        .map_err(|e| Error::Decode(format!("numeric out of range: {e}")))?;

    // Trailing digits of the last base-10000 group exceed the display
    // scale; dscale clips them. The decimal point never moves here, only
    // trailing zeros disappear (or reappear when dscale asks for more).
    const MAX_DECIMAL_SCALE: u16 = 28;
    if dscale <= MAX_DECIMAL_SCALE {
        value.rescale(u32::from(dscale));
    }

    Ok(Numeric::Finite(value))
}

/// Encode a numeric as the binary payload (header + digits, no length).
pub fn encode_binary(value: &Numeric, out: &mut Vec<u8>) {
    let (d, negative) = match value {
        Numeric::NaN => return encode_special(NUMERIC_NAN, out),
        Numeric::Infinity => return encode_special(NUMERIC_PINF, out),
        Numeric::NegInfinity => return encode_special(NUMERIC_NINF, out),
        Numeric::Finite(d) => (d, d.is_sign_negative()),
    };

    let scale = d.scale() as i32;
    let mantissa = d.mantissa().unsigned_abs();

    if mantissa == 0 {
        out.extend_from_slice(&0_u16.to_be_bytes());
        out.extend_from_slice(&0_i16.to_be_bytes());
        out.extend_from_slice(&NUMERIC_POS.to_be_bytes());
        out.extend_from_slice(&(scale as u16).to_be_bytes());
        return;
    }

    // Align base-10 digits into groups of four around the decimal point.
    let digits = mantissa.to_string();
    let int_len = digits.len() as i32 - scale;
    let pad_left = (-int_len).rem_euclid(DEC_DIGITS as i32) as usize;
    let mut padded = String::with_capacity(digits.len() + 8);
    for _ in 0..pad_left {
        padded.push('0');
    }
    padded.push_str(&digits);
    while padded.len() % DEC_DIGITS != 0 {
        padded.push('0');
    }

    let mut groups: Vec<u16> = padded
        .as_bytes()
        .chunks(DEC_DIGITS)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0_u16, |acc, b| acc * 10 + u16::from(b - b'0'))
        })
        .collect();

    let mut weight = (int_len + pad_left as i32) / DEC_DIGITS as i32 - 1;

    while groups.first() == Some(&0) {
        groups.remove(0);
        weight -= 1;
    }
    while groups.last() == Some(&0) {
        groups.pop();
    }

    out.extend_from_slice(&(groups.len() as u16).to_be_bytes());
    out.extend_from_slice(&(weight as i16).to_be_bytes());
    let sign = if negative { NUMERIC_NEG } else { NUMERIC_POS };
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&(scale as u16).to_be_bytes());
    for group in groups {
        out.extend_from_slice(&group.to_be_bytes());
    }
}

fn encode_special(sign: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(&0_u16.to_be_bytes());
    out.extend_from_slice(&0_i16.to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&0_u16.to_be_bytes());
}
