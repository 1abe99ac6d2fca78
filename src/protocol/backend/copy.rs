//! COPY subprotocol backend messages.

use crate::error::Result;
use crate::protocol::codec::{read_u8, read_u16};
use crate::protocol::types::FormatCode;

fn parse_copy_response(payload: &[u8]) -> Result<(FormatCode, Vec<FormatCode>)> {
    let (format_byte, rest) = read_u8(payload)?;
    let format = FormatCode::from_u16(u16::from(format_byte));

    let (num_columns, mut rest) = read_u16(rest)?;
    let mut column_formats = Vec::with_capacity(num_columns as usize);
    for _ in 0..num_columns {
        let (fmt, remaining) = read_u16(rest)?;
        column_formats.push(FormatCode::from_u16(fmt));
        rest = remaining;
    }
    Ok((format, column_formats))
}

/// CopyInResponse message - the server is ready to receive COPY data.
#[derive(Debug, Clone)]
pub struct CopyInResponse {
    /// Overall format.
    pub format: FormatCode,
    /// Per-column format codes.
    pub column_formats: Vec<FormatCode>,
}

impl CopyInResponse {
    /// Parse a CopyInResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (format, column_formats) = parse_copy_response(payload)?;
        Ok(Self {
            format,
            column_formats,
        })
    }
}

/// CopyOutResponse message - the server is about to send COPY data.
#[derive(Debug, Clone)]
pub struct CopyOutResponse {
    /// Overall format.
    pub format: FormatCode,
    /// Per-column format codes.
    pub column_formats: Vec<FormatCode>,
}

impl CopyOutResponse {
    /// Parse a CopyOutResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (format, column_formats) = parse_copy_response(payload)?;
        Ok(Self {
            format,
            column_formats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_out_response() {
        let mut payload = vec![0u8];
        payload.extend_from_slice(&2_u16.to_be_bytes());
        payload.extend_from_slice(&0_u16.to_be_bytes());
        payload.extend_from_slice(&0_u16.to_be_bytes());

        let resp = CopyOutResponse::parse(&payload).unwrap();
        assert_eq!(resp.format, FormatCode::Text);
        assert_eq!(resp.column_formats.len(), 2);
    }
}
