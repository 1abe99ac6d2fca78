//! ErrorResponse and NoticeResponse parsing.

use crate::error::{Result, ServerError};
use crate::protocol::codec::read_cstr;

/// Error/notice field codes from the protocol.
pub mod field_type {
    pub const SEVERITY: u8 = b'S';
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
    pub const INTERNAL_POSITION: u8 = b'p';
    pub const INTERNAL_QUERY: u8 = b'q';
    pub const WHERE: u8 = b'W';
    pub const SCHEMA: u8 = b's';
    pub const TABLE: u8 = b't';
    pub const COLUMN: u8 = b'c';
    pub const DATA_TYPE: u8 = b'd';
    pub const CONSTRAINT: u8 = b'n';
    pub const FILE: u8 = b'F';
    pub const LINE: u8 = b'L';
    pub const ROUTINE: u8 = b'R';
}

/// Parse an ErrorResponse payload into structured fields.
pub fn parse_error_fields(payload: &[u8]) -> Result<ServerError> {
    parse_fields(payload)
}

/// Parse a NoticeResponse payload into structured fields.
///
/// Notices share the error field layout.
pub fn parse_notice_fields(payload: &[u8]) -> Result<ServerError> {
    parse_fields(payload)
}

fn parse_fields(payload: &[u8]) -> Result<ServerError> {
    let mut fields = ServerError::default();
    let mut data = payload;

    while let Some((&code, rest)) = data.split_first() {
        if code == 0 {
            break;
        }
        let (value, rest) = read_cstr(rest)?;
        data = rest;

        match code {
            field_type::SEVERITY => fields.severity = Some(value.to_string()),
            field_type::SEVERITY_NON_LOCALIZED => {
                fields.severity_non_localized = Some(value.to_string());
            }
            field_type::CODE => fields.code = Some(value.to_string()),
            field_type::MESSAGE => fields.message = Some(value.to_string()),
            field_type::DETAIL => fields.detail = Some(value.to_string()),
            field_type::HINT => fields.hint = Some(value.to_string()),
            field_type::POSITION => fields.position = value.parse().ok(),
            field_type::INTERNAL_POSITION => fields.internal_position = value.parse().ok(),
            field_type::INTERNAL_QUERY => fields.internal_query = Some(value.to_string()),
            field_type::WHERE => fields.where_ = Some(value.to_string()),
            field_type::SCHEMA => fields.schema = Some(value.to_string()),
            field_type::TABLE => fields.table = Some(value.to_string()),
            field_type::COLUMN => fields.column = Some(value.to_string()),
            field_type::DATA_TYPE => fields.data_type = Some(value.to_string()),
            field_type::CONSTRAINT => fields.constraint = Some(value.to_string()),
            field_type::FILE => fields.file = Some(value.to_string()),
            field_type::LINE => fields.line = value.parse().ok(),
            field_type::ROUTINE => fields.routine = Some(value.to_string()),
            other => {
                tracing::debug!("unknown error field type: {}", other as char);
            }
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(fields: &[(u8, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (code, value) in fields {
            out.push(*code);
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }
        out.push(0);
        out
    }

    #[test]
    fn test_parse_error_fields() {
        let bytes = payload(&[
            (b'S', "ERROR"),
            (b'V', "ERROR"),
            (b'C', "0A000"),
            (b'M', "cached plan must not change result type"),
            (b'R', "RevalidateCachedQuery"),
            (b'L', "97"),
        ]);
        let err = parse_error_fields(&bytes).unwrap();
        assert_eq!(err.sqlstate(), "0A000");
        assert_eq!(err.routine.as_deref(), Some("RevalidateCachedQuery"));
        assert_eq!(err.line, Some(97));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unknown_field_ignored() {
        let bytes = payload(&[(b'Z', "future"), (b'M', "msg")]);
        let err = parse_error_fields(&bytes).unwrap();
        assert_eq!(err.message.as_deref(), Some("msg"));
    }
}
