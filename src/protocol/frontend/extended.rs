//! Extended query protocol messages.

use crate::param::EncodedParam;
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{FormatCode, Oid};

/// Write a Parse message to create a prepared statement.
///
/// - `name`: Statement name (empty string for the unnamed statement)
/// - `query`: SQL with $1, $2, ... placeholders
/// - `param_oids`: Parameter type OIDs (0 = let the server infer)
pub fn write_parse(buf: &mut Vec<u8>, name: &str, query: &str, param_oids: &[Oid]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PARSE);
    msg.write_cstr(name);
    msg.write_cstr(query);
    msg.write_i16(param_oids.len() as i16);
    for &oid in param_oids {
        msg.write_u32(oid);
    }
    msg.finish();
}

/// Write a Bind message to create a portal from a prepared statement.
///
/// Parameter format codes and values come straight from the encoded
/// parameters; each value is length-prefixed, with −1 for NULL.
pub fn write_bind(
    buf: &mut Vec<u8>,
    portal: &str,
    statement: &str,
    params: &[EncodedParam],
    result_formats: &[FormatCode],
) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::BIND);

    msg.write_cstr(portal);
    msg.write_cstr(statement);

    msg.write_i16(params.len() as i16);
    for param in params {
        msg.write_i16(param.format as i16);
    }

    msg.write_i16(params.len() as i16);
    for param in params {
        match param.data.as_bytes() {
            None => msg.write_i32(-1),
            Some(payload) => {
                msg.write_i32(payload.len() as i32);
                msg.write_bytes(payload);
            }
        }
    }

    msg.write_i16(result_formats.len() as i16);
    for &fmt in result_formats {
        msg.write_i16(fmt as i16);
    }

    msg.finish();
}

/// Write an Execute message to run a portal.
///
/// - `portal`: Portal name
/// - `max_rows`: Maximum rows to return (0 = unlimited)
pub fn write_execute(buf: &mut Vec<u8>, portal: &str, max_rows: u32) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::EXECUTE);
    msg.write_cstr(portal);
    msg.write_i32(max_rows as i32);
    msg.finish();
}

/// Write a Describe message for a portal.
pub fn write_describe_portal(buf: &mut Vec<u8>, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::DESCRIBE);
    msg.write_u8(b'P');
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Describe message for a statement.
pub fn write_describe_statement(buf: &mut Vec<u8>, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::DESCRIBE);
    msg.write_u8(b'S');
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Close message for a statement.
pub fn write_close_statement(buf: &mut Vec<u8>, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::CLOSE);
    msg.write_u8(b'S');
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Sync message.
///
/// Ends an extended query sequence; the server answers the whole unit
/// with ReadyForQuery after it (and rolls back an implicit transaction
/// on failure).
pub fn write_sync(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::SYNC);
    msg.finish();
}
