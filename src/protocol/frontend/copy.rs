//! COPY subprotocol frontend messages.

use crate::protocol::codec::MessageBuilder;

/// Write a CopyData message carrying one chunk of COPY payload.
pub fn write_copy_data(buf: &mut Vec<u8>, data: &[u8]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::COPY_DATA);
    msg.write_bytes(data);
    msg.finish();
}

/// Write a CopyDone message, ending a COPY IN stream.
pub fn write_copy_done(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::COPY_DONE);
    msg.finish();
}

/// Write a CopyFail message, aborting a COPY IN stream.
pub fn write_copy_fail(buf: &mut Vec<u8>, reason: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::COPY_FAIL);
    msg.write_cstr(reason);
    msg.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_messages() {
        let mut buf = Vec::new();
        write_copy_data(&mut buf, b"1\tone\n");
        write_copy_done(&mut buf);

        assert_eq!(buf[0], b'd');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len, 4 + 6);
        assert_eq!(&buf[11..], &[b'c', 0, 0, 0, 4]);
    }

    #[test]
    fn test_copy_fail_carries_reason() {
        let mut buf = Vec::new();
        write_copy_fail(&mut buf, "no source data");

        assert_eq!(buf[0], b'f');
        assert!(buf.ends_with(b"no source data\0"));
    }
}
