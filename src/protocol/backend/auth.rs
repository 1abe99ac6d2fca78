//! Authentication-related backend messages.

use zerocopy::byteorder::big_endian::U32 as U32BE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_cstr, read_i32, read_u32};
use crate::protocol::types::TransactionStatus;

/// Authentication request subtype codes.
pub mod auth_type {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SASL: i32 = 10;
    pub const SASL_CONTINUE: i32 = 11;
    pub const SASL_FINAL: i32 = 12;
}

/// Authentication request from the server.
#[derive(Debug)]
pub enum AuthenticationMessage<'a> {
    /// Authentication successful
    Ok,
    /// Cleartext password required
    CleartextPassword,
    /// MD5 password required (with 4-byte salt)
    Md5Password {
        /// Salt to mix into the hash
        salt: [u8; 4],
    },
    /// SASL authentication required (with offered mechanisms)
    Sasl {
        /// Mechanism names in server preference order
        mechanisms: Vec<&'a str>,
    },
    /// SASL continue (server-first-message)
    SaslContinue {
        /// Mechanism-specific payload
        data: &'a [u8],
    },
    /// SASL final (server-final-message)
    SaslFinal {
        /// Mechanism-specific payload
        data: &'a [u8],
    },
    /// Any other method; the code is kept for the error message.
    Other(i32),
}

impl<'a> AuthenticationMessage<'a> {
    /// Parse an Authentication message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (code, rest) = read_i32(payload)?;
        Ok(match code {
            auth_type::OK => AuthenticationMessage::Ok,
            auth_type::CLEARTEXT_PASSWORD => AuthenticationMessage::CleartextPassword,
            auth_type::MD5_PASSWORD => {
                let salt: [u8; 4] = rest
                    .try_into()
                    .map_err(|_| Error::Framing("MD5 authentication request without salt".into()))?;
                AuthenticationMessage::Md5Password { salt }
            }
            auth_type::SASL => {
                let mut mechanisms = Vec::new();
                let mut data = rest;
                while data.first().is_some_and(|&b| b != 0) {
                    let (mechanism, remaining) = read_cstr(data)?;
                    mechanisms.push(mechanism);
                    data = remaining;
                }
                AuthenticationMessage::Sasl { mechanisms }
            }
            auth_type::SASL_CONTINUE => AuthenticationMessage::SaslContinue { data: rest },
            auth_type::SASL_FINAL => AuthenticationMessage::SaslFinal { data: rest },
            other => AuthenticationMessage::Other(other),
        })
    }
}

/// BackendKeyData message - process ID and secret key for cancellation.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct BackendKeyData {
    pid: U32BE,
    secret_key: U32BE,
}

impl BackendKeyData {
    /// Parse a BackendKeyData message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Self::read_from_bytes(payload)
            .map_err(|e| Error::Framing(format!("BackendKeyData: {e:?}")))
    }

    /// The backend process ID.
    pub fn process_id(&self) -> u32 {
        self.pid.get()
    }

    /// The cancellation secret key.
    pub fn secret(&self) -> u32 {
        self.secret_key.get()
    }
}

/// ParameterStatus message - a server parameter name and value.
#[derive(Debug, Clone)]
pub struct ParameterStatus<'a> {
    /// Parameter name
    pub name: &'a str,
    /// Parameter value
    pub value: &'a str,
}

impl<'a> ParameterStatus<'a> {
    /// Parse a ParameterStatus message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (name, rest) = read_cstr(payload)?;
        let (value, _) = read_cstr(rest)?;
        Ok(Self { name, value })
    }
}

/// ReadyForQuery message - the server's end-of-turn marker.
#[derive(Debug, Clone, Copy)]
pub struct ReadyForQuery {
    /// Current transaction status
    pub transaction_status: TransactionStatus,
}

impl ReadyForQuery {
    /// Parse a ReadyForQuery message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let [status] = payload else {
            return Err(Error::Framing(format!(
                "ReadyForQuery payload of {} bytes",
                payload.len()
            )));
        };
        let transaction_status = TransactionStatus::from_byte(*status).ok_or_else(|| {
            Error::Protocol(format!("unknown transaction status {:?}", *status as char))
        })?;
        Ok(Self { transaction_status })
    }
}

/// NotificationResponse message - LISTEN/NOTIFY payload.
#[derive(Debug, Clone)]
pub struct NotificationResponse<'a> {
    /// PID of the notifying backend
    pub pid: u32,
    /// Channel name
    pub channel: &'a str,
    /// Notification payload
    pub payload: &'a str,
}

impl<'a> NotificationResponse<'a> {
    /// Parse a NotificationResponse message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (pid, rest) = read_u32(payload)?;
        let (channel, rest) = read_cstr(rest)?;
        let (notify_payload, _) = read_cstr(rest)?;
        Ok(Self {
            pid,
            channel,
            payload: notify_payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_ok() {
        let bytes = 0_i32.to_be_bytes();
        let msg = AuthenticationMessage::parse(&bytes).unwrap();
        assert!(matches!(msg, AuthenticationMessage::Ok));
    }

    #[test]
    fn test_auth_sasl_mechanisms() {
        let mut payload = 10_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"SCRAM-SHA-256\0SCRAM-SHA-256-PLUS\0\0");
        let msg = AuthenticationMessage::parse(&payload).unwrap();
        let AuthenticationMessage::Sasl { mechanisms } = msg else {
            panic!()
        };
        assert_eq!(mechanisms, vec!["SCRAM-SHA-256", "SCRAM-SHA-256-PLUS"]);
    }

    #[test]
    fn test_auth_md5_salt() {
        let mut payload = 5_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[9, 8, 7, 6]);
        let msg = AuthenticationMessage::parse(&payload).unwrap();
        assert!(matches!(
            msg,
            AuthenticationMessage::Md5Password { salt: [9, 8, 7, 6] }
        ));
    }

    #[test]
    fn test_backend_key_data() {
        let mut payload = 77_u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&0xfeed_u32.to_be_bytes());
        let key = BackendKeyData::parse(&payload).unwrap();
        assert_eq!(key.process_id(), 77);
        assert_eq!(key.secret(), 0xfeed);
    }

    #[test]
    fn test_ready_for_query() {
        let rfq = ReadyForQuery::parse(b"I").unwrap();
        assert_eq!(rfq.transaction_status, TransactionStatus::Idle);
        assert!(ReadyForQuery::parse(b"X").is_err());
        assert!(ReadyForQuery::parse(b"").is_err());
    }

    #[test]
    fn test_notification() {
        let mut payload = 5_u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"jobs\0run 17\0");
        let n = NotificationResponse::parse(&payload).unwrap();
        assert_eq!((n.pid, n.channel, n.payload), (5, "jobs", "run 17"));
    }
}
