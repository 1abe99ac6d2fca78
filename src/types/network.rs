//! inet and cidr values and codecs.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::session::SessionState;
use crate::value::Value;

// Address family codes used in the binary format (from PostgreSQL's
// utils/inet.h, not the OS-level AF_* values).
const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// Host address with an optional network prefix (PostgreSQL `inet`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inet {
    /// The host address.
    pub addr: IpAddr,
    /// Prefix length; `None` means the full-length host prefix.
    pub prefix: Option<u8>,
}

impl Inet {
    /// Create an inet value, validating the prefix length.
    pub fn new(addr: IpAddr, prefix: Option<u8>) -> Result<Self> {
        if let Some(bits) = prefix {
            if bits > max_prefix(&addr) {
                return Err(Error::Decode(format!(
                    "invalid prefix length {bits} for {addr}"
                )));
            }
        }
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for Inet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(bits) if bits != max_prefix(&self.addr) => {
                write!(f, "{}/{}", self.addr, bits)
            }
            _ => write!(f, "{}", self.addr),
        }
    }
}

impl FromStr for Inet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = split_prefix(s)?;
        Inet::new(addr, prefix)
    }
}

/// Network address (PostgreSQL `cidr`); the prefix is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    /// The network address.
    pub addr: IpAddr,
    /// Prefix length in bits.
    pub prefix: u8,
}

impl Cidr {
    /// Create a cidr value, validating the prefix length.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self> {
        if prefix > max_prefix(&addr) {
            return Err(Error::Decode(format!(
                "invalid prefix length {prefix} for {addr}"
            )));
        }
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = split_prefix(s)?;
        let prefix = prefix.unwrap_or_else(|| max_prefix(&addr));
        Cidr::new(addr, prefix)
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn split_prefix(s: &str) -> Result<(IpAddr, Option<u8>)> {
    let (addr_part, prefix) = match s.split_once('/') {
        Some((addr, bits)) => {
            let bits: u8 = bits
                .parse()
                .map_err(|_| Error::Decode(format!("invalid network prefix: {s}")))?;
            (addr, Some(bits))
        }
        None => (s, None),
    };
    let addr: IpAddr = addr_part
        .parse()
        .map_err(|_| Error::Decode(format!("invalid network address: {s}")))?;
    Ok((addr, prefix))
}

/// Decode inet text format.
pub fn inet_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = crate::protocol::codec::read_text(bytes)?;
    Ok(Value::Inet(s.parse()?))
}

/// Decode inet binary format.
pub fn inet_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let (addr, bits, is_cidr) = parse_binary(bytes)?;
    if is_cidr {
        return Err(Error::Decode("cidr payload in inet column".into()));
    }
    let prefix = if bits == max_prefix(&addr) {
        None
    } else {
        Some(bits)
    };
    Ok(Value::Inet(Inet::new(addr, prefix)?))
}

/// Decode cidr text format.
pub fn cidr_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = crate::protocol::codec::read_text(bytes)?;
    Ok(Value::Cidr(s.parse()?))
}

/// Decode cidr binary format.
pub fn cidr_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let (addr, bits, is_cidr) = parse_binary(bytes)?;
    if !is_cidr {
        return Err(Error::Decode("inet payload in cidr column".into()));
    }
    Ok(Value::Cidr(Cidr::new(addr, bits)?))
}

// Binary layout: family, prefix bits, is_cidr flag, address length, address.
fn parse_binary(bytes: &[u8]) -> Result<(IpAddr, u8, bool)> {
    let [family, bits, is_cidr, len, addr @ ..] = bytes else {
        return Err(Error::Decode(format!(
            "truncated network value: {} bytes",
            bytes.len()
        )));
    };
    if addr.len() != *len as usize {
        return Err(Error::Decode(format!(
            "network address length mismatch: {} != {}",
            addr.len(),
            len
        )));
    }
    let addr = match (*family, <&[u8; 4]>::try_from(addr), <&[u8; 16]>::try_from(addr)) {
        (PGSQL_AF_INET, Ok(octets), _) => IpAddr::V4(Ipv4Addr::from(*octets)),
        (PGSQL_AF_INET6, _, Ok(octets)) => IpAddr::V6(Ipv6Addr::from(*octets)),
        _ => {
            return Err(Error::Decode(format!(
                "unsupported address family {family} with {} bytes",
                addr.len()
            )));
        }
    };
    if *bits > max_prefix(&addr) {
        return Err(Error::Decode(format!("invalid prefix length {bits}")));
    }
    Ok((addr, *bits, *is_cidr != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionState {
        SessionState::new()
    }

    #[test]
    fn test_inet_text_roundtrip() {
        let v = inet_text(&session(), b"192.168.0.1").unwrap();
        assert_eq!(
            v,
            Value::Inet(Inet {
                addr: "192.168.0.1".parse().unwrap(),
                prefix: None
            })
        );

        let v = inet_text(&session(), b"10.0.0.0/8").unwrap();
        let Value::Inet(inet) = v else { panic!() };
        assert_eq!(inet.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_inet_host_prefix_is_elided() {
        let inet = Inet {
            addr: "::1".parse().unwrap(),
            prefix: Some(128),
        };
        assert_eq!(inet.to_string(), "::1");
    }

    #[test]
    fn test_cidr_display_always_has_prefix() {
        let cidr: Cidr = "10.1.0.0/16".parse().unwrap();
        assert_eq!(cidr.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_inet_binary() {
        // 127.0.0.1/32
        let v = inet_binary(&session(), &[2, 32, 0, 4, 127, 0, 0, 1]).unwrap();
        let Value::Inet(inet) = v else { panic!() };
        assert_eq!(inet.to_string(), "127.0.0.1");
        assert_eq!(inet.prefix, None);
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        assert!("1.2.3.4/40".parse::<Inet>().is_err());
        assert!(inet_binary(&session(), &[2, 40, 0, 4, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_truncated_binary_rejected() {
        assert!(inet_binary(&session(), &[2, 32, 0, 4, 127]).is_err());
    }
}
