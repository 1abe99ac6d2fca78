//! Extended query protocol backend messages.

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i16, read_u32};
use crate::protocol::types::Oid;

macro_rules! empty_message {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl $name {
            /// Parse from payload bytes; the payload must be empty.
            pub fn parse(payload: &[u8]) -> Result<Self> {
                if payload.is_empty() {
                    Ok(Self)
                } else {
                    Err(Error::Framing(format!(
                        concat!(stringify!($name), " with {} payload bytes"),
                        payload.len()
                    )))
                }
            }
        }
    };
}

empty_message!(
    /// ParseComplete - the server accepted a Parse.
    ParseComplete
);
empty_message!(
    /// BindComplete - the server accepted a Bind.
    BindComplete
);
empty_message!(
    /// CloseComplete - the server released a statement or portal.
    CloseComplete
);
empty_message!(
    /// NoData - the described statement or portal returns no rows.
    NoData
);
empty_message!(
    /// PortalSuspended - the row limit of an Execute was reached.
    PortalSuspended
);

/// ParameterDescription - parameter type OIDs of a described statement.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    /// One OID per `$n` placeholder.
    pub oids: Vec<Oid>,
}

impl ParameterDescription {
    /// Parse a ParameterDescription message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (count, mut rest) = read_i16(payload)?;
        if count < 0 {
            return Err(Error::Framing(format!(
                "negative parameter count {count}"
            )));
        }
        let mut oids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (oid, r) = read_u32(rest)?;
            oids.push(oid);
            rest = r;
        }
        Ok(Self { oids })
    }
}
