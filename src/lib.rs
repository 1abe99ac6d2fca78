//! A PostgreSQL client library built around a sans-I/O protocol engine.
//!
//! # Design
//!
//! - **Sans-I/O engine**: [`Engine`] drives one connection's wire
//!   protocol without performing any I/O; the `sync` and `tokio`
//!   facades supply the transport.
//! - **Transparent statement cache**: statements executed often enough
//!   are prepared server-side under `_pagio_NNN` names and later
//!   executions skip Parse and Describe; eviction closes statements
//!   lazily, piggy-backed on the next execute.
//! - **Full codec matrix**: per-OID text and binary decoders, including
//!   arrays, ranges and multiranges, driven by session state
//!   (DateStyle, TimeZone).
//!
//! # Example
//!
//! ```no_run
//! use pagio::sync::Conn;
//! use pagio::{Opts, Param};
//!
//! fn main() -> pagio::Result<()> {
//!     let mut conn = Conn::connect(Opts {
//!         host: "localhost".into(),
//!         user: "postgres".into(),
//!         database: Some("mydb".into()),
//!         password: Some("secret".into()),
//!         ..Default::default()
//!     })?;
//!
//!     let results = conn.execute("SELECT $1::int4 + 1", &[Param::Int(41)])?;
//!     println!("{:?}", results[0].rows);
//!
//!     conn.close()?;
//!     Ok(())
//! }
//! ```

// private
mod cache;
mod error;
mod framer;
mod opts;

// pub
pub mod engine;
pub mod param;
pub mod protocol;
pub mod session;
pub mod types;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use engine::{AsyncMessage, Engine, ExecResult, Status};
pub use error::{Error, Result, ServerError};
pub use framer::Framer;
pub use opts::{Opts, SslMode};
pub use param::Param;
pub use protocol::types::{FormatCode, Oid, ResultFormat, TransactionStatus};
pub use session::SessionState;
pub use value::{Field, ResultSet, Row, Value};
