//! Asynchronous PostgreSQL client facade on tokio.

mod conn;

pub use conn::Conn;
