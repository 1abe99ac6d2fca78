//! Error types for pagio.

use thiserror::Error;

/// Result type for pagio operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Structured fields of a PostgreSQL ErrorResponse or NoticeResponse.
///
/// Field meanings follow the protocol's error/notice field codes.
#[derive(Debug, Clone, Default)]
pub struct ServerError {
    /// Severity (localized): ERROR, FATAL, PANIC, WARNING, NOTICE, ...
    pub severity: Option<String>,
    /// Severity (non-localized, PostgreSQL 9.6+)
    pub severity_non_localized: Option<String>,
    /// SQLSTATE code (5 characters)
    pub code: Option<String>,
    /// Primary error message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in the query string (1-based)
    pub position: Option<u32>,
    /// Position in an internally generated query
    pub internal_position: Option<u32>,
    /// Failed internal command text
    pub internal_query: Option<String>,
    /// Context / stack trace
    pub where_: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: Option<String>,
    /// Column name
    pub column: Option<String>,
    /// Data type name
    pub data_type: Option<String>,
    /// Constraint name
    pub constraint: Option<String>,
    /// Source file name
    pub file: Option<String>,
    /// Source line number
    pub line: Option<u32>,
    /// Source routine name
    pub routine: Option<String>,
}

impl ServerError {
    /// SQLSTATE code, or the empty string when absent.
    pub fn sqlstate(&self) -> &str {
        self.code.as_deref().unwrap_or_default()
    }

    /// Severity, preferring the non-localized variant.
    pub fn severity(&self) -> &str {
        self.severity_non_localized
            .as_deref()
            .or(self.severity.as_deref())
            .unwrap_or_default()
    }

    /// True when the backend considers the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), "FATAL" | "PANIC")
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} (SQLSTATE {})",
            self.severity(),
            self.message.as_deref().unwrap_or_default(),
            self.sqlstate()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for pagio.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("PostgreSQL error: {0}")]
    Server(ServerError),

    /// Framing error (bad message length, under-read, invalid layout)
    #[error("Framing error: {0}")]
    Framing(String),

    /// Protocol error (message received in the wrong state)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Value decode error (malformed value for declared OID/format)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Value encode error (input outside PostgreSQL ranges)
    #[error("Encode error: {0}")]
    Encode(String),

    /// I/O error from the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Fatal client configuration problem (e.g. non-UTF8 client_encoding)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid usage of the API
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and
    /// cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::Config(_) => true,
            Error::Server(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(err) => err.code.as_deref(),
            _ => None,
        }
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::Server(err)
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized> From<zerocopy::error::CastError<Src, Dst>>
    for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
