//! Error types for zero-mywire.

use thiserror::Error;

/// Result type for zero-mywire operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error reported by the server in an ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// MySQL error code (e.g. 1064)
    pub code: u16,
    /// SQLSTATE (5 characters), if the server sent one
    pub sql_state: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        match &self.sql_state {
            Some(state) => write!(f, " (error {}, SQLSTATE {})", self.code, state),
            None => write!(f, " (error {})", self.code),
        }
    }
}

/// Error type for zero-mywire.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response. The connection stays usable.
    #[error("MySQL error: {0}")]
    Server(ServerError),

    /// Protocol error (malformed packet, bad sequence number, unexpected marker)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error from the channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid usage (e.g., expecting rows from a command that returned none)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// A parameter could not be bound or encoded
    #[error("Binding error: {0}")]
    Binding(String),

    /// The result stream was superseded by a later command on its connection
    #[error("Result stream is no longer valid")]
    StaleResult,

    /// Invalid connection options
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if the error leaves the byte stream in an unknown state.
    ///
    /// The connection is killed when such an error is observed and the next
    /// command reconnects.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Protocol(_))
    }

    /// Get the server error code if this is a server error.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server(err) => Some(err.code),
            _ => None,
        }
    }

    /// Get the SQLSTATE if this is a server error.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Error::Server(err) => err.sql_state.as_deref(),
            _ => None,
        }
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}
