//! Error types for deltastream-rs.
//!
//! The top-level [`DeltaStreamError`] mirrors the fault categories reported by
//! the service. [`ErrorKind`] collapses every variant onto that taxonomy, and
//! [`StatusClass`] classifies raw HTTP status codes before they become errors.

use crate::sqlstate::SqlState;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum DeltaStreamError {
    /// Malformed local request, shape mismatch or closed-resource use
    #[error("{0}")]
    Client(String),

    /// Remote internal error
    #[error("{0}")]
    Server(String),

    /// Credential rejected by the server
    #[error("{0}: error while authenticating with server")]
    Authentication(String),

    /// Remote-declared timeout
    #[error("{0}: deadline exceeded")]
    DeadlineExceeded(String),

    /// Remote-declared temporary outage
    #[error("{0}: service temporarily unavailable")]
    ServiceUnavailable(String),

    /// Terminal non-success status from the query engine
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// Unexpected message shape from the server
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection-related errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Value decoding errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Transport errors
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Error returned by the query engine for a statement that did not complete
/// successfully.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SqlError {
    /// SQL status code reported by the engine
    pub code: SqlState,
    /// Engine-provided message
    pub message: String,
    /// Statement the error belongs to, when known
    pub statement_id: Option<Uuid>,
}

/// Errors related to connection configuration and lifecycle.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Invalid connection parameters
    #[error("Invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Connection string parsing error
    #[error("Failed to parse connection string: {0}")]
    ParseError(String),

    /// No credential was configured
    #[error("no api token provided")]
    MissingToken,

    /// Connection is closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Liveness check failed
    #[error("bad connection: {0}")]
    BadConnection(String),
}

/// Errors related to decoding wire values.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Cell could not be parsed as its declared type
    #[error("Failed to decode '{value}' as {declared_type}: {message}")]
    InvalidValue {
        declared_type: String,
        value: String,
        message: String,
    },

    /// Integer does not fit into 64 bits
    #[error("Numeric overflow decoding '{value}'")]
    NumericOverflow { value: String },

    /// Row width differs from the destination width
    #[error("number of columns does not match size of result slice. expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },
}

/// Errors related to the HTTP and WebSocket transports.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request could not be sent or read
    #[error("unable to send request to server: {0}")]
    HttpError(String),

    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Message serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Message deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Message send error
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// Message receive error
    #[error("unable to read message from server: {0}")]
    ReceiveError(String),

    /// Invalid response from server
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// Handshake did not finish in time
    #[error("Connection timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Fault category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local fault, never retried
    Client,
    /// Remote internal fault
    Server,
    /// Credential rejected
    Authentication,
    /// Remote-declared timeout
    Deadline,
    /// Remote-declared outage
    Unavailable,
    /// Query engine status
    Sql,
    /// Unexpected message shape
    Protocol,
    /// Caller cancellation
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Client => write!(f, "CLIENT"),
            ErrorKind::Server => write!(f, "SERVER"),
            ErrorKind::Authentication => write!(f, "AUTHENTICATION"),
            ErrorKind::Deadline => write!(f, "DEADLINE"),
            ErrorKind::Unavailable => write!(f, "UNAVAILABLE"),
            ErrorKind::Sql => write!(f, "SQL"),
            ErrorKind::Protocol => write!(f, "PROTOCOL"),
            ErrorKind::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl DeltaStreamError {
    /// Map to the fault taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeltaStreamError::Client(_) => ErrorKind::Client,
            DeltaStreamError::Server(_) => ErrorKind::Server,
            DeltaStreamError::Authentication(_) => ErrorKind::Authentication,
            DeltaStreamError::DeadlineExceeded(_) => ErrorKind::Deadline,
            DeltaStreamError::ServiceUnavailable(_) => ErrorKind::Unavailable,
            DeltaStreamError::Sql(_) => ErrorKind::Sql,
            DeltaStreamError::Protocol(_) => ErrorKind::Protocol,
            DeltaStreamError::Cancelled => ErrorKind::Cancelled,
            DeltaStreamError::Connection(_) => ErrorKind::Client,
            DeltaStreamError::Conversion(e) => e.kind(),
            DeltaStreamError::Transport(e) => e.kind(),
        }
    }

    /// Get the SQL error if this is an engine fault.
    pub fn as_sql(&self) -> Option<&SqlError> {
        match self {
            DeltaStreamError::Sql(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this error is a caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeltaStreamError::Cancelled)
    }
}

impl ConversionError {
    /// Map to the fault taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::ColumnCountMismatch { .. } => ErrorKind::Client,
            _ => ErrorKind::Protocol,
        }
    }
}

impl TransportError {
    /// Map to the fault taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::DeserializationError(_) | TransportError::InvalidResponse(_) => {
                ErrorKind::Protocol
            }
            _ => ErrorKind::Client,
        }
    }
}

/// Classification of a response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Terminal response carrying a result set
    Success,
    /// Statement accepted, still executing
    Pending,
    /// Malformed request or unknown resource
    ClientFault,
    /// Remote internal error
    ServerFault,
    /// Credential rejected
    AuthFault,
    /// Remote-declared timeout
    Timeout,
    /// Remote-declared outage
    Unavailable,
}

impl StatusClass {
    /// Classify an HTTP status code.
    pub fn from_http(status: u16) -> Self {
        match status {
            200 => StatusClass::Success,
            202 => StatusClass::Pending,
            403 => StatusClass::AuthFault,
            408 => StatusClass::Timeout,
            500 => StatusClass::ServerFault,
            503 => StatusClass::Unavailable,
            _ => StatusClass::ClientFault,
        }
    }

    /// Check if the status is one the service documents explicitly.
    pub fn is_known_http(status: u16) -> bool {
        matches!(status, 200 | 202 | 400 | 403 | 404 | 408 | 500 | 503)
    }

    /// Turn a fault class into the matching error.
    ///
    /// Returns `None` for `Success` and `Pending`, which are not faults.
    pub fn into_error(self, message: impl Into<String>) -> Option<DeltaStreamError> {
        let message = message.into();
        match self {
            StatusClass::Success | StatusClass::Pending => None,
            StatusClass::ClientFault => Some(DeltaStreamError::Client(message)),
            StatusClass::ServerFault => Some(DeltaStreamError::Server(message)),
            StatusClass::AuthFault => Some(DeltaStreamError::Authentication(message)),
            StatusClass::Timeout => Some(DeltaStreamError::DeadlineExceeded(message)),
            StatusClass::Unavailable => Some(DeltaStreamError::ServiceUnavailable(message)),
        }
    }
}

/// Build the error for a failed HTTP response.
pub(crate) fn classify_failure(status: u16, message: String) -> DeltaStreamError {
    let message = if StatusClass::is_known_http(status) {
        message
    } else {
        format!("unexpected response from server. status code: {}", status)
    };
    StatusClass::from_http(status)
        .into_error(message.clone())
        .unwrap_or(DeltaStreamError::Client(message))
}

/// Build the error for a failed dataplane response.
///
/// Dataplane endpoints report statuses outside the documented set as a
/// server fault.
pub(crate) fn classify_dataplane_failure(status: u16, message: String) -> DeltaStreamError {
    if StatusClass::is_known_http(status) {
        classify_failure(status, message)
    } else {
        DeltaStreamError::Server("unexpected response".to_string())
    }
}

// Conversions from external error types
impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            TransportError::DeserializationError(err.to_string())
        } else {
            TransportError::SerializationError(err.to_string())
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::DeserializationError(err.to_string())
        } else {
            TransportError::HttpError(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocketError(err.to_string())
    }
}

impl From<serde_json::Error> for DeltaStreamError {
    fn from(err: serde_json::Error) -> Self {
        DeltaStreamError::Transport(err.into())
    }
}

impl From<reqwest::Error> for DeltaStreamError {
    fn from(err: reqwest::Error) -> Self {
        DeltaStreamError::Transport(err.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = DeltaStreamError> = std::result::Result<T, E>;
