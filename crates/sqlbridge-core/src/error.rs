//! Error types for sqlbridge operations.

use std::fmt;

/// The primary error type for all sqlbridge operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (socket setup, authentication, lost link)
    Connection(ConnectionError),
    /// Wire-level errors (malformed or unexpected frames)
    Protocol(ProtocolError),
    /// Query execution errors reported by the server
    Query(QueryError),
    /// Type conversion errors when reading row values
    Type(TypeError),
    /// Configuration errors (bad identity, unusable parameters)
    Config(ConfigError),
    /// Lifecycle misuse (execute before connect, SQL unset)
    State(String),
    /// Both the native path and the fallback driver failed to connect
    Fallback(FallbackFailure),
    /// I/O errors outside connection establishment
    Io(std::io::Error),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Connection refused by the peer
    Refused,
    /// Other socket-level failure while connecting or negotiating
    Io,
    /// Connection lost during an operation
    Disconnected,
    /// Server rejected the supplied credentials
    Authentication,
    /// Server demanded an auth mechanism the native path does not speak
    UnsupportedAuth,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    /// Offending bytes, when a frame was captured before the failure.
    pub raw_data: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct QueryError {
    /// Server-reported message, verbatim.
    pub message: String,
    /// Server-reported code (SQLSTATE or numeric), verbatim.
    pub code: Option<String>,
    /// The statement that failed, when known.
    pub sql: Option<String>,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// Aggregate raised when the native attempt and the fallback both fail.
///
/// Keeps both underlying causes so neither failure is ever swallowed.
#[derive(Debug)]
pub struct FallbackFailure {
    pub native: Box<Error>,
    pub fallback: Box<Error>,
}

impl Error {
    /// May the fallback driver still rescue this connect attempt?
    ///
    /// True for socket, protocol, and unsupported-mechanism failures during
    /// negotiation. False when the server actively rejected the credentials
    /// and for everything after a session is established: retrying those
    /// through another driver would either fail the same way or hide a real
    /// error.
    pub fn is_fallback_eligible(&self) -> bool {
        match self {
            Error::Connection(c) => matches!(
                c.kind,
                ConnectionErrorKind::Refused
                    | ConnectionErrorKind::Io
                    | ConnectionErrorKind::Disconnected
                    | ConnectionErrorKind::UnsupportedAuth
            ),
            Error::Protocol(_) | Error::Io(_) => true,
            _ => false,
        }
    }

    /// Get the server-reported code if this is a query error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.code.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Query(e) => {
                if let Some(code) = &e.code {
                    write!(f, "Query error ({}): {}", code, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::State(msg) => write!(f, "State error: {}", msg),
            Error::Fallback(e) => write!(
                f,
                "Connection failed on both paths: native: {}; fallback: {}",
                e.native, e.fallback
            ),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Fallback(e) => Some(e.native.as_ref()),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{} ({})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(f, "expected {} for column '{}', found {}", self.expected, col, self.actual)
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for FallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native: {}; fallback: {}", self.native, self.fallback)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for sqlbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

// ==================== Helper Constructors ====================

/// Build a connection error of the given kind.
pub fn connection_error(kind: ConnectionErrorKind, message: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind,
        message: message.into(),
        source: None,
    })
}

/// Build a connection error wrapping an underlying cause.
pub fn connection_error_with(
    kind: ConnectionErrorKind,
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    Error::Connection(ConnectionError {
        kind,
        message: message.into(),
        source: Some(Box::new(source)),
    })
}

/// Build an authentication-rejected error.
pub fn auth_error(message: impl Into<String>) -> Error {
    connection_error(ConnectionErrorKind::Authentication, message)
}

/// Build an unsupported-auth-mechanism error (fallback-eligible).
pub fn unsupported_auth(message: impl Into<String>) -> Error {
    connection_error(ConnectionErrorKind::UnsupportedAuth, message)
}

/// Build a protocol violation error.
pub fn protocol_error(message: impl Into<String>) -> Error {
    Error::Protocol(ProtocolError {
        message: message.into(),
        raw_data: None,
    })
}

/// Build a protocol violation error keeping the offending bytes.
pub fn protocol_error_with(message: impl Into<String>, raw_data: Vec<u8>) -> Error {
    Error::Protocol(ProtocolError {
        message: message.into(),
        raw_data: Some(raw_data),
    })
}

/// Build a query execution error with verbatim server text.
pub fn query_error(message: impl Into<String>, code: Option<String>, sql: Option<String>) -> Error {
    Error::Query(QueryError {
        message: message.into(),
        code,
        sql,
    })
}

/// Build a lifecycle misuse error.
pub fn state_error(message: impl Into<String>) -> Error {
    Error::State(message.into())
}

/// Build a configuration error.
pub fn config_error(message: impl Into<String>) -> Error {
    Error::Config(ConfigError {
        message: message.into(),
    })
}

/// Aggregate the native and fallback connect failures into one error.
pub fn fallback_failure(native: Error, fallback: Error) -> Error {
    Error::Fallback(FallbackFailure {
        native: Box::new(native),
        fallback: Box::new(fallback),
    })
}

/// Classify an I/O error from socket setup as a connection error.
pub fn connect_io_error(host: &str, port: u16, err: std::io::Error) -> Error {
    let kind = if err.kind() == std::io::ErrorKind::ConnectionRefused {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Io
    };
    Error::Connection(ConnectionError {
        kind,
        message: format!("failed to connect to {}:{}: {}", host, port, err),
        source: Some(Box::new(err)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        assert!(connection_error(ConnectionErrorKind::Refused, "refused").is_fallback_eligible());
        assert!(connection_error(ConnectionErrorKind::Io, "io").is_fallback_eligible());
        assert!(unsupported_auth("scram requested").is_fallback_eligible());
        assert!(protocol_error("bad frame").is_fallback_eligible());
        assert!(
            Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"))
                .is_fallback_eligible()
        );

        assert!(!auth_error("password rejected").is_fallback_eligible());
        assert!(!query_error("no such table", None, None).is_fallback_eligible());
        assert!(!state_error("no sql set").is_fallback_eligible());
        assert!(!config_error("bad name").is_fallback_eligible());
    }

    #[test]
    fn test_query_error_accessors() {
        let err = query_error(
            "relation \"missing\" does not exist",
            Some("42P01".to_string()),
            Some("SELECT * FROM missing".to_string()),
        );
        assert_eq!(err.code(), Some("42P01"));
        assert_eq!(err.sql(), Some("SELECT * FROM missing"));
        assert!(err.to_string().contains("42P01"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_fallback_failure_keeps_both_causes() {
        let native = unsupported_auth("server requested SCRAM-SHA-256");
        let fallback = connection_error(ConnectionErrorKind::Refused, "connection refused");
        let err = fallback_failure(native, fallback);

        let text = err.to_string();
        assert!(text.contains("SCRAM-SHA-256"));
        assert!(text.contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_connect_io_error_classification() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        match connect_io_error("localhost", 5432, refused) {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Refused),
            other => panic!("unexpected error: {other}"),
        }

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        match connect_io_error("localhost", 5432, timed_out) {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Io),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(
            state_error("no SQL set on query").to_string(),
            "State error: no SQL set on query"
        );
        assert_eq!(
            protocol_error("unexpected frame").to_string(),
            "Protocol error: unexpected frame"
        );
        let auth = auth_error("password authentication failed");
        assert!(auth.to_string().starts_with("Connection error:"));
    }
}
