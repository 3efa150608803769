//! Connection contract shared by every provider.

use crate::Result;
use crate::row::ResultSet;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a connection.
///
/// `NativeConnected` and `FallbackConnected` are mutually exclusive success
/// states for the current session; once one is reached it holds until
/// `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session, nothing in flight
    Disconnected,
    /// Handshake or authentication in progress
    Negotiating,
    /// Hand-rolled wire session established
    NativeConnected,
    /// Driver-backed session established after the native path failed
    FallbackConnected,
    /// Last connect attempt failed and no session exists
    Failed,
}

impl ConnectionState {
    /// Check if queries can be executed in this state.
    pub const fn is_connected(self) -> bool {
        matches!(self, ConnectionState::NativeConnected | ConnectionState::FallbackConnected)
    }

    /// Lowercase label for log output.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::NativeConnected => "native-connected",
            ConnectionState::FallbackConnected => "fallback-connected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database connection executing text SQL against one server.
///
/// Implementations own exactly one underlying session and serve one caller
/// at a time; all calls block until the server replies.
pub trait Connection {
    /// The logical name this connection was created under.
    fn identity(&self) -> &str;

    /// Establish a session.
    ///
    /// A no-op when already connected. After a failed attempt the next call
    /// starts fresh. Each call makes exactly one attempt per path.
    fn connect(&mut self) -> Result<()>;

    /// Close the session.
    ///
    /// Idempotent and infallible: close failures are logged, never raised,
    /// and the state always returns to `Disconnected`.
    fn disconnect(&mut self);

    /// Check whether queries can currently be executed.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Execute one text SQL statement.
    ///
    /// Fails with a state error when not connected. Statements without a
    /// result set produce an empty `ResultSet`.
    fn execute(&mut self, sql: &str) -> Result<ResultSet>;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;
}
