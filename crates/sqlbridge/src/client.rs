//! Convenience facade orchestrating connect, execute, disconnect.

use crate::factory;
use sqlbridge_core::connection::Connection;
use sqlbridge_core::error::state_error;
use sqlbridge_core::row::ResultSet;
use sqlbridge_core::{ConnectionParams, Result};

/// A named connection with explicit lifecycle control.
///
/// Unlike [`Query`](crate::Query), the client never connects implicitly:
/// `execute_text` on a closed client is a state error. This mirrors a
/// request handler that connects once, runs statements, and disconnects.
pub struct Client {
    connection: Box<dyn Connection>,
}

impl Client {
    /// Build a client for a provider-prefixed name, resolving parameters
    /// from the environment.
    #[allow(clippy::result_large_err)]
    pub fn new(name: &str) -> Result<Self> {
        Ok(Client {
            connection: factory::create_connection(name)?,
        })
    }

    /// Build a client with explicit parameters.
    #[allow(clippy::result_large_err)]
    pub fn with_params(name: &str, params: ConnectionParams) -> Result<Self> {
        Ok(Client {
            connection: factory::create_connection_with(name, params)?,
        })
    }

    /// Establish the session, native path first, driver fallback second.
    #[allow(clippy::result_large_err)]
    pub fn connect(&mut self) -> Result<()> {
        self.connection.connect()
    }

    /// Execute one text statement on the established session.
    #[allow(clippy::result_large_err)]
    pub fn execute_text(&mut self, sql: &str) -> Result<ResultSet> {
        if !self.connection.is_connected() {
            return Err(state_error(format!(
                "client '{}' is not connected",
                self.connection.identity()
            )));
        }
        self.connection.execute(sql)
    }

    /// Close the session. Safe to repeat.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Access the underlying connection.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.connection.identity())
            .field("state", &self.connection.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbridge_core::connection::ConnectionState;

    #[test]
    fn test_execute_before_connect_is_a_state_error() {
        let mut client =
            Client::with_params("postgres:demo", ConnectionParams::postgres_defaults()).unwrap();
        let err = client.execute_text("SELECT 1").unwrap_err();
        assert!(err.to_string().contains("not connected"));
        assert!(err.to_string().contains("postgres:demo"));
    }

    #[test]
    fn test_disconnect_is_safe_to_repeat() {
        let mut client = Client::with_params("mysql", ConnectionParams::mysql_defaults()).unwrap();
        client.disconnect();
        client.disconnect();
        assert!(!client.connection().is_connected());
        assert_eq!(client.connection().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_bad_name_fails_construction() {
        assert!(Client::new("sqlite:memory").is_err());
    }
}
