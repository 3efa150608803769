//! Provider bridges holding the native-or-fallback session.
//!
//! A bridge implements [`Connection`] for one provider. `connect()` tries
//! the hand-rolled wire client first; when that fails in a way the driver
//! could still rescue (unsupported auth mechanism, socket or protocol
//! trouble during negotiation), it switches to the external driver. The
//! choice is made once per connect and held for the session's lifetime.
//! Credentials actively rejected by the server are terminal on both
//! providers: retrying them through another driver would only repeat the
//! rejection.

use sqlbridge_core::connection::{Connection, ConnectionState};
use sqlbridge_core::error::{fallback_failure, state_error};
use sqlbridge_core::row::ResultSet;
use sqlbridge_core::{ConnectionParams, Result};
use sqlbridge_fallback::retry::RetryPolicy;
use sqlbridge_fallback::{MySqlDriver, PostgresDriver};
use sqlbridge_mysql::MySqlConnection;
use sqlbridge_postgres::PgConnection;

// ==================== PostgreSQL ====================

enum PgSession {
    Native(PgConnection),
    Fallback(PostgresDriver),
}

/// A PostgreSQL connection preferring the native wire client.
pub struct PostgresBridge {
    identity: String,
    params: ConnectionParams,
    retry: RetryPolicy,
    session: Option<PgSession>,
    failed: bool,
}

impl PostgresBridge {
    pub fn new(identity: impl Into<String>, params: ConnectionParams) -> Self {
        PostgresBridge {
            identity: identity.into(),
            params,
            retry: RetryPolicy::default(),
            session: None,
            failed: false,
        }
    }

    /// Override the retry policy used for the driver fallback.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Connection for PostgresBridge {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.failed = false;
        match PgConnection::connect(self.params.clone()) {
            Ok(native) => {
                tracing::debug!(identity = %self.identity, "Native postgres session established");
                self.session = Some(PgSession::Native(native));
                Ok(())
            }
            Err(native_err) if native_err.is_fallback_eligible() => {
                tracing::warn!(
                    identity = %self.identity,
                    error = %native_err,
                    "Native postgres path failed, switching to driver fallback"
                );
                match PostgresDriver::connect(&self.params, self.retry) {
                    Ok(driver) => {
                        self.session = Some(PgSession::Fallback(driver));
                        Ok(())
                    }
                    Err(fallback_err) => {
                        self.failed = true;
                        let err = fallback_failure(native_err, fallback_err);
                        tracing::error!(
                            identity = %self.identity,
                            error = %err,
                            "Both connection paths failed"
                        );
                        Err(err)
                    }
                }
            }
            Err(err) => {
                self.failed = true;
                tracing::error!(
                    identity = %self.identity,
                    error = %err,
                    "Native postgres connect failed"
                );
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        match self.session.take() {
            Some(PgSession::Native(mut native)) => native.close(),
            Some(PgSession::Fallback(driver)) => driver.close(),
            None => {}
        }
        self.failed = false;
        tracing::debug!(identity = %self.identity, "Disconnected");
    }

    fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        match self.session.as_mut() {
            Some(PgSession::Native(native)) => native.execute(sql),
            Some(PgSession::Fallback(driver)) => driver.execute(sql),
            None => Err(state_error(format!("connection '{}' is not connected", self.identity))),
        }
    }

    fn state(&self) -> ConnectionState {
        match &self.session {
            Some(PgSession::Native(_)) => ConnectionState::NativeConnected,
            Some(PgSession::Fallback(_)) => ConnectionState::FallbackConnected,
            None if self.failed => ConnectionState::Failed,
            None => ConnectionState::Disconnected,
        }
    }
}

impl std::fmt::Debug for PostgresBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBridge")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ==================== MySQL ====================

enum MySqlSession {
    Native(MySqlConnection),
    Fallback(MySqlDriver),
}

/// A MySQL connection preferring the native wire client.
pub struct MySqlBridge {
    identity: String,
    params: ConnectionParams,
    retry: RetryPolicy,
    session: Option<MySqlSession>,
    failed: bool,
}

impl MySqlBridge {
    pub fn new(identity: impl Into<String>, params: ConnectionParams) -> Self {
        MySqlBridge {
            identity: identity.into(),
            params,
            retry: RetryPolicy::default(),
            session: None,
            failed: false,
        }
    }

    /// Override the retry policy used for the driver fallback.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Connection for MySqlBridge {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.failed = false;
        match MySqlConnection::connect(self.params.clone()) {
            Ok(native) => {
                tracing::debug!(identity = %self.identity, "Native mysql session established");
                self.session = Some(MySqlSession::Native(native));
                Ok(())
            }
            Err(native_err) if native_err.is_fallback_eligible() => {
                tracing::warn!(
                    identity = %self.identity,
                    error = %native_err,
                    "Native mysql path failed, switching to driver fallback"
                );
                match MySqlDriver::connect(&self.params, self.retry) {
                    Ok(driver) => {
                        self.session = Some(MySqlSession::Fallback(driver));
                        Ok(())
                    }
                    Err(fallback_err) => {
                        self.failed = true;
                        let err = fallback_failure(native_err, fallback_err);
                        tracing::error!(
                            identity = %self.identity,
                            error = %err,
                            "Both connection paths failed"
                        );
                        Err(err)
                    }
                }
            }
            Err(err) => {
                self.failed = true;
                tracing::error!(
                    identity = %self.identity,
                    error = %err,
                    "Native mysql connect failed"
                );
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        match self.session.take() {
            Some(MySqlSession::Native(mut native)) => native.close(),
            Some(MySqlSession::Fallback(driver)) => driver.close(),
            None => {}
        }
        self.failed = false;
        tracing::debug!(identity = %self.identity, "Disconnected");
    }

    fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        match self.session.as_mut() {
            Some(MySqlSession::Native(native)) => native.execute(sql),
            Some(MySqlSession::Fallback(driver)) => driver.execute(sql),
            None => Err(state_error(format!("connection '{}' is not connected", self.identity))),
        }
    }

    fn state(&self) -> ConnectionState {
        match &self.session {
            Some(MySqlSession::Native(_)) => ConnectionState::NativeConnected,
            Some(MySqlSession::Fallback(_)) => ConnectionState::FallbackConnected,
            None if self.failed => ConnectionState::Failed,
            None => ConnectionState::Disconnected,
        }
    }
}

impl std::fmt::Debug for MySqlBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlBridge")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
