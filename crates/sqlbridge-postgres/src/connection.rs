//! PostgreSQL connection implementation.
//!
//! Implements startup, password-based authentication, and simple-query
//! execution. Every result cell arrives as text; the server's richer type
//! information is deliberately not decoded.

use std::collections::HashMap;
use std::sync::Arc;

use sqlbridge_core::channel::PacketChannel;
use sqlbridge_core::error::{
    auth_error, protocol_error, query_error, state_error, unsupported_auth,
};
use sqlbridge_core::{ColumnInfo, ConnectionParams, Error, Result, ResultSet, Row, Value};

use crate::protocol::{
    AuthRequest, BackendMessage, FrontendMessage, MessageWriter, PROTOCOL_VERSION, PgFrame,
};

/// A live PostgreSQL session over the hand-rolled wire protocol.
pub struct PgConnection {
    /// Frame transport to the server
    channel: PacketChannel<PgFrame>,
    /// Reusable frontend message encoder
    writer: MessageWriter,
    /// Server parameters reported during startup
    parameters: HashMap<String, String>,
    /// Backend process ID from BackendKeyData
    process_id: i32,
    /// Connection parameters this session was opened with
    params: ConnectionParams,
    /// Session is usable for queries
    open: bool,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("host", &self.params.host)
            .field("port", &self.params.port)
            .field("database", &self.params.database)
            .field("process_id", &self.process_id)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Establish a session: TCP connect, startup message, authentication,
    /// then drain server reports until ReadyForQuery.
    #[allow(clippy::result_large_err)]
    pub fn connect(params: ConnectionParams) -> Result<Self> {
        tracing::debug!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "Connecting to PostgreSQL"
        );
        let channel = PacketChannel::connect(&params.host, params.port)?;

        let mut conn = Self {
            channel,
            writer: MessageWriter::new(),
            parameters: HashMap::new(),
            process_id: 0,
            params,
            open: false,
        };

        conn.send(&FrontendMessage::Startup {
            version: PROTOCOL_VERSION,
            params: vec![
                ("user".to_string(), conn.params.user.clone()),
                ("database".to_string(), conn.params.database.clone()),
            ],
        })?;
        conn.negotiate()?;
        conn.open = true;

        tracing::debug!(process_id = conn.process_id, "PostgreSQL session established");
        Ok(conn)
    }

    /// Check if the session is usable for queries.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Get a server parameter reported during startup.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Get all server parameters reported during startup.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Get the backend process ID.
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// Execute one text statement via the simple-query flow.
    ///
    /// Rows arrive between a RowDescription and ReadyForQuery; statements
    /// without a result set yield an empty set. A server error is returned
    /// verbatim after the stream is drained back to ReadyForQuery, so the
    /// session stays usable.
    #[allow(clippy::result_large_err)]
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        if !self.open {
            return Err(state_error("execute on a closed PostgreSQL session"));
        }
        tracing::debug!(sql, "Executing statement");
        self.send(&FrontendMessage::Query(sql.to_string()))?;

        let mut columns: Option<Arc<ColumnInfo>> = None;
        let mut rows = Vec::new();
        let mut failure: Option<Error> = None;

        loop {
            match self.receive()? {
                BackendMessage::RowDescription { columns: names } => {
                    columns = Some(Arc::new(ColumnInfo::new(names)));
                }
                BackendMessage::DataRow { cells } => {
                    let Some(cols) = &columns else {
                        failure.get_or_insert_with(|| {
                            protocol_error("DataRow before RowDescription")
                        });
                        continue;
                    };
                    let values = cells
                        .into_iter()
                        .map(|cell| match cell {
                            Some(bytes) => {
                                Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                            }
                            None => Value::Null,
                        })
                        .collect();
                    rows.push(Row::new(Arc::clone(cols), values));
                }
                // Command tags are not interpreted; row data already tells
                // readers from writers apart.
                BackendMessage::CommandComplete { .. } | BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(fields) => {
                    let code = fields.code().map(str::to_string);
                    failure.get_or_insert_with(|| {
                        query_error(fields.message(), code, Some(sql.to_string()))
                    });
                }
                BackendMessage::NoticeResponse(fields) => {
                    tracing::debug!(notice = %fields.message(), "Server notice");
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery { .. } => break,
                other => {
                    tracing::trace!(message = ?other, "Skipping unhandled message");
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let columns = columns.unwrap_or_else(|| Arc::new(ColumnInfo::empty()));
        Ok(ResultSet::new(columns, rows))
    }

    /// Close the session: best-effort Terminate, then drop the socket.
    ///
    /// Safe to call repeatedly; never fails.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        let (tag, payload) = self.writer.write(&FrontendMessage::Terminate);
        let _ = self.channel.write_frame(tag, payload);
        self.channel.shutdown();
        self.open = false;
        tracing::debug!("PostgreSQL session closed");
    }

    // ==================== Negotiation ====================

    /// Drive authentication and startup until the server is ready.
    ///
    /// ReadyForQuery is only valid after AuthenticationOk; a server that
    /// skips authentication is violating the protocol.
    #[allow(clippy::result_large_err)]
    fn negotiate(&mut self) -> Result<()> {
        let mut auth_ok = false;
        loop {
            match self.receive()? {
                BackendMessage::Authentication(AuthRequest::Ok) => {
                    auth_ok = true;
                }
                BackendMessage::Authentication(AuthRequest::CleartextPassword) => {
                    let password = self.params.password.clone();
                    self.send(&FrontendMessage::Password(password))?;
                }
                BackendMessage::Authentication(AuthRequest::Md5Password { salt }) => {
                    let hash = md5_password(&self.params.user, &self.params.password, salt);
                    self.send(&FrontendMessage::Password(hash))?;
                }
                BackendMessage::Authentication(AuthRequest::Other(sub_type)) => {
                    return Err(unsupported_auth(format!(
                        "Server requested authentication sub-type {}",
                        sub_type
                    )));
                }
                BackendMessage::ErrorResponse(fields) => {
                    return Err(auth_error(fields.message()));
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                // The secret key would only matter for query cancellation,
                // which this client does not issue.
                BackendMessage::BackendKeyData { process_id, .. } => {
                    self.process_id = process_id;
                }
                BackendMessage::NoticeResponse(fields) => {
                    tracing::debug!(notice = %fields.message(), "Server notice during startup");
                }
                BackendMessage::ReadyForQuery { .. } => {
                    if !auth_ok {
                        return Err(protocol_error("ReadyForQuery before authentication completed"));
                    }
                    return Ok(());
                }
                other => {
                    tracing::trace!(message = ?other, "Skipping message during startup");
                }
            }
        }
    }

    // ==================== Low-Level I/O ====================

    #[allow(clippy::result_large_err)]
    fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        let (tag, payload) = self.writer.write(msg);
        self.channel.write_frame(tag, payload)
    }

    #[allow(clippy::result_large_err)]
    fn receive(&mut self) -> Result<BackendMessage> {
        let frame = self.channel.read_frame()?;
        let tag = frame.meta.unwrap_or(0);
        BackendMessage::parse(tag, &frame.payload)
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        self.close();
    }
}

// ==================== Helper Functions ====================

/// Compute the MD5 password response: `"md5" + hex(md5(hex(md5(password +
/// user)) + salt))`.
fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = format!("{}{}", password, user);
    let inner_hash = md5::compute(inner.as_bytes());

    let mut outer_input = format!("{:x}", inner_hash).into_bytes();
    outer_input.extend_from_slice(&salt);
    let outer_hash = md5::compute(&outer_input);

    format!("md5{:x}", outer_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_password_shape() {
        let hash = md5_password("postgres", "mysecretpassword", *b"abcd");
        assert!(hash.starts_with("md5"));
        assert_eq!(hash.len(), 35); // "md5" + 32 hex chars
        assert!(hash[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_md5_password_depends_on_all_inputs() {
        let base = md5_password("alice", "secret", [1, 2, 3, 4]);
        assert_eq!(base, md5_password("alice", "secret", [1, 2, 3, 4]));
        assert_ne!(base, md5_password("bob", "secret", [1, 2, 3, 4]));
        assert_ne!(base, md5_password("alice", "other", [1, 2, 3, 4]));
        assert_ne!(base, md5_password("alice", "secret", [4, 3, 2, 1]));
    }
}
