//! SQL binding and execution against an owned connection.

use sqlbridge_core::Result;
use sqlbridge_core::connection::Connection;
use sqlbridge_core::error::state_error;
use sqlbridge_core::row::ResultSet;

/// One SQL statement bound to a connection.
///
/// The query owns its connection and brings it up on demand: `execute`
/// connects first when the session is down. Any failure along the way
/// closes the connection before the error propagates, so a query never
/// leaves a half-usable session behind.
pub struct Query {
    connection: Box<dyn Connection>,
    sql: Option<String>,
}

impl Query {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Query {
            connection,
            sql: None,
        }
    }

    /// Set the SQL text, replacing any previous statement.
    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = Some(sql.into());
    }

    /// The currently bound SQL text.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Access the owned connection.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Execute the bound statement.
    ///
    /// Fails with a state error when no SQL was set; that failure is local
    /// and leaves the connection untouched.
    #[allow(clippy::result_large_err)]
    pub fn execute(&mut self) -> Result<ResultSet> {
        let Some(sql) = self.sql.clone() else {
            return Err(state_error("no SQL set on query"));
        };
        match self.run(&sql) {
            Ok(result) => Ok(result),
            Err(err) => {
                // Cleanup never raises, so it cannot mask the failure.
                self.connection.disconnect();
                Err(err)
            }
        }
    }

    /// Release the underlying connection.
    pub fn into_connection(self) -> Box<dyn Connection> {
        self.connection
    }

    #[allow(clippy::result_large_err)]
    fn run(&mut self, sql: &str) -> Result<ResultSet> {
        if !self.connection.is_connected() {
            self.connection.connect()?;
        }
        self.connection.execute(sql)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("identity", &self.connection.identity())
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}
