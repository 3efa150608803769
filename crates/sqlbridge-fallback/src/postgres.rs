//! PostgreSQL access through the external `postgres` driver.
//!
//! Used when the native wire client cannot establish a session, typically
//! because the server demands an authentication mechanism the native path
//! does not speak (SCRAM-SHA-256 and friends). Statements still travel as
//! text: both reads and writes go through the driver's simple-query path so
//! results come back in the same shape the native client produces.

use crate::response::success_row;
use crate::retry::{RetryPolicy, connect_with_retry};
use crate::sql::{StatementKind, classify, normalize_sql};
use postgres::{Client, NoTls, SimpleQueryMessage};
use sqlbridge_core::error::{ConnectionErrorKind, Error, connection_error_with, query_error};
use sqlbridge_core::row::{ColumnInfo, ResultSet, Row};
use sqlbridge_core::value::Value;
use sqlbridge_core::{ConnectionParams, Result};
use std::fmt;
use std::sync::Arc;

/// A PostgreSQL session carried by the `postgres` crate.
pub struct PostgresDriver {
    client: Client,
    host: String,
}

impl PostgresDriver {
    /// Connect through the driver, retrying per `policy`.
    #[allow(clippy::result_large_err)]
    pub fn connect(params: &ConnectionParams, policy: RetryPolicy) -> Result<Self> {
        let conninfo = conninfo(params);
        tracing::debug!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "Connecting through postgres driver"
        );
        let client = connect_with_retry(policy, "postgres", || {
            Client::connect(&conninfo, NoTls).map_err(|e| connect_failure(params, e))
        })?;
        tracing::debug!(host = %params.host, "Postgres driver session established");
        Ok(PostgresDriver {
            client,
            host: params.host.clone(),
        })
    }

    /// Execute one text statement.
    ///
    /// Reads return the server's rows; writes return the synthesized
    /// success row with the affected count.
    #[allow(clippy::result_large_err)]
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        let sql = normalize_sql(sql);
        tracing::debug!(sql = %sql, "Executing through postgres driver");
        match classify(&sql) {
            StatementKind::Read => self.fetch(&sql),
            StatementKind::Write => self.update(&sql),
        }
    }

    /// Probe whether the session is still usable.
    pub fn is_valid(&mut self) -> bool {
        !self.client.is_closed() && self.client.simple_query("SELECT 1").is_ok()
    }

    /// Close the session, swallowing shutdown errors.
    pub fn close(self) {
        let _ = self.client.close();
        tracing::debug!(host = %self.host, "Postgres driver session closed");
    }

    #[allow(clippy::result_large_err)]
    fn fetch(&mut self, sql: &str) -> Result<ResultSet> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(|e| query_failure(sql, e))?;

        let mut columns: Option<Arc<ColumnInfo>> = None;
        let mut rows = Vec::new();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    let names = description.iter().map(|c| c.name().to_string()).collect();
                    columns = Some(Arc::new(ColumnInfo::new(names)));
                }
                SimpleQueryMessage::Row(row) => {
                    let info = columns.get_or_insert_with(|| {
                        let names = row.columns().iter().map(|c| c.name().to_string()).collect();
                        Arc::new(ColumnInfo::new(names))
                    });
                    let values = (0..row.len())
                        .map(|i| {
                            row.get(i)
                                .map_or(Value::Null, |text| Value::Text(text.to_string()))
                        })
                        .collect();
                    rows.push(Row::new(Arc::clone(info), values));
                }
                SimpleQueryMessage::CommandComplete(_) => {}
                _ => {}
            }
        }

        let row_count = rows.len();
        let result = match columns {
            Some(info) => ResultSet::new(info, rows),
            None => ResultSet::empty(),
        };
        tracing::debug!(rows = row_count, "Result set received from postgres driver");
        Ok(result)
    }

    #[allow(clippy::result_large_err)]
    fn update(&mut self, sql: &str) -> Result<ResultSet> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(|e| query_failure(sql, e))?;

        let mut affected = 0;
        for message in messages {
            if let SimpleQueryMessage::CommandComplete(count) = message {
                affected = count;
            }
        }
        tracing::debug!(affected, "Statement executed through postgres driver");
        Ok(success_row(affected))
    }
}

impl fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("host", &self.host)
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

// ==================== Helper Functions ====================

/// Render parameters as a libpq keyword/value conninfo string.
fn conninfo(params: &ConnectionParams) -> String {
    format!(
        "host={} port={} dbname={} user={} password={}",
        quote(&params.host),
        params.port,
        quote(&params.database),
        quote(&params.user),
        quote(&params.password)
    )
}

/// Quote a conninfo value when libpq syntax requires it.
fn quote(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}

/// Map a driver error during statement execution.
///
/// Server-reported errors keep their message and SQLSTATE verbatim; anything
/// else means the session itself broke.
fn query_failure(sql: &str, err: postgres::Error) -> Error {
    if let Some(db) = err.as_db_error() {
        return query_error(
            db.message().to_string(),
            Some(db.code().code().to_string()),
            Some(sql.to_string()),
        );
    }
    connection_error_with(
        ConnectionErrorKind::Disconnected,
        format!("postgres driver error: {}", err),
        err,
    )
}

fn connect_failure(params: &ConnectionParams, err: postgres::Error) -> Error {
    connection_error_with(
        ConnectionErrorKind::Io,
        format!("postgres driver could not reach {}:{}: {}", params.host, params.port, err),
        err,
    )
}
