//! Connection parameters and environment resolution.
//!
//! Parameters are resolved once, before a connection is constructed, and
//! passed in as a value. Connections never re-resolve them.

use crate::Result;
use crate::error::config_error;
use serde::{Deserialize, Serialize};

/// Database provider selected by a connection name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// PostgreSQL
    Postgres,
    /// MySQL
    MySql,
}

impl Provider {
    /// Parse the provider from a connection name.
    ///
    /// The name is a provider prefix optionally followed by `:` and a
    /// logical label, e.g. `"postgres"` or `"mysql:demo"`.
    #[allow(clippy::result_large_err)]
    pub fn from_name(name: &str) -> Result<Self> {
        let prefix = name.split(':').next().unwrap_or(name);
        match prefix.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Provider::Postgres),
            "mysql" => Ok(Provider::MySql),
            other => Err(config_error(format!(
                "unknown provider '{}' in connection name '{}'",
                other, name
            ))),
        }
    }

    /// Canonical provider name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Postgres => "postgres",
            Provider::MySql => "mysql",
        }
    }

    /// Conventional server port for the provider.
    pub const fn default_port(self) -> u16 {
        match self {
            Provider::Postgres => 5432,
            Provider::MySql => 3306,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters for a single database session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Hostname or IP address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Database name
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication (empty string means no password)
    pub password: String,
}

impl ConnectionParams {
    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Hard defaults for a local PostgreSQL server.
    pub fn postgres_defaults() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
        }
    }

    /// Hard defaults for a local MySQL server.
    pub fn mysql_defaults() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "demo".to_string(),
            user: "root".to_string(),
            password: "password".to_string(),
        }
    }

    /// Resolve parameters from the process environment.
    ///
    /// Each field resolves independently: primary environment variable,
    /// then secondary, then the hard default. Nothing is cached; every
    /// call re-reads the environment.
    pub fn from_env(provider: Provider) -> Self {
        Self::resolve(provider, |key| std::env::var(key).ok())
    }

    /// Resolve parameters through an arbitrary lookup function.
    ///
    /// `from_env` is this with `std::env::var`; tests inject a map.
    pub fn resolve(provider: Provider, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let field = |primary: &str, secondary: Option<&str>, default: &str| {
            lookup(primary)
                .or_else(|| secondary.and_then(&lookup))
                .unwrap_or_else(|| default.to_string())
        };
        match provider {
            Provider::Postgres => Self {
                host: field("PGHOST", Some("POSTGRES_HOST"), "localhost"),
                port: parse_port(&field("PGPORT", Some("POSTGRES_PORT"), "5432"), 5432),
                database: field("PGDATABASE", Some("POSTGRES_DB"), "postgres"),
                user: field("PGUSER", Some("POSTGRES_USER"), "postgres"),
                password: field("PGPASSWORD", Some("POSTGRES_PASSWORD"), "postgres"),
            },
            Provider::MySql => Self {
                host: field("MYSQL_HOST", None, "localhost"),
                port: parse_port(&field("MYSQL_PORT", None, "3306"), 3306),
                database: field("MYSQL_DB", None, "demo"),
                user: field("MYSQL_USER", None, "root"),
                password: field("MYSQL_PASS", None, "password"),
            },
        }
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(raw: &str, default: u16) -> u16 {
    match raw.trim().parse() {
        Ok(port) => port,
        Err(_) => {
            tracing::warn!(raw, default, "Unparseable port value, using default");
            default
        }
    }
}
