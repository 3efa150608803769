//! sqlbridge - uniform text-SQL access to PostgreSQL and MySQL.
//!
//! Connections speak the wire protocols directly (startup, classic
//! authentication mechanisms, single-statement text queries) and switch to
//! the official drivers when the native path cannot complete, so one code
//! path serves servers regardless of their authentication setup.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbridge::{create_connection, create_query};
//!
//! let connection = create_connection("postgres:demo")?;
//! let mut query = create_query(connection);
//! query.set_sql("SELECT id, name FROM users");
//! let result = query.execute()?;
//! for row in &result {
//!     println!("{:?}", row.get_by_name("name"));
//! }
//! ```
//!
//! Connection names are provider-prefixed (`postgres:…`, `mysql:…`);
//! parameters resolve from the environment per provider, or are passed
//! explicitly through [`create_connection_with`] / [`Client::with_params`].

pub mod bridge;
pub mod client;
pub mod factory;
pub mod query;

pub use bridge::{MySqlBridge, PostgresBridge};
pub use client::Client;
pub use factory::{create_connection, create_connection_with, create_query};
pub use query::Query;

// Re-export the shared data model so callers need only this crate.
pub use sqlbridge_core::{
    ColumnInfo, Connection, ConnectionParams, ConnectionState, Error, FromValue, Provider, Result,
    ResultSet, Row, Value,
};

// The fallback retry policy is part of the public connect surface.
pub use sqlbridge_fallback::RetryPolicy;
