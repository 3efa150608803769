//! Connection and query construction.
//!
//! Names are provider-prefixed: `"postgres:demo"` selects the PostgreSQL
//! bridge with logical label `demo`. `create_connection` resolves
//! parameters from the environment on every call; nothing is cached, so a
//! changed environment is picked up by the next connection.

use crate::bridge::{MySqlBridge, PostgresBridge};
use crate::query::Query;
use sqlbridge_core::connection::Connection;
use sqlbridge_core::{ConnectionParams, Provider, Result};

/// Build a connection for a provider-prefixed name, resolving parameters
/// from the environment.
#[allow(clippy::result_large_err)]
pub fn create_connection(name: &str) -> Result<Box<dyn Connection>> {
    let provider = Provider::from_name(name)?;
    let params = ConnectionParams::from_env(provider);
    Ok(build(provider, name, params))
}

/// Build a connection with explicit parameters, skipping environment
/// resolution entirely.
#[allow(clippy::result_large_err)]
pub fn create_connection_with(name: &str, params: ConnectionParams) -> Result<Box<dyn Connection>> {
    let provider = Provider::from_name(name)?;
    Ok(build(provider, name, params))
}

/// Bind a query object to a connection.
pub fn create_query(connection: Box<dyn Connection>) -> Query {
    Query::new(connection)
}

fn build(provider: Provider, name: &str, params: ConnectionParams) -> Box<dyn Connection> {
    tracing::debug!(provider = %provider, name, "Creating connection");
    match provider {
        Provider::Postgres => Box::new(PostgresBridge::new(name, params)),
        Provider::MySql => Box::new(MySqlBridge::new(name, params)),
    }
}
