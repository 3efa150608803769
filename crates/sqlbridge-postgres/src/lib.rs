//! Native PostgreSQL wire client for sqlbridge.
//!
//! Speaks frontend/backend protocol 3.0 directly over TCP: startup,
//! trust/cleartext/MD5 authentication, and simple-query execution with
//! text results. Anything beyond that (SCRAM, TLS, the extended protocol)
//! is left to the fallback driver.

pub mod connection;
pub mod protocol;

pub use connection::PgConnection;
pub use protocol::{PROTOCOL_VERSION, PgFrame};
