//! Native MySQL wire client.
//!
//! Speaks the client/server text protocol directly over TCP: HandshakeV10,
//! `mysql_native_password` authentication and COM_QUERY with fully
//! materialized text result sets. Servers requiring any other
//! authentication plugin (notably `caching_sha2_password`) are reported as
//! unsupported so callers can route the connection to the fallback driver.

pub mod auth;
pub mod connection;
pub mod protocol;

pub use connection::MySqlConnection;
pub use protocol::MySqlFrame;
