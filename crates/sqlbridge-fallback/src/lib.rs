//! External-driver fallback path.
//!
//! When a native wire client cannot establish a session (unsupported
//! authentication mechanism, handshake-level failure), connections are
//! routed through the platform's standard drivers instead: the `postgres`
//! crate for PostgreSQL and the `mysql` crate for MySQL. Statements are
//! normalized to a single line, classified as read or write by their
//! leading keyword, and answered in the same row shape the native clients
//! produce; writes synthesize a one-row success result carrying the
//! affected count.

pub mod mysql;
pub mod postgres;
pub mod response;
pub mod retry;
pub mod sql;

// The driver modules share names with the driver crates; `self::` keeps
// these re-exports pointing at the modules.
pub use self::mysql::MySqlDriver;
pub use self::postgres::PostgresDriver;
pub use response::success_row;
pub use retry::{RetryPolicy, connect_with_retry};
pub use sql::{StatementKind, classify, normalize_sql};
