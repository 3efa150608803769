//! Core types and contracts for sqlbridge.
//!
//! This crate provides the pieces shared by every provider:
//!
//! - `Error`/`Result` taxonomy including fallback eligibility
//! - `Value`, `Row`, and `ResultSet` for uniform query results
//! - `Connection` trait and `ConnectionState` lifecycle
//! - `ConnectionParams` with per-provider environment resolution
//! - `PacketChannel` generic length-prefixed frame transport

pub mod channel;
pub mod connection;
pub mod error;
pub mod params;
pub mod row;
pub mod value;

pub use channel::{Frame, FrameFormat, FrameHeader, PacketChannel};
pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use params::{ConnectionParams, Provider};
pub use row::{ColumnInfo, FromValue, ResultSet, Row};
pub use value::Value;
