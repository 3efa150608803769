//! MySQL wire protocol implementation.
//!
//! MySQL packets have a 4-byte header: 3 bytes payload length
//! (little-endian, header-exclusive) and 1 byte sequence number. Payloads
//! of 2^24 - 1 bytes spill into continuation packets.

#![allow(clippy::cast_possible_truncation)]

pub mod reader;
pub mod writer;

pub use reader::PacketReader;
pub use writer::PacketWriter;

use sqlbridge_core::Result;
use sqlbridge_core::channel::{FrameFormat, FrameHeader};
use sqlbridge_core::error::protocol_error;

/// Maximum payload size for a single MySQL packet (2^24 - 1 bytes).
pub const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

/// Max packet size advertised in the handshake response (16MB).
pub const MAX_ALLOWED_PACKET: u32 = 0x0100_0000;

/// MySQL capability flags (client and server).
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 1;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
    pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
    pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
    pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;

    /// Capabilities this client always announces.
    pub const CLIENT_FLAGS: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_CONNECT_WITH_DB
        | CLIENT_PROTOCOL_41
        | CLIENT_SECURE_CONNECTION
        | CLIENT_PLUGIN_AUTH;
}

/// MySQL command codes (COM_xxx) used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Quit connection
    Quit = 0x01,
    /// Text protocol query
    Query = 0x03,
    /// Ping server
    Ping = 0x0E,
}

/// MySQL character set codes.
pub mod charset {
    pub const UTF8_GENERAL_CI: u8 = 33;

    /// Charset announced in the handshake response.
    pub const DEFAULT_CHARSET: u8 = UTF8_GENERAL_CI;
}

/// MySQL frame layout: 3-byte little-endian payload length (excluding the
/// header) plus a 1-byte sequence id.
#[derive(Debug, Clone, Copy)]
pub struct MySqlFrame;

impl FrameFormat for MySqlFrame {
    /// Sequence id of the frame.
    type Meta = u8;
    const HEADER_LEN: usize = 4;

    fn decode_header(header: &[u8]) -> Result<FrameHeader<u8>> {
        if header.len() != Self::HEADER_LEN {
            return Err(protocol_error("short packet header"));
        }
        let payload_len = u32::from(header[0])
            | (u32::from(header[1]) << 8)
            | (u32::from(header[2]) << 16);
        Ok(FrameHeader {
            meta: header[3],
            payload_len: payload_len as usize,
        })
    }

    fn encode_header(sequence_id: u8, payload_len: usize, out: &mut Vec<u8>) -> Result<()> {
        if payload_len > MAX_PACKET_SIZE {
            return Err(protocol_error(format!(
                "packet payload of {} bytes must be split before framing",
                payload_len
            )));
        }
        out.push((payload_len & 0xFF) as u8);
        out.push(((payload_len >> 8) & 0xFF) as u8);
        out.push(((payload_len >> 16) & 0xFF) as u8);
        out.push(sequence_id);
        Ok(())
    }
}

/// Server response packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// OK packet (0x00)
    Ok,
    /// Error packet (0xFF)
    Error,
    /// EOF packet (0xFE with payload < 9 bytes)
    Eof,
    /// Anything else (result set header, column definition, row)
    Data,
}

impl PacketType {
    /// Detect packet type from the first payload byte.
    pub fn from_first_byte(byte: u8, payload_len: usize) -> Self {
        match byte {
            0x00 => PacketType::Ok,
            0xFF => PacketType::Error,
            0xFE if payload_len < 9 => PacketType::Eof,
            _ => PacketType::Data,
        }
    }
}

/// Parsed OK packet.
#[derive(Debug, Clone)]
pub struct OkPacket {
    /// Number of affected rows
    pub affected_rows: u64,
    /// Last insert ID
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Number of warnings
    pub warnings: u16,
    /// Info string (if any)
    pub info: String,
}

/// Parsed Error packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    /// Error code
    pub error_code: u16,
    /// SQLSTATE (5 characters, empty when the server omitted the marker)
    pub sql_state: String,
    /// Error message
    pub error_message: String,
}

/// Parsed EOF packet.
#[derive(Debug, Clone, Copy)]
pub struct EofPacket {
    /// Number of warnings
    pub warnings: u16,
    /// Server status flags
    pub status_flags: u16,
}
