//! PostgreSQL wire protocol (frontend/backend protocol 3.0).
//!
//! Only the pieces the simple-query flow needs: startup, password-based
//! authentication, and `Query` execution with text results.

pub mod messages;
pub mod reader;
pub mod writer;

pub use messages::{AuthRequest, BackendMessage, ErrorFields, FrontendMessage};
pub use reader::MessageReader;
pub use writer::MessageWriter;

use sqlbridge_core::Result;
use sqlbridge_core::channel::{FrameFormat, FrameHeader};
use sqlbridge_core::error::{protocol_error, protocol_error_with};

/// Protocol version 3.0 (196608).
pub const PROTOCOL_VERSION: i32 = 0x0003_0000;

/// Backend message type bytes.
pub mod backend_type {
    pub const AUTHENTICATION: u8 = b'R';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const NOTICE_RESPONSE: u8 = b'N';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const BACKEND_KEY_DATA: u8 = b'K';
    pub const READY_FOR_QUERY: u8 = b'Z';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const DATA_ROW: u8 = b'D';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
}

/// Frontend message type bytes.
pub mod frontend_type {
    pub const PASSWORD: u8 = b'p';
    pub const QUERY: u8 = b'Q';
    pub const TERMINATE: u8 = b'X';
}

/// PostgreSQL frame layout.
///
/// Received frames are `tag(1) + length(4, big-endian, self-inclusive) +
/// payload`. Outbound frames are the same, except the startup message which
/// has no tag byte; `meta = None` selects that form.
#[derive(Debug, Clone, Copy)]
pub struct PgFrame;

impl FrameFormat for PgFrame {
    type Meta = Option<u8>;
    const HEADER_LEN: usize = 5;

    fn decode_header(header: &[u8]) -> Result<FrameHeader<Option<u8>>> {
        if header.len() != Self::HEADER_LEN {
            return Err(protocol_error("short frame header"));
        }
        let tag = header[0];
        let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        // The length field includes its own four bytes.
        if len < 4 {
            return Err(protocol_error_with(
                format!("frame length {} below minimum", len),
                header.to_vec(),
            ));
        }
        Ok(FrameHeader {
            meta: Some(tag),
            payload_len: (len - 4) as usize,
        })
    }

    fn encode_header(meta: Option<u8>, payload_len: usize, out: &mut Vec<u8>) -> Result<()> {
        let len = i32::try_from(payload_len + 4).map_err(|_| {
            protocol_error(format!("frame payload too large: {} bytes", payload_len))
        })?;
        if let Some(tag) = meta {
            out.push(tag);
        }
        out.extend_from_slice(&len.to_be_bytes());
        Ok(())
    }
}
