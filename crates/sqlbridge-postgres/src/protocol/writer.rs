//! PostgreSQL message encoder.
//!
//! Encodes frontend message payloads; the packet channel prepends the tag
//! and length header. All multi-byte integers are big-endian.

use super::frontend_type;
use super::messages::FrontendMessage;

/// Reusable buffer for encoding frontend message payloads.
#[derive(Debug, Clone, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    /// Create a new message writer.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    /// Encode a message, returning its frame tag and payload.
    ///
    /// The startup message is the one tagless frame in the protocol, so the
    /// tag is `None` for it.
    pub fn write(&mut self, msg: &FrontendMessage) -> (Option<u8>, &[u8]) {
        self.buf.clear();

        let tag = match msg {
            FrontendMessage::Startup { version, params } => {
                self.buf.extend_from_slice(&version.to_be_bytes());
                for (key, value) in params {
                    self.buf.extend_from_slice(key.as_bytes());
                    self.buf.push(0);
                    self.buf.extend_from_slice(value.as_bytes());
                    self.buf.push(0);
                }
                self.buf.push(0);
                None
            }
            FrontendMessage::Password(password) => {
                self.buf.extend_from_slice(password.as_bytes());
                self.buf.push(0);
                Some(frontend_type::PASSWORD)
            }
            FrontendMessage::Query(query) => {
                self.buf.extend_from_slice(query.as_bytes());
                self.buf.push(0);
                Some(frontend_type::QUERY)
            }
            FrontendMessage::Terminate => Some(frontend_type::TERMINATE),
        };

        (tag, &self.buf)
    }
}
