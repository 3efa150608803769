//! Length-prefixed frame transport over a TCP stream.
//!
//! Both wire protocols exchange frames of `header + payload` where the
//! header carries the payload length plus a little provider-specific
//! metadata (a message tag, a sequence id). `PacketChannel` implements the
//! shared read/write loop once; a `FrameFormat` describes the header layout.

use crate::Result;
use crate::error::{ConnectionErrorKind, connect_io_error, connection_error_with};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::net::{Shutdown, TcpStream};

/// Decoded frame header: metadata plus the payload length that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader<M> {
    /// Provider-specific metadata (message tag, sequence id)
    pub meta: M,
    /// Payload bytes following the header
    pub payload_len: usize,
}

/// A complete frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<M> {
    /// Provider-specific metadata from the header
    pub meta: M,
    /// Payload bytes
    pub payload: Vec<u8>,
}

/// Header layout of one provider's wire frames.
///
/// `HEADER_LEN` is the length of a received frame's header; `encode_header`
/// may write a shorter header for special outbound frames (the Postgres
/// startup message carries no tag byte).
pub trait FrameFormat {
    /// Per-frame metadata carried in the header.
    type Meta: Copy + std::fmt::Debug;

    /// Received-frame header length in bytes.
    const HEADER_LEN: usize;

    /// Decode a received header.
    #[allow(clippy::result_large_err)]
    fn decode_header(header: &[u8]) -> Result<FrameHeader<Self::Meta>>;

    /// Append the header for an outbound payload of `payload_len` bytes.
    #[allow(clippy::result_large_err)]
    fn encode_header(meta: Self::Meta, payload_len: usize, out: &mut Vec<u8>) -> Result<()>;
}

/// Blocking frame transport over one TCP stream.
///
/// One channel serves one connection; reads and writes are strictly
/// sequential and block without a timeout until the server responds.
#[derive(Debug)]
pub struct PacketChannel<F: FrameFormat> {
    stream: TcpStream,
    _format: PhantomData<F>,
}

impl<F: FrameFormat> PacketChannel<F> {
    /// Open a TCP connection to `host:port`.
    #[allow(clippy::result_large_err)]
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).map_err(|e| connect_io_error(host, port, e))?;
        stream.set_nodelay(true).ok();
        Ok(Self {
            stream,
            _format: PhantomData,
        })
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        stream.set_nodelay(true).ok();
        Self {
            stream,
            _format: PhantomData,
        }
    }

    /// Read one complete frame, blocking until it arrives.
    #[allow(clippy::result_large_err)]
    pub fn read_frame(&mut self) -> Result<Frame<F::Meta>> {
        let mut header = vec![0u8; F::HEADER_LEN];
        self.stream.read_exact(&mut header).map_err(|e| {
            connection_error_with(
                ConnectionErrorKind::Disconnected,
                format!("failed to read frame header: {}", e),
                e,
            )
        })?;

        let FrameHeader { meta, payload_len } = F::decode_header(&header)?;

        let mut payload = vec![0u8; payload_len];
        if payload_len > 0 {
            self.stream.read_exact(&mut payload).map_err(|e| {
                connection_error_with(
                    ConnectionErrorKind::Disconnected,
                    format!("failed to read frame payload: {}", e),
                    e,
                )
            })?;
        }

        Ok(Frame { meta, payload })
    }

    /// Write one frame as a single header+payload buffer and flush it.
    #[allow(clippy::result_large_err)]
    pub fn write_frame(&mut self, meta: F::Meta, payload: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(F::HEADER_LEN + payload.len() + 1);
        F::encode_header(meta, payload.len(), &mut buf)?;
        buf.extend_from_slice(payload);

        self.stream.write_all(&buf).map_err(|e| {
            connection_error_with(
                ConnectionErrorKind::Disconnected,
                format!("failed to write frame: {}", e),
                e,
            )
        })?;
        self.stream.flush().map_err(|e| {
            connection_error_with(
                ConnectionErrorKind::Disconnected,
                format!("failed to flush stream: {}", e),
                e,
            )
        })?;

        Ok(())
    }

    /// Shut down both directions of the stream, ignoring errors.
    pub fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
