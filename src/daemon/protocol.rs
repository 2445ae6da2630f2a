//! IPC protocol types using rkyv for zero-copy serialization
//!
//! One request per connection. The daemon answers `Ping` with a single
//! `Pong`; an `Invoke` is answered with zero or more `Message` frames streamed
//! while the command runs, followed by exactly one terminal frame.

use rkyv::{Archive, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest frame either side will accept.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// IPC request from client to daemon
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub enum Request {
    /// Check if daemon is alive
    Ping,
    /// Run one command, e.g. `/restart 30`
    Invoke {
        text: String,
        caller: String,
        roles: Vec<String>,
        /// Present only for relayed commands
        relay_token: Option<String>,
    },
}

/// IPC response from daemon to client
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub enum Response {
    /// Response to Ping
    Pong { uptime_secs: u64, version: String },
    /// Progress or result text
    Message { text: String },
    /// Access policy refused the caller
    Denied { caller: String },
    /// No such command
    Unknown { name: String },
    /// Command finished (successfully or with reported failures)
    Done,
    /// Unexpected failure inside the daemon
    Error { message: String },
}

impl Response {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Response::Message { .. })
    }
}

/// Message frame for wire protocol
///
/// Format: [4-byte length (little-endian)][rkyv bytes]
pub struct MessageFrame;

impl MessageFrame {
    /// Encode a request to bytes with length prefix
    pub fn encode_request(request: &Request) -> Result<Vec<u8>, rkyv::rancor::Error> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(request)?;
        Ok(Self::with_prefix(&bytes))
    }

    /// Encode a response to bytes with length prefix
    pub fn encode_response(response: &Response) -> Result<Vec<u8>, rkyv::rancor::Error> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(response)?;
        Ok(Self::with_prefix(&bytes))
    }

    fn with_prefix(bytes: &[u8]) -> Vec<u8> {
        let len = bytes.len() as u32;
        let mut result = Vec::with_capacity(4 + bytes.len());
        result.extend_from_slice(&len.to_le_bytes());
        result.extend_from_slice(bytes);
        result
    }

    /// Read length prefix from buffer
    pub fn read_length(buf: &[u8; 4]) -> usize {
        u32::from_le_bytes(*buf) as usize
    }

    /// Read one length-prefixed frame body.
    pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = Self::read_length(&len_buf);
        if len > MAX_FRAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit", len),
            ));
        }
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// Owned request from a received frame body.
pub fn decode_request(bytes: &[u8]) -> Result<Request, rkyv::rancor::Error> {
    rkyv::from_bytes::<Request, rkyv::rancor::Error>(bytes)
}

/// Owned response from a received frame body.
pub fn decode_response(bytes: &[u8]) -> Result<Response, rkyv::rancor::Error> {
    rkyv::from_bytes::<Response, rkyv::rancor::Error>(bytes)
}
