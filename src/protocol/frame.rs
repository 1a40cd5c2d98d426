//! Complete SMP message with typed accessors.
//!
//! A frame keeps the raw message bytes (header included) so the client can
//! hand them to the reply decoder unchanged. Uses `bytes::Bytes` so the body
//! is shared rather than copied.
//!
//! # Example
//!
//! ```
//! use smp_client::protocol::{build_frame, Frame, Header, Op, Version};
//!
//! let header = Header::new(Op::ReadRsp, Version::V2, 1, 0, 42, 0);
//! let frame = Frame::from_message(build_frame(&header, &[0xA0]).into()).unwrap();
//!
//! assert_eq!(frame.sequence(), 42);
//! assert_eq!(frame.body(), &[0xA0]);
//! ```

use bytes::Bytes;

use super::header::{Header, HEADER_SIZE};

/// A complete SMP message.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Raw message bytes, header first.
    pub bytes: Bytes,
}

impl Frame {
    /// Wrap raw message bytes, decoding the header.
    ///
    /// Returns `None` if the header is invalid or the body is shorter than
    /// the header announces.
    pub fn from_message(bytes: Bytes) -> Option<Self> {
        let header = Header::decode(&bytes)?;
        if bytes.len() < header.message_len() {
            return None;
        }
        Some(Self { header, bytes })
    }

    /// CBOR body after the header.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.header.message_len()]
    }

    /// Total message length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    #[inline]
    pub fn group(&self) -> u16 {
        self.header.group
    }

    #[inline]
    pub fn command(&self) -> u8 {
        self.header.command
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.op.is_response()
    }

    /// Raw message bytes (cheap clone).
    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Build a complete message as a single byte vector.
///
/// # Example
///
/// ```
/// use smp_client::protocol::{build_frame, Header, Op, Version, HEADER_SIZE};
///
/// let header = Header::new(Op::Write, Version::V2, 3, 8, 1, 0);
/// let bytes = build_frame(&header, &[1, 2, 3]);
/// assert_eq!(bytes.len(), HEADER_SIZE + 3);
/// ```
pub fn build_frame(header: &Header, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}
