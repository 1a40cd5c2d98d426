//! Frame buffer for reassembling SMP messages from link fragments.
//!
//! BLE notifications and UDP datagrams can split or join SMP messages. The
//! buffer accumulates bytes and uses the header `length` field to cut them
//! back into whole messages:
//! - `WaitingForHeader`: Need at least 8 bytes
//! - `WaitingForBody`: Header parsed, need N more body bytes
//!
//! # Example
//!
//! ```
//! use smp_client::protocol::{build_frame, FrameBuffer, Header, Op, Version};
//!
//! let bytes = build_frame(&Header::new(Op::ReadRsp, Version::V2, 1, 0, 3, 0), &[0xA0]);
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[4..]).unwrap();
//! assert_eq!(frames[0].sequence(), 3);
//! ```

use bytes::BytesMut;

use super::header::{Header, HEADER_SIZE};
use super::Frame;
use crate::error::{Result, SmpError};

/// State machine for message parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header (need 8 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for the whole message.
    WaitingForBody { total: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
}

impl FrameBuffer {
    /// Create a new, empty frame buffer.
    pub fn new() -> Self {
        Self::with_capacity(4 * 1024)
    }

    /// Create a frame buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `SmpError::Transport` if the buffered bytes do not start with a
    /// valid SMP header. The buffer is cleared in that case.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < HEADER_SIZE {
                    return Ok(None);
                }

                let Some(header) = Header::decode(&self.buffer[..HEADER_SIZE]) else {
                    let first = self.buffer[0];
                    self.clear();
                    return Err(SmpError::Transport(format!(
                        "invalid SMP header byte 0x{first:02x}"
                    )));
                };

                self.state = State::WaitingForBody {
                    total: header.message_len(),
                };
                self.try_extract_one()
            }

            State::WaitingForBody { total } => {
                if self.buffer.len() < total {
                    return Ok(None);
                }

                let message = self.buffer.split_to(total).freeze();
                self.state = State::WaitingForHeader;

                // Header was validated on entry to this state.
                Ok(Frame::from_message(message))
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
