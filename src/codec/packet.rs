//! SMP-over-console line framing.
//!
//! On a serial console an SMP message travels as base64 text lines:
//!
//! ```text
//! packet = len (u16 BE, body + 2) | body | crc16 (u16 BE)
//! line   = marker (2 bytes) | base64 slice | '\n'
//! ```
//!
//! The first line of a packet starts with [`START_MARKER`], every following
//! line with [`CONTINUE_MARKER`]. Each base64 slice is a multiple of four
//! characters so it decodes on its own.

use base64::{engine::general_purpose, Engine as _};
use crc::{Crc, CRC_16_XMODEM};

use crate::error::{Result, SmpError};

/// Marker opening the first line of a packet.
pub const START_MARKER: [u8; 2] = [0x06, 0x09];
/// Marker opening every following line of a packet.
pub const CONTINUE_MARKER: [u8; 2] = [0x04, 0x14];
/// Line terminator.
pub const END_MARKER: u8 = b'\n';
/// Marker size in bytes.
pub const MARKER_SIZE: usize = 2;

/// Size of the length prefix.
pub const FRAME_LENGTH_SIZE: usize = 2;
/// Size of the CRC trailer.
pub const CRC16_SIZE: usize = 2;

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM (CCITT polynomial 0x1021, initial value 0).
pub fn crc16(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}

/// Worst-case base64 size of `size` raw bytes, padding included.
pub fn base64_cost(size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    (4 * size).div_ceil(3) + 2
}

/// Number of raw bytes that fit in `size` base64 characters.
pub fn base64_max(size: usize) -> usize {
    if size < 4 {
        return 0;
    }
    (3 * size / 4).saturating_sub(2)
}

/// Encode `data` into console lines no longer than `line_length` bytes.
///
/// # Errors
///
/// `PayloadTooLarge` if `data` does not fit the 16-bit length prefix, and
/// `Transport` if `line_length` cannot hold a single base64 quantum.
pub fn encode_packet(data: &[u8], line_length: usize) -> Result<Vec<Vec<u8>>> {
    let max = u16::MAX as usize - CRC16_SIZE;
    if data.len() > max {
        return Err(SmpError::PayloadTooLarge {
            size: data.len(),
            max,
        });
    }

    let chunk = (line_length.saturating_sub(MARKER_SIZE + 1) / 4) * 4;
    if chunk == 0 {
        return Err(SmpError::Transport(format!(
            "line length {line_length} is too short for a packet line"
        )));
    }

    let mut packet = Vec::with_capacity(FRAME_LENGTH_SIZE + data.len() + CRC16_SIZE);
    packet.extend_from_slice(&((data.len() + CRC16_SIZE) as u16).to_be_bytes());
    packet.extend_from_slice(data);
    packet.extend_from_slice(&crc16(data).to_be_bytes());

    let encoded = general_purpose::STANDARD.encode(&packet);
    let lines = encoded
        .as_bytes()
        .chunks(chunk)
        .enumerate()
        .map(|(i, slice)| {
            let marker = if i == 0 { START_MARKER } else { CONTINUE_MARKER };
            let mut line = Vec::with_capacity(MARKER_SIZE + slice.len() + 1);
            line.extend_from_slice(&marker);
            line.extend_from_slice(slice);
            line.push(END_MARKER);
            line
        })
        .collect();

    Ok(lines)
}

/// Reassembles console lines into an SMP message.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buffer: Vec<u8>,
    expected: Option<usize>,
    started: bool,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, marker and terminator included.
    ///
    /// Returns the message once the last line of the packet has arrived.
    pub fn push_line(&mut self, line: &[u8]) -> Result<Option<Vec<u8>>> {
        if line.len() < MARKER_SIZE + 1 || line[line.len() - 1] != END_MARKER {
            return Err(self.fail("packet line is not terminated"));
        }

        let marker = &line[..MARKER_SIZE];
        if marker == START_MARKER {
            if self.started {
                tracing::warn!("packet restarted before the previous one completed");
            }
            self.reset();
            self.started = true;
        } else if marker != CONTINUE_MARKER {
            return Err(self.fail("packet line has no marker"));
        } else if !self.started {
            return Err(self.fail("continuation line without a start line"));
        }

        let mut text = &line[MARKER_SIZE..line.len() - 1];
        if let Some(stripped) = text.strip_suffix(b"\r") {
            text = stripped;
        }
        let decoded = general_purpose::STANDARD
            .decode(text)
            .map_err(|e| self.fail(&format!("invalid base64: {e}")))?;
        self.buffer.extend_from_slice(&decoded);

        if self.expected.is_none() && self.buffer.len() >= FRAME_LENGTH_SIZE {
            let length = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
            if length < CRC16_SIZE {
                return Err(self.fail("packet length shorter than its CRC"));
            }
            self.expected = Some(length);
        }

        let Some(expected) = self.expected else {
            return Ok(None);
        };
        let total = FRAME_LENGTH_SIZE + expected;
        if self.buffer.len() < total {
            return Ok(None);
        }
        if self.buffer.len() > total {
            return Err(self.fail("packet longer than its length prefix"));
        }

        let body = &self.buffer[FRAME_LENGTH_SIZE..total - CRC16_SIZE];
        let received = u16::from_be_bytes([self.buffer[total - 2], self.buffer[total - 1]]);
        let computed = crc16(body);
        if received != computed {
            return Err(self.fail(&format!(
                "CRC mismatch: received 0x{received:04x}, computed 0x{computed:04x}"
            )));
        }

        let body = body.to_vec();
        self.reset();
        Ok(Some(body))
    }

    /// True while a packet is partially assembled.
    pub fn in_progress(&self) -> bool {
        self.started
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.started = false;
    }

    fn fail(&mut self, reason: &str) -> SmpError {
        self.reset();
        SmpError::Transport(reason.to_string())
    }
}
