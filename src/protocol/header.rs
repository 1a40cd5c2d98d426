//! SMP header encoding and decoding.
//!
//! Every SMP message starts with an 8-byte header:
//! ```text
//! ┌─────────────────┬───────┬──────────┬──────────┬──────────┬────────────┐
//! │ Res │ Ver │ Op  │ Flags │ Length   │ Group ID │ Sequence │ Command ID │
//! │ 3b  │ 2b  │ 3b  │ 1 byte│ uint16 BE│ uint16 BE│ 1 byte   │ 1 byte     │
//! └─────────────────┴───────┴──────────┴──────────┴──────────┴────────────┘
//! ```
//!
//! `Length` counts the CBOR body that follows the header.

use std::sync::atomic::{AtomicU8, Ordering};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

static SEQUENCE: AtomicU8 = AtomicU8::new(0);

/// Allocate the next request sequence number (wraps at 255).
pub fn next_sequence() -> u8 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Read = 0,
    ReadRsp = 1,
    Write = 2,
    WriteRsp = 3,
}

impl Op {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Op::Read),
            1 => Some(Op::ReadRsp),
            2 => Some(Op::Write),
            3 => Some(Op::WriteRsp),
            _ => None,
        }
    }

    /// Check if this is a response operation.
    #[inline]
    pub fn is_response(self) -> bool {
        matches!(self, Op::ReadRsp | Op::WriteRsp)
    }
}

/// Protocol version carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Version {
    /// Original SMP; errors are `{rc, rsn}`.
    V1 = 0,
    /// SMP version 2; errors are `{err: {group, rc}}`.
    #[default]
    V2 = 1,
}

impl Version {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Version::V1),
            1 => Some(Version::V2),
            _ => None,
        }
    }
}

/// Management group identifiers.
pub mod group {
    pub const OS: u16 = 0;
    pub const IMAGE: u16 = 1;
    pub const STATISTICS: u16 = 2;
    pub const SETTINGS: u16 = 3;
    pub const LOGS: u16 = 4;
    pub const CRASH: u16 = 5;
    pub const SPLIT: u16 = 6;
    pub const RUN: u16 = 7;
    pub const FS: u16 = 8;
    pub const SHELL: u16 = 9;
    pub const ENUMERATION: u16 = 10;
    pub const ZEPHYR: u16 = 63;
    /// First group number available for application-defined groups.
    pub const USER_DEFINED: u16 = 64;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op: Op,
    pub version: Version,
    pub flags: u8,
    /// Body length in bytes.
    pub length: u16,
    pub group: u16,
    pub sequence: u8,
    pub command: u8,
}

impl Header {
    /// Create a new header.
    pub fn new(
        op: Op,
        version: Version,
        length: u16,
        group: u16,
        sequence: u8,
        command: u8,
    ) -> Self {
        Self {
            op,
            version,
            flags: 0,
            length,
            group,
            sequence,
            command,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use smp_client::protocol::{Header, Op, Version};
    ///
    /// let header = Header::new(Op::Write, Version::V2, 5, 0, 42, 0);
    /// assert_eq!(header.encode(), [0x0A, 0, 0, 5, 0, 0, 42, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = ((self.version as u8) << 3) | self.op as u8;
        buf[1] = self.flags;
        buf[2..4].copy_from_slice(&self.length.to_be_bytes());
        buf[4..6].copy_from_slice(&self.group.to_be_bytes());
        buf[6] = self.sequence;
        buf[7] = self.command;
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short or the op/version bits are
    /// not recognised.
    ///
    /// # Example
    ///
    /// ```
    /// use smp_client::protocol::{Header, Op};
    ///
    /// let header = Header::decode(&[0x0B, 0, 0, 2, 0, 1, 7, 1]).unwrap();
    /// assert_eq!(header.op, Op::WriteRsp);
    /// assert_eq!(header.group, 1);
    /// assert_eq!(header.sequence, 7);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            op: Op::from_bits(buf[0] & 0b111)?,
            version: Version::from_bits((buf[0] >> 3) & 0b11)?,
            flags: buf[1],
            length: u16::from_be_bytes([buf[2], buf[3]]),
            group: u16::from_be_bytes([buf[4], buf[5]]),
            sequence: buf[6],
            command: buf[7],
        })
    }

    /// Total message size (header + body).
    #[inline]
    pub fn message_len(&self) -> usize {
        HEADER_SIZE + self.length as usize
    }
}
