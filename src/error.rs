//! Error types for smp-client.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Main error type for all SMP operations.
#[derive(Debug, Error)]
pub enum SmpError {
    /// I/O error on the underlying link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CBOR serialization error.
    #[error("CBOR encode error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    /// CBOR deserialization error.
    #[error("CBOR decode error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    /// No reply arrived before the deadline. The caller may retry.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Reply sequence number does not match the request.
    #[error("Bad sequence {received}, expected {expected}")]
    BadSequence { expected: u8, received: u8 },

    /// Reply bytes match none of the expected shapes.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The device answered with a well-formed error reply.
    #[error("Device error: {0}")]
    Device(ProtocolError),

    /// The link dropped. The session must be reconnected.
    #[error("Transport disconnected")]
    Disconnected,

    /// The device or port could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The transport budget cannot hold even an empty chunk.
    #[error("MTU too small: budget {budget} B, message needs at least {required} B")]
    MtuTooSmall { budget: usize, required: usize },

    /// A message is larger than the transport accepts.
    #[error("Payload of {size} B exceeds maximum {max} B")]
    PayloadTooLarge { size: usize, max: usize },

    /// Transport-level framing violation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An upload session failed.
    #[error("Upload failed: {0}")]
    Upload(TransferError),

    /// A download session failed.
    #[error("Download failed: {0}")]
    Download(TransferError),
}

impl SmpError {
    /// True when the root cause is a reply timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            SmpError::Timeout(_) => true,
            SmpError::Upload(TransferError::Request(inner))
            | SmpError::Download(TransferError::Request(inner)) => inner.is_timeout(),
            _ => false,
        }
    }

    /// True when the root cause is a dropped link.
    pub fn is_disconnected(&self) -> bool {
        match self {
            SmpError::Disconnected => true,
            SmpError::Upload(TransferError::Request(inner))
            | SmpError::Download(TransferError::Request(inner)) => inner.is_disconnected(),
            _ => false,
        }
    }
}

/// Reasons a chunked transfer is aborted.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The device rejected an exchange.
    #[error("device error: {0}")]
    Device(ProtocolError),

    /// A success reply carried no offset.
    #[error("no offset received")]
    MissingOffset,

    /// The first download reply carried no total length.
    #[error("no length received")]
    MissingLength,

    /// The device reported that the uploaded data does not match its hash.
    #[error("server reported mismatched SHA256")]
    HashMismatch,

    /// The device reported an offset past the end of the data.
    #[error("offset {offset} is past the total length {total}")]
    OffsetOutOfRange { offset: usize, total: usize },

    /// The device moved the offset backwards.
    #[error("offset went backwards from {previous} to {reported}")]
    OffsetRegressed { previous: usize, reported: usize },

    /// The device answered for another offset than the one requested.
    #[error("requested offset {requested}, device answered for {reported}")]
    UnexpectedOffset { requested: usize, reported: usize },

    /// The device returned an empty chunk before the end of the file.
    #[error("empty chunk at offset {offset}")]
    EmptyChunk { offset: usize },

    /// The exchange itself failed.
    #[error("{0}")]
    Request(Box<SmpError>),
}

impl From<SmpError> for TransferError {
    fn from(err: SmpError) -> Self {
        TransferError::Request(Box::new(err))
    }
}

/// Result type alias using SmpError.
pub type Result<T> = std::result::Result<T, SmpError>;
