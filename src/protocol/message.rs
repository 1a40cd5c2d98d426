//! Requests, replies and the two generations of SMP error shapes.
//!
//! A [`Command`] binds one request body to exactly one success shape. Error
//! replies come in two generations that coexist on real devices:
//!
//! - V1: `{"rc": <int>, "rsn": <text>?}`
//! - V2: `{"err": {"group": <int>, "rc": <int>}}`
//!
//! [`decode_reply`] resolves a reply body by trying the candidates in a
//! fixed order: success, V1, V2. The first one that type-checks wins.

use std::fmt;

use bytes::Bytes;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use super::header::{next_sequence, Header, Op, Version};
use crate::codec::CborCodec;
use crate::error::{Result, SmpError};
use crate::requests::GroupRc;

/// A typed SMP command.
///
/// The implementing struct is the CBOR request body.
pub trait Command: Serialize {
    /// Success body returned by the device.
    type Response: DeserializeOwned;

    /// Request operation, `Op::Read` or `Op::Write`.
    const OP: Op;
    const GROUP: u16;
    const COMMAND: u8;
}

/// An encoded request. Header and bytes never change after construction.
#[derive(Debug, Clone)]
pub struct Request<C> {
    header: Header,
    command: C,
    bytes: Bytes,
}

impl<C: Command> Request<C> {
    /// Encode `command` as an SMP V2 request with the next sequence number.
    pub fn new(command: C) -> Result<Self> {
        Self::build(command, Version::V2, next_sequence())
    }

    /// Encode `command` with an explicit protocol version.
    pub fn with_version(command: C, version: Version) -> Result<Self> {
        Self::build(command, version, next_sequence())
    }

    /// Encode `command` with an explicit version and sequence number.
    pub fn build(command: C, version: Version, sequence: u8) -> Result<Self> {
        let body = CborCodec::encode(&command)?;
        let length = u16::try_from(body.len()).map_err(|_| SmpError::PayloadTooLarge {
            size: body.len(),
            max: u16::MAX as usize,
        })?;

        let header = Header::new(C::OP, version, length, C::GROUP, sequence, C::COMMAND);
        let bytes = Bytes::from(super::build_frame(&header, &body));

        Ok(Self {
            header,
            command,
            bytes,
        })
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn command(&self) -> &C {
        &self.command
    }

    #[inline]
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Encoded message, header included.
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Encoded size in bytes, header included.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_command(self) -> C {
        self.command
    }
}

/// Generic management return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MgmtErr {
    Ok = 0,
    Unknown = 1,
    NoMem = 2,
    Inval = 3,
    Timeout = 4,
    NoEnt = 5,
    BadState = 6,
    MsgSize = 7,
    NotSup = 8,
    Corrupt = 9,
    Busy = 10,
    AccessDenied = 11,
    UnsupportedTooOld = 12,
    UnsupportedTooNew = 13,
}

impl MgmtErr {
    pub fn from_rc(rc: i32) -> Option<Self> {
        Some(match rc {
            0 => MgmtErr::Ok,
            1 => MgmtErr::Unknown,
            2 => MgmtErr::NoMem,
            3 => MgmtErr::Inval,
            4 => MgmtErr::Timeout,
            5 => MgmtErr::NoEnt,
            6 => MgmtErr::BadState,
            7 => MgmtErr::MsgSize,
            8 => MgmtErr::NotSup,
            9 => MgmtErr::Corrupt,
            10 => MgmtErr::Busy,
            11 => MgmtErr::AccessDenied,
            12 => MgmtErr::UnsupportedTooOld,
            13 => MgmtErr::UnsupportedTooNew,
            _ => return None,
        })
    }
}

/// SMP V1 error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorV1 {
    pub rc: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsn: Option<String>,
}

/// Group-scoped error carried by a V2 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupError {
    pub group: u16,
    pub rc: i32,
}

/// SMP V2 error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorV2 {
    pub err: GroupError,
}

/// A well-formed error reply of either generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    V1(ErrorV1),
    V2(ErrorV2),
}

/// Generation-independent view of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Group that raised the error; V1 errors carry none.
    pub group: Option<u16>,
    pub rc: i32,
}

impl ProtocolError {
    /// Return code as reported by the device.
    pub fn rc(&self) -> i32 {
        match self {
            ProtocolError::V1(e) => e.rc,
            ProtocolError::V2(e) => e.err.rc,
        }
    }

    pub fn group(&self) -> Option<u16> {
        match self {
            ProtocolError::V1(_) => None,
            ProtocolError::V2(e) => Some(e.err.group),
        }
    }

    /// Normalized `{group, rc}` pair.
    pub fn code(&self) -> ErrorCode {
        ErrorCode {
            group: self.group(),
            rc: self.rc(),
        }
    }

    /// The generic management code, for V1 errors only.
    ///
    /// V2 codes are scoped to their group and have no generic meaning.
    pub fn mgmt_err(&self) -> Option<MgmtErr> {
        match self {
            ProtocolError::V1(e) => MgmtErr::from_rc(e.rc),
            ProtocolError::V2(_) => None,
        }
    }

    /// The group-specific code, for V2 errors from a known group.
    pub fn group_rc(&self) -> Option<GroupRc> {
        match self {
            ProtocolError::V1(_) => None,
            ProtocolError::V2(e) => GroupRc::new(e.err.group, e.err.rc),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::V1(e) => {
                match MgmtErr::from_rc(e.rc) {
                    Some(code) => write!(f, "rc {} ({code:?})", e.rc)?,
                    None => write!(f, "rc {}", e.rc)?,
                }
                if let Some(rsn) = &e.rsn {
                    write!(f, ": {rsn}")?;
                }
                Ok(())
            }
            ProtocolError::V2(e) => {
                write!(f, "group {} rc {}", e.err.group, e.err.rc)?;
                match self.group_rc() {
                    Some(code) => write!(f, " ({code})"),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A resolved reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R> {
    Success(R),
    Error(ProtocolError),
}

impl<R> Reply<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    /// Turn an error reply into `SmpError::Device`.
    pub fn into_result(self) -> Result<R> {
        match self {
            Reply::Success(r) => Ok(r),
            Reply::Error(e) => Err(SmpError::Device(e)),
        }
    }
}

/// Fields that decide which candidate shapes a body may take.
#[derive(Deserialize)]
struct Discriminant {
    #[serde(default)]
    rc: Option<i64>,
    #[serde(default)]
    err: Option<IgnoredAny>,
}

/// Resolve a reply body into success or one of the error generations.
///
/// - Success is a candidate unless `err` is present or `rc` is non-zero.
/// - V1 is a candidate when `rc` is present.
/// - V2 is a candidate when `err` is present.
///
/// Candidates are tried in that order and the first that decodes wins. A body
/// matching none of them is `SmpError::Decode`.
pub fn decode_reply<R: DeserializeOwned>(body: &[u8]) -> Result<Reply<R>> {
    let shape: Discriminant = CborCodec::decode(body)
        .map_err(|e| SmpError::Decode(format!("reply is not a CBOR map: {e}")))?;

    if shape.err.is_none() && shape.rc.unwrap_or(0) == 0 {
        if let Ok(success) = CborCodec::decode::<R>(body) {
            return Ok(Reply::Success(success));
        }
    }
    if shape.rc.is_some() {
        if let Ok(error) = CborCodec::decode::<ErrorV1>(body) {
            return Ok(Reply::Error(ProtocolError::V1(error)));
        }
    }
    if shape.err.is_some() {
        if let Ok(error) = CborCodec::decode::<ErrorV2>(body) {
            return Ok(Reply::Error(ProtocolError::V2(error)));
        }
    }

    Err(SmpError::Decode(format!(
        "reply matches none of {}, ErrorV1, ErrorV2: {}",
        std::any::type_name::<R>(),
        hex::encode(body)
    )))
}
