//! Protocol module - SMP header, messages, framing and chunk sizing.
//!
//! - 8-byte header encoding/decoding
//! - Typed requests and ordered reply resolution
//! - Frame buffer for reassembling fragmented messages
//! - Packet maximizer for chunked writes

mod frame;
mod frame_buffer;
mod header;
mod maximize;
mod message;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use header::{group, next_sequence, Header, Op, Version, HEADER_SIZE};
pub use maximize::{maximize, ChunkedWrite};
pub use message::{
    decode_reply, Command, ErrorCode, ErrorV1, ErrorV2, GroupError, MgmtErr, ProtocolError, Reply,
    Request,
};
