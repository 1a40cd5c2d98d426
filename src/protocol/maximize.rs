//! Packet maximizer for chunked writes.
//!
//! A chunk travels as a CBOR byte string, whose length prefix grows with the
//! chunk (0, 1, 2 or 4 extra bytes). The largest chunk that fits a byte
//! budget is therefore a small fixed point: the cost of announcing `n` bytes
//! depends on `n`.
//!
//! Where the prefix widens (chunk sizes 24, 256 and 65536) the exact budget
//! can be unreachable. The maximizer then settles one byte short rather than
//! overshoot.

use super::header::HEADER_SIZE;
use super::message::{Command, Request};
use crate::codec::cbor_uint_size;
use crate::error::{Result, SmpError};

/// A write command that carries one chunk of a larger buffer.
pub trait ChunkedWrite: Command + Clone {
    /// Offset of the chunk within the whole buffer.
    fn offset(&self) -> usize;

    /// The chunk carried by this command.
    fn chunk(&self) -> &[u8];

    /// Replace the chunk.
    fn set_chunk(&mut self, chunk: Vec<u8>);
}

/// Fill `template` with the largest slice of `data` starting at the
/// template's offset whose encoded request still fits `budget` bytes.
///
/// The returned request keeps the template's version and sequence number.
/// The slice is clamped to the bytes left in `data`, so a final chunk never
/// overreads; a template at the end of `data` yields an empty chunk.
/// Budgets beyond what the 16-bit header length can describe are capped.
///
/// # Errors
///
/// `MtuTooSmall` if the budget cannot hold the template plus at least one
/// byte of outstanding data.
pub fn maximize<C: ChunkedWrite>(
    template: &Request<C>,
    data: &[u8],
    budget: usize,
) -> Result<Request<C>> {
    let budget = budget.min(HEADER_SIZE + u16::MAX as usize);
    let offset = template.command().offset();
    let remaining = data.get(offset..).unwrap_or_default();

    // Encoded size with a zero-length chunk; the empty byte string's own
    // type byte stays counted.
    let current = template.command().chunk().len();
    let template_len = template.len() - current - cbor_uint_size(current);

    let Some(available) = budget.checked_sub(template_len) else {
        return Err(SmpError::MtuTooSmall {
            budget,
            required: template_len,
        });
    };

    let mut size = (available - cbor_uint_size(available)).min(remaining.len());
    while size < remaining.len() && size + 1 + cbor_uint_size(size + 1) <= available {
        size += 1;
    }

    if size == 0 && !remaining.is_empty() {
        return Err(SmpError::MtuTooSmall {
            budget,
            required: template_len + 1,
        });
    }

    let mut command = template.command().clone();
    command.set_chunk(remaining[..size].to_vec());
    Request::build(command, template.header().version, template.sequence())
}
