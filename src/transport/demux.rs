//! Serial stream demultiplexer.
//!
//! A serial console carries SMP packet lines interleaved with whatever the
//! firmware prints. The demultiplexer splits the raw byte stream into two
//! ordered outputs: complete packet lines and plain text.
//!
//! Implements a state machine:
//! - `Plain`: scanning for a packet marker; bytes before it are plain text
//! - `Frame`: inside a packet line, waiting for `'\n'`
//!
//! The outcome does not depend on how the stream is chunked. A trailing byte
//! that could begin a marker is held back until the next push decides it.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::codec::packet::{CONTINUE_MARKER, END_MARKER, START_MARKER};

/// Plain text kept for [`SerialDemux::take_text`] before the oldest bytes are
/// discarded.
pub const DEFAULT_TEXT_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    Frame,
}

/// Splits a serial byte stream into packet lines and plain text.
#[derive(Debug)]
pub struct SerialDemux {
    /// Bytes not yet classified, or held back as a possible marker start.
    plain: BytesMut,
    /// The packet line being assembled.
    frame: BytesMut,
    mode: Mode,
    frames: VecDeque<Bytes>,
    text: BytesMut,
    text_capacity: usize,
    /// Text bytes discarded by the capacity limit.
    dropped: usize,
    /// Plain text since the last logged newline.
    log_line: BytesMut,
    label: String,
}

impl SerialDemux {
    pub fn new() -> Self {
        Self::with_label("serial")
    }

    /// Create a demultiplexer whose log lines are prefixed with `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            plain: BytesMut::new(),
            frame: BytesMut::new(),
            mode: Mode::Plain,
            frames: VecDeque::new(),
            text: BytesMut::new(),
            dropped: 0,
            text_capacity: DEFAULT_TEXT_CAPACITY,
            log_line: BytesMut::new(),
            label: label.into(),
        }
    }

    /// Limit how much unread plain text is kept.
    pub fn with_text_capacity(mut self, capacity: usize) -> Self {
        self.text_capacity = capacity;
        self
    }

    /// Feed newly read bytes.
    pub fn push(&mut self, data: &[u8]) {
        match self.mode {
            Mode::Plain => self.plain.extend_from_slice(data),
            Mode::Frame => self.frame.extend_from_slice(data),
        }
        self.process();
    }

    fn process(&mut self) {
        loop {
            match self.mode {
                Mode::Plain => {
                    let Some(start) = find_marker(&self.plain) else {
                        let keep = usize::from(matches!(
                            self.plain.last(),
                            Some(&b) if b == START_MARKER[0] || b == CONTINUE_MARKER[0]
                        ));
                        let text = self.plain.split_to(self.plain.len() - keep);
                        self.emit_text(&text);
                        return;
                    };

                    let text = self.plain.split_to(start);
                    self.emit_text(&text);
                    self.flush_log_line();

                    self.frame = self.plain.split();
                    self.mode = Mode::Frame;
                }
                Mode::Frame => {
                    let Some(end) = self.frame.iter().position(|&b| b == END_MARKER) else {
                        return;
                    };

                    let line = self.frame.split_to(end + 1).freeze();
                    tracing::debug!("{}: received {} byte packet line", self.label, line.len());
                    self.frames.push_back(line);

                    // A new packet may follow with no text in between.
                    self.plain = self.frame.split();
                    self.mode = Mode::Plain;
                }
            }
        }
    }

    fn emit_text(&mut self, text: &[u8]) {
        if text.is_empty() {
            return;
        }

        self.text.extend_from_slice(text);
        if self.text.len() > self.text_capacity {
            let excess = self.text.len() - self.text_capacity;
            let _ = self.text.split_to(excess);
            self.dropped += excess;
            tracing::warn!(
                "{}: text buffer full, dropped {} oldest unread bytes",
                self.label,
                excess
            );
        }

        self.log_line.extend_from_slice(text);
        while let Some(end) = self.log_line.iter().position(|&b| b == b'\n') {
            let line = self.log_line.split_to(end + 1);
            log_text(&self.label, &line[..end]);
        }
    }

    fn flush_log_line(&mut self) {
        if !self.log_line.is_empty() {
            let line = self.log_line.split();
            log_text(&self.label, &line);
        }
    }

    /// Release a trailing byte held back as a possible marker start.
    ///
    /// Called once the stream has gone quiet and no marker can complete.
    pub fn flush_pending(&mut self) {
        if self.mode == Mode::Plain && !self.plain.is_empty() {
            let text = self.plain.split();
            self.emit_text(&text);
        }
    }

    /// Next complete packet line, marker and newline included.
    pub fn pop_frame(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    pub fn has_frame(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Plain text up to and including the first `delimiter`, if present.
    pub fn take_text_until(&mut self, delimiter: &[u8]) -> Option<Bytes> {
        if delimiter.is_empty() {
            return None;
        }
        let end = self
            .text
            .windows(delimiter.len())
            .position(|w| w == delimiter)?;
        Some(self.text.split_to(end + delimiter.len()).freeze())
    }

    /// All plain text received so far.
    pub fn take_text(&mut self) -> Bytes {
        self.text.split().freeze()
    }

    /// Unread plain text length.
    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    /// Total plain text discarded because nobody read it in time.
    pub fn dropped_text(&self) -> usize {
        self.dropped
    }

    /// Forget everything; used when a new connection starts.
    pub fn reset(&mut self) {
        self.plain.clear();
        self.frame.clear();
        self.mode = Mode::Plain;
        self.frames.clear();
        self.text.clear();
        self.log_line.clear();
        self.dropped = 0;
    }
}

impl Default for SerialDemux {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the earliest packet marker.
fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w == START_MARKER || w == CONTINUE_MARKER)
}

fn log_text(label: &str, line: &[u8]) {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match std::str::from_utf8(line) {
        Ok(text) => tracing::warn!("{label}: {text}"),
        Err(_) => tracing::warn!("{label}: {}", hex::encode(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet::encode_packet;

    fn drain_frames(demux: &mut SerialDemux) -> Vec<Bytes> {
        std::iter::from_fn(|| demux.pop_frame()).collect()
    }

    #[test]
    fn test_plain_text_only() {
        let mut demux = SerialDemux::new();
        demux.push(b"boot ok\nuart ready\n");

        assert!(!demux.has_frame());
        assert_eq!(demux.take_text_until(b"\n").unwrap(), &b"boot ok\n"[..]);
        assert_eq!(demux.take_text(), &b"uart ready\n"[..]);
    }

    #[test]
    fn test_frame_between_text() {
        let line = encode_packet(b"smp", 128).unwrap().remove(0);
        let mut stream = b"before\n".to_vec();
        stream.extend_from_slice(&line);
        stream.extend_from_slice(b"after\n");

        let mut demux = SerialDemux::new();
        demux.push(&stream);

        assert_eq!(drain_frames(&mut demux), vec![Bytes::from(line)]);
        assert_eq!(demux.take_text(), &b"before\nafter\n"[..]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let lines = encode_packet(&[9u8; 200], 32).unwrap();
        let stream: Vec<u8> = lines.concat();

        let mut demux = SerialDemux::new();
        demux.push(&stream);

        assert_eq!(drain_frames(&mut demux).len(), lines.len());
        assert_eq!(demux.text_len(), 0);
    }

    #[test]
    fn test_marker_split_across_pushes() {
        let line = encode_packet(b"x", 128).unwrap().remove(0);
        let mut demux = SerialDemux::new();

        demux.push(b"log\x06");
        assert_eq!(demux.take_text(), &b"log"[..]);

        demux.push(&line[1..]);
        assert_eq!(drain_frames(&mut demux), vec![Bytes::from(line)]);
        assert_eq!(demux.text_len(), 0);
    }

    #[test]
    fn test_frame_waits_for_newline() {
        let line = encode_packet(b"hello", 128).unwrap().remove(0);
        let (head, tail) = line.split_at(line.len() - 1);

        let mut demux = SerialDemux::new();
        demux.push(head);
        assert!(!demux.has_frame());
        demux.push(tail);
        assert!(demux.has_frame());
    }

    #[test]
    fn test_byte_at_a_time_matches_single_push() {
        let frame = encode_packet(b"payload", 128).unwrap().remove(0);
        let mut stream = b"\xff\xfe binary noise\n".to_vec();
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(b"partial");

        let mut whole = SerialDemux::new();
        whole.push(&stream);

        let mut bytewise = SerialDemux::new();
        for b in &stream {
            bytewise.push(std::slice::from_ref(b));
        }

        assert_eq!(drain_frames(&mut whole), drain_frames(&mut bytewise));
        assert_eq!(whole.take_text(), bytewise.take_text());
    }

    #[test]
    fn test_text_capacity_drops_oldest() {
        let mut demux = SerialDemux::new().with_text_capacity(4);
        demux.push(b"abcdef");
        assert_eq!(demux.take_text(), &b"cdef"[..]);
        assert_eq!(demux.dropped_text(), 2);

        demux.push(b"gh");
        assert_eq!(demux.dropped_text(), 2);
    }

    #[test]
    fn test_flush_pending_releases_held_byte() {
        let mut demux = SerialDemux::new();
        demux.push(b"progress 50%\x04");
        assert_eq!(demux.take_text(), &b"progress 50%"[..]);

        demux.flush_pending();
        assert_eq!(demux.take_text(), &b"\x04"[..]);

        demux.flush_pending();
        assert_eq!(demux.text_len(), 0);
    }

    #[test]
    fn test_flush_pending_keeps_partial_frame() {
        let line = encode_packet(b"hello", 128).unwrap().remove(0);
        let (head, tail) = line.split_at(line.len() - 1);

        let mut demux = SerialDemux::new();
        demux.push(head);
        demux.flush_pending();
        assert_eq!(demux.text_len(), 0);

        demux.push(tail);
        assert_eq!(drain_frames(&mut demux), vec![Bytes::from(line)]);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut demux = SerialDemux::new();
        demux.push(b"text\x06\x09abc");
        demux.reset();
        demux.push(b"fresh\n");
        assert!(!demux.has_frame());
        assert_eq!(demux.take_text(), &b"fresh\n"[..]);
    }

    #[test]
    fn test_take_text_until_missing_delimiter() {
        let mut demux = SerialDemux::new();
        demux.push(b"no newline");
        assert!(demux.take_text_until(b"\n").is_none());
        assert!(demux.take_text_until(b"").is_none());
        assert_eq!(demux.text_len(), 10);
    }
}
