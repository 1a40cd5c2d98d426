//! SMP over a serial console (UART, USB CDC ACM).
//!
//! Messages are sent as base64 packet lines (see [`crate::codec::packet`]).
//! Incoming bytes pass through a [`SerialDemux`] so firmware log output on the
//! same port is surfaced as warnings instead of corrupting replies.
//!
//! Opening the port is left to a [`SerialOpen`] implementation, so any
//! `AsyncRead + AsyncWrite` serial driver can be plugged in.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::{SerialDemux, Transport};
use crate::codec::packet::{
    base64_cost, base64_max, encode_packet, PacketDecoder, CONTINUE_MARKER, CRC16_SIZE,
    FRAME_LENGTH_SIZE, MARKER_SIZE,
};
use crate::error::{Result, SmpError};

/// Opens the physical serial port.
#[async_trait]
pub trait SerialOpen: Send + Sync {
    type Port: AsyncRead + AsyncWrite + Unpin + Send;

    /// Try once to open the port.
    async fn open(&self) -> Result<Self::Port>;

    /// Port name used in log lines.
    fn name(&self) -> &str;
}

/// Serial transport configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Largest encoded frame the server can receive.
    pub max_smp_encoded_frame_size: usize,
    /// Longest packet line, marker and newline included.
    pub line_length: usize,
    /// Number of line buffers in the server.
    pub line_buffers: usize,
    /// Wait for new bytes in [`SerialTransport::read_serial`].
    pub poll_interval: Duration,
    /// Delay between attempts to open the port.
    pub connect_retry_interval: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            max_smp_encoded_frame_size: 256,
            line_length: 128,
            line_buffers: 2,
            poll_interval: Duration::from_millis(5),
            connect_retry_interval: Duration::from_millis(500),
        }
    }
}

impl SerialConfig {
    pub fn max_smp_encoded_frame_size(mut self, size: usize) -> Self {
        self.max_smp_encoded_frame_size = size;
        self
    }

    pub fn line_length(mut self, length: usize) -> Self {
        self.line_length = length;
        self
    }

    pub fn line_buffers(mut self, count: usize) -> Self {
        self.line_buffers = count;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn connect_retry_interval(mut self, interval: Duration) -> Self {
        self.connect_retry_interval = interval;
        self
    }
}

/// Serial [`Transport`].
pub struct SerialTransport<O: SerialOpen> {
    opener: O,
    config: SerialConfig,
    port: Option<O::Port>,
    demux: SerialDemux,
    server_buffer_size: Option<usize>,
    read_buf: Vec<u8>,
}

impl<O: SerialOpen> SerialTransport<O> {
    pub fn new(opener: O) -> Self {
        Self::with_config(opener, SerialConfig::default())
    }

    pub fn with_config(opener: O, config: SerialConfig) -> Self {
        let lines_size = config.line_length * config.line_buffers;
        if config.max_smp_encoded_frame_size < lines_size {
            tracing::error!(
                "max_smp_encoded_frame_size {} is less than line_length {} * line_buffers {}",
                config.max_smp_encoded_frame_size,
                config.line_length,
                config.line_buffers
            );
        } else if config.max_smp_encoded_frame_size != lines_size {
            tracing::warn!(
                "max_smp_encoded_frame_size {} is not equal to line_length {} * line_buffers {}",
                config.max_smp_encoded_frame_size,
                config.line_length,
                config.line_buffers
            );
        }

        let demux = SerialDemux::with_label(opener.name());
        Self {
            opener,
            config,
            port: None,
            demux,
            server_buffer_size: None,
            read_buf: vec![0u8; 4096],
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Read plain text (non-SMP output) from the port.
    ///
    /// With a delimiter, returns the next line up to and including it, or an
    /// empty buffer if no complete line is available. Without one, returns all
    /// buffered text. Waits at most one poll interval for new bytes.
    pub async fn read_serial(&mut self, delimiter: Option<&[u8]>) -> Result<Bytes> {
        if let Some(text) = self.take_text(delimiter) {
            return Ok(text);
        }

        let interval = self.config.poll_interval;
        match tokio::time::timeout(interval, self.read_more()).await {
            Ok(read) => read?,
            // Quiet port: a held-back marker byte will not complete.
            Err(_) => self.demux.flush_pending(),
        }

        Ok(self.take_text(delimiter).unwrap_or_default())
    }

    fn take_text(&mut self, delimiter: Option<&[u8]>) -> Option<Bytes> {
        match delimiter {
            Some(delimiter) => self.demux.take_text_until(delimiter),
            None if self.demux.text_len() > 0 => Some(self.demux.take_text()),
            None => None,
        }
    }

    /// Read whatever the port has and feed it to the demultiplexer.
    async fn read_more(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(SmpError::Disconnected)?;
        let n = match port.read(&mut self.read_buf).await {
            Ok(0) => {
                tracing::error!("{}: port closed", self.opener.name());
                return Err(SmpError::Disconnected);
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("{}: read failed: {}", self.opener.name(), e);
                return Err(SmpError::Disconnected);
            }
        };
        self.demux.push(&self.read_buf[..n]);
        Ok(())
    }
}

#[async_trait]
impl<O: SerialOpen> Transport for SerialTransport<O> {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        tracing::debug!("Connecting to {}", self.opener.name());
        let deadline = Instant::now() + timeout;

        loop {
            match self.opener.open().await {
                Ok(port) => {
                    self.port = Some(port);
                    self.demux.reset();
                    tracing::debug!("Connected to {}", self.opener.name());
                    return Ok(());
                }
                Err(e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::error!("Failed to connect to {}: {}", self.opener.name(), e);
                        return Err(SmpError::Timeout(timeout));
                    }
                    tracing::debug!(
                        "Failed to connect to {}: {}, retrying in {:?}",
                        self.opener.name(),
                        e,
                        self.config.connect_retry_interval
                    );
                    let wait = self.config.connect_retry_interval.min(deadline - now);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        tracing::debug!("Disconnecting from {}", self.opener.name());
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.shutdown().await {
                tracing::debug!("{}: shutdown failed: {}", self.opener.name(), e);
            }
        }
        self.demux.reset();
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let max = self.max_unencoded_size();
        if data.len() > max {
            return Err(SmpError::PayloadTooLarge {
                size: data.len(),
                max,
            });
        }

        let lines = encode_packet(data, self.config.line_length)?;
        let port = self.port.as_mut().ok_or(SmpError::Disconnected)?;
        tracing::debug!("Sending {} bytes in {} lines", data.len(), lines.len());

        for line in &lines {
            if let Err(e) = port.write_all(line).await {
                tracing::error!("Failed to send {} bytes: {}", data.len(), e);
                return Err(SmpError::Disconnected);
            }
        }
        if let Err(e) = port.flush().await {
            tracing::error!("Failed to flush {} bytes: {}", data.len(), e);
            return Err(SmpError::Disconnected);
        }

        tracing::debug!("Sent {} bytes", data.len());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        let mut decoder = PacketDecoder::new();
        tracing::debug!("Waiting for response");

        loop {
            while let Some(line) = self.demux.pop_frame() {
                // Tail of a reply whose wait was cancelled.
                if !decoder.in_progress() && line.starts_with(&CONTINUE_MARKER) {
                    tracing::warn!(
                        "{}: dropped {} byte continuation line without a start line",
                        self.opener.name(),
                        line.len()
                    );
                    continue;
                }
                if let Some(message) = decoder.push_line(&line)? {
                    tracing::debug!("Finished receiving {} byte response", message.len());
                    return Ok(Bytes::from(message));
                }
            }
            self.read_more().await?;
        }
    }

    fn initialize(&mut self, server_buffer_size: usize) {
        self.server_buffer_size = Some(server_buffer_size);
    }

    fn mtu(&self) -> usize {
        self.config.max_smp_encoded_frame_size
    }

    fn max_unencoded_size(&self) -> usize {
        // Every line pays for its marker and, in the worst case, for the
        // encoded length prefix and CRC; the packet ends with one newline.
        let framing = (base64_cost(FRAME_LENGTH_SIZE + CRC16_SIZE) + MARKER_SIZE)
            * self.config.line_buffers
            + 1;
        let size = base64_max(self.mtu()).saturating_sub(framing);
        match self.server_buffer_size {
            Some(server) => size.min(server),
            None => size,
        }
    }
}
