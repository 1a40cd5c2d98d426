//! SMP over UDP (Ethernet, Wi-Fi).
//!
//! One SMP message normally fits one datagram. Larger messages are split on
//! send and reassembled on receive using the length in the SMP header.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Result, SmpError};
use crate::protocol::FrameBuffer;

/// UDP transport configuration.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Destination port of the SMP server.
    pub port: u16,
    /// Largest datagram payload.
    pub mtu: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            port: 1337,
            mtu: 1500,
        }
    }
}

impl UdpConfig {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }
}

/// UDP [`Transport`].
pub struct UdpTransport {
    host: String,
    config: UdpConfig,
    socket: Option<UdpSocket>,
    frames: FrameBuffer,
    server_buffer_size: Option<usize>,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Create a transport for the SMP server at `host` (name or address).
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_config(host, UdpConfig::default())
    }

    pub fn with_config(host: impl Into<String>, config: UdpConfig) -> Self {
        Self {
            host: host.into(),
            config,
            socket: None,
            frames: FrameBuffer::new(),
            server_buffer_size: None,
            recv_buf: vec![0u8; u16::MAX as usize],
        }
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.peer_addr().ok())
    }

    async fn open(&self) -> Result<UdpSocket> {
        let target = (self.host.as_str(), self.config.port);
        let addr = tokio::net::lookup_host(target)
            .await?
            .next()
            .ok_or_else(|| SmpError::NotFound(self.host.clone()))?;

        let local: SocketAddr = if addr.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        Ok(socket)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        tracing::debug!("Connecting to {}:{}", self.host, self.config.port);
        let socket = tokio::time::timeout(timeout, self.open())
            .await
            .map_err(|_| SmpError::Timeout(timeout))??;

        self.socket = Some(socket);
        self.frames.clear();
        tracing::info!("Connected to {}:{}", self.host, self.config.port);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        tracing::debug!("Disconnecting from {}:{}", self.host, self.config.port);
        self.socket = None;
        if !self.frames.is_empty() {
            tracing::warn!(
                "Discarding {} bytes of an incomplete message",
                self.frames.len()
            );
        }
        self.frames.clear();
        tracing::info!("Disconnected from {}:{}", self.host, self.config.port);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let max = self.max_unencoded_size().max(1);
        if data.len() > max {
            tracing::warn!(
                "Fragmenting UDP packets is not recommended: {} B > {} B",
                data.len(),
                max
            );
        }

        let socket = self.socket.as_ref().ok_or(SmpError::Disconnected)?;
        tracing::debug!("Sending {} B", data.len());
        for chunk in data.chunks(max) {
            socket.send(chunk).await?;
        }
        tracing::debug!("Sent {} B", data.len());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        let socket = self.socket.as_ref().ok_or(SmpError::Disconnected)?;
        tracing::debug!("Awaiting data");

        loop {
            let n = socket.recv(&mut self.recv_buf).await?;
            tracing::debug!("Received {} B", n);

            let mut frames = self.frames.push(&self.recv_buf[..n])?;
            if frames.is_empty() {
                tracing::debug!("Waiting for the rest of the response");
                continue;
            }

            let surplus = self.frames.len() + frames[1..].iter().map(|f| f.len()).sum::<usize>();
            if surplus > 0 {
                self.frames.clear();
                let message = format!(
                    "Received more data than expected: {} B > {} B",
                    frames[0].len() + surplus,
                    frames[0].len()
                );
                tracing::error!("{}", message);
                return Err(SmpError::Transport(message));
            }

            let frame = frames.swap_remove(0);
            tracing::debug!("Finished receiving message of length {} B", frame.len());
            return Ok(frame.into_bytes());
        }
    }

    fn initialize(&mut self, server_buffer_size: usize) {
        self.server_buffer_size = Some(server_buffer_size);
    }

    fn mtu(&self) -> usize {
        self.server_buffer_size.unwrap_or(self.config.mtu)
    }

    fn max_unencoded_size(&self) -> usize {
        self.server_buffer_size.unwrap_or_else(|| self.mtu())
    }
}
