//! SMP over Bluetooth Low Energy.
//!
//! Requests go out as GATT write-without-response on the SMP characteristic;
//! replies arrive as notifications that may split one SMP message. The GATT
//! stack itself is provided through [`GattLink`].
//!
//! A disconnect that races a pending receive always wins, so a waiter is
//! never left hanging on a dead link.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use super::Transport;
use crate::error::{Result, SmpError};
use crate::protocol::FrameBuffer;

/// SMP GATT service.
pub const SMP_SERVICE_UUID: &str = "8d53dc1d-1db7-4cd3-868b-8a527460aa84";
/// SMP GATT characteristic.
pub const SMP_CHARACTERISTIC_UUID: &str = "da2e7828-fbce-4e01-ae9e-261174997c48";

/// Channels a [`GattLink`] hands over once connected.
#[derive(Debug)]
pub struct GattEvents {
    /// Notification payloads from the SMP characteristic, in order.
    pub notifications: mpsc::Receiver<Bytes>,
    /// Becomes `true` when the peer disconnects. A dropped sender counts as
    /// disconnected too.
    pub disconnected: watch::Receiver<bool>,
}

/// A connected GATT client bound to the SMP characteristic.
#[async_trait]
pub trait GattLink: Send {
    /// Find and connect the device, then subscribe to notifications.
    async fn connect(&mut self, timeout: Duration) -> Result<GattEvents>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn write_without_response(&mut self, data: &[u8]) -> Result<()>;

    /// Negotiated write size (ATT MTU minus 3).
    fn max_write_without_response_size(&self) -> usize;

    /// Device name or address used in log lines.
    fn name(&self) -> &str;
}

/// BLE [`Transport`].
pub struct BleTransport<L: GattLink> {
    link: L,
    events: Option<GattEvents>,
    frames: FrameBuffer,
    server_buffer_size: Option<usize>,
}

impl<L: GattLink> BleTransport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            events: None,
            frames: FrameBuffer::new(),
            server_buffer_size: None,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn events(&mut self) -> Result<&mut GattEvents> {
        match self.events.as_mut() {
            Some(events) if !*events.disconnected.borrow() => Ok(events),
            _ => Err(SmpError::Disconnected),
        }
    }
}

/// Resolves once the link reports a disconnect or its sender goes away.
async fn disconnected(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|d| *d).await;
}

#[async_trait]
impl<L: GattLink> Transport for BleTransport<L> {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        tracing::debug!("Connecting to {}", self.link.name());
        let events = tokio::time::timeout(timeout, self.link.connect(timeout))
            .await
            .map_err(|_| SmpError::Timeout(timeout))??;

        self.events = Some(events);
        self.frames.clear();
        tracing::info!(
            "Connected to {}, max write without response {} B",
            self.link.name(),
            self.link.max_write_without_response_size()
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        tracing::debug!("Disconnecting from {}", self.link.name());
        self.events = None;
        self.frames.clear();
        self.link.disconnect().await?;
        tracing::debug!("Disconnected from {}", self.link.name());
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.events()?;
        let mtu = self.mtu().max(1);
        tracing::debug!("Sending {} bytes, mtu {}", data.len(), mtu);
        for chunk in data.chunks(mtu) {
            self.link.write_without_response(chunk).await?;
        }
        tracing::debug!("Sent {} bytes", data.len());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        tracing::debug!("Waiting for notify on {}", SMP_CHARACTERISTIC_UUID);

        loop {
            let events = self.events()?;
            let data = tokio::select! {
                biased;

                _ = disconnected(&mut events.disconnected) => None,
                data = events.notifications.recv() => data,
            };
            let Some(data) = data else {
                tracing::warn!("Disconnected from {}", self.link.name());
                self.frames.clear();
                return Err(SmpError::Disconnected);
            };
            tracing::debug!("Received {} bytes", data.len());

            let mut frames = self.frames.push(&data)?;
            if frames.is_empty() {
                continue;
            }
            if frames.len() > 1 || !self.frames.is_empty() {
                self.frames.clear();
                return Err(SmpError::Transport(
                    "notification data passed the expected message size".into(),
                ));
            }

            let frame = frames.swap_remove(0);
            tracing::debug!("Finished receiving {} byte response", frame.len());
            return Ok(frame.into_bytes());
        }
    }

    fn initialize(&mut self, server_buffer_size: usize) {
        self.server_buffer_size = Some(server_buffer_size);
    }

    fn mtu(&self) -> usize {
        self.link.max_write_without_response_size()
    }

    fn max_unencoded_size(&self) -> usize {
        self.server_buffer_size.unwrap_or_else(|| self.mtu())
    }
}
