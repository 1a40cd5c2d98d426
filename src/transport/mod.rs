//! Transport module - the links an SMP client can talk over.
//!
//! Every link implements [`Transport`]:
//! - [`SerialTransport`] - SMP over a console (base64 lines mixed with logs)
//! - [`UdpTransport`] - one SMP message per datagram
//! - [`BleTransport`] - GATT write-without-response plus notifications
//!
//! The physical drivers (serial port, GATT stack) stay outside this crate and
//! plug in through [`SerialOpen`] and [`GattLink`].

mod ble;
mod demux;
mod serial;
mod udp;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use ble::{BleTransport, GattEvents, GattLink, SMP_CHARACTERISTIC_UUID, SMP_SERVICE_UUID};
pub use demux::{SerialDemux, DEFAULT_TEXT_CAPACITY};
pub use serial::{SerialConfig, SerialOpen, SerialTransport};
pub use udp::{UdpConfig, UdpTransport};

/// A link that moves whole SMP messages.
#[async_trait]
pub trait Transport: Send {
    /// Open the link, giving up after `timeout`.
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    /// Send one encoded SMP message.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait for one complete SMP message, header included.
    async fn receive(&mut self) -> Result<Bytes>;

    async fn send_and_receive(&mut self, data: &[u8]) -> Result<Bytes> {
        self.send(data).await?;
        self.receive().await
    }

    /// Narrow the link limits with the buffer size the server reported.
    fn initialize(&mut self, server_buffer_size: usize);

    /// Largest frame the link moves in one transmission.
    fn mtu(&self) -> usize;

    /// Largest SMP message, before link encoding, that one transmission
    /// (or the server buffer) can take.
    fn max_unencoded_size(&self) -> usize;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        (**self).connect(timeout).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data).await
    }

    async fn receive(&mut self) -> Result<Bytes> {
        (**self).receive().await
    }

    async fn send_and_receive(&mut self, data: &[u8]) -> Result<Bytes> {
        (**self).send_and_receive(data).await
    }

    fn initialize(&mut self, server_buffer_size: usize) {
        (**self).initialize(server_buffer_size)
    }

    fn mtu(&self) -> usize {
        (**self).mtu()
    }

    fn max_unencoded_size(&self) -> usize {
        (**self).max_unencoded_size()
    }
}
