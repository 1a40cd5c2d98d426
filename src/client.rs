//! Client builder and request/response session.
//!
//! The [`ClientBuilder`] provides a fluent API for the session timeouts. The
//! [`Client`] owns one [`Transport`] and manages the lifecycle:
//! 1. Connect the transport
//! 2. Ask the device for its buffer size and narrow the transport with it
//! 3. Exchange requests, one in flight at a time
//!
//! # Example
//!
//! ```ignore
//! use smp_client::requests::Echo;
//! use smp_client::transport::UdpTransport;
//! use smp_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder()
//!         .request_timeout(std::time::Duration::from_secs(5))
//!         .build(UdpTransport::new("192.0.2.1"));
//!
//!     client.connect().await?;
//!     let reply = client.send(Echo::new("hello")).await?;
//!     assert_eq!(reply.r, "hello");
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use crate::error::{Result, SmpError};
use crate::protocol::{decode_reply, Command, Frame, Reply, Request};
use crate::requests::McuMgrParameters;
use crate::transport::Transport;

/// Session timeouts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for opening the transport.
    pub connect_timeout: Duration,
    /// Default deadline for one request/response exchange.
    pub request_timeout: Duration,
    /// Deadline for the buffer size query right after connecting.
    pub initialize_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
            initialize_timeout: Duration::from_secs(2),
        }
    }
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the transport connect timeout.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the default request timeout.
    ///
    /// Default: 120 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout of the buffer size query sent on connect.
    ///
    /// Default: 2 seconds
    pub fn initialize_timeout(mut self, timeout: Duration) -> Self {
        self.config.initialize_timeout = timeout;
        self
    }

    /// Build a client over `transport`. Nothing is connected yet.
    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        Client {
            transport,
            config: self.config,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An SMP client session over one transport.
///
/// Exchanges are strictly sequential: every method that talks to the device
/// takes `&mut self`, so a reply is always applied before the next request
/// goes out. Nothing is retried here.
pub struct Client<T> {
    transport: T,
    config: ClientConfig,
}

impl Client<()> {
    /// Create a new client builder.
    ///
    /// The transport type is fixed later by [`ClientBuilder::build`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport> Client<T> {
    /// Create a client with the default configuration.
    pub fn new(transport: T) -> Self {
        ClientBuilder::new().build(transport)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Connect the transport, then narrow it with the device's buffer size.
    ///
    /// A device that answers the buffer size query with an error, or not at
    /// all, is still usable; the transport then keeps its own limits.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect(self.config.connect_timeout).await?;
        tracing::debug!("Connected, initializing");
        self.initialize().await?;
        tracing::debug!("Initialized");
        Ok(())
    }

    async fn initialize(&mut self) -> Result<()> {
        let request = Request::new(McuMgrParameters {})?;
        match self
            .request_with_timeout(&request, self.config.initialize_timeout)
            .await
        {
            Ok(Reply::Success(params)) => {
                tracing::info!(
                    "Device buffer size {} B, count {}",
                    params.buf_size,
                    params.buf_count
                );
                self.transport.initialize(params.buf_size);
            }
            Ok(Reply::Error(e)) => {
                tracing::warn!("Error reading device parameters: {}", e);
            }
            Err(SmpError::Timeout(_)) => {
                tracing::warn!("Timeout waiting for device parameters");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Send `request` and resolve its reply, using the default timeout.
    pub async fn request<C: Command>(&mut self, request: &Request<C>) -> Result<Reply<C::Response>> {
        self.request_with_timeout(request, self.config.request_timeout)
            .await
    }

    /// Send `request` and resolve its reply.
    ///
    /// Performs exactly one send and one receive. A timeout abandons the wait
    /// only; the transport stays connected.
    ///
    /// # Errors
    ///
    /// - `Timeout` if no reply arrives within `timeout`
    /// - `BadSequence` if the reply answers another request
    /// - `Decode` if the reply matches no expected shape
    pub async fn request_with_timeout<C: Command>(
        &mut self,
        request: &Request<C>,
        timeout: Duration,
    ) -> Result<Reply<C::Response>> {
        let sequence = request.sequence();
        tracing::debug!(
            "Sending request group {} command {} sequence {}",
            C::GROUP,
            C::COMMAND,
            sequence
        );

        let bytes = match tokio::time::timeout(
            timeout,
            self.transport.send_and_receive(request.bytes()),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(
                    "Timeout ({:?}) waiting for response to sequence {}",
                    timeout,
                    sequence
                );
                return Err(SmpError::Timeout(timeout));
            }
        };

        let frame = Frame::from_message(bytes.clone()).ok_or_else(|| {
            let message = format!("reply header is invalid: {}", hex::encode(&bytes));
            tracing::error!("{}", message);
            SmpError::Decode(message)
        })?;

        if frame.sequence() != sequence {
            tracing::error!(
                "Bad sequence {}, expected {}",
                frame.sequence(),
                sequence
            );
            return Err(SmpError::BadSequence {
                expected: sequence,
                received: frame.sequence(),
            });
        }

        let reply = decode_reply(frame.body()).map_err(|e| {
            tracing::error!("Undecodable reply to sequence {}: {}", sequence, e);
            e
        })?;
        if let Reply::Error(e) = &reply {
            tracing::debug!("Device error reply to sequence {}: {}", sequence, e);
        }
        Ok(reply)
    }

    /// Encode `command`, send it and return the success body.
    ///
    /// An error reply becomes `SmpError::Device`.
    pub async fn send<C: Command>(&mut self, command: C) -> Result<C::Response> {
        let request = Request::new(command)?;
        self.request(&request).await?.into_result()
    }
}
