//! # smp-client
//!
//! Client engine for the Simple Management Protocol (SMP) used to manage
//! embedded devices: image upload and state, file transfer, echo, reset.
//!
//! ## Architecture
//!
//! - **Protocol**: 8-byte header, CBOR bodies, typed requests, ordered
//!   resolution of success and both error generations
//! - **Transfers**: MTU-aware chunking driven by device-reported offsets
//! - **Transports**: serial console (with log demultiplexing), UDP and BLE
//!
//! ## Example
//!
//! ```ignore
//! use smp_client::transport::UdpTransport;
//! use smp_client::{Client, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), smp_client::SmpError> {
//!     let image = std::fs::read("zephyr.signed.bin")?;
//!     let mut client = Client::new(UdpTransport::new("192.0.2.1"));
//!     client.connect().await?;
//!
//!     let mut upload = client.upload(&image, UploadOptions::default());
//!     while let Some(offset) = upload.next().await {
//!         println!("{} / {}", offset?, image.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod requests;
pub mod transport;

mod client;
mod transfer;

pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{Result, SmpError, TransferError};
pub use transfer::{
    FilePlan, ImagePlan, Upload, UploadOptions, UploadPlan, UploadProgress,
};
