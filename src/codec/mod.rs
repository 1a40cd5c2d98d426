//! Codec module - body serialization and serial line framing.
//!
//! - [`CborCodec`] - CBOR bodies using `ciborium`
//! - [`packet`] - base64 line framing for SMP over a serial console
//!
//! # Design
//!
//! Codecs are marker structs and free functions rather than trait objects,
//! so the codec is chosen at compile time.
//!
//! # Example
//!
//! ```
//! use smp_client::codec::{packet, CborCodec};
//!
//! let body = CborCodec::encode(&"hello").unwrap();
//! let lines = packet::encode_packet(&body, 128).unwrap();
//!
//! let mut decoder = packet::PacketDecoder::new();
//! let decoded = decoder.push_line(&lines[0]).unwrap().unwrap();
//! assert_eq!(CborCodec::decode::<String>(&decoded).unwrap(), "hello");
//! ```

mod cbor;
pub mod packet;

pub use cbor::{cbor_uint_size, CborCodec};
pub use packet::PacketDecoder;
