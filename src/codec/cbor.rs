//! CBOR codec using `ciborium`.
//!
//! SMP bodies are CBOR maps keyed by field name. Serde derives on the request
//! and response structs give exactly that shape, so every struct must be a
//! braced struct (`struct Reset {}`), never a unit struct, which would encode
//! as `null`.
//!
//! `ciborium` always writes integers and length prefixes in their shortest
//! form. [`cbor_uint_size`] relies on this.
//!
//! # Example
//!
//! ```
//! use smp_client::codec::CborCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Echo {
//!     d: String,
//! }
//!
//! let msg = Echo { d: "hello".to_string() };
//! let encoded = CborCodec::encode(&msg).unwrap();
//! assert_eq!(encoded[0], 0xA1); // map with one entry
//! let decoded: Echo = CborCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::Result;

/// CBOR codec for SMP message bodies.
pub struct CborCodec;

impl CborCodec {
    /// Encode a value to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)?;
        Ok(buf)
    }

    /// Decode CBOR bytes to a value.
    ///
    /// Unknown map keys are ignored; missing `Option` fields become `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

/// Extra bytes CBOR needs after the initial byte to encode the unsigned
/// integer `n`. This is also the cost of a byte-string length prefix.
///
/// | n            | extra bytes |
/// |--------------|-------------|
/// | 0..24        | 0           |
/// | 24..256      | 1           |
/// | 256..65536   | 2           |
/// | 65536..2^32  | 4           |
#[inline]
pub const fn cbor_uint_size(n: usize) -> usize {
    if n < 24 {
        0
    } else if n < 0x100 {
        1
    } else if n < 0x1_0000 {
        2
    } else if (n as u64) < 0x1_0000_0000 {
        4
    } else {
        8
    }
}
