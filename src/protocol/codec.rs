//! One-shot Hessian2 encode/decode
//!
//! Convenience wrappers over [`Encoder`] and [`Decoder`] for a single value
//! using the global type registry.

use bytes::Bytes;

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::error::Result;
use crate::model::{FromValue, ToValue, Value};

/// Encode one value to bytes
///
/// # Format
///
/// ```text
/// [CLASS DEFINITIONS (as needed)] [VALUE]
/// ```
///
/// Class definitions for every object in the graph are written inline ahead
/// of their first instance, so the output is self-contained.
///
/// # Errors
///
/// Returns an error if:
/// - A structured value has no registered or self-reported class name
/// - A `Value::Ref` points at a composite not yet written
/// - A shared composite is mutably borrowed
/// - A collection is longer than the wire can describe
pub fn encode(value: &Value) -> Result<Bytes> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Decode the first value in `bytes`
///
/// Trailing bytes are ignored; use [`Decoder`] to read a stream of values.
///
/// # Errors
///
/// Returns an error if:
/// - Input ends inside the value
/// - A tag is unknown or out of place
/// - A reference, class definition or type index was never assigned
/// - A string is not valid UTF-8/UTF-16
/// - Nesting exceeds the default depth limit
pub fn decode(bytes: &[u8]) -> Result<Value> {
    Decoder::new(bytes).decode()
}

/// Convert a Rust value and encode it
pub fn to_bytes<T: ToValue + ?Sized>(value: &T) -> Result<Bytes> {
    encode(&value.to_value())
}

/// Decode the first value in `bytes` into a Rust value
pub fn from_bytes<T: FromValue>(bytes: &[u8]) -> Result<T> {
    T::from_value(decode(bytes)?)
}
