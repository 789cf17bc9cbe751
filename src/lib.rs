//! Hessian2 - Compact binary serialization for cross-language RPC
//!
//! This library implements the Hessian 2.0 serialization grammar with identity
//! tracking for shared and cyclic graphs and a registry that maps remote class
//! names onto local Rust types.
//!
//! # Quick Start
//!
//! ```rust
//! use hessian2::{Map, Value};
//!
//! let mut map = Map::new();
//! map.insert("hello", "world");
//! map.insert(100, 100.101);
//!
//! // Encode to bytes
//! let bytes = hessian2::encode(&Value::map(map.clone()))?;
//!
//! // Decode from bytes
//! let decoded = hessian2::decode(&bytes)?;
//! assert_eq!(decoded, Value::map(map));
//! # Ok::<(), hessian2::Error>(())
//! ```
//!
//! # Features
//!
//! - **Compact encoding** - every value uses the shortest grammar form
//! - **Shared and cyclic graphs** - back-references preserve identity
//! - **Remote class registry** - objects and typed maps decode into Rust types
//! - **Lenient decoding** - unknown classes degrade to generic objects
//!
//! # Protocol Specification
//!
//! See the [Hessian 2.0 Serialization Protocol](http://hessian.caucho.com/doc/hessian-serialization.html).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod model;
pub mod protocol;

pub use model::{
    FromValue, List, Map, Object, Pojo, Shared, ToValue, TypeDescriptor, TypeRegistry, Value,
    ValueKind, pojo_from_value, pojo_from_value_strict, register_pojo, register_pojo_mapping,
};
pub use protocol::{
    DecodeError, Decoder, DecoderConfig, EncodeError, Encoder, EncoderConfig, Error,
    MetricsSnapshot, Result, decode, encode, from_bytes, to_bytes,
};

/// Hessian serialization protocol version
pub const PROTOCOL_VERSION: &str = "2.0";

/// Snapshot of process-wide codec counters
#[must_use]
pub fn metrics() -> MetricsSnapshot {
    protocol::Metrics::totals()
}
