//! Hessian2 wire protocol
//!
//! This module provides the tag table, the encoder and decoder, and the
//! per-session reference table they share.

mod codec;
mod decoder;
mod encoder;
pub(crate) mod error;
mod metrics;
mod refs;
pub mod tags;
mod types;

pub use codec::{decode, encode, from_bytes, to_bytes};
pub use decoder::{Decoder, DecoderConfig};
pub use encoder::{Encoder, EncoderConfig};
pub use error::{DecodeError, EncodeError, Error, Result};
pub use metrics::MetricsSnapshot;
pub(crate) use metrics::Metrics;
pub use refs::ReferenceTable;
pub use types::TagClass;
