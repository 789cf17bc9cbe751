//! Hessian2 error types

use thiserror::Error;

use crate::model::ValueKind;

/// Failures while writing a value graph
#[derive(Error, Debug)]
pub enum EncodeError {
    /// A structured value has no registry mapping and reports no class name
    #[error("cannot resolve remote class name for `{rust_type}`")]
    UnresolvedClassName {
        /// Rust type of the offending value
        rust_type: &'static str,
    },

    /// `Value::Ref` points past the composites assigned so far
    #[error("reference {id} has not been assigned (next id is {next})")]
    DanglingReference {
        /// Requested reference id
        id: u32,
        /// Next id the session would assign
        next: u32,
    },

    /// Collection, index or reference count beyond the 32-bit wire range
    #[error("length {len} exceeds the wire range")]
    TooLarge {
        /// Offending length
        len: usize,
    },

    /// A shared composite is mutably borrowed elsewhere
    #[error("shared value is mutably borrowed during encoding")]
    Borrowed,
}

/// Failures while reading a Hessian2 stream
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Input ended inside a value
    #[error("unexpected end of input at offset {offset}: need {needed} more bytes")]
    UnexpectedEof {
        /// Offset of the read that ran short
        offset: usize,
        /// Bytes missing
        needed: usize,
    },

    /// Tag byte is not assigned by the grammar
    #[error("unknown tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// Tag byte
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },

    /// Tag is valid but not allowed in this position
    #[error("unexpected tag {tag:#04x} at offset {offset}: expected {expected}")]
    UnexpectedTag {
        /// Tag byte
        tag: u8,
        /// Offset of the tag
        offset: usize,
        /// Production the decoder was reading
        expected: &'static str,
    },

    /// Back-reference to a slot that was never assigned
    #[error("dangling reference {id}: only {assigned} values assigned")]
    DanglingReference {
        /// Requested reference id
        id: i64,
        /// Slots assigned so far in the session
        assigned: usize,
    },

    /// Object instance names a class definition that was never read
    #[error("unknown class definition {index}: only {defined} defined")]
    UnknownClassDef {
        /// Requested definition index
        index: i64,
        /// Definitions read so far
        defined: usize,
    },

    /// Type reference names a type string that was never read
    #[error("unknown type reference {index}: only {defined} defined")]
    UnknownTypeRef {
        /// Requested type index
        index: i64,
        /// Type strings read so far
        defined: usize,
    },

    /// String payload is not valid UTF-8 / UTF-16
    #[error("invalid string encoding at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the offending byte
        offset: usize,
    },

    /// Negative or oversized length prefix
    #[error("invalid length {len} at offset {offset}")]
    InvalidLength {
        /// Decoded length
        len: i64,
        /// Offset after the length
        offset: usize,
    },

    /// Decoded value cannot take the requested shape
    #[error("cannot convert {found} into {target}")]
    TypeMismatch {
        /// Kind of the decoded value
        found: ValueKind,
        /// Requested Rust type
        target: &'static str,
    },

    /// Numeric value does not fit the requested width
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// Decoded value
        value: i64,
        /// Requested Rust type
        target: &'static str,
    },

    /// Strict shape coercion found a different field set
    #[error("field mismatch for `{class_name}`: expected {expected} fields, found {found}")]
    FieldMismatch {
        /// Remote class name of the decoded object
        class_name: String,
        /// Fields declared by the local type
        expected: usize,
        /// Fields carried on the wire
        found: usize,
    },

    /// Typed map for a registered class has a non-string key
    #[error("map key for `{class_name}` must be a string, found {found}")]
    NonStringField {
        /// Registered class name
        class_name: String,
        /// Kind of the offending key
        found: ValueKind,
    },

    /// Nesting exceeded the configured depth
    #[error("nesting deeper than {max} levels")]
    DepthExceeded {
        /// Configured maximum
        max: usize,
    },

    /// A shared composite is mutably borrowed elsewhere
    #[error("shared value is mutably borrowed during conversion")]
    Borrowed,
}

/// Any codec failure
#[derive(Error, Debug)]
pub enum Error {
    /// Encoding failed
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding failed
    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Check if this is an encoding failure
    #[must_use]
    pub const fn is_encode(&self) -> bool {
        matches!(self, Self::Encode(_))
    }

    /// Check if this is a decoding failure
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
