//! Error types for the zica-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use thiserror::Error;

/// Result type alias for zica operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all zica operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Varint did not terminate within 10 bytes
    #[error("malformed varint at offset {offset}: no terminating byte within 10 bytes")]
    MalformedVarint {
        /// Byte offset where the varint starts
        offset: usize,
    },

    /// Input ended before a declared or implied length was satisfied
    #[error("truncated input at offset {offset}: need {needed} more byte(s), {available} available")]
    TruncatedInput {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes required to complete the read
        needed: usize,
        /// Bytes actually remaining
        available: usize,
    },

    /// Tag carried a wire type outside 0..=5, or one that does not match
    /// the field's declared type
    #[error("invalid wire type {value} at offset {offset}")]
    InvalidWireType {
        /// Byte offset of the tag
        offset: usize,
        /// The offending wire type bits
        value: u8,
    },

    /// Field number outside the valid protobuf range
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// END_GROUP tag without a matching START_GROUP, or a group left open
    #[error("unmatched group delimiter for field {number} at offset {offset}")]
    UnmatchedGroup {
        /// Field number of the group
        number: u32,
        /// Byte offset of the offending tag
        offset: usize,
    },

    /// Nested messages exceeded the recursion limit during parse
    #[error("message nesting exceeds recursion limit of {limit}")]
    RecursionLimit {
        /// The configured limit
        limit: usize,
    },

    /// A string field held bytes that are not valid UTF-8
    #[error("string field {number} contains invalid UTF-8")]
    InvalidString {
        /// Field number of the string field
        number: u32,
    },

    /// Value assigned does not match the field's declared type
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Qualified field name
        field: String,
        /// Declared type
        expected: &'static str,
        /// Type of the rejected value
        actual: &'static str,
    },

    /// Field number not declared by the message type
    #[error("message '{message}' has no field {number}")]
    FieldNotFound {
        /// Full name of the message type
        message: String,
        /// The undeclared field number
        number: u32,
    },

    /// Enum number has no declared name (strict checking only)
    #[error("enum '{enum_name}' has no value {number}")]
    InvalidEnumValue {
        /// Full name of the enum type
        enum_name: String,
        /// The unrecognized number
        number: i32,
    },

    /// Enum name has no declared number
    #[error("enum '{enum_name}' has no value named '{name}'")]
    UnknownEnumName {
        /// Full name of the enum type
        enum_name: String,
        /// The unrecognized symbolic name
        name: String,
    },

    /// JSON object key matched no declared field
    #[error("message '{message}' has no field for JSON key '{key}'")]
    UnknownJsonField {
        /// Full name of the message type
        message: String,
        /// The unmatched key
        key: String,
    },

    /// JSON value has the wrong shape for the field's declared type
    #[error("invalid JSON value for field '{field}': expected {expected}")]
    JsonValue {
        /// Qualified field name
        field: String,
        /// What the mapping rules require
        expected: &'static str,
    },

    /// JSON text failed to parse
    #[error("invalid JSON: {0}")]
    JsonSyntax(#[from] serde_json::Error),

    /// Failed to decode the FileDescriptorSet input
    #[error("failed to decode descriptor set: {0}")]
    DescriptorDecode(#[from] prost::DecodeError),

    /// Type name reference did not resolve in the registry
    #[error("type '{name}' not found in descriptor registry")]
    TypeNotFound {
        /// Fully-qualified name that failed to resolve
        name: String,
    },

    /// Same fully-qualified name declared twice in one descriptor set
    #[error("type '{name}' is defined more than once")]
    DuplicateType {
        /// The colliding name
        name: String,
    },

    /// Descriptor set contained an invalid or inconsistent declaration
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Extension number falls outside the extendee's declared ranges
    #[error("extension '{extension}' uses number {number} outside the extension ranges of '{extendee}'")]
    ExtensionOutOfRange {
        /// Full name of the extension
        extension: String,
        /// Full name of the extended message
        extendee: String,
        /// The out-of-range number
        number: u32,
    },
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated input error
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedInput {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new invalid wire type error
    pub fn invalid_wire_type(offset: usize, value: u8) -> Self {
        Self::InvalidWireType { offset, value }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Creates a new unknown JSON field error
    pub fn unknown_json_field(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnknownJsonField {
            message: message.into(),
            key: key.into(),
        }
    }

    /// Creates a new JSON value shape error
    pub fn json_value(field: impl Into<String>, expected: &'static str) -> Self {
        Self::JsonValue {
            field: field.into(),
            expected,
        }
    }

    /// Creates a new type-not-found error
    pub fn type_not_found(name: impl Into<String>) -> Self {
        Self::TypeNotFound { name: name.into() }
    }

    /// Creates a new invalid descriptor error
    pub fn invalid_descriptor(detail: impl Into<String>) -> Self {
        Self::InvalidDescriptor(detail.into())
    }

    /// Returns true if this error was produced while decoding wire bytes
    /// (as opposed to an accessor contract violation)
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. }
                | Self::TruncatedInput { .. }
                | Self::InvalidWireType { .. }
                | Self::InvalidFieldNumber { .. }
                | Self::UnmatchedGroup { .. }
                | Self::RecursionLimit { .. }
                | Self::InvalidString { .. }
        )
    }
}
