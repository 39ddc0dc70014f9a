//! Error types for WhiteShark encoding and decoding.

use std::io;

use thiserror::Error;

/// Coarse error classification, stable across variants.
///
/// Callers should branch on the kind rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Stream does not start with the WhiteShark magic bytes.
    MissingFormatIdentifier,
    /// Stream identifier differs from the expected one.
    MismatchingStreamIdentifier,
    /// Stream was written with another format version.
    UnsupportedVersion,
    /// Something other than a property record appeared in a field list,
    /// or a property record appeared outside one.
    NotAProperty,
    /// A type or class could not be mapped in one direction or the other.
    UnresolvedType,
    /// A decoded property name has no slot on the resolved type.
    NoSuchField,
    /// Failure of the underlying byte source or sink.
    Io,
    /// Any other grammar or limit violation.
    Malformed,
    /// The progressive decoder already failed and refuses further input.
    Poisoned,
}

/// Error during decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    // === Header ===
    #[error("missing format identifier: expected WSHK, found {found:?}")]
    MissingFormatIdentifier { found: [u8; 4] },

    #[error("mismatching stream identifier: expected {expected:?}, found {found:?}")]
    MismatchingStreamIdentifier { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported format version: {version}")]
    UnsupportedVersion { version: u16 },

    // === Grammar ===
    #[error("not a property: tag 0x{tag:02x}")]
    NotAProperty { tag: u8 },

    #[error("invalid tag byte 0x{tag:02x}")]
    InvalidTag { tag: u8 },

    #[error("reserved bits are set in tag 0x{tag:02x}")]
    ReservedBitsSet { tag: u8 },

    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{remaining} trailing bytes after the root value")]
    TrailingData { remaining: usize },

    #[error("container nesting exceeds {max} levels")]
    DepthLimitExceeded { max: usize },

    #[error("property value without a property name")]
    MissingPropertyName,

    // === Dictionaries ===
    #[error("{dict} index {index} out of bounds (size: {size})")]
    IndexOutOfBounds {
        dict: &'static str,
        index: usize,
        size: usize,
    },

    #[error("{dict} entry sent in full again (already at index {index})")]
    DuplicateDictionaryEntry { dict: &'static str, index: u16 },

    #[error("class dictionary index {index} does not denote a class")]
    NotAClass { index: u16 },

    // === Types ===
    #[error("unresolved type: {name}")]
    UnresolvedType { name: String },

    #[error("no such field {field:?} on class {class}")]
    NoSuchField { class: String, field: String },

    #[error("array element {index} does not match the declared element type")]
    ElementTypeMismatch { index: usize },

    // === State ===
    #[error("decoder already failed")]
    Poisoned,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::MissingFormatIdentifier { .. } => ErrorKind::MissingFormatIdentifier,
            DecodeError::MismatchingStreamIdentifier { .. } => {
                ErrorKind::MismatchingStreamIdentifier
            }
            DecodeError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            DecodeError::NotAProperty { .. } => ErrorKind::NotAProperty,
            DecodeError::UnresolvedType { .. } | DecodeError::NotAClass { .. } => {
                ErrorKind::UnresolvedType
            }
            DecodeError::NoSuchField { .. } => ErrorKind::NoSuchField,
            DecodeError::Io(_) => ErrorKind::Io,
            DecodeError::Poisoned => ErrorKind::Poisoned,
            _ => ErrorKind::Malformed,
        }
    }
}

/// Error during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unresolved type: {name}")]
    UnresolvedType { name: String },

    #[error("{dict} dictionary exceeds 65536 entries")]
    DictionaryOverflow { dict: &'static str },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("array element {index} does not match the declared element type")]
    ElementTypeMismatch { index: usize },

    #[error("container nesting exceeds {max} levels")]
    DepthLimitExceeded { max: usize },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl EncodeError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::UnresolvedType { .. } => ErrorKind::UnresolvedType,
            EncodeError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Malformed,
        }
    }
}
