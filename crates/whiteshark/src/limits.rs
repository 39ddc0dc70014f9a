//! Wire constants and decoding limits for the WhiteShark format.
//!
//! The decoder treats every limit here as a hard bound; exceeding one is a
//! fatal error for the call, never a truncation.

/// Magic bytes opening every stream.
pub const MAGIC: [u8; 4] = *b"WSHK";

/// Format version written by the encoder and required by the decoders.
pub const FORMAT_VERSION: u16 = 1;

/// Header size: magic, stream identifier, version, options.
pub const HEADER_LEN: usize = 12;

/// Width of the caller-supplied stream identifier.
pub const IDENTIFIER_LEN: usize = 4;

/// Byte used to pad short stream identifiers.
pub const IDENTIFIER_PAD: u8 = b' ';

/// Prefix of synthetic properties carrying map entries.
pub const MAP_PROPERTY_PREFIX: &str = "__map:";

/// Name shared by every synthetic property carrying a collection element.
pub const COLLECTION_ITEM_PROPERTY: &str = "__item";

/// Maximum number of entries in the class or property dictionary.
///
/// Back-references are 2-byte indices, so index 65535 is the last one.
pub const MAX_DICT_SIZE: usize = 1 << 16;

/// Maximum byte length of a class name or a long property name.
pub const MAX_NAME_LEN: usize = i16::MAX as usize;

/// Property names shorter than this use a 1-byte length field.
pub const SHORT_NAME_LIMIT: usize = i8::MAX as usize;

/// Maximum value of any string length, array length or field count.
pub const MAX_LENGTH: usize = i32::MAX as usize;

/// Maximum number of simultaneously open containers (arrays and objects).
pub const MAX_DEPTH: usize = 128;

/// Upper bound on capacity reserved up-front from a decoded count.
pub const MAX_PREALLOC: usize = 4096;
