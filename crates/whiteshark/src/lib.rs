//! WhiteShark: compact binary object-graph serialization.
//!
//! This crate provides an encoder and two decoders for the WhiteShark
//! binary format: an immediate decoder for streams held in memory and a
//! progressive decoder that accepts the same stream in arbitrary chunks.
//!
//! # Overview
//!
//! WhiteShark is designed for:
//! - **Compactness**: variable-width length fields and first-occurrence
//!   dictionaries for class and property names
//! - **Object graphs**: typed objects described by an explicit schema
//!   registry, or untyped generic objects when class identity is elided
//! - **Slow transports**: decoding can pause after any byte and resume
//!   without re-reading input
//!
//! # Quick Start
//!
//! ```rust
//! use whiteshark::{ClassSchema, Deserializer, Object, SchemaRegistry, Serializer, Value};
//!
//! let registry = SchemaRegistry::new().with(
//!     ClassSchema::new("Point")
//!         .with_version(1)
//!         .field("id", 0i32)
//!         .field("name", Value::Null),
//! );
//!
//! let point = Value::Object(Object::new("Point").with("id", 7).with("name", "abc"));
//!
//! // Encode to binary
//! let bytes = Serializer::new(&registry).to_vec("DEMO", &point).unwrap();
//!
//! // Decode back, all at once
//! let decoded = Deserializer::new(&registry).deserialize("DEMO", &bytes).unwrap();
//! assert_eq!(decoded, point);
//!
//! // Or progressively, as bytes arrive
//! let mut decoder = Deserializer::new(&registry).progressive("DEMO");
//! for chunk in bytes.chunks(3) {
//!     decoder.feed(chunk).unwrap();
//! }
//! assert_eq!(decoder.finish().unwrap(), point);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Values, generic objects, type identities and dictionaries
//! - [`schema`]: Schema provider and external class mapper collaborators
//! - [`codec`]: Header, tag table, encoder and decoders
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and decoding limits
//!
//! # Security
//!
//! The decoders are designed to safely handle untrusted input:
//! - Allocations driven by decoded counts are capped
//! - Container nesting is bounded
//! - Every grammar violation is fatal; there is no resynchronization
//!
//! # Wire Format
//!
//! A stream is `WSHK`, a 4-byte stream identifier, a 2-byte format version
//! and a 2-byte options word, followed by one root value. Each value starts
//! with a tag byte whose low nibble selects the kind (see [`codec::tag`]).

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod schema;

// Re-export commonly used types at crate root
pub use codec::{
    deserialize, serialize, Deserializer, ImmediateDecoder, Options, Progress,
    ProgressiveDecoder, Serializer,
};
pub use error::{DecodeError, EncodeError, ErrorKind};
pub use model::{Array, Dictionaries, Dictionary, GenericObject, Object, TypeRef, Value};
pub use schema::{
    AliasMapper, ClassConfig, ClassMapper, ClassSchema, FieldFlags, FieldSchema, IdentityMapper,
    SchemaProvider, SchemaRegistry,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
