//! Binary encoding/decoding for WhiteShark streams.
//!
//! A stream is a 12-byte header followed by exactly one root value. The
//! encoder and both decoders share the tag table in [`tag`] and the
//! primitive layout in [`primitives`].

pub mod decode;
pub mod encode;
pub mod header;
pub mod immediate;
pub mod primitives;
pub mod progressive;
pub mod tag;

#[cfg(test)]
pub(crate) mod test_support;

pub use decode::{deserialize, Deserializer};
pub use encode::{serialize, Serializer};
pub use header::{sanitize_identifier, Header, Options};
pub use immediate::ImmediateDecoder;
pub use primitives::{Reader, Writer};
pub use progressive::{Progress, ProgressiveDecoder};
