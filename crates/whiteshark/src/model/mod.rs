//! Data model types for WhiteShark.
//!
//! This module contains the in-memory side of the format:
//! - Values (the object graph)
//! - Generic objects (untyped property bags)
//! - Type references (array element types, class identities)
//! - Dictionaries (first-occurrence name tables)

pub mod dictionary;
pub mod generic;
pub mod types;
pub mod value;

pub use dictionary::{Dictionaries, Dictionary, DictionaryError, Resolved};
pub use generic::GenericObject;
pub use types::TypeRef;
pub use value::{Array, Object, Value};
