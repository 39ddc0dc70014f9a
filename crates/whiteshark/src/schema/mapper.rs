//! External class mapping.
//!
//! A [`ClassMapper`] translates runtime class names to the names written on
//! the wire and back. Built-in kinds and arrays are named by this module and
//! never reach the mapper.

use std::borrow::Cow;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::model::TypeRef;

/// External name of the universal placeholder type.
pub const ANY_TYPE_NAME: &str = "object";

/// Suffix marking an array type name.
const ARRAY_SUFFIX: &str = "[]";

lazy_static! {
    /// External names of the built-in kinds.
    static ref BUILTIN_TYPES: FxHashMap<&'static str, TypeRef> = {
        let mut m = FxHashMap::default();
        m.insert(ANY_TYPE_NAME, TypeRef::Any);
        m.insert("bool", TypeRef::Bool);
        m.insert("i8", TypeRef::Int8);
        m.insert("i16", TypeRef::Int16);
        m.insert("i32", TypeRef::Int32);
        m.insert("i64", TypeRef::Int64);
        m.insert("f32", TypeRef::Float32);
        m.insert("f64", TypeRef::Float64);
        m.insert("char", TypeRef::Char);
        m.insert("string", TypeRef::String);
        m
    };
}

/// Bidirectional mapping between runtime class names and wire names.
///
/// Must be a stable bijection for the lifetime of the data it round-trips.
pub trait ClassMapper {
    /// Wire name of the runtime class `class`.
    fn external_name<'a>(&'a self, class: &'a str) -> Option<Cow<'a, str>>;

    /// Runtime class named `external` on the wire.
    fn class_for<'a>(&'a self, external: &'a str) -> Option<Cow<'a, str>>;
}

/// Mapper writing runtime class names unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityMapper;

impl ClassMapper for IdentityMapper {
    fn external_name<'a>(&'a self, class: &'a str) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(class))
    }

    fn class_for<'a>(&'a self, external: &'a str) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(external))
    }
}

/// Mapper built from explicit aliases; unknown names do not resolve.
#[derive(Debug, Clone, Default)]
pub struct AliasMapper {
    to_external: FxHashMap<String, String>,
    to_class: FxHashMap<String, String>,
}

impl AliasMapper {
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `class` to `external` and back.
    ///
    /// A later alias involving either name replaces the earlier pairing.
    pub fn alias(mut self, class: impl Into<String>, external: impl Into<String>) -> Self {
        let class = class.into();
        let external = external.into();
        if let Some(old_external) = self.to_external.remove(&class) {
            self.to_class.remove(&old_external);
        }
        if let Some(old_class) = self.to_class.remove(&external) {
            self.to_external.remove(&old_class);
        }
        self.to_external.insert(class.clone(), external.clone());
        self.to_class.insert(external, class);
        self
    }

    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }
}

impl ClassMapper for AliasMapper {
    fn external_name<'a>(&'a self, class: &'a str) -> Option<Cow<'a, str>> {
        self.to_external.get(class).map(|s| Cow::Borrowed(s.as_str()))
    }

    fn class_for<'a>(&'a self, external: &'a str) -> Option<Cow<'a, str>> {
        self.to_class.get(external).map(|s| Cow::Borrowed(s.as_str()))
    }
}

/// Returns the wire name of a type, or `None` if a class does not map.
///
/// Arrays are named after their element type with a `[]` suffix per level.
/// A class whose wire name would read back as a built-in kind or an array
/// does not map either.
pub fn external_type_name(mapper: &dyn ClassMapper, ty: &TypeRef) -> Option<String> {
    let name = match ty {
        TypeRef::Any => ANY_TYPE_NAME,
        TypeRef::Bool => "bool",
        TypeRef::Int8 => "i8",
        TypeRef::Int16 => "i16",
        TypeRef::Int32 => "i32",
        TypeRef::Int64 => "i64",
        TypeRef::Float32 => "f32",
        TypeRef::Float64 => "f64",
        TypeRef::Char => "char",
        TypeRef::String => "string",
        TypeRef::Array(inner) => {
            let mut name = external_type_name(mapper, inner)?;
            name.push_str(ARRAY_SUFFIX);
            return Some(name);
        }
        TypeRef::Class(class) => {
            return mapper
                .external_name(class)
                .filter(|name| is_class_name(name))
                .map(Cow::into_owned);
        }
    };
    Some(name.to_string())
}

/// Whether `name` is free to name a class on the wire.
fn is_class_name(name: &str) -> bool {
    !name.is_empty() && !name.ends_with(ARRAY_SUFFIX) && !BUILTIN_TYPES.contains_key(name)
}

/// Resolves a wire type name, or `None` if it names no known type.
///
/// Array names are unwrapped one `[]` level at a time down to the
/// underlying element kind.
pub fn resolve_external_type(mapper: &dyn ClassMapper, name: &str) -> Option<TypeRef> {
    if let Some(inner) = name.strip_suffix(ARRAY_SUFFIX) {
        return resolve_external_type(mapper, inner).map(TypeRef::array_of);
    }
    if let Some(ty) = BUILTIN_TYPES.get(name) {
        return Some(ty.clone());
    }
    if name.is_empty() {
        return None;
    }
    mapper
        .class_for(name)
        .map(|class| TypeRef::Class(class.into_owned()))
}
