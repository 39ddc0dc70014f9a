//! Runtime type identities.
//!
//! A [`TypeRef`] names the element type of an array and is the key of the
//! class dictionary. Objects enter that dictionary as [`TypeRef::Class`].

use std::fmt;

use crate::model::Value;

/// Runtime type identity of an array element or an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeRef {
    /// Universal placeholder; used when class identity is elided.
    #[default]
    Any,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    String,
    /// Array whose elements are of the inner type.
    Array(Box<TypeRef>),
    /// Registered class, by runtime class name.
    Class(String),
}

impl TypeRef {
    /// Creates a class type reference.
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(name.into())
    }

    /// Creates an array type reference around `element`.
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Returns the class name if this is a class reference.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeRef::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the element type if this is an array reference.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns whether `value` may be stored in an array of this element type.
    ///
    /// Primitive kinds admit exactly their own variant. Reference kinds also
    /// admit `Null`. A class admits its own instances and generic objects,
    /// since per-type configuration may have elided the class of an element.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Any, _) => true,
            (TypeRef::Bool, Value::Bool(_)) => true,
            (TypeRef::Int8, Value::Int8(_)) => true,
            (TypeRef::Int16, Value::Int16(_)) => true,
            (TypeRef::Int32, Value::Int32(_)) => true,
            (TypeRef::Int64, Value::Int64(_)) => true,
            (TypeRef::Float32, Value::Float32(_)) => true,
            (TypeRef::Float64, Value::Float64(_)) => true,
            (TypeRef::Char, Value::Char(_)) => true,
            (TypeRef::String, Value::String(_) | Value::Null) => true,
            (TypeRef::Array(_), Value::Array(_) | Value::Null) => true,
            (TypeRef::Class(name), Value::Object(obj)) => obj.class == *name,
            (TypeRef::Class(_), Value::Generic(_) | Value::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Any => f.write_str("any"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int8 => f.write_str("i8"),
            TypeRef::Int16 => f.write_str("i16"),
            TypeRef::Int32 => f.write_str("i32"),
            TypeRef::Int64 => f.write_str("i64"),
            TypeRef::Float32 => f.write_str("f32"),
            TypeRef::Float64 => f.write_str("f64"),
            TypeRef::Char => f.write_str("char"),
            TypeRef::String => f.write_str("string"),
            TypeRef::Array(inner) => write!(f, "{inner}[]"),
            TypeRef::Class(name) => f.write_str(name),
        }
    }
}
