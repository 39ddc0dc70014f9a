//! Value graph for WhiteShark streams.
//!
//! Values are what the encoder walks and what both decoders produce.

use indexmap::IndexMap;

use crate::model::{GenericObject, TypeRef};

/// A node of a WhiteShark object graph.
///
/// Integer and real variants keep their declared width: the encoder picks
/// the wire width from the variant, never from the magnitude.
///
/// Equality compares floats by bit pattern, so `NaN` equals an identical
/// `NaN` and `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// A 2-byte code unit.
    Char(u16),
    String(String),
    Array(Array),
    /// Instance of a registered class.
    Object(Object),
    /// Untyped, ordered property bag.
    Generic(GenericObject),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns any integer variant widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any real variant widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_generic(&self) -> Option<&GenericObject> {
        match self {
            Value::Generic(g) => Some(g),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int8(_) => "i8",
            Value::Int16(_) => "i16",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Float32(_) => "f32",
            Value::Float64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Generic(_) => "generic",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Generic(a), Value::Generic(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<GenericObject> for Value {
    fn from(v: GenericObject) -> Self {
        Value::Generic(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A homogeneous array with a declared element type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    /// Declared element type; every item must be admitted by it.
    pub element_type: TypeRef,
    /// Items in index order.
    pub items: Vec<Value>,
}

impl Array {
    /// Creates an empty array of the given element type.
    pub fn new(element_type: TypeRef) -> Self {
        Self {
            element_type,
            items: Vec::new(),
        }
    }

    /// Creates an array from existing items.
    pub fn from_items(element_type: TypeRef, items: Vec<Value>) -> Self {
        Self { element_type, items }
    }

    /// Creates an array by converting each item.
    pub fn of<T: Into<Value>>(element_type: TypeRef, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            element_type,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }
}

/// An instance of a registered class.
///
/// `fields` holds the named slots. `entries` and `items` hold map and
/// collection content; they are serialized only when the class, or the
/// field holding this object, is configured for it.
///
/// An unset slot is written as its schema default, and decoded objects have
/// every slot set. Build instances with `ClassSchema::instantiate`, or
/// complete them with `SchemaProvider::complete_slots`, to compare them
/// with decoded values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    /// Runtime class name, as known to the schema provider.
    pub class: String,
    pub fields: IndexMap<String, Value>,
    pub entries: IndexMap<String, Value>,
    pub items: Vec<Value>,
}

impl Object {
    /// Creates an object with no slots set.
    ///
    /// Unset slots read as their schema default.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
            entries: IndexMap::new(),
            items: Vec::new(),
        }
    }

    /// Sets a slot, returning the object for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds a map entry, returning the object for chaining.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Appends a collection item, returning the object for chaining.
    pub fn with_item(mut self, value: impl Into<Value>) -> Self {
        self.items.push(value.into());
        self
    }

    /// Returns a slot value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a slot value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
        assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_eq!(Value::Float32(f32::INFINITY), Value::Float32(f32::INFINITY));
    }

    #[test]
    fn test_width_is_part_of_identity() {
        assert_ne!(Value::Int32(7), Value::Int64(7));
        assert_eq!(Value::Int16(7).as_i64(), Value::Int64(7).as_i64());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from("abc"), Value::String("abc".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i8)), Value::Int8(3));
        assert_eq!(Value::from(1.5f32).as_f64(), Some(1.5));
    }

    #[test]
    fn test_object_slots_compare_as_map() {
        let a = Object::new("Point").with("x", 1).with("y", 2);
        let b = Object::new("Point").with("y", 2).with("x", 1);
        assert_eq!(a, b);
        assert_eq!(a.get("x"), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_array_helpers() {
        let mut arr = Array::of(TypeRef::Int32, [1, 2]);
        arr.push(3);
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.items[2], Value::Int32(3));
    }
}
