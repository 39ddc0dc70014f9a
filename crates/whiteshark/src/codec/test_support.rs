//! Fixtures shared by the codec tests.

use proptest::prelude::*;

use crate::limits::{FORMAT_VERSION, MAGIC};
use crate::model::{Array, GenericObject, Object, TypeRef, Value};
use crate::schema::{ClassSchema, SchemaRegistry};

pub(crate) fn point_schema() -> ClassSchema {
    ClassSchema::new("Point")
        .with_version(1)
        .field("id", 0i32)
        .field("name", Value::Null)
}

pub(crate) fn point_registry() -> SchemaRegistry {
    SchemaRegistry::new().with(point_schema())
}

pub(crate) fn point_value(id: i32, name: &str) -> Value {
    Value::Object(Object::new("Point").with("id", id).with("name", name))
}

/// Stream with the given header fields, options zero, followed by `payload`.
pub(crate) fn with_header(identifier: &[u8; 4], version: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12 + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(identifier);
    bytes.extend_from_slice(&version.to_be_bytes());
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(payload);
    bytes
}

/// Encoded `Point { id: 7, name: "abc" }` under identifier `TEST`.
pub(crate) fn point_bytes() -> Vec<u8> {
    let mut payload = vec![0x18, 0x00, 0x05];
    payload.extend_from_slice(b"Point");
    payload.extend_from_slice(&[0, 0, 0, 1, 0x02]);
    payload.extend_from_slice(&[0x07, 0x02, b'i', b'd', 0x42, 0, 0, 0, 7]);
    payload.extend_from_slice(&[0x07, 0x04, b'n', b'a', b'm', b'e']);
    payload.extend_from_slice(&[0x15, 0x03, b'a', b'b', b'c']);
    with_header(b"TEST", FORMAT_VERSION, &payload)
}

/// Registry covering every class used by [`sample_values`].
pub(crate) fn bag_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(point_schema())
        .with(ClassSchema::new("Empty").with_version(2))
        .with(
            ClassSchema::new("Bag")
                .field("label", Value::Null)
                .as_map()
                .as_collection(),
        )
        .with(ClassSchema::new("Dict"))
        .with(ClassSchema::new("List"))
        .with(
            ClassSchema::new("Holder")
                .with_version(5)
                .map_field("attrs")
                .collection_field("list")
                .field("point", Value::Null),
        )
}

fn long_array(len: usize) -> Value {
    Value::Array(Array::of(TypeRef::Int8, (0..len).map(|i| i as i8)))
}

/// One value per round-trip scenario, labelled for assertion messages.
pub(crate) fn sample_values() -> Vec<(&'static str, Value)> {
    let mut samples = vec![
        ("null", Value::Null),
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("i8 min", Value::Int8(i8::MIN)),
        ("i8 max", Value::Int8(i8::MAX)),
        ("i16 min", Value::Int16(i16::MIN)),
        ("i16 max", Value::Int16(i16::MAX)),
        ("i32 min", Value::Int32(i32::MIN)),
        ("i32 max", Value::Int32(i32::MAX)),
        ("i64 min", Value::Int64(i64::MIN)),
        ("i64 max", Value::Int64(i64::MAX)),
        ("f32 nan", Value::Float32(f32::NAN)),
        ("f32 inf", Value::Float32(f32::INFINITY)),
        ("f64 nan", Value::Float64(f64::NAN)),
        ("f64 -inf", Value::Float64(f64::NEG_INFINITY)),
        ("f64 -0", Value::Float64(-0.0)),
        ("char", Value::Char(0x263A)),
        ("char max", Value::Char(u16::MAX)),
        ("empty string", Value::from("")),
        ("unicode string", Value::from("h\u{e9}llo \u{1F988} \u{6c34}")),
        ("string 126", Value::from("s".repeat(126))),
        ("string 127", Value::from("s".repeat(127))),
        ("string 32767", Value::from("s".repeat(32767))),
        (
            "nested arrays",
            Value::Array(Array::from_items(
                TypeRef::array_of(TypeRef::String),
                vec![
                    Value::Array(Array::of(TypeRef::String, ["a", "b"])),
                    Value::Null,
                    Value::Array(Array::new(TypeRef::String)),
                ],
            )),
        ),
        (
            "mixed array",
            Value::Array(Array::from_items(
                TypeRef::Any,
                vec![Value::Int8(1), Value::from("two"), Value::Float32(3.0), Value::Null],
            )),
        ),
        ("object no fields", Value::Object(Object::new("Empty"))),
        ("object", point_value(-1, "p")),
        (
            "object array",
            Value::Array(Array::from_items(
                TypeRef::class("Point"),
                vec![point_value(1, "a"), Value::Null, point_value(2, "b")],
            )),
        ),
        (
            "generic",
            Value::Generic(
                GenericObject::new()
                    .with("x", 1i64)
                    .with("y", Value::Null)
                    .with("nested", GenericObject::new().with("x", 2i64)),
            ),
        ),
        ("empty generic", Value::Generic(GenericObject::new())),
        (
            "map and collection",
            Value::Object(
                Object::new("Bag")
                    .with("label", "bag")
                    .with_entry("k1", 1i16)
                    .with_entry("k2", point_value(3, "c"))
                    .with_item("first")
                    .with_item(Value::Null)
                    .with_item(Value::Char(b'z' as u16)),
            ),
        ),
        (
            "field flags",
            Value::Object(
                Object::new("Holder")
                    .with("attrs", Object::new("Dict").with_entry("color", "red"))
                    .with("list", Object::new("List").with_item(1i32).with_item(2i32))
                    .with("point", point_value(4, "d")),
            ),
        ),
    ];
    for len in [0, 1, 126, 127, 32766, 32767, 32768] {
        samples.push(("array length", long_array(len)));
    }
    samples
}

/// Classes of every typed object in depth-first order.
pub(crate) fn object_classes(value: &Value) -> Vec<String> {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Array(array) => array.items.iter().for_each(|item| walk(item, out)),
            Value::Object(object) => {
                out.push(object.class.clone());
                object.fields.values().for_each(|v| walk(v, out));
                object.entries.values().for_each(|v| walk(v, out));
                object.items.iter().for_each(|v| walk(v, out));
            }
            Value::Generic(generic) => generic.iter().for_each(|(_, v)| walk(v, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

/// Arbitrary graphs that need no schemas: scalars, arrays and generics.
pub(crate) fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i8>().prop_map(Value::Int8),
        any::<i16>().prop_map(Value::Int16),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        any::<f32>().prop_map(Value::Float32),
        any::<f64>().prop_map(Value::Float64),
        any::<u16>().prop_map(Value::Char),
        ".{0,40}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(any::<i32>(), 0..300)
                .prop_map(|v| Value::Array(Array::of(TypeRef::Int32, v))),
            prop::collection::vec(inner.clone(), 0..8)
                .prop_map(|items| Value::Array(Array::from_items(TypeRef::Any, items))),
            prop::collection::vec(("[a-z_]{1,6}", inner), 0..6)
                .prop_map(|entries| Value::Generic(entries.into_iter().collect())),
        ]
    })
}
