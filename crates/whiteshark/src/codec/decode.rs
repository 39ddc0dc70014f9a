//! Decoding pieces shared by the immediate and progressive decoders.
//!
//! Both decoders read the same grammar and rebuild the dictionaries in the
//! same order; they only differ in how bytes reach them. Everything that
//! does not depend on the byte source lives here.

use std::io::Read;

use crate::codec::encode::IDENTITY_MAPPER;
use crate::codec::immediate::ImmediateDecoder;
use crate::codec::primitives::Reader;
use crate::codec::progressive::ProgressiveDecoder;
use crate::codec::tag::{IntWidth, Tag};
use crate::error::DecodeError;
use crate::limits::{
    COLLECTION_ITEM_PROPERTY, MAP_PROPERTY_PREFIX, MAX_DICT_SIZE, MAX_NAME_LEN, MAX_PREALLOC,
};
use crate::model::{Array, Dictionaries, DictionaryError, GenericObject, Object, TypeRef, Value};
use crate::schema::{resolve_external_type, ClassMapper, ClassSchema, FieldFlags, SchemaProvider};

// =============================================================================
// FACADE
// =============================================================================

/// Decodes streams against a schema provider and a class mapper.
#[derive(Clone, Copy)]
pub struct Deserializer<'s> {
    schemas: &'s dyn SchemaProvider,
    mapper: &'s dyn ClassMapper,
}

impl<'s> Deserializer<'s> {
    /// Creates a deserializer using the identity mapper.
    pub fn new(schemas: &'s dyn SchemaProvider) -> Self {
        Self {
            schemas,
            mapper: &IDENTITY_MAPPER,
        }
    }

    pub fn with_mapper(mut self, mapper: &'s dyn ClassMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Decodes a complete stream held in memory.
    pub fn deserialize(&self, identifier: &str, input: &[u8]) -> Result<Value, DecodeError> {
        ImmediateDecoder::new(self.schemas, self.mapper, identifier).decode(input)
    }

    /// Reads `source` to its end, then decodes the stream.
    pub fn deserialize_from<R: Read>(
        &self,
        identifier: &str,
        source: &mut R,
    ) -> Result<Value, DecodeError> {
        let mut input = Vec::new();
        source.read_to_end(&mut input)?;
        self.deserialize(identifier, &input)
    }

    /// Creates a progressive decoder for one stream.
    pub fn progressive(&self, identifier: &str) -> ProgressiveDecoder<'s> {
        ProgressiveDecoder::new(self.schemas, self.mapper, identifier)
    }
}

/// Decodes a complete stream with explicit collaborators.
pub fn deserialize(
    identifier: &str,
    input: &[u8],
    mapper: &dyn ClassMapper,
    schemas: &dyn SchemaProvider,
) -> Result<Value, DecodeError> {
    Deserializer::new(schemas)
        .with_mapper(mapper)
        .deserialize(identifier, input)
}

// =============================================================================
// SHARED STATE
// =============================================================================

/// Per-call decoder state: collaborators, dictionaries, stream options.
pub(crate) struct DecodeContext<'a> {
    schemas: &'a dyn SchemaProvider,
    mapper: &'a dyn ClassMapper,
    pub(crate) dicts: Dictionaries,
    /// Stream-wide objects-as-generics option.
    pub(crate) generics: bool,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(schemas: &'a dyn SchemaProvider, mapper: &'a dyn ClassMapper) -> Self {
        Self {
            schemas,
            mapper,
            dicts: Dictionaries::new(),
            generics: false,
        }
    }

    /// Resets the dictionaries and options for a new stream.
    pub(crate) fn reset(&mut self) {
        self.dicts.clear();
        self.generics = false;
    }

    /// Resolves a type name sent in full and records it.
    pub(crate) fn named_type(&mut self, name: &str) -> Result<TypeRef, DecodeError> {
        let ty = resolve_external_type(self.mapper, name).ok_or_else(|| {
            DecodeError::UnresolvedType {
                name: name.to_string(),
            }
        })?;
        self.dicts
            .classes
            .append(ty.clone())
            .map_err(|e| dictionary_error("class", e))?;
        Ok(ty)
    }

    /// Resolves a class dictionary back-reference.
    pub(crate) fn indexed_type(&self, index: u16) -> Result<TypeRef, DecodeError> {
        self.dicts
            .classes
            .get(index)
            .cloned()
            .ok_or(DecodeError::IndexOutOfBounds {
                dict: "class",
                index: usize::from(index),
                size: self.dicts.classes.len(),
            })
    }

    /// Resolves a class dictionary back-reference in object position.
    pub(crate) fn indexed_class(&self, index: u16) -> Result<TypeRef, DecodeError> {
        let ty = self.indexed_type(index)?;
        match ty {
            TypeRef::Class(_) => Ok(ty),
            _ => Err(DecodeError::NotAClass { index }),
        }
    }

    /// Records a property name sent in full.
    pub(crate) fn named_property(&mut self, name: String) -> Result<String, DecodeError> {
        self.dicts
            .properties
            .append(name.clone())
            .map_err(|e| dictionary_error("property", e))?;
        Ok(name)
    }

    /// Resolves a property dictionary back-reference.
    pub(crate) fn indexed_property(&self, index: u16) -> Result<String, DecodeError> {
        self.dicts
            .properties
            .get(index)
            .cloned()
            .ok_or(DecodeError::IndexOutOfBounds {
                dict: "property",
                index: usize::from(index),
                size: self.dicts.properties.len(),
            })
    }

    /// Starts an object of `class` with `field_count` properties.
    ///
    /// `None` means the object was sent as generics. `flags` come from the
    /// field holding the object, if any.
    pub(crate) fn open_object(
        &self,
        class: Option<&TypeRef>,
        field_count: usize,
        flags: FieldFlags,
    ) -> Result<ObjectBuilder<'a>, DecodeError> {
        let ty = match class {
            Some(ty) if !self.generics => ty,
            _ => {
                return Ok(ObjectBuilder::Generic(GenericObject::with_capacity(
                    field_count.min(MAX_PREALLOC),
                )));
            }
        };
        let TypeRef::Class(name) = ty else {
            return Err(DecodeError::UnresolvedType {
                name: ty.to_string(),
            });
        };
        let schemas = self.schemas;
        let schema = schemas
            .class_schema(name)
            .ok_or_else(|| DecodeError::UnresolvedType { name: name.clone() })?;
        let config = schema.config();
        Ok(ObjectBuilder::Typed {
            object: schema.instantiate(),
            schema,
            as_map: config.as_map || flags.as_map,
            as_collection: config.as_collection || flags.as_collection,
        })
    }
}

fn dictionary_error(dict: &'static str, err: DictionaryError) -> DecodeError {
    match err {
        DictionaryError::Duplicate { index } => DecodeError::DuplicateDictionaryEntry { dict, index },
        DictionaryError::Full => DecodeError::LengthExceedsLimit {
            field: if dict == "class" {
                "class dictionary"
            } else {
                "property dictionary"
            },
            len: MAX_DICT_SIZE + 1,
            max: MAX_DICT_SIZE,
        },
    }
}

/// Validates the length of a class, type or property name.
pub(crate) fn check_name_len(len: usize, field: &'static str) -> Result<usize, DecodeError> {
    if len > MAX_NAME_LEN {
        return Err(DecodeError::LengthExceedsLimit {
            field,
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(len)
}

/// Payload size of a fixed-width scalar tag.
pub(crate) fn scalar_len(tag: Tag) -> usize {
    match tag {
        Tag::Integer(width) => width.byte_count(),
        Tag::Real { double: true } => 8,
        Tag::Real { double: false } => 4,
        Tag::Char => 2,
        _ => 0,
    }
}

/// Reads the payload of a fixed-width scalar tag.
pub(crate) fn read_scalar(tag: Tag, reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
    let value = match tag {
        Tag::Integer(IntWidth::One) => Value::Int8(reader.read_i8("i8")?),
        Tag::Integer(IntWidth::Two) => Value::Int16(reader.read_i16("i16")?),
        Tag::Integer(IntWidth::Four) => Value::Int32(reader.read_i32("i32")?),
        Tag::Integer(IntWidth::Eight) => Value::Int64(reader.read_i64("i64")?),
        Tag::Real { double: false } => Value::Float32(reader.read_f32("f32")?),
        Tag::Real { double: true } => Value::Float64(reader.read_f64("f64")?),
        Tag::Char => Value::Char(reader.read_u16("char")?),
        other => return Err(DecodeError::InvalidTag { tag: other.to_byte() }),
    };
    Ok(value)
}

// =============================================================================
// BUILDERS
// =============================================================================

/// An object whose properties are still arriving.
#[derive(Debug)]
pub(crate) enum ObjectBuilder<'a> {
    Typed {
        object: Object,
        schema: &'a ClassSchema,
        as_map: bool,
        as_collection: bool,
    },
    Generic(GenericObject),
}

impl ObjectBuilder<'_> {
    /// Flags applying to the value of property `name`.
    pub(crate) fn field_flags(&self, name: &str) -> FieldFlags {
        match self {
            ObjectBuilder::Typed { schema, .. } => schema
                .field_named(name)
                .map(|field| field.flags())
                .unwrap_or_default(),
            ObjectBuilder::Generic(_) => FieldFlags::default(),
        }
    }

    /// Stores a decoded property.
    ///
    /// Typed objects try the schema slot first, then map entries, then
    /// collection items; a name matching none of them is fatal.
    pub(crate) fn set(&mut self, name: String, value: Value) -> Result<(), DecodeError> {
        match self {
            ObjectBuilder::Generic(generic) => {
                generic.insert(name, value);
                Ok(())
            }
            ObjectBuilder::Typed {
                object,
                schema,
                as_map,
                as_collection,
            } => {
                if let Some(field) = schema.field_named(&name) {
                    field.write(object, value);
                } else if let Some(key) = name
                    .strip_prefix(MAP_PROPERTY_PREFIX)
                    .filter(|_| *as_map)
                {
                    object.entries.insert(key.to_string(), value);
                } else if *as_collection && name == COLLECTION_ITEM_PROPERTY {
                    object.items.push(value);
                } else {
                    return Err(DecodeError::NoSuchField {
                        class: object.class.clone(),
                        field: name,
                    });
                }
                Ok(())
            }
        }
    }

    pub(crate) fn finish(self) -> Value {
        match self {
            ObjectBuilder::Typed { object, .. } => Value::Object(object),
            ObjectBuilder::Generic(generic) => Value::Generic(generic),
        }
    }
}

/// An array whose elements are still arriving.
#[derive(Debug)]
pub(crate) struct ArrayBuilder {
    element_type: TypeRef,
    items: Vec<Value>,
    len: usize,
}

impl ArrayBuilder {
    pub(crate) fn new(element_type: TypeRef, len: usize) -> Self {
        Self {
            element_type,
            items: Vec::with_capacity(len.min(MAX_PREALLOC)),
            len,
        }
    }

    /// Appends the next element, checking it against the element type.
    pub(crate) fn push(&mut self, value: Value) -> Result<(), DecodeError> {
        if !self.element_type.admits(&value) {
            return Err(DecodeError::ElementTypeMismatch {
                index: self.items.len(),
            });
        }
        self.items.push(value);
        Ok(())
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.items.len() >= self.len
    }

    pub(crate) fn finish(self) -> Value {
        Value::Array(Array::from_items(self.element_type, self.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode::Serializer;
    use crate::codec::header::Options;
    use crate::codec::test_support::{
        bag_registry, object_classes, point_registry, point_value, sample_values,
    };
    use crate::error::ErrorKind;
    use crate::schema::{AliasMapper, ClassSchema, IdentityMapper, SchemaRegistry};

    #[test]
    fn test_roundtrip_every_sample() {
        let registry = bag_registry();
        let serializer = Serializer::new(&registry);
        let deserializer = Deserializer::new(&registry);
        for (label, value) in sample_values() {
            let bytes = serializer.to_vec("TEST", &value).unwrap();
            let decoded = deserializer.deserialize("TEST", &bytes).unwrap();
            assert_eq!(decoded, value, "sample {label}");
        }
    }

    #[test]
    fn test_roundtrip_through_alias_mapper() {
        let registry = point_registry();
        let mapper = AliasMapper::new().alias("Point", "geo.Pt");
        let value = Value::Array(Array::from_items(
            TypeRef::class("Point"),
            vec![point_value(1, "a"), point_value(2, "b")],
        ));
        let bytes = Serializer::new(&registry)
            .with_mapper(&mapper)
            .to_vec("TEST", &value)
            .unwrap();
        assert!(bytes.windows(6).any(|w| w == b"geo.Pt"));
        assert!(!bytes.windows(5).any(|w| w == b"Point"));

        let decoded = deserialize("TEST", &bytes, &mapper, &registry).unwrap();
        assert_eq!(decoded, value);

        // Identity mapping cannot resolve the aliased name.
        let err = deserialize("TEST", &bytes, &IdentityMapper, &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedType);
    }

    #[test]
    fn test_deserialize_from_reader() {
        let registry = point_registry();
        let bytes = Serializer::new(&registry)
            .to_vec("TEST", &point_value(7, "abc"))
            .unwrap();
        let mut source = bytes.as_slice();
        let value = Deserializer::new(&registry)
            .deserialize_from("TEST", &mut source)
            .unwrap();
        assert_eq!(value, point_value(7, "abc"));
    }

    #[test]
    fn test_dictionary_determinism() {
        let registry = SchemaRegistry::new()
            .with(ClassSchema::new("A").with_version(1))
            .with(ClassSchema::new("B").with_version(1))
            .with(ClassSchema::new("C").with_version(1));
        let root: GenericObject = [
            ("first", Object::new("A")),
            ("second", Object::new("B")),
            ("third", Object::new("A")),
            ("fourth", Object::new("C")),
        ]
        .into_iter()
        .collect();
        let bytes = Serializer::new(&registry)
            .to_vec("TEST", &Value::Generic(root.clone()))
            .unwrap();

        let mut decoder = ImmediateDecoder::new(&registry, &IdentityMapper, "TEST");
        let (decoded, dicts) = decoder.decode_with_dictionaries(&bytes).unwrap();
        assert_eq!(decoded, Value::Generic(root));
        assert_eq!(
            dicts.classes.entries(),
            [TypeRef::class("A"), TypeRef::class("B"), TypeRef::class("C")]
        );

        assert_eq!(object_classes(&decoded), ["A", "B", "A", "C"]);
        // "A" by name costs 2 + 1 + 4 bytes; by index, 2.
        let full_a = [0x08, 0x00, 0x01, b'A', 0, 0, 0, 1];
        let ref_a = [0x48, 0x00, 0x00];
        assert_eq!(bytes.windows(full_a.len()).filter(|w| *w == full_a).count(), 1);
        assert_eq!(bytes.windows(ref_a.len()).filter(|w| *w == ref_a).count(), 1);
    }

    #[test]
    fn test_generic_keeps_property_order() {
        let registry = SchemaRegistry::new();
        let value = Value::Generic(
            GenericObject::new()
                .with("zeta", 1i8)
                .with("alpha", 2i8)
                .with("mid", GenericObject::new().with("y", 3i8).with("x", 4i8)),
        );
        let bytes = Serializer::new(&registry).to_vec("TEST", &value).unwrap();

        let decoded = Deserializer::new(&registry).deserialize("TEST", &bytes).unwrap();
        let root = decoded.as_generic().unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
        let mid = root.get("mid").and_then(Value::as_generic).unwrap();
        assert_eq!(mid.keys().collect::<Vec<_>>(), ["y", "x"]);

        let mut decoder = Deserializer::new(&registry).progressive("TEST");
        for byte in &bytes {
            decoder.feed(std::slice::from_ref(byte)).unwrap();
        }
        let progressive = decoder.finish().unwrap();
        let keys: Vec<_> = progressive.as_generic().unwrap().keys().map(str::to_owned).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_partially_set_object_decodes_completed() {
        let registry = point_registry();
        let partial = Value::Object(Object::new("Point").with("id", 7));
        let bytes = Serializer::new(&registry).to_vec("TEST", &partial).unwrap();
        let decoded = Deserializer::new(&registry).deserialize("TEST", &bytes).unwrap();

        let mut completed = partial.clone();
        registry.complete_slots(&mut completed);
        let expected = Object::new("Point").with("id", 7).with("name", Value::Null);
        assert_eq!(completed, Value::Object(expected));
        assert_eq!(decoded, completed);

        // Built from the schema, the same object round-trips unchanged.
        let mut instance = registry.instantiate("Point").unwrap();
        instance.set("id", 7);
        let bytes = Serializer::new(&registry)
            .to_vec("TEST", &Value::Object(instance.clone()))
            .unwrap();
        let decoded = Deserializer::new(&registry).deserialize("TEST", &bytes).unwrap();
        assert_eq!(decoded, Value::Object(instance));
    }

    #[test]
    fn test_objects_as_generics_decodes_generic() {
        let registry = point_registry();
        let bytes = Serializer::new(&registry)
            .with_options(Options::new().with_objects_as_generics(true))
            .to_vec("TEST", &point_value(7, "abc"))
            .unwrap();
        let decoded = Deserializer::new(&registry).deserialize("TEST", &bytes).unwrap();
        let expected = GenericObject::new().with("id", 7i32).with("name", "abc");
        assert_eq!(decoded, Value::Generic(expected));
    }

    #[test]
    fn test_generic_class_decodes_generic() {
        let registry = point_registry().with(
            ClassSchema::new("Hidden")
                .field("secret", 0i32)
                .as_generics(),
        );
        let value = Value::Object(
            Object::new("Point")
                .with("id", 1)
                .with("name", Object::new("Hidden").with("secret", 42)),
        );
        let bytes = Serializer::new(&registry).to_vec("TEST", &value).unwrap();
        assert!(!bytes.windows(6).any(|w| w == b"Hidden"));

        let decoded = Deserializer::new(&registry).deserialize("TEST", &bytes).unwrap();
        let expected = Value::Object(
            Object::new("Point")
                .with("id", 1)
                .with("name", GenericObject::new().with("secret", 42i32)),
        );
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_builder_rejects_unknown_property() {
        let registry = point_registry();
        let ctx = DecodeContext::new(&registry, &IdentityMapper);
        let class = TypeRef::class("Point");
        let mut builder = ctx.open_object(Some(&class), 1, FieldFlags::default()).unwrap();
        let err = builder.set("color".to_string(), Value::Null).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NoSuchField { ref class, ref field } if class == "Point" && field == "color"
        ));
        // Map and collection names are only accepted when configured.
        let err = builder.set("__map:k".to_string(), Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchField);
        let err = builder.set("__item".to_string(), Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchField);
    }

    #[test]
    fn test_builder_routes_map_and_collection() {
        let registry = point_registry();
        let ctx = DecodeContext::new(&registry, &IdentityMapper);
        let class = TypeRef::class("Point");
        let flags = FieldFlags {
            as_map: true,
            as_collection: true,
        };
        let mut builder = ctx.open_object(Some(&class), 3, flags).unwrap();
        builder.set("id".to_string(), Value::Int32(4)).unwrap();
        builder.set("__map:k".to_string(), Value::Bool(true)).unwrap();
        builder.set("__item".to_string(), Value::Int8(1)).unwrap();
        let Value::Object(object) = builder.finish() else {
            panic!("expected a typed object");
        };
        assert_eq!(object.get("id"), Some(&Value::Int32(4)));
        assert_eq!(object.get("name"), Some(&Value::Null));
        assert_eq!(object.entries.get("k"), Some(&Value::Bool(true)));
        assert_eq!(object.items, [Value::Int8(1)]);
    }

    #[test]
    fn test_dictionary_reconstruction_errors() {
        let registry = point_registry();
        let mut ctx = DecodeContext::new(&registry, &IdentityMapper);
        assert_eq!(ctx.named_type("i32[]").unwrap(), TypeRef::array_of(TypeRef::Int32));
        assert!(matches!(
            ctx.named_type("i32[]"),
            Err(DecodeError::DuplicateDictionaryEntry { dict: "class", index: 0 })
        ));
        assert!(matches!(ctx.indexed_class(0), Err(DecodeError::NotAClass { index: 0 })));
        assert!(matches!(
            ctx.indexed_type(1),
            Err(DecodeError::IndexOutOfBounds { dict: "class", index: 1, size: 1 })
        ));

        ctx.named_property("x".to_string()).unwrap();
        assert_eq!(ctx.indexed_property(0).unwrap(), "x");
        assert!(matches!(
            ctx.named_property("x".to_string()),
            Err(DecodeError::DuplicateDictionaryEntry { dict: "property", index: 0 })
        ));

        ctx.reset();
        assert!(ctx.dicts.classes.is_empty());
        assert!(ctx.indexed_property(0).is_err());
    }

    #[test]
    fn test_array_builder_checks_elements() {
        let mut builder = ArrayBuilder::new(TypeRef::Int16, 2);
        builder.push(Value::Int16(1)).unwrap();
        assert!(!builder.is_complete());
        assert!(matches!(
            builder.push(Value::Int32(2)),
            Err(DecodeError::ElementTypeMismatch { index: 1 })
        ));
        builder.push(Value::Int16(2)).unwrap();
        assert!(builder.is_complete());
        assert_eq!(builder.finish(), Value::Array(Array::of(TypeRef::Int16, [1i16, 2])));
    }
}
