//! Encoder: walks a value graph depth-first and writes the stream.

use std::io::Write;

use tracing::{debug, instrument};

use crate::codec::header::{Header, Options};
use crate::codec::primitives::Writer;
use crate::codec::tag::{IntWidth, LengthWidth, ObjectClass, PropertyName, Tag};
use crate::error::EncodeError;
use crate::limits::{
    COLLECTION_ITEM_PROPERTY, MAP_PROPERTY_PREFIX, MAX_DEPTH, MAX_LENGTH, MAX_NAME_LEN,
    SHORT_NAME_LIMIT,
};
use crate::model::{Array, Dictionaries, GenericObject, Object, TypeRef, Value};
use crate::schema::{external_type_name, ClassMapper, FieldFlags, IdentityMapper, SchemaProvider};

pub(crate) static IDENTITY_MAPPER: IdentityMapper = IdentityMapper;

/// Encodes value graphs against a schema provider and a class mapper.
///
/// A serializer holds no per-call state; every call builds its own
/// dictionaries, so one serializer may be shared freely.
#[derive(Clone, Copy)]
pub struct Serializer<'s> {
    schemas: &'s dyn SchemaProvider,
    mapper: &'s dyn ClassMapper,
    options: Options,
}

impl<'s> Serializer<'s> {
    /// Creates a serializer using [`IdentityMapper`] and default options.
    pub fn new(schemas: &'s dyn SchemaProvider) -> Self {
        Self {
            schemas,
            mapper: &IDENTITY_MAPPER,
            options: Options::default(),
        }
    }

    pub fn with_mapper(mut self, mapper: &'s dyn ClassMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Encodes `value` into a new buffer, header included.
    #[instrument(skip_all, name = "whiteshark::serialize")]
    pub fn to_vec(&self, identifier: &str, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = Encoder {
            schemas: self.schemas,
            mapper: self.mapper,
            generics: self.options.objects_as_generics,
            dicts: Dictionaries::new(),
            writer: Writer::with_capacity(256),
            depth: 0,
        };
        Header::new(identifier, self.options).encode(&mut encoder.writer);
        encoder.encode_value(value, FieldFlags::default())?;

        debug!(
            bytes = encoder.writer.len(),
            classes = encoder.dicts.classes.len(),
            properties = encoder.dicts.properties.len(),
            "encoded stream"
        );
        Ok(encoder.writer.into_bytes())
    }

    /// Encodes `value` and writes the whole stream to `sink`.
    ///
    /// Nothing is written if encoding fails.
    pub fn serialize<W: Write>(
        &self,
        identifier: &str,
        sink: &mut W,
        value: &Value,
    ) -> Result<(), EncodeError> {
        let bytes = self.to_vec(identifier, value)?;
        sink.write_all(&bytes)?;
        Ok(())
    }
}

/// Encodes `value` to `sink` with explicit collaborators.
pub fn serialize<W: Write>(
    identifier: &str,
    sink: &mut W,
    value: &Value,
    options: Options,
    mapper: &dyn ClassMapper,
    schemas: &dyn SchemaProvider,
) -> Result<(), EncodeError> {
    Serializer::new(schemas)
        .with_mapper(mapper)
        .with_options(options)
        .serialize(identifier, sink, value)
}

/// Identity of a class or element type at one point of the stream.
enum Identity {
    Indexed(u16),
    Named(String),
}

/// Per-call encoder context.
struct Encoder<'a> {
    schemas: &'a dyn SchemaProvider,
    mapper: &'a dyn ClassMapper,
    generics: bool,
    dicts: Dictionaries,
    writer: Writer,
    depth: usize,
}

impl Encoder<'_> {
    fn encode_value(&mut self, value: &Value, flags: FieldFlags) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.writer.write_byte(Tag::Null.to_byte()),
            Value::Bool(b) => self.writer.write_byte(Tag::Bool(*b).to_byte()),
            Value::Int8(v) => {
                self.writer.write_byte(Tag::Integer(IntWidth::One).to_byte());
                self.writer.write_i8(*v);
            }
            Value::Int16(v) => {
                self.writer.write_byte(Tag::Integer(IntWidth::Two).to_byte());
                self.writer.write_i16(*v);
            }
            Value::Int32(v) => {
                self.writer.write_byte(Tag::Integer(IntWidth::Four).to_byte());
                self.writer.write_i32(*v);
            }
            Value::Int64(v) => {
                self.writer.write_byte(Tag::Integer(IntWidth::Eight).to_byte());
                self.writer.write_i64(*v);
            }
            Value::Float32(v) => {
                self.writer.write_byte(Tag::Real { double: false }.to_byte());
                self.writer.write_f32(*v);
            }
            Value::Float64(v) => {
                self.writer.write_byte(Tag::Real { double: true }.to_byte());
                self.writer.write_f64(*v);
            }
            Value::Char(c) => {
                self.writer.write_byte(Tag::Char.to_byte());
                self.writer.write_u16(*c);
            }
            Value::String(s) => self.encode_string(s)?,
            Value::Array(array) => self.encode_array(array)?,
            Value::Object(object) => self.encode_object(object, flags)?,
            Value::Generic(generic) => self.encode_generic(generic)?,
        }
        Ok(())
    }

    fn encode_string(&mut self, s: &str) -> Result<(), EncodeError> {
        let len = s.len();
        check_length("string", len, MAX_LENGTH)?;
        let width = LengthWidth::for_string_length(len);
        self.writer.write_byte(Tag::String(width).to_byte());
        self.writer.write_length(width, len);
        self.writer.write_bytes(s.as_bytes());
        Ok(())
    }

    fn encode_array(&mut self, array: &Array) -> Result<(), EncodeError> {
        if let Some(index) = array
            .items
            .iter()
            .position(|item| !array.element_type.admits(item))
        {
            return Err(EncodeError::ElementTypeMismatch { index });
        }
        check_length("array", array.len(), MAX_LENGTH)?;

        self.enter()?;
        let element_type = self.collapse(&array.element_type);
        let identity = self.identity_of(&element_type)?;
        let count = LengthWidth::for_length(array.len());
        self.writer.write_byte(
            Tag::Array {
                count,
                type_in_dict: matches!(identity, Identity::Indexed(_)),
            }
            .to_byte(),
        );
        self.write_identity(identity, None);
        self.writer.write_length(count, array.len());

        for item in &array.items {
            self.encode_value(item, FieldFlags::default())?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn encode_object(&mut self, object: &Object, flags: FieldFlags) -> Result<(), EncodeError> {
        let schemas = self.schemas;
        let schema = schemas
            .class_schema(&object.class)
            .ok_or_else(|| EncodeError::UnresolvedType {
                name: object.class.clone(),
            })?;
        let config = schema.config();
        let as_map = config.as_map || flags.as_map;
        let as_collection = config.as_collection || flags.as_collection;

        let mut field_count = schema.fields().len();
        if as_map {
            field_count += object.entries.len();
        }
        if as_collection {
            field_count += object.items.len();
        }
        check_length("field count", field_count, MAX_LENGTH)?;

        self.enter()?;
        let count = LengthWidth::for_length(field_count);
        if self.generics || config.force_generics {
            self.writer.write_byte(
                Tag::Object {
                    count,
                    class: ObjectClass::Generic,
                }
                .to_byte(),
            );
        } else {
            let identity = self.identity_of(&TypeRef::class(object.class.as_str()))?;
            let class = match identity {
                Identity::Indexed(_) => ObjectClass::Indexed,
                Identity::Named(_) => ObjectClass::Named,
            };
            self.writer.write_byte(Tag::Object { count, class }.to_byte());
            self.write_identity(identity, Some(schema.version()));
        }
        self.writer.write_length(count, field_count);

        for field in schema.fields() {
            self.encode_property(field.name(), field.read(object), field.flags())?;
        }
        if as_map {
            for (key, value) in &object.entries {
                let name = format!("{MAP_PROPERTY_PREFIX}{key}");
                self.encode_property(&name, value, FieldFlags::default())?;
            }
        }
        if as_collection {
            for item in &object.items {
                self.encode_property(COLLECTION_ITEM_PROPERTY, item, FieldFlags::default())?;
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn encode_generic(&mut self, generic: &GenericObject) -> Result<(), EncodeError> {
        check_length("field count", generic.len(), MAX_LENGTH)?;

        self.enter()?;
        let count = LengthWidth::for_length(generic.len());
        self.writer.write_byte(
            Tag::Object {
                count,
                class: ObjectClass::Generic,
            }
            .to_byte(),
        );
        self.writer.write_length(count, generic.len());
        for (name, value) in generic {
            self.encode_property(name, value, FieldFlags::default())?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn encode_property(
        &mut self,
        name: &str,
        value: &Value,
        flags: FieldFlags,
    ) -> Result<(), EncodeError> {
        if let Some(index) = self.dicts.properties.index_of(name) {
            self.writer
                .write_byte(Tag::Property(PropertyName::Indexed).to_byte());
            self.writer.write_u16(index);
        } else {
            let len = name.len();
            check_length("property name", len, MAX_NAME_LEN)?;
            self.dicts
                .properties
                .resolve(name)
                .map_err(|_| EncodeError::DictionaryOverflow { dict: "property" })?;
            if len < SHORT_NAME_LIMIT {
                self.writer
                    .write_byte(Tag::Property(PropertyName::Short).to_byte());
                self.writer.write_byte(len as u8);
            } else {
                self.writer
                    .write_byte(Tag::Property(PropertyName::Long).to_byte());
                self.writer.write_u16(len as u16);
            }
            self.writer.write_bytes(name.as_bytes());
        }
        self.encode_value(value, flags)
    }

    /// Element type as written: classes whose identity is elided become
    /// the universal placeholder, at any array depth.
    fn collapse(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Class(class)
                if self.generics || self.schemas.class_config(class).force_generics =>
            {
                TypeRef::Any
            }
            TypeRef::Array(inner) => TypeRef::array_of(self.collapse(inner)),
            _ => ty.clone(),
        }
    }

    /// Looks up `ty` in the class dictionary, recording it if new.
    fn identity_of(&mut self, ty: &TypeRef) -> Result<Identity, EncodeError> {
        if let Some(index) = self.dicts.classes.index_of(ty) {
            return Ok(Identity::Indexed(index));
        }
        let name = external_type_name(self.mapper, ty).ok_or_else(|| {
            EncodeError::UnresolvedType {
                name: ty.to_string(),
            }
        })?;
        check_length("class name", name.len(), MAX_NAME_LEN)?;
        self.dicts
            .classes
            .resolve(ty)
            .map_err(|_| EncodeError::DictionaryOverflow { dict: "class" })?;
        Ok(Identity::Named(name))
    }

    fn write_identity(&mut self, identity: Identity, version: Option<i32>) {
        match identity {
            Identity::Indexed(index) => self.writer.write_u16(index),
            Identity::Named(name) => {
                self.writer.write_u16(name.len() as u16);
                self.writer.write_bytes(name.as_bytes());
                if let Some(version) = version {
                    self.writer.write_i32(version);
                }
            }
        }
    }

    fn enter(&mut self) -> Result<(), EncodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(EncodeError::DepthLimitExceeded { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }
}

fn check_length(field: &'static str, len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}
