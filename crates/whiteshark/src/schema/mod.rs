//! Schema provider: which slots of a class are serialized, and how.
//!
//! There is no runtime introspection. Each class is described once by a
//! [`ClassSchema`] listing its serializable fields in wire order, its
//! serialization version and its per-type configuration.

pub mod mapper;

use rustc_hash::FxHashMap;

use crate::model::{Object, Value};

pub use mapper::{
    external_type_name, resolve_external_type, AliasMapper, ClassMapper, IdentityMapper,
    ANY_TYPE_NAME,
};

/// Per-field serialization flags.
///
/// They apply to the object stored in the field, on top of that object's
/// own class configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    /// Serialize the nested object's map entries.
    pub as_map: bool,
    /// Serialize the nested object's collection items.
    pub as_collection: bool,
}

/// Per-class serialization configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassConfig {
    /// Always elide class identity for instances of this class.
    pub force_generics: bool,
    /// Append map entries as synthetic properties.
    pub as_map: bool,
    /// Append collection items as synthetic properties.
    pub as_collection: bool,
}

/// A serializable slot of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    name: String,
    default: Value,
    flags: FieldFlags,
}

impl FieldSchema {
    /// Creates a field with a default value.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            flags: FieldFlags::default(),
        }
    }

    /// Sets the per-field flags.
    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value a freshly constructed instance holds in this slot.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Reads this slot from `object`, falling back to the default.
    pub fn read<'a>(&'a self, object: &'a Object) -> &'a Value {
        object.fields.get(&self.name).unwrap_or(&self.default)
    }

    /// Writes this slot on `object`.
    pub fn write(&self, object: &mut Object, value: Value) {
        object.fields.insert(self.name.clone(), value);
    }
}

/// Description of one class.
#[derive(Debug, Clone)]
pub struct ClassSchema {
    name: String,
    version: i32,
    fields: Vec<FieldSchema>,
    field_indices: FxHashMap<String, usize>,
    config: ClassConfig,
}

impl ClassSchema {
    /// Creates a schema for the runtime class `name`, version 0, no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            fields: Vec::new(),
            field_indices: FxHashMap::default(),
            config: ClassConfig::default(),
        }
    }

    /// Sets the serialization version written with the first occurrence.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Appends a field description.
    ///
    /// Declaring the same name twice replaces the earlier declaration but
    /// keeps its position.
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        match self.field_indices.get(field.name()) {
            Some(&idx) => self.fields[idx] = field,
            None => {
                self.field_indices.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
        self
    }

    /// Appends a plain field.
    pub fn field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.with_field(FieldSchema::new(name, default))
    }

    /// Appends a field whose object is serialized with its map entries.
    pub fn map_field(self, name: impl Into<String>) -> Self {
        self.with_field(FieldSchema::new(name, Value::Null).with_flags(FieldFlags {
            as_map: true,
            as_collection: false,
        }))
    }

    /// Appends a field whose object is serialized with its collection items.
    pub fn collection_field(self, name: impl Into<String>) -> Self {
        self.with_field(FieldSchema::new(name, Value::Null).with_flags(FieldFlags {
            as_map: false,
            as_collection: true,
        }))
    }

    /// Elides class identity for every instance.
    pub fn as_generics(mut self) -> Self {
        self.config.force_generics = true;
        self
    }

    /// Serializes map entries of every instance.
    pub fn as_map(mut self) -> Self {
        self.config.as_map = true;
        self
    }

    /// Serializes collection items of every instance.
    pub fn as_collection(mut self) -> Self {
        self.config.as_collection = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Serializable fields in wire order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field_named(&self, name: &str) -> Option<&FieldSchema> {
        self.field_indices.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn config(&self) -> ClassConfig {
        self.config
    }

    /// Constructs a fresh instance with every slot at its default.
    pub fn instantiate(&self) -> Object {
        let mut object = Object::new(self.name.clone());
        object.fields.reserve(self.fields.len());
        for field in &self.fields {
            object
                .fields
                .insert(field.name.clone(), field.default.clone());
        }
        object
    }

    /// Sets every unset slot of `object` to its default.
    pub fn complete(&self, object: &mut Object) {
        for field in &self.fields {
            object
                .fields
                .entry(field.name.clone())
                .or_insert_with(|| field.default.clone());
        }
    }
}

/// Source of class descriptions for the encoder and decoders.
pub trait SchemaProvider {
    /// Returns the schema of the runtime class `class`.
    fn class_schema(&self, class: &str) -> Option<&ClassSchema>;

    /// Serializable fields of `class`, in wire order.
    fn serializable_fields(&self, class: &str) -> Option<&[FieldSchema]> {
        self.class_schema(class).map(ClassSchema::fields)
    }

    /// Serialization version of `class`.
    fn serialization_version(&self, class: &str) -> Option<i32> {
        self.class_schema(class).map(ClassSchema::version)
    }

    /// Configuration of `class`; unknown classes get the default.
    fn class_config(&self, class: &str) -> ClassConfig {
        self.class_schema(class)
            .map(ClassSchema::config)
            .unwrap_or_default()
    }

    /// Sets every unset slot of every registered object in `value` to its
    /// default.
    ///
    /// This is the form decoding produces: the encoder writes unset slots
    /// as their defaults and the decoder stores them.
    fn complete_slots(&self, value: &mut Value) {
        match value {
            Value::Array(array) => array
                .items
                .iter_mut()
                .for_each(|item| self.complete_slots(item)),
            Value::Object(object) => {
                if let Some(schema) = self.class_schema(&object.class) {
                    schema.complete(object);
                }
                object
                    .fields
                    .values_mut()
                    .chain(object.entries.values_mut())
                    .chain(object.items.iter_mut())
                    .for_each(|item| self.complete_slots(item));
            }
            Value::Generic(generic) => generic
                .values_mut()
                .for_each(|item| self.complete_slots(item)),
            _ => {}
        }
    }
}

/// In-memory schema provider, filled once at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    classes: FxHashMap<String, ClassSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous one of the same name.
    pub fn register(&mut self, schema: ClassSchema) -> &mut Self {
        self.classes.insert(schema.name.clone(), schema);
        self
    }

    /// Registers a schema, returning the registry for chaining.
    pub fn with(mut self, schema: ClassSchema) -> Self {
        self.register(schema);
        self
    }

    /// Constructs a fresh instance of a registered class.
    pub fn instantiate(&self, class: &str) -> Option<Object> {
        self.classes.get(class).map(ClassSchema::instantiate)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl SchemaProvider for SchemaRegistry {
    fn class_schema(&self, class: &str) -> Option<&ClassSchema> {
        self.classes.get(class)
    }
}
