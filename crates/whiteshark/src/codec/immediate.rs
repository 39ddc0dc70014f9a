//! Immediate decoder: recursive descent over a fully available buffer.

use tracing::{debug, instrument};

use crate::codec::decode::{check_name_len, read_scalar, ArrayBuilder, DecodeContext};
use crate::codec::header::{sanitize_identifier, Header};
use crate::codec::primitives::Reader;
use crate::codec::tag::{ObjectClass, PropertyName, Tag};
use crate::error::DecodeError;
use crate::limits::{IDENTIFIER_LEN, MAX_DEPTH};
use crate::model::{Dictionaries, Value};
use crate::schema::{ClassMapper, FieldFlags, SchemaProvider};

/// Decoder for streams held entirely in memory.
///
/// Dictionaries live for one call only; they are released when the call
/// returns, whatever its outcome.
pub struct ImmediateDecoder<'a> {
    ctx: DecodeContext<'a>,
    expected: [u8; IDENTIFIER_LEN],
    depth: usize,
}

impl<'a> ImmediateDecoder<'a> {
    /// Creates a decoder accepting streams tagged `identifier`.
    pub fn new(
        schemas: &'a dyn SchemaProvider,
        mapper: &'a dyn ClassMapper,
        identifier: &str,
    ) -> Self {
        Self {
            ctx: DecodeContext::new(schemas, mapper),
            expected: sanitize_identifier(identifier),
            depth: 0,
        }
    }

    /// Decodes one complete stream.
    ///
    /// The input must hold exactly one header and one root value.
    pub fn decode(&mut self, input: &[u8]) -> Result<Value, DecodeError> {
        self.decode_with_dictionaries(input).map(|(value, _)| value)
    }

    /// Decodes one complete stream, also returning the dictionaries it built.
    #[instrument(skip_all, name = "whiteshark::decode")]
    pub fn decode_with_dictionaries(
        &mut self,
        input: &[u8],
    ) -> Result<(Value, Dictionaries), DecodeError> {
        self.ctx.reset();
        self.depth = 0;
        let result = self.decode_stream(input);
        let dicts = std::mem::take(&mut self.ctx.dicts);
        result.map(|value| (value, dicts))
    }

    fn decode_stream(&mut self, input: &[u8]) -> Result<Value, DecodeError> {
        let mut reader = Reader::new(input);
        let header = Header::decode(&mut reader, &self.expected).inspect_err(|e| {
            debug!(error = %e, "rejected stream header");
        })?;
        self.ctx.generics = header.options.objects_as_generics;

        let value = self.decode_value(&mut reader, FieldFlags::default())?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingData {
                remaining: reader.remaining_len(),
            });
        }

        debug!(
            bytes = input.len(),
            classes = self.ctx.dicts.classes.len(),
            properties = self.ctx.dicts.properties.len(),
            "decoded stream"
        );
        Ok(value)
    }

    fn decode_value(
        &mut self,
        reader: &mut Reader<'_>,
        flags: FieldFlags,
    ) -> Result<Value, DecodeError> {
        let byte = reader.read_byte("tag")?;
        match Tag::parse_value(byte)? {
            Tag::Null => Ok(Value::Null),
            Tag::Bool(b) => Ok(Value::Bool(b)),
            tag @ (Tag::Integer(_) | Tag::Real { .. } | Tag::Char) => read_scalar(tag, reader),
            Tag::String(width) => {
                let len = reader.read_length(width, "string length")?;
                Ok(Value::String(reader.read_string(len, "string")?))
            }
            Tag::Array {
                count,
                type_in_dict,
            } => {
                self.enter()?;
                let element_type = if type_in_dict {
                    self.ctx.indexed_type(reader.read_u16("type index")?)?
                } else {
                    let len = check_name_len(usize::from(reader.read_u16("type name length")?), "type name")?;
                    let name = reader.read_str(len, "type name")?;
                    self.ctx.named_type(name)?
                };
                let len = reader.read_length(count, "array length")?;

                let mut builder = ArrayBuilder::new(element_type, len);
                for _ in 0..len {
                    let item = self.decode_value(reader, FieldFlags::default())?;
                    builder.push(item)?;
                }
                self.depth -= 1;
                Ok(builder.finish())
            }
            Tag::Object { count, class } => {
                self.enter()?;
                let class = match class {
                    ObjectClass::Generic => None,
                    ObjectClass::Indexed => {
                        Some(self.ctx.indexed_class(reader.read_u16("class index")?)?)
                    }
                    ObjectClass::Named => {
                        let len = check_name_len(usize::from(reader.read_u16("class name length")?), "class name")?;
                        let name = reader.read_str(len, "class name")?;
                        let ty = self.ctx.named_type(name)?;
                        // Versions are carried for the record only.
                        reader.read_i32("class version")?;
                        Some(ty)
                    }
                };
                let field_count = reader.read_length(count, "field count")?;

                let mut builder = self.ctx.open_object(class.as_ref(), field_count, flags)?;
                for _ in 0..field_count {
                    let name = self.decode_property_name(reader)?;
                    let value = self.decode_value(reader, builder.field_flags(&name))?;
                    builder.set(name, value)?;
                }
                self.depth -= 1;
                Ok(builder.finish())
            }
            Tag::Property(_) => Err(DecodeError::NotAProperty { tag: byte }),
        }
    }

    fn decode_property_name(&mut self, reader: &mut Reader<'_>) -> Result<String, DecodeError> {
        let byte = reader.read_byte("property tag")?;
        let len = match Tag::parse_property(byte)? {
            PropertyName::Indexed => {
                return self.ctx.indexed_property(reader.read_u16("property index")?);
            }
            PropertyName::Short => usize::from(reader.read_byte("property name length")?),
            PropertyName::Long => check_name_len(
                usize::from(reader.read_u16("property name length")?),
                "property name",
            )?,
        };
        let name = reader.read_string(len, "property name")?;
        self.ctx.named_property(name)
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::DepthLimitExceeded { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode::Serializer;
    use crate::codec::test_support::{point_bytes, point_registry, point_value, with_header};
    use crate::error::ErrorKind;
    use crate::model::{Array, GenericObject, TypeRef};
    use crate::schema::{IdentityMapper, SchemaRegistry};

    fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
        let registry = point_registry();
        ImmediateDecoder::new(&registry, &IdentityMapper, "TEST").decode(bytes)
    }

    #[test]
    fn test_decode_point_bytes() {
        assert_eq!(decode(&point_bytes()).unwrap(), point_value(7, "abc"));
    }

    #[test]
    fn test_header_rejection_ignores_payload() {
        // The payload is garbage; only the header is inspected.
        let mut bytes = with_header(b"TEST", 1, &[0xFF, 0xFF]);
        bytes[1] = b'X';
        assert_eq!(decode(&bytes).unwrap_err().kind(), ErrorKind::MissingFormatIdentifier);

        let bytes = with_header(b"NOPE", 1, &[0xFF, 0xFF]);
        assert_eq!(
            decode(&bytes).unwrap_err().kind(),
            ErrorKind::MismatchingStreamIdentifier
        );

        let bytes = with_header(b"TEST", 2, &[0xFF, 0xFF]);
        assert_eq!(decode(&bytes).unwrap_err().kind(), ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn test_identifier_is_sanitized_before_compare() {
        let registry = point_registry();
        let bytes = Serializer::new(&registry).to_vec("te st", &Value::Null).unwrap();
        assert_eq!(&bytes[4..8], b"test");
        let mut decoder = ImmediateDecoder::new(&registry, &IdentityMapper, "testing");
        assert_eq!(decoder.decode(&bytes).unwrap(), Value::Null);
    }

    #[test]
    fn test_not_a_property_in_field_list() {
        // Generic object with one field, but a string tag where the
        // property record belongs.
        let bytes = with_header(b"TEST", 1, &[0x98, 0x01, 0x15, 0x01, b'x']);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::NotAProperty { tag: 0x15 }));
    }

    #[test]
    fn test_property_outside_object() {
        let bytes = with_header(b"TEST", 1, &[0x07, 0x01, b'x', 0x00]);
        assert_eq!(decode(&bytes).unwrap_err().kind(), ErrorKind::NotAProperty);
    }

    #[test]
    fn test_no_such_field() {
        let mut payload = vec![0x18, 0x00, 0x05];
        payload.extend_from_slice(b"Point");
        payload.extend_from_slice(&[0, 0, 0, 1, 0x01, 0x07, 0x05]);
        payload.extend_from_slice(b"color");
        payload.push(0x00);
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchField);
    }

    #[test]
    fn test_fields_in_any_order_and_partial() {
        // Only "name" is sent; "id" keeps its default.
        let mut payload = vec![0x18, 0x00, 0x05];
        payload.extend_from_slice(b"Point");
        payload.extend_from_slice(&[0, 0, 0, 9, 0x01, 0x07, 0x04]);
        payload.extend_from_slice(b"name");
        payload.extend_from_slice(&[0x15, 0x01, b'z']);
        let decoded = decode(&with_header(b"TEST", 1, &payload)).unwrap();
        assert_eq!(decoded, point_value(0, "z"));
    }

    #[test]
    fn test_unresolved_class() {
        let mut payload = vec![0x08, 0x00, 0x04];
        payload.extend_from_slice(b"Line");
        payload.extend_from_slice(&[0, 0, 0, 0]);
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::UnresolvedType { ref name } if name == "Line"));
    }

    #[test]
    fn test_object_back_reference_to_non_class() {
        // Array of i32 registers "i32" at index 0, then an object points at it.
        let payload = [
            0x16, 0x00, 0x03, b'i', b'3', b'2', 0x01, 0x48, 0x00, 0x00,
        ];
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::NotAClass { index: 0 }));
        assert_eq!(err.kind(), ErrorKind::UnresolvedType);
    }

    #[test]
    fn test_back_reference_out_of_bounds() {
        let payload = [0x98, 0x01, 0x27, 0x00, 0x00, 0x00];
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::IndexOutOfBounds { dict: "property", .. }));
    }

    #[test]
    fn test_duplicate_property_name_is_desync() {
        let payload = [0x98, 0x02, 0x07, 0x01, b'x', 0x00, 0x07, 0x01, b'x', 0x00];
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateDictionaryEntry { dict: "property", index: 0 }));
    }

    #[test]
    fn test_element_type_enforced() {
        // i8 array holding a string.
        let payload = [0x16, 0x00, 0x02, b'i', b'8', 0x01, 0x15, 0x00];
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::ElementTypeMismatch { index: 0 }));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = point_bytes();
        bytes.push(0x00);
        assert!(matches!(decode(&bytes), Err(DecodeError::TrailingData { remaining: 1 })));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = point_bytes();
        for cut in 12..bytes.len() {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, DecodeError::UnexpectedEof { .. }),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn test_hostile_count_does_not_preallocate() {
        // Array claiming 2^31-1 elements with none present.
        let payload = [0x36, 0x00, 0x06, b'o', b'b', b'j', b'e', b'c', b't', 0x7F, 0xFF, 0xFF, 0xFF];
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let mut payload = vec![0x98, 0x01, 0x07, 0x01, b'x'];
        for _ in 0..MAX_DEPTH {
            payload.extend_from_slice(&[0x98, 0x01, 0x27, 0x00, 0x00]);
        }
        payload.push(0x00);
        let err = decode(&with_header(b"TEST", 1, &payload)).unwrap_err();
        assert!(matches!(err, DecodeError::DepthLimitExceeded { max: MAX_DEPTH }));
    }

    #[test]
    fn test_dictionaries_reset_between_calls() {
        let registry = point_registry();
        let value = Value::Array(Array::from_items(
            TypeRef::class("Point"),
            vec![point_value(1, "a"), point_value(2, "b")],
        ));
        let bytes = Serializer::new(&registry).to_vec("TEST", &value).unwrap();

        let mut decoder = ImmediateDecoder::new(&registry, &IdentityMapper, "TEST");
        for _ in 0..2 {
            let (decoded, dicts) = decoder.decode_with_dictionaries(&bytes).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(dicts.classes.entries(), [TypeRef::class("Point")]);
            assert_eq!(dicts.properties.entries(), ["id", "name"]);
        }
    }

    #[test]
    fn test_dictionaries_released_after_call() {
        let registry = point_registry();
        let mut decoder = ImmediateDecoder::new(&registry, &IdentityMapper, "TEST");
        decoder.decode(&point_bytes()).unwrap();
        assert!(decoder.ctx.dicts.classes.is_empty());
        assert!(decoder.ctx.dicts.properties.is_empty());

        // A failing call releases what it had built so far.
        let mut truncated = point_bytes();
        truncated.truncate(truncated.len() - 2);
        decoder.decode(&truncated).unwrap_err();
        assert!(decoder.ctx.dicts.classes.is_empty());
        assert!(decoder.ctx.dicts.properties.is_empty());
    }

    #[test]
    fn test_generic_stream_needs_no_schemas() {
        let value = Value::Generic(
            GenericObject::new()
                .with("k", Array::of(TypeRef::String, ["a", "b"]))
                .with("n", Value::Null),
        );
        let registry = SchemaRegistry::new();
        let bytes = Serializer::new(&registry).to_vec("TEST", &value).unwrap();
        let mut decoder = ImmediateDecoder::new(&registry, &IdentityMapper, "TEST");
        assert_eq!(decoder.decode(&bytes).unwrap(), value);
    }
}
