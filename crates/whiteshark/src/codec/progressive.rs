//! Progressive decoder: the grammar as a resumable state machine.
//!
//! Input may be split at any byte. The decoder keeps an explicit stack of
//! open containers and names the next token it expects; only the bytes of
//! that one token are buffered between feeds. Nothing already consumed is
//! read again.

use std::io::{self, Read};

use tracing::{debug, trace};

use crate::codec::decode::{
    check_name_len, read_scalar, scalar_len, ArrayBuilder, DecodeContext, ObjectBuilder,
};
use crate::codec::header::{sanitize_identifier, Header};
use crate::codec::primitives::Reader;
use crate::codec::tag::{LengthWidth, ObjectClass, PropertyName, Tag};
use crate::error::DecodeError;
use crate::limits::{HEADER_LEN, IDENTIFIER_LEN, MAX_DEPTH};
use crate::model::{TypeRef, Value};
use crate::schema::{ClassMapper, FieldFlags, SchemaProvider};

/// Size of the buffer used by [`ProgressiveDecoder::read_from`].
const READ_CHUNK: usize = 8 * 1024;

/// Outcome of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The root value is not complete yet.
    NeedMore,
    /// The root value is complete and can be taken.
    Complete,
}

/// The next atomic token the decoder expects.
#[derive(Debug)]
enum State {
    Header,
    /// Tag byte of a value.
    Tag,
    /// Tag byte of a property record.
    PropertyTag,
    /// Payload of an integer, real or char.
    Scalar(Tag),
    StringLength(LengthWidth),
    StringBody(usize),
    /// Array element type, as a class dictionary index.
    TypeIndex { count: LengthWidth },
    TypeNameLength { count: LengthWidth },
    TypeName { count: LengthWidth, len: usize },
    ArrayLength { element_type: TypeRef, count: LengthWidth },
    ClassIndex { count: LengthWidth },
    ClassNameLength { count: LengthWidth },
    ClassName { count: LengthWidth, len: usize },
    ClassVersion { count: LengthWidth, class: TypeRef },
    /// `class` is `None` for objects sent as generics.
    FieldCount { count: LengthWidth, class: Option<TypeRef> },
    PropertyIndex,
    PropertyNameLength { long: bool },
    PropertyName(usize),
    /// The root value is complete.
    Done,
}

impl State {
    /// Byte count of the token.
    fn need(&self) -> usize {
        match self {
            State::Header => HEADER_LEN,
            State::Tag | State::PropertyTag => 1,
            State::Scalar(tag) => scalar_len(*tag),
            State::StringLength(width) => width.byte_count(),
            State::StringBody(len) => *len,
            State::TypeIndex { .. }
            | State::TypeNameLength { .. }
            | State::ClassIndex { .. }
            | State::ClassNameLength { .. }
            | State::PropertyIndex => 2,
            State::TypeName { len, .. } | State::ClassName { len, .. } => *len,
            State::ArrayLength { count, .. } | State::FieldCount { count, .. } => {
                count.byte_count()
            }
            State::ClassVersion { .. } => 4,
            State::PropertyNameLength { long } => {
                if *long {
                    2
                } else {
                    1
                }
            }
            State::PropertyName(len) => *len,
            State::Done => 0,
        }
    }
}

/// An open container.
#[derive(Debug)]
enum Frame<'a> {
    Array {
        builder: ArrayBuilder,
    },
    Object {
        builder: ObjectBuilder<'a>,
        remaining: usize,
        /// Name and flags of the property whose value is being decoded.
        field: Option<(String, FieldFlags)>,
    },
}

impl Frame<'_> {
    fn accept(&mut self, value: Value) -> Result<(), DecodeError> {
        match self {
            Frame::Array { builder } => builder.push(value),
            Frame::Object {
                builder,
                remaining,
                field,
            } => {
                let (name, _) = field.take().ok_or(DecodeError::MissingPropertyName)?;
                builder.set(name, value)?;
                *remaining -= 1;
                Ok(())
            }
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Frame::Array { builder } => builder.is_complete(),
            Frame::Object { remaining, .. } => *remaining == 0,
        }
    }

    /// State expecting the next child of this frame.
    fn next_state(&self) -> State {
        match self {
            Frame::Array { .. } => State::Tag,
            Frame::Object { .. } => State::PropertyTag,
        }
    }

    fn finish(self) -> Value {
        match self {
            Frame::Array { builder } => builder.finish(),
            Frame::Object { builder, .. } => builder.finish(),
        }
    }
}

/// Decoder accepting a stream in arbitrary chunks.
///
/// Feeding a stream in order, in any split, yields the same value and the
/// same errors as decoding it at once with the immediate decoder. After the
/// first error every call fails with [`DecodeError::Poisoned`]. Dropping the
/// decoder cancels the decode.
pub struct ProgressiveDecoder<'a> {
    ctx: DecodeContext<'a>,
    expected: [u8; IDENTIFIER_LEN],
    state: State,
    frames: Vec<Frame<'a>>,
    /// Bytes of the current, partially received token.
    scratch: Vec<u8>,
    value: Option<Value>,
    consumed: usize,
    failed: bool,
}

impl<'a> ProgressiveDecoder<'a> {
    /// Creates a decoder accepting a stream tagged `identifier`.
    pub fn new(
        schemas: &'a dyn SchemaProvider,
        mapper: &'a dyn ClassMapper,
        identifier: &str,
    ) -> Self {
        Self {
            ctx: DecodeContext::new(schemas, mapper),
            expected: sanitize_identifier(identifier),
            state: State::Header,
            frames: Vec::new(),
            scratch: Vec::with_capacity(HEADER_LEN),
            value: None,
            consumed: 0,
            failed: false,
        }
    }

    /// Consumes newly available bytes.
    ///
    /// Never waits for input: returns [`Progress::NeedMore`] as soon as the
    /// bytes run out.
    pub fn feed(&mut self, input: &[u8]) -> Result<Progress, DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }
        trace!(len = input.len(), consumed = self.consumed, "feed");
        let result = self.advance(input);
        if let Err(e) = &result {
            self.failed = true;
            debug!(error = %e, consumed = self.consumed, "progressive decode failed");
        }
        result
    }

    /// Performs one read from `source` and feeds what it returned.
    ///
    /// `WouldBlock` and `Interrupted` report [`Progress::NeedMore`]; end of
    /// input before the root value is complete is an error.
    pub fn read_from<R: Read>(&mut self, source: &mut R) -> Result<Progress, DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }
        let mut buf = [0u8; READ_CHUNK];
        let n = match source.read(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                return Ok(Progress::NeedMore);
            }
            Err(e) => {
                self.failed = true;
                return Err(e.into());
            }
        };
        if n == 0 {
            if self.is_complete() {
                return Ok(Progress::Complete);
            }
            self.failed = true;
            return Err(DecodeError::UnexpectedEof {
                context: self.expecting(),
            });
        }
        self.feed(&buf[..n])
    }

    /// Returns true once the root value is complete.
    pub fn is_complete(&self) -> bool {
        !self.failed && matches!(self.state, State::Done)
    }

    /// Takes the root value; `None` before completion or once taken.
    pub fn take_value(&mut self) -> Option<Value> {
        self.value.take()
    }

    /// Ends the decode, returning the root value if it is complete and not
    /// yet taken.
    pub fn finish(mut self) -> Result<Value, DecodeError> {
        if self.failed {
            return Err(DecodeError::Poisoned);
        }
        let context = self.expecting();
        self.value
            .take()
            .ok_or(DecodeError::UnexpectedEof { context })
    }

    /// Total number of stream bytes consumed so far.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    /// Number of currently open containers.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn class_dictionary(&self) -> &[TypeRef] {
        self.ctx.dicts.classes.entries()
    }

    pub fn property_dictionary(&self) -> &[String] {
        self.ctx.dicts.properties.entries()
    }

    /// Short description of the expected token, for end-of-input errors.
    fn expecting(&self) -> &'static str {
        match self.state {
            State::Header => "header",
            State::Tag => "tag",
            State::PropertyTag => "property tag",
            State::Scalar(_) => "scalar",
            State::StringLength(_) => "string length",
            State::StringBody(_) => "string",
            State::TypeIndex { .. } => "type index",
            State::TypeNameLength { .. } => "type name length",
            State::TypeName { .. } => "type name",
            State::ArrayLength { .. } => "array length",
            State::ClassIndex { .. } => "class index",
            State::ClassNameLength { .. } => "class name length",
            State::ClassName { .. } => "class name",
            State::ClassVersion { .. } => "class version",
            State::FieldCount { .. } => "field count",
            State::PropertyIndex => "property index",
            State::PropertyNameLength { .. } => "property name length",
            State::PropertyName(_) => "property name",
            State::Done => "root value",
        }
    }

    fn advance(&mut self, mut input: &[u8]) -> Result<Progress, DecodeError> {
        loop {
            if self.is_complete() {
                if !input.is_empty() {
                    return Err(DecodeError::TrailingData {
                        remaining: input.len(),
                    });
                }
                return Ok(Progress::Complete);
            }

            let missing = self.state.need() - self.scratch.len();
            if input.len() < missing {
                self.scratch.extend_from_slice(input);
                self.consumed += input.len();
                return Ok(Progress::NeedMore);
            }
            let (head, rest) = input.split_at(missing);
            self.scratch.extend_from_slice(head);
            self.consumed += missing;
            input = rest;

            let token = std::mem::take(&mut self.scratch);
            self.step(&token)?;
            self.scratch = token;
            self.scratch.clear();
        }
    }

    /// Interprets one complete token and moves to the next state.
    fn step(&mut self, token: &[u8]) -> Result<(), DecodeError> {
        let mut reader = Reader::new(token);
        let state = std::mem::replace(&mut self.state, State::Done);
        match state {
            State::Header => {
                let header = Header::decode(&mut reader, &self.expected).inspect_err(|e| {
                    debug!(error = %e, "rejected stream header");
                })?;
                self.ctx.generics = header.options.objects_as_generics;
                self.state = State::Tag;
            }
            State::Tag => self.begin_value(reader.read_byte("tag")?)?,
            State::PropertyTag => {
                let byte = reader.read_byte("property tag")?;
                self.state = match Tag::parse_property(byte)? {
                    PropertyName::Indexed => State::PropertyIndex,
                    PropertyName::Short => State::PropertyNameLength { long: false },
                    PropertyName::Long => State::PropertyNameLength { long: true },
                };
            }
            State::Scalar(tag) => self.complete(read_scalar(tag, &mut reader)?)?,
            State::StringLength(width) => {
                let len = reader.read_length(width, "string length")?;
                self.state = State::StringBody(len);
            }
            State::StringBody(len) => {
                let s = reader.read_string(len, "string")?;
                self.complete(Value::String(s))?;
            }
            State::TypeIndex { count } => {
                let element_type = self.ctx.indexed_type(reader.read_u16("type index")?)?;
                self.state = State::ArrayLength {
                    element_type,
                    count,
                };
            }
            State::TypeNameLength { count } => {
                let len = usize::from(reader.read_u16("type name length")?);
                self.state = State::TypeName {
                    count,
                    len: check_name_len(len, "type name")?,
                };
            }
            State::TypeName { count, len } => {
                let element_type = self.ctx.named_type(reader.read_str(len, "type name")?)?;
                self.state = State::ArrayLength {
                    element_type,
                    count,
                };
            }
            State::ArrayLength {
                element_type,
                count,
            } => {
                let len = reader.read_length(count, "array length")?;
                self.open(Frame::Array {
                    builder: ArrayBuilder::new(element_type, len),
                })?;
            }
            State::ClassIndex { count } => {
                let class = self.ctx.indexed_class(reader.read_u16("class index")?)?;
                self.state = State::FieldCount {
                    count,
                    class: Some(class),
                };
            }
            State::ClassNameLength { count } => {
                let len = usize::from(reader.read_u16("class name length")?);
                self.state = State::ClassName {
                    count,
                    len: check_name_len(len, "class name")?,
                };
            }
            State::ClassName { count, len } => {
                let class = self.ctx.named_type(reader.read_str(len, "class name")?)?;
                self.state = State::ClassVersion { count, class };
            }
            State::ClassVersion { count, class } => {
                reader.read_i32("class version")?;
                self.state = State::FieldCount {
                    count,
                    class: Some(class),
                };
            }
            State::FieldCount { count, class } => {
                let field_count = reader.read_length(count, "field count")?;
                let builder =
                    self.ctx
                        .open_object(class.as_ref(), field_count, self.pending_flags())?;
                self.open(Frame::Object {
                    builder,
                    remaining: field_count,
                    field: None,
                })?;
            }
            State::PropertyIndex => {
                let name = self.ctx.indexed_property(reader.read_u16("property index")?)?;
                self.begin_property(name)?;
            }
            State::PropertyNameLength { long } => {
                let len = if long {
                    check_name_len(
                        usize::from(reader.read_u16("property name length")?),
                        "property name",
                    )?
                } else {
                    usize::from(reader.read_byte("property name length")?)
                };
                self.state = State::PropertyName(len);
            }
            State::PropertyName(len) => {
                let name = self
                    .ctx
                    .named_property(reader.read_string(len, "property name")?)?;
                self.begin_property(name)?;
            }
            State::Done => {}
        }
        Ok(())
    }

    fn begin_value(&mut self, byte: u8) -> Result<(), DecodeError> {
        match Tag::parse_value(byte)? {
            Tag::Null => self.complete(Value::Null)?,
            Tag::Bool(b) => self.complete(Value::Bool(b))?,
            tag @ (Tag::Integer(_) | Tag::Real { .. } | Tag::Char) => {
                self.state = State::Scalar(tag);
            }
            Tag::String(width) => self.state = State::StringLength(width),
            Tag::Array {
                count,
                type_in_dict,
            } => {
                self.check_depth()?;
                self.state = if type_in_dict {
                    State::TypeIndex { count }
                } else {
                    State::TypeNameLength { count }
                };
            }
            Tag::Object { count, class } => {
                self.check_depth()?;
                self.state = match class {
                    ObjectClass::Generic => State::FieldCount { count, class: None },
                    ObjectClass::Indexed => State::ClassIndex { count },
                    ObjectClass::Named => State::ClassNameLength { count },
                };
            }
            Tag::Property(_) => return Err(DecodeError::NotAProperty { tag: byte }),
        }
        Ok(())
    }

    /// Records the name of the property whose value comes next.
    fn begin_property(&mut self, name: String) -> Result<(), DecodeError> {
        let Some(Frame::Object { builder, field, .. }) = self.frames.last_mut() else {
            return Err(DecodeError::MissingPropertyName);
        };
        let flags = builder.field_flags(&name);
        *field = Some((name, flags));
        self.state = State::Tag;
        Ok(())
    }

    /// Flags for a value about to open in the innermost frame.
    fn pending_flags(&self) -> FieldFlags {
        match self.frames.last() {
            Some(Frame::Object {
                field: Some((_, flags)),
                ..
            }) => *flags,
            _ => FieldFlags::default(),
        }
    }

    fn check_depth(&self) -> Result<(), DecodeError> {
        if self.frames.len() >= MAX_DEPTH {
            return Err(DecodeError::DepthLimitExceeded { max: MAX_DEPTH });
        }
        Ok(())
    }

    /// Pushes a container, closing it at once if it is empty.
    fn open(&mut self, frame: Frame<'a>) -> Result<(), DecodeError> {
        if frame.is_complete() {
            return self.complete(frame.finish());
        }
        self.state = frame.next_state();
        self.frames.push(frame);
        Ok(())
    }

    /// Hands a finished value to its parent, closing every container it
    /// completes.
    fn complete(&mut self, value: Value) -> Result<(), DecodeError> {
        let mut value = value;
        loop {
            let Some(mut frame) = self.frames.pop() else {
                debug!(
                    bytes = self.consumed,
                    classes = self.ctx.dicts.classes.len(),
                    properties = self.ctx.dicts.properties.len(),
                    "decoded stream"
                );
                self.value = Some(value);
                self.state = State::Done;
                return Ok(());
            };
            frame.accept(value)?;
            if !frame.is_complete() {
                self.state = frame.next_state();
                self.frames.push(frame);
                return Ok(());
            }
            value = frame.finish();
        }
    }
}
