//! Tag byte layout.
//!
//! The low nibble of a tag selects the wire type; the high nibble carries
//! type-specific widths and flags.

use crate::error::DecodeError;

/// Wire type selected by the low nibble of a tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Null = 0x0,
    Bool = 0x1,
    Integer = 0x2,
    Real = 0x3,
    Char = 0x4,
    String = 0x5,
    Array = 0x6,
    Property = 0x7,
    Object = 0x8,
}

impl WireType {
    /// Parses a low nibble; values 0x9..=0xF are not wire types.
    pub fn from_u8(v: u8) -> Option<WireType> {
        match v {
            0x0 => Some(WireType::Null),
            0x1 => Some(WireType::Bool),
            0x2 => Some(WireType::Integer),
            0x3 => Some(WireType::Real),
            0x4 => Some(WireType::Char),
            0x5 => Some(WireType::String),
            0x6 => Some(WireType::Array),
            0x7 => Some(WireType::Property),
            0x8 => Some(WireType::Object),
            _ => None,
        }
    }

    /// Returns the wire type of a tag byte.
    pub fn of(tag: u8) -> Option<WireType> {
        WireType::from_u8(tag & TYPE_MASK)
    }
}

pub const TYPE_MASK: u8 = 0x0F;

pub const BOOL_TRUE: u8 = 0x10;

pub const REAL_DOUBLE: u8 = 0x10;
const REAL_RESERVED: u8 = 0xE0;

const SELECTOR_SHIFT: u32 = 4;
const SELECTOR_MASK: u8 = 0x30;

pub const ARRAY_TYPE_IN_DICT: u8 = 0x40;
const ARRAY_RESERVED: u8 = 0x80;

pub const OBJECT_CLASS_IN_DICT: u8 = 0x40;
pub const OBJECT_GENERICS: u8 = 0x80;

pub const PROPERTY_LONG_NAME: u8 = 0x10;
pub const PROPERTY_NAME_IN_DICT: u8 = 0x20;
const PROPERTY_RESERVED: u8 = 0xC0;

/// Byte count of a length or count field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthWidth {
    /// No field; the length is zero.
    Zero,
    One,
    Two,
    Four,
}

impl LengthWidth {
    /// Width of an array length or object field count.
    ///
    /// Empty containers carry no count field.
    pub fn for_length(len: usize) -> LengthWidth {
        if len == 0 {
            LengthWidth::Zero
        } else {
            LengthWidth::for_string_length(len)
        }
    }

    /// Width of a string length. Strings always carry a length field.
    pub fn for_string_length(len: usize) -> LengthWidth {
        if len < i8::MAX as usize {
            LengthWidth::One
        } else if len < i16::MAX as usize {
            LengthWidth::Two
        } else {
            LengthWidth::Four
        }
    }

    pub fn byte_count(self) -> usize {
        match self {
            LengthWidth::Zero => 0,
            LengthWidth::One => 1,
            LengthWidth::Two => 2,
            LengthWidth::Four => 4,
        }
    }

    /// 2-bit selector used by arrays and objects.
    pub fn selector(self) -> u8 {
        match self {
            LengthWidth::Zero => 0,
            LengthWidth::One => 1,
            LengthWidth::Two => 2,
            LengthWidth::Four => 3,
        }
    }

    pub fn from_selector(selector: u8) -> LengthWidth {
        match selector & 0x3 {
            0 => LengthWidth::Zero,
            1 => LengthWidth::One,
            2 => LengthWidth::Two,
            _ => LengthWidth::Four,
        }
    }

    /// Parses the byte-count nibble of a string tag.
    pub fn from_byte_count(count: u8) -> Option<LengthWidth> {
        match count {
            1 => Some(LengthWidth::One),
            2 => Some(LengthWidth::Two),
            4 => Some(LengthWidth::Four),
            _ => None,
        }
    }
}

/// Width of an integer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    One,
    Two,
    Four,
    Eight,
}

impl IntWidth {
    pub fn byte_count(self) -> usize {
        match self {
            IntWidth::One => 1,
            IntWidth::Two => 2,
            IntWidth::Four => 4,
            IntWidth::Eight => 8,
        }
    }

    pub fn from_byte_count(count: u8) -> Option<IntWidth> {
        match count {
            1 => Some(IntWidth::One),
            2 => Some(IntWidth::Two),
            4 => Some(IntWidth::Four),
            8 => Some(IntWidth::Eight),
            _ => None,
        }
    }
}

/// How a property record names its property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyName {
    /// 2-byte property dictionary index.
    Indexed,
    /// 1-byte length and UTF-8 name.
    Short,
    /// 2-byte length and UTF-8 name.
    Long,
}

/// How an object record identifies its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// No class identity; the object decodes as a generic object.
    Generic,
    /// 2-byte class dictionary index.
    Indexed,
    /// Full external name and serialization version.
    Named,
}

/// A parsed tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Null,
    Bool(bool),
    Integer(IntWidth),
    /// `double` selects the 8-byte encoding.
    Real { double: bool },
    Char,
    String(LengthWidth),
    Array {
        count: LengthWidth,
        type_in_dict: bool,
    },
    Property(PropertyName),
    Object {
        count: LengthWidth,
        class: ObjectClass,
    },
}

impl Tag {
    /// Parses any tag byte.
    pub fn parse(byte: u8) -> Result<Tag, DecodeError> {
        let high = byte & !TYPE_MASK;
        let wire_type = WireType::of(byte).ok_or(DecodeError::InvalidTag { tag: byte })?;
        let tag = match wire_type {
            WireType::Null => {
                reject_reserved(byte, high)?;
                Tag::Null
            }
            WireType::Bool => Tag::Bool(high != 0),
            WireType::Integer => {
                let width = IntWidth::from_byte_count(high >> 4)
                    .ok_or(DecodeError::InvalidTag { tag: byte })?;
                Tag::Integer(width)
            }
            WireType::Real => {
                reject_reserved(byte, high & REAL_RESERVED)?;
                Tag::Real {
                    double: high & REAL_DOUBLE != 0,
                }
            }
            WireType::Char => {
                reject_reserved(byte, high)?;
                Tag::Char
            }
            WireType::String => {
                let width = LengthWidth::from_byte_count(high >> 4)
                    .ok_or(DecodeError::InvalidTag { tag: byte })?;
                Tag::String(width)
            }
            WireType::Array => {
                reject_reserved(byte, high & ARRAY_RESERVED)?;
                Tag::Array {
                    count: selector_of(byte),
                    type_in_dict: high & ARRAY_TYPE_IN_DICT != 0,
                }
            }
            WireType::Property => Tag::Property(parse_property_flags(byte)?),
            WireType::Object => {
                let class = match (high & OBJECT_GENERICS != 0, high & OBJECT_CLASS_IN_DICT != 0) {
                    (true, true) => return Err(DecodeError::ReservedBitsSet { tag: byte }),
                    (true, false) => ObjectClass::Generic,
                    (false, true) => ObjectClass::Indexed,
                    (false, false) => ObjectClass::Named,
                };
                Tag::Object {
                    count: selector_of(byte),
                    class,
                }
            }
        };
        Ok(tag)
    }

    /// Parses a tag in value position, where a property record is a
    /// grammar violation.
    pub fn parse_value(byte: u8) -> Result<Tag, DecodeError> {
        match Tag::parse(byte)? {
            Tag::Property(_) => Err(DecodeError::NotAProperty { tag: byte }),
            tag => Ok(tag),
        }
    }

    /// Parses a tag in field-list position, where only a property record
    /// may appear.
    pub fn parse_property(byte: u8) -> Result<PropertyName, DecodeError> {
        if byte & TYPE_MASK != WireType::Property as u8 {
            return Err(DecodeError::NotAProperty { tag: byte });
        }
        parse_property_flags(byte)
    }

    /// Encodes this tag.
    pub fn to_byte(self) -> u8 {
        match self {
            Tag::Null => WireType::Null as u8,
            Tag::Bool(value) => WireType::Bool as u8 | if value { BOOL_TRUE } else { 0 },
            Tag::Integer(width) => WireType::Integer as u8 | (width.byte_count() as u8) << 4,
            Tag::Real { double } => WireType::Real as u8 | if double { REAL_DOUBLE } else { 0 },
            Tag::Char => WireType::Char as u8,
            Tag::String(width) => WireType::String as u8 | (width.byte_count() as u8) << 4,
            Tag::Array {
                count,
                type_in_dict,
            } => {
                let mut byte = WireType::Array as u8 | count.selector() << SELECTOR_SHIFT;
                if type_in_dict {
                    byte |= ARRAY_TYPE_IN_DICT;
                }
                byte
            }
            Tag::Property(name) => {
                WireType::Property as u8
                    | match name {
                        PropertyName::Indexed => PROPERTY_NAME_IN_DICT,
                        PropertyName::Short => 0,
                        PropertyName::Long => PROPERTY_LONG_NAME,
                    }
            }
            Tag::Object { count, class } => {
                WireType::Object as u8
                    | count.selector() << SELECTOR_SHIFT
                    | match class {
                        ObjectClass::Generic => OBJECT_GENERICS,
                        ObjectClass::Indexed => OBJECT_CLASS_IN_DICT,
                        ObjectClass::Named => 0,
                    }
            }
        }
    }
}

fn selector_of(byte: u8) -> LengthWidth {
    LengthWidth::from_selector((byte & SELECTOR_MASK) >> SELECTOR_SHIFT)
}

fn reject_reserved(byte: u8, bits: u8) -> Result<(), DecodeError> {
    if bits != 0 {
        return Err(DecodeError::ReservedBitsSet { tag: byte });
    }
    Ok(())
}

fn parse_property_flags(byte: u8) -> Result<PropertyName, DecodeError> {
    let high = byte & !TYPE_MASK;
    reject_reserved(byte, high & PROPERTY_RESERVED)?;
    match (high & PROPERTY_NAME_IN_DICT != 0, high & PROPERTY_LONG_NAME != 0) {
        (true, true) => Err(DecodeError::ReservedBitsSet { tag: byte }),
        (true, false) => Ok(PropertyName::Indexed),
        (false, true) => Ok(PropertyName::Long),
        (false, false) => Ok(PropertyName::Short),
    }
}
