//! Stream header: magic, stream identifier, version and options.

use crate::codec::primitives::{Reader, Writer};
use crate::error::DecodeError;
use crate::limits::{FORMAT_VERSION, HEADER_LEN, IDENTIFIER_LEN, IDENTIFIER_PAD, MAGIC};

/// Stream-wide options carried in the header.
///
/// Bits without a meaning are kept as read so that `bits()` reproduces the
/// decoded word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Options {
    /// Encode and decode every object with its class identity elided.
    pub objects_as_generics: bool,
    other: u16,
}

impl Options {
    pub const OBJECTS_AS_GENERICS: u16 = 0x0001;

    /// Creates options with no flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the objects-as-generics flag.
    pub fn with_objects_as_generics(mut self, enabled: bool) -> Self {
        self.objects_as_generics = enabled;
        self
    }

    /// Parses an options word.
    pub fn from_bits(bits: u16) -> Self {
        Self {
            objects_as_generics: bits & Self::OBJECTS_AS_GENERICS != 0,
            other: bits & !Self::OBJECTS_AS_GENERICS,
        }
    }

    /// Returns the options word.
    pub fn bits(self) -> u16 {
        let mut bits = self.other;
        if self.objects_as_generics {
            bits |= Self::OBJECTS_AS_GENERICS;
        }
        bits
    }
}

/// Reduces a caller-supplied stream identifier to its 4 wire bytes.
///
/// Keeps ASCII graphic characters in order, truncates, and pads with spaces.
pub fn sanitize_identifier(identifier: &str) -> [u8; IDENTIFIER_LEN] {
    let mut out = [IDENTIFIER_PAD; IDENTIFIER_LEN];
    for (slot, byte) in out
        .iter_mut()
        .zip(identifier.bytes().filter(u8::is_ascii_graphic))
    {
        *slot = byte;
    }
    out
}

/// Decoded 12-byte stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub identifier: [u8; IDENTIFIER_LEN],
    pub version: u16,
    pub options: Options,
}

impl Header {
    /// Creates the header the encoder writes.
    pub fn new(identifier: &str, options: Options) -> Self {
        Self {
            identifier: sanitize_identifier(identifier),
            version: FORMAT_VERSION,
            options,
        }
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_bytes(&MAGIC);
        writer.write_bytes(&self.identifier);
        writer.write_u16(self.version);
        writer.write_u16(self.options.bits());
    }

    /// Decodes and validates a header.
    ///
    /// Checks the magic, then the stream identifier, then the version; the
    /// first mismatch is reported.
    pub fn decode(
        reader: &mut Reader<'_>,
        expected: &[u8; IDENTIFIER_LEN],
    ) -> Result<Header, DecodeError> {
        if reader.remaining_len() < HEADER_LEN {
            return Err(DecodeError::UnexpectedEof { context: "header" });
        }

        let magic: [u8; 4] = reader.read_array("magic")?;
        if magic != MAGIC {
            return Err(DecodeError::MissingFormatIdentifier { found: magic });
        }

        let identifier: [u8; IDENTIFIER_LEN] = reader.read_array("stream identifier")?;
        if identifier != *expected {
            return Err(DecodeError::MismatchingStreamIdentifier {
                expected: *expected,
                found: identifier,
            });
        }

        let version = reader.read_u16("version")?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let options = Options::from_bits(reader.read_u16("options")?);
        Ok(Header {
            identifier,
            version,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(header: &Header) -> Vec<u8> {
        let mut writer = Writer::new();
        header.encode(&mut writer);
        writer.into_bytes()
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(&sanitize_identifier("TEST"), b"TEST");
        assert_eq!(&sanitize_identifier("TESTING"), b"TEST");
        assert_eq!(&sanitize_identifier("ab"), b"ab  ");
        assert_eq!(&sanitize_identifier("a b\tc\u{e9}d"), b"abcd");
        assert_eq!(&sanitize_identifier(""), b"    ");
    }

    #[test]
    fn test_header_layout() {
        let header = Header::new("TEST", Options::new().with_objects_as_generics(true));
        let bytes = encoded(&header);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..8], b"WSHKTEST");
        assert_eq!(&bytes[8..], &[0x00, 0x01, 0x00, 0x01]);

        let decoded = Header::decode(&mut Reader::new(&bytes), b"TEST").unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_options_keep_unknown_bits() {
        let options = Options::from_bits(0x8001);
        assert!(options.objects_as_generics);
        assert_eq!(options.bits(), 0x8001);
        assert_eq!(Options::from_bits(0x0002).with_objects_as_generics(true).bits(), 0x0003);
    }

    #[test]
    fn test_rejections_are_ordered() {
        let good = encoded(&Header::new("TEST", Options::new()));

        // Bad magic wins even if everything else is also wrong.
        let mut bytes = good.clone();
        bytes[0] = b'X';
        bytes[4] = b'X';
        bytes[9] = 9;
        let err = Header::decode(&mut Reader::new(&bytes), b"TEST").unwrap_err();
        assert!(matches!(err, DecodeError::MissingFormatIdentifier { .. }));

        let mut bytes = good.clone();
        bytes[9] = 9;
        let err = Header::decode(&mut Reader::new(&bytes), b"OTHR").unwrap_err();
        assert!(matches!(err, DecodeError::MismatchingStreamIdentifier { .. }));

        let err = Header::decode(&mut Reader::new(&bytes), b"TEST").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion { version: 9 }));

        let err = Header::decode(&mut Reader::new(&good[..11]), b"TEST").unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }
}
