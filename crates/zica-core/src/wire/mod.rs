//! Low-level protobuf wire format framing.
//!
//! Each protobuf field is encoded as a varint "tag" containing the field
//! number and wire type, followed by the field payload whose framing depends
//! on the wire type.
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: FIXED64 (fixed64, sfixed64, double)
//! - 2: LENGTH_DELIMITED (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: START_GROUP / END_GROUP (legacy group framing)
//! - 5: FIXED32 (fixed32, sfixed32, float)

pub mod varint;

use crate::error::{Error, Result};
use crate::{MAX_FIELD_NUMBER, RECURSION_LIMIT};
use bytes::BufMut;

pub use varint::{
    decode_varint, encode_varint, encoded_len, zigzag_decode32, zigzag_decode64, zigzag_encode32,
    zigzag_encode64,
};

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    Fixed64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    LengthDelimited = 2,
    /// Start group (legacy)
    StartGroup = 3,
    /// End group (legacy)
    EndGroup = 4,
    /// 32-bit fixed-width
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Fixed32),
            _ => Err(Error::invalid_wire_type(0, value)),
        }
    }
}

/// Reader over an in-memory buffer that tracks its position for error
/// reporting.
///
/// Typed reads return borrowed slices where possible; [`WireReader::skip_field`]
/// additionally hands back the raw payload bytes it consumed, which is what
/// unknown-field preservation is built on.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over the full buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset into the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True while any bytes are left
    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Read a raw varint value
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, len) = decode_varint(&self.data[self.pos..]).map_err(|e| match e {
            Error::MalformedVarint { .. } => Error::malformed_varint(self.pos),
            _ => Error::truncated(self.pos, 1, 0),
        })?;
        self.pos += len;
        Ok(value)
    }

    /// Read a field tag, returning the field number and wire type.
    ///
    /// Field number 0 and numbers above the protobuf maximum are rejected.
    pub fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let offset = self.pos;
        let tag = self.read_varint()?;

        let wire_type = WireType::try_from((tag & 0x07) as u8)
            .map_err(|_| Error::invalid_wire_type(offset, (tag & 0x07) as u8))?;
        let number = (tag >> 3) as u32;

        if number == 0 || (tag >> 3) > MAX_FIELD_NUMBER as u64 {
            return Err(Error::InvalidFieldNumber {
                number,
                max: MAX_FIELD_NUMBER,
            });
        }

        Ok((number, wire_type))
    }

    /// Read a little-endian 32-bit value
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("length checked")))
    }

    /// Read a little-endian 64-bit value
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("length checked")))
    }

    /// Read a length prefix followed by that many raw bytes
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    /// Consume a field's payload according to its wire type, returning the
    /// raw bytes consumed (length prefix included for length-delimited
    /// fields, nested content plus the closing END_GROUP tag for groups).
    ///
    /// An END_GROUP wire type is never a payload of its own and is rejected
    /// here; callers handle group termination before skipping.
    pub fn skip_field(&mut self, number: u32, wire_type: WireType) -> Result<&'a [u8]> {
        let start = self.pos;
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
            WireType::StartGroup => {
                self.skip_group(number, 0)?;
            }
            WireType::EndGroup => {
                return Err(Error::UnmatchedGroup {
                    number,
                    offset: start,
                });
            }
        }
        Ok(&self.data[start..self.pos])
    }

    /// Consume everything up to and including the END_GROUP tag matching
    /// `number`, recursing through nested groups.
    fn skip_group(&mut self, number: u32, depth: usize) -> Result<()> {
        if depth >= RECURSION_LIMIT {
            return Err(Error::RecursionLimit {
                limit: RECURSION_LIMIT,
            });
        }

        loop {
            if !self.has_remaining() {
                return Err(Error::UnmatchedGroup {
                    number,
                    offset: self.pos,
                });
            }

            let (inner_number, inner_type) = self.read_tag()?;
            match inner_type {
                WireType::EndGroup => {
                    return if inner_number == number {
                        Ok(())
                    } else {
                        Err(Error::UnmatchedGroup {
                            number: inner_number,
                            offset: self.pos,
                        })
                    };
                }
                WireType::StartGroup => self.skip_group(inner_number, depth + 1)?,
                other => {
                    self.skip_field(inner_number, other)?;
                }
            }
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::truncated(self.pos, len, self.remaining()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Writer that frames tags and values into a growable buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field tag
    pub fn write_tag(&mut self, number: u32, wire_type: WireType) {
        encode_varint(((number as u64) << 3) | wire_type as u64, &mut self.buf);
    }

    /// Write a raw varint value
    pub fn write_varint(&mut self, value: u64) {
        encode_varint(value, &mut self.buf);
    }

    /// Write a little-endian 32-bit value
    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Write a little-endian 64-bit value
    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Write a varint length prefix followed by the raw bytes
    pub fn write_length_delimited(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// Append raw bytes with no framing (unknown-field re-emission)
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer, returning the encoded buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::Fixed64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::LengthDelimited);
        assert_eq!(WireType::try_from(3).unwrap(), WireType::StartGroup);
        assert_eq!(WireType::try_from(4).unwrap(), WireType::EndGroup);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::Fixed32);
        assert!(WireType::try_from(6).is_err());
        assert!(WireType::try_from(7).is_err());
    }

    #[test]
    fn test_tag_roundtrip() {
        let mut writer = WireWriter::new();
        writer.write_tag(1, WireType::Varint);
        writer.write_tag(16, WireType::LengthDelimited);
        writer.write_tag(MAX_FIELD_NUMBER, WireType::Fixed32);

        let buf = writer.into_bytes();
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_tag().unwrap(), (1, WireType::Varint));
        assert_eq!(reader.read_tag().unwrap(), (16, WireType::LengthDelimited));
        assert_eq!(
            reader.read_tag().unwrap(),
            (MAX_FIELD_NUMBER, WireType::Fixed32)
        );
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_zero_field_number_rejected() {
        // Tag 0x00 = field 0, wire type 0
        let mut reader = WireReader::new(&[0x00, 0x01]);
        assert!(matches!(
            reader.read_tag(),
            Err(Error::InvalidFieldNumber { number: 0, .. })
        ));
    }

    #[test]
    fn test_fixed_reads() {
        let mut writer = WireWriter::new();
        writer.write_fixed32(0xDEAD_BEEF);
        writer.write_fixed64(0x0123_4567_89AB_CDEF);

        let buf = writer.into_bytes();
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_fixed32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_fixed64().unwrap(), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_length_delimited_roundtrip() {
        let mut writer = WireWriter::new();
        writer.write_length_delimited(b"hello");
        writer.write_length_delimited(b"");

        let buf = writer.into_bytes();
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_length_delimited().unwrap(), b"hello");
        assert_eq!(reader.read_length_delimited().unwrap(), b"");
    }

    #[test]
    fn test_truncated_reads() {
        let mut reader = WireReader::new(&[0x01, 0x02]);
        assert!(matches!(
            reader.read_fixed32(),
            Err(Error::TruncatedInput { needed: 4, .. })
        ));

        // Declared length 5, only 2 bytes of payload
        let mut reader = WireReader::new(&[0x05, 0x61, 0x62]);
        assert!(matches!(
            reader.read_length_delimited(),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_skip_captures_raw_bytes() {
        let mut writer = WireWriter::new();
        writer.write_varint(300);
        let buf = writer.into_bytes();
        let mut reader = WireReader::new(&buf);
        assert_eq!(
            reader.skip_field(1, WireType::Varint).unwrap(),
            &[0xAC, 0x02]
        );

        let mut writer = WireWriter::new();
        writer.write_length_delimited(b"abc");
        let buf = writer.into_bytes();
        let mut reader = WireReader::new(&buf);
        // Captured bytes include the length prefix
        assert_eq!(
            reader.skip_field(1, WireType::LengthDelimited).unwrap(),
            &[0x03, b'a', b'b', b'c']
        );

        let mut reader = WireReader::new(&[1, 2, 3, 4, 5, 6, 7, 8, 99]);
        assert_eq!(
            reader.skip_field(1, WireType::Fixed64).unwrap(),
            &[1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_skip_group() {
        // Group field 3 containing varint field 1 = 5, then a nested empty
        // group field 2
        let mut writer = WireWriter::new();
        writer.write_tag(1, WireType::Varint);
        writer.write_varint(5);
        writer.write_tag(2, WireType::StartGroup);
        writer.write_tag(2, WireType::EndGroup);
        writer.write_tag(3, WireType::EndGroup);
        let buf = writer.into_bytes();

        let mut reader = WireReader::new(&buf);
        let captured = reader.skip_field(3, WireType::StartGroup).unwrap();
        assert_eq!(captured, &buf[..]);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_unterminated_group() {
        let mut writer = WireWriter::new();
        writer.write_tag(1, WireType::Varint);
        writer.write_varint(5);
        let buf = writer.into_bytes();

        let mut reader = WireReader::new(&buf);
        assert!(matches!(
            reader.skip_field(3, WireType::StartGroup),
            Err(Error::UnmatchedGroup { .. })
        ));
    }

    #[test]
    fn test_mismatched_group_terminator() {
        let mut writer = WireWriter::new();
        writer.write_tag(7, WireType::EndGroup);
        let buf = writer.into_bytes();

        let mut reader = WireReader::new(&buf);
        assert!(matches!(
            reader.skip_field(3, WireType::StartGroup),
            Err(Error::UnmatchedGroup { number: 7, .. })
        ));
    }
}
