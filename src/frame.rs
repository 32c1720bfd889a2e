//! Frame layer: protocol versions, opcodes, flags and headers.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CqlError, CqlResult};

/// CQL binary protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// Protocol v1 (Cassandra 1.2).
    V1 = 1,
    /// Protocol v2 (Cassandra 2.0).
    V2 = 2,
    /// Protocol v3 (Cassandra 2.1): 16-bit stream ids, 4-byte collection
    /// lengths.
    V3 = 3,
    /// Protocol v4 (Cassandra 2.2): unset values, failure details.
    V4 = 4,
    /// Protocol v5 (Cassandra 4.0).
    V5 = 5,
}

impl ProtocolVersion {
    /// Parse a version number (direction bit already stripped).
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            4 => Some(ProtocolVersion::V4),
            5 => Some(ProtocolVersion::V5),
            _ => None,
        }
    }

    /// Version number as it appears on the wire (without the direction bit).
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Header width: 8 bytes below v3 (8-bit stream id), 9 from v3 on.
    pub fn header_len(&self) -> usize {
        if *self >= ProtocolVersion::V3 {
            9
        } else {
            8
        }
    }

    /// Width of collection count and element-length prefixes.
    pub fn collection_len_width(&self) -> usize {
        if *self >= ProtocolVersion::V3 {
            4
        } else {
            2
        }
    }

    /// Whether the unset value sentinel exists in this version.
    pub fn supports_unset(&self) -> bool {
        *self >= ProtocolVersion::V4
    }

    /// Highest stream id usable under this version.
    pub fn max_stream_id(&self) -> i16 {
        if *self >= ProtocolVersion::V3 {
            i16::MAX
        } else {
            i8::MAX as i16
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.code())
    }
}

/// Frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Server-reported error.
    Error = 0x00,
    /// Connection initialization.
    Startup = 0x01,
    /// Server is ready.
    Ready = 0x02,
    /// Server requires authentication.
    Authenticate = 0x03,
    /// Supported-options request.
    Options = 0x05,
    /// Supported-options response.
    Supported = 0x06,
    /// Unprepared query.
    Query = 0x07,
    /// Query/prepare/execute result.
    Result = 0x08,
    /// Statement preparation.
    Prepare = 0x09,
    /// Prepared-statement execution.
    Execute = 0x0A,
    /// Event registration.
    Register = 0x0B,
    /// Server push event.
    Event = 0x0C,
    /// Batch of statements.
    Batch = 0x0D,
    /// Authentication challenge.
    AuthChallenge = 0x0E,
    /// Authentication response.
    AuthResponse = 0x0F,
    /// Authentication success.
    AuthSuccess = 0x10,
}

impl Opcode {
    /// Parse an opcode byte.
    pub fn from_u8(code: u8) -> CqlResult<Self> {
        match code {
            0x00 => Ok(Opcode::Error),
            0x01 => Ok(Opcode::Startup),
            0x02 => Ok(Opcode::Ready),
            0x03 => Ok(Opcode::Authenticate),
            0x05 => Ok(Opcode::Options),
            0x06 => Ok(Opcode::Supported),
            0x07 => Ok(Opcode::Query),
            0x08 => Ok(Opcode::Result),
            0x09 => Ok(Opcode::Prepare),
            0x0A => Ok(Opcode::Execute),
            0x0B => Ok(Opcode::Register),
            0x0C => Ok(Opcode::Event),
            0x0D => Ok(Opcode::Batch),
            0x0E => Ok(Opcode::AuthChallenge),
            0x0F => Ok(Opcode::AuthResponse),
            0x10 => Ok(Opcode::AuthSuccess),
            other => Err(CqlError::UnknownOpcode(other)),
        }
    }

    /// Opcode byte.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Frame header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Body is compressed.
    pub const COMPRESSION: u8 = 0x01;
    /// Tracing requested / tracing id present.
    pub const TRACING: u8 = 0x02;
    /// Custom payload precedes the body.
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    /// Warnings precede the body.
    pub const WARNING: u8 = 0x08;
    /// Client opted into a beta protocol version.
    pub const USE_BETA: u8 = 0x10;

    /// Wrap raw flag bits.
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether all bits in `flag` are set.
    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }
}

/// A parsed frame header, immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version of the frame.
    pub version: ProtocolVersion,
    /// Header flags.
    pub flags: FrameFlags,
    /// Stream id: 8-bit on the wire below v3, 16-bit from v3.
    pub stream: i16,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Declared body length in bytes.
    pub body_len: u32,
}

impl FrameHeader {
    /// Parse a header from its fixed-width wire bytes.
    ///
    /// The slice must hold the full header for the version named in its first
    /// byte; the direction bit is ignored.
    pub fn parse(buf: &[u8]) -> CqlResult<Self> {
        let first = *buf
            .first()
            .ok_or_else(|| CqlError::Protocol("empty header".to_string()))?;
        let version = ProtocolVersion::from_u8(first & 0x7F)
            .ok_or(CqlError::UnsupportedVersion(first & 0x7F))?;
        if buf.len() < version.header_len() {
            return Err(CqlError::Protocol(format!(
                "header needs {} bytes, got {}",
                version.header_len(),
                buf.len()
            )));
        }
        let flags = FrameFlags::new(buf[1]);
        let (stream, opcode_at) = if version >= ProtocolVersion::V3 {
            (i16::from_be_bytes([buf[2], buf[3]]), 4)
        } else {
            (buf[2] as i8 as i16, 3)
        };
        let opcode = Opcode::from_u8(buf[opcode_at])?;
        let body_len = u32::from_be_bytes([
            buf[opcode_at + 1],
            buf[opcode_at + 2],
            buf[opcode_at + 3],
            buf[opcode_at + 4],
        ]);
        Ok(FrameHeader {
            version,
            flags,
            stream,
            opcode,
            body_len,
        })
    }

    /// Serialize a request-direction header (direction bit clear).
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version.code());
        buf.put_u8(self.flags.bits());
        if self.version >= ProtocolVersion::V3 {
            buf.put_i16(self.stream);
        } else {
            buf.put_i8(self.stream as i8);
        }
        buf.put_u8(self.opcode.as_u8());
        buf.put_u32(self.body_len);
    }
}

/// One splitter output: a header plus a zero-copy body fragment.
///
/// A frame whose body spans several input chunks yields several items with
/// the same header; `is_final` marks the fragment that completes the declared
/// body length.
#[derive(Debug, Clone)]
pub struct FrameItem {
    /// Header of the frame this fragment belongs to.
    pub header: FrameHeader,
    /// Body bytes carried by this fragment; may be empty.
    pub body: Bytes,
    /// Whether this fragment completes the frame.
    pub is_final: bool,
}

/// An outbound frame, serialized by the splitter's `Encoder` impl.
///
/// The stream id is assigned by the multiplexer before the frame reaches the
/// encoder.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    /// Protocol version to serialize under.
    pub version: ProtocolVersion,
    /// Header flags.
    pub flags: FrameFlags,
    /// Multiplexer-assigned stream id.
    pub stream: i16,
    /// Request opcode.
    pub opcode: Opcode,
    /// Complete serialized body.
    pub body: Bytes,
}

impl RequestFrame {
    /// Header for this request.
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            version: self.version,
            flags: self.flags,
            stream: self.stream,
            opcode: self.opcode,
            body_len: self.body.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_predicates() {
        assert_eq!(ProtocolVersion::V2.header_len(), 8);
        assert_eq!(ProtocolVersion::V3.header_len(), 9);
        assert_eq!(ProtocolVersion::V2.collection_len_width(), 2);
        assert_eq!(ProtocolVersion::V4.collection_len_width(), 4);
        assert!(!ProtocolVersion::V3.supports_unset());
        assert!(ProtocolVersion::V4.supports_unset());
        assert_eq!(ProtocolVersion::V2.max_stream_id(), 127);
        assert_eq!(ProtocolVersion::V4.max_stream_id(), 32767);
        assert_eq!(ProtocolVersion::from_u8(6), None);
        assert_eq!(ProtocolVersion::V4.to_string(), "v4");
    }

    #[test]
    fn test_opcode_roundtrip() {
        for code in [0x00u8, 0x01, 0x02, 0x03, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10]
        {
            assert_eq!(Opcode::from_u8(code).unwrap().as_u8(), code);
        }
        assert!(matches!(
            Opcode::from_u8(0x04),
            Err(CqlError::UnknownOpcode(0x04))
        ));
        assert!(matches!(
            Opcode::from_u8(0x42),
            Err(CqlError::UnknownOpcode(0x42))
        ));
    }

    #[test]
    fn test_parse_v4_response_header() {
        // response direction bit set, stream 5, RESULT, 100-byte body
        let buf = [0x84, 0x00, 0x00, 0x05, 0x08, 0x00, 0x00, 0x00, 0x64];
        let header = FrameHeader::parse(&buf).unwrap();
        assert_eq!(header.version, ProtocolVersion::V4);
        assert_eq!(header.stream, 5);
        assert_eq!(header.opcode, Opcode::Result);
        assert_eq!(header.body_len, 100);
    }

    #[test]
    fn test_parse_v2_header_signed_stream() {
        // 8-byte header; stream -1 is an event frame
        let buf = [0x82, 0x00, 0xFF, 0x0C, 0x00, 0x00, 0x00, 0x00];
        let header = FrameHeader::parse(&buf).unwrap();
        assert_eq!(header.version, ProtocolVersion::V2);
        assert_eq!(header.stream, -1);
        assert_eq!(header.opcode, Opcode::Event);
        assert_eq!(header.body_len, 0);
    }

    #[test]
    fn test_parse_unsupported_version() {
        let buf = [0x89, 0x00, 0x00, 0x05, 0x08, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            FrameHeader::parse(&buf),
            Err(CqlError::UnsupportedVersion(0x09))
        ));
    }

    #[test]
    fn test_header_encode_parse_roundtrip() {
        let header = FrameHeader {
            version: ProtocolVersion::V4,
            flags: FrameFlags::default(),
            stream: 300,
            opcode: Opcode::Query,
            body_len: 17,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), 9);
        assert_eq!(FrameHeader::parse(&buf).unwrap(), header);
    }

    #[test]
    fn test_flags() {
        let flags = FrameFlags::new(FrameFlags::WARNING | FrameFlags::TRACING);
        assert!(flags.contains(FrameFlags::WARNING));
        assert!(flags.contains(FrameFlags::TRACING));
        assert!(!flags.contains(FrameFlags::COMPRESSION));
    }
}
