//! CQL type serialization.
//!
//! The type codec turns native values into their CQL wire representations and
//! back, driven by a [`CqlType`] descriptor. It is used on the outbound path
//! to encode bound parameters and routing-key components, and on the inbound
//! path by the frame-body parser to decode result cells.
//!
//! # Supported Types
//!
//! - **Primitives**: boolean, tinyint, smallint, int, bigint, counter, float,
//!   double, decimal, varint, text/ascii/varchar, blob, uuid, timeuuid, inet,
//!   timestamp, date, time, duration
//! - **Collections**: list, set, map
//! - **Structured**: user-defined types, tuples
//! - **Vector**: fixed-dimension homogeneous arrays (a custom type)
//!
//! # Protocol Sensitivity
//!
//! Collection count and element lengths are 2 bytes below protocol v3 and
//! 4 bytes from v3 onward; UDT and tuple element lengths are always 4 bytes.
//! The width is fixed once per [`TypeCodec`] instance from the negotiated
//! protocol version.

pub mod decode;
pub mod encode;
pub mod names;
pub mod reader;
pub mod routing;
pub mod types;

pub use names::{parse_class_name, parse_cql_type_name, UdtResolver};
pub use reader::Reader;
pub use routing::{compose_routing_key, routing_key_from_named_params, routing_key_from_params};
pub use types::{CqlDuration, CqlType, CqlValue, UdtDescriptor};

use bytes::Bytes;
use thiserror::Error;

use crate::frame::ProtocolVersion;

/// Errors raised while encoding or decoding CQL values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Not enough bytes to finish decoding the current value.
    ///
    /// Inside row streaming this signals the parser to buffer the partial
    /// cell and retry on the next fragment; anywhere else it is fatal.
    #[error("unexpected end of input")]
    Incomplete,

    /// String bytes are not valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    /// The value's shape does not match the target type.
    #[error("cannot encode {actual} as {expected}")]
    TypeMismatch {
        /// Name of the CQL type that was requested.
        expected: &'static str,
        /// Shape of the value that was supplied.
        actual: &'static str,
    },

    /// A numeric value does not fit the target representation.
    #[error("{0} out of range")]
    ValueOutOfRange(&'static str),

    /// A vector value's length does not match the declared dimension.
    #[error("vector dimension mismatch: declared {expected}, got {actual}")]
    WrongVectorDimension {
        /// Dimension declared by the type descriptor.
        expected: usize,
        /// Number of elements actually present.
        actual: usize,
    },

    /// Bytes remain after the value was fully decoded.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// The wire type code is not part of the protocol.
    #[error("unknown type code: 0x{0:04X}")]
    UnknownTypeCode(u16),

    /// A type name string could not be parsed.
    #[error("invalid type name: {0}")]
    InvalidTypeName(String),

    /// The unset sentinel was used under a protocol version without it.
    #[error("unset is not supported below protocol v4")]
    UnsetNotSupported,

    /// A null element appeared where the framing cannot express it.
    #[error("null {0} cannot be encoded under 2-byte collection framing")]
    NullNotAllowed(&'static str),

    /// No default wire type could be guessed for the value.
    #[error("no type hint and no guessable type for {0}")]
    NoTypeGuess(&'static str),
}

/// Native representation for arbitrary-precision integer columns.
///
/// Selected once per codec instance; decode produces and encode expects the
/// configured representation (the other one is still accepted on encode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerFormat {
    /// `varint` cells round-trip through [`CqlValue::Varint`].
    #[default]
    Arbitrary,
    /// `varint` cells round-trip through [`CqlValue::BigInt`]; decoding a
    /// value outside the `i64` range fails.
    Int64,
}

/// Codec configuration, chosen once per connection.
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// Native representation for varint values.
    pub integer_format: IntegerFormat,
}

impl CodecConfig {
    /// Configuration with the default integer representation.
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            integer_format: IntegerFormat::default(),
        }
    }
}

/// Result of encoding a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Serialized payload bytes.
    Bytes(Bytes),
    /// Null; written as length -1 with no payload.
    Null,
    /// Unset sentinel (protocol v4+); written as length -2 with no payload.
    Unset,
}

impl Encoded {
    /// Payload bytes, if this is a concrete value.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Encoded::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Bidirectional CQL type codec.
///
/// Cheap to copy; the configuration is read-only after construction and the
/// codec holds no per-call state, so one instance is safely shared by every
/// stream on a connection.
#[derive(Debug, Clone, Copy)]
pub struct TypeCodec {
    version: ProtocolVersion,
    integer_format: IntegerFormat,
}

impl TypeCodec {
    /// Create a codec for the given configuration.
    pub fn new(config: CodecConfig) -> Self {
        Self {
            version: config.version,
            integer_format: config.integer_format,
        }
    }

    /// The protocol version this codec was built for.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The configured varint representation.
    pub fn integer_format(&self) -> IntegerFormat {
        self.integer_format
    }

    /// Width in bytes of list/set/map count and element length prefixes.
    pub(crate) fn collection_len_width(&self) -> usize {
        self.version.collection_len_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::types::{CqlType, CqlValue};

    fn codec(version: ProtocolVersion) -> TypeCodec {
        TypeCodec::new(CodecConfig::new(version))
    }

    fn roundtrip(c: &TypeCodec, value: CqlValue, ty: &CqlType) -> CqlValue {
        let encoded = c.encode(&value, ty).unwrap();
        let bytes = encoded.as_bytes().expect("expected concrete bytes");
        c.decode(bytes, ty).unwrap()
    }

    #[test]
    fn test_roundtrip_primitives_v4() {
        let c = codec(ProtocolVersion::V4);
        let cases: Vec<(CqlValue, CqlType)> = vec![
            (CqlValue::Boolean(true), CqlType::Boolean),
            (CqlValue::Boolean(false), CqlType::Boolean),
            (CqlValue::Tinyint(-5), CqlType::Tinyint),
            (CqlValue::Smallint(-300), CqlType::Smallint),
            (CqlValue::Int(42), CqlType::Int),
            (CqlValue::Int(i32::MIN), CqlType::Int),
            (CqlValue::BigInt(i64::MAX), CqlType::BigInt),
            (CqlValue::Float(1.5), CqlType::Float),
            (CqlValue::Double(-2.25), CqlType::Double),
            (CqlValue::Text("hello".into()), CqlType::Text),
            (CqlValue::Text(String::new()), CqlType::Text),
            (CqlValue::Blob(vec![1, 2, 3]), CqlType::Blob),
            (CqlValue::Blob(vec![]), CqlType::Blob),
        ];
        for (value, ty) in cases {
            assert_eq!(roundtrip(&c, value.clone(), &ty), value, "type {:?}", ty);
        }
    }

    #[test]
    fn test_roundtrip_collections_both_widths() {
        for version in [ProtocolVersion::V2, ProtocolVersion::V4] {
            let c = codec(version);
            let list = CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2), CqlValue::Int(3)]);
            let ty = CqlType::List(Box::new(CqlType::Int));
            assert_eq!(roundtrip(&c, list.clone(), &ty), list, "version {}", version);

            let map = CqlValue::Map(vec![
                (CqlValue::Text("a".into()), CqlValue::Int(1)),
                (CqlValue::Text("b".into()), CqlValue::Int(2)),
            ]);
            let mty = CqlType::Map(Box::new(CqlType::Text), Box::new(CqlType::Int));
            assert_eq!(roundtrip(&c, map.clone(), &mty), map, "version {}", version);
        }
    }

    #[test]
    fn test_empty_list_encodes_as_null() {
        let c = codec(ProtocolVersion::V4);
        let ty = CqlType::List(Box::new(CqlType::Int));
        let encoded = c.encode(&CqlValue::List(vec![]), &ty).unwrap();
        assert_eq!(encoded, Encoded::Null);
        // And the absent buffer decodes back to null, not an empty list.
        assert_eq!(c.decode(&[], &ty).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_unset_requires_v4() {
        let ty = CqlType::Int;
        let v4 = codec(ProtocolVersion::V4);
        assert_eq!(v4.encode(&CqlValue::Unset, &ty).unwrap(), Encoded::Unset);

        let v3 = codec(ProtocolVersion::V3);
        assert_eq!(
            v3.encode(&CqlValue::Unset, &ty).unwrap_err(),
            CodecError::UnsetNotSupported
        );
    }

    #[test]
    fn test_type_mismatch() {
        let c = codec(ProtocolVersion::V4);
        let err = c.encode(&CqlValue::Boolean(true), &CqlType::Int).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }
}
