//! CQL type descriptors and native values.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire type codes as they appear in result metadata.
pub mod type_code {
    /// Custom type (class name follows).
    pub const CUSTOM: u16 = 0x0000;
    /// ASCII string.
    pub const ASCII: u16 = 0x0001;
    /// 64-bit signed integer.
    pub const BIGINT: u16 = 0x0002;
    /// Raw bytes.
    pub const BLOB: u16 = 0x0003;
    /// Boolean.
    pub const BOOLEAN: u16 = 0x0004;
    /// Distributed counter.
    pub const COUNTER: u16 = 0x0005;
    /// Arbitrary-precision decimal.
    pub const DECIMAL: u16 = 0x0006;
    /// 64-bit IEEE 754 float.
    pub const DOUBLE: u16 = 0x0007;
    /// 32-bit IEEE 754 float.
    pub const FLOAT: u16 = 0x0008;
    /// 32-bit signed integer.
    pub const INT: u16 = 0x0009;
    /// UTF-8 string.
    pub const TEXT: u16 = 0x000A;
    /// Millisecond timestamp.
    pub const TIMESTAMP: u16 = 0x000B;
    /// UUID.
    pub const UUID: u16 = 0x000C;
    /// UTF-8 string (alias of text).
    pub const VARCHAR: u16 = 0x000D;
    /// Arbitrary-precision integer.
    pub const VARINT: u16 = 0x000E;
    /// Version-1 UUID.
    pub const TIMEUUID: u16 = 0x000F;
    /// IPv4/IPv6 address.
    pub const INET: u16 = 0x0010;
    /// Days-since-epoch date.
    pub const DATE: u16 = 0x0011;
    /// Nanoseconds-since-midnight time.
    pub const TIME: u16 = 0x0012;
    /// 16-bit signed integer.
    pub const SMALLINT: u16 = 0x0013;
    /// 8-bit signed integer.
    pub const TINYINT: u16 = 0x0014;
    /// Month/day/nanosecond duration.
    pub const DURATION: u16 = 0x0015;
    /// List collection.
    pub const LIST: u16 = 0x0020;
    /// Map collection.
    pub const MAP: u16 = 0x0021;
    /// Set collection.
    pub const SET: u16 = 0x0022;
    /// User-defined type.
    pub const UDT: u16 = 0x0030;
    /// Tuple.
    pub const TUPLE: u16 = 0x0031;
}

/// A CQL type descriptor.
///
/// Constructed once per column or parameter (from result metadata or a parsed
/// type name) and reused for every encode/decode against that position.
/// Parametric types carry their nested descriptors; decode fails rather than
/// guesses when the nesting does not match the wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlType {
    /// Custom type identified by a fully-qualified class name.
    Custom(String),
    /// ASCII string.
    Ascii,
    /// 64-bit signed integer.
    BigInt,
    /// Raw bytes.
    Blob,
    /// Boolean.
    Boolean,
    /// Distributed counter (64-bit).
    Counter,
    /// Arbitrary-precision decimal.
    Decimal,
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// UTF-8 string.
    Text,
    /// Millisecond-precision timestamp.
    Timestamp,
    /// UUID.
    Uuid,
    /// UTF-8 string (wire alias of text).
    Varchar,
    /// Arbitrary-precision integer.
    Varint,
    /// Version-1 UUID.
    Timeuuid,
    /// IPv4 or IPv6 address.
    Inet,
    /// Date as days since epoch.
    Date,
    /// Time as nanoseconds since midnight.
    Time,
    /// 16-bit signed integer.
    Smallint,
    /// 8-bit signed integer.
    Tinyint,
    /// Month/day/nanosecond duration.
    Duration,
    /// List of a single element type.
    List(Box<CqlType>),
    /// Map of key and value types.
    Map(Box<CqlType>, Box<CqlType>),
    /// Set of a single element type.
    Set(Box<CqlType>),
    /// User-defined type.
    Udt(UdtDescriptor),
    /// Tuple with an ordered list of element types.
    Tuple(Vec<CqlType>),
    /// Fixed-dimension homogeneous vector.
    Vector {
        /// Element type.
        element: Box<CqlType>,
        /// Declared number of elements; part of the type, not the wire bytes.
        dimensions: usize,
    },
}

/// A user-defined type: a named, ordered set of (name, type) fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtDescriptor {
    /// Keyspace the type is defined in.
    pub keyspace: String,
    /// Type name.
    pub name: String,
    /// Fields in declared order.
    pub fields: Vec<(String, CqlType)>,
}

impl CqlType {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            CqlType::Custom(_) => "custom",
            CqlType::Ascii => "ascii",
            CqlType::BigInt => "bigint",
            CqlType::Blob => "blob",
            CqlType::Boolean => "boolean",
            CqlType::Counter => "counter",
            CqlType::Decimal => "decimal",
            CqlType::Double => "double",
            CqlType::Float => "float",
            CqlType::Int => "int",
            CqlType::Text => "text",
            CqlType::Timestamp => "timestamp",
            CqlType::Uuid => "uuid",
            CqlType::Varchar => "varchar",
            CqlType::Varint => "varint",
            CqlType::Timeuuid => "timeuuid",
            CqlType::Inet => "inet",
            CqlType::Date => "date",
            CqlType::Time => "time",
            CqlType::Smallint => "smallint",
            CqlType::Tinyint => "tinyint",
            CqlType::Duration => "duration",
            CqlType::List(_) => "list",
            CqlType::Map(_, _) => "map",
            CqlType::Set(_) => "set",
            CqlType::Udt(_) => "udt",
            CqlType::Tuple(_) => "tuple",
            CqlType::Vector { .. } => "vector",
        }
    }

    /// Fixed wire width in bytes, for types whose serialized form always has
    /// the same size. Vectors of such elements omit per-element framing.
    pub fn fixed_wire_width(&self) -> Option<usize> {
        match self {
            CqlType::Boolean | CqlType::Tinyint => Some(1),
            CqlType::Smallint => Some(2),
            CqlType::Int | CqlType::Float | CqlType::Date => Some(4),
            CqlType::BigInt
            | CqlType::Counter
            | CqlType::Double
            | CqlType::Timestamp
            | CqlType::Time => Some(8),
            CqlType::Uuid | CqlType::Timeuuid => Some(16),
            _ => None,
        }
    }
}

/// A native CQL value.
///
/// The wire representation is determined by the [`CqlType`] it is encoded
/// against, not by the variant alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CqlValue {
    /// Null.
    Null,
    /// Unset sentinel (protocol v4+); distinct from null.
    Unset,
    /// Boolean.
    Boolean(bool),
    /// 8-bit signed integer.
    Tinyint(i8),
    /// 16-bit signed integer.
    Smallint(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer (bigint, counter, or varint under
    /// [`IntegerFormat::Int64`](crate::codec::IntegerFormat::Int64)).
    BigInt(i64),
    /// Arbitrary-precision integer.
    Varint(BigInt),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Arbitrary-precision decimal: unscaled magnitude and scale.
    Decimal {
        /// Unscaled two's-complement magnitude.
        unscaled: BigInt,
        /// Decimal scale (power-of-ten divisor).
        scale: i32,
    },
    /// UTF-8 string (text, ascii, varchar).
    Text(String),
    /// Raw bytes (blob or custom types).
    Blob(Vec<u8>),
    /// UUID (uuid or timeuuid).
    Uuid(Uuid),
    /// Millisecond-precision timestamp.
    Timestamp(DateTime<Utc>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day with nanosecond precision.
    Time(NaiveTime),
    /// IPv4 or IPv6 address.
    Inet(IpAddr),
    /// Month/day/nanosecond duration.
    Duration(CqlDuration),
    /// List of values.
    List(Vec<CqlValue>),
    /// Set of values (order preserved as decoded).
    Set(Vec<CqlValue>),
    /// Map entries in encounter order; keys may be any CQL value.
    Map(Vec<(CqlValue, CqlValue)>),
    /// User-defined type value: (field name, value) pairs.
    Udt(Vec<(String, CqlValue)>),
    /// Tuple of values.
    Tuple(Vec<CqlValue>),
    /// Fixed-dimension vector of values.
    Vector(Vec<CqlValue>),
}

/// CQL duration: months, days and nanoseconds, all independently signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlDuration {
    /// Whole months.
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Nanoseconds.
    pub nanoseconds: i64,
}

impl CqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CqlValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as a 32-bit integer.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            CqlValue::Int(i) => Some(*i),
            CqlValue::Smallint(i) => Some(*i as i32),
            CqlValue::Tinyint(i) => Some(*i as i32),
            _ => None,
        }
    }

    /// Try to get as a 64-bit integer.
    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            CqlValue::BigInt(i) => Some(*i),
            CqlValue::Int(i) => Some(*i as i64),
            CqlValue::Smallint(i) => Some(*i as i64),
            CqlValue::Tinyint(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as a 64-bit float.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            CqlValue::Double(f) => Some(*f),
            CqlValue::Float(f) => Some(*f as f64),
            _ => None,
        }
    }

    /// Try to get as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a byte slice.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            CqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as a list slice (list, set, tuple or vector).
    pub fn as_list(&self) -> Option<&[CqlValue]> {
        match self {
            CqlValue::List(l) | CqlValue::Set(l) | CqlValue::Tuple(l) | CqlValue::Vector(l) => {
                Some(l)
            }
            _ => None,
        }
    }

    /// Look up a UDT field by name.
    pub fn udt_field(&self, name: &str) -> Option<&CqlValue> {
        match self {
            CqlValue::Udt(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Shape name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            CqlValue::Null => "null",
            CqlValue::Unset => "unset",
            CqlValue::Boolean(_) => "boolean",
            CqlValue::Tinyint(_) => "tinyint",
            CqlValue::Smallint(_) => "smallint",
            CqlValue::Int(_) => "int",
            CqlValue::BigInt(_) => "bigint",
            CqlValue::Varint(_) => "varint",
            CqlValue::Float(_) => "float",
            CqlValue::Double(_) => "double",
            CqlValue::Decimal { .. } => "decimal",
            CqlValue::Text(_) => "text",
            CqlValue::Blob(_) => "blob",
            CqlValue::Uuid(_) => "uuid",
            CqlValue::Timestamp(_) => "timestamp",
            CqlValue::Date(_) => "date",
            CqlValue::Time(_) => "time",
            CqlValue::Inet(_) => "inet",
            CqlValue::Duration(_) => "duration",
            CqlValue::List(_) => "list",
            CqlValue::Set(_) => "set",
            CqlValue::Map(_) => "map",
            CqlValue::Udt(_) => "udt",
            CqlValue::Tuple(_) => "tuple",
            CqlValue::Vector(_) => "vector",
        }
    }
}

// Conversion traits
impl From<bool> for CqlValue {
    fn from(v: bool) -> Self {
        CqlValue::Boolean(v)
    }
}

impl From<i32> for CqlValue {
    fn from(v: i32) -> Self {
        CqlValue::Int(v)
    }
}

impl From<i64> for CqlValue {
    fn from(v: i64) -> Self {
        CqlValue::BigInt(v)
    }
}

impl From<f64> for CqlValue {
    fn from(v: f64) -> Self {
        CqlValue::Double(v)
    }
}

impl From<String> for CqlValue {
    fn from(v: String) -> Self {
        CqlValue::Text(v)
    }
}

impl From<&str> for CqlValue {
    fn from(v: &str) -> Self {
        CqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for CqlValue {
    fn from(v: Vec<u8>) -> Self {
        CqlValue::Blob(v)
    }
}

impl From<Uuid> for CqlValue {
    fn from(v: Uuid) -> Self {
        CqlValue::Uuid(v)
    }
}

impl From<IpAddr> for CqlValue {
    fn from(v: IpAddr) -> Self {
        CqlValue::Inet(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        assert!(CqlValue::Null.is_null());
        assert!(!CqlValue::Unset.is_null());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(CqlValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(CqlValue::Int(7).as_int(), Some(7));
        assert_eq!(CqlValue::Smallint(7).as_int(), Some(7));
        assert_eq!(CqlValue::Int(7).as_bigint(), Some(7));
        assert_eq!(CqlValue::Float(1.5).as_double(), Some(1.5));
        assert_eq!(CqlValue::Text("x".into()).as_str(), Some("x"));
        assert_eq!(CqlValue::Blob(vec![1]).as_blob(), Some(&[1u8][..]));
        assert_eq!(CqlValue::Text("x".into()).as_int(), None);
    }

    #[test]
    fn test_udt_field_lookup() {
        let udt = CqlValue::Udt(vec![
            ("street".to_string(), CqlValue::Text("main".into())),
            ("zip".to_string(), CqlValue::Int(12345)),
        ]);
        assert_eq!(udt.udt_field("zip"), Some(&CqlValue::Int(12345)));
        assert_eq!(udt.udt_field("missing"), None);
    }

    #[test]
    fn test_fixed_wire_width() {
        assert_eq!(CqlType::Int.fixed_wire_width(), Some(4));
        assert_eq!(CqlType::Double.fixed_wire_width(), Some(8));
        assert_eq!(CqlType::Uuid.fixed_wire_width(), Some(16));
        assert_eq!(CqlType::Text.fixed_wire_width(), None);
        assert_eq!(CqlType::Inet.fixed_wire_width(), None);
        assert_eq!(CqlType::Varint.fixed_wire_width(), None);
    }

    #[test]
    fn test_from_conversions() {
        let _: CqlValue = true.into();
        let _: CqlValue = 42i32.into();
        let _: CqlValue = 42i64.into();
        let _: CqlValue = 3.25f64.into();
        let _: CqlValue = "hello".into();
        let _: CqlValue = vec![1u8, 2, 3].into();
    }

    #[test]
    fn test_type_names() {
        assert_eq!(CqlType::List(Box::new(CqlType::Int)).name(), "list");
        assert_eq!(CqlValue::Vector(vec![]).type_name(), "vector");
    }
}
