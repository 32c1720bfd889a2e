//! Value encoding: native values to CQL wire bytes.

use bytes::{BufMut, BytesMut};
use chrono::Timelike;
use num_bigint::BigInt;
use uuid::Uuid;

use super::reader::{write_signed_vint, write_unsigned_vint};
use super::types::{CqlType, CqlValue};
use super::{CodecError, Encoded, TypeCodec};

impl TypeCodec {
    /// Encode a value against a type descriptor.
    ///
    /// Null values encode to [`Encoded::Null`] (length -1 on the wire) and the
    /// unset sentinel to [`Encoded::Unset`] (length -2, protocol v4+ only).
    /// An empty list or set also encodes as null for backward compatibility.
    pub fn encode(&self, value: &CqlValue, ty: &CqlType) -> Result<Encoded, CodecError> {
        match value {
            CqlValue::Null => Ok(Encoded::Null),
            CqlValue::Unset => {
                if self.version().supports_unset() {
                    Ok(Encoded::Unset)
                } else {
                    Err(CodecError::UnsetNotSupported)
                }
            }
            CqlValue::List(items) | CqlValue::Set(items)
                if items.is_empty() && matches!(ty, CqlType::List(_) | CqlType::Set(_)) =>
            {
                Ok(Encoded::Null)
            }
            _ => {
                let mut buf = BytesMut::new();
                self.encode_into(&mut buf, value, ty)?;
                Ok(Encoded::Bytes(buf.freeze()))
            }
        }
    }

    /// Encode a value without an explicit type hint, guessing the wire type
    /// from the value's shape. An unguessable shape is an encoding error.
    pub fn encode_guessed(&self, value: &CqlValue) -> Result<Encoded, CodecError> {
        match value {
            CqlValue::Null => Ok(Encoded::Null),
            CqlValue::Unset => self.encode(value, &CqlType::Blob),
            _ => {
                let ty = self
                    .guess_type(value)
                    .ok_or(CodecError::NoTypeGuess(value.type_name()))?;
                self.encode(value, &ty)
            }
        }
    }

    fn encode_into(
        &self,
        buf: &mut BytesMut,
        value: &CqlValue,
        ty: &CqlType,
    ) -> Result<(), CodecError> {
        match ty {
            CqlType::Boolean => match value {
                CqlValue::Boolean(b) => {
                    buf.put_u8(*b as u8);
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Tinyint => {
                let v = match value {
                    CqlValue::Tinyint(v) => *v,
                    CqlValue::Int(v) => narrow(*v as i64, i8::MIN as i64, i8::MAX as i64, "tinyint")? as i8,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_i8(v);
                Ok(())
            }
            CqlType::Smallint => {
                let v = match value {
                    CqlValue::Smallint(v) => *v,
                    CqlValue::Tinyint(v) => *v as i16,
                    CqlValue::Int(v) => {
                        narrow(*v as i64, i16::MIN as i64, i16::MAX as i64, "smallint")? as i16
                    }
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_i16(v);
                Ok(())
            }
            CqlType::Int => {
                let v = match value {
                    CqlValue::Int(v) => *v,
                    CqlValue::Smallint(v) => *v as i32,
                    CqlValue::Tinyint(v) => *v as i32,
                    // documented string fallback for numeric columns
                    CqlValue::Text(s) => s
                        .parse::<i32>()
                        .map_err(|_| CodecError::ValueOutOfRange("int"))?,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_i32(v);
                Ok(())
            }
            CqlType::BigInt | CqlType::Counter => {
                let v = bigint_value(value).ok_or_else(|| mismatch(ty, value))?;
                buf.put_i64(v);
                Ok(())
            }
            CqlType::Float => {
                let v = match value {
                    CqlValue::Float(v) => *v,
                    CqlValue::Text(s) => s
                        .parse::<f32>()
                        .map_err(|_| CodecError::ValueOutOfRange("float"))?,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_f32(v);
                Ok(())
            }
            CqlType::Double => {
                let v = match value {
                    CqlValue::Double(v) => *v,
                    CqlValue::Float(v) => *v as f64,
                    CqlValue::Int(v) => *v as f64,
                    CqlValue::BigInt(v) => *v as f64,
                    CqlValue::Text(s) => s
                        .parse::<f64>()
                        .map_err(|_| CodecError::ValueOutOfRange("double"))?,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_f64(v);
                Ok(())
            }
            CqlType::Decimal => match value {
                CqlValue::Decimal { unscaled, scale } => {
                    buf.put_i32(*scale);
                    buf.put_slice(&unscaled.to_signed_bytes_be());
                    Ok(())
                }
                CqlValue::Varint(v) => {
                    buf.put_i32(0);
                    buf.put_slice(&v.to_signed_bytes_be());
                    Ok(())
                }
                CqlValue::Int(v) => {
                    buf.put_i32(0);
                    buf.put_slice(&varint_bytes(*v as i64));
                    Ok(())
                }
                CqlValue::BigInt(v) => {
                    buf.put_i32(0);
                    buf.put_slice(&varint_bytes(*v));
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Varint => match value {
                CqlValue::Varint(v) => {
                    buf.put_slice(&v.to_signed_bytes_be());
                    Ok(())
                }
                CqlValue::BigInt(v) => {
                    buf.put_slice(&varint_bytes(*v));
                    Ok(())
                }
                CqlValue::Int(v) => {
                    buf.put_slice(&varint_bytes(*v as i64));
                    Ok(())
                }
                CqlValue::Text(s) => {
                    let v = BigInt::parse_bytes(s.as_bytes(), 10)
                        .ok_or(CodecError::ValueOutOfRange("varint"))?;
                    buf.put_slice(&v.to_signed_bytes_be());
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Text | CqlType::Ascii | CqlType::Varchar => match value {
                CqlValue::Text(s) => {
                    buf.put_slice(s.as_bytes());
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Blob | CqlType::Custom(_) => match value {
                CqlValue::Blob(b) => {
                    buf.put_slice(b);
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Uuid | CqlType::Timeuuid => {
                let u = match value {
                    CqlValue::Uuid(u) => *u,
                    CqlValue::Text(s) => {
                        Uuid::parse_str(s).map_err(|_| CodecError::ValueOutOfRange("uuid"))?
                    }
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_slice(u.as_bytes());
                Ok(())
            }
            CqlType::Timestamp => {
                let millis = match value {
                    CqlValue::Timestamp(dt) => dt.timestamp_millis(),
                    CqlValue::BigInt(ms) => *ms,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_i64(millis);
                Ok(())
            }
            CqlType::Date => match value {
                CqlValue::Date(d) => {
                    let days = d
                        .signed_duration_since(chrono::NaiveDate::default())
                        .num_days();
                    let raw = days + (1i64 << 31);
                    if !(0..=u32::MAX as i64).contains(&raw) {
                        return Err(CodecError::ValueOutOfRange("date"));
                    }
                    buf.put_u32(raw as u32);
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::Time => {
                let nanos = match value {
                    CqlValue::Time(t) => {
                        t.num_seconds_from_midnight() as i64 * 1_000_000_000
                            + t.nanosecond() as i64
                    }
                    CqlValue::BigInt(n) => *n,
                    _ => return Err(mismatch(ty, value)),
                };
                buf.put_i64(nanos);
                Ok(())
            }
            CqlType::Inet => {
                let addr = match value {
                    CqlValue::Inet(ip) => *ip,
                    CqlValue::Text(s) => s
                        .parse()
                        .map_err(|_| CodecError::ValueOutOfRange("inet"))?,
                    _ => return Err(mismatch(ty, value)),
                };
                match addr {
                    std::net::IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
                    std::net::IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
                }
                Ok(())
            }
            CqlType::Duration => match value {
                CqlValue::Duration(d) => {
                    write_signed_vint(buf, d.months as i64);
                    write_signed_vint(buf, d.days as i64);
                    write_signed_vint(buf, d.nanoseconds);
                    Ok(())
                }
                _ => Err(mismatch(ty, value)),
            },
            CqlType::List(elem) | CqlType::Set(elem) => {
                let items = match value {
                    CqlValue::List(items) | CqlValue::Set(items) | CqlValue::Vector(items) => items,
                    _ => return Err(mismatch(ty, value)),
                };
                self.write_count(buf, items.len())?;
                for item in items {
                    self.write_element(buf, item, elem)?;
                }
                Ok(())
            }
            CqlType::Map(kty, vty) => {
                let entries = match value {
                    CqlValue::Map(entries) => entries,
                    _ => return Err(mismatch(ty, value)),
                };
                self.write_count(buf, entries.len())?;
                for (k, v) in entries {
                    self.write_element(buf, k, kty)?;
                    self.write_element(buf, v, vty)?;
                }
                Ok(())
            }
            CqlType::Udt(desc) => {
                let fields = match value {
                    CqlValue::Udt(fields) => fields,
                    _ => return Err(mismatch(ty, value)),
                };
                // trailing value fields not declared by the type are ignored
                for (name, fty) in &desc.fields {
                    let field = fields.iter().find(|(n, _)| n == name).map(|(_, v)| v);
                    self.write_framed(buf, field.unwrap_or(&CqlValue::Null), fty)?;
                }
                Ok(())
            }
            CqlType::Tuple(types) => {
                let items = match value {
                    CqlValue::Tuple(items) | CqlValue::List(items) => items,
                    _ => return Err(mismatch(ty, value)),
                };
                for (idx, ety) in types.iter().enumerate() {
                    self.write_framed(buf, items.get(idx).unwrap_or(&CqlValue::Null), ety)?;
                }
                Ok(())
            }
            CqlType::Vector {
                element,
                dimensions,
            } => {
                let items = match value {
                    CqlValue::Vector(items) | CqlValue::List(items) => items,
                    _ => return Err(mismatch(ty, value)),
                };
                if items.len() != *dimensions {
                    return Err(CodecError::WrongVectorDimension {
                        expected: *dimensions,
                        actual: items.len(),
                    });
                }
                let fixed = element.fixed_wire_width();
                for item in items {
                    let encoded = match self.encode(item, element)? {
                        Encoded::Bytes(b) => b,
                        _ => return Err(CodecError::NullNotAllowed("vector element")),
                    };
                    match fixed {
                        Some(_) => buf.put_slice(&encoded),
                        None => {
                            write_unsigned_vint(buf, encoded.len() as u64);
                            buf.put_slice(&encoded);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Write a list/set/map count with the version-dependent width.
    fn write_count(&self, buf: &mut BytesMut, count: usize) -> Result<(), CodecError> {
        if self.collection_len_width() == 2 {
            if count > u16::MAX as usize {
                return Err(CodecError::ValueOutOfRange("collection size"));
            }
            buf.put_u16(count as u16);
        } else {
            if count > i32::MAX as usize {
                return Err(CodecError::ValueOutOfRange("collection size"));
            }
            buf.put_i32(count as i32);
        }
        Ok(())
    }

    /// Write a collection element with the version-dependent length prefix.
    fn write_element(
        &self,
        buf: &mut BytesMut,
        value: &CqlValue,
        ty: &CqlType,
    ) -> Result<(), CodecError> {
        match self.encode(value, ty)? {
            Encoded::Bytes(b) => {
                if self.collection_len_width() == 2 {
                    if b.len() > u16::MAX as usize {
                        return Err(CodecError::ValueOutOfRange("collection element length"));
                    }
                    buf.put_u16(b.len() as u16);
                } else {
                    buf.put_i32(b.len() as i32);
                }
                buf.put_slice(&b);
                Ok(())
            }
            Encoded::Null => {
                if self.collection_len_width() == 2 {
                    return Err(CodecError::NullNotAllowed("collection element"));
                }
                buf.put_i32(-1);
                Ok(())
            }
            Encoded::Unset => Err(CodecError::TypeMismatch {
                expected: ty.name(),
                actual: "unset",
            }),
        }
    }

    /// Write a UDT/tuple element: always a 4-byte length, with -1 and -2 as
    /// the null and unset sentinels.
    fn write_framed(
        &self,
        buf: &mut BytesMut,
        value: &CqlValue,
        ty: &CqlType,
    ) -> Result<(), CodecError> {
        match self.encode(value, ty)? {
            Encoded::Bytes(b) => {
                buf.put_i32(b.len() as i32);
                buf.put_slice(&b);
            }
            Encoded::Null => buf.put_i32(-1),
            Encoded::Unset => buf.put_i32(-2),
        }
        Ok(())
    }

    /// Guess the default wire type for a value with no explicit hint.
    ///
    /// Returns `None` for shapes with no canonical mapping (null, unset,
    /// UDT values, empty or mixed collections); callers must treat that as
    /// an encoding error.
    pub fn guess_type(&self, value: &CqlValue) -> Option<CqlType> {
        match value {
            CqlValue::Null | CqlValue::Unset => None,
            CqlValue::Boolean(_) => Some(CqlType::Boolean),
            CqlValue::Tinyint(_) => Some(CqlType::Tinyint),
            CqlValue::Smallint(_) => Some(CqlType::Smallint),
            CqlValue::Int(_) => Some(CqlType::Int),
            CqlValue::BigInt(_) => Some(CqlType::BigInt),
            CqlValue::Varint(_) => Some(CqlType::Varint),
            CqlValue::Float(_) | CqlValue::Double(_) => Some(CqlType::Double),
            CqlValue::Decimal { .. } => Some(CqlType::Decimal),
            CqlValue::Text(s) => {
                if Uuid::parse_str(s).is_ok() {
                    Some(CqlType::Uuid)
                } else {
                    Some(CqlType::Text)
                }
            }
            CqlValue::Blob(_) => Some(CqlType::Blob),
            CqlValue::Uuid(_) => Some(CqlType::Uuid),
            CqlValue::Timestamp(_) => Some(CqlType::Timestamp),
            CqlValue::Date(_) => Some(CqlType::Date),
            CqlValue::Time(_) => Some(CqlType::Time),
            CqlValue::Inet(_) => Some(CqlType::Inet),
            CqlValue::Duration(_) => Some(CqlType::Duration),
            CqlValue::List(items) | CqlValue::Set(items) => {
                let elem = self.guess_type(items.first()?)?;
                match value {
                    CqlValue::Set(_) => Some(CqlType::Set(Box::new(elem))),
                    _ => Some(CqlType::List(Box::new(elem))),
                }
            }
            CqlValue::Map(entries) => {
                let (k, v) = entries.first()?;
                Some(CqlType::Map(
                    Box::new(self.guess_type(k)?),
                    Box::new(self.guess_type(v)?),
                ))
            }
            CqlValue::Tuple(items) => {
                let types = items
                    .iter()
                    .map(|v| self.guess_type(v))
                    .collect::<Option<Vec<_>>>()?;
                Some(CqlType::Tuple(types))
            }
            CqlValue::Vector(items) => {
                let elem = self.guess_type(items.first()?)?;
                Some(CqlType::Vector {
                    element: Box::new(elem),
                    dimensions: items.len(),
                })
            }
            CqlValue::Udt(_) => None,
        }
    }
}

fn mismatch(ty: &CqlType, value: &CqlValue) -> CodecError {
    CodecError::TypeMismatch {
        expected: ty.name(),
        actual: value.type_name(),
    }
}

fn narrow(v: i64, min: i64, max: i64, what: &'static str) -> Result<i64, CodecError> {
    if v < min || v > max {
        return Err(CodecError::ValueOutOfRange(what));
    }
    Ok(v)
}

fn bigint_value(value: &CqlValue) -> Option<i64> {
    match value {
        CqlValue::BigInt(v) => Some(*v),
        CqlValue::Int(v) => Some(*v as i64),
        CqlValue::Smallint(v) => Some(*v as i64),
        CqlValue::Tinyint(v) => Some(*v as i64),
        CqlValue::Varint(v) => i64::try_from(v).ok(),
        CqlValue::Text(s) => s.parse().ok(),
        _ => None,
    }
}

/// Minimal two's-complement big-endian encoding of an i64.
///
/// A leading 0x00 or 0xFF byte is kept only when the high bit of the first
/// magnitude byte would otherwise misrepresent the sign: -1 is a single 0xFF,
/// -128 a single 0x80, 0 a single 0x00.
pub(crate) fn varint_bytes(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] < 0x80)
            || (bytes[start] == 0xFF && bytes[start + 1] >= 0x80);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecConfig, CqlDuration};
    use crate::frame::ProtocolVersion;

    fn codec() -> TypeCodec {
        TypeCodec::new(CodecConfig::new(ProtocolVersion::V4))
    }

    fn encoded_bytes(e: Encoded) -> Vec<u8> {
        match e {
            Encoded::Bytes(b) => b.to_vec(),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_varint_literal_cases() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(-1), vec![0xFF]);
        assert_eq!(varint_bytes(-128), vec![0x80]);
        assert_eq!(varint_bytes(-100), vec![0x9C]);
        assert_eq!(varint_bytes(33_554_433), vec![0x02, 0x00, 0x00, 0x01]);
        assert_eq!(varint_bytes(1), vec![0x01]);
        assert_eq!(varint_bytes(128), vec![0x00, 0x80]);
        assert_eq!(varint_bytes(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_varint_negative_boundaries() {
        for n in -128i64..=-1 {
            let bytes = varint_bytes(n);
            assert_eq!(bytes.len(), 1, "varint {} must be one byte", n);
            assert_eq!(bytes[0] as i8 as i64, n);
        }
    }

    #[test]
    fn test_varint_encode_via_bigint_value() {
        let c = codec();
        let bytes = encoded_bytes(c.encode(&CqlValue::BigInt(-100), &CqlType::Varint).unwrap());
        assert_eq!(bytes, vec![0x9C]);
        let bytes = encoded_bytes(
            c.encode(
                &CqlValue::Varint(num_bigint::BigInt::from(-100)),
                &CqlType::Varint,
            )
            .unwrap(),
        );
        assert_eq!(bytes, vec![0x9C]);
    }

    #[test]
    fn test_encode_int() {
        let c = codec();
        let bytes = encoded_bytes(c.encode(&CqlValue::Int(1), &CqlType::Int).unwrap());
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_string_fallback_numeric() {
        let c = codec();
        let bytes = encoded_bytes(c.encode(&CqlValue::Text("42".into()), &CqlType::Int).unwrap());
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x2A]);
        assert!(c
            .encode(&CqlValue::Text("not a number".into()), &CqlType::Int)
            .is_err());
    }

    #[test]
    fn test_encode_decimal() {
        let c = codec();
        let value = CqlValue::Decimal {
            unscaled: num_bigint::BigInt::from(1234),
            scale: 2,
        };
        let bytes = encoded_bytes(c.encode(&value, &CqlType::Decimal).unwrap());
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x02, 0x04, 0xD2]);
    }

    #[test]
    fn test_encode_list_v2_vs_v4() {
        let value = CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)]);
        let ty = CqlType::List(Box::new(CqlType::Int));

        let v4 = TypeCodec::new(CodecConfig::new(ProtocolVersion::V4));
        let bytes = encoded_bytes(v4.encode(&value, &ty).unwrap());
        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x00, 0x02, // count
                0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, // element 1
                0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02, // element 2
            ]
        );

        let v2 = TypeCodec::new(CodecConfig::new(ProtocolVersion::V2));
        let bytes = encoded_bytes(v2.encode(&value, &ty).unwrap());
        assert_eq!(
            bytes,
            vec![
                0x00, 0x02, // count
                0x00, 0x04, 0x00, 0x00, 0x00, 0x01, // element 1
                0x00, 0x04, 0x00, 0x00, 0x00, 0x02, // element 2
            ]
        );
    }

    #[test]
    fn test_null_element_rejected_under_v2() {
        let v2 = TypeCodec::new(CodecConfig::new(ProtocolVersion::V2));
        let value = CqlValue::List(vec![CqlValue::Null]);
        let ty = CqlType::List(Box::new(CqlType::Int));
        assert_eq!(
            v2.encode(&value, &ty).unwrap_err(),
            CodecError::NullNotAllowed("collection element")
        );
    }

    #[test]
    fn test_encode_duration() {
        let c = codec();
        let value = CqlValue::Duration(CqlDuration {
            months: 1,
            days: 2,
            nanoseconds: 3,
        });
        let bytes = encoded_bytes(c.encode(&value, &CqlType::Duration).unwrap());
        // zigzag: 1 -> 2, 2 -> 4, 3 -> 6
        assert_eq!(bytes, vec![0x02, 0x04, 0x06]);
    }

    #[test]
    fn test_vector_dimension_enforced() {
        let c = codec();
        let ty = CqlType::Vector {
            element: Box::new(CqlType::Float),
            dimensions: 3,
        };
        for n in [2usize, 4] {
            let value = CqlValue::Vector(vec![CqlValue::Float(1.0); n]);
            assert!(matches!(
                c.encode(&value, &ty).unwrap_err(),
                CodecError::WrongVectorDimension {
                    expected: 3,
                    actual
                } if actual == n
            ));
        }
        let value = CqlValue::Vector(vec![CqlValue::Float(1.0); 3]);
        let bytes = encoded_bytes(c.encode(&value, &ty).unwrap());
        // fixed-width elements: no per-element framing
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn test_vector_variable_width_uses_vint_framing() {
        let c = codec();
        let ty = CqlType::Vector {
            element: Box::new(CqlType::Text),
            dimensions: 2,
        };
        let value = CqlValue::Vector(vec![
            CqlValue::Text("ab".into()),
            CqlValue::Text("c".into()),
        ]);
        let bytes = encoded_bytes(c.encode(&value, &ty).unwrap());
        assert_eq!(bytes, vec![0x02, b'a', b'b', 0x01, b'c']);
    }

    #[test]
    fn test_guess_type() {
        let c = codec();
        assert_eq!(c.guess_type(&CqlValue::Double(1.0)), Some(CqlType::Double));
        assert_eq!(c.guess_type(&CqlValue::Float(1.0)), Some(CqlType::Double));
        assert_eq!(
            c.guess_type(&CqlValue::Text("hello".into())),
            Some(CqlType::Text)
        );
        assert_eq!(
            c.guess_type(&CqlValue::Text(
                "550e8400-e29b-41d4-a716-446655440000".into()
            )),
            Some(CqlType::Uuid)
        );
        assert_eq!(
            c.guess_type(&CqlValue::List(vec![CqlValue::Int(1)])),
            Some(CqlType::List(Box::new(CqlType::Int)))
        );
        assert_eq!(c.guess_type(&CqlValue::Null), None);
        assert_eq!(c.guess_type(&CqlValue::Udt(vec![])), None);
        assert_eq!(c.guess_type(&CqlValue::List(vec![])), None);
    }

    #[test]
    fn test_udt_missing_field_encodes_null() {
        let c = codec();
        let desc = crate::codec::UdtDescriptor {
            keyspace: "ks".into(),
            name: "addr".into(),
            fields: vec![
                ("street".to_string(), CqlType::Text),
                ("zip".to_string(), CqlType::Int),
            ],
        };
        let value = CqlValue::Udt(vec![("street".to_string(), CqlValue::Text("x".into()))]);
        let bytes = encoded_bytes(c.encode(&value, &CqlType::Udt(desc)).unwrap());
        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x00, 0x01, b'x', // street
                0xFF, 0xFF, 0xFF, 0xFF, // zip: null
            ]
        );
    }
}
