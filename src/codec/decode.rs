//! Value decoding: CQL wire bytes to native values.

use chrono::{DateTime, NaiveTime};
use num_bigint::BigInt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

use super::reader::Reader;
use super::types::{CqlDuration, CqlType, CqlValue};
use super::{CodecError, IntegerFormat, TypeCodec};

impl TypeCodec {
    /// Decode a cell's payload bytes against a type descriptor.
    ///
    /// An empty buffer decodes to null for every type except the string and
    /// blob families, where a zero-length value is a legitimate empty string
    /// or empty byte sequence. Callers handle the absent cell (wire length
    /// -1) before reaching the codec.
    pub fn decode(&self, data: &[u8], ty: &CqlType) -> Result<CqlValue, CodecError> {
        if data.is_empty() {
            return Ok(match ty {
                CqlType::Text | CqlType::Ascii | CqlType::Varchar => CqlValue::Text(String::new()),
                CqlType::Blob | CqlType::Custom(_) => CqlValue::Blob(Vec::new()),
                _ => CqlValue::Null,
            });
        }
        let mut reader = Reader::new(data);
        let value = self.decode_value(&mut reader, ty)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        Ok(value)
    }

    fn decode_value(&self, r: &mut Reader<'_>, ty: &CqlType) -> Result<CqlValue, CodecError> {
        match ty {
            CqlType::Boolean => Ok(CqlValue::Boolean(r.read_u8()? != 0)),
            CqlType::Tinyint => Ok(CqlValue::Tinyint(r.read_i8()?)),
            CqlType::Smallint => Ok(CqlValue::Smallint(r.read_i16()?)),
            CqlType::Int => Ok(CqlValue::Int(r.read_i32()?)),
            CqlType::BigInt | CqlType::Counter => Ok(CqlValue::BigInt(r.read_i64()?)),
            CqlType::Float => Ok(CqlValue::Float(r.read_f32()?)),
            CqlType::Double => Ok(CqlValue::Double(r.read_f64()?)),
            CqlType::Text | CqlType::Ascii | CqlType::Varchar => {
                let bytes = r.read_slice(r.remaining())?;
                std::str::from_utf8(bytes)
                    .map(|s| CqlValue::Text(s.to_string()))
                    .map_err(|e| CodecError::InvalidUtf8(e.to_string()))
            }
            CqlType::Blob | CqlType::Custom(_) => {
                Ok(CqlValue::Blob(r.read_slice(r.remaining())?.to_vec()))
            }
            CqlType::Uuid | CqlType::Timeuuid => {
                let bytes: [u8; 16] = r
                    .read_slice(16)?
                    .try_into()
                    .expect("length checked");
                Ok(CqlValue::Uuid(Uuid::from_bytes(bytes)))
            }
            CqlType::Timestamp => {
                let millis = r.read_i64()?;
                DateTime::from_timestamp_millis(millis)
                    .map(CqlValue::Timestamp)
                    .ok_or(CodecError::ValueOutOfRange("timestamp"))
            }
            CqlType::Date => {
                // unsigned, centered on the epoch: 2^31 is 1970-01-01
                let raw = r.read_u32()?;
                let days = raw as i64 - (1i64 << 31);
                chrono::NaiveDate::default()
                    .checked_add_signed(chrono::Duration::days(days))
                    .map(CqlValue::Date)
                    .ok_or(CodecError::ValueOutOfRange("date"))
            }
            CqlType::Time => {
                let nanos = r.read_i64()?;
                if !(0..86_400_000_000_000).contains(&nanos) {
                    return Err(CodecError::ValueOutOfRange("time"));
                }
                let secs = (nanos / 1_000_000_000) as u32;
                let nano = (nanos % 1_000_000_000) as u32;
                NaiveTime::from_num_seconds_from_midnight_opt(secs, nano)
                    .map(CqlValue::Time)
                    .ok_or(CodecError::ValueOutOfRange("time"))
            }
            CqlType::Inet => {
                // cell values carry the raw address with no size byte
                match r.remaining() {
                    4 => {
                        let octets: [u8; 4] =
                            r.read_slice(4)?.try_into().expect("length checked");
                        Ok(CqlValue::Inet(IpAddr::V4(Ipv4Addr::from(octets))))
                    }
                    16 => {
                        let octets: [u8; 16] =
                            r.read_slice(16)?.try_into().expect("length checked");
                        Ok(CqlValue::Inet(IpAddr::V6(Ipv6Addr::from(octets))))
                    }
                    _ => Err(CodecError::ValueOutOfRange("inet address size")),
                }
            }
            CqlType::Varint => {
                let bytes = r.read_slice(r.remaining())?;
                match self.integer_format() {
                    IntegerFormat::Arbitrary => {
                        Ok(CqlValue::Varint(BigInt::from_signed_bytes_be(bytes)))
                    }
                    IntegerFormat::Int64 => Ok(CqlValue::BigInt(i64_from_signed_be(bytes)?)),
                }
            }
            CqlType::Decimal => {
                let scale = r.read_i32()?;
                let bytes = r.read_slice(r.remaining())?;
                Ok(CqlValue::Decimal {
                    unscaled: BigInt::from_signed_bytes_be(bytes),
                    scale,
                })
            }
            CqlType::Duration => {
                let months = vint_i32(r, "duration months")?;
                let days = vint_i32(r, "duration days")?;
                let nanoseconds = r.read_signed_vint()?;
                Ok(CqlValue::Duration(CqlDuration {
                    months,
                    days,
                    nanoseconds,
                }))
            }
            CqlType::List(elem) => Ok(CqlValue::List(self.decode_collection(r, elem)?)),
            CqlType::Set(elem) => Ok(CqlValue::Set(self.decode_collection(r, elem)?)),
            CqlType::Map(kty, vty) => {
                let count = self.read_count(r)?;
                let mut entries = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let k = self.decode_element(r, kty)?;
                    let v = self.decode_element(r, vty)?;
                    entries.push((k, v));
                }
                Ok(CqlValue::Map(entries))
            }
            CqlType::Udt(desc) => {
                let mut fields = Vec::with_capacity(desc.fields.len());
                for (name, fty) in &desc.fields {
                    // a shorter-than-declared value means trailing fields were
                    // added to the type after this value was written
                    let value = if r.is_empty() {
                        CqlValue::Null
                    } else {
                        self.decode_framed(r, fty)?
                    };
                    fields.push((name.clone(), value));
                }
                // fields unknown to this descriptor are skipped
                r.read_slice(r.remaining())?;
                Ok(CqlValue::Udt(fields))
            }
            CqlType::Tuple(types) => {
                let mut items = Vec::with_capacity(types.len());
                for ety in types {
                    let value = if r.is_empty() {
                        CqlValue::Null
                    } else {
                        self.decode_framed(r, ety)?
                    };
                    items.push(value);
                }
                r.read_slice(r.remaining())?;
                Ok(CqlValue::Tuple(items))
            }
            CqlType::Vector {
                element,
                dimensions,
            } => {
                let mut items = Vec::with_capacity(*dimensions);
                match element.fixed_wire_width() {
                    Some(width) => {
                        if r.remaining() != width * dimensions {
                            return Err(CodecError::WrongVectorDimension {
                                expected: *dimensions,
                                actual: r.remaining() / width,
                            });
                        }
                        for _ in 0..*dimensions {
                            let slice = r.read_slice(width)?;
                            items.push(self.decode(slice, element)?);
                        }
                    }
                    None => {
                        for _ in 0..*dimensions {
                            let len = r.read_unsigned_vint()? as usize;
                            let slice = r.read_slice(len)?;
                            items.push(self.decode(slice, element)?);
                        }
                    }
                }
                Ok(CqlValue::Vector(items))
            }
        }
    }

    fn decode_collection(
        &self,
        r: &mut Reader<'_>,
        elem: &CqlType,
    ) -> Result<Vec<CqlValue>, CodecError> {
        let count = self.read_count(r)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.decode_element(r, elem)?);
        }
        Ok(items)
    }

    /// Read a list/set/map count with the version-dependent width.
    fn read_count(&self, r: &mut Reader<'_>) -> Result<usize, CodecError> {
        if self.collection_len_width() == 2 {
            Ok(r.read_u16()? as usize)
        } else {
            let count = r.read_i32()?;
            if count < 0 {
                return Err(CodecError::ValueOutOfRange("collection size"));
            }
            Ok(count as usize)
        }
    }

    /// Read one collection element with the version-dependent length prefix.
    fn decode_element(&self, r: &mut Reader<'_>, ty: &CqlType) -> Result<CqlValue, CodecError> {
        let len = if self.collection_len_width() == 2 {
            r.read_u16()? as i64
        } else {
            r.read_i32()? as i64
        };
        if len < 0 {
            return Ok(CqlValue::Null);
        }
        let slice = r.read_slice(len as usize)?;
        self.decode(slice, ty)
    }

    /// Read one UDT/tuple element: always a 4-byte length with the -1 null and
    /// -2 unset sentinels. Unset decodes to null; the distinction only exists
    /// on the request path.
    fn decode_framed(&self, r: &mut Reader<'_>, ty: &CqlType) -> Result<CqlValue, CodecError> {
        let len = r.read_i32()?;
        if len < 0 {
            return Ok(CqlValue::Null);
        }
        let slice = r.read_slice(len as usize)?;
        self.decode(slice, ty)
    }
}

fn vint_i32(r: &mut Reader<'_>, what: &'static str) -> Result<i32, CodecError> {
    let v = r.read_signed_vint()?;
    i32::try_from(v).map_err(|_| CodecError::ValueOutOfRange(what))
}

/// Interpret minimal two's-complement big-endian bytes as an i64.
fn i64_from_signed_be(bytes: &[u8]) -> Result<i64, CodecError> {
    if bytes.len() > 8 {
        return Err(CodecError::ValueOutOfRange("varint"));
    }
    let mut value: i64 = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        -1
    } else {
        0
    };
    for &b in bytes {
        value = (value << 8) | b as i64;
    }
    Ok(value)
}
