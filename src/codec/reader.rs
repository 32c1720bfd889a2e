//! Bounds-checked cursor over wire bytes.
//!
//! All protocol notation readers live here: fixed-width big-endian integers,
//! `[string]` / `[long string]` / `[bytes]` / `[short bytes]` fields, string
//! lists and multimaps, and Cassandra's variable-length integers. Running out
//! of bytes yields [`CodecError::Incomplete`], which the frame-body parser
//! relies on to detect cells spanning fragment boundaries.

use bytes::{Buf, BufMut, BytesMut};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::CodecError;

/// Cursor over a byte slice with bounds-checked reads.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        if self.remaining() < 1 {
            return Err(CodecError::Incomplete);
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        if self.remaining() < 2 {
            return Err(CodecError::Incomplete);
        }
        let value = (&self.data[self.pos..]).get_u16();
        self.pos += 2;
        Ok(value)
    }

    /// Read a big-endian i16.
    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        if self.remaining() < 4 {
            return Err(CodecError::Incomplete);
        }
        let value = (&self.data[self.pos..]).get_u32();
        self.pos += 4;
        Ok(value)
    }

    /// Read a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        if self.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let value = (&self.data[self.pos..]).get_i64();
        self.pos += 8;
        Ok(value)
    }

    /// Read a big-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a big-endian f64.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        if self.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let value = (&self.data[self.pos..]).get_f64();
        self.pos += 8;
        Ok(value)
    }

    /// Read a fixed number of raw bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Incomplete);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read a `[string]`: u16 length prefix + UTF-8 bytes.
    ///
    /// The 2-byte prefix applies regardless of protocol version.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_slice(len)?;
        utf8(bytes)
    }

    /// Read a `[long string]`: i32 length prefix + UTF-8 bytes.
    pub fn read_long_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CodecError::ValueOutOfRange("long string length"));
        }
        let bytes = self.read_slice(len as usize)?;
        utf8(bytes)
    }

    /// Read a `[bytes]`: i32 length prefix, negative meaning absent.
    pub fn read_bytes(&mut self) -> Result<Option<&'a [u8]>, CodecError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.read_slice(len as usize)?))
    }

    /// Read a `[short bytes]`: u16 length prefix + bytes.
    pub fn read_short_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u16()? as usize;
        self.read_slice(len)
    }

    /// Read a `[string list]`.
    pub fn read_string_list(&mut self) -> Result<Vec<String>, CodecError> {
        let count = self.read_u16()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.read_string()?);
        }
        Ok(items)
    }

    /// Read a `[string multimap]`.
    pub fn read_string_multimap(&mut self) -> Result<HashMap<String, Vec<String>>, CodecError> {
        let count = self.read_u16()? as usize;
        let mut map = HashMap::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.read_string()?;
            let values = self.read_string_list()?;
            map.insert(key, values);
        }
        Ok(map)
    }

    /// Read an `[inet]`: 1-byte address size, address bytes, i32 port.
    pub fn read_inet(&mut self) -> Result<(IpAddr, i32), CodecError> {
        let addr = self.read_inet_addr()?;
        let port = self.read_i32()?;
        Ok((addr, port))
    }

    /// Read a bare inet address: 1-byte size followed by 4 or 16 bytes.
    pub fn read_inet_addr(&mut self) -> Result<IpAddr, CodecError> {
        let size = self.read_u8()? as usize;
        let bytes = self.read_slice(size)?;
        match size {
            4 => {
                let octets: [u8; 4] = bytes.try_into().expect("length checked");
                Ok(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let octets: [u8; 16] = bytes.try_into().expect("length checked");
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => Err(CodecError::ValueOutOfRange("inet address size")),
        }
    }

    /// Read an unsigned Cassandra vint.
    ///
    /// The number of leading one bits in the first byte gives the number of
    /// extra bytes; the remaining bits are the big-endian magnitude.
    pub fn read_unsigned_vint(&mut self) -> Result<u64, CodecError> {
        let first = self.read_u8()?;
        let extra = first.leading_ones() as usize;
        if extra == 8 {
            let bytes = self.read_slice(8)?;
            return Ok(u64::from_be_bytes(bytes.try_into().expect("length checked")));
        }
        // mask off the length prefix and its terminating zero bit
        let mut value = (first as u64) & ((1u64 << (7 - extra)) - 1);
        for _ in 0..extra {
            value = (value << 8) | self.read_u8()? as u64;
        }
        Ok(value)
    }

    /// Read a zigzag-encoded signed Cassandra vint.
    pub fn read_signed_vint(&mut self) -> Result<i64, CodecError> {
        let v = self.read_unsigned_vint()?;
        Ok(((v >> 1) as i64) ^ -((v & 1) as i64))
    }
}

/// Write an unsigned Cassandra vint.
pub fn write_unsigned_vint(buf: &mut BytesMut, value: u64) {
    let bits = 64 - value.leading_zeros() as usize;
    let len = if bits == 0 { 1 } else { (bits + 6) / 7 };
    if len >= 9 {
        buf.put_u8(0xFF);
        buf.put_u64(value);
        return;
    }
    let prefix = if len == 1 {
        0u8
    } else {
        (0xFFu8 << (9 - len)) & 0xFF
    };
    buf.put_u8(prefix | (value >> (8 * (len - 1))) as u8);
    for i in (0..len - 1).rev() {
        buf.put_u8((value >> (8 * i)) as u8);
    }
}

/// Write a zigzag-encoded signed Cassandra vint.
pub fn write_signed_vint(buf: &mut BytesMut, value: i64) {
    write_unsigned_vint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

fn utf8(bytes: &[u8]) -> Result<String, CodecError> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|e| CodecError::InvalidUtf8(e.to_string()))
}
