//! Routing-key construction.
//!
//! The routing key is the serialized partition key used for token-aware
//! placement. It is best-effort: a component that is null, unset, or fails to
//! encode aborts construction and the request is simply routed blindly, so
//! nothing here returns an error.

use bytes::{BufMut, Bytes, BytesMut};

use super::types::{CqlType, CqlValue};
use super::{Encoded, TypeCodec};

/// Join serialized partition-key components into a routing key.
///
/// A single component is used bare. With more than one, each is written as
/// `[u16 length][bytes][0x00]` regardless of protocol version.
pub fn compose_routing_key(parts: &[Bytes]) -> Option<Bytes> {
    match parts {
        [] => None,
        [single] => Some(single.clone()),
        many => {
            let mut buf = BytesMut::new();
            for part in many {
                if part.len() > u16::MAX as usize {
                    return None;
                }
                buf.put_u16(part.len() as u16);
                buf.put_slice(part);
                buf.put_u8(0);
            }
            Some(buf.freeze())
        }
    }
}

/// Build a routing key from positional parameters.
///
/// `indexes` selects the partition-key components among `params`, in
/// partition-key order. `hints` is parallel to `params`; a missing hint falls
/// back to type guessing.
pub fn routing_key_from_params(
    codec: &TypeCodec,
    params: &[CqlValue],
    hints: &[Option<CqlType>],
    indexes: &[usize],
) -> Option<Bytes> {
    let mut parts = Vec::with_capacity(indexes.len());
    for &idx in indexes {
        let value = params.get(idx)?;
        parts.push(encode_component(codec, value, hints.get(idx).and_then(|h| h.as_ref()))?);
    }
    compose_routing_key(&parts)
}

/// Build a routing key from named parameters.
///
/// `key_names` lists the partition-key column names in order; matching is
/// case-sensitive against the parameter names.
pub fn routing_key_from_named_params(
    codec: &TypeCodec,
    params: &[(String, CqlValue)],
    hints: &[(String, CqlType)],
    key_names: &[String],
) -> Option<Bytes> {
    let mut parts = Vec::with_capacity(key_names.len());
    for name in key_names {
        let value = params.iter().find(|(n, _)| n == name).map(|(_, v)| v)?;
        let hint = hints.iter().find(|(n, _)| n == name).map(|(_, t)| t);
        parts.push(encode_component(codec, value, hint)?);
    }
    compose_routing_key(&parts)
}

fn encode_component(
    codec: &TypeCodec,
    value: &CqlValue,
    hint: Option<&CqlType>,
) -> Option<Bytes> {
    let encoded = match hint {
        Some(ty) => codec.encode(value, ty).ok()?,
        None => codec.encode_guessed(value).ok()?,
    };
    match encoded {
        Encoded::Bytes(b) => Some(b),
        // null or unset components leave the request unrouted
        Encoded::Null | Encoded::Unset => None,
    }
}
