//! Chunk-boundary-agnostic frame splitting.
//!
//! TCP hands the connection arbitrary chunks; the splitter cuts them into
//! frame headers and body fragments without ever copying body bytes. Only a
//! partially received header is buffered across calls (at most 9 bytes);
//! body fragments are zero-copy slices of the input chunk, forwarded as soon
//! as they arrive so the body parser can start before a frame is complete.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{CqlError, CqlResult};
use crate::frame::{FrameHeader, FrameItem, ProtocolVersion, RequestFrame};

/// Body bytes still owed on the frame being split.
#[derive(Debug)]
struct InFlight {
    header: FrameHeader,
    remaining: usize,
}

/// Splits an inbound byte stream into [`FrameItem`]s.
///
/// The protocol version, and with it the header width, is inferred from the
/// first byte ever seen and fixed for the connection lifetime.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    version: Option<ProtocolVersion>,
    header_buf: BytesMut,
    current: Option<InFlight>,
    pending: VecDeque<FrameItem>,
}

impl FrameSplitter {
    /// Create a splitter that infers its version from the first byte.
    pub fn new() -> Self {
        Self::default()
    }

    /// The inferred protocol version, once the first byte has been seen.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Split one chunk into frame items.
    ///
    /// An empty chunk yields no items. Errors are fatal: the connection's
    /// byte stream can no longer be framed.
    pub fn feed(&mut self, mut chunk: Bytes) -> CqlResult<Vec<FrameItem>> {
        let mut items = Vec::new();
        while !chunk.is_empty() {
            match &mut self.current {
                None => {
                    let version = match self.version {
                        Some(v) => v,
                        None => {
                            let first = if self.header_buf.is_empty() {
                                chunk[0]
                            } else {
                                self.header_buf[0]
                            };
                            let version = ProtocolVersion::from_u8(first & 0x7F)
                                .ok_or(CqlError::UnsupportedVersion(first & 0x7F))?;
                            trace!(%version, "inferred protocol version");
                            self.version = Some(version);
                            version
                        }
                    };
                    let need = version.header_len() - self.header_buf.len();
                    let take = need.min(chunk.len());
                    self.header_buf.extend_from_slice(&chunk.split_to(take));
                    if self.header_buf.len() < version.header_len() {
                        break;
                    }
                    let header = FrameHeader::parse(&self.header_buf)?;
                    self.header_buf.clear();
                    if header.version != version {
                        return Err(CqlError::Protocol(format!(
                            "frame version {} on a {} connection",
                            header.version, version
                        )));
                    }
                    if header.body_len == 0 {
                        items.push(FrameItem {
                            header,
                            body: Bytes::new(),
                            is_final: true,
                        });
                    } else {
                        self.current = Some(InFlight {
                            header,
                            remaining: header.body_len as usize,
                        });
                    }
                }
                Some(inflight) => {
                    let take = inflight.remaining.min(chunk.len());
                    let body = chunk.split_to(take);
                    inflight.remaining -= take;
                    let is_final = inflight.remaining == 0;
                    items.push(FrameItem {
                        header: inflight.header,
                        body,
                        is_final,
                    });
                    if is_final {
                        self.current = None;
                    }
                }
            }
        }
        Ok(items)
    }
}

impl Decoder for FrameSplitter {
    type Item = FrameItem;
    type Error = CqlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameItem>, CqlError> {
        if let Some(item) = self.pending.pop_front() {
            return Ok(Some(item));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let chunk = src.split().freeze();
        let items = self.feed(chunk)?;
        self.pending.extend(items);
        Ok(self.pending.pop_front())
    }
}

impl Encoder<RequestFrame> for FrameSplitter {
    type Error = CqlError;

    fn encode(&mut self, frame: RequestFrame, dst: &mut BytesMut) -> Result<(), CqlError> {
        dst.reserve(frame.version.header_len() + frame.body.len());
        frame.header().encode(dst);
        dst.put_slice(&frame.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameFlags, Opcode};

    fn frame_bytes(version: u8, stream: i16, opcode: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(version | 0x80);
        buf.push(0x00);
        if version >= 3 {
            buf.extend_from_slice(&stream.to_be_bytes());
        } else {
            buf.push(stream as i8 as u8);
        }
        buf.push(opcode);
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    /// Reassemble split output into (stream, full body) per completed frame.
    fn assemble(items: &[FrameItem]) -> Vec<(i16, Vec<u8>)> {
        let mut frames = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        for item in items {
            body.extend_from_slice(&item.body);
            if item.is_final {
                frames.push((item.header.stream, std::mem::take(&mut body)));
            }
        }
        assert!(body.is_empty(), "unterminated frame fragments");
        frames
    }

    #[test]
    fn test_single_chunk_two_frames() {
        let mut stream = frame_bytes(4, 1, 0x08, &[0xAA, 0xBB]);
        stream.extend_from_slice(&frame_bytes(4, 2, 0x02, &[]));
        let mut splitter = FrameSplitter::new();
        let items = splitter.feed(Bytes::from(stream)).unwrap();
        assert_eq!(
            assemble(&items),
            vec![(1, vec![0xAA, 0xBB]), (2, vec![])]
        );
        assert_eq!(splitter.version(), Some(ProtocolVersion::V4));
    }

    #[test]
    fn test_zero_length_body_emits_immediately() {
        let mut splitter = FrameSplitter::new();
        let items = splitter.feed(Bytes::from(frame_bytes(4, 9, 0x02, &[]))).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_final);
        assert!(items[0].body.is_empty());
        assert_eq!(items[0].header.opcode, Opcode::Ready);
    }

    #[test]
    fn test_chunk_size_equivalence() {
        let mut stream = frame_bytes(4, 1, 0x08, &[1, 2, 3, 4, 5, 6, 7]);
        stream.extend_from_slice(&frame_bytes(4, -1, 0x0C, b"event body"));
        stream.extend_from_slice(&frame_bytes(4, 300, 0x08, &[]));
        stream.extend_from_slice(&frame_bytes(4, 2, 0x08, &[0xFF; 40]));

        let mut whole = FrameSplitter::new();
        let expected = assemble(&whole.feed(Bytes::from(stream.clone())).unwrap());

        for size in [1usize, 2, 3, 5, 13] {
            let mut splitter = FrameSplitter::new();
            let mut items = Vec::new();
            for chunk in stream.chunks(size) {
                items.extend(splitter.feed(Bytes::copy_from_slice(chunk)).unwrap());
            }
            assert_eq!(assemble(&items), expected, "chunk size {}", size);
        }
    }

    #[test]
    fn test_v2_header_width() {
        let stream = frame_bytes(2, 5, 0x08, &[0x11]);
        let mut splitter = FrameSplitter::new();
        let items = splitter.feed(Bytes::from(stream)).unwrap();
        assert_eq!(splitter.version(), Some(ProtocolVersion::V2));
        assert_eq!(assemble(&items), vec![(5, vec![0x11])]);
    }

    #[test]
    fn test_unsupported_version_is_fatal() {
        let mut splitter = FrameSplitter::new();
        let err = splitter
            .feed(Bytes::from_static(&[0xE6, 0x00, 0x00]))
            .unwrap_err();
        assert!(matches!(err, CqlError::UnsupportedVersion(0x66)));
    }

    #[test]
    fn test_version_change_mid_stream_is_fatal() {
        let mut stream = frame_bytes(4, 1, 0x02, &[]);
        stream.extend_from_slice(&frame_bytes(3, 2, 0x02, &[]));
        let mut splitter = FrameSplitter::new();
        let err = splitter.feed(Bytes::from(stream)).unwrap_err();
        assert!(matches!(err, CqlError::Protocol(_)));
    }

    #[test]
    fn test_empty_chunk_yields_nothing() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn test_body_fragments_are_zero_copy() {
        let body = vec![0x55u8; 64];
        let stream = Bytes::from(frame_bytes(4, 1, 0x08, &body));
        let mut splitter = FrameSplitter::new();
        let items = splitter.feed(stream.clone()).unwrap();
        assert_eq!(items.len(), 1);
        // the fragment aliases the input chunk rather than copying it
        let fragment = &items[0].body;
        assert_eq!(fragment.as_ptr(), stream[9..].as_ptr());
    }

    #[test]
    fn test_decoder_yields_items() {
        let mut splitter = FrameSplitter::new();
        let mut src = BytesMut::new();
        src.extend_from_slice(&frame_bytes(4, 1, 0x02, &[]));
        src.extend_from_slice(&frame_bytes(4, 2, 0x02, &[]));
        let first = splitter.decode(&mut src).unwrap().unwrap();
        assert_eq!(first.header.stream, 1);
        let second = splitter.decode(&mut src).unwrap().unwrap();
        assert_eq!(second.header.stream, 2);
        assert!(splitter.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_encoder_roundtrips_through_feed() {
        let mut splitter = FrameSplitter::new();
        let frame = RequestFrame {
            version: ProtocolVersion::V4,
            flags: FrameFlags::default(),
            stream: 7,
            opcode: Opcode::Query,
            body: Bytes::from_static(b"select"),
        };
        let mut dst = BytesMut::new();
        splitter.encode(frame, &mut dst).unwrap();

        let mut reader = FrameSplitter::new();
        let items = reader.feed(dst.freeze()).unwrap();
        let frames = assemble(&items);
        assert_eq!(frames, vec![(7, b"select".to_vec())]);
        assert_eq!(items[0].header.opcode, Opcode::Query);
    }
}
