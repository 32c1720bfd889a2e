//! # cql-wire
//!
//! CQL binary protocol framing and type codec for Cassandra-compatible
//! databases.
//!
//! ## Features
//!
//! - **Frame splitting** - Chunk-boundary-agnostic splitting of the inbound
//!   byte stream into headers and zero-copy body fragments
//! - **Body parsing** - Per-stream state machines turning fragments into
//!   messages, with optional row-by-row streaming of large results
//! - **Type codec** - All CQL wire types, version-sensitive length framing,
//!   routing-key construction, and both type-name grammars
//! - **Stream ids** - Grouped stream-id multiplexing with delayed reclamation
//! - **Async/Await** - Built on Tokio; integrates with `tokio_util` codecs
//!
//! ## Basic Usage
//!
//! ```rust
//! use bytes::Bytes;
//! use cql_wire::{
//!     CodecConfig, FrameBodyParser, FrameSplitter, ProtocolVersion, TypeCodec,
//! };
//!
//! # fn feed(chunk: Bytes) -> cql_wire::CqlResult<()> {
//! let mut splitter = FrameSplitter::new();
//! let mut parser = FrameBodyParser::new(TypeCodec::new(CodecConfig::new(
//!     ProtocolVersion::V4,
//! )));
//!
//! // for every chunk the transport hands us:
//! let mut events = Vec::new();
//! for item in splitter.feed(chunk)? {
//!     parser.handle(item, &mut events);
//! }
//! // events now holds messages, streamed rows and frame-end markers
//! # Ok(())
//! # }
//! ```
//!
//! ## Row Streaming
//!
//! Large results do not have to be buffered whole. Opting a stream id into
//! row streaming makes the parser emit each row as soon as its bytes arrive,
//! holding at most one partial row across fragment boundaries:
//!
//! ```rust
//! # use cql_wire::{CodecConfig, FrameBodyParser, ProtocolVersion, TypeCodec};
//! # let mut parser = FrameBodyParser::new(TypeCodec::new(CodecConfig::new(
//! #     ProtocolVersion::V4,
//! # )));
//! parser.set_streaming(42, true); // before dispatching request 42
//! ```
//!
//! ## Encoding Values
//!
//! ```rust
//! use cql_wire::{CodecConfig, CqlType, CqlValue, ProtocolVersion, TypeCodec};
//!
//! # fn example() -> Result<(), cql_wire::CodecError> {
//! let codec = TypeCodec::new(CodecConfig::new(ProtocolVersion::V4));
//! let encoded = codec.encode(&CqlValue::Int(42), &CqlType::Int)?;
//! assert_eq!(&encoded.as_bytes().unwrap()[..], &[0, 0, 0, 42]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`splitter`] / [`parser`] - The inbound pipeline
//! - [`codec`] - The type codec, type-name grammars and routing keys
//! - [`frame`] / [`message`] - Wire structures
//! - [`stream`] - Stream-id multiplexing

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod parser;
pub mod splitter;
pub mod stream;

// Re-exports for convenience
pub use codec::{
    CodecConfig, CodecError, CqlDuration, CqlType, CqlValue, Encoded, IntegerFormat, TypeCodec,
    UdtDescriptor, UdtResolver,
};
pub use error::{CqlError, CqlResult, ServerErrorCode};
pub use frame::{FrameFlags, FrameHeader, FrameItem, Opcode, ProtocolVersion, RequestFrame};
pub use message::{
    ColumnSpec, Consistency, ErrorDetails, PreparedMetadata, ResponseMessage, ResultMessage, Row,
    RowsMetadata, SchemaChange, ServerError, ServerEvent,
};
pub use parser::{FrameBodyParser, ParserEvent};
pub use splitter::FrameSplitter;
pub use stream::StreamIdMultiplexer;
