//! Crate-wide error types.

use thiserror::Error;

use crate::codec::CodecError;

/// Convenience alias used throughout the crate.
pub type CqlResult<T> = Result<T, CqlError>;

/// Errors raised by the framing, parsing and stream layers.
///
/// Server-reported errors are not in this enum: they are ordinary messages
/// (`ResponseMessage::Error`) scoped to one request. Everything here is a
/// local fault; the transport variants are fatal for the connection.
#[derive(Debug, Error)]
pub enum CqlError {
    /// Underlying transport I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The first frame byte named a protocol version this crate does not
    /// speak. Fatal: the header width cannot be determined.
    #[error("unsupported protocol version: 0x{0:02X}")]
    UnsupportedVersion(u8),

    /// The header carried an opcode outside the protocol.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The peer violated the protocol in a way with no dedicated variant.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value failed to encode or a frame body failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Every stream id permitted by the protocol version is in flight.
    #[error("no stream ids available")]
    StreamIdsExhausted,

    /// A frame ended while a streamed row cell was still incomplete.
    #[error("frame on stream {stream} ended mid-row")]
    TruncatedFrame {
        /// Stream the truncated frame arrived on.
        stream: i16,
    },

    /// A user-defined type referenced by a type name could not be resolved.
    #[error("udt lookup failed: {0}")]
    UdtLookup(String),
}

/// Error codes carried by server ERROR responses.
pub struct ServerErrorCode;

impl ServerErrorCode {
    /// Something unexpected happened server-side.
    pub const SERVER_ERROR: i32 = 0x0000;
    /// The server rejected the message as protocol-violating.
    pub const PROTOCOL_ERROR: i32 = 0x000A;
    /// Authentication failed.
    pub const AUTH_ERROR: i32 = 0x0100;
    /// Not enough live replicas for the consistency level.
    pub const UNAVAILABLE: i32 = 0x1000;
    /// Coordinator overloaded.
    pub const OVERLOADED: i32 = 0x1001;
    /// Coordinator still bootstrapping.
    pub const IS_BOOTSTRAPPING: i32 = 0x1002;
    /// Truncation failed.
    pub const TRUNCATE_ERROR: i32 = 0x1003;
    /// Write timed out waiting on replicas.
    pub const WRITE_TIMEOUT: i32 = 0x1100;
    /// Read timed out waiting on replicas.
    pub const READ_TIMEOUT: i32 = 0x1200;
    /// A replica reported a read failure.
    pub const READ_FAILURE: i32 = 0x1300;
    /// A user function raised.
    pub const FUNCTION_FAILURE: i32 = 0x1400;
    /// A replica reported a write failure.
    pub const WRITE_FAILURE: i32 = 0x1500;
    /// CQL syntax error.
    pub const SYNTAX_ERROR: i32 = 0x2000;
    /// Authenticated user lacks permission.
    pub const UNAUTHORIZED: i32 = 0x2100;
    /// Syntactically correct but invalid request.
    pub const INVALID: i32 = 0x2200;
    /// Invalid against the server configuration.
    pub const CONFIG_ERROR: i32 = 0x2300;
    /// Keyspace or table already exists.
    pub const ALREADY_EXISTS: i32 = 0x2400;
    /// The prepared statement id is unknown to this host.
    pub const UNPREPARED: i32 = 0x2500;

    /// Human-readable name for a code.
    pub fn name(code: i32) -> &'static str {
        match code {
            Self::SERVER_ERROR => "server error",
            Self::PROTOCOL_ERROR => "protocol error",
            Self::AUTH_ERROR => "authentication error",
            Self::UNAVAILABLE => "unavailable",
            Self::OVERLOADED => "overloaded",
            Self::IS_BOOTSTRAPPING => "is bootstrapping",
            Self::TRUNCATE_ERROR => "truncate error",
            Self::WRITE_TIMEOUT => "write timeout",
            Self::READ_TIMEOUT => "read timeout",
            Self::READ_FAILURE => "read failure",
            Self::FUNCTION_FAILURE => "function failure",
            Self::WRITE_FAILURE => "write failure",
            Self::SYNTAX_ERROR => "syntax error",
            Self::UNAUTHORIZED => "unauthorized",
            Self::INVALID => "invalid query",
            Self::CONFIG_ERROR => "config error",
            Self::ALREADY_EXISTS => "already exists",
            Self::UNPREPARED => "unprepared",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CqlError::UnsupportedVersion(0x66);
        assert_eq!(err.to_string(), "unsupported protocol version: 0x66");

        let err = CqlError::TruncatedFrame { stream: 5 };
        assert_eq!(err.to_string(), "frame on stream 5 ended mid-row");
    }

    #[test]
    fn test_codec_error_converts() {
        let err: CqlError = CodecError::Incomplete.into();
        assert!(matches!(err, CqlError::Codec(CodecError::Incomplete)));
    }

    #[test]
    fn test_server_error_code_names() {
        assert_eq!(ServerErrorCode::name(0x1200), "read timeout");
        assert_eq!(ServerErrorCode::name(0x2500), "unprepared");
        assert_eq!(ServerErrorCode::name(0x7777), "unknown");
    }
}
