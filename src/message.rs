//! Response messages and their body grammars.
//!
//! Everything a server can send back: result messages with their metadata,
//! push events, server-reported errors and the authentication exchange
//! messages. Parsing is cursor-based over a fully buffered body section;
//! running out of bytes surfaces as [`CodecError::Incomplete`], which the
//! frame-body parser interprets as "wait for more fragments".

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::types::type_code;
use crate::codec::{parse_class_name, CodecError, CqlType, CqlValue, Reader, TypeCodec, UdtDescriptor};
use crate::frame::{FrameHeader, Opcode, ProtocolVersion};

/// Consistency levels as carried in error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Closest-replica write, no read.
    Any = 0x0000,
    /// One replica.
    One = 0x0001,
    /// Two replicas.
    Two = 0x0002,
    /// Three replicas.
    Three = 0x0003,
    /// Majority of replicas.
    Quorum = 0x0004,
    /// All replicas.
    All = 0x0005,
    /// Majority within the local datacenter.
    LocalQuorum = 0x0006,
    /// Majority within every datacenter.
    EachQuorum = 0x0007,
    /// Linearizable read.
    Serial = 0x0008,
    /// Linearizable read within the local datacenter.
    LocalSerial = 0x0009,
    /// One replica in the local datacenter.
    LocalOne = 0x000A,
}

impl Consistency {
    /// Parse a consistency code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(Consistency::Any),
            0x0001 => Some(Consistency::One),
            0x0002 => Some(Consistency::Two),
            0x0003 => Some(Consistency::Three),
            0x0004 => Some(Consistency::Quorum),
            0x0005 => Some(Consistency::All),
            0x0006 => Some(Consistency::LocalQuorum),
            0x0007 => Some(Consistency::EachQuorum),
            0x0008 => Some(Consistency::Serial),
            0x0009 => Some(Consistency::LocalSerial),
            0x000A => Some(Consistency::LocalOne),
            _ => None,
        }
    }
}

/// One column of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Keyspace the column's table lives in.
    pub keyspace: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: CqlType,
}

/// Rows-result metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsMetadata {
    /// Raw metadata flag bits.
    pub flags: i32,
    /// Number of columns per row.
    pub column_count: usize,
    /// Opaque paging state, present when more pages exist.
    pub paging_state: Option<Bytes>,
    /// Column specifications; empty under the no-metadata flag.
    pub columns: Vec<ColumnSpec>,
}

impl RowsMetadata {
    /// All columns belong to one table; keyspace and table appear once.
    pub const GLOBAL_TABLES_SPEC: i32 = 0x0001;
    /// A paging state follows the column count.
    pub const HAS_MORE_PAGES: i32 = 0x0002;
    /// Column specs omitted (client asked to skip them).
    pub const NO_METADATA: i32 = 0x0004;

    /// Parse rows metadata.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let flags = r.read_i32()?;
        let column_count = read_count(r)?;
        let paging_state = if flags & Self::HAS_MORE_PAGES != 0 {
            r.read_bytes()?.map(Bytes::copy_from_slice)
        } else {
            None
        };
        let columns = if flags & Self::NO_METADATA != 0 {
            Vec::new()
        } else {
            parse_column_specs(r, flags, column_count)?
        };
        Ok(RowsMetadata {
            flags,
            column_count,
            paging_state,
            columns,
        })
    }

    /// Whether more pages of this result exist.
    pub fn has_more_pages(&self) -> bool {
        self.flags & Self::HAS_MORE_PAGES != 0
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Prepared-statement bind metadata: column specs plus, from protocol v4,
/// the indices of the partition-key columns among the bind markers.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMetadata {
    /// Bind-marker specifications.
    pub metadata: RowsMetadata,
    /// Partition-key positions among the bind markers (v4+, else empty).
    pub pk_indexes: Vec<u16>,
}

impl PreparedMetadata {
    /// Parse prepared bind metadata; the pk-index block exists from v4.
    pub fn parse(r: &mut Reader<'_>, version: ProtocolVersion) -> Result<Self, CodecError> {
        let flags = r.read_i32()?;
        let column_count = read_count(r)?;
        let pk_indexes = if version >= ProtocolVersion::V4 {
            let pk_count = read_count(r)?;
            let mut indexes = Vec::with_capacity(pk_count.min(1024));
            for _ in 0..pk_count {
                indexes.push(r.read_u16()?);
            }
            indexes
        } else {
            Vec::new()
        };
        let columns = if flags & RowsMetadata::NO_METADATA != 0 {
            Vec::new()
        } else {
            parse_column_specs(r, flags, column_count)?
        };
        Ok(PreparedMetadata {
            metadata: RowsMetadata {
                flags,
                column_count,
                paging_state: None,
                columns,
            },
            pk_indexes,
        })
    }
}

/// One decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Metadata shared by every row of the result.
    pub metadata: Arc<RowsMetadata>,
    /// Cell values in column order.
    pub values: Vec<CqlValue>,
}

impl Row {
    /// Cell by position.
    pub fn get(&self, index: usize) -> Option<&CqlValue> {
        self.values.get(index)
    }

    /// Cell by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&CqlValue> {
        self.values.get(self.metadata.column_index(name)?)
    }
}

/// Decode one row's cells against the result metadata.
pub fn decode_row(
    r: &mut Reader<'_>,
    metadata: &Arc<RowsMetadata>,
    codec: &TypeCodec,
) -> Result<Row, CodecError> {
    let mut values = Vec::with_capacity(metadata.column_count);
    for i in 0..metadata.column_count {
        let cell = r.read_bytes()?;
        let value = match cell {
            None => CqlValue::Null,
            Some(bytes) => match metadata.columns.get(i) {
                Some(spec) => codec.decode(bytes, &spec.ty)?,
                // no-metadata results surface raw cells
                None => CqlValue::Blob(bytes.to_vec()),
            },
        };
        values.push(value);
    }
    Ok(Row {
        metadata: Arc::clone(metadata),
        values,
    })
}

/// RESULT message payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultMessage {
    /// Statement produced no result.
    Void,
    /// A page of rows.
    Rows {
        /// Result metadata.
        metadata: Arc<RowsMetadata>,
        /// Decoded rows, in server order.
        rows: Vec<Row>,
    },
    /// USE statement result.
    SetKeyspace(String),
    /// PREPARE result.
    Prepared {
        /// Statement id to execute against.
        id: Bytes,
        /// Bind-marker metadata.
        metadata: PreparedMetadata,
        /// Result-set metadata known at preparation time.
        result_metadata: RowsMetadata,
    },
    /// DDL statement result.
    SchemaChange(SchemaChange),
}

pub(crate) const RESULT_VOID: i32 = 0x0001;
pub(crate) const RESULT_ROWS: i32 = 0x0002;
pub(crate) const RESULT_SET_KEYSPACE: i32 = 0x0003;
pub(crate) const RESULT_PREPARED: i32 = 0x0004;
pub(crate) const RESULT_SCHEMA_CHANGE: i32 = 0x0005;

impl ResultMessage {
    /// Parse a fully buffered RESULT body.
    pub fn parse(r: &mut Reader<'_>, codec: &TypeCodec) -> Result<Self, CodecError> {
        match r.read_i32()? {
            RESULT_VOID => Ok(ResultMessage::Void),
            RESULT_ROWS => {
                let metadata = Arc::new(RowsMetadata::parse(r)?);
                let row_count = read_count(r)?;
                let mut rows = Vec::with_capacity(row_count.min(1024));
                for _ in 0..row_count {
                    rows.push(decode_row(r, &metadata, codec)?);
                }
                Ok(ResultMessage::Rows { metadata, rows })
            }
            RESULT_SET_KEYSPACE => Ok(ResultMessage::SetKeyspace(r.read_string()?)),
            RESULT_PREPARED => {
                let id = Bytes::copy_from_slice(r.read_short_bytes()?);
                let metadata = PreparedMetadata::parse(r, codec.version())?;
                let result_metadata = RowsMetadata::parse(r)?;
                Ok(ResultMessage::Prepared {
                    id,
                    metadata,
                    result_metadata,
                })
            }
            RESULT_SCHEMA_CHANGE => Ok(ResultMessage::SchemaChange(SchemaChange::parse(
                r,
                codec.version(),
            )?)),
            _ => Err(CodecError::ValueOutOfRange("result kind")),
        }
    }
}

/// A schema-change notification, shared by RESULT bodies and push events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    /// CREATED, UPDATED or DROPPED.
    pub change_type: String,
    /// KEYSPACE, TABLE, TYPE, FUNCTION or AGGREGATE.
    pub target: String,
    /// Affected keyspace.
    pub keyspace: String,
    /// Affected object name; absent for keyspace-level changes.
    pub name: Option<String>,
    /// Argument types, for function and aggregate targets.
    pub arguments: Vec<String>,
}

impl SchemaChange {
    /// Parse a schema-change payload; the shape changed in v3.
    pub fn parse(r: &mut Reader<'_>, version: ProtocolVersion) -> Result<Self, CodecError> {
        if version >= ProtocolVersion::V3 {
            let change_type = r.read_string()?;
            let target = r.read_string()?;
            let keyspace = r.read_string()?;
            let (name, arguments) = match target.as_str() {
                "KEYSPACE" => (None, Vec::new()),
                "FUNCTION" | "AGGREGATE" => {
                    let name = r.read_string()?;
                    (Some(name), r.read_string_list()?)
                }
                _ => (Some(r.read_string()?), Vec::new()),
            };
            Ok(SchemaChange {
                change_type,
                target,
                keyspace,
                name,
                arguments,
            })
        } else {
            // pre-v3: [change][keyspace][table], empty table for keyspace scope
            let change_type = r.read_string()?;
            let keyspace = r.read_string()?;
            let table = r.read_string()?;
            let (target, name) = if table.is_empty() {
                ("KEYSPACE".to_string(), None)
            } else {
                ("TABLE".to_string(), Some(table))
            };
            Ok(SchemaChange {
                change_type,
                target,
                keyspace,
                name,
                arguments: Vec::new(),
            })
        }
    }
}

/// Server push events (stream id -1).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A node joined or left the cluster.
    TopologyChange {
        /// NEW_NODE or REMOVED_NODE.
        change: String,
        /// Address of the node.
        address: IpAddr,
        /// Port of the node.
        port: i32,
    },
    /// A node went up or down.
    StatusChange {
        /// UP or DOWN.
        change: String,
        /// Address of the node.
        address: IpAddr,
        /// Port of the node.
        port: i32,
    },
    /// Schema was altered.
    SchemaChange(SchemaChange),
}

impl ServerEvent {
    /// Parse an EVENT body.
    pub fn parse(r: &mut Reader<'_>, version: ProtocolVersion) -> Result<Self, CodecError> {
        let kind = r.read_string()?;
        match kind.as_str() {
            "TOPOLOGY_CHANGE" => {
                let change = r.read_string()?;
                let (address, port) = r.read_inet()?;
                Ok(ServerEvent::TopologyChange {
                    change,
                    address,
                    port,
                })
            }
            "STATUS_CHANGE" => {
                let change = r.read_string()?;
                let (address, port) = r.read_inet()?;
                Ok(ServerEvent::StatusChange {
                    change,
                    address,
                    port,
                })
            }
            "SCHEMA_CHANGE" => Ok(ServerEvent::SchemaChange(SchemaChange::parse(r, version)?)),
            _ => Err(CodecError::InvalidTypeName(kind)),
        }
    }
}

/// Code-specific detail of a server ERROR response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetails {
    /// No structured detail for this code.
    None,
    /// Not enough live replicas.
    Unavailable {
        /// Requested consistency.
        consistency: Consistency,
        /// Replicas required by the consistency level.
        required: i32,
        /// Replicas known alive.
        alive: i32,
    },
    /// Write timed out.
    WriteTimeout {
        /// Requested consistency.
        consistency: Consistency,
        /// Replicas that acknowledged.
        received: i32,
        /// Replicas the consistency level was waiting on.
        block_for: i32,
        /// Kind of write that timed out.
        write_type: String,
    },
    /// Read timed out.
    ReadTimeout {
        /// Requested consistency.
        consistency: Consistency,
        /// Replicas that answered.
        received: i32,
        /// Replicas the consistency level was waiting on.
        block_for: i32,
        /// Whether the data replica answered.
        data_present: bool,
    },
    /// A replica reported a read failure (v4+).
    ReadFailure {
        /// Requested consistency.
        consistency: Consistency,
        /// Replicas that answered.
        received: i32,
        /// Replicas the consistency level was waiting on.
        block_for: i32,
        /// Replicas that failed.
        failures: i32,
        /// Whether the data replica answered.
        data_present: bool,
    },
    /// A replica reported a write failure (v4+).
    WriteFailure {
        /// Requested consistency.
        consistency: Consistency,
        /// Replicas that acknowledged.
        received: i32,
        /// Replicas the consistency level was waiting on.
        block_for: i32,
        /// Replicas that failed.
        failures: i32,
        /// Kind of write that failed.
        write_type: String,
    },
    /// A user function raised.
    FunctionFailure {
        /// Keyspace of the function.
        keyspace: String,
        /// Function name.
        function: String,
        /// Argument types of the failing signature.
        arg_types: Vec<String>,
    },
    /// Keyspace or table already exists.
    AlreadyExists {
        /// Affected keyspace.
        keyspace: String,
        /// Affected table; empty for keyspace-level conflicts.
        table: String,
    },
    /// The executed prepared-statement id is unknown to this host.
    Unprepared {
        /// Statement id that must be re-prepared.
        id: Bytes,
    },
}

/// A decoded server ERROR response.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    /// Numeric error code (see `ServerErrorCode`).
    pub code: i32,
    /// Server-provided message.
    pub message: String,
    /// Code-specific fields.
    pub details: ErrorDetails,
}

impl ServerError {
    /// Parse an ERROR body.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        use crate::error::ServerErrorCode as Code;
        let code = r.read_i32()?;
        let message = r.read_string()?;
        let details = match code {
            Code::UNAVAILABLE => ErrorDetails::Unavailable {
                consistency: read_consistency(r)?,
                required: r.read_i32()?,
                alive: r.read_i32()?,
            },
            Code::WRITE_TIMEOUT => ErrorDetails::WriteTimeout {
                consistency: read_consistency(r)?,
                received: r.read_i32()?,
                block_for: r.read_i32()?,
                write_type: r.read_string()?,
            },
            Code::READ_TIMEOUT => ErrorDetails::ReadTimeout {
                consistency: read_consistency(r)?,
                received: r.read_i32()?,
                block_for: r.read_i32()?,
                data_present: r.read_u8()? != 0,
            },
            Code::READ_FAILURE => ErrorDetails::ReadFailure {
                consistency: read_consistency(r)?,
                received: r.read_i32()?,
                block_for: r.read_i32()?,
                failures: r.read_i32()?,
                data_present: r.read_u8()? != 0,
            },
            Code::WRITE_FAILURE => ErrorDetails::WriteFailure {
                consistency: read_consistency(r)?,
                received: r.read_i32()?,
                block_for: r.read_i32()?,
                failures: r.read_i32()?,
                write_type: r.read_string()?,
            },
            Code::FUNCTION_FAILURE => ErrorDetails::FunctionFailure {
                keyspace: r.read_string()?,
                function: r.read_string()?,
                arg_types: r.read_string_list()?,
            },
            Code::ALREADY_EXISTS => ErrorDetails::AlreadyExists {
                keyspace: r.read_string()?,
                table: r.read_string()?,
            },
            Code::UNPREPARED => ErrorDetails::Unprepared {
                id: Bytes::copy_from_slice(r.read_short_bytes()?),
            },
            _ => ErrorDetails::None,
        };
        Ok(ServerError {
            code,
            message,
            details,
        })
    }
}

/// A fully parsed response frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMessage {
    /// Server accepted the STARTUP.
    Ready,
    /// Server requires authentication; carries the authenticator class.
    Authenticate(String),
    /// SASL challenge token.
    AuthChallenge(Option<Vec<u8>>),
    /// SASL success token.
    AuthSuccess(Option<Vec<u8>>),
    /// OPTIONS response.
    Supported(HashMap<String, Vec<String>>),
    /// Push event.
    Event(ServerEvent),
    /// Server-reported error for one request.
    Error(ServerError),
    /// Query/prepare/execute result.
    Result(ResultMessage),
}

impl ResponseMessage {
    /// Parse a fully buffered response body for the header's opcode.
    pub fn parse(
        header: &FrameHeader,
        body: &[u8],
        codec: &TypeCodec,
    ) -> Result<Self, CodecError> {
        let mut r = Reader::new(body);
        match header.opcode {
            Opcode::Ready => Ok(ResponseMessage::Ready),
            Opcode::Authenticate => Ok(ResponseMessage::Authenticate(r.read_string()?)),
            Opcode::AuthChallenge => Ok(ResponseMessage::AuthChallenge(
                r.read_bytes()?.map(<[u8]>::to_vec),
            )),
            Opcode::AuthSuccess => Ok(ResponseMessage::AuthSuccess(
                r.read_bytes()?.map(<[u8]>::to_vec),
            )),
            Opcode::Supported => Ok(ResponseMessage::Supported(r.read_string_multimap()?)),
            Opcode::Event => Ok(ResponseMessage::Event(ServerEvent::parse(
                &mut r,
                header.version,
            )?)),
            Opcode::Error => Ok(ResponseMessage::Error(ServerError::parse(&mut r)?)),
            Opcode::Result => Ok(ResponseMessage::Result(ResultMessage::parse(&mut r, codec)?)),
            other => Err(CodecError::InvalidTypeName(format!(
                "request opcode {:?} in response",
                other
            ))),
        }
    }
}

/// Parse one type option from result metadata.
pub fn read_type_option(r: &mut Reader<'_>) -> Result<CqlType, CodecError> {
    let code = r.read_u16()?;
    match code {
        type_code::CUSTOM => parse_class_name(&r.read_string()?),
        type_code::ASCII => Ok(CqlType::Ascii),
        type_code::BIGINT => Ok(CqlType::BigInt),
        type_code::BLOB => Ok(CqlType::Blob),
        type_code::BOOLEAN => Ok(CqlType::Boolean),
        type_code::COUNTER => Ok(CqlType::Counter),
        type_code::DECIMAL => Ok(CqlType::Decimal),
        type_code::DOUBLE => Ok(CqlType::Double),
        type_code::FLOAT => Ok(CqlType::Float),
        type_code::INT => Ok(CqlType::Int),
        type_code::TEXT => Ok(CqlType::Text),
        type_code::TIMESTAMP => Ok(CqlType::Timestamp),
        type_code::UUID => Ok(CqlType::Uuid),
        type_code::VARCHAR => Ok(CqlType::Varchar),
        type_code::VARINT => Ok(CqlType::Varint),
        type_code::TIMEUUID => Ok(CqlType::Timeuuid),
        type_code::INET => Ok(CqlType::Inet),
        type_code::DATE => Ok(CqlType::Date),
        type_code::TIME => Ok(CqlType::Time),
        type_code::SMALLINT => Ok(CqlType::Smallint),
        type_code::TINYINT => Ok(CqlType::Tinyint),
        type_code::DURATION => Ok(CqlType::Duration),
        type_code::LIST => Ok(CqlType::List(Box::new(read_type_option(r)?))),
        type_code::MAP => Ok(CqlType::Map(
            Box::new(read_type_option(r)?),
            Box::new(read_type_option(r)?),
        )),
        type_code::SET => Ok(CqlType::Set(Box::new(read_type_option(r)?))),
        type_code::UDT => {
            let keyspace = r.read_string()?;
            let name = r.read_string()?;
            let field_count = r.read_u16()? as usize;
            let mut fields = Vec::with_capacity(field_count.min(1024));
            for _ in 0..field_count {
                let field_name = r.read_string()?;
                fields.push((field_name, read_type_option(r)?));
            }
            Ok(CqlType::Udt(UdtDescriptor {
                keyspace,
                name,
                fields,
            }))
        }
        type_code::TUPLE => {
            let count = r.read_u16()? as usize;
            let mut types = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                types.push(read_type_option(r)?);
            }
            Ok(CqlType::Tuple(types))
        }
        other => Err(CodecError::UnknownTypeCode(other)),
    }
}

fn parse_column_specs(
    r: &mut Reader<'_>,
    flags: i32,
    column_count: usize,
) -> Result<Vec<ColumnSpec>, CodecError> {
    let global = if flags & RowsMetadata::GLOBAL_TABLES_SPEC != 0 {
        Some((r.read_string()?, r.read_string()?))
    } else {
        None
    };
    let mut columns = Vec::with_capacity(column_count.min(1024));
    for _ in 0..column_count {
        let (keyspace, table) = match &global {
            Some((ks, table)) => (ks.clone(), table.clone()),
            None => (r.read_string()?, r.read_string()?),
        };
        let name = r.read_string()?;
        let ty = read_type_option(r)?;
        columns.push(ColumnSpec {
            keyspace,
            table,
            name,
            ty,
        });
    }
    Ok(columns)
}

fn read_count(r: &mut Reader<'_>) -> Result<usize, CodecError> {
    let count = r.read_i32()?;
    if count < 0 {
        return Err(CodecError::ValueOutOfRange("count"));
    }
    Ok(count as usize)
}

fn read_consistency(r: &mut Reader<'_>) -> Result<Consistency, CodecError> {
    Consistency::from_u16(r.read_u16()?).ok_or(CodecError::ValueOutOfRange("consistency"))
}
