//! Type-name parsing.
//!
//! Two grammars produce [`CqlType`] descriptors:
//!
//! 1. Declarative CQL names as they appear in schema metadata:
//!    `int`, `list<text>`, `map<uuid, frozen<address>>`, `vector<float, 3>`.
//!    User-defined type names require a schema lookup, so this parser is
//!    async and takes a [`UdtResolver`].
//! 2. Legacy fully-qualified Java class names
//!    (`org.apache.cassandra.db.marshal.*`), self-contained and parsed
//!    synchronously; UDT definitions are inlined in the class string.
//!
//! A single-quoted name inside the declarative grammar switches to the class
//! grammar, which is how custom types (vectors included) surface in schema
//! tables.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::types::{CqlType, UdtDescriptor};
use super::CodecError;
use crate::error::CqlResult;

const MARSHAL_PREFIX: &str = "org.apache.cassandra.db.marshal.";

/// Schema lookup for user-defined type definitions.
///
/// The declarative grammar names UDTs without their field layout; the parser
/// suspends at each UDT reference and asks the resolver for the descriptor.
#[async_trait]
pub trait UdtResolver: Send + Sync {
    /// Resolve a UDT by keyspace and (case-sensitive) name.
    async fn resolve(&self, keyspace: &str, name: &str) -> CqlResult<UdtDescriptor>;
}

/// Parse a declarative CQL type name.
///
/// `keyspace` scopes unqualified UDT references. Recursion is boxed so that
/// nested generics (`map<text, frozen<list<my_type>>>`) can await UDT
/// resolution at any depth.
pub fn parse_cql_type_name<'a>(
    name: &'a str,
    keyspace: &'a str,
    resolver: &'a dyn UdtResolver,
) -> BoxFuture<'a, CqlResult<CqlType>> {
    Box::pin(async move {
        let name = name.trim();
        if name.is_empty() {
            return Err(CodecError::InvalidTypeName(name.to_string()).into());
        }

        // single quotes wrap a legacy class name
        if let Some(inner) = name.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return Ok(parse_class_name(inner)?);
        }

        if let Some((base, args)) = split_generic(name) {
            let base = base.trim().to_ascii_lowercase();
            let args = split_top_level(args, '<', '>');
            return match (base.as_str(), args.len()) {
                ("frozen", 1) => parse_cql_type_name(args[0], keyspace, resolver).await,
                ("list", 1) => Ok(CqlType::List(Box::new(
                    parse_cql_type_name(args[0], keyspace, resolver).await?,
                ))),
                ("set", 1) => Ok(CqlType::Set(Box::new(
                    parse_cql_type_name(args[0], keyspace, resolver).await?,
                ))),
                ("map", 2) => Ok(CqlType::Map(
                    Box::new(parse_cql_type_name(args[0], keyspace, resolver).await?),
                    Box::new(parse_cql_type_name(args[1], keyspace, resolver).await?),
                )),
                ("tuple", n) if n > 0 => {
                    let mut types = Vec::with_capacity(n);
                    for arg in args {
                        types.push(parse_cql_type_name(arg, keyspace, resolver).await?);
                    }
                    Ok(CqlType::Tuple(types))
                }
                ("vector", 2) => {
                    let element = parse_cql_type_name(args[0], keyspace, resolver).await?;
                    let dimensions = args[1]
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| CodecError::InvalidTypeName(name.to_string()))?;
                    Ok(CqlType::Vector {
                        element: Box::new(element),
                        dimensions,
                    })
                }
                _ => Err(CodecError::InvalidTypeName(name.to_string()).into()),
            };
        }

        if let Some(ty) = primitive_by_name(&name.to_ascii_lowercase()) {
            return Ok(ty);
        }

        // anything left is a UDT reference: double quotes preserve case,
        // bare identifiers fold to lowercase
        let udt_name = match name.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            Some(quoted) => quoted.to_string(),
            None => name.to_ascii_lowercase(),
        };
        let desc = resolver.resolve(keyspace, &udt_name).await?;
        Ok(CqlType::Udt(desc))
    })
}

/// Parse a legacy fully-qualified marshal class name.
///
/// Unknown classes are preserved as [`CqlType::Custom`] rather than rejected;
/// only structurally malformed parameter lists are errors.
pub fn parse_class_name(class: &str) -> Result<CqlType, CodecError> {
    let class = class.trim();
    let short = class.strip_prefix(MARSHAL_PREFIX).unwrap_or(class);

    let (base, args) = match split_parenthesized(short) {
        Some((base, args)) => (base, Some(args)),
        None => (short, None),
    };

    match (base, args) {
        ("AsciiType", None) => Ok(CqlType::Ascii),
        ("LongType", None) => Ok(CqlType::BigInt),
        ("BytesType", None) => Ok(CqlType::Blob),
        ("BooleanType", None) => Ok(CqlType::Boolean),
        ("CounterColumnType", None) => Ok(CqlType::Counter),
        ("DecimalType", None) => Ok(CqlType::Decimal),
        ("DoubleType", None) => Ok(CqlType::Double),
        ("FloatType", None) => Ok(CqlType::Float),
        ("Int32Type", None) => Ok(CqlType::Int),
        ("UTF8Type", None) => Ok(CqlType::Text),
        // DateType is the pre-2.1 millisecond timestamp, not a date
        ("TimestampType", None) | ("DateType", None) => Ok(CqlType::Timestamp),
        ("UUIDType", None) => Ok(CqlType::Uuid),
        ("IntegerType", None) => Ok(CqlType::Varint),
        ("TimeUUIDType", None) => Ok(CqlType::Timeuuid),
        ("InetAddressType", None) => Ok(CqlType::Inet),
        ("SimpleDateType", None) => Ok(CqlType::Date),
        ("TimeType", None) => Ok(CqlType::Time),
        ("ShortType", None) => Ok(CqlType::Smallint),
        ("ByteType", None) => Ok(CqlType::Tinyint),
        ("DurationType", None) => Ok(CqlType::Duration),
        ("FrozenType", Some(args)) | ("ReversedType", Some(args)) => {
            let inner = single_arg(class, args)?;
            parse_class_name(inner)
        }
        ("ListType", Some(args)) => {
            let inner = single_arg(class, args)?;
            Ok(CqlType::List(Box::new(parse_class_name(inner)?)))
        }
        ("SetType", Some(args)) => {
            let inner = single_arg(class, args)?;
            Ok(CqlType::Set(Box::new(parse_class_name(inner)?)))
        }
        ("MapType", Some(args)) => {
            let parts = split_top_level(args, '(', ')');
            if parts.len() != 2 {
                return Err(CodecError::InvalidTypeName(class.to_string()));
            }
            Ok(CqlType::Map(
                Box::new(parse_class_name(parts[0])?),
                Box::new(parse_class_name(parts[1])?),
            ))
        }
        ("TupleType", Some(args)) => {
            let parts = split_top_level(args, '(', ')');
            let mut types = Vec::with_capacity(parts.len());
            for part in parts {
                types.push(parse_class_name(part)?);
            }
            Ok(CqlType::Tuple(types))
        }
        ("UserType", Some(args)) => {
            let parts = split_top_level(args, '(', ')');
            if parts.len() < 2 {
                return Err(CodecError::InvalidTypeName(class.to_string()));
            }
            let keyspace = parts[0].trim().to_string();
            let name = hex_to_string(parts[1].trim())
                .ok_or_else(|| CodecError::InvalidTypeName(class.to_string()))?;
            let mut fields = Vec::with_capacity(parts.len() - 2);
            for part in &parts[2..] {
                let (hex_name, field_class) = part
                    .split_once(':')
                    .ok_or_else(|| CodecError::InvalidTypeName(class.to_string()))?;
                let field_name = hex_to_string(hex_name.trim())
                    .ok_or_else(|| CodecError::InvalidTypeName(class.to_string()))?;
                fields.push((field_name, parse_class_name(field_class)?));
            }
            Ok(CqlType::Udt(UdtDescriptor {
                keyspace,
                name,
                fields,
            }))
        }
        ("VectorType", Some(args)) => {
            let parts = split_top_level(args, '(', ')');
            if parts.len() != 2 {
                return Err(CodecError::InvalidTypeName(class.to_string()));
            }
            let element = parse_class_name(parts[0])?;
            let dimensions = parts[1]
                .trim()
                .parse::<usize>()
                .map_err(|_| CodecError::InvalidTypeName(class.to_string()))?;
            Ok(CqlType::Vector {
                element: Box::new(element),
                dimensions,
            })
        }
        _ => Ok(CqlType::Custom(class.to_string())),
    }
}

fn single_arg<'s>(class: &str, args: &'s str) -> Result<&'s str, CodecError> {
    let parts = split_top_level(args, '(', ')');
    if parts.len() != 1 {
        return Err(CodecError::InvalidTypeName(class.to_string()));
    }
    Ok(parts[0])
}

/// Split `base<args>` into its parts; `None` when the name is not generic.
fn split_generic(name: &str) -> Option<(&str, &str)> {
    let open = name.find('<')?;
    let rest = name.strip_suffix('>')?;
    Some((&name[..open], &rest[open + 1..]))
}

/// Split `Base(args)` into its parts; `None` when there is no parameter list.
fn split_parenthesized(name: &str) -> Option<(&str, &str)> {
    let open = name.find('(')?;
    let rest = name.strip_suffix(')')?;
    Some((&name[..open], &rest[open + 1..]))
}

/// Split on top-level commas, ignoring commas nested inside `open`/`close`.
fn split_top_level(s: &str, open: char, close: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
        } else if c == ',' && depth == 0 {
            parts.push(s[start..i].trim());
            start = i + 1;
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn primitive_by_name(name: &str) -> Option<CqlType> {
    Some(match name {
        "ascii" => CqlType::Ascii,
        "bigint" => CqlType::BigInt,
        "blob" => CqlType::Blob,
        "boolean" => CqlType::Boolean,
        "counter" => CqlType::Counter,
        "decimal" => CqlType::Decimal,
        "double" => CqlType::Double,
        "float" => CqlType::Float,
        "int" => CqlType::Int,
        "text" => CqlType::Text,
        "varchar" => CqlType::Varchar,
        "timestamp" => CqlType::Timestamp,
        "uuid" => CqlType::Uuid,
        "varint" => CqlType::Varint,
        "timeuuid" => CqlType::Timeuuid,
        "inet" => CqlType::Inet,
        "date" => CqlType::Date,
        "time" => CqlType::Time,
        "smallint" => CqlType::Smallint,
        "tinyint" => CqlType::Tinyint,
        "duration" => CqlType::Duration,
        _ => return None,
    })
}

fn hex_to_string(hex: &str) -> Option<String> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CqlError;

    struct StubResolver;

    #[async_trait]
    impl UdtResolver for StubResolver {
        async fn resolve(&self, keyspace: &str, name: &str) -> CqlResult<UdtDescriptor> {
            if name == "address" || name == "Address" {
                Ok(UdtDescriptor {
                    keyspace: keyspace.to_string(),
                    name: name.to_string(),
                    fields: vec![("street".to_string(), CqlType::Text)],
                })
            } else {
                Err(CqlError::UdtLookup(format!("{}.{}", keyspace, name)))
            }
        }
    }

    async fn parse(name: &str) -> CqlResult<CqlType> {
        parse_cql_type_name(name, "ks", &StubResolver).await
    }

    #[tokio::test]
    async fn test_parse_primitives() {
        assert_eq!(parse("int").await.unwrap(), CqlType::Int);
        assert_eq!(parse("TEXT").await.unwrap(), CqlType::Text);
        assert_eq!(parse(" timeuuid ").await.unwrap(), CqlType::Timeuuid);
    }

    #[tokio::test]
    async fn test_parse_nested_generics() {
        assert_eq!(
            parse("map<text, frozen<list<int>>>").await.unwrap(),
            CqlType::Map(
                Box::new(CqlType::Text),
                Box::new(CqlType::List(Box::new(CqlType::Int)))
            )
        );
        assert_eq!(
            parse("tuple<int, map<text, uuid>, boolean>").await.unwrap(),
            CqlType::Tuple(vec![
                CqlType::Int,
                CqlType::Map(Box::new(CqlType::Text), Box::new(CqlType::Uuid)),
                CqlType::Boolean,
            ])
        );
    }

    #[tokio::test]
    async fn test_parse_vector() {
        assert_eq!(
            parse("vector<float, 3>").await.unwrap(),
            CqlType::Vector {
                element: Box::new(CqlType::Float),
                dimensions: 3,
            }
        );
        assert!(parse("vector<float>").await.is_err());
        assert!(parse("vector<float, many>").await.is_err());
    }

    #[tokio::test]
    async fn test_parse_udt_references() {
        match parse("address").await.unwrap() {
            CqlType::Udt(desc) => assert_eq!(desc.name, "address"),
            other => panic!("expected udt, got {:?}", other),
        }
        // bare identifiers fold to lowercase, quoted ones keep their case
        match parse("ADDRESS").await.unwrap() {
            CqlType::Udt(desc) => assert_eq!(desc.name, "address"),
            other => panic!("expected udt, got {:?}", other),
        }
        match parse("\"Address\"").await.unwrap() {
            CqlType::Udt(desc) => assert_eq!(desc.name, "Address"),
            other => panic!("expected udt, got {:?}", other),
        }
        assert!(parse("no_such_type").await.is_err());
    }

    #[tokio::test]
    async fn test_single_quoted_switches_to_class_grammar() {
        assert_eq!(
            parse("'org.apache.cassandra.db.marshal.Int32Type'")
                .await
                .unwrap(),
            CqlType::Int
        );
    }

    #[test]
    fn test_class_primitives() {
        assert_eq!(
            parse_class_name("org.apache.cassandra.db.marshal.UTF8Type").unwrap(),
            CqlType::Text
        );
        assert_eq!(
            parse_class_name("org.apache.cassandra.db.marshal.LongType").unwrap(),
            CqlType::BigInt
        );
        // legacy DateType is a timestamp
        assert_eq!(
            parse_class_name("org.apache.cassandra.db.marshal.DateType").unwrap(),
            CqlType::Timestamp
        );
        assert_eq!(
            parse_class_name("org.apache.cassandra.db.marshal.SimpleDateType").unwrap(),
            CqlType::Date
        );
    }

    #[test]
    fn test_class_collections() {
        assert_eq!(
            parse_class_name(
                "org.apache.cassandra.db.marshal.MapType(\
                 org.apache.cassandra.db.marshal.UTF8Type,\
                 org.apache.cassandra.db.marshal.Int32Type)"
            )
            .unwrap(),
            CqlType::Map(Box::new(CqlType::Text), Box::new(CqlType::Int))
        );
        assert_eq!(
            parse_class_name(
                "org.apache.cassandra.db.marshal.ListType(\
                 org.apache.cassandra.db.marshal.SetType(\
                 org.apache.cassandra.db.marshal.UUIDType))"
            )
            .unwrap(),
            CqlType::List(Box::new(CqlType::Set(Box::new(CqlType::Uuid))))
        );
    }

    #[test]
    fn test_class_reversed_and_frozen_transparent() {
        assert_eq!(
            parse_class_name(
                "org.apache.cassandra.db.marshal.ReversedType(\
                 org.apache.cassandra.db.marshal.TimeUUIDType)"
            )
            .unwrap(),
            CqlType::Timeuuid
        );
        assert_eq!(
            parse_class_name(
                "org.apache.cassandra.db.marshal.FrozenType(\
                 org.apache.cassandra.db.marshal.Int32Type)"
            )
            .unwrap(),
            CqlType::Int
        );
    }

    #[test]
    fn test_class_user_type_hex_names() {
        // keyspace "ks", name "phone" (70686f6e65),
        // field "alias" (616c696173): text
        let class = "org.apache.cassandra.db.marshal.UserType(\
                     ks,70686f6e65,\
                     616c696173:org.apache.cassandra.db.marshal.UTF8Type)";
        match parse_class_name(class).unwrap() {
            CqlType::Udt(desc) => {
                assert_eq!(desc.keyspace, "ks");
                assert_eq!(desc.name, "phone");
                assert_eq!(desc.fields, vec![("alias".to_string(), CqlType::Text)]);
            }
            other => panic!("expected udt, got {:?}", other),
        }
    }

    #[test]
    fn test_class_vector() {
        let class = "org.apache.cassandra.db.marshal.VectorType(\
                     org.apache.cassandra.db.marshal.FloatType, 3)";
        assert_eq!(
            parse_class_name(class).unwrap(),
            CqlType::Vector {
                element: Box::new(CqlType::Float),
                dimensions: 3,
            }
        );
    }

    #[test]
    fn test_class_unknown_falls_back_to_custom() {
        let class = "com.example.MyCustomType";
        assert_eq!(
            parse_class_name(class).unwrap(),
            CqlType::Custom(class.to_string())
        );
    }

    #[test]
    fn test_split_top_level_depth() {
        assert_eq!(
            split_top_level("a<b,c>, d", '<', '>'),
            vec!["a<b,c>", "d"]
        );
        assert_eq!(split_top_level("", '<', '>'), Vec::<&str>::new());
    }
}
