//! Typed attribute values.
//!
//! # Responsibilities
//! - Parse attribute text into a typed [`Value`]
//! - Render the canonical text form (parses back to the same value)
//! - Provide equality, hashing and same-type ordering for index keys and comparisons

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Bool,
    IpAddr,
    IpPrefix,
    Enum,
    Octets,
    /// Structural attribute, carries no scalar value.
    Group,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Bool => "bool",
            ValueType::IpAddr => "ipaddr",
            ValueType::IpPrefix => "ipprefix",
            ValueType::Enum => "enum",
            ValueType::Octets => "octets",
            ValueType::Group => "group",
        };
        f.write_str(name)
    }
}

/// Error produced when text cannot be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid {ty} value \"{text}\"")]
    Invalid { ty: ValueType, text: String },

    #[error("unknown value \"{text}\" for attribute {attr}")]
    UnknownEnum { attr: String, text: String },

    #[error("{ty} attributes carry no scalar value")]
    Structural { ty: ValueType },
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    String(String),
    Integer(i64),
    Bool(bool),
    IpAddr(IpAddr),
    /// Always stored with host bits cleared.
    IpPrefix(IpNet),
    Enum(u32),
    Octets(Vec<u8>),
}

impl Value {
    /// Parse text as a value of the given type.
    ///
    /// Enumerated values need their attribute's name table, so [`ValueType::Enum`]
    /// only accepts the numeric form here; see [`crate::dictionary::AttrDef::parse_value`].
    pub fn parse(ty: ValueType, text: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::Invalid {
            ty,
            text: text.to_string(),
        };

        match ty {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Integer => {
                let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => i64::from_str_radix(hex, 16),
                    None => text.parse::<i64>(),
                };
                parsed.map(Value::Integer).map_err(|_| invalid())
            }
            ValueType::Bool => parse_bool(text).map(Value::Bool).ok_or_else(invalid),
            ValueType::IpAddr => text.parse::<IpAddr>().map(Value::IpAddr).map_err(|_| invalid()),
            ValueType::IpPrefix => parse_prefix(text).map(Value::IpPrefix).ok_or_else(invalid),
            ValueType::Enum => text.parse::<u32>().map(Value::Enum).map_err(|_| invalid()),
            ValueType::Octets => match text.strip_prefix("0x") {
                Some(digits) => hex::decode(digits).map(Value::Octets).map_err(|_| invalid()),
                None => Ok(Value::Octets(text.as_bytes().to_vec())),
            },
            ValueType::Group => Err(ValueError::Structural { ty }),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
            Value::Bool(_) => ValueType::Bool,
            Value::IpAddr(_) => ValueType::IpAddr,
            Value::IpPrefix(_) => ValueType::IpPrefix,
            Value::Enum(_) => ValueType::Enum,
            Value::Octets(_) => ValueType::Octets,
        }
    }

    /// Order two values of the same type. Returns `None` across types,
    /// and across address families.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::IpAddr(a), Value::IpAddr(b)) if a.is_ipv4() == b.is_ipv4() => Some(a.cmp(b)),
            (Value::IpPrefix(a), Value::IpPrefix(b)) if same_family(a, b) => Some(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) => Some(a.cmp(b)),
            (Value::Octets(a), Value::Octets(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The value as an IP network: addresses become full-length prefixes.
    pub fn as_network(&self) -> Option<IpNet> {
        match self {
            Value::IpAddr(addr) => Some(IpNet::from(*addr)),
            Value::IpPrefix(net) => Some(*net),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Bool(true) => f.write_str("yes"),
            Value::Bool(false) => f.write_str("no"),
            Value::IpAddr(addr) => write!(f, "{}", addr),
            Value::IpPrefix(net) => write!(f, "{}", net),
            Value::Enum(n) => write!(f, "{}", n),
            Value::Octets(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `addr/len` or a bare address (full-length prefix), clearing host bits.
pub(crate) fn parse_prefix(text: &str) -> Option<IpNet> {
    if text.contains('/') {
        text.parse::<IpNet>().ok().map(|net| net.trunc())
    } else {
        text.parse::<IpAddr>().ok().map(IpNet::from)
    }
}

fn same_family(a: &IpNet, b: &IpNet) -> bool {
    matches!(
        (a, b),
        (IpNet::V4(_), IpNet::V4(_)) | (IpNet::V6(_), IpNet::V6(_))
    )
}
