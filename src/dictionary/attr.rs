//! Attribute definitions and the dictionary that names them.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::dictionary::value::{Value, ValueError, ValueType};

/// Name of the control attribute that keeps the merge walk going after a match.
pub const FALL_THROUGH: &str = "Fall-Through";

/// Name of the control attribute that requests shorter-prefix retries.
pub const NEXT_SHORTEST_PREFIX: &str = "Next-Shortest-Prefix";

/// Error type for dictionary construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictionaryError {
    #[error("attribute {0} is already defined")]
    Duplicate(String),

    #[error("attribute {0} is not defined")]
    Missing(String),

    #[error("attribute {name} must be of type {expected}, not {found}")]
    WrongType {
        name: String,
        expected: ValueType,
        found: ValueType,
    },
}

/// Definition of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrDef {
    pub name: String,
    /// Unique per dictionary; identity comparisons use this.
    pub number: u32,
    pub ty: ValueType,
    /// Named values for enumerated attributes.
    pub values: Vec<(String, u32)>,
}

impl AttrDef {
    /// Parse text as a value of this attribute, resolving enumeration names.
    pub fn parse_value(&self, text: &str) -> Result<Value, ValueError> {
        if self.ty != ValueType::Enum {
            return Value::parse(self.ty, text);
        }

        if let Some((_, number)) = self
            .values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
        {
            return Ok(Value::Enum(*number));
        }

        text.parse::<u32>()
            .map(Value::Enum)
            .map_err(|_| ValueError::UnknownEnum {
                attr: self.name.clone(),
                text: text.to_string(),
            })
    }

    /// Render a value, preferring enumeration names.
    pub fn format_value(&self, value: &Value) -> String {
        if let Value::Enum(number) = value {
            if let Some((name, _)) = self.values.iter().find(|(_, n)| n == number) {
                return name.clone();
            }
        }
        value.to_string()
    }

    pub fn same_attr(&self, other: &AttrDef) -> bool {
        self.number == other.number
    }
}

/// Case-insensitive attribute name table.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    by_name: HashMap<String, Arc<AttrDef>>,
    next_number: u32,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dictionary preloaded with the common RADIUS attributes and the control attributes.
    pub fn builtin() -> Self {
        let mut dict = Self::new();
        let plain: &[(&str, ValueType)] = &[
            ("User-Name", ValueType::String),
            ("User-Password", ValueType::String),
            ("NAS-IP-Address", ValueType::IpAddr),
            ("NAS-Port", ValueType::Integer),
            ("Framed-IP-Address", ValueType::IpAddr),
            ("Framed-IP-Netmask", ValueType::IpAddr),
            ("Filter-Id", ValueType::String),
            ("Reply-Message", ValueType::String),
            ("Class", ValueType::Octets),
            ("Session-Timeout", ValueType::Integer),
            ("Idle-Timeout", ValueType::Integer),
            ("Called-Station-Id", ValueType::String),
            ("Calling-Station-Id", ValueType::String),
            ("NAS-Identifier", ValueType::String),
            ("Framed-IPv6-Prefix", ValueType::IpPrefix),
            ("Stripped-User-Name", ValueType::String),
            ("Packet-Src-IP-Address", ValueType::IpAddr),
            ("Client-Network", ValueType::IpPrefix),
            ("Vendor-Specific", ValueType::Group),
            (FALL_THROUGH, ValueType::Bool),
            (NEXT_SHORTEST_PREFIX, ValueType::Bool),
        ];
        for (name, ty) in plain {
            // Names above are distinct, insertion cannot collide.
            let _ = dict.add(name, *ty, Vec::new());
        }

        let enums: &[(&str, &[(&str, u32)])] = &[
            (
                "Service-Type",
                &[
                    ("Login-User", 1),
                    ("Framed-User", 2),
                    ("Callback-Login-User", 3),
                    ("Administrative-User", 6),
                    ("Authenticate-Only", 8),
                ],
            ),
            ("Framed-Protocol", &[("PPP", 1), ("SLIP", 2)]),
            (
                "Acct-Status-Type",
                &[
                    ("Start", 1),
                    ("Stop", 2),
                    ("Interim-Update", 3),
                    ("Accounting-On", 7),
                    ("Accounting-Off", 8),
                ],
            ),
            ("Auth-Type", &[("Accept", 1), ("Reject", 2), ("PAP", 3), ("CHAP", 4)]),
        ];
        for (name, values) in enums {
            let values = values.iter().map(|(n, v)| (n.to_string(), *v)).collect();
            let _ = dict.add(name, ValueType::Enum, values);
        }

        dict
    }

    /// Define a new attribute.
    pub fn add(
        &mut self,
        name: &str,
        ty: ValueType,
        values: Vec<(String, u32)>,
    ) -> Result<Arc<AttrDef>, DictionaryError> {
        let key = name.to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(DictionaryError::Duplicate(name.to_string()));
        }

        self.next_number += 1;
        let def = Arc::new(AttrDef {
            name: name.to_string(),
            number: self.next_number,
            ty,
            values,
        });
        self.by_name.insert(key, def.clone());
        Ok(def)
    }

    /// Find an attribute by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<Arc<AttrDef>> {
        self.by_name.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Find an attribute or fail with [`DictionaryError::Missing`].
    pub fn require(&self, name: &str) -> Result<Arc<AttrDef>, DictionaryError> {
        self.lookup(name)
            .ok_or_else(|| DictionaryError::Missing(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Control attributes resolved once at startup and handed to the classifier.
#[derive(Debug, Clone)]
pub struct ControlAttrs {
    pub fall_through: Arc<AttrDef>,
    pub next_shortest_prefix: Arc<AttrDef>,
}

impl ControlAttrs {
    pub fn resolve(dict: &Dictionary) -> Result<Self, DictionaryError> {
        Ok(Self {
            fall_through: require_bool(dict, FALL_THROUGH)?,
            next_shortest_prefix: require_bool(dict, NEXT_SHORTEST_PREFIX)?,
        })
    }
}

fn require_bool(dict: &Dictionary, name: &str) -> Result<Arc<AttrDef>, DictionaryError> {
    let def = dict.require(name)?;
    if def.ty != ValueType::Bool {
        return Err(DictionaryError::WrongType {
            name: def.name.clone(),
            expected: ValueType::Bool,
            found: def.ty,
        });
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let dict = Dictionary::builtin();
        let def = dict.lookup("user-name").unwrap();
        assert_eq!(def.name, "User-Name");
        assert_eq!(def.ty, ValueType::String);
        assert!(dict.lookup("No-Such-Attribute").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut dict = Dictionary::builtin();
        let err = dict.add("USER-NAME", ValueType::String, Vec::new()).unwrap_err();
        assert_eq!(err, DictionaryError::Duplicate("USER-NAME".into()));
    }

    #[test]
    fn test_enum_names() {
        let dict = Dictionary::builtin();
        let def = dict.lookup("Service-Type").unwrap();
        let v = def.parse_value("framed-user").unwrap();
        assert_eq!(v, Value::Enum(2));
        assert_eq!(def.format_value(&v), "Framed-User");
        assert_eq!(def.parse_value("6").unwrap(), Value::Enum(6));
        assert!(def.parse_value("Bogus").is_err());
    }

    #[test]
    fn test_control_attrs_must_be_bool() {
        let dict = Dictionary::builtin();
        assert!(ControlAttrs::resolve(&dict).is_ok());

        let mut broken = Dictionary::new();
        broken.add(FALL_THROUGH, ValueType::String, Vec::new()).unwrap();
        broken.add(NEXT_SHORTEST_PREFIX, ValueType::Bool, Vec::new()).unwrap();
        assert!(matches!(
            ControlAttrs::resolve(&broken),
            Err(DictionaryError::WrongType { .. })
        ));

        assert_eq!(
            ControlAttrs::resolve(&Dictionary::new()).unwrap_err(),
            DictionaryError::Missing(FALL_THROUGH.into())
        );
    }
}
