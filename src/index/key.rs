//! Key extraction.
//!
//! Turns the configured key attributes into a lookup key for one request,
//! and entry names into bucket keys at build time. Both sides go through the
//! same typed parse so that a stored key and a runtime key compare equal.

use std::sync::Arc;

use crate::dictionary::{AttrDef, Dictionary, Value, ValueError, ValueType};
use crate::error::PolicyError;
use crate::index::trie::TrieKey;
use crate::index::IndexKind;
use crate::request::{Attr, Request};

/// Key for one lookup, shaped for the index it will probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Hash(Value),
    Trie(TrieKey),
}

impl LookupKey {
    pub fn as_trie(&self) -> Option<&TrieKey> {
        match self {
            LookupKey::Trie(key) => Some(key),
            LookupKey::Hash(_) => None,
        }
    }
}

/// Resolves the lookup key from an ordered list of candidate attributes.
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    attrs: Vec<Arc<AttrDef>>,
    ty: ValueType,
    kind: IndexKind,
}

impl KeyExtractor {
    /// All candidates must share one value type, and that type must be indexable.
    pub fn new(attrs: Vec<Arc<AttrDef>>) -> Result<Self, PolicyError> {
        let first = attrs.first().ok_or(PolicyError::NoKey)?.clone();

        if let Some(other) = attrs.iter().find(|a| a.ty != first.ty) {
            return Err(PolicyError::KeyTypeMismatch {
                first: first.name.clone(),
                first_ty: first.ty,
                other: other.name.clone(),
                other_ty: other.ty,
            });
        }

        let kind = IndexKind::for_type(first.ty).ok_or_else(|| PolicyError::KeyType {
            attr: first.name.clone(),
            ty: first.ty,
        })?;

        Ok(Self {
            ty: first.ty,
            attrs,
            kind,
        })
    }

    pub fn from_names<S: AsRef<str>>(dict: &Dictionary, names: &[S]) -> Result<Self, PolicyError> {
        let attrs = names
            .iter()
            .map(|name| dict.require(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(attrs)
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn key_type(&self) -> ValueType {
        self.ty
    }

    pub fn attrs(&self) -> &[Arc<AttrDef>] {
        &self.attrs
    }

    /// Parse an entry name into the value its bucket is stored under.
    ///
    /// Address keys accept prefixes too, so `10.0.0.0/8` works for an
    /// IP address attribute.
    pub fn parse_name(&self, name: &str) -> Result<Value, ValueError> {
        match self.ty {
            ValueType::IpAddr | ValueType::IpPrefix => Value::parse(ValueType::IpPrefix, name),
            _ => self.attrs[0].parse_value(name),
        }
    }

    /// Lookup key for a request: the first candidate attribute present in
    /// the request list, coerced to the key type. `None` when no candidate is
    /// present or the value cannot be coerced.
    pub fn extract(&self, request: &Request) -> Option<LookupKey> {
        let attr = self
            .attrs
            .iter()
            .find_map(|def| request.request.first(def))?;

        let value = self.coerce(attr)?;
        self.to_key(value)
    }

    fn coerce(&self, attr: &Attr) -> Option<Value> {
        if attr.value.value_type() == self.ty {
            return Some(attr.value.clone());
        }

        let text = attr.def.format_value(&attr.value);
        match self.parse_name(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(attr = %attr.def.name, value = %text, error = %e, "Key value not usable");
                None
            }
        }
    }

    fn to_key(&self, value: Value) -> Option<LookupKey> {
        match self.kind {
            IndexKind::Hash => Some(LookupKey::Hash(value)),
            IndexKind::Trie => value
                .as_network()
                .map(|net| LookupKey::Trie(TrieKey::from_network(&net))),
        }
    }
}
