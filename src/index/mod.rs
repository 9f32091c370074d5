//! Policy index subsystem.
//!
//! # Data Flow
//! ```text
//! RawEntry stream (ascending order)
//!     → Classifier (per entry)
//!     → DEFAULT?  yes → default bucket
//!                 no  → KeyExtractor::parse_name
//!                       → Hash: HashMap<Value, Bucket>
//!                       → Trie: PrefixTrie<Bucket> (exact prefix insert)
//!     → UsersTable (immutable, shared behind Arc)
//! ```
//!
//! # Design Decisions
//! - The index kind is fixed by the key type before any file is read
//! - Buckets hold entries in ascending `order`; lookups never re-sort
//! - The first build error aborts the whole table

pub mod key;
pub mod trie;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::dictionary::{ControlAttrs, Value, ValueType};
use crate::error::PolicyError;
use crate::users::{Classifier, Entry, RawEntry, DEFAULT_NAME};

pub use key::{KeyExtractor, LookupKey};
pub use trie::{PrefixTrie, TrieKey};

/// How a table is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Exact match on the key value.
    Hash,
    /// Longest-prefix match on an IP address or prefix.
    Trie,
}

impl IndexKind {
    /// `None` for types that cannot be used as a key.
    pub fn for_type(ty: ValueType) -> Option<Self> {
        match ty {
            ValueType::IpAddr | ValueType::IpPrefix => Some(IndexKind::Trie),
            ValueType::String
            | ValueType::Integer
            | ValueType::Bool
            | ValueType::Enum
            | ValueType::Octets => Some(IndexKind::Hash),
            ValueType::Group => None,
        }
    }
}

/// Entries sharing one key, in ascending `order`.
#[derive(Debug)]
pub struct Bucket {
    name: String,
    key: Option<Value>,
    entries: Vec<Entry>,
}

impl Bucket {
    fn new(name: &str, key: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            key,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Prefix length of a trie bucket.
    pub fn prefix_len(&self) -> Option<u8> {
        self.key
            .as_ref()
            .and_then(Value::as_network)
            .map(|net| net.prefix_len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keyed buckets.
#[derive(Debug)]
pub enum Index {
    Hash(HashMap<Value, Bucket>),
    Trie(PrefixTrie<Bucket>),
}

impl Index {
    fn empty(kind: IndexKind) -> Self {
        match kind {
            IndexKind::Hash => Index::Hash(HashMap::new()),
            IndexKind::Trie => Index::Trie(PrefixTrie::new()),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            Index::Hash(_) => IndexKind::Hash,
            Index::Trie(_) => IndexKind::Trie,
        }
    }

    /// Exact match for hash keys, longest-prefix match for trie keys.
    pub fn find(&self, key: &LookupKey) -> Option<&Bucket> {
        match (self, key) {
            (Index::Hash(map), LookupKey::Hash(value)) => map.get(value),
            (Index::Trie(trie), LookupKey::Trie(bits)) => trie.longest_match(bits),
            _ => None,
        }
    }

    /// Trie bucket stored at exactly the first `len` bits of `key`.
    pub fn find_prefix(&self, key: &TrieKey, len: u8) -> Option<&Bucket> {
        match self {
            Index::Trie(trie) => trie.get_exact(key, len),
            Index::Hash(_) => None,
        }
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        match self {
            Index::Hash(map) => map.len(),
            Index::Trie(trie) => trie.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One parsed and indexed policy file.
#[derive(Debug)]
pub struct UsersTable {
    filename: String,
    sources: Vec<PathBuf>,
    index: Index,
    defaults: Option<Bucket>,
    entries: usize,
}

impl UsersTable {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// `DEFAULT` entries, if the file has any.
    pub fn defaults(&self) -> Option<&Bucket> {
        self.defaults.as_ref()
    }

    /// Total entries, defaults included.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// The file itself plus every `$INCLUDE`d file that contributed entries.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

#[cfg(test)]
impl UsersTable {
    /// Entries of one hash bucket, for hand-built fixtures.
    pub(crate) fn bucket_entries_mut(&mut self, key: &Value) -> Option<&mut Vec<Entry>> {
        match &mut self.index {
            Index::Hash(map) => map.get_mut(key).map(|bucket| &mut bucket.entries),
            Index::Trie(_) => None,
        }
    }
}

/// Builds a [`UsersTable`] from parsed entries.
pub struct IndexBuilder<'a> {
    extractor: &'a KeyExtractor,
    controls: &'a ControlAttrs,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(extractor: &'a KeyExtractor, controls: &'a ControlAttrs) -> Self {
        Self {
            extractor,
            controls,
        }
    }

    pub fn build(&self, filename: &str, mut raw: Vec<RawEntry>) -> Result<UsersTable, PolicyError> {
        // Stable, so equal orders (never produced by the parser) keep input order.
        raw.sort_by_key(|entry| entry.order);

        let mut sources = BTreeSet::from([PathBuf::from(filename)]);
        sources.extend(raw.iter().map(|entry| PathBuf::from(&*entry.source.filename)));

        let classifier = Classifier::new(self.controls, self.extractor.kind());
        let mut index = Index::empty(self.extractor.kind());
        let mut defaults: Option<Bucket> = None;
        let mut entries = 0usize;

        for raw in raw {
            let entry = classifier.classify(raw)?;
            entries += 1;

            if entry.is_default() {
                defaults
                    .get_or_insert_with(|| Bucket::new(DEFAULT_NAME, None))
                    .entries
                    .push(entry);
                continue;
            }

            let key = self
                .extractor
                .parse_name(&entry.name)
                .map_err(|reason| PolicyError::KeyParse {
                    at: entry.source.clone(),
                    key: entry.name.clone(),
                    reason,
                })?;

            let bucket = match &mut index {
                Index::Hash(map) => {
                    let name = entry.name.as_str();
                    map.entry(key.clone())
                        .or_insert_with(|| Bucket::new(name, Some(key)))
                }
                Index::Trie(trie) => {
                    let Some(net) = key.as_network() else {
                        return Err(PolicyError::KeyType {
                            attr: entry.name.clone(),
                            ty: key.value_type(),
                        });
                    };
                    let name = entry.name.as_str();
                    trie.get_or_insert_with(&TrieKey::from_network(&net), || {
                        Bucket::new(name, Some(key))
                    })
                }
            };
            bucket.entries.push(entry);
        }

        tracing::info!(
            file = %filename,
            kind = ?index.kind(),
            buckets = index.len(),
            defaults = defaults.as_ref().map_or(0, Bucket::len),
            entries,
            "Policy file indexed"
        );

        Ok(UsersTable {
            filename: filename.to_string(),
            sources: sources.into_iter().collect(),
            index,
            defaults,
            entries,
        })
    }
}
