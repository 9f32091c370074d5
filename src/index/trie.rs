//! Binary prefix trie over IP network bits.
//!
//! # Responsibilities
//! - Store one value per (family, prefix bits, prefix length)
//! - Exact lookup at a given length (used for shorter-prefix retries)
//! - Longest-prefix lookup (used to find the initial bucket)
//!
//! IPv4 and IPv6 keys live under separate roots so their bit strings never mix.

use ipnet::IpNet;

/// Address family of a trie key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

/// Network-order bit string with `len` significant bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrieKey {
    family: Family,
    bytes: [u8; 16],
    len: u8,
}

impl TrieKey {
    /// Key for a network; `octets()` is already network byte order.
    pub fn from_network(net: &IpNet) -> Self {
        let mut bytes = [0u8; 16];
        match net {
            IpNet::V4(n) => {
                bytes[..4].copy_from_slice(&n.network().octets());
                Self {
                    family: Family::V4,
                    bytes,
                    len: n.prefix_len(),
                }
            }
            IpNet::V6(n) => {
                bytes.copy_from_slice(&n.network().octets());
                Self {
                    family: Family::V6,
                    bytes,
                    len: n.prefix_len(),
                }
            }
        }
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bit(&self, index: u8) -> usize {
        let byte = self.bytes[usize::from(index / 8)];
        usize::from((byte >> (7 - index % 8)) & 1)
    }
}

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    children: [Option<Box<Node<T>>>; 2],
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            value: None,
            children: [None, None],
        }
    }
}

/// Prefix trie mapping network prefixes to values.
#[derive(Debug)]
pub struct PrefixTrie<T> {
    v4: Node<T>,
    v6: Node<T>,
    len: usize,
}

impl<T> Default for PrefixTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrefixTrie<T> {
    pub fn new() -> Self {
        Self {
            v4: Node::empty(),
            v6: Node::empty(),
            len: 0,
        }
    }

    fn root(&self, family: Family) -> &Node<T> {
        match family {
            Family::V4 => &self.v4,
            Family::V6 => &self.v6,
        }
    }

    /// Value stored at exactly `key`, inserting one from `make` if absent.
    pub fn get_or_insert_with(&mut self, key: &TrieKey, make: impl FnOnce() -> T) -> &mut T {
        let mut node = match key.family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        };
        for i in 0..key.len {
            node = node.children[key.bit(i)].get_or_insert_with(|| Box::new(Node::empty()));
        }
        if node.value.is_none() {
            self.len += 1;
        }
        node.value.get_or_insert_with(make)
    }

    /// Value stored at the first `len` bits of `key`, and nowhere else.
    pub fn get_exact(&self, key: &TrieKey, len: u8) -> Option<&T> {
        let len = len.min(key.len);
        let mut node = self.root(key.family);
        for i in 0..len {
            node = node.children[key.bit(i)].as_deref()?;
        }
        node.value.as_ref()
    }

    /// Value with the longest stored prefix covering `key`.
    pub fn longest_match(&self, key: &TrieKey) -> Option<&T> {
        let mut node = self.root(key.family);
        let mut best = node.value.as_ref();
        for i in 0..key.len {
            match node.children[key.bit(i)].as_deref() {
                Some(child) => node = child,
                None => break,
            }
            if node.value.is_some() {
                best = node.value.as_ref();
            }
        }
        best
    }

    /// Number of stored prefixes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
