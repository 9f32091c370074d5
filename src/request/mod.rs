//! Request attribute lists.
//!
//! # Data Flow
//! ```text
//! Incoming packet attributes → Request.request
//!     → check items read request / control
//!     → edit.rs (EditList) stages reply items into reply / control
//!     → commit keeps them, abort restores the touched lists
//! ```
//!
//! # Design Decisions
//! - Lists keep insertion order; multiple instances of one attribute are allowed
//! - Edits are applied in place so later entries observe earlier ones
//! - The undo snapshot is per list, taken on first touch

pub mod edit;

use std::fmt;
use std::sync::Arc;

use crate::dictionary::{AttrDef, Value};

pub use edit::{ApplyError, EditList};

/// Which attribute list of a request an item addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListRef {
    Request,
    Reply,
    Control,
}

impl ListRef {
    /// Parse a list qualifier such as `reply` in `reply.Reply-Message`.
    pub fn from_qualifier(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "request" => Some(ListRef::Request),
            "reply" => Some(ListRef::Reply),
            "control" | "config" => Some(ListRef::Control),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListRef::Request => "request",
            ListRef::Reply => "reply",
            ListRef::Control => "control",
        }
    }
}

impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub def: Arc<AttrDef>,
    pub value: Value,
}

impl Attr {
    pub fn new(def: Arc<AttrDef>, value: Value) -> Self {
        Self { def, value }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.def.name, self.def.format_value(&self.value))
    }
}

/// Ordered list of attribute instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrList {
    attrs: Vec<Attr>,
}

impl AttrList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attr: Attr) {
        self.attrs.push(attr);
    }

    /// First instance of an attribute.
    pub fn first(&self, def: &AttrDef) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.def.same_attr(def))
    }

    /// All instances of an attribute, in list order.
    pub fn all<'a>(&'a self, def: &'a AttrDef) -> impl Iterator<Item = &'a Attr> + 'a {
        self.attrs.iter().filter(move |a| a.def.same_attr(def))
    }

    pub fn all_mut<'a>(&'a mut self, def: &'a AttrDef) -> impl Iterator<Item = &'a mut Attr> + 'a {
        self.attrs.iter_mut().filter(move |a| a.def.same_attr(def))
    }

    pub fn contains(&self, def: &AttrDef) -> bool {
        self.first(def).is_some()
    }

    /// Remove every instance of an attribute. Returns how many were removed.
    pub fn remove_all(&mut self, def: &AttrDef) -> usize {
        let before = self.attrs.len();
        self.attrs.retain(|a| !a.def.same_attr(def));
        before - self.attrs.len()
    }

    /// Remove instances of an attribute carrying exactly `value`.
    pub fn remove_value(&mut self, def: &AttrDef, value: &Value) -> usize {
        let before = self.attrs.len();
        self.attrs
            .retain(|a| !(a.def.same_attr(def) && a.value == *value));
        before - self.attrs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// The request being processed, with its three attribute lists.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub request: AttrList,
    pub reply: AttrList,
    pub control: AttrList,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder helper: add an attribute to the request list.
    pub fn with_attr(mut self, def: Arc<AttrDef>, value: Value) -> Self {
        self.request.push(Attr::new(def, value));
        self
    }

    pub fn list(&self, list: ListRef) -> &AttrList {
        match list {
            ListRef::Request => &self.request,
            ListRef::Reply => &self.reply,
            ListRef::Control => &self.control,
        }
    }

    pub fn list_mut(&mut self, list: ListRef) -> &mut AttrList {
        match list {
            ListRef::Request => &mut self.request,
            ListRef::Reply => &mut self.reply,
            ListRef::Control => &mut self.control,
        }
    }
}
