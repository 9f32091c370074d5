//! Transactional edit list.
//!
//! # Responsibilities
//! - Apply reply items to a request in place
//! - Remember the original contents of every list it touches
//! - Commit (keep everything) or abort (restore every touched list)
//!
//! One `EditList` belongs to one lookup call; it is never shared.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::dictionary::{AttrDef, Value, ValueError};
use crate::request::{Attr, AttrList, ListRef, Request};
use crate::users::{Item, Operand, Operator};

/// Error raised while staging a reply item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("invalid value for {attr}: {source}")]
    Value {
        attr: String,
        #[source]
        source: ValueError,
    },

    #[error("operator {op} cannot be applied to {attr}")]
    Operator { attr: String, op: Operator },

    #[error("right-hand side of {attr} cannot be evaluated here")]
    Operand { attr: String },

    #[error("left side {0} is not an attribute")]
    Target(String),
}

/// Scoped batch of attribute edits for one request.
#[derive(Debug, Default)]
pub struct EditList {
    saved: Vec<(ListRef, AttrList)>,
    edits: usize,
}

impl EditList {
    /// Open an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a list of reply items in order.
    pub fn apply(&mut self, request: &mut Request, items: &[Item]) -> Result<(), ApplyError> {
        for item in items {
            self.apply_item(request, item)?;
        }
        Ok(())
    }

    /// Apply one reply item.
    pub fn apply_item(&mut self, request: &mut Request, item: &Item) -> Result<(), ApplyError> {
        let Operand::Attr(target) = &item.lhs else {
            return Err(ApplyError::Target(item.lhs.to_string()));
        };
        let def = &target.def;

        let value = match &item.rhs {
            Some(Operand::Literal(text)) => def.parse_value(text).map_err(|source| ApplyError::Value {
                attr: def.name.clone(),
                source,
            })?,
            Some(Operand::Attr(src)) => match request.list(src.list).first(&src.def) {
                Some(found) => coerce(&found.value, &src.def, def)?,
                None => {
                    tracing::trace!(attr = %def.name, from = %src, "Source attribute absent, skipping edit");
                    return Ok(());
                }
            },
            _ => {
                return Err(ApplyError::Operand {
                    attr: def.name.clone(),
                })
            }
        };

        self.save(request, target.list);
        let list = request.list_mut(target.list);

        match item.op {
            Operator::Eq => {
                if list.contains(def) {
                    return Ok(());
                }
                list.push(Attr::new(def.clone(), value));
            }
            Operator::Set => {
                list.remove_all(def);
                list.push(Attr::new(def.clone(), value));
            }
            Operator::AddEq => list.push(Attr::new(def.clone(), value)),
            Operator::SubEq => {
                list.remove_value(def, &value);
            }
            // Clamp existing instances; add when there are none.
            Operator::Le => clamp(list, def, value, Ordering::Greater),
            Operator::Ge => clamp(list, def, value, Ordering::Less),
            op => {
                return Err(ApplyError::Operator {
                    attr: def.name.clone(),
                    op,
                })
            }
        }

        self.edits += 1;
        Ok(())
    }

    /// Number of edits staged so far.
    pub fn len(&self) -> usize {
        self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits == 0
    }

    /// Keep every staged edit. Returns the number of edits.
    pub fn commit(self) -> usize {
        self.edits
    }

    /// Discard every staged edit, restoring the touched lists.
    pub fn abort(self, request: &mut Request) {
        for (list, original) in self.saved {
            *request.list_mut(list) = original;
        }
    }

    fn save(&mut self, request: &Request, list: ListRef) {
        if self.saved.iter().any(|(l, _)| *l == list) {
            return;
        }
        self.saved.push((list, request.list(list).clone()));
    }
}

fn coerce(value: &Value, from: &AttrDef, to: &AttrDef) -> Result<Value, ApplyError> {
    if from.ty == to.ty {
        return Ok(value.clone());
    }
    to.parse_value(&from.format_value(value))
        .map_err(|source| ApplyError::Value {
            attr: to.name.clone(),
            source,
        })
}

fn clamp(list: &mut AttrList, def: &Arc<AttrDef>, value: Value, replace_when: Ordering) {
    let mut seen = false;
    for attr in list.all_mut(def) {
        seen = true;
        if attr.value.compare(&value) == Some(replace_when) {
            attr.value = value.clone();
        }
    }
    if !seen {
        list.push(Attr::new(def.clone(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::users::AttrRef;

    fn item(dict: &Dictionary, list: ListRef, name: &str, op: Operator, rhs: &str) -> Item {
        Item {
            lhs: Operand::Attr(AttrRef {
                list,
                def: dict.lookup(name).unwrap(),
            }),
            op,
            rhs: Some(Operand::Literal(rhs.to_string())),
        }
    }

    fn reply_values(request: &Request, dict: &Dictionary, name: &str) -> Vec<String> {
        let def = dict.lookup(name).unwrap();
        request.reply.all(&def).map(|a| a.value.to_string()).collect()
    }

    #[test]
    fn test_operators() {
        let dict = Dictionary::builtin();
        let mut request = Request::new();
        let mut edits = EditList::new();

        let items = vec![
            item(&dict, ListRef::Reply, "Reply-Message", Operator::AddEq, "one"),
            item(&dict, ListRef::Reply, "Reply-Message", Operator::AddEq, "two"),
            item(&dict, ListRef::Reply, "Reply-Message", Operator::Eq, "ignored"),
            item(&dict, ListRef::Reply, "Reply-Message", Operator::SubEq, "one"),
            item(&dict, ListRef::Reply, "Filter-Id", Operator::Set, "a"),
            item(&dict, ListRef::Reply, "Filter-Id", Operator::Set, "b"),
        ];
        edits.apply(&mut request, &items).unwrap();

        assert_eq!(reply_values(&request, &dict, "Reply-Message"), vec!["two"]);
        assert_eq!(reply_values(&request, &dict, "Filter-Id"), vec!["b"]);
        assert_eq!(edits.commit(), 5);
    }

    #[test]
    fn test_clamp_operators() {
        let dict = Dictionary::builtin();
        let mut request = Request::new();
        let mut edits = EditList::new();

        edits
            .apply(
                &mut request,
                &[
                    item(&dict, ListRef::Reply, "Session-Timeout", Operator::Le, "3600"),
                    item(&dict, ListRef::Reply, "Session-Timeout", Operator::Le, "600"),
                    item(&dict, ListRef::Reply, "Session-Timeout", Operator::Le, "900"),
                    item(&dict, ListRef::Reply, "Idle-Timeout", Operator::Ge, "60"),
                    item(&dict, ListRef::Reply, "Idle-Timeout", Operator::Ge, "30"),
                ],
            )
            .unwrap();

        assert_eq!(reply_values(&request, &dict, "Session-Timeout"), vec!["600"]);
        assert_eq!(reply_values(&request, &dict, "Idle-Timeout"), vec!["60"]);
    }

    #[test]
    fn test_abort_restores_touched_lists() {
        let dict = Dictionary::builtin();
        let msg = dict.lookup("Reply-Message").unwrap();
        let mut request = Request::new();
        request.reply.push(Attr::new(msg.clone(), Value::String("kept".into())));

        let mut edits = EditList::new();
        edits
            .apply(
                &mut request,
                &[
                    item(&dict, ListRef::Reply, "Reply-Message", Operator::Set, "gone"),
                    item(&dict, ListRef::Control, "Auth-Type", Operator::Set, "Accept"),
                ],
            )
            .unwrap();
        assert_eq!(reply_values(&request, &dict, "Reply-Message"), vec!["gone"]);
        assert_eq!(request.control.len(), 1);

        edits.abort(&mut request);
        assert_eq!(reply_values(&request, &dict, "Reply-Message"), vec!["kept"]);
        assert!(request.control.is_empty());
    }

    #[test]
    fn test_attribute_reference_copies_value() {
        let dict = Dictionary::builtin();
        let user = dict.lookup("User-Name").unwrap();
        let mut request = Request::new().with_attr(user.clone(), Value::String("bob".into()));

        let copy = Item {
            lhs: Operand::Attr(AttrRef {
                list: ListRef::Reply,
                def: dict.lookup("Filter-Id").unwrap(),
            }),
            op: Operator::Set,
            rhs: Some(Operand::Attr(AttrRef {
                list: ListRef::Request,
                def: user,
            })),
        };
        let missing = Item {
            lhs: Operand::Attr(AttrRef {
                list: ListRef::Reply,
                def: dict.lookup("Reply-Message").unwrap(),
            }),
            op: Operator::Set,
            rhs: Some(Operand::Attr(AttrRef {
                list: ListRef::Request,
                def: dict.lookup("Calling-Station-Id").unwrap(),
            })),
        };

        let mut edits = EditList::new();
        edits.apply(&mut request, &[copy, missing]).unwrap();
        assert_eq!(reply_values(&request, &dict, "Filter-Id"), vec!["bob"]);
        assert!(reply_values(&request, &dict, "Reply-Message").is_empty());
        assert_eq!(edits.len(), 1);
    }

    #[test]
    fn test_bad_value_is_an_error() {
        let dict = Dictionary::builtin();
        let mut request = Request::new();
        let mut edits = EditList::new();
        let err = edits
            .apply_item(
                &mut request,
                &item(&dict, ListRef::Reply, "Session-Timeout", Operator::Set, "forever"),
            )
            .unwrap_err();
        assert!(matches!(err, ApplyError::Value { .. }));

        let err = edits
            .apply_item(
                &mut request,
                &item(&dict, ListRef::Reply, "Session-Timeout", Operator::CmpEq, "1"),
            )
            .unwrap_err();
        assert!(matches!(err, ApplyError::Operator { op: Operator::CmpEq, .. }));
    }
}
