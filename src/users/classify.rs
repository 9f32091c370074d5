//! Entry classifier.
//!
//! # Responsibilities
//! - Reject items whose left side is not an attribute
//! - Move assignment-looking check items to the end of the reply list
//! - Reject comparison operators (other than `<=` / `>=`) and regex / exec values in replies
//! - Turn `Fall-Through` / `Next-Shortest-Prefix` reply items into entry flags
//! - Order replies: removals, then overrides, then everything else

use crate::dictionary::{AttrDef, ControlAttrs, Value};
use crate::error::PolicyError;
use crate::index::IndexKind;
use crate::users::entry::{Entry, Item, Operand, Operator, RawEntry, Source};

/// Validates raw entries against one index kind.
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    controls: &'a ControlAttrs,
    kind: IndexKind,
}

impl<'a> Classifier<'a> {
    pub fn new(controls: &'a ControlAttrs, kind: IndexKind) -> Self {
        Self { controls, kind }
    }

    pub fn classify(&self, raw: RawEntry) -> Result<Entry, PolicyError> {
        let RawEntry {
            name,
            order,
            check,
            mut reply,
            source,
        } = raw;

        let mut conditions = Vec::with_capacity(check.len());
        for item in check {
            if item.attr().is_none() {
                return Err(PolicyError::InvalidCheckLhs {
                    at: source.clone(),
                    item: item.lhs.to_string(),
                });
            }
            if item.op.is_assignment() {
                reply.push(item);
            } else {
                conditions.push(item);
            }
        }

        let mut fall_through = false;
        let mut next_shortest_prefix = false;
        let mut removals = Vec::new();
        let mut overrides = Vec::new();
        let mut rest = Vec::new();

        for item in reply {
            let Some(attr) = item.attr() else {
                return Err(PolicyError::InvalidReplyLhs {
                    at: source.clone(),
                    item: item.lhs.to_string(),
                });
            };
            let def = attr.def.clone();

            if item.op.is_comparison() && !matches!(item.op, Operator::Le | Operator::Ge) {
                return Err(PolicyError::IllegalOperator {
                    at: source.clone(),
                    attr: def.name.clone(),
                    op: item.op,
                });
            }

            if matches!(item.rhs, Some(Operand::Regex(_) | Operand::Exec(_))) {
                return Err(PolicyError::RegexOrExecNotAllowed {
                    at: source.clone(),
                    attr: def.name.clone(),
                });
            }

            if def.same_attr(&self.controls.next_shortest_prefix) {
                if self.kind != IndexKind::Trie {
                    return Err(PolicyError::ShortestPrefixWithoutTrie {
                        at: source.clone(),
                        attr: def.name.clone(),
                    });
                }
                next_shortest_prefix = static_bool(&item, &def, &source)?;
                continue;
            }

            if def.same_attr(&self.controls.fall_through) {
                fall_through = static_bool(&item, &def, &source)?;
                continue;
            }

            match item.op {
                Operator::SubEq => removals.push(item),
                Operator::Set => overrides.push(item),
                _ => rest.push(item),
            }
        }

        removals.extend(overrides);
        removals.extend(rest);

        Ok(Entry {
            name,
            order,
            check: conditions,
            reply: removals,
            fall_through,
            next_shortest_prefix,
            source,
        })
    }
}

fn static_bool(item: &Item, def: &AttrDef, at: &Source) -> Result<bool, PolicyError> {
    let invalid = || PolicyError::InvalidControlValue {
        at: at.clone(),
        attr: def.name.clone(),
    };

    match &item.rhs {
        Some(Operand::Literal(text)) => match def.parse_value(text) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}
