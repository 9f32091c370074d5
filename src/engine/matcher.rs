//! Merge-walk matcher.
//!
//! # Responsibilities
//! - Walk the keyed bucket and the `DEFAULT` bucket as one sequence ordered by `order`
//! - Evaluate check items, apply reply items of every matching entry
//! - Stop, fall through, or widen to a shorter prefix after a match
//! - Commit the request edits on a match, roll them back otherwise

use crate::engine::evaluator::ConditionEvaluator;
use crate::error::LookupError;
use crate::index::{Bucket, IndexKind, LookupKey, TrieKey, UsersTable};
use crate::request::{EditList, Request};
use crate::users::Entry;

/// Result of a lookup that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one entry matched; its reply edits are committed.
    Matched,
    /// Nothing matched; the request is untouched.
    NoMatch,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Matched => "matched",
            Outcome::NoMatch => "nomatch",
        }
    }
}

/// Which chain an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Keyed,
    Default,
}

/// Two cursors over chains already sorted by `order`, yielding the lower one first.
struct MergeWalk<'t> {
    keyed: &'t [Entry],
    defaults: &'t [Entry],
}

impl<'t> MergeWalk<'t> {
    fn new(keyed: &'t [Entry], defaults: &'t [Entry]) -> Self {
        Self { keyed, defaults }
    }

    /// Drop what is left of the keyed chain.
    fn clear_keyed(&mut self) {
        self.keyed = &[];
    }

    fn keyed_exhausted(&self) -> bool {
        self.keyed.is_empty()
    }
}

impl<'t> Iterator for MergeWalk<'t> {
    type Item = (Chain, &'t Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let take_keyed = match (self.keyed.first(), self.defaults.first()) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(k), Some(d)) => k.order < d.order,
        };

        if take_keyed {
            let (entry, rest) = self.keyed.split_first()?;
            self.keyed = rest;
            Some((Chain::Keyed, entry))
        } else {
            let (entry, rest) = self.defaults.split_first()?;
            self.defaults = rest;
            Some((Chain::Default, entry))
        }
    }
}

/// Walk-back state for trie lookups.
struct Widening<'t> {
    key: &'t TrieKey,
    /// Upper bound on the next prefix length to try.
    keylen: u8,
}

impl<'t> Widening<'t> {
    /// Next bucket at a strictly shorter prefix than both `keylen` and
    /// `current`'s own prefix.
    fn next<'a>(&mut self, table: &'a UsersTable, current: &Bucket) -> Option<&'a Bucket> {
        if let Some(prefix) = current.prefix_len() {
            self.keylen = self.keylen.min(prefix);
        }
        while self.keylen > 0 {
            self.keylen -= 1;
            if let Some(bucket) = table.index().find_prefix(self.key, self.keylen) {
                return Some(bucket);
            }
        }
        None
    }
}

/// Runs one lookup against one table.
pub struct Matcher<'e, E: ?Sized> {
    evaluator: &'e E,
}

impl<'e, E: ConditionEvaluator + ?Sized> Matcher<'e, E> {
    pub fn new(evaluator: &'e E) -> Self {
        Self { evaluator }
    }

    /// Match `request` against `table`.
    ///
    /// `key` is the value produced by the key extractor; `None` walks only the
    /// `DEFAULT` entries. On `Ok(Matched)` the reply edits of every matching
    /// entry are visible in `request`; on `Ok(NoMatch)` and on error the
    /// request is left as it was.
    pub fn run(
        &self,
        table: &UsersTable,
        key: Option<&LookupKey>,
        request: &mut Request,
    ) -> Result<Outcome, LookupError> {
        let mut edits = EditList::new();
        match self.walk(table, key, request, &mut edits) {
            Ok(true) => {
                let applied = edits.commit();
                tracing::trace!(file = table.filename(), applied, "Committed reply edits");
                Ok(Outcome::Matched)
            }
            Ok(false) => {
                edits.abort(request);
                Ok(Outcome::NoMatch)
            }
            Err(e) => {
                edits.abort(request);
                Err(e)
            }
        }
    }

    fn walk(
        &self,
        table: &UsersTable,
        key: Option<&LookupKey>,
        request: &mut Request,
        edits: &mut EditList,
    ) -> Result<bool, LookupError> {
        let defaults = table.defaults().map(Bucket::entries).unwrap_or(&[]);
        let trie = table.index().kind() == IndexKind::Trie;

        let mut bucket = key.and_then(|k| table.index().find(k));
        let mut widening = match (bucket, key.and_then(LookupKey::as_trie)) {
            (Some(_), Some(bits)) => Some(Widening {
                key: bits,
                keylen: bits.len(),
            }),
            _ => None,
        };

        let mut found = false;

        'redo: loop {
            let mut walk = MergeWalk::new(bucket.map(Bucket::entries).unwrap_or(&[]), defaults);
            // Set by a keyed entry that asked for a shorter prefix but did not
            // match; acted on once the keyed chain runs out.
            let mut widen_pending = false;

            loop {
                if widen_pending && walk.keyed_exhausted() {
                    widen_pending = false;
                    if let Some(next) = Self::widen(table, &mut widening, bucket) {
                        bucket = Some(next);
                        continue 'redo;
                    }
                }

                let Some((chain, entry)) = walk.next() else {
                    break;
                };

                tracing::trace!(
                    file = table.filename(),
                    line = entry.source.line,
                    name = %entry.name,
                    chain = ?chain,
                    "Evaluating entry"
                );

                if !self.matches(entry, request)? {
                    if trie && chain == Chain::Keyed && entry.next_shortest_prefix {
                        widen_pending = true;
                    }
                    continue;
                }

                tracing::debug!(
                    file = table.filename(),
                    line = entry.source.line,
                    name = %entry.name,
                    "Found match"
                );
                found = true;

                edits
                    .apply(request, &entry.reply)
                    .map_err(|reason| LookupError::Apply {
                        at: entry.source.clone(),
                        reason,
                    })?;

                if entry.fall_through {
                    continue;
                }
                if !trie || !entry.next_shortest_prefix {
                    break 'redo;
                }
                if widening.as_ref().map_or(true, |w| w.keylen == 0) {
                    break 'redo;
                }

                match Self::widen(table, &mut widening, bucket) {
                    Some(next) => {
                        bucket = Some(next);
                        continue 'redo;
                    }
                    None => walk.clear_keyed(),
                }
            }

            break;
        }

        Ok(found)
    }

    fn widen<'t>(
        table: &'t UsersTable,
        widening: &mut Option<Widening<'_>>,
        current: Option<&Bucket>,
    ) -> Option<&'t Bucket> {
        let (state, current) = (widening.as_mut()?, current?);
        let next = state.next(table, current)?;
        tracing::debug!(
            file = table.filename(),
            name = next.name(),
            keylen = state.keylen,
            "Found matching shorter prefix"
        );
        Some(next)
    }

    /// Conjunction of all check items.
    fn matches(&self, entry: &Entry, request: &Request) -> Result<bool, LookupError> {
        for item in &entry.check {
            if item.op.is_assignment() {
                return Err(LookupError::AssignmentInCheck {
                    at: entry.source.clone(),
                    item: item.to_string(),
                });
            }

            let passed = self
                .evaluator
                .evaluate(item, request)
                .map_err(|reason| LookupError::Condition {
                    at: entry.source.clone(),
                    item: item.to_string(),
                    reason,
                })?;

            if !passed {
                tracing::trace!(item = %item, "Check item failed");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
