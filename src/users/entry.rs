//! Policy entry types.

use std::fmt;
use std::sync::Arc;

use crate::dictionary::AttrDef;
use crate::request::ListRef;

/// Name of the entries that are merged into every lookup.
pub const DEFAULT_NAME: &str = "DEFAULT";

/// Item operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=` add if absent
    Eq,
    /// `:=` replace
    Set,
    /// `+=` append
    AddEq,
    /// `-=` remove
    SubEq,
    /// `==`
    CmpEq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=~`
    RegEq,
    /// `!~`
    RegNe,
    /// `=*` attribute present
    CmpTrue,
    /// `!*` attribute absent
    CmpFalse,
}

impl Operator {
    /// Tokens ordered so that two-character operators are tried first.
    pub const TOKENS: [(&'static str, Operator); 14] = [
        (":=", Operator::Set),
        ("+=", Operator::AddEq),
        ("-=", Operator::SubEq),
        ("==", Operator::CmpEq),
        ("!=", Operator::Ne),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("=~", Operator::RegEq),
        ("!~", Operator::RegNe),
        ("=*", Operator::CmpTrue),
        ("!*", Operator::CmpFalse),
        ("=", Operator::Eq),
        ("<", Operator::Lt),
        (">", Operator::Gt),
    ];

    pub fn token(self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(tok, _)| *tok)
            .unwrap_or("?")
    }

    /// `=`, `:=` and `+=`.
    pub fn is_assignment(self) -> bool {
        matches!(self, Operator::Eq | Operator::Set | Operator::AddEq)
    }

    /// Operators that test rather than modify.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::CmpEq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::RegEq
                | Operator::RegNe
                | Operator::CmpTrue
                | Operator::CmpFalse
        )
    }

    pub fn is_regex(self) -> bool {
        matches!(self, Operator::RegEq | Operator::RegNe)
    }

    /// `=*` and `!*` take no right-hand side.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::CmpTrue | Operator::CmpFalse)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Reference to an attribute in one of the request lists.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrRef {
    pub list: ListRef,
    pub def: Arc<AttrDef>,
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.list, self.def.name)
    }
}

/// Compiled regular expression operand.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: regex::Regex,
    case_insensitive: bool,
}

impl Pattern {
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = regex::RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            regex,
            case_insensitive,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.case_insensitive == other.case_insensitive
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.as_str())?;
        if self.case_insensitive {
            f.write_str("i")?;
        }
        Ok(())
    }
}

/// One side of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(String),
    Attr(AttrRef),
    Regex(Pattern),
    /// External command; never evaluated by this crate.
    Exec(String),
}

impl Operand {
    pub fn as_attr(&self) -> Option<&AttrRef> {
        match self {
            Operand::Attr(attr) => Some(attr),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(text) => write!(f, "\"{}\"", text),
            Operand::Attr(attr) => write!(f, "&{}", attr),
            Operand::Regex(pattern) => write!(f, "{}", pattern),
            Operand::Exec(cmd) => write!(f, "`{}`", cmd),
        }
    }
}

/// A check condition or a reply action: `lhs op rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub lhs: Operand,
    pub op: Operator,
    /// Absent only for unary operators.
    pub rhs: Option<Operand>,
}

impl Item {
    /// Left-hand attribute, if the left side is one.
    pub fn attr(&self) -> Option<&AttrRef> {
        self.lhs.as_attr()
    }

    /// Display name of the left side.
    pub fn lhs_name(&self) -> String {
        match &self.lhs {
            Operand::Attr(attr) => attr.def.name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lhs, self.op)?;
        if let Some(rhs) = &self.rhs {
            write!(f, " {}", rhs)?;
        }
        Ok(())
    }
}

/// Where an entry was defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub filename: Arc<str>,
    pub line: usize,
}

impl Source {
    pub fn new(filename: Arc<str>, line: usize) -> Self {
        Self { filename, line }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.filename, self.line)
    }
}

/// Entry as produced by the parser, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub name: String,
    /// Global parse sequence number.
    pub order: u64,
    pub check: Vec<Item>,
    pub reply: Vec<Item>,
    pub source: Source,
}

impl RawEntry {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_NAME
    }
}

/// Classified, immutable policy entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    /// Global parse sequence number, the only merge tie-break.
    pub order: u64,
    pub check: Vec<Item>,
    pub reply: Vec<Item>,
    pub fall_through: bool,
    pub next_shortest_prefix: bool,
    pub source: Source,
}

impl Entry {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_NAME
    }
}
