//! Users file reader.
//!
//! # Format
//! ```text
//! # comment
//! alice   User-Password == "secret", NAS-Port < 10
//!         Reply-Message := "Hello",
//!         Fall-Through = yes
//!
//! DEFAULT Service-Type == Framed-User
//!         Framed-Protocol := PPP
//!
//! $INCLUDE users.d/extra
//! ```
//!
//! An entry header starts in column 0: the entry name followed by check items.
//! Indented lines hold reply items; a reply line ending in `,` continues on the
//! next line. The order counter runs across included files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dictionary::Dictionary;
use crate::error::PolicyError;
use crate::request::ListRef;
use crate::users::entry::{AttrRef, Item, Operand, Operator, Pattern, RawEntry, Source};

/// Nesting limit for `$INCLUDE`.
const MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Check,
    Reply,
}

/// Reads users files into raw entries.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    dict: &'a Dictionary,
}

impl<'a> Parser<'a> {
    pub fn new(dict: &'a Dictionary) -> Self {
        Self { dict }
    }

    /// Parse a file on disk, following `$INCLUDE` directives.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<RawEntry>, PolicyError> {
        let mut order = 0;
        let mut entries = Vec::new();
        self.read_file(path, 0, &mut order, &mut entries)?;
        Ok(entries)
    }

    /// Parse text already in memory. `$INCLUDE` paths resolve against the working directory.
    pub fn parse_str(&self, filename: &str, text: &str) -> Result<Vec<RawEntry>, PolicyError> {
        let mut order = 0;
        let mut entries = Vec::new();
        self.parse_text(filename, text, None, 0, &mut order, &mut entries)?;
        Ok(entries)
    }

    fn read_file(
        &self,
        path: &Path,
        depth: usize,
        order: &mut u64,
        out: &mut Vec<RawEntry>,
    ) -> Result<(), PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.display().to_string();
        self.parse_text(&name, &text, path.parent(), depth, order, out)
    }

    fn parse_text(
        &self,
        filename: &str,
        text: &str,
        base: Option<&Path>,
        depth: usize,
        order: &mut u64,
        out: &mut Vec<RawEntry>,
    ) -> Result<(), PolicyError> {
        let filename: Arc<str> = Arc::from(filename);
        let mut current: Option<RawEntry> = None;
        let mut expect_reply = false;

        for (idx, raw_line) in text.lines().enumerate() {
            let at = Source::new(filename.clone(), idx + 1);
            let line = strip_comment(raw_line);
            if line.trim().is_empty() {
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                if let Some(done) = current.take() {
                    out.push(done);
                }

                if let Some(target) = line.trim().strip_prefix("$INCLUDE") {
                    let target = target.trim();
                    if target.is_empty() {
                        return Err(parse_error(&at, "$INCLUDE requires a filename"));
                    }
                    if depth >= MAX_INCLUDE_DEPTH {
                        return Err(parse_error(&at, "$INCLUDE nested too deeply"));
                    }
                    let path = match base {
                        Some(dir) => dir.join(target),
                        None => PathBuf::from(target),
                    };
                    self.read_file(&path, depth + 1, order, out)?;
                    expect_reply = false;
                    continue;
                }

                let mut lexer = Lexer::new(line, &at);
                let name = lexer.entry_name()?;
                let (check, more) = self.items(&mut lexer, Section::Check)?;
                if more {
                    return Err(parse_error(&at, "check items cannot continue onto the next line"));
                }

                current = Some(RawEntry {
                    name,
                    order: *order,
                    check,
                    reply: Vec::new(),
                    source: at,
                });
                *order += 1;
                expect_reply = true;
                continue;
            }

            let Some(entry) = current.as_mut() else {
                return Err(parse_error(&at, "reply items without an entry"));
            };
            if !expect_reply {
                return Err(parse_error(
                    &at,
                    "unexpected reply line, the previous line did not end with ','",
                ));
            }

            let mut lexer = Lexer::new(line, &at);
            let (reply, more) = self.items(&mut lexer, Section::Reply)?;
            entry.reply.extend(reply);
            expect_reply = more;
        }

        if let Some(done) = current.take() {
            out.push(done);
        }
        Ok(())
    }

    /// Comma-separated items up to end of line. Also reports a trailing comma.
    fn items(&self, lexer: &mut Lexer<'_>, section: Section) -> Result<(Vec<Item>, bool), PolicyError> {
        let mut items = Vec::new();
        loop {
            lexer.skip_ws();
            if lexer.at_end() {
                return Ok((items, false));
            }

            items.push(self.item(lexer, section)?);

            lexer.skip_ws();
            if lexer.at_end() {
                return Ok((items, false));
            }
            if !lexer.eat(',') {
                return Err(lexer.error("expected ',' between items"));
            }
            lexer.skip_ws();
            if lexer.at_end() {
                return Ok((items, true));
            }
        }
    }

    fn item(&self, lexer: &mut Lexer<'_>, section: Section) -> Result<Item, PolicyError> {
        let lhs = match lexer.peek() {
            Some(q @ ('"' | '\'')) => LhsToken::Literal(lexer.quoted(q)?),
            Some('`') => LhsToken::Exec(lexer.quoted('`')?),
            _ => LhsToken::Name(lexer.bare()?),
        };

        lexer.skip_ws();
        let op = lexer.operator()?;
        lexer.skip_ws();

        let lhs = match lhs {
            LhsToken::Literal(text) => Operand::Literal(text),
            LhsToken::Exec(cmd) => Operand::Exec(cmd),
            LhsToken::Name(name) => {
                let default_list = match (section, op.is_assignment()) {
                    (Section::Reply, _) => ListRef::Reply,
                    (Section::Check, true) => ListRef::Control,
                    (Section::Check, false) => ListRef::Request,
                };
                Operand::Attr(self.attr_ref(lexer, &name, default_list)?)
            }
        };

        let rhs = if op.is_unary() {
            // `Attr =* ANY`: the operand, if any, is ignored.
            if !lexer.at_end() && lexer.peek() != Some(',') {
                lexer.operand_text()?;
            }
            None
        } else {
            Some(self.rhs(lexer, op)?)
        };

        Ok(Item { lhs, op, rhs })
    }

    fn rhs(&self, lexer: &mut Lexer<'_>, op: Operator) -> Result<Operand, PolicyError> {
        let operand = match lexer.peek() {
            None | Some(',') => return Err(lexer.error(&format!("missing value after '{}'", op))),
            Some(q @ ('"' | '\'')) => Operand::Literal(lexer.quoted(q)?),
            Some('`') => Operand::Exec(lexer.quoted('`')?),
            Some('/') => {
                let (source, insensitive) = lexer.regex()?;
                Operand::Regex(compile(lexer, &source, insensitive)?)
            }
            Some('&') => {
                let name = lexer.bare()?;
                Operand::Attr(self.attr_ref(lexer, &name, ListRef::Request)?)
            }
            Some(_) => Operand::Literal(lexer.operand_text()?),
        };

        if !op.is_regex() {
            return Ok(operand);
        }
        match operand {
            Operand::Literal(source) => Ok(Operand::Regex(compile(lexer, &source, false)?)),
            Operand::Regex(pattern) => Ok(Operand::Regex(pattern)),
            _ => Err(lexer.error(&format!("'{}' needs a regular expression", op))),
        }
    }

    fn attr_ref(&self, lexer: &Lexer<'_>, name: &str, default_list: ListRef) -> Result<AttrRef, PolicyError> {
        let name = name.strip_prefix('&').unwrap_or(name);
        let (list, attr) = match name.split_once('.') {
            Some((qualifier, rest)) => match ListRef::from_qualifier(qualifier) {
                Some(list) => (list, rest),
                None => (default_list, name),
            },
            None => (default_list, name),
        };

        let def = self
            .dict
            .lookup(attr)
            .ok_or_else(|| lexer.error(&format!("unknown attribute \"{}\"", attr)))?;
        Ok(AttrRef { list, def })
    }
}

enum LhsToken {
    Name(String),
    Literal(String),
    Exec(String),
}

fn compile(lexer: &Lexer<'_>, source: &str, insensitive: bool) -> Result<Pattern, PolicyError> {
    Pattern::new(source, insensitive)
        .map_err(|e| lexer.error(&format!("invalid regular expression /{}/: {}", source, e)))
}

fn parse_error(at: &Source, message: &str) -> PolicyError {
    PolicyError::Parse {
        at: at.clone(),
        message: message.to_string(),
    }
}

/// Drop a trailing `#` comment, ignoring `#` inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '#') => return &line[..idx],
            (None, _) => {}
        }
    }
    line
}

/// Character cursor over one line.
struct Lexer<'l> {
    chars: Vec<char>,
    pos: usize,
    at: &'l Source,
}

impl<'l> Lexer<'l> {
    fn new(line: &str, at: &'l Source) -> Self {
        Self {
            chars: line.chars().collect(),
            pos: 0,
            at,
        }
    }

    fn error(&self, message: &str) -> PolicyError {
        parse_error(self.at, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn entry_name(&mut self) -> Result<String, PolicyError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.quoted(q),
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !c.is_whitespace()) {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
        }
    }

    /// Attribute-name characters.
    fn bare(&mut self) -> Result<String, PolicyError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '&'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an attribute name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Unquoted value: everything up to whitespace or ','.
    fn operand_text(&mut self) -> Result<String, PolicyError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| !c.is_whitespace() && c != ',') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a value"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn operator(&mut self) -> Result<Operator, PolicyError> {
        for (token, op) in Operator::TOKENS {
            let len = token.chars().count();
            let matches = self
                .chars
                .get(self.pos..self.pos + len)
                .is_some_and(|s| s.iter().copied().eq(token.chars()));
            if matches {
                self.pos += len;
                return Ok(op);
            }
        }
        Err(self.error("expected an operator"))
    }

    fn quoted(&mut self, quote: char) -> Result<String, PolicyError> {
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(next) = self.peek() else { break };
            self.pos += 1;
            match (quote, next) {
                ('"', 'n') => out.push('\n'),
                ('"', 't') => out.push('\t'),
                ('"', 'r') => out.push('\r'),
                (_, c) if c == quote || c == '\\' => out.push(c),
                (_, c) => {
                    out.push('\\');
                    out.push(c);
                }
            }
        }
        Err(self.error(&format!("unterminated {} string", quote)))
    }

    fn regex(&mut self) -> Result<(String, bool), PolicyError> {
        self.pos += 1;
        let mut source = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '/' => {
                    let insensitive = self.eat('i');
                    return Ok((source, insensitive));
                }
                '\\' if self.peek() == Some('/') => {
                    self.pos += 1;
                    source.push('/');
                }
                c => source.push(c),
            }
        }
        Err(self.error("unterminated regular expression"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<RawEntry>, PolicyError> {
        let dict = Dictionary::builtin();
        Parser::new(&dict).parse_str("users", text)
    }

    #[test]
    fn test_entries_and_orders() {
        let entries = parse(
            "# leading comment\n\
             DEFAULT\n\
             \tFall-Through = yes\n\
             \n\
             alice User-Password == \"p1\", NAS-Port < 10 # trailing\n\
             \tReply-Message := \"Hello, #1\",\n\
             \tSession-Timeout = 3600\n\
             bob\n",
        )
        .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "DEFAULT");
        assert_eq!(entries[0].reply.len(), 1);

        let alice = &entries[1];
        assert_eq!(alice.order, 1);
        assert_eq!(alice.source.line, 5);
        assert_eq!(alice.check.len(), 2);
        assert_eq!(alice.check[0].op, Operator::CmpEq);
        assert_eq!(alice.check[0].attr().unwrap().list, ListRef::Request);
        assert_eq!(alice.reply.len(), 2);
        assert_eq!(
            alice.reply[0].rhs,
            Some(Operand::Literal("Hello, #1".into()))
        );
        assert_eq!(alice.reply[0].attr().unwrap().list, ListRef::Reply);

        assert_eq!(entries[2].name, "bob");
        assert_eq!(entries[2].order, 2);
        assert!(entries[2].check.is_empty());
    }

    #[test]
    fn test_operand_forms() {
        let entries = parse(
            "carol User-Name =~ /^car/i, Calling-Station-Id !* ANY, Auth-Type := Accept\n\
             \tFilter-Id = &User-Name,\n\
             \tcontrol.Reply-Message += `/bin/true`\n",
        )
        .unwrap();
        let carol = &entries[0];

        assert!(matches!(carol.check[0].rhs, Some(Operand::Regex(_))));
        assert_eq!(carol.check[1].op, Operator::CmpFalse);
        assert_eq!(carol.check[1].rhs, None);
        // Assignments on the check line default to the control list.
        assert_eq!(carol.check[2].attr().unwrap().list, ListRef::Control);

        assert!(matches!(carol.reply[0].rhs, Some(Operand::Attr(_))));
        assert_eq!(carol.reply[1].attr().unwrap().list, ListRef::Control);
        assert!(matches!(carol.reply[1].rhs, Some(Operand::Exec(_))));
    }

    #[test]
    fn test_quoted_regex_is_compiled() {
        let entries = parse("dave User-Name =~ \"^d.*\"\n").unwrap();
        match &entries[0].check[0].rhs {
            Some(Operand::Regex(p)) => assert!(p.is_match("dave")),
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn test_non_attribute_lhs_is_kept_for_the_classifier() {
        let entries = parse("erin \"literal\" == \"x\"\n").unwrap();
        assert_eq!(entries[0].check[0].lhs, Operand::Literal("literal".into()));
    }

    #[test]
    fn test_errors_carry_line() {
        let err = parse("frank\n\tNo-Such-Attr := 1\n").unwrap_err();
        match err {
            PolicyError::Parse { at, message } => {
                assert_eq!(at.line, 2);
                assert!(message.contains("No-Such-Attr"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(parse("\tReply-Message := \"x\"\n").is_err());
        assert!(parse("gina\n\tReply-Message := \"x\"\n\tFilter-Id := \"y\"\n").is_err());
        assert!(parse("hank User-Name == \"x\" Filter-Id == \"y\"\n").is_err());
        assert!(parse("ivan User-Name ==\n").is_err());
        assert!(parse("judy User-Name =~ /(/\n").is_err());
    }

    #[test]
    fn test_regex_operator_rejects_other_operands() {
        for text in [
            "alice User-Name =~ &Filter-Id\n",
            "alice User-Name !~ `/bin/echo x`\n",
        ] {
            match parse(text).unwrap_err() {
                PolicyError::Parse { at, message } => {
                    assert_eq!(at.line, 1);
                    assert!(message.contains("regular expression"), "{}", message);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra"), "bob\n\tReply-Message := \"b\"\n").unwrap();
        std::fs::write(
            dir.path().join("users"),
            "alice\n\tReply-Message := \"a\"\n$INCLUDE extra\ncarol\n",
        )
        .unwrap();

        let dict = Dictionary::builtin();
        let entries = Parser::new(&dict).parse_file(&dir.path().join("users")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.order)).collect();
        assert_eq!(names, vec![("alice", 0), ("bob", 1), ("carol", 2)]);
        assert!(entries[1].source.filename.ends_with("extra"));
    }

    #[test]
    fn test_missing_file() {
        let dict = Dictionary::builtin();
        let err = Parser::new(&dict)
            .parse_file(Path::new("/nonexistent/users"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::Io { .. }));
    }
}
