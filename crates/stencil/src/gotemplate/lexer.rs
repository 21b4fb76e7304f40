use std::{mem::replace, str::CharIndices};

use super::SYNTAX;
use crate::ParseError;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Kind {
    Text(String),
    LeftDelim,
    RightDelim,
    /// `.name`, without the dot.
    Field(String),
    Dot,
    /// `$` or `$name`, with the dollar.
    Variable(String),
    Ident(String),
    Keyword(Keyword),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Pipe,
    LeftParen,
    RightParen,
    Comma,
    Declare,
    Assign,
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
    Define,
    Template,
    Block,
    Break,
    Continue,
}

impl Keyword {
    fn from_ident(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "range" => Keyword::Range,
            "with" => Keyword::With,
            "define" => Keyword::Define,
            "template" => Keyword::Template,
            "block" => Keyword::Block,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            _ => return None,
        })
    }

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::Range => "range",
            Keyword::With => "with",
            Keyword::Define => "define",
            Keyword::Template => "template",
            Keyword::Block => "block",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Token {
    pub(super) kind: Kind,
    pub(super) pos: usize,
    pub(super) end: usize,
    /// Whether whitespace separates this token from the previous one.
    pub(super) space_before: bool,
}

/// Split `src` into text and action tokens. The list always ends with
/// [`Kind::Eof`], and every [`Kind::LeftDelim`] has a matching
/// [`Kind::RightDelim`].
pub(super) fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
        trim_next: false,
    }
    .run()
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alnum(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    tokens: Vec<Token>,
    /// Set by a ` -}}` marker: strip leading whitespace from the next text.
    trim_next: bool,
}

impl<'s> Lexer<'s> {
    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(SYNTAX, self.src, pos, message.into())
    }

    fn push(&mut self, kind: Kind, pos: usize, end: usize, space_before: bool) {
        self.tokens.push(Token {
            kind,
            pos,
            end,
            space_before,
        });
    }

    fn push_text(&mut self, from: usize, to: usize, trim_end: bool) {
        let mut text = &self.src[from..to];
        if replace(&mut self.trim_next, false) {
            text = text.trim_start_matches(is_space);
        }
        if trim_end {
            text = text.trim_end_matches(is_space);
        }
        if !text.is_empty() {
            self.push(Kind::Text(text.into()), from, to, false);
        }
    }

    fn scan_while(&self, from: usize, f: impl Fn(char) -> bool) -> usize {
        self.src[from..]
            .char_indices()
            .find(|(_, c)| !f(*c))
            .map_or(self.src.len(), |(i, _)| from + i)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let src = self.src;

        while let Some(found) = src[self.pos..].find(LEFT_DELIM) {
            let start = self.pos + found;
            let after = start + LEFT_DELIM.len();
            let trim_left =
                src[after..].starts_with('-') && src[after + 1..].starts_with(is_space);
            self.push_text(self.pos, start, trim_left);

            let inner = if trim_left { after + 1 } else { after };
            // A comment must follow the delimiter (and trim marker) directly.
            let comment = if trim_left { inner + 1 } else { inner };
            if src[comment..].starts_with("/*") {
                self.comment(start, comment)?;
                continue;
            }

            self.push(Kind::LeftDelim, start, inner, false);
            self.pos = inner;
            self.action(start)?;
        }

        self.push_text(self.pos, src.len(), false);
        self.push(Kind::Eof, src.len(), src.len(), false);
        Ok(self.tokens)
    }

    fn comment(&mut self, start: usize, at: usize) -> Result<(), ParseError> {
        let src = self.src;
        let body = at + 2;
        let close = src[body..]
            .find("*/")
            .ok_or_else(|| self.error(start, "unclosed comment"))?;
        let end = body + close + 2;

        if src[end..].starts_with(RIGHT_DELIM) {
            self.pos = end + RIGHT_DELIM.len();
        } else if src[end..].starts_with(is_space) && src[end + 1..].starts_with("-}}") {
            self.pos = end + 4;
            self.trim_next = true;
        } else {
            return Err(self.error(start, "comment ends before closing delimiter"));
        }
        Ok(())
    }

    fn action(&mut self, start: usize) -> Result<(), ParseError> {
        loop {
            let before = self.pos;
            self.pos = self.scan_while(self.pos, is_space);
            let space = self.pos > before;
            let pos = self.pos;
            let rest = &self.src[pos..];

            let Some(c) = rest.chars().next() else {
                return Err(self.error(start, "unclosed action"));
            };

            if space && rest.starts_with("-}}") {
                self.push(Kind::RightDelim, pos, pos + 3, space);
                self.pos = pos + 3;
                self.trim_next = true;
                return Ok(());
            }
            if rest.starts_with(RIGHT_DELIM) {
                self.push(Kind::RightDelim, pos, pos + 2, space);
                self.pos = pos + 2;
                return Ok(());
            }

            let single = match c {
                '|' => Some(Kind::Pipe),
                '(' => Some(Kind::LeftParen),
                ')' => Some(Kind::RightParen),
                ',' => Some(Kind::Comma),
                '=' => Some(Kind::Assign),
                _ => None,
            };
            if let Some(kind) = single {
                self.push(kind, pos, pos + 1, space);
                self.pos = pos + 1;
                continue;
            }

            let next_is_digit = rest[c.len_utf8()..].starts_with(|c: char| c.is_ascii_digit());
            let (kind, end) = match c {
                ':' if rest.starts_with(":=") => (Kind::Declare, pos + 2),
                ':' => return Err(self.error(pos, "expected :=")),
                '"' => self.quoted(pos)?,
                '`' => self.raw(pos)?,
                '$' => {
                    let end = self.scan_while(pos + 1, is_alnum);
                    (Kind::Variable(self.src[pos..end].into()), end)
                }
                '.' if next_is_digit => {
                    return Err(self.error(pos, "floating-point constants are not supported"))
                }
                '.' => {
                    let end = self.scan_while(pos + 1, is_alnum);
                    if end == pos + 1 {
                        (Kind::Dot, end)
                    } else {
                        (Kind::Field(self.src[pos + 1..end].into()), end)
                    }
                }
                '0'..='9' => self.number(pos)?,
                '-' | '+' if next_is_digit => self.number(pos)?,
                c if is_alnum(c) => {
                    let end = self.scan_while(pos, is_alnum);
                    let kind = match &self.src[pos..end] {
                        "true" => Kind::Bool(true),
                        "false" => Kind::Bool(false),
                        "nil" => Kind::Nil,
                        word => Keyword::from_ident(word)
                            .map_or_else(|| Kind::Ident(word.into()), Kind::Keyword),
                    };
                    (kind, end)
                }
                c => {
                    return Err(self.error(pos, format!("unrecognized character in action: {c:?}")))
                }
            };

            self.push(kind, pos, end, space);
            self.pos = end;
        }
    }

    fn number(&self, pos: usize) -> Result<(Kind, usize), ParseError> {
        let src = self.src;
        let negative = src[pos..].starts_with('-');
        let digits = if src[pos..].starts_with(['-', '+']) {
            pos + 1
        } else {
            pos
        };

        let prefixed = |p: [&str; 2]| p.iter().any(|p| src[digits..].starts_with(p));
        let (radix, body_start) = if prefixed(["0x", "0X"]) {
            (16, digits + 2)
        } else if prefixed(["0o", "0O"]) {
            (8, digits + 2)
        } else if prefixed(["0b", "0B"]) {
            (2, digits + 2)
        } else {
            (10, digits)
        };

        let end = self.scan_while(body_start, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        let body = &src[body_start..end];

        if body.contains('.') || (radix == 10 && body.contains(['e', 'E'])) {
            return Err(self.error(pos, "floating-point constants are not supported"));
        }

        let cleaned: String = body.chars().filter(|c| *c != '_').collect();
        let bad = || self.error(pos, format!("bad number syntax: {:?}", &src[pos..end]));
        let magnitude = i128::from_str_radix(&cleaned, radix).map_err(|_| bad())?;
        let value = if negative { -magnitude } else { magnitude };

        Ok((Kind::Int(i64::try_from(value).map_err(|_| bad())?), end))
    }

    fn quoted(&self, pos: usize) -> Result<(Kind, usize), ParseError> {
        let unterminated = || self.error(pos, "unterminated quoted string");
        let invalid = || self.error(pos, "invalid syntax in quoted string");

        let mut out = String::new();
        let mut chars = self.src[pos + 1..].char_indices();

        loop {
            let c = match chars.next() {
                None | Some((_, '\n')) => return Err(unterminated()),
                Some((i, '"')) => return Ok((Kind::Str(out), pos + 1 + i + 1)),
                Some((_, '\\')) => match chars.next() {
                    None => return Err(unterminated()),
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, 'a')) => '\x07',
                    Some((_, 'b')) => '\x08',
                    Some((_, 'f')) => '\x0c',
                    Some((_, 'v')) => '\x0b',
                    Some((_, '\\')) => '\\',
                    Some((_, '"')) => '"',
                    Some((_, 'x')) => hex(&mut chars, 2).ok_or_else(invalid)?,
                    Some((_, 'u')) => hex(&mut chars, 4).ok_or_else(invalid)?,
                    Some((_, 'U')) => hex(&mut chars, 8).ok_or_else(invalid)?,
                    Some(_) => return Err(invalid()),
                },
                Some((_, c)) => c,
            };
            out.push(c);
        }
    }

    fn raw(&self, pos: usize) -> Result<(Kind, usize), ParseError> {
        let body = pos + 1;
        let close = self.src[body..]
            .find('`')
            .ok_or_else(|| self.error(pos, "unterminated raw quoted string"))?;
        let text = self.src[body..body + close].replace('\r', "");
        Ok((Kind::Str(text), body + close + 1))
    }
}

fn hex(chars: &mut CharIndices<'_>, digits: usize) -> Option<char> {
    let mut code = 0;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.1.to_digit(16)?;
    }
    char::from_u32(code)
}

#[cfg(test)]
mod test {
    use super::{lex, Keyword, Kind};

    fn kinds(src: &str) -> Vec<Kind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn text_only() {
        assert_eq!(kinds("hello"), vec![Kind::Text("hello".into()), Kind::Eof]);
        assert_eq!(kinds(""), vec![Kind::Eof]);
    }

    #[test]
    fn field_and_dot() {
        assert_eq!(
            kinds("a{{.name}}b{{ . }}"),
            vec![
                Kind::Text("a".into()),
                Kind::LeftDelim,
                Kind::Field("name".into()),
                Kind::RightDelim,
                Kind::Text("b".into()),
                Kind::LeftDelim,
                Kind::Dot,
                Kind::RightDelim,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn operands() {
        assert_eq!(
            kinds(r#"{{if $x := eq .a "q\"" `r` -12 0x1F true nil | not}}"#),
            vec![
                Kind::LeftDelim,
                Kind::Keyword(Keyword::If),
                Kind::Variable("$x".into()),
                Kind::Declare,
                Kind::Ident("eq".into()),
                Kind::Field("a".into()),
                Kind::Str("q\"".into()),
                Kind::Str("r".into()),
                Kind::Int(-12),
                Kind::Int(31),
                Kind::Bool(true),
                Kind::Nil,
                Kind::Pipe,
                Kind::Ident("not".into()),
                Kind::RightDelim,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn chained_fields_have_no_space() {
        let tokens = lex("{{$.a.b .c}}").unwrap();
        let spaces: Vec<bool> = tokens.iter().map(|t| t.space_before).collect();
        assert_eq!(
            tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![
                Kind::LeftDelim,
                Kind::Variable("$".into()),
                Kind::Field("a".into()),
                Kind::Field("b".into()),
                Kind::Field("c".into()),
                Kind::RightDelim,
                Kind::Eof,
            ]
        );
        assert_eq!(spaces, vec![false, false, false, false, true, false, false]);
    }

    #[test]
    fn trim_markers() {
        assert_eq!(
            kinds("a  {{- .x -}}  b"),
            vec![
                Kind::Text("a".into()),
                Kind::LeftDelim,
                Kind::Field("x".into()),
                Kind::RightDelim,
                Kind::Text("b".into()),
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn comments() {
        assert_eq!(kinds("a{{/* c */}}b"), vec![Kind::Text("a".into()), Kind::Text("b".into()), Kind::Eof]);
        assert_eq!(kinds("a {{- /* c */ -}} b"), vec![Kind::Text("a".into()), Kind::Text("b".into()), Kind::Eof]);
    }

    fn error(src: &str) -> String {
        lex(src).unwrap_err().message().to_owned()
    }

    #[test]
    fn errors() {
        assert_eq!(error("{{ .a "), "unclosed action");
        assert_eq!(error("{{/* x"), "unclosed comment");
        assert_eq!(error("{{/* x */ .a }}"), "comment ends before closing delimiter");
        assert_eq!(error("{{ \"abc }}"), "unterminated quoted string");
        assert_eq!(error("{{ 1.5 }}"), "floating-point constants are not supported");
        assert_eq!(error("{{ 12abc }}"), "bad number syntax: \"12abc\"");
        assert_eq!(error("{{ # }}"), "unrecognized character in action: '#'");
        assert_eq!(error("{{ $x : 1 }}"), "expected :=");
    }
}
