use std::mem::{replace, take};

use super::Node;
use crate::ParseError;

const SYNTAX: &str = "mustache";

/// How deep sections may nest.
const MAX_DEPTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Variable { escape: bool },
    Open { inverted: bool },
    Close,
    Comment,
    Partial,
    Delimiters,
}

impl Tag {
    /// Tags that produce no output of their own, and so may sit alone on a line.
    fn may_stand_alone(self) -> bool {
        !matches!(self, Tag::Variable { .. })
    }
}

struct Section {
    name: String,
    inverted: bool,
    start: usize,
    parent: Vec<Node>,
}

struct Parser<'s> {
    src: &'s str,
    open: String,
    close: String,
    sections: Vec<Section>,
    nodes: Vec<Node>,
    text: String,
}

pub(super) fn parse(src: &str) -> Result<Vec<Node>, ParseError> {
    Parser {
        src,
        open: "{{".into(),
        close: "}}".into(),
        sections: Vec::new(),
        nodes: Vec::new(),
        text: String::new(),
    }
    .run()
}

impl<'s> Parser<'s> {
    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(SYNTAX, self.src, pos, message.into())
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.nodes.push(Node::Text(take(&mut self.text)));
        }
    }

    fn run(mut self) -> Result<Vec<Node>, ParseError> {
        let src = self.src;
        let mut pos = 0;

        while let Some(found) = src[pos..].find(self.open.as_str()) {
            let start = pos + found;
            self.text.push_str(&src[pos..start]);

            let (inner, mut end) = self.tag_bounds(start)?;
            let (tag, name) = self.classify(start, &src[inner.0..inner.1])?;

            if tag.may_stand_alone() {
                if let Some(line_end) = self.standalone(start, end) {
                    let indent = start - src[..start].rfind('\n').map_or(0, |i| i + 1);
                    self.text.truncate(self.text.len() - indent);
                    end = line_end;
                }
            }

            match tag {
                Tag::Variable { escape } => {
                    self.flush_text();
                    self.nodes.push(Node::Variable {
                        name: name.into(),
                        escape,
                    });
                }
                Tag::Open { inverted } => {
                    if self.sections.len() >= MAX_DEPTH {
                        return Err(self.error(start, "max section depth exceeded"));
                    }
                    self.flush_text();
                    let parent = take(&mut self.nodes);
                    self.sections.push(Section {
                        name: name.into(),
                        inverted,
                        start,
                        parent,
                    });
                }
                Tag::Close => {
                    self.flush_text();
                    let section = match self.sections.pop() {
                        Some(section) if section.name == name => section,
                        Some(section) => {
                            return Err(self.error(
                                start,
                                format!(
                                    "section {{{{#{}}}}} closed by {{{{/{name}}}}}",
                                    section.name
                                ),
                            ))
                        }
                        None => {
                            return Err(
                                self.error(start, format!("unexpected closing tag {{{{/{name}}}}}"))
                            )
                        }
                    };
                    let nodes = replace(&mut self.nodes, section.parent);
                    self.nodes.push(Node::Section {
                        name: section.name,
                        inverted: section.inverted,
                        nodes,
                    });
                }
                Tag::Partial => {
                    self.flush_text();
                    self.nodes.push(Node::Partial(name.into()));
                }
                Tag::Comment => {}
                Tag::Delimiters => {
                    let mut parts = name.split_whitespace();
                    // classify() checked there are exactly two
                    if let (Some(open), Some(close)) = (parts.next(), parts.next()) {
                        self.open = open.into();
                        self.close = close.into();
                    }
                }
            }

            pos = end;
        }

        self.text.push_str(&src[pos..]);
        self.flush_text();

        if let Some(section) = self.sections.last() {
            return Err(self.error(
                section.start,
                format!("unclosed section {{{{#{}}}}}", section.name),
            ));
        }

        Ok(self.nodes)
    }

    /// Find the content range and the end of the tag opening at `start`.
    fn tag_bounds(&self, start: usize) -> Result<((usize, usize), usize), ParseError> {
        let inner_start = start + self.open.len();
        let rest = &self.src[inner_start..];

        if rest.starts_with('{') {
            let closing = format!("}}{}", self.close);
            let at = rest
                .find(closing.as_str())
                .ok_or_else(|| self.error(start, "unterminated triple mustache"))?;
            Ok(((inner_start, inner_start + at + 1), inner_start + at + closing.len()))
        } else {
            let at = rest
                .find(self.close.as_str())
                .ok_or_else(|| self.error(start, "unclosed tag"))?;
            Ok(((inner_start, inner_start + at), inner_start + at + self.close.len()))
        }
    }

    fn classify<'t>(&self, start: usize, inner: &'t str) -> Result<(Tag, &'t str), ParseError> {
        let content = inner.trim();
        let mut chars = content.chars();

        let (tag, name) = match chars.next() {
            Some('{') => {
                let name = content
                    .strip_prefix('{')
                    .and_then(|c| c.strip_suffix('}'))
                    .ok_or_else(|| self.error(start, "unterminated triple mustache"))?;
                (Tag::Variable { escape: false }, name)
            }
            Some('&') => (Tag::Variable { escape: false }, chars.as_str()),
            Some('#') => (Tag::Open { inverted: false }, chars.as_str()),
            Some('^') => (Tag::Open { inverted: true }, chars.as_str()),
            Some('/') => (Tag::Close, chars.as_str()),
            Some('!') => return Ok((Tag::Comment, chars.as_str())),
            Some('>') => (Tag::Partial, chars.as_str()),
            Some('=') => {
                let body = chars
                    .as_str()
                    .strip_suffix('=')
                    .filter(|body| {
                        let parts: Vec<&str> = body.split_whitespace().collect();
                        parts.len() == 2 && parts.iter().all(|p| !p.contains('='))
                    })
                    .ok_or_else(|| self.error(start, "invalid set delimiters tag"))?;
                return Ok((Tag::Delimiters, body));
            }
            _ => (Tag::Variable { escape: true }, content),
        };

        let name = name.trim();
        if name.is_empty() {
            Err(self.error(start, "empty tag"))
        } else {
            Ok((tag, name))
        }
    }

    /// If the tag spanning `start..end` is alone on its line, return the
    /// position just past that line.
    fn standalone(&self, start: usize, end: usize) -> Option<usize> {
        let src = self.src;
        let line_start = src[..start].rfind('\n').map_or(0, |i| i + 1);
        let blank = |s: &str| s.bytes().all(|b| b == b' ' || b == b'\t');

        if !blank(&src[line_start..start]) {
            return None;
        }

        let after = &src[end..];
        let line_len = after.find('\n').map_or(after.len(), |i| i + 1);
        let tail = &after[..line_len];
        let tail = tail.strip_suffix('\n').unwrap_or(tail);
        let tail = tail.strip_suffix('\r').unwrap_or(tail);

        blank(tail).then_some(end + line_len)
    }
}

#[cfg(test)]
mod test {
    use super::parse;
    use crate::mustache::Node;

    fn text(s: &str) -> Node {
        Node::Text(s.into())
    }

    fn var(name: &str) -> Node {
        Node::Variable {
            name: name.into(),
            escape: true,
        }
    }

    #[test]
    fn empty() {
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn no_tags() {
        assert_eq!(parse("hello world").unwrap(), vec![text("hello world")]);
    }

    #[test]
    fn leading_middle_trailing() {
        assert_eq!(
            parse("{{salutation}} good {{title}}!").unwrap(),
            vec![var("salutation"), text(" good "), var("title"), text("!")]
        );
    }

    #[test]
    fn section_tree() {
        assert_eq!(
            parse("a{{#s}}b{{^t}}c{{/t}}{{/s}}").unwrap(),
            vec![
                text("a"),
                Node::Section {
                    name: "s".into(),
                    inverted: false,
                    nodes: vec![
                        text("b"),
                        Node::Section {
                            name: "t".into(),
                            inverted: true,
                            nodes: vec![text("c")],
                        },
                    ],
                },
            ]
        );
    }

    #[test]
    fn comment_merges_text() {
        assert_eq!(parse("a{{! x }}b").unwrap(), vec![text("ab")]);
    }

    #[test]
    fn crlf_standalone() {
        assert_eq!(
            parse("a\r\n{{#s}}\r\nb\r\n{{/s}}\r\n").unwrap(),
            vec![
                text("a\r\n"),
                Node::Section {
                    name: "s".into(),
                    inverted: false,
                    nodes: vec![text("b\r\n")],
                },
            ]
        );
    }

    fn error(src: &str) -> String {
        parse(src).unwrap_err().message().to_owned()
    }

    #[test]
    fn errors() {
        assert_eq!(error("Hello {{name"), "unclosed tag");
        assert_eq!(error("{{}}"), "empty tag");
        assert_eq!(error("{{#  }}"), "empty tag");
        assert_eq!(error("{{#a}}x"), "unclosed section {{#a}}");
        assert_eq!(error("x{{/a}}"), "unexpected closing tag {{/a}}");
        assert_eq!(error("{{#a}}{{/b}}"), "section {{#a}} closed by {{/b}}");
        assert_eq!(error("{{{a}}"), "unterminated triple mustache");
        assert_eq!(error("{{=<%=}}"), "invalid set delimiters tag");
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}{}", "{{#a}}".repeat(50_000), "{{/a}}".repeat(50_000));
        assert_eq!(error(&deep), "max section depth exceeded");

        let fine = format!("{}x{}", "{{^a}}".repeat(200), "{{/a}}".repeat(200));
        assert!(parse(&fine).is_ok());
    }

    #[test]
    fn error_line() {
        let err = parse("one\ntwo\n{{#a}}").unwrap_err();
        assert_eq!(err.line(), 3);
    }
}
