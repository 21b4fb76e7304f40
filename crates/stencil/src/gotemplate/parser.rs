use std::{collections::BTreeMap, mem::take};

use super::{
    funcs,
    lexer::{Keyword, Kind, Token},
    SYNTAX,
};
use crate::ParseError;

/// How deep pipelines, control blocks and template bodies may nest.
const MAX_DEPTH: usize = 200;

/// Byte range of a construct in the template source.
pub(super) type Span = (usize, usize);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct Tree {
    pub(super) root: Vec<Node>,
    /// Bodies of `{{define}}` and `{{block}}`, by name.
    pub(super) defines: BTreeMap<String, Vec<Node>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Node {
    Text(String),
    Action(Pipe),
    If(Branch),
    With(Branch),
    Range(Branch),
    Template {
        span: Span,
        name: String,
        pipe: Option<Pipe>,
    },
    Break,
    Continue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Branch {
    pub(super) pipe: Pipe,
    pub(super) list: Vec<Node>,
    pub(super) else_list: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Pipe {
    pub(super) span: Span,
    /// Variables declared (or assigned, when `assign` is set) by this pipeline.
    pub(super) decl: Vec<String>,
    pub(super) assign: bool,
    pub(super) cmds: Vec<Cmd>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Cmd {
    pub(super) args: Vec<Operand>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Operand {
    pub(super) span: Span,
    pub(super) arg: Arg,
    /// Field names following the argument, as in `$x.a.b`.
    pub(super) chain: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Arg {
    Dot,
    Field(String),
    Variable(String),
    Func(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Pipe(Box<Pipe>),
}

enum End {
    Eof,
    End,
    Else,
}

pub(super) fn parse(src: &str, tokens: Vec<Token>) -> Result<Tree, ParseError> {
    let mut parser = Parser {
        src,
        tokens,
        at: 0,
        vars: Vec::new(),
        range_depth: 0,
        depth: 0,
        defines: BTreeMap::new(),
    };
    let (root, _, _) = parser.list(true)?;
    Ok(Tree {
        root,
        defines: parser.defines,
    })
}

fn is_empty_tree(nodes: &[Node]) -> bool {
    nodes
        .iter()
        .all(|node| matches!(node, Node::Text(text) if text.trim().is_empty()))
}

struct Parser<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    at: usize,
    /// Variables in scope, innermost last. `$` is always in scope.
    vars: Vec<String>,
    range_depth: usize,
    /// Current nesting, bounded by `MAX_DEPTH`.
    depth: usize,
    defines: BTreeMap<String, Vec<Node>>,
}

impl<'s> Parser<'s> {
    fn error(&self, pos: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(SYNTAX, self.src, pos, message.into())
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        pos: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(pos, "max expression depth exceeded"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.at + n).min(last)]
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.at < self.tokens.len() - 1 {
            self.at += 1;
        }
        token
    }

    /// End of the last consumed token.
    fn last_end(&self) -> usize {
        self.tokens[self.at.saturating_sub(1)].end
    }

    fn describe(&self, token: &Token) -> String {
        match token.kind {
            Kind::Eof => "EOF".into(),
            _ => format!("{:?}", &self.src[token.pos..token.end]),
        }
    }

    fn expect_right(&mut self, context: &str) -> Result<Token, ParseError> {
        let token = self.next();
        if token.kind == Kind::RightDelim {
            Ok(token)
        } else {
            Err(self.error(
                token.pos,
                format!("unexpected {} in {context}", self.describe(&token)),
            ))
        }
    }

    fn list(&mut self, top: bool) -> Result<(Vec<Node>, End, usize), ParseError> {
        let mut nodes = Vec::new();

        loop {
            let token = self.next();
            match token.kind {
                Kind::Text(text) => nodes.push(Node::Text(text)),
                Kind::Eof if top => return Ok((nodes, End::Eof, token.pos)),
                Kind::Eof => return Err(self.error(token.pos, "unexpected EOF")),
                Kind::LeftDelim => {
                    let keyword = self.peek().clone();
                    match keyword.kind {
                        Kind::Keyword(Keyword::End) => {
                            self.next();
                            if top {
                                return Err(self.error(keyword.pos, "unexpected {{end}}"));
                            }
                            self.expect_right("end")?;
                            return Ok((nodes, End::End, keyword.pos));
                        }
                        Kind::Keyword(Keyword::Else) => {
                            self.next();
                            if top {
                                return Err(self.error(keyword.pos, "unexpected {{else}}"));
                            }
                            return Ok((nodes, End::Else, keyword.pos));
                        }
                        Kind::Keyword(kw) => {
                            self.next();
                            nodes.extend(self.keyword(kw, keyword.pos, top)?);
                        }
                        _ => {
                            let pipe = self.pipeline("command", true)?;
                            self.expect_right("command")?;
                            nodes.push(Node::Action(pipe));
                        }
                    }
                }
                _ => {
                    return Err(self.error(
                        token.pos,
                        format!("unexpected {}", self.describe(&token)),
                    ))
                }
            }
        }
    }

    fn keyword(&mut self, kw: Keyword, pos: usize, top: bool) -> Result<Option<Node>, ParseError> {
        match kw {
            Keyword::If => Ok(Some(Node::If(self.branch(Keyword::If)?))),
            Keyword::With => Ok(Some(Node::With(self.branch(Keyword::With)?))),
            Keyword::Range => Ok(Some(Node::Range(self.branch(Keyword::Range)?))),
            Keyword::Template => {
                let name = self.template_name("template")?;
                let pipe = if self.peek().kind == Kind::RightDelim {
                    None
                } else {
                    Some(self.pipeline("template clause", false)?)
                };
                let end = self.expect_right("template clause")?;
                Ok(Some(Node::Template {
                    span: (pos, end.pos),
                    name,
                    pipe,
                }))
            }
            Keyword::Block => {
                let name = self.template_name("block")?;
                let pipe = self.pipeline("block clause", false)?;
                let end = self.expect_right("block clause")?;
                let body = self.body("block")?;
                self.define(name.clone(), body, pos)?;
                Ok(Some(Node::Template {
                    span: (pos, end.pos),
                    name,
                    pipe: Some(pipe),
                }))
            }
            Keyword::Define => {
                if !top {
                    return Err(self.error(pos, "define clause is only allowed at the top level"));
                }
                let name = self.template_name("define")?;
                self.expect_right("define clause")?;
                let body = self.body("define")?;
                self.define(name, body, pos)?;
                Ok(None)
            }
            Keyword::Break | Keyword::Continue => {
                if self.range_depth == 0 {
                    return Err(self.error(
                        pos,
                        format!("{{{{{}}}}} outside {{{{range}}}}", kw.as_str()),
                    ));
                }
                self.expect_right(kw.as_str())?;
                Ok(Some(if kw == Keyword::Break {
                    Node::Break
                } else {
                    Node::Continue
                }))
            }
            Keyword::Else | Keyword::End => {
                Err(self.error(pos, format!("unexpected {{{{{}}}}}", kw.as_str())))
            }
        }
    }

    fn template_name(&mut self, context: &str) -> Result<String, ParseError> {
        let token = self.next();
        match token.kind {
            Kind::Str(name) => Ok(name),
            _ => Err(self.error(
                token.pos,
                format!("unexpected {} in {context} clause", self.describe(&token)),
            )),
        }
    }

    /// Parse the body of a `define` or `block`, which has its own variable
    /// scope and sits outside any enclosing `range`.
    fn body(&mut self, context: &str) -> Result<Vec<Node>, ParseError> {
        let vars = take(&mut self.vars);
        let range_depth = take(&mut self.range_depth);
        let pos = self.peek().pos;
        let listed = self.nested(pos, |parser| parser.list(false));
        self.vars = vars;
        self.range_depth = range_depth;

        match listed? {
            (nodes, End::End, _) => Ok(nodes),
            (_, _, pos) => Err(self.error(pos, format!("unexpected {{{{else}}}} in {context}"))),
        }
    }

    fn define(&mut self, name: String, body: Vec<Node>, pos: usize) -> Result<(), ParseError> {
        let keep_existing = match self.defines.get(&name) {
            Some(existing) if !is_empty_tree(existing) && !is_empty_tree(&body) => {
                return Err(self.error(pos, format!("multiple definition of template {name:?}")))
            }
            Some(_) => is_empty_tree(&body),
            None => false,
        };
        if !keep_existing {
            self.defines.insert(name, body);
        }
        Ok(())
    }

    fn branch(&mut self, kw: Keyword) -> Result<Branch, ParseError> {
        let pos = self.peek().pos;
        self.nested(pos, |parser| parser.branch_inner(kw))
    }

    fn branch_inner(&mut self, kw: Keyword) -> Result<Branch, ParseError> {
        let context = kw.as_str();
        let mark = self.vars.len();

        let pipe = self.pipeline(context, true)?;
        self.expect_right(context)?;

        let is_range = kw == Keyword::Range;
        if is_range {
            self.range_depth += 1;
        }
        let listed = self.list(false);
        if is_range {
            self.range_depth -= 1;
        }
        let (list, end, _) = listed?;

        let else_list = match end {
            End::End => Vec::new(),
            End::Else => {
                let next = self.peek().clone();
                match next.kind {
                    Kind::Keyword(Keyword::If) => {
                        self.next();
                        vec![Node::If(self.branch(Keyword::If)?)]
                    }
                    Kind::Keyword(Keyword::With) => {
                        self.next();
                        vec![Node::With(self.branch(Keyword::With)?)]
                    }
                    _ => {
                        self.expect_right("else")?;
                        match self.list(false)? {
                            (nodes, End::End, _) => nodes,
                            (_, _, pos) => {
                                return Err(self.error(pos, "expected end; found {{else}}"))
                            }
                        }
                    }
                }
            }
            End::Eof => return Err(self.error(self.src.len(), "unexpected EOF")),
        };

        self.vars.truncate(mark);
        Ok(Branch {
            pipe,
            list,
            else_list,
        })
    }

    fn declared(&self, name: &str) -> bool {
        name == "$" || self.vars.iter().any(|v| v == name)
    }

    fn pipeline(&mut self, context: &str, allow_decl: bool) -> Result<Pipe, ParseError> {
        let pos = self.peek().pos;
        self.nested(pos, |parser| parser.pipeline_inner(context, allow_decl))
    }

    fn pipeline_inner(&mut self, context: &str, allow_decl: bool) -> Result<Pipe, ParseError> {
        let start = self.peek().pos;

        let found = match (
            &self.peek_at(0).kind,
            &self.peek_at(1).kind,
            &self.peek_at(2).kind,
            &self.peek_at(3).kind,
        ) {
            (Kind::Variable(v), op @ (Kind::Declare | Kind::Assign), _, _) => {
                Some((vec![v.clone()], *op == Kind::Assign, 2))
            }
            (Kind::Variable(k), Kind::Comma, Kind::Variable(v), op @ (Kind::Declare | Kind::Assign)) => {
                Some((vec![k.clone(), v.clone()], *op == Kind::Assign, 4))
            }
            _ => None,
        };

        let (decl, assign) = match found {
            Some((decl, assign, taken)) if allow_decl => {
                if decl.len() > 1 && context != "range" {
                    return Err(self.error(start, format!("too many declarations in {context}")));
                }
                self.at += taken;
                (decl, assign)
            }
            _ => (Vec::new(), false),
        };

        if assign {
            if let Some(name) = decl.iter().find(|name| !self.declared(name)) {
                return Err(self.error(start, format!("undefined variable {name:?}")));
            }
        }

        let mut cmds = Vec::new();
        loop {
            cmds.push(self.command(context)?);
            if self.peek().kind == Kind::Pipe {
                self.next();
            } else {
                break;
            }
        }

        if !assign {
            self.vars.extend(decl.iter().cloned());
        }

        Ok(Pipe {
            span: (start, self.last_end()),
            decl,
            assign,
            cmds,
        })
    }

    fn command(&mut self, context: &str) -> Result<Cmd, ParseError> {
        let mut args = Vec::new();
        while !matches!(
            self.peek().kind,
            Kind::RightDelim | Kind::RightParen | Kind::Pipe
        ) {
            args.push(self.operand()?);
        }

        match args.first() {
            None => Err(self.error(self.peek().pos, format!("missing value for {context}"))),
            Some(Operand { arg: Arg::Nil, span, .. }) => {
                Err(self.error(span.0, "nil is not a command"))
            }
            Some(_) => Ok(Cmd { args }),
        }
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        let token = self.next();
        let (arg, chainable) = match token.kind {
            Kind::Dot => (Arg::Dot, false),
            Kind::Field(ref name) => (Arg::Field(name.clone()), true),
            Kind::Variable(ref name) => {
                if !self.declared(name) {
                    return Err(self.error(token.pos, format!("undefined variable {name:?}")));
                }
                (Arg::Variable(name.clone()), true)
            }
            Kind::Ident(ref name) => {
                if !funcs::exists(name) {
                    return Err(self.error(token.pos, format!("function {name:?} not defined")));
                }
                (Arg::Func(name.clone()), false)
            }
            Kind::Str(ref s) => (Arg::Str(s.clone()), false),
            Kind::Int(n) => (Arg::Int(n), false),
            Kind::Bool(b) => (Arg::Bool(b), false),
            Kind::Nil => (Arg::Nil, false),
            Kind::LeftParen => {
                let pipe = self.pipeline("parenthesized pipeline", true)?;
                let close = self.next();
                if close.kind != Kind::RightParen {
                    return Err(self.error(close.pos, "unclosed left paren"));
                }
                (Arg::Pipe(Box::new(pipe)), true)
            }
            _ => {
                return Err(self.error(
                    token.pos,
                    format!("unexpected {} in operand", self.describe(&token)),
                ))
            }
        };

        let mut chain = Vec::new();
        if chainable {
            loop {
                let next = self.peek();
                match &next.kind {
                    Kind::Field(name) if !next.space_before => {
                        let name = name.clone();
                        self.next();
                        chain.push(name);
                    }
                    _ => break,
                }
            }
        }

        Ok(Operand {
            span: (token.pos, self.last_end()),
            arg,
            chain,
        })
    }
}
