use std::{fmt::Write, mem::replace};

use tracing::trace;

use super::{
    funcs,
    parser::{Arg, Branch, Cmd, Node, Operand, Pipe, Span, Tree},
    value::Value,
    SYNTAX,
};
use crate::{error::line_of, RenderError, VariableMap};

/// How deep `{{template}}` calls may nest.
const MAX_DEPTH: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

type Result<T> = std::result::Result<T, RenderError>;

pub(super) fn execute<'a>(src: &'a str, tree: &'a Tree, values: &'a VariableMap) -> Result<String> {
    let dot = Value::Map(values);
    let mut exec = Exec {
        src,
        tree,
        name: "main",
        vars: vec![("$", dot.clone())],
        depth: 0,
        out: String::new(),
    };
    exec.walk(&tree.root, &dot)?;
    Ok(exec.out)
}

struct Exec<'a> {
    src: &'a str,
    tree: &'a Tree,
    /// Template being executed, for error messages.
    name: &'a str,
    vars: Vec<(&'a str, Value<'a>)>,
    depth: usize,
    out: String,
}

impl<'a> Exec<'a> {
    fn fail(&self, span: Span, message: impl std::fmt::Display) -> RenderError {
        RenderError::Exec {
            syntax: SYNTAX,
            line: line_of(self.src, span.0),
            message: format!(
                "executing {:?} at <{}>: {message}",
                self.name,
                self.src[span.0..span.1].trim()
            ),
        }
    }

    fn walk(&mut self, nodes: &'a [Node], dot: &Value<'a>) -> Result<Flow> {
        for node in nodes {
            let flow = match node {
                Node::Text(text) => {
                    self.out.push_str(text);
                    Flow::Normal
                }
                Node::Action(pipe) => {
                    let value = self.pipe(pipe, dot)?;
                    if pipe.decl.is_empty() {
                        let _ = write!(self.out, "{value}");
                    }
                    Flow::Normal
                }
                Node::If(branch) => self.branch(branch, dot, false)?,
                Node::With(branch) => self.branch(branch, dot, true)?,
                Node::Range(branch) => self.range(branch, dot)?,
                Node::Template { span, name, pipe } => {
                    self.template(*span, name, pipe.as_ref(), dot)?;
                    Flow::Normal
                }
                Node::Break => Flow::Break,
                Node::Continue => Flow::Continue,
            };
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn branch(&mut self, branch: &'a Branch, dot: &Value<'a>, with: bool) -> Result<Flow> {
        let mark = self.vars.len();
        let value = self.pipe(&branch.pipe, dot)?;

        let flow = match (value.truth(), with) {
            (true, true) => self.walk(&branch.list, &value),
            (true, false) => self.walk(&branch.list, dot),
            (false, _) => self.walk(&branch.else_list, dot),
        };

        self.vars.truncate(mark);
        flow
    }

    fn range(&mut self, branch: &'a Branch, dot: &Value<'a>) -> Result<Flow> {
        let mark = self.vars.len();
        let pipe = &branch.pipe;
        let mut empty = true;

        match self.pipe_value(pipe, dot)? {
            Value::Map(map) => {
                for (key, elem) in map.iter() {
                    empty = false;
                    if self.iteration(branch, Value::str(key), Value::str(elem))? == Flow::Break {
                        break;
                    }
                }
            }
            Value::Int(n) => {
                if pipe.decl.len() > 1 {
                    return Err(self.fail(pipe.span, "can't use two variables to range over an integer"));
                }
                for i in 0..n {
                    empty = false;
                    if self.iteration(branch, Value::Int(i), Value::Int(i))? == Flow::Break {
                        break;
                    }
                }
            }
            Value::Missing | Value::Nil => {}
            other => {
                return Err(self.fail(pipe.span, format!("range can't iterate over {other}")));
            }
        }

        let flow = if empty {
            self.walk(&branch.else_list, dot)
        } else {
            Ok(Flow::Normal)
        };

        self.vars.truncate(mark);
        flow
    }

    fn iteration(&mut self, branch: &'a Branch, key: Value<'a>, elem: Value<'a>) -> Result<Flow> {
        let mark = self.vars.len();
        match branch.pipe.decl.as_slice() {
            [v] => self.vars.push((v.as_str(), elem.clone())),
            [k, v] => {
                self.vars.push((k.as_str(), key));
                self.vars.push((v.as_str(), elem.clone()));
            }
            _ => {}
        }

        let flow = self.walk(&branch.list, &elem);
        self.vars.truncate(mark);
        flow
    }

    fn template(
        &mut self,
        span: Span,
        name: &'a str,
        pipe: Option<&'a Pipe>,
        dot: &Value<'a>,
    ) -> Result<()> {
        let tree = self.tree;
        let body = tree
            .defines
            .get(name)
            .ok_or_else(|| self.fail(span, format!("no such template {name:?}")))?;

        if self.depth >= MAX_DEPTH {
            return Err(self.fail(
                span,
                format!("exceeded maximum template depth ({MAX_DEPTH})"),
            ));
        }

        let dot = match pipe {
            Some(pipe) => self.pipe(pipe, dot)?,
            None => Value::Nil,
        };
        trace!(name, depth = self.depth, "executing template");

        let vars = replace(&mut self.vars, vec![("$", dot.clone())]);
        let caller = replace(&mut self.name, name);
        self.depth += 1;

        let result = self.walk(body, &dot);

        self.depth -= 1;
        self.name = caller;
        self.vars = vars;
        result.map(drop)
    }

    /// Evaluate a pipeline and bind the variables it declares.
    fn pipe(&mut self, pipe: &'a Pipe, dot: &Value<'a>) -> Result<Value<'a>> {
        let value = self.pipe_value(pipe, dot)?;

        for name in &pipe.decl {
            if pipe.assign {
                if let Some(slot) = self.vars.iter_mut().rev().find(|slot| slot.0 == name.as_str()) {
                    slot.1 = value.clone();
                }
            } else {
                self.vars.push((name.as_str(), value.clone()));
            }
        }

        Ok(value)
    }

    fn pipe_value(&mut self, pipe: &'a Pipe, dot: &Value<'a>) -> Result<Value<'a>> {
        let mut piped = None;
        for cmd in &pipe.cmds {
            piped = Some(self.command(cmd, dot, piped)?);
        }
        Ok(piped.unwrap_or(Value::Missing))
    }

    /// Evaluate one command; `piped` is the result of the previous command,
    /// passed as the final argument.
    fn command(&mut self, cmd: &'a Cmd, dot: &Value<'a>, piped: Option<Value<'a>>) -> Result<Value<'a>> {
        let Some((first, rest)) = cmd.args.split_first() else {
            return Ok(Value::Missing);
        };

        match &first.arg {
            Arg::Func(name) => self.call(first.span, name, rest, dot, piped),
            Arg::Field(name) if !rest.is_empty() || piped.is_some() => {
                let field = first.chain.last().unwrap_or(name);
                Err(self.fail(first.span, format!("{field} is not a method but has arguments")))
            }
            _ if !rest.is_empty() || piped.is_some() => Err(self.fail(
                first.span,
                format!(
                    "can't give argument to non-function {}",
                    &self.src[first.span.0..first.span.1]
                ),
            )),
            _ => self.operand(first, dot),
        }
    }

    fn operand(&mut self, op: &'a Operand, dot: &Value<'a>) -> Result<Value<'a>> {
        let base = match &op.arg {
            Arg::Dot => dot.clone(),
            Arg::Field(name) => self.field(op.span, dot.clone(), name)?,
            Arg::Variable(name) => self.variable(op.span, name)?,
            Arg::Func(name) => self.call(op.span, name, &[], dot, None)?,
            Arg::Str(s) => Value::str(s),
            Arg::Int(n) => Value::Int(*n),
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Nil => Value::Nil,
            Arg::Pipe(pipe) => self.pipe(pipe, dot)?,
        };

        op.chain
            .iter()
            .try_fold(base, |value, name| self.field(op.span, value, name))
    }

    fn field(&self, span: Span, value: Value<'a>, name: &str) -> Result<Value<'a>> {
        match value {
            Value::Map(map) => Ok(map.get(name).map_or(Value::Missing, Value::str)),
            Value::Missing | Value::Nil => {
                Err(self.fail(span, format!("nil pointer evaluating interface {{}}.{name}")))
            }
            other => Err(self.fail(
                span,
                format!("can't evaluate field {name} in type {}", other.type_name()),
            )),
        }
    }

    fn variable(&self, span: Span, name: &str) -> Result<Value<'a>> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| self.fail(span, format!("undefined variable: {name}")))
    }

    fn call(
        &mut self,
        span: Span,
        name: &str,
        args: &'a [Operand],
        dot: &Value<'a>,
        piped: Option<Value<'a>>,
    ) -> Result<Value<'a>> {
        if let "and" | "or" = name {
            // `and` stops at the first false argument, `or` at the first true one.
            let stop_on = name == "or";
            let mut last = None;
            for op in args {
                let value = self.operand(op, dot)?.or_nil();
                if value.truth() == stop_on {
                    return Ok(value);
                }
                last = Some(value);
            }
            if let Some(value) = piped.map(Value::or_nil) {
                return Ok(value);
            }
            return last.ok_or_else(|| {
                self.fail(span, format!("wrong number of args for {name}: want at least 1 got 0"))
            });
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        for op in args {
            values.push(self.operand(op, dot)?.or_nil());
        }
        values.extend(piped.map(Value::or_nil));

        funcs::call(name, values).map_err(|message| self.fail(span, message))
    }
}
