//! Go `text/template` syntax.
//!
//! ```plain
//! Hello {{ .name }}!
//! {{ if eq .env "prod" -}} careful {{- else -}} have fun {{- end }}
//! {{ range $key, $value := . }}{{ $key }}={{ $value | printf "%q" }}
//! {{ end }}
//! ```
//!
//! The data handed to the template (dot, at the top level) is the variable
//! map, so `.name` looks up `name`. A missing key prints `<no value>`.
//! Values are strings, integers, booleans or nil, and the map itself.
//!
//! # Supported actions
//!
//! - text and `{{/* comments */}}`, with `{{-` and `-}}` trimming
//! - pipelines of fields, variables, literals, parenthesised pipelines and
//!   function calls, chained with `|`
//! - `{{$x := pipeline}}` and `{{$x = pipeline}}`
//! - `if`, `else if`, `with`, `else with`, `range` (over the map, or an
//!   integer), `break` and `continue`
//! - `define`, `template` and `block`
//!
//! The predefined functions are `and`, `or`, `not`, `len`, `index`, `eq`,
//! `ne`, `lt`, `le`, `gt`, `ge`, `print`, `println`, `printf`, `html` and
//! `urlquery`. Anything else is rejected when the template is parsed, as are
//! floating-point constants.

use crate::{ParseError, RenderError, VariableMap};

mod exec;
mod funcs;
mod lexer;
mod parser;
mod value;

const SYNTAX: &str = "go";

/// A parsed Go template.
#[derive(Clone, Debug)]
pub struct Template {
    source: String,
    tree: parser::Tree,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tokens = lexer::lex(source)?;
        let tree = parser::parse(source, tokens)?;
        Ok(Self {
            source: source.to_owned(),
            tree,
        })
    }

    /// Execute the template with `values` as dot.
    ///
    /// Output is produced in full or not at all.
    pub fn render(&self, values: &VariableMap) -> Result<String, RenderError> {
        exec::execute(&self.source, &self.tree, values)
    }

    /// Names of the templates made by `define` and `block`.
    pub fn defined_templates(&self) -> impl Iterator<Item = &str> {
        self.tree.defines.keys().map(String::as_str)
    }
}
