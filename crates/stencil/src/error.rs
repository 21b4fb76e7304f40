use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
pub enum RenderError {
    /// The template failed to parse.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidTemplate(#[from] ParseError),

    /// The template parsed, but executing it failed.
    ///
    /// Only the Go-template syntax can fail at this stage, e.g. when a field
    /// is taken from a plain string or a function gets the wrong arguments.
    #[error("{syntax} template, line {line}: {message}")]
    #[diagnostic(code(stencil::template::exec))]
    Exec {
        syntax: &'static str,
        line: usize,
        message: String,
    },
}

#[derive(Debug, Diagnostic, Error)]
#[error("{syntax} template, line {line}: {message}")]
#[diagnostic(code(stencil::template::parse))]
pub struct ParseError {
    pub(crate) syntax: &'static str,
    pub(crate) line: usize,
    pub(crate) message: String,

    #[source_code]
    pub(crate) src: String,

    #[label("here")]
    pub(crate) at: SourceSpan,
}

impl ParseError {
    pub(crate) fn new(syntax: &'static str, src: &str, pos: usize, message: String) -> Self {
        let pos = pos.min(src.len());
        Self {
            syntax,
            line: line_of(src, pos),
            message,
            src: src.to_owned(),
            at: (pos, 0).into(),
        }
    }

    /// The 1-based line the error points at.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The message without the syntax and line prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A syntax name that is not one of `go`, `gotemplate`, `mustache`,
/// `moustache` or `colon`.
#[derive(Debug, Diagnostic, Error)]
#[error("unknown template syntax `{0}`")]
#[diagnostic(
    code(stencil::syntax::unknown),
    help("Use one of: go, gotemplate, mustache, moustache, colon.")
)]
pub struct UnknownSyntaxError(pub String);

pub(crate) fn line_of(src: &str, pos: usize) -> usize {
    src.as_bytes()[..pos.min(src.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lines_are_one_based() {
        assert_eq!(line_of("abc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 2), 2);
        assert_eq!(line_of("a\nb\nc", 4), 3);
        assert_eq!(line_of("a\n", 99), 2);
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::new("mustache", "one\ntwo {{", 8, "unclosed tag".into());
        assert_eq!(err.line(), 2);
        assert_eq!(err.to_string(), "mustache template, line 2: unclosed tag");
    }
}
