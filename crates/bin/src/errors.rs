use std::{
    io::{self, Write},
    process::{ExitCode, Termination},
};

use miette::{Diagnostic, Report};
use stencil::{RenderError, UnknownSyntaxError};
use thiserror::Error;
use tracing::debug;

use crate::args::TemplateSource;

/// A command line that could not be bound.
#[derive(Debug, Diagnostic, Error)]
pub enum BindError {
    /// A flag or a variable name is the last token and has no value.
    #[error("missing value for `{0}`")]
    #[diagnostic(
        code(stencil::args::missing_value),
        help("Give the value as the next argument, or inline as `name=value`.")
    )]
    MissingValue(String),

    #[error("empty variable name in `{0}`")]
    #[diagnostic(code(stencil::args::empty_key))]
    EmptyKey(String),

    /// A flag that takes no value was written as `--flag=value`.
    #[error("`{0}` does not take a value")]
    #[diagnostic(code(stencil::args::unexpected_value))]
    UnexpectedValue(String),

    #[error("invalid entry `{0}` in --variables, expected `key=value`")]
    #[diagnostic(code(stencil::args::invalid_variables))]
    InvalidVariables(String),

    #[error("invalid log level `{0}`")]
    #[diagnostic(
        code(stencil::args::invalid_log_level),
        help("Use one of: off, error, warn, info, debug, trace.")
    )]
    InvalidLogLevel(String),
}

/// Error kinds emitted by the stencil binary.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum StencilError {
    /// The command line could not be bound.
    ///
    /// - Code: `stencil::args::*`
    /// - Exit: 65 for a missing value, 66 otherwise
    #[error(transparent)]
    #[diagnostic(transparent)]
    Bind(#[from] BindError),

    /// `--type` named a syntax that does not exist.
    ///
    /// - Code: `stencil::syntax::unknown`
    /// - Exit: 68
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownSyntax(#[from] UnknownSyntaxError),

    /// The template failed to parse or to execute.
    ///
    /// - Code: `stencil::template::parse` or `stencil::template::exec`
    /// - Exit: 67
    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    /// The template file or standard input could not be read.
    ///
    /// - Code: `stencil::input`
    /// - Exit: 74
    #[error("failed to read template from {source_name}: {err}")]
    #[diagnostic(severity(error), code(stencil::input))]
    InputRead {
        source_name: String,
        #[source]
        err: io::Error,
    },

    /// The rendered text could not be written to standard output.
    ///
    /// - Code: `stencil::output`
    /// - Exit: 75
    #[error("failed to write output: {0}")]
    #[diagnostic(severity(error), code(stencil::output))]
    Output(#[source] io::Error),
}

impl StencilError {
    pub fn input(source: &TemplateSource, err: io::Error) -> Self {
        Self::InputRead {
            source_name: source.to_string(),
            err,
        }
    }

    fn exit_number(&self) -> u8 {
        use StencilError::*;
        let code: u8 = match self {
            Bind(BindError::MissingValue(_)) => 65,
            Bind(_) => 66,
            Render(_) => 67,
            UnknownSyntax(_) => 68,
            InputRead { .. } => 74,
            Output(_) => 75,
        };

        // reserved codes
        debug_assert!(code != 64 && code != 16 && code != 1 && code != 2 && code != 0);

        code
    }

    /// The recommended exit code for this error.
    ///
    /// This will never output:
    /// - 0 (success)
    /// - 1 and 2 (catchall and shell)
    /// - 16 and 64 (generic errors)
    pub fn exit_code(&self) -> ExitCode {
        self.exit_number().into()
    }
}

impl Termination for StencilError {
    fn report(self) -> ExitCode {
        let code = self.exit_code();
        writeln!(io::stderr(), "stencil: {self}").ok();
        debug!("Fatal error:\n{:?}", Report::new(self));
        code
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_numbers() {
        let missing = StencilError::from(BindError::MissingValue("--file".into()));
        assert_eq!(missing.exit_number(), 65);

        let empty = StencilError::from(BindError::EmptyKey("=x".into()));
        assert_eq!(empty.exit_number(), 66);

        let unknown = StencilError::from(UnknownSyntaxError("jinja".into()));
        assert_eq!(unknown.exit_number(), 68);

        let input = StencilError::input(&TemplateSource::Stdin, io::ErrorKind::NotFound.into());
        assert_eq!(input.exit_number(), 74);
        assert!(input.to_string().starts_with("failed to read template from standard input"));
    }

    #[test]
    fn bind_messages() {
        assert_eq!(
            BindError::MissingValue("--name".into()).to_string(),
            "missing value for `--name`"
        );
        assert_eq!(
            BindError::InvalidVariables("oops".into()).to_string(),
            "invalid entry `oops` in --variables, expected `key=value`"
        );
    }
}
