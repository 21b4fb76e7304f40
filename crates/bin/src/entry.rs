use std::{
    fs,
    io::{self, Read, Write},
};

use log::{debug, info};

use crate::{
    args::{Invocation, TemplateSource},
    errors::StencilError,
};

/// Read the whole template, from the file or from `stdin`.
pub fn read_template(source: &TemplateSource, stdin: impl Read) -> Result<String, StencilError> {
    let read = match source {
        TemplateSource::File(path) => fs::read_to_string(path),
        TemplateSource::Stdin => io::read_to_string(stdin),
    };
    read.map_err(|err| StencilError::input(source, err))
}

/// Read the template, render it, and write the result to `out`.
///
/// Nothing is written unless rendering succeeds.
pub fn run(invocation: Invocation, stdin: impl Read, out: &mut impl Write) -> Result<(), StencilError> {
    let Invocation {
        source,
        syntax,
        variables,
        ..
    } = invocation;

    let template = read_template(&source, stdin)?;
    info!("Rendering {source} as {syntax} template");
    debug!("Variables: {variables}");

    let rendered = stencil::render(syntax, &template, &variables)?;
    write_all(out, &rendered)
}

/// Write `text` to standard output.
pub fn print(text: &str) -> Result<(), StencilError> {
    write_all(&mut io::stdout().lock(), text)
}

fn write_all(out: &mut impl Write, text: &str) -> Result<(), StencilError> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(StencilError::Output)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use log::LevelFilter;
    use stencil::{RenderError, Syntax, VariableMap};
    use tempfile::NamedTempFile;

    use super::*;

    fn invocation(source: TemplateSource, syntax: Syntax, pairs: &[(&str, &str)]) -> Invocation {
        Invocation {
            source,
            syntax,
            variables: pairs.iter().copied().collect::<VariableMap>(),
            log_level: LevelFilter::Off,
            json_output: false,
        }
    }

    #[test]
    fn renders_from_stdin() {
        let mut out = Vec::new();
        run(
            invocation(TemplateSource::Stdin, Syntax::Colon, &[("who", "you")]),
            "hi :who\n".as_bytes(),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, b"hi you\n");
    }

    #[test]
    fn renders_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Hello {{{{.name}}}}!").unwrap();

        let mut out = Vec::new();
        run(
            invocation(
                TemplateSource::File(file.path().to_owned()),
                Syntax::GoTemplate,
                &[("name", "World")],
            ),
            io::empty(),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, b"Hello World!");
    }

    #[test]
    fn failures_write_nothing() {
        let mut out = Vec::new();
        let err = run(
            invocation(TemplateSource::Stdin, Syntax::Mustache, &[]),
            "ok {{#open}}".as_bytes(),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::Render(RenderError::InvalidTemplate(_))), "{err:?}");
        assert!(out.is_empty());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.tmpl");

        let err = read_template(&TemplateSource::File(path), io::empty()).unwrap_err();
        assert!(matches!(err, StencilError::InputRead { .. }), "{err:?}");
        assert!(err.to_string().contains("nope.tmpl"), "{err}");
    }
}
