use std::{fmt, str::FromStr};

use tracing::debug;

use crate::{colon, gotemplate, mustache, RenderError, UnknownSyntaxError, VariableMap};

/// Something that turns template text and variables into output text.
///
/// Rendering is all-or-nothing: an implementation returns the whole output
/// or an error, never a prefix of it.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, values: &VariableMap) -> Result<String, RenderError>;
}

/// The placeholder convention a template is written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// Go `text/template` actions: `{{ .name }}`.
    GoTemplate,
    /// Mustache tags: `{{name}}`.
    #[default]
    Mustache,
    /// Colon-prefixed names: `:name`.
    Colon,
}

impl Syntax {
    pub const ALL: [Syntax; 3] = [Syntax::GoTemplate, Syntax::Mustache, Syntax::Colon];

    pub const fn name(self) -> &'static str {
        match self {
            Syntax::GoTemplate => "go",
            Syntax::Mustache => "mustache",
            Syntax::Colon => "colon",
        }
    }

    pub fn renderer(self) -> &'static dyn Renderer {
        match self {
            Syntax::GoTemplate => &GoTemplateSyntax,
            Syntax::Mustache => &MustacheSyntax,
            Syntax::Colon => &ColonSyntax,
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Syntax {
    type Err = UnknownSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "go" | "gotemplate" => Ok(Syntax::GoTemplate),
            "mustache" | "moustache" => Ok(Syntax::Mustache),
            "colon" => Ok(Syntax::Colon),
            _ => Err(UnknownSyntaxError(s.to_owned())),
        }
    }
}

/// Render `template` with the given syntax.
pub fn render(syntax: Syntax, template: &str, values: &VariableMap) -> Result<String, RenderError> {
    debug!(%syntax, variables = values.len(), bytes = template.len(), "rendering template");
    syntax.renderer().render(template, values)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GoTemplateSyntax;

impl Renderer for GoTemplateSyntax {
    fn render(&self, template: &str, values: &VariableMap) -> Result<String, RenderError> {
        gotemplate::Template::parse(template)?.render(values)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MustacheSyntax;

impl Renderer for MustacheSyntax {
    fn render(&self, template: &str, values: &VariableMap) -> Result<String, RenderError> {
        Ok(mustache::Template::parse(template)?.render(values))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ColonSyntax;

impl Renderer for ColonSyntax {
    fn render(&self, template: &str, values: &VariableMap) -> Result<String, RenderError> {
        Ok(colon::render(template, values))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_mustache() {
        assert_eq!(Syntax::default(), Syntax::Mustache);
    }

    #[test]
    fn names() {
        for (name, syntax) in [
            ("go", Syntax::GoTemplate),
            ("gotemplate", Syntax::GoTemplate),
            ("GoTemplate", Syntax::GoTemplate),
            ("mustache", Syntax::Mustache),
            ("moustache", Syntax::Mustache),
            ("colon", Syntax::Colon),
        ] {
            assert_eq!(name.parse::<Syntax>().unwrap(), syntax, "{name}");
        }

        let err = "jinja".parse::<Syntax>().unwrap_err();
        assert_eq!(err.to_string(), "unknown template syntax `jinja`");
    }

    #[test]
    fn name_round_trips() {
        for syntax in Syntax::ALL {
            assert_eq!(syntax.name().parse::<Syntax>().unwrap(), syntax);
        }
    }
}
