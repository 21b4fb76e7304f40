//! Mustache templates.
//!
//! ```plain
//! Hello {{name}}!
//! {{#admin}}You are an admin ({{.}}).{{/admin}}
//! {{^admin}}You are a regular user.{{/admin}}
//! ```
//!
//! Values are plain strings, so the context is flat: a name is looked up as a
//! whole, dots included, so `{{a.b}}` reads the key `a.b`. A section is
//! shown once when its value is a non-empty string, and inside it `{{.}}` is
//! that value. Outside any section `{{.}}` has no string to show and renders
//! as nothing, as do missing names. Sections nest at most 200 deep.
//!
//! `{{name}}` escapes HTML; `{{{name}}}` and `{{& name}}` do not. Comments
//! (`{{! … }}`) and partials (`{{> name}}`) render as nothing, and
//! `{{=<% %>=}}` switches delimiters for the rest of the template.

use tracing::trace;

use crate::{escape, ParseError, VariableMap};

mod parser;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Template {
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Variable {
        name: String,
        escape: bool,
    },
    Section {
        name: String,
        inverted: bool,
        nodes: Vec<Node>,
    },
    Partial(String),
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        parser::parse(source).map(|nodes| Self { nodes })
    }

    pub fn render(&self, values: &VariableMap) -> String {
        let mut out = String::new();
        let mut scope = Vec::new();
        render_nodes(&self.nodes, values, &mut scope, &mut out);
        out
    }

    /// Whether `key` is used by a variable or a section anywhere in the template.
    pub fn has_key(&self, key: &str) -> bool {
        fn walk(nodes: &[Node], key: &str) -> bool {
            nodes.iter().any(|node| match node {
                Node::Variable { name, .. } => name == key,
                Node::Section { name, nodes, .. } => name == key || walk(nodes, key),
                Node::Text(_) | Node::Partial(_) => false,
            })
        }
        walk(&self.nodes, key)
    }
}

fn lookup<'v>(name: &str, values: &'v VariableMap, scope: &[&'v str]) -> Option<&'v str> {
    if name == "." {
        scope.last().copied()
    } else {
        values.get(name)
    }
}

fn render_nodes<'v>(
    nodes: &[Node],
    values: &'v VariableMap,
    scope: &mut Vec<&'v str>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => match lookup(name, values, scope) {
                Some(value) if *escape => escape::html_into(out, value),
                Some(value) => out.push_str(value),
                None => trace!(name, "no value for mustache tag"),
            },
            Node::Section {
                name,
                inverted: false,
                nodes,
            } => {
                if let Some(value) = lookup(name, values, scope).filter(|v| !v.is_empty()) {
                    scope.push(value);
                    render_nodes(nodes, values, scope, out);
                    scope.pop();
                }
            }
            Node::Section {
                name,
                inverted: true,
                nodes,
            } => {
                if lookup(name, values, scope).map_or(true, str::is_empty) {
                    render_nodes(nodes, values, scope, out);
                }
            }
            Node::Partial(name) => trace!(name, "mustache partials are not loaded"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Template;
    use crate::VariableMap;

    fn render(template: &str, pairs: &[(&str, &str)]) -> String {
        let values: VariableMap = pairs.iter().copied().collect();
        Template::parse(template).unwrap().render(&values)
    }

    #[test]
    fn variables() {
        assert_eq!(render("Hello {{name}}!", &[("name", "World")]), "Hello World!");
        assert_eq!(render("Hello {{ name }}!", &[("name", "World")]), "Hello World!");
        assert_eq!(render("Hello {{name}}!", &[]), "Hello !");
    }

    #[test]
    fn escaping() {
        let pairs = [("x", "<b>&\"'")];
        assert_eq!(render("{{x}}", &pairs), "&lt;b&gt;&amp;&#34;&#39;");
        assert_eq!(render("{{{x}}}", &pairs), "<b>&\"'");
        assert_eq!(render("{{& x}}", &pairs), "<b>&\"'");
    }

    #[test]
    fn sections() {
        let template = "{{#admin}}admin: {{.}}{{/admin}}{{^admin}}guest{{/admin}}";
        assert_eq!(render(template, &[("admin", "root")]), "admin: root");
        assert_eq!(render(template, &[("admin", "")]), "guest");
        assert_eq!(render(template, &[]), "guest");
    }

    #[test]
    fn nested_sections_see_outer_values() {
        let template = "{{#a}}{{#b}}{{a}}/{{b}}/{{.}}{{/b}}{{/a}}";
        assert_eq!(render(template, &[("a", "1"), ("b", "2")]), "1/2/2");
        assert_eq!(render(template, &[("a", "1")]), "");
    }

    #[test]
    fn dotted_names_are_flat() {
        assert_eq!(render("{{db.host}}", &[("db.host", "localhost")]), "localhost");
        assert_eq!(render("{{db.host}}", &[("db", "x")]), "");
    }

    #[test]
    fn top_level_dot_is_empty() {
        assert_eq!(render("[{{.}}]", &[("a", "1")]), "[]");
    }

    #[test]
    fn comments_and_partials_render_nothing() {
        assert_eq!(render("a{{! note }}b{{> footer}}c", &[]), "abc");
    }

    #[test]
    fn standalone_lines_removed() {
        let template = "begin\n  {{#on}}\n  inside\n  {{/on}}\n{{! gone }}\nend\n";
        assert_eq!(render(template, &[("on", "y")]), "begin\n  inside\nend\n");
        assert_eq!(render(template, &[]), "begin\nend\n");
    }

    #[test]
    fn inline_sections_keep_whitespace() {
        assert_eq!(render(" {{#on}}x{{/on}} \n", &[("on", "y")]), " x \n");
    }

    #[test]
    fn delimiters() {
        let template = "{{=<% %>=}}<% name %> {{name}} <%={{ }}=%>{{name}}";
        assert_eq!(render(template, &[("name", "n")]), "n {{name}} n");
    }

    #[test]
    fn has_key() {
        let template = Template::parse("{{#a}}{{b}}{{/a}}{{c}}").unwrap();
        assert!(template.has_key("a"));
        assert!(template.has_key("b"));
        assert!(template.has_key("c"));
        assert!(!template.has_key("d"));
    }
}
