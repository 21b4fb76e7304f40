//! Escaping shared by the mustache and Go-template renderers.

/// HTML-escape `s` into `out`, with the entities Go's `template.HTMLEscape`
/// produces.
pub(crate) fn html_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
}

pub(crate) fn html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    html_into(&mut out, s);
    out
}

/// Escape `s` for use in a URL query, like Go's `url.QueryEscape`.
pub(crate) fn query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            b => {
                out.push('%');
                out.push_str(&format!("{b:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn html_entities() {
        assert_eq!(html(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&#34;x&#34;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
        assert_eq!(html("plain"), "plain");
    }

    #[test]
    fn query_escape() {
        assert_eq!(query("a b&c=d/é"), "a+b%26c%3Dd%2F%C3%A9");
        assert_eq!(query("safe-_.~"), "safe-_.~");
    }
}
