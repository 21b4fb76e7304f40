//! Colon syntax: every `:key` is replaced by the value of `key`.
//!
//! ```plain
//! server :host listening on :port
//! ```
//!
//! There are no delimiters, so one key may be a prefix of another (`:a` and
//! `:abc`). At each `:` the longest matching key wins, and the replacement is
//! never scanned again. Text that matches no key is copied as-is, which makes
//! this syntax impossible to fail.

use tracing::trace;

use crate::VariableMap;

/// Render `template` against `values`.
pub fn render(template: &str, values: &VariableMap) -> String {
    let mut keys: Vec<(&str, &str)> = values.iter().filter(|(k, _)| !k.is_empty()).collect();
    // Stable sort keeps key order among equal lengths.
    keys.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(colon) = rest.find(':') {
        out.push_str(&rest[..colon]);
        let after = &rest[colon + 1..];

        match keys.iter().find(|(key, _)| after.starts_with(key)) {
            Some((key, value)) => {
                trace!(key, "colon substitution");
                out.push_str(value);
                rest = &after[key.len()..];
            }
            None => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}

#[cfg(test)]
mod test {
    use super::render;
    use crate::VariableMap;

    fn vars(pairs: &[(&str, &str)]) -> VariableMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn no_keys_is_identity() {
        let values = vars(&[("name", "x"), ("port", "80")]);
        for template in ["", "hello world", "a: b : c", "::", "name port", "ends with:"] {
            assert_eq!(render(template, &values), template);
        }
    }

    #[test]
    fn single_key() {
        assert_eq!(render(":k", &vars(&[("k", "value")])), "value");
    }

    #[test]
    fn every_occurrence() {
        let values = vars(&[("host", "example.org"), ("port", "8080")]);
        assert_eq!(
            render("http://:host::port/ and :host again", &values),
            "http://example.org:8080/ and example.org again"
        );
    }

    #[test]
    fn longest_key_first() {
        let values = vars(&[("a", "1"), ("ab", "2")]);
        assert_eq!(render(":ab", &values), "2");
        assert_eq!(render(":a:ab:abc", &values), "122c");
    }

    #[test]
    fn replacement_not_rescanned() {
        let values = vars(&[("a", ":b"), ("b", "nope")]);
        assert_eq!(render(":a", &values), ":b");
    }

    #[test]
    fn unmatched_passes_through() {
        assert_eq!(render("time: :when", &VariableMap::new()), "time: :when");
    }

    #[test]
    fn multibyte() {
        let values = vars(&[("ville", "Montréal"), ("é", "e")]);
        assert_eq!(render("à :ville, :é:", &values), "à Montréal, e:");
    }
}
