use std::{borrow::Cow, fmt};

use crate::VariableMap;

/// A value flowing through a Go template pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Value<'a> {
    /// A key that is not in the map. Prints as `<no value>`.
    Missing,
    Nil,
    Bool(bool),
    Int(i64),
    Str(Cow<'a, str>),
    Map(&'a VariableMap),
}

impl<'a> Value<'a> {
    pub(super) fn str(s: &'a str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }

    pub(super) fn owned(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }

    /// Go truthiness: false, 0, nil and empty strings or maps are false.
    pub(super) fn truth(&self) -> bool {
        match self {
            Value::Missing | Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Function arguments see a missing key as plain nil.
    pub(super) fn or_nil(self) -> Self {
        match self {
            Value::Missing => Value::Nil,
            value => value,
        }
    }

    pub(super) fn type_name(&self) -> &'static str {
        match self {
            Value::Missing | Value::Nil => "<nil>",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Map(_) => "map[string]string",
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("<no value>"),
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Map(m) => write!(f, "{m}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Value;
    use crate::VariableMap;

    #[test]
    fn truth() {
        let empty = VariableMap::new();
        let full: VariableMap = [("a", "1")].into_iter().collect();

        for falsy in [
            Value::Missing,
            Value::Nil,
            Value::Bool(false),
            Value::Int(0),
            Value::str(""),
            Value::Map(&empty),
        ] {
            assert!(!falsy.truth(), "{falsy:?}");
        }
        for truthy in [Value::Bool(true), Value::Int(-1), Value::str("0"), Value::Map(&full)] {
            assert!(truthy.truth(), "{truthy:?}");
        }
    }

    #[test]
    fn display() {
        let map: VariableMap = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(Value::Missing.to_string(), "<no value>");
        assert_eq!(Value::Nil.to_string(), "<nil>");
        assert_eq!(Value::Map(&map).to_string(), "map[a:1 b:2]");
        assert_eq!(Value::Int(-3).to_string(), "-3");
    }
}
