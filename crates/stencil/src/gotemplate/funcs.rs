use std::{cmp::Ordering, fmt::Write, iter::repeat};

use super::value::Value;
use crate::escape;

/// Predefined functions. `and` and `or` are evaluated lazily by the executor
/// and never reach [`call`].
const BUILTINS: [&str; 16] = [
    "and", "or", "not", "len", "index", "eq", "ne", "lt", "le", "gt", "ge", "print", "println",
    "printf", "html", "urlquery",
];

pub(super) fn exists(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn failed(name: &str, message: impl std::fmt::Display) -> String {
    format!("error calling {name}: {message}")
}

fn exact<'a, const N: usize>(name: &str, args: Vec<Value<'a>>) -> Result<[Value<'a>; N], String> {
    let got = args.len();
    args.try_into()
        .map_err(|_| format!("wrong number of args for {name}: want {N} got {got}"))
}

/// Call the builtin `name` with already-evaluated arguments.
pub(super) fn call<'a>(name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, String> {
    match name {
        "not" => {
            let [arg] = exact(name, args)?;
            Ok(Value::Bool(!arg.truth()))
        }
        "len" => {
            let [arg] = exact(name, args)?;
            match arg {
                Value::Str(s) => Ok(Value::Int(s.len() as i64)),
                Value::Map(m) => Ok(Value::Int(m.len() as i64)),
                Value::Missing | Value::Nil => Err(failed(name, "len of nil pointer")),
                other => Err(failed(name, format!("len of type {}", other.type_name()))),
            }
        }
        "index" => index(args),
        "eq" => {
            let mut args = args.into_iter();
            let first = args
                .next()
                .ok_or_else(|| format!("wrong number of args for {name}: want at least 1 got 0"))?;
            let rest: Vec<Value<'_>> = args.collect();
            if rest.is_empty() {
                return Err(failed(name, "missing argument for comparison"));
            }
            for other in &rest {
                if equal(&first, other).map_err(|e| failed(name, e))? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "ne" => {
            let [a, b] = exact(name, args)?;
            Ok(Value::Bool(!equal(&a, &b).map_err(|e| failed(name, e))?))
        }
        "lt" | "le" | "gt" | "ge" => {
            let [a, b] = exact(name, args)?;
            let ord = order(&a, &b).map_err(|e| failed(name, e))?;
            Ok(Value::Bool(match name {
                "lt" => ord == Ordering::Less,
                "le" => ord != Ordering::Greater,
                "gt" => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        "print" => Ok(Value::owned(sprint(&args))),
        "println" => {
            let line: Vec<String> = args.iter().map(Value::to_string).collect();
            Ok(Value::owned(line.join(" ") + "\n"))
        }
        "printf" => {
            let mut args = args.into_iter();
            match args.next() {
                Some(Value::Str(format)) => Ok(Value::owned(sprintf(&format, &args.collect::<Vec<_>>()))),
                Some(other) => Err(format!(
                    "wrong type for value; expected string; got {}",
                    other.type_name()
                )),
                None => Err(format!("wrong number of args for {name}: want at least 1 got 0")),
            }
        }
        "html" => Ok(Value::owned(escape::html(&sprint(&args)))),
        "urlquery" => Ok(Value::owned(escape::query(&sprint(&args)))),
        _ => Err(format!("function {name:?} not defined")),
    }
}

fn index(args: Vec<Value<'_>>) -> Result<Value<'_>, String> {
    let mut args = args.into_iter();
    let mut item = args
        .next()
        .ok_or("wrong number of args for index: want at least 1 got 0")?;

    for key in args {
        item = match (item, key) {
            (Value::Map(map), Value::Str(key)) => map.get(&key).map_or(Value::Missing, Value::str),
            (Value::Map(_), key) => {
                return Err(failed(
                    "index",
                    format!("value has type {}; should be string", key.type_name()),
                ))
            }
            (Value::Str(s), Value::Int(i)) => {
                let byte = usize::try_from(i)
                    .ok()
                    .and_then(|i| s.as_bytes().get(i).copied())
                    .ok_or_else(|| failed("index", format!("index out of range: {i}")))?;
                Value::Int(byte.into())
            }
            (Value::Str(_), key) => {
                return Err(failed(
                    "index",
                    format!("cannot index string with type {}", key.type_name()),
                ))
            }
            (Value::Missing | Value::Nil, _) => return Err(failed("index", "index of untyped nil")),
            (other, _) => {
                return Err(failed(
                    "index",
                    format!("can't index item of type {}", other.type_name()),
                ))
            }
        };
    }

    Ok(item)
}

fn equal(a: &Value<'_>, b: &Value<'_>) -> Result<bool, &'static str> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Map(_), _) | (_, Value::Map(_)) => Err("non-comparable type map[string]string"),
        _ => Err("incompatible types for comparison"),
    }
}

fn order(a: &Value<'_>, b: &Value<'_>) -> Result<Ordering, &'static str> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bool(_), Value::Bool(_))
        | (Value::Missing | Value::Nil | Value::Map(_), _)
        | (_, Value::Missing | Value::Nil | Value::Map(_)) => Err("invalid type for comparison"),
        _ => Err("incompatible types for comparison"),
    }
}

/// Join like Go's `fmt.Sprint`: a space goes between two operands only when
/// neither is a string.
fn sprint(args: &[Value<'_>]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_str = |v: &Value<'_>| matches!(v, Value::Str(_));
        if i > 0 && !is_str(arg) && !is_str(&args[i - 1]) {
            out.push(' ');
        }
        let _ = write!(out, "{arg}");
    }
    out
}

/// A subset of Go's `fmt.Sprintf`: verbs `%v %s %d %q %t %%`, with an
/// optional `-` or `0` flag and a width.
fn sprintf(format: &str, args: &[Value<'_>]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut flags = String::new();
        let verb = loop {
            match chars.next() {
                Some(c @ ('-' | '0'..='9')) => flags.push(c),
                other => break other,
            }
        };
        let Some(verb) = verb else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            let _ = write!(out, "%!{verb}(MISSING)");
            continue;
        };

        let text = match (verb, arg) {
            ('v', arg) => arg.to_string(),
            ('s', Value::Str(s)) => s.to_string(),
            ('s', Value::Map(m)) => m.to_string(),
            ('d', Value::Int(n)) => n.to_string(),
            ('t', Value::Bool(b)) => b.to_string(),
            ('q', Value::Str(s)) => quote(s),
            (verb, Value::Missing | Value::Nil) => format!("%!{verb}(<nil>)"),
            (verb, arg) => format!("%!{verb}({}={arg})", arg.type_name()),
        };
        pad(&mut out, &flags, &text);
    }

    let extra: Vec<String> = args
        .map(|arg| match arg {
            Value::Missing | Value::Nil => "<nil>".to_owned(),
            arg => format!("{}={arg}", arg.type_name()),
        })
        .collect();
    if !extra.is_empty() {
        let _ = write!(out, "%!(EXTRA {})", extra.join(", "));
    }

    out
}

/// Widths above this print `%!(BADWIDTH)` instead of padding.
const MAX_WIDTH: usize = 1_000_000;

fn pad(out: &mut String, flags: &str, text: &str) {
    let left = flags.starts_with('-');
    let flags = flags.trim_start_matches('-');
    let zero = flags.starts_with('0');
    let digits = flags.trim_start_matches('0');

    let width = match digits.parse::<usize>() {
        Ok(width) if width <= MAX_WIDTH => width,
        Err(_) if digits.is_empty() => 0,
        _ => {
            out.push_str("%!(BADWIDTH)");
            out.push_str(text);
            return;
        }
    };
    let fill = width.saturating_sub(text.chars().count());

    if left {
        out.push_str(text);
        out.extend(repeat(' ').take(fill));
    } else {
        out.extend(repeat(if zero { '0' } else { ' ' }).take(fill));
        out.push_str(text);
    }
}

/// Quote like Go's `strconv.Quote`.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\x0b' => out.push_str("\\v"),
            c if c.is_control() && (c as u32) < 0x80 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::VariableMap;

    fn s(v: &str) -> Value<'_> {
        Value::str(v)
    }

    fn text(value: Result<Value<'_>, String>) -> String {
        value.unwrap().to_string()
    }

    #[test]
    fn not_and_len() {
        assert_eq!(call("not", vec![s("")]).unwrap(), Value::Bool(true));
        assert_eq!(call("len", vec![s("héllo")]).unwrap(), Value::Int(6));
        assert_eq!(
            call("not", vec![]).unwrap_err(),
            "wrong number of args for not: want 1 got 0"
        );
        assert_eq!(
            call("len", vec![Value::Int(3)]).unwrap_err(),
            "error calling len: len of type int"
        );
    }

    #[test]
    fn index_map_and_string() {
        let map: VariableMap = [("a", "xyz")].into_iter().collect();
        assert_eq!(call("index", vec![Value::Map(&map), s("a")]).unwrap(), s("xyz"));
        assert_eq!(call("index", vec![Value::Map(&map), s("b")]).unwrap(), Value::Missing);
        assert_eq!(
            call("index", vec![Value::Map(&map), s("a"), Value::Int(1)]).unwrap(),
            Value::Int(i64::from(b'y'))
        );
        assert_eq!(
            call("index", vec![s("ab"), Value::Int(2)]).unwrap_err(),
            "error calling index: index out of range: 2"
        );
        assert_eq!(
            call("index", vec![Value::Nil, s("a")]).unwrap_err(),
            "error calling index: index of untyped nil"
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(call("eq", vec![s("a"), s("b"), s("a")]).unwrap(), Value::Bool(true));
        assert_eq!(call("eq", vec![Value::Nil, s("a")]).unwrap(), Value::Bool(false));
        assert_eq!(call("ne", vec![Value::Int(1), Value::Int(2)]).unwrap(), Value::Bool(true));
        assert_eq!(call("lt", vec![Value::Int(1), Value::Int(2)]).unwrap(), Value::Bool(true));
        assert_eq!(call("ge", vec![s("b"), s("a")]).unwrap(), Value::Bool(true));
        assert_eq!(call("le", vec![s("a"), s("a")]).unwrap(), Value::Bool(true));
        assert_eq!(
            call("eq", vec![Value::Int(1), s("1")]).unwrap_err(),
            "error calling eq: incompatible types for comparison"
        );
        assert_eq!(
            call("lt", vec![Value::Bool(true), Value::Bool(false)]).unwrap_err(),
            "error calling lt: invalid type for comparison"
        );
        assert_eq!(
            call("eq", vec![s("a")]).unwrap_err(),
            "error calling eq: missing argument for comparison"
        );
    }

    #[test]
    fn print_spacing() {
        assert_eq!(text(call("print", vec![s("a"), s("b")])), "ab");
        assert_eq!(text(call("print", vec![Value::Int(1), Value::Int(2)])), "1 2");
        assert_eq!(text(call("print", vec![s("a"), Value::Int(1), s("b")])), "a1b");
        assert_eq!(text(call("print", vec![Value::Nil])), "<nil>");
        assert_eq!(text(call("println", vec![s("a"), s("b")])), "a b\n");
    }

    #[test]
    fn printf_verbs() {
        let printf = |args: Vec<Value<'static>>| text(call("printf", args));
        assert_eq!(printf(vec![s("%s=%d"), s("a"), Value::Int(3)]), "a=3");
        assert_eq!(printf(vec![s("%v %t %%"), Value::Nil, Value::Bool(true)]), "<nil> true %");
        assert_eq!(printf(vec![s("%q"), s("a\"b\n")]), r#""a\"b\n""#);
        assert_eq!(printf(vec![s("[%5s|%-4d|%03d]"), s("ab"), Value::Int(7), Value::Int(7)]), "[   ab|7   |007]");
        assert_eq!(printf(vec![s("%d"), s("x")]), "%!d(string=x)");
        assert_eq!(printf(vec![s("%s %s"), s("x")]), "x %!s(MISSING)");
        assert_eq!(printf(vec![s("%s"), s("x"), Value::Int(1)]), "x%!(EXTRA int=1)");
        assert_eq!(printf(vec![s("%99999999999999999s"), s("x")]), "%!(BADWIDTH)x");
        assert_eq!(printf(vec![s("%-1000001d"), Value::Int(5)]), "%!(BADWIDTH)5");
        assert_eq!(printf(vec![s("%1000000s"), s("x")]).len(), 1_000_000);
        assert_eq!(
            call("printf", vec![Value::Int(1)]).unwrap_err(),
            "wrong type for value; expected string; got int"
        );
    }

    #[test]
    fn escapers() {
        assert_eq!(text(call("html", vec![s("<a href='x'>")])), "&lt;a href=&#39;x&#39;&gt;");
        assert_eq!(text(call("urlquery", vec![s("a b&c")])), "a+b%26c");
    }
}
