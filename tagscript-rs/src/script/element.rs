//! Recursive element parser.
//!
//! | Form                 | Result                                        |
//! |----------------------|-----------------------------------------------|
//! | `"…"`                | unwrap one level, parse the interior          |
//! | `[name args…]`       | [`ActionCall`] with unparsed `args`           |
//! | `(a b key=val)`      | list, or hashed list if any chunk is keyed    |
//! | `{raw}`              | [`ScriptBlock`], interior kept verbatim       |
//! | `@name`              | `[getlocal name]`                             |
//! | `$name`              | `[getglobal name]`                            |
//! | `1`, `1.5`           | integer, double (a `.` means double)          |
//! | `true`, `false`      | boolean                                       |
//! | anything else        | string                                        |

use super::error::{Result, ScriptError};
use super::split::{find_unescaped, matching_close, split_elements, split_keyed, unescape_quotes};
use super::value::{ActionCall, HashedList, ScriptBlock, Value};

/// Parse one element into a [`Value`].  Nothing is evaluated.
pub fn parse_element(src: &str) -> Result<Value> {
    let s = src.trim();

    if wrapped(s, '"', '"')? {
        return parse_element(&unescape_quotes(&s[1..s.len() - 1]));
    }
    if wrapped(s, '[', ']')? {
        return parse_action(&s[1..s.len() - 1]).map(Value::Action);
    }
    if wrapped(s, '(', ')')? {
        return parse_list(&s[1..s.len() - 1]);
    }
    if wrapped(s, '{', '}')? {
        return Ok(Value::Script(ScriptBlock::new(&s[1..s.len() - 1])));
    }
    if let Some(name) = s.strip_prefix('@').filter(|n| !n.is_empty()) {
        return Ok(Value::Action(ActionCall::new("getlocal", name)));
    }
    if let Some(name) = s.strip_prefix('$').filter(|n| !n.is_empty()) {
        return Ok(Value::Action(ActionCall::new("getglobal", name)));
    }
    Ok(parse_scalar(s))
}

/// `true` when `open…close` encloses all of `s`.  An opener whose closer
/// never arrives is malformed; adjacent groups such as `[a][b]` are not
/// wrapped.
fn wrapped(s: &str, open: char, close: char) -> Result<bool> {
    if s.len() < 2 || !s.starts_with(open) || !s.ends_with(close) {
        return Ok(false);
    }
    match matching_close(s) {
        Some(i) => Ok(i == s.len() - close.len_utf8()),
        None => Err(ScriptError::malformed(format!("unterminated `{open}` in `{s}`"))),
    }
}

/// Parse the interior of a `[…]` tag.
///
/// The name runs up to the first unescaped whitespace or opening bracket;
/// the remainder is kept as raw argument source.
pub fn parse_action(inner: &str) -> Result<ActionCall> {
    let inner = inner.trim();
    let mut escaped = false;
    let mut end = inner.len();
    for (i, ch) in inner.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
        } else if ch.is_whitespace() || matches!(ch, '[' | '(' | '{' | '"') {
            end = i;
            break;
        }
    }
    let (name, args) = inner.split_at(end);
    if name.is_empty() {
        return Err(ScriptError::malformed(format!("action without a name: `[{inner}]`")));
    }
    Ok(ActionCall::new(name, args))
}

fn parse_list(inner: &str) -> Result<Value> {
    let chunks = split_elements(inner)?;
    let mut hashed = HashedList::new();
    let mut keyed = false;
    for chunk in &chunks {
        match split_keyed(chunk) {
            Some((key, value)) => {
                keyed = true;
                hashed.insert(key, parse_element(value)?);
            }
            None => hashed.push(parse_element(chunk)?),
        }
    }
    if keyed {
        Ok(Value::Hashed(hashed))
    } else {
        Ok(Value::List(hashed.positional().cloned().collect()))
    }
}

/// Literal scalars: numbers, booleans, otherwise a string.
pub fn parse_scalar(s: &str) -> Value {
    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if looks_numeric(s) {
        if s.contains('.') {
            if let Ok(x) = s.parse::<f64>() {
                return Value::Double(x);
            }
        } else if let Ok(n) = s.parse::<i64>() {
            return Value::Int(n);
        }
    }
    Value::Str(s.to_owned())
}

/// Digits with an optional sign and at most one `.`; keeps `inf`, `NaN`
/// and `1e5` as strings.
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    !body.is_empty()
        && body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.matches('.').count() <= 1
}

/// Byte offset of the first tag opener in a unit string.
pub fn find_tag_start(s: &str) -> Option<usize> {
    find_unescaped(s, '[')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        parse_element(s).expect("parse failed")
    }

    #[test]
    fn wrapped_detection() {
        assert!(wrapped("[a [b]]", '[', ']').unwrap());
        assert!(!wrapped("[a][b]", '[', ']').unwrap());
        assert!(wrapped("\"a b\"", '"', '"').unwrap());
        assert!(!wrapped("\"a\" \"b\"", '"', '"').unwrap());
        assert!(wrapped("[a [b]", '[', ']').is_err());
    }

    #[test]
    fn scalars() {
        assert_eq!(parse("42"), Value::Int(42));
        assert_eq!(parse("-3"), Value::Int(-3));
        assert_eq!(parse("1.5"), Value::Double(1.5));
        assert_eq!(parse("true"), Value::Bool(true));
        assert_eq!(parse("hello"), Value::Str("hello".into()));
        assert_eq!(parse("inf"), Value::Str("inf".into()));
        assert_eq!(parse("1.2.3"), Value::Str("1.2.3".into()));
    }

    #[test]
    fn quoted_unwraps_once() {
        assert_eq!(parse("\"a b\""), Value::Str("a b".into()));
        assert_eq!(parse("\"12\""), Value::Int(12));
        assert_eq!(parse("\"\""), Value::Str(String::new()));
        assert_eq!(parse("\"say \\\"hi\\\"\""), Value::Str("say \"hi\"".into()));
    }

    #[test]
    fn action_call() {
        match parse("[label start \"Chapter One\"]") {
            Value::Action(call) => {
                assert_eq!(call.name(), "label");
                assert_eq!(call.args(), "start \"Chapter One\"");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn action_name_stops_at_bracket() {
        let call = parse_action("print[x]").unwrap();
        assert_eq!(call.name(), "print");
        assert_eq!(call.args(), "[x]");
    }

    #[test]
    fn empty_action_rejected() {
        assert!(parse_element("[]").is_err());
    }

    #[test]
    fn sigils_rewrite_to_getters() {
        assert_eq!(parse("@hp"), Value::Action(ActionCall::new("getlocal", "hp")));
        assert_eq!(parse("$score"), Value::Action(ActionCall::new("getglobal", "score")));
        assert_eq!(parse("@"), Value::Str("@".into()));
    }

    #[test]
    fn plain_list() {
        assert_eq!(
            parse("(1 two [three])"),
            Value::List(vec![
                Value::Int(1),
                Value::Str("two".into()),
                Value::Action(ActionCall::new("three", "")),
            ])
        );
    }

    #[test]
    fn hashed_list() {
        let v = parse("(foo=bar hoge baz=100 fuga)");
        let Value::Hashed(h) = &v else { panic!("expected hashed list, got {v:?}") };
        assert_eq!(h.get("foo"), Some(&Value::Str("bar".into())));
        assert_eq!(h.get("baz"), Some(&Value::Int(100)));
        assert_eq!(v.get_at(0), Value::Str("hoge".into()));
        assert_eq!(v.get_at(1), Value::Str("fuga".into()));
    }

    #[test]
    fn script_block_verbatim() {
        match parse("{ if (a < b) { x = \"it's\" } }") {
            Value::Script(block) => assert!(block.source().starts_with(" if (a < b)")),
            other => panic!("expected script, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_list_is_malformed() {
        assert!(matches!(parse_element("((a b)"), Err(ScriptError::MalformedInput(_))));
        assert!(matches!(parse_element("([a b)"), Err(ScriptError::MalformedInput(_))));
    }

    #[test]
    fn adjacent_tags_are_a_string() {
        assert_eq!(parse("[a][b]"), Value::Str("[a][b]".into()));
    }
}
