//! Macro body substitution.
//!
//! Runs over a user macro's body before it is tokenized.  With the default
//! [`ArgumentSyntax`]:
//!
//! | Sequence  | Meaning                                          |
//! |-----------|--------------------------------------------------|
//! | `%name`   | Value of parameter `name` (identifier chars)     |
//! | `%{name}` | Same, for names followed by identifier chars     |
//! | `%*`      | The call's raw argument source                   |
//! | `%%`      | Literal `%`                                      |
//!
//! Unknown names and Void/Null values expand to nothing.  A lone prefix
//! not followed by a name is kept literally.
//!
//! Inside a tag a value is spliced in source form, so `"a b"` stays one
//! argument; inside a quoted argument its quotes and backslashes are
//! escaped.  In prose the plain text form is used.

use super::bind::ArgumentSyntax;
use super::error::{Result, ScriptError};
use super::scope::{ScopeId, Scopes};
use super::split::{Nesting, ESCAPE};
use super::value::Value;

/// Where substitutions come from.
pub trait MacroParams {
    fn lookup(&self, name: &str) -> Option<Value>;

    fn raw_args(&self) -> &str;
}

/// Parameters bound in a scope chain.
pub struct ScopeParams<'a> {
    pub scopes: &'a Scopes,
    pub scope: ScopeId,
    pub raw: &'a str,
}

impl MacroParams for ScopeParams<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes
            .contains_key(self.scope, name)
            .then(|| self.scopes.get(self.scope, name))
    }

    fn raw_args(&self) -> &str {
        self.raw
    }
}

/// Expand every substitution sequence in `body`.
pub fn expand(body: &str, params: &dyn MacroParams, syntax: &ArgumentSyntax) -> Result<String> {
    let prefix = syntax.macro_prefix.as_str();
    if prefix.is_empty() {
        return Ok(body.to_owned());
    }
    let expand_all = syntax.expand_all.as_str();

    let mut out = String::with_capacity(body.len());
    let mut nest = Nesting::for_text();
    let mut rest = body;
    while let Some(pos) = rest.find(prefix) {
        out.push_str(&rest[..pos]);
        rest[..pos].chars().for_each(|ch| nest.feed(ch));
        let at = &rest[pos..];

        if !expand_all.is_empty() && at.starts_with(expand_all) {
            out.push_str(params.raw_args());
            rest = &at[expand_all.len()..];
            continue;
        }

        let after = &at[prefix.len()..];
        if let Some(tail) = after.strip_prefix(prefix) {
            out.push_str(prefix);
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('{') {
            let end = tail.find('}').ok_or_else(|| {
                ScriptError::malformed(format!("unterminated `{prefix}{{` in macro body"))
            })?;
            push_value(&mut out, params.lookup(tail[..end].trim()), &nest);
            rest = &tail[end + 1..];
        } else {
            let len = ident_len(after);
            if len == 0 {
                out.push_str(prefix);
            } else {
                push_value(&mut out, params.lookup(&after[..len]), &nest);
            }
            rest = &after[len..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn push_value(out: &mut String, value: Option<Value>, nest: &Nesting) {
    let Some(v) = value.filter(|v| !v.is_null()) else {
        return;
    };
    if !nest.in_bracket() {
        out.push_str(&v.to_string());
    } else if nest.in_quote() {
        for ch in v.to_string().chars() {
            if ch == '"' || ch == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(ch);
        }
    } else {
        out.push_str(&v.to_source());
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte length of the identifier at the start of `s`.
fn ident_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => return 0,
    }
    chars
        .find(|&(_, c)| !is_ident_continue(c))
        .map_or(s.len(), |(i, _)| i)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Params {
        vars: HashMap<&'static str, Value>,
        raw: &'static str,
    }

    impl MacroParams for Params {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }

        fn raw_args(&self) -> &str {
            self.raw
        }
    }

    fn params() -> Params {
        let mut vars = HashMap::new();
        vars.insert("who", Value::Str("Bob".into()));
        vars.insert("n", Value::Int(3));
        vars.insert("none", Value::Null);
        vars.insert("pair", Value::Str("a b".into()));
        vars.insert("odd", Value::Str("a[b".into()));
        vars.insert("said", Value::Str("say \"hi\"".into()));
        Params { vars, raw: "Bob 3" }
    }

    fn exp(body: &str) -> String {
        expand(body, &params(), &ArgumentSyntax::default()).expect("expand failed")
    }

    #[test]
    fn simple_names() {
        assert_eq!(exp("Hello, %who!"), "Hello, Bob!");
        assert_eq!(exp("[wait %n]"), "[wait 3]");
    }

    #[test]
    fn braced_names() {
        assert_eq!(exp("%{who}by"), "Bobby");
        assert!(expand("%{who", &params(), &ArgumentSyntax::default()).is_err());
    }

    #[test]
    fn all_args_and_literal_prefix() {
        assert_eq!(exp("[f %*]"), "[f Bob 3]");
        assert_eq!(exp("100%% sure"), "100% sure");
    }

    #[test]
    fn unknown_and_null_expand_to_nothing() {
        assert_eq!(exp("<%missing|%none>"), "<|>");
    }

    #[test]
    fn lone_prefix_kept() {
        assert_eq!(exp("50% off"), "50% off");
        assert_eq!(exp("end%"), "end%");
    }

    #[test]
    fn tag_arguments_keep_their_shape() {
        assert_eq!(exp("[f %pair]"), "[f \"a b\"]");
        assert_eq!(exp("[f %odd]"), "[f \"a[b\"]");
        assert_eq!(exp("[f {[g %pair]}]"), "[f {[g \"a b\"]}]");
        assert_eq!(exp("[f \"<%said>\"]"), "[f \"<say \\\"hi\\\">\"]");
    }

    #[test]
    fn prose_uses_plain_text() {
        assert_eq!(exp("%pair and %odd"), "a b and a[b");
        assert_eq!(exp("[f %pair] then %pair"), "[f \"a b\"] then a b");
    }

    #[test]
    fn custom_syntax() {
        let syntax = ArgumentSyntax {
            macro_prefix: "&".into(),
            expand_all: "&&&".into(),
            ..ArgumentSyntax::default()
        };
        let out = expand("&who: &&& &&who", &params(), &syntax).unwrap();
        assert_eq!(out, "Bob: Bob 3 &who");
    }

    #[test]
    fn scope_params() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.set(root, "who", Value::Str("Ann".into()));
        let child = scopes.child(root);
        let p = ScopeParams { scopes: &scopes, scope: child, raw: "" };
        assert_eq!(expand("hi %who", &p, &ArgumentSyntax::default()).unwrap(), "hi Ann");
    }
}
