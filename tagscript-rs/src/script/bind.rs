//! Formal parameter lists and argument binding.
//!
//! A function declares its formals as ordinary names, `name=default`
//! optionals and at most one `*rest` formal.  Binding splits the raw
//! argument source of a call, evaluates each chunk in the *caller's*
//! scope and assigns the results into a fresh child scope:
//!
//! ```text
//! formals:  name title= *more
//! call:     [f start "Chapter One" a b title=Intro]
//! scope:    name="start"  title="Intro"  more=("Chapter One" a b)
//! ```

use std::fmt;

use super::element::parse_element;
use super::engine::Engine;
use super::error::{Result, ScriptError};
use super::namespace::NameSpace;
use super::scope::ScopeId;
use super::split::{split_elements, split_keyed};
use super::value::Value;

// ── Argument syntax ───────────────────────────────────────────────────────────

/// Characters and tokens used by formals and macro expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSyntax {
    /// Introduces a parameter reference inside a macro body (`%name`).
    pub macro_prefix: String,
    /// Expands to the call's whole raw argument source.
    pub expand_all: String,
    /// Separates a formal's name from its default value.
    pub default_separator: char,
    /// Marks the formal that collects surplus positional arguments.
    pub rest_marker: char,
}

impl Default for ArgumentSyntax {
    fn default() -> Self {
        ArgumentSyntax {
            macro_prefix: "%".to_owned(),
            expand_all: "%*".to_owned(),
            default_separator: '=',
            rest_marker: '*',
        }
    }
}

// ── Formals ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Formal {
    name: String,
    default: Option<Value>,
    rest: bool,
}

impl Formal {
    pub fn required(name: &str) -> Self {
        Formal { name: name.to_owned(), default: None, rest: false }
    }

    pub fn optional(name: &str, default: impl Into<Value>) -> Self {
        Formal { name: name.to_owned(), default: Some(default.into()), rest: false }
    }

    pub fn rest(name: &str) -> Self {
        Formal { name: name.to_owned(), default: None, rest: true }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_rest(&self) -> bool {
        self.rest
    }

    /// Parse one textual formal: `name`, `name=default` or `*name`.
    pub fn parse(spec: &str, syntax: &ArgumentSyntax) -> Result<Self> {
        let spec = spec.trim();
        if let Some(name) = spec.strip_prefix(syntax.rest_marker) {
            NameSpace::check_key(name)?;
            return Ok(Formal::rest(name));
        }
        match spec.split_once(syntax.default_separator) {
            Some((name, default)) => {
                NameSpace::check_key(name)?;
                Ok(Formal::optional(name, parse_element(default)?))
            }
            None => {
                NameSpace::check_key(spec)?;
                Ok(Formal::required(spec))
            }
        }
    }
}

/// Ordered formal parameter list of a function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Formals(Vec<Formal>);

impl Formals {
    /// Formals for a built-in function.  Callers own the shape.
    pub fn new(formals: Vec<Formal>) -> Self {
        Formals(formals)
    }

    /// Validated formals for a user definition: names must be unique and
    /// at most one may collect the rest.
    pub fn checked(formals: Vec<Formal>) -> Result<Self> {
        let formals = Formals(formals);
        if formals.0.iter().filter(|f| f.rest).count() > 1 {
            return Err(formals.mismatch("more than one rest formal", ""));
        }
        for (i, f) in formals.0.iter().enumerate() {
            if formals.0[..i].iter().any(|g| g.name == f.name) {
                return Err(formals.mismatch(&format!("duplicate formal `{}`", f.name), ""));
            }
        }
        Ok(formals)
    }

    /// Formals from a list value such as `(who greeting=Hello *more)`.
    ///
    /// Positional strings are parsed with [`Formal::parse`]; keyed entries
    /// become optionals whose default is the entry's value.
    pub fn from_value(value: &Value, syntax: &ArgumentSyntax) -> Result<Self> {
        let mut out = Vec::new();
        match value {
            Value::Void | Value::Null => {}
            Value::List(items) => {
                for item in items {
                    out.push(formal_from_item(item, syntax)?);
                }
            }
            Value::Hashed(h) => {
                for (key, item) in h.entries() {
                    match key {
                        Some(key) => {
                            NameSpace::check_key(key)?;
                            out.push(Formal::optional(key, item.clone()));
                        }
                        None => out.push(formal_from_item(item, syntax)?),
                    }
                }
            }
            single => out.push(formal_from_item(single, syntax)?),
        }
        Formals::checked(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Formal> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| !f.rest && f.name == name)
    }

    fn rest_index(&self) -> Option<usize> {
        self.0.iter().position(|f| f.rest)
    }

    fn mismatch(&self, message: &str, input: &str) -> ScriptError {
        ScriptError::WrongTypeArgument {
            message: message.to_owned(),
            formals: self.to_string(),
            input: input.to_owned(),
        }
    }
}

fn formal_from_item(item: &Value, syntax: &ArgumentSyntax) -> Result<Formal> {
    match item {
        Value::Str(s) => Formal::parse(s, syntax),
        other => Err(ScriptError::InvalidName(other.to_string())),
    }
}

impl fmt::Display for Formals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, formal) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match (&formal.default, formal.rest) {
                (_, true) => write!(f, "*{}", formal.name)?,
                (Some(default), false) => write!(f, "{}={}", formal.name, default.to_source())?,
                (None, false) => f.write_str(&formal.name)?,
            }
        }
        Ok(())
    }
}

// ── Binding ───────────────────────────────────────────────────────────────────

/// Bind the raw argument source `raw` to `formals` in a new child of
/// `caller`.
///
/// Chunks are evaluated left to right in `caller`, unless `lazy`, in which
/// case they are only parsed.  Keyed chunks win over positional ones for
/// the same formal.
pub fn bind_arguments(
    engine: &mut Engine,
    formals: &Formals,
    lazy: bool,
    raw: &str,
    caller: ScopeId,
) -> Result<ScopeId> {
    let chunks = split_elements(raw)?;
    let rest_index = formals.rest_index();

    let mut positional = Vec::new();
    let mut keyed = Vec::new();
    for chunk in &chunks {
        if let Some((key, src)) = split_keyed(chunk) {
            if let Some(idx) = formals.position(key) {
                keyed.push((idx, argument(engine, src, lazy, caller)?));
                continue;
            }
            if rest_index.is_none() {
                return Err(formals.mismatch(&format!("unknown argument `{key}`"), raw));
            }
        }
        positional.push(argument(engine, chunk, lazy, caller)?);
    }

    let mut slots: Vec<Option<Value>> = vec![None; formals.len()];
    let mut values = positional.into_iter();
    for (slot, formal) in slots.iter_mut().zip(formals.iter()) {
        if formal.rest {
            continue;
        }
        match values.next() {
            Some(v) => *slot = Some(v),
            None => break,
        }
    }
    let surplus: Vec<Value> = values.collect();
    match rest_index {
        Some(idx) => slots[idx] = Some(Value::List(surplus)),
        None if !surplus.is_empty() => {
            return Err(formals.mismatch(
                &format!("{} surplus positional argument(s)", surplus.len()),
                raw,
            ));
        }
        None => {}
    }
    for (idx, value) in keyed {
        slots[idx] = Some(value);
    }

    let scope = engine.scopes_mut().child(caller);
    for (slot, formal) in slots.into_iter().zip(formals.iter()) {
        let value = match (slot, &formal.default) {
            (Some(v), _) => v,
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(formals.mismatch(&format!("missing argument `{}`", formal.name), raw));
            }
        };
        engine.scopes_mut().set(scope, formal.name.as_str(), value);
    }
    Ok(scope)
}

fn argument(engine: &mut Engine, src: &str, lazy: bool, caller: ScopeId) -> Result<Value> {
    let value = parse_element(src)?;
    if lazy {
        Ok(value)
    } else {
        engine.evaluate_in(&value, caller)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
