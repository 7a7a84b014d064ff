//! Runtime value model.
//!
//! A [`Value`] is one of a closed set of kinds.  Every kind converts to the
//! primitive interpretations (`as_string`, `as_bool`, `as_int`, `as_long`,
//! `as_double`) in a throwing form and a defaulting `*_or` form, and every
//! kind answers the sequence protocol (`first`, `rest`, `cons`, `get_at`,
//! `size`), scalars behaving as one-element sequences.
//!
//! Stringifying a value and parsing the result with
//! [`parse_element`](super::element::parse_element) yields a value with the
//! same string form.

use std::fmt;
use std::rc::Rc;

use super::bind::Formals;
use super::engine::Engine;
use super::error::{Result, ScriptError};
use super::scope::ScopeId;
use super::split::quote;

// ── Kind tag ──────────────────────────────────────────────────────────────────

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Null,
    ActionCall,
    List,
    HashedList,
    Function,
    Script,
    String,
    Boolean,
    Integer,
    Double,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Void => "void",
            ValueKind::Null => "null",
            ValueKind::ActionCall => "action",
            ValueKind::List => "list",
            ValueKind::HashedList => "hashed-list",
            ValueKind::Function => "function",
            ValueKind::Script => "script",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── ActionCall ────────────────────────────────────────────────────────────────

/// A named call whose argument source is kept unparsed until bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall {
    name: Rc<str>,
    args: Rc<str>,
}

impl ActionCall {
    pub fn new(name: impl AsRef<str>, args: impl AsRef<str>) -> Self {
        ActionCall {
            name: Rc::from(name.as_ref()),
            args: Rc::from(args.as_ref().trim()),
        }
    }

    /// The no-op action attached to text-only units.
    pub fn pass() -> Self {
        ActionCall::new("pass", "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw argument source, exactly as written after the name.
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn is_pass(&self) -> bool {
        &*self.name == "pass" && self.args.is_empty()
    }

    /// Final dotted segment (`a.b.label` → `label`).
    pub fn key(&self) -> &str {
        let name: &str = &self.name;
        name.rsplit_once('.').map_or(name, |(_, k)| k)
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "[{}]", self.name)
        } else {
            write!(f, "[{} {}]", self.name, self.args)
        }
    }
}

// ── Script block ──────────────────────────────────────────────────────────────

/// Opaque `{…}` source plus a randomly generated identifier.
///
/// Identifiers are practically unique: 64 random bits, no collision check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    id: String,
    source: Rc<str>,
}

impl ScriptBlock {
    pub fn new(source: impl AsRef<str>) -> Self {
        ScriptBlock {
            id: format!("{:016x}", rand::random::<u64>()),
            source: Rc::from(source.as_ref()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

// ── Function ──────────────────────────────────────────────────────────────────

/// Host-implemented function body.  Receives the engine and the scope its
/// formals were bound into; the caller's scope is that scope's parent.
pub type NativeFn = Rc<dyn Fn(&mut Engine, ScopeId) -> Result<Value>>;

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    /// Canonical tag text, macro-expanded and run on every call.
    Macro(Rc<str>),
}

/// A callable value: name, formal parameters and body.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    formals: Formals,
    body: FunctionBody,
    lazy: bool,
}

impl Function {
    pub fn native<F>(name: &str, formals: Formals, body: F) -> Self
    where
        F: Fn(&mut Engine, ScopeId) -> Result<Value> + 'static,
    {
        Function {
            name: Rc::from(name),
            formals,
            body: FunctionBody::Native(Rc::new(body)),
            lazy: false,
        }
    }

    pub fn macro_body(name: &str, formals: Formals, body: &str) -> Self {
        Function {
            name: Rc::from(name),
            formals,
            body: FunctionBody::Macro(Rc::from(body)),
            lazy: false,
        }
    }

    /// Bind arguments parsed but unevaluated; the body evaluates them itself.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formals(&self) -> &Formals {
        &self.formals
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.body {
            FunctionBody::Native(_) => "native",
            FunctionBody::Macro(_) => "macro",
        };
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("formals", &self.formals.to_string())
            .field("body", &body)
            .field("lazy", &self.lazy)
            .finish()
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        let same_body = match (&self.body, &other.body) {
            (FunctionBody::Native(a), FunctionBody::Native(b)) => Rc::ptr_eq(a, b),
            (FunctionBody::Macro(a), FunctionBody::Macro(b)) => a == b,
            _ => false,
        };
        self.name == other.name && self.formals == other.formals && same_body
    }
}

// ── Hashed list ───────────────────────────────────────────────────────────────

/// A list mixing positional entries and `key=value` entries.
///
/// Entries keep their source order; positional ones are addressed by index
/// among themselves, keyed ones by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HashedList {
    entries: Vec<(Option<String>, Value)>,
}

impl HashedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.entries.push((None, value));
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((Some(key.into()), value));
    }

    /// Value stored under `key`; a later duplicate key wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v)
    }

    /// The `index`-th positional entry.
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.positional().nth(index)
    }

    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter(|(k, _)| k.is_none()).map(|(_, v)| v)
    }

    /// Every entry in source order, with its key if it has one.
    pub fn entries(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_deref(), v))
    }

    pub fn positional_len(&self) -> usize {
        self.positional().count()
    }

    fn without_first_positional(&self) -> HashedList {
        let mut dropped = false;
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| {
                if k.is_none() && !dropped {
                    dropped = true;
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        HashedList { entries }
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value was produced.
    Void,
    /// A lookup found nothing.
    Null,
    Action(ActionCall),
    List(Vec<Value>),
    Hashed(HashedList),
    Function(Function),
    Script(ScriptBlock),
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Void
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Null => ValueKind::Null,
            Value::Action(_) => ValueKind::ActionCall,
            Value::List(_) => ValueKind::List,
            Value::Hashed(_) => ValueKind::HashedList,
            Value::Function(_) => ValueKind::Function,
            Value::Script(_) => ValueKind::Script,
            Value::Str(_) => ValueKind::String,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn not_convertible(&self, target: &'static str) -> ScriptError {
        ScriptError::NotConvertible {
            kind: self.kind().name(),
            value: self.to_string(),
            target,
        }
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    /// String form.  Fails only for Void and Null.
    pub fn as_string(&self) -> Result<String> {
        match self {
            Value::Void | Value::Null => Err(self.not_convertible("string")),
            Value::Str(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }

    pub fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|_| default.to_owned())
    }

    /// Booleans, non-zero numbers, and the strings `true`/`false`.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Double(x) => Ok(*x != 0.0),
            Value::Str(s) => match s.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(self.not_convertible("boolean")),
            },
            _ => Err(self.not_convertible("boolean")),
        }
    }

    pub fn as_bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }

    /// 64-bit integer.  Doubles convert only when integral and in range.
    pub fn as_long(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Double(x) if x.is_finite() && x.fract() == 0.0 => {
                if *x >= i64::MIN as f64 && *x < i64::MAX as f64 {
                    Ok(*x as i64)
                } else {
                    Err(self.not_convertible("long"))
                }
            }
            Value::Str(s) => s.trim().parse().map_err(|_| self.not_convertible("long")),
            _ => Err(self.not_convertible("long")),
        }
    }

    pub fn as_long_or(&self, default: i64) -> i64 {
        self.as_long().unwrap_or(default)
    }

    /// 32-bit integer.
    pub fn as_int(&self) -> Result<i32> {
        let n = self.as_long().map_err(|_| self.not_convertible("int"))?;
        i32::try_from(n).map_err(|_| self.not_convertible("int"))
    }

    pub fn as_int_or(&self, default: i32) -> i32 {
        self.as_int().unwrap_or(default)
    }

    pub fn as_double(&self) -> Result<f64> {
        match self {
            Value::Int(n) => Ok(*n as f64),
            Value::Double(x) => Ok(*x),
            Value::Str(s) => s.trim().parse().map_err(|_| self.not_convertible("double")),
            _ => Err(self.not_convertible("double")),
        }
    }

    pub fn as_double_or(&self, default: f64) -> f64 {
        self.as_double().unwrap_or(default)
    }

    // ── Sequence protocol ─────────────────────────────────────────────────────

    /// Number of elements: lists count their (positional) entries, Void and
    /// Null are empty, everything else is a one-element sequence.
    pub fn size(&self) -> usize {
        match self {
            Value::Void | Value::Null => 0,
            Value::List(items) => items.len(),
            Value::Hashed(h) => h.positional_len(),
            _ => 1,
        }
    }

    /// Element at `index`, or Null when out of range.
    pub fn get_at(&self, index: usize) -> Value {
        match self {
            Value::Void | Value::Null => Value::Null,
            Value::List(items) => items.get(index).cloned().unwrap_or(Value::Null),
            Value::Hashed(h) => h.get_at(index).cloned().unwrap_or(Value::Null),
            scalar if index == 0 => scalar.clone(),
            _ => Value::Null,
        }
    }

    pub fn first(&self) -> Value {
        self.get_at(0)
    }

    /// Everything after the first element.
    pub fn rest(&self) -> Value {
        match self {
            Value::List(items) => Value::List(items.iter().skip(1).cloned().collect()),
            Value::Hashed(h) => Value::Hashed(h.without_first_positional()),
            _ => Value::List(Vec::new()),
        }
    }

    /// A new sequence with `head` in front of this one.
    pub fn cons(&self, head: Value) -> Value {
        match self {
            Value::Void | Value::Null => Value::List(vec![head]),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len() + 1);
                out.push(head);
                out.extend(items.iter().cloned());
                Value::List(out)
            }
            Value::Hashed(h) => {
                let mut entries = Vec::with_capacity(h.entries.len() + 1);
                entries.push((None, head));
                entries.extend(h.entries.iter().cloned());
                Value::Hashed(HashedList { entries })
            }
            scalar => Value::List(vec![head, scalar.clone()]),
        }
    }

    /// Source form of this value as a list element or argument chunk.
    ///
    /// Strings that would not survive reparsing as a single chunk are quoted.
    pub fn to_source(&self) -> String {
        match self {
            Value::Str(s) if needs_quoting(s) => quote(s),
            other => other.to_string(),
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '[' | ']' | '(' | ')' | '{' | '}'))
        || s.starts_with(['@', '$'])
        || super::split::split_keyed(s).is_some()
}

/// Decimal form that always reparses as a double (`1` → `1.0`).
pub fn format_double(x: f64) -> String {
    let mut s = format!("{x}");
    if x.is_finite() && !s.contains('.') {
        s.push_str(".0");
    }
    s
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Null => f.write_str("null"),
            Value::Action(call) => write!(f, "{call}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_source).collect();
                write!(f, "({})", parts.join(" "))
            }
            Value::Hashed(h) => {
                let parts: Vec<String> = h
                    .entries
                    .iter()
                    .map(|(k, v)| match k {
                        Some(k) => format!("{k}={}", v.to_source()),
                        None => v.to_source(),
                    })
                    .collect();
                write!(f, "({})", parts.join(" "))
            }
            Value::Function(func) => f.write_str(func.name()),
            Value::Script(block) => write!(f, "{{{}}}", block.source()),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(x) => f.write_str(&format_double(*x)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<ActionCall> for Value {
    fn from(call: ActionCall) -> Self {
        Value::Action(call)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Double(3.25).to_string(), "3.25");
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
    }

    #[test]
    fn display_action_call() {
        assert_eq!(ActionCall::new("br", "").to_string(), "[br]");
        assert_eq!(ActionCall::new("label", " a \"t\" ").to_string(), "[label a \"t\"]");
    }

    #[test]
    fn display_list_quotes_awkward_strings() {
        let v = Value::List(vec![Value::Int(1), Value::Str("a b".into()), Value::Str("".into())]);
        assert_eq!(v.to_string(), "(1 \"a b\" \"\")");
    }

    #[test]
    fn as_bool_conversions() {
        assert!(Value::Bool(true).as_bool().unwrap());
        assert!(!Value::Int(0).as_bool().unwrap());
        assert!(Value::Str("true".into()).as_bool().unwrap());
        assert!(Value::Str("yes".into()).as_bool().is_err());
        assert!(Value::Null.as_bool_or(true));
    }

    #[test]
    fn as_int_range_checked() {
        assert_eq!(Value::Int(42).as_int().unwrap(), 42);
        assert!(Value::Int(i64::MAX).as_int().is_err());
        assert_eq!(Value::Int(i64::MAX).as_long().unwrap(), i64::MAX);
        assert_eq!(Value::Double(4.0).as_long().unwrap(), 4);
        assert!(Value::Double(4.5).as_long().is_err());
        assert_eq!(Value::Str(" 12 ".into()).as_int().unwrap(), 12);
        assert_eq!(Value::Str("abc".into()).as_int_or(-1), -1);
    }

    #[test]
    fn as_double_conversions() {
        assert_eq!(Value::Int(2).as_double().unwrap(), 2.0);
        assert!(Value::Bool(true).as_double().is_err());
        assert_eq!(Value::Void.as_double_or(0.5), 0.5);
    }

    #[test]
    fn void_and_null_have_no_string() {
        assert!(matches!(
            Value::Void.as_string(),
            Err(ScriptError::NotConvertible { target: "string", .. })
        ));
        assert_eq!(Value::Null.as_string_or("-"), "-");
    }

    #[test]
    fn scalars_are_singleton_sequences() {
        let v = Value::Int(5);
        assert_eq!(v.size(), 1);
        assert_eq!(v.first(), Value::Int(5));
        assert_eq!(v.get_at(1), Value::Null);
        assert_eq!(v.rest(), Value::List(vec![]));
        assert_eq!(v.cons(Value::Int(4)), Value::List(vec![Value::Int(4), Value::Int(5)]));
    }

    #[test]
    fn void_is_empty_sequence() {
        assert_eq!(Value::Void.size(), 0);
        assert_eq!(Value::Void.first(), Value::Null);
        assert_eq!(Value::Null.cons(Value::Int(1)), Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn list_sequence_protocol() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(v.size(), 3);
        assert_eq!(v.first(), Value::Int(1));
        assert_eq!(v.rest(), Value::List(vec![Value::Int(2), Value::Int(3)]));
        assert_eq!(v.get_at(2), Value::Int(3));
    }

    #[test]
    fn hashed_list_positional_and_keyed() {
        let mut h = HashedList::new();
        h.insert("foo", Value::from("bar"));
        h.push(Value::from("hoge"));
        h.push(Value::from("fuga"));
        let v = Value::Hashed(h.clone());
        assert_eq!(h.get("foo"), Some(&Value::from("bar")));
        assert_eq!(v.size(), 2);
        assert_eq!(v.first(), Value::from("hoge"));
        let rest = v.rest();
        assert_eq!(rest.first(), Value::from("fuga"));
        match rest {
            Value::Hashed(r) => assert_eq!(r.get("foo"), Some(&Value::from("bar"))),
            other => panic!("expected hashed list, got {other:?}"),
        }
        assert_eq!(v.to_string(), "(foo=bar hoge fuga)");
    }

    #[test]
    fn script_ids_differ() {
        let a = ScriptBlock::new("x");
        let b = ScriptBlock::new("x");
        assert_ne!(a.id(), b.id());
        assert_eq!(Value::Script(a).to_string(), "{x}");
    }

    #[test]
    fn action_key_is_last_segment() {
        assert_eq!(ActionCall::new("a.b.label", "").key(), "label");
        assert_eq!(ActionCall::new("label", "x").key(), "label");
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Int(0).kind().name(), "integer");
        assert_eq!(Value::Hashed(HashedList::new()).kind(), ValueKind::HashedList);
        assert_eq!(Value::Action(ActionCall::pass()).kind().to_string(), "action");
    }
}
