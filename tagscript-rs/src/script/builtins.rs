//! The `std` function package.
//!
//! Every native function receives the engine and the scope its formals were
//! bound into.  The caller's scope is that scope's parent; `getlocal`,
//! `setlocal` and the lazy functions work there.

use super::bind::{Formal, Formals};
use super::context::FunctionPackage;
use super::element::parse_scalar;
use super::engine::Engine;
use super::error::{Result, ScriptError};
use super::scope::ScopeId;
use super::tokenizer::{label_formals, LABEL};
use super::value::{Function, Value};

/// Namespace the standard package is imported into.
pub const STD: &str = "std";

/// Namespace user macros are defined in.
pub const USER: &str = "user";

pub fn std_package() -> FunctionPackage {
    FunctionPackage::new(STD)
        // ── Flow ─────────────────────────────────────────────────────────────
        .with(Function::native("pass", rest("args"), |_, _| Ok(Value::Void)))
        .with(Function::native(LABEL, label_formals(), |_, _| Ok(Value::Void)))
        .with(Function::native("do", req(&["script"]), |e, s| {
            let script = arg(e, s, "script");
            e.force(&script, caller(e, s))
        }))
        .with(
            Function::native(
                "if",
                Formals::new(vec![
                    Formal::required("cond"),
                    Formal::required("then"),
                    Formal::optional("else", Value::Void),
                ]),
                |e, s| {
                    let at = caller(e, s);
                    let cond = e.evaluate_in(&arg(e, s, "cond"), at)?;
                    let branch = if cond.as_bool_or(false) { "then" } else { "else" };
                    e.force(&arg(e, s, branch), at)
                },
            )
            .lazy(),
        )
        .with(Function::native("and", rest("terms"), |e, s| short_circuit(e, s, false)).lazy())
        .with(Function::native("or", rest("terms"), |e, s| short_circuit(e, s, true)).lazy())
        .with(Function::native("not", req(&["value"]), |e, s| {
            Ok(Value::Bool(!arg(e, s, "value").as_bool()?))
        }))
        // ── Variables ────────────────────────────────────────────────────────
        .with(Function::native("getlocal", req(&["name"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            Ok(e.scopes().get(caller(e, s), &name))
        }))
        .with(Function::native("setlocal", req(&["name", "value"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            let value = arg(e, s, "value");
            let at = caller(e, s);
            e.scopes_mut().set(at, name, value.clone());
            Ok(value)
        }))
        .with(Function::native("getglobal", req(&["name"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            Ok(e.globals().get(&name).cloned().unwrap_or(Value::Null))
        }))
        .with(Function::native("setglobal", req(&["name", "value"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            let value = arg(e, s, "value");
            e.globals_mut().define(&name, value.clone())?;
            Ok(value)
        }))
        .with(Function::native("seal", req(&["name"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            e.globals_mut().seal(&name)?;
            Ok(Value::Void)
        }))
        .with(Function::native("unseal", req(&["name"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            e.globals_mut().un_seal(&name);
            Ok(Value::Void)
        }))
        .with(Function::native("defined", req(&["name"]), |e, s| {
            let name = str_arg(e, s, "name")?;
            Ok(Value::Bool(e.context().resolve(&name).is_ok()))
        }))
        .with(Function::native("macro", req(&["name", "formals", "body"]), define_macro))
        // ── Comparison ───────────────────────────────────────────────────────
        .with(Function::native("eq", req(&["a", "b"]), |e, s| {
            Ok(Value::Bool(equal(&arg(e, s, "a"), &arg(e, s, "b"))))
        }))
        .with(Function::native("ne", req(&["a", "b"]), |e, s| {
            Ok(Value::Bool(!equal(&arg(e, s, "a"), &arg(e, s, "b"))))
        }))
        .with(Function::native("lt", req(&["a", "b"]), |e, s| {
            Ok(Value::Bool(compare(&arg(e, s, "a"), &arg(e, s, "b")).is_lt()))
        }))
        .with(Function::native("gt", req(&["a", "b"]), |e, s| {
            Ok(Value::Bool(compare(&arg(e, s, "a"), &arg(e, s, "b")).is_gt()))
        }))
        // ── Arithmetic ───────────────────────────────────────────────────────
        .with(Function::native("add", rest("values"), |e, s| {
            fold(&arg(e, s, "values"), Num::Int(0), i64::checked_add, |a, b| a + b)
        }))
        .with(Function::native("mul", rest("values"), |e, s| {
            fold(&arg(e, s, "values"), Num::Int(1), i64::checked_mul, |a, b| a * b)
        }))
        .with(Function::native("sub", req(&["a", "b"]), |e, s| {
            let (a, b) = (num(&arg(e, s, "a"))?, num(&arg(e, s, "b"))?);
            Ok(combine(a, b, i64::checked_sub, |a, b| a - b).into())
        }))
        .with(Function::native("div", req(&["a", "b"]), |e, s| {
            let (a, b) = (num(&arg(e, s, "a"))?, num(&arg(e, s, "b"))?);
            divide(a, b)
        }))
        // ── Strings and sequences ────────────────────────────────────────────
        .with(Function::native("concat", rest("parts"), |e, s| {
            let parts = arg(e, s, "parts");
            let mut out = String::new();
            for i in 0..parts.size() {
                out.push_str(&parts.get_at(i).to_string());
            }
            Ok(Value::Str(out))
        }))
        .with(Function::native("list", rest("items"), |e, s| Ok(arg(e, s, "items"))))
        .with(Function::native("size", req(&["seq"]), |e, s| {
            Ok(Value::Int(arg(e, s, "seq").size() as i64))
        }))
        .with(Function::native("first", req(&["seq"]), |e, s| Ok(arg(e, s, "seq").first())))
        .with(Function::native("rest", req(&["seq"]), |e, s| Ok(arg(e, s, "seq").rest())))
        .with(Function::native("cons", req(&["head", "seq"]), |e, s| {
            Ok(arg(e, s, "seq").cons(arg(e, s, "head")))
        }))
        .with(Function::native("get", req(&["seq", "key"]), |e, s| {
            let seq = arg(e, s, "seq");
            Ok(match (&seq, arg(e, s, "key")) {
                (_, Value::Int(i)) => usize::try_from(i).map_or(Value::Null, |i| seq.get_at(i)),
                (Value::Hashed(h), key) => h.get(&key.as_string()?).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }))
        .with(Function::native("type", req(&["value"]), |e, s| {
            Ok(Value::Str(arg(e, s, "value").kind().name().to_owned()))
        }))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn req(names: &[&str]) -> Formals {
    Formals::new(names.iter().map(|n| Formal::required(n)).collect())
}

fn rest(name: &str) -> Formals {
    Formals::new(vec![Formal::rest(name)])
}

fn arg(e: &Engine, scope: ScopeId, name: &str) -> Value {
    e.scopes().get(scope, name)
}

fn str_arg(e: &Engine, scope: ScopeId, name: &str) -> Result<String> {
    arg(e, scope, name).as_string()
}

fn caller(e: &Engine, scope: ScopeId) -> ScopeId {
    e.scopes().parent(scope).unwrap_or(scope)
}

/// `and` stops at the first false term, `or` at the first true one.
fn short_circuit(e: &mut Engine, s: ScopeId, stop_on: bool) -> Result<Value> {
    let terms = arg(e, s, "terms");
    let at = caller(e, s);
    for i in 0..terms.size() {
        if e.evaluate_in(&terms.get_at(i), at)?.as_bool_or(false) == stop_on {
            return Ok(Value::Bool(stop_on));
        }
    }
    Ok(Value::Bool(!stop_on))
}

fn define_macro(e: &mut Engine, s: ScopeId) -> Result<Value> {
    let name = str_arg(e, s, "name")?;
    let formals = Formals::from_value(&arg(e, s, "formals"), e.argument_syntax())?;
    let body = match arg(e, s, "body") {
        Value::Script(block) => block.source().to_owned(),
        Value::Str(text) => text,
        other => {
            return Err(ScriptError::WrongTypeArgument {
                message: format!("macro body must be a script block, got {}", other.kind()),
                formals: "name formals body".to_owned(),
                input: other.to_string(),
            })
        }
    };
    let function = Function::macro_body(&name, formals, &body);
    e.define_user(&name, Value::Function(function))?;
    Ok(Value::Void)
}

// ── Numbers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Double(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Double(x) => x,
        }
    }
}

impl From<Num> for Value {
    fn from(n: Num) -> Self {
        match n {
            Num::Int(n) => Value::Int(n),
            Num::Double(x) => Value::Double(x),
        }
    }
}

fn num(v: &Value) -> Result<Num> {
    match v {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Double(x) => Ok(Num::Double(*x)),
        Value::Str(s) => match parse_scalar(s.trim()) {
            Value::Int(n) => Ok(Num::Int(n)),
            Value::Double(x) => Ok(Num::Double(x)),
            _ => v.as_double().map(Num::Double),
        },
        other => other.as_double().map(Num::Double),
    }
}

type IntOp = fn(i64, i64) -> Option<i64>;
type FloatOp = fn(f64, f64) -> f64;

/// Integer arithmetic while both sides are integers and nothing overflows.
fn combine(a: Num, b: Num, int_op: IntOp, float_op: FloatOp) -> Num {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y)
            .map_or_else(|| Num::Double(float_op(x as f64, y as f64)), Num::Int),
        _ => Num::Double(float_op(a.to_f64(), b.to_f64())),
    }
}

fn fold(values: &Value, init: Num, int_op: IntOp, float_op: FloatOp) -> Result<Value> {
    let mut acc = init;
    for i in 0..values.size() {
        acc = combine(acc, num(&values.get_at(i))?, int_op, float_op);
    }
    Ok(acc.into())
}

/// Exact integer quotients stay integers; everything else is a double.
fn divide(a: Num, b: Num) -> Result<Value> {
    if b.to_f64() == 0.0 {
        return Err(ScriptError::WrongTypeArgument {
            message: "division by zero".to_owned(),
            formals: "a b".to_owned(),
            input: format!("{} {}", Value::from(a), Value::from(b)),
        });
    }
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        if x.checked_rem(y) == Some(0) {
            if let Some(q) = x.checked_div(y) {
                return Ok(Value::Int(q));
            }
        }
    }
    Ok(Value::Double(a.to_f64() / b.to_f64()))
}

/// Numeric when both sides are numbers, by string form otherwise.
fn equal(a: &Value, b: &Value) -> bool {
    match (num_only(a), num_only(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
        (Some(x), Some(y)) => x.to_f64() == y.to_f64(),
        _ => a.to_string() == b.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (num_only(a), num_only(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => x.cmp(&y),
        (Some(x), Some(y)) => x.to_f64().total_cmp(&y.to_f64()),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn num_only(v: &Value) -> Option<Num> {
    match v {
        Value::Int(_) | Value::Double(_) | Value::Str(_) => num(v).ok(),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
