//! Scenario engine.
//!
//! The [`Engine`] owns everything that lives for a session: the function
//! registry, global variables, the scope arena, the argument syntax, the
//! line normalizer and any execution observers.  Nothing is global; two
//! engines never share state.
//!
//! ```text
//! parse_script ─► Normalizer ─► tokenizer ─► Scenario
//! play / run_unit ─► call_action ─► bind_arguments ─► native fn | macro body
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use super::bind::{bind_arguments, ArgumentSyntax};
use super::builtins::{self, STD, USER};
use super::context::{ActionContext, FunctionPackage};
use super::element;
use super::error::Result;
use super::expand::{expand, ScopeParams};
use super::namespace::NameSpace;
use super::normalize::{DialectConfig, Normalizer};
use super::scenario::{Scenario, Unit};
use super::scope::{ScopeId, Scopes};
use super::tokenizer::{self, split_unit, split_units};
use super::value::{ActionCall, FunctionBody, Value};

/// One successful dispatch, as reported to observers.
#[derive(Debug, Clone, Copy)]
pub struct Execution<'a> {
    pub name: &'a str,
    pub args: &'a str,
    pub result: &'a Value,
}

/// Callback registered with [`Engine::observe`].
pub type Observer = Box<dyn FnMut(&Execution<'_>)>;

pub struct Engine {
    context: ActionContext,
    globals: NameSpace,
    initial_globals: NameSpace,
    scopes: Scopes,
    syntax: ArgumentSyntax,
    normalizer: Normalizer,
    observers: Vec<Observer>,
}

impl Engine {
    /// An engine with default syntax and dialect and the `std` package in use.
    pub fn new() -> Self {
        Engine::with_settings(ArgumentSyntax::default(), &DialectConfig::default(), NameSpace::new())
    }

    /// An engine with explicit settings.  `globals` is also what
    /// [`reset`](Self::reset) restores.
    pub fn with_settings(syntax: ArgumentSyntax, dialect: &DialectConfig, globals: NameSpace) -> Self {
        let mut engine = Engine {
            context: ActionContext::new(),
            globals: globals.clone(),
            initial_globals: globals,
            scopes: Scopes::new(),
            syntax,
            normalizer: Normalizer::standard(dialect),
            observers: Vec::new(),
        };
        engine.install_std();
        engine
    }

    fn install_std(&mut self) {
        let std = builtins::std_package();
        // A fresh context has no sealed keys and `std` has no dotted names.
        let installed = self
            .context
            .import_package(&std, STD)
            .and_then(|()| self.context.use_package(STD));
        if let Err(e) = installed {
            warn!(error = %e, "std package not installed");
        }
    }

    /// Forget user functions, globals, scopes and observers; keep syntax,
    /// dialect and the initial globals.
    pub fn reset(&mut self) {
        debug!("reset");
        self.context.clear();
        self.globals = self.initial_globals.clone();
        self.scopes.clear();
        self.observers.clear();
        self.install_std();
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn argument_syntax(&self) -> &ArgumentSyntax {
        &self.syntax
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ActionContext {
        &mut self.context
    }

    pub fn globals(&self) -> &NameSpace {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut NameSpace {
        &mut self.globals
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut Scopes {
        &mut self.scopes
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn normalizer_mut(&mut self) -> &mut Normalizer {
        &mut self.normalizer
    }

    pub fn import_package(&mut self, package: &FunctionPackage, ns: &str) -> Result<()> {
        self.context.import_package(package, ns)
    }

    pub fn use_package(&mut self, ns: &str) -> Result<()> {
        self.context.use_package(ns)
    }

    /// Register a callback for every successful dispatch.  Callbacks run
    /// synchronously, in registration order.  A panicking callback is
    /// logged and skipped; the call's result is still returned.
    pub fn observe(&mut self, observer: impl FnMut(&Execution<'_>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    /// Normalize and tokenize a whole document.
    pub fn parse_script(&mut self, text: &str) -> Result<Scenario> {
        let lines: Vec<&str> = text.lines().collect();
        self.parse_lines(&lines)
    }

    pub fn parse_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<Scenario> {
        let canonical = self.normalizer.normalize(lines);
        tokenizer::tokenize(self, &canonical)
    }

    pub fn parse_element(&self, src: &str) -> Result<Value> {
        element::parse_element(src)
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate `value` in a fresh root scope.  Every scope created along
    /// the way is released afterwards.
    pub fn evaluate(&mut self, value: &Value) -> Result<Value> {
        self.with_root(|engine, root| engine.evaluate_in(value, root))
    }

    /// Identity for every kind except action calls, which are dispatched.
    pub fn evaluate_in(&mut self, value: &Value, scope: ScopeId) -> Result<Value> {
        match value {
            Value::Action(call) => self.call_action(call, scope),
            other => Ok(other.clone()),
        }
    }

    /// Like [`evaluate_in`](Self::evaluate_in), but script blocks are run
    /// as well.  Used by functions that take code as an argument.
    pub fn force(&mut self, value: &Value, scope: ScopeId) -> Result<Value> {
        match value {
            Value::Script(block) => self.exec_source(block.source(), scope),
            other => self.evaluate_in(other, scope),
        }
    }

    /// Resolve, bind and invoke one call made from `caller`.
    pub fn call_action(&mut self, call: &ActionCall, caller: ScopeId) -> Result<Value> {
        let function = self.context.resolve_function(call.name())?;
        let scope = bind_arguments(self, function.formals(), function.is_lazy(), call.args(), caller)?;
        let result = match function.body() {
            FunctionBody::Native(f) => f(self, scope)?,
            FunctionBody::Macro(body) => {
                let expanded = {
                    let params = ScopeParams { scopes: &self.scopes, scope, raw: call.args() };
                    expand(body, &params, &self.syntax)?
                };
                self.exec_source(&expanded, scope)?
            }
        };
        debug!(name = call.name(), args = call.args(), result = %result, "dispatch");
        let execution = Execution { name: call.name(), args: call.args(), result: &result };
        for observer in &mut self.observers {
            if catch_unwind(AssertUnwindSafe(|| observer(&execution))).is_err() {
                warn!(name = call.name(), "observer panicked");
            }
        }
        Ok(result)
    }

    /// Run tagged source such as a macro body or a `{…}` block in `scope`.
    ///
    /// Source made only of tags yields the last non-Void result.  Source
    /// with any text yields the text with each tag replaced by its result.
    pub fn exec_source(&mut self, src: &str, scope: ScopeId) -> Result<Value> {
        let lines: Vec<&str> = src.lines().collect();
        let mut rendered = String::new();
        let mut has_text = false;
        let mut last = Value::Void;
        for raw in split_units(&lines)? {
            let (text, call) = split_unit(&raw)?;
            let value = self.call_action(&call, scope)?;
            has_text |= !text.trim().is_empty();
            rendered.push_str(&text);
            if !value.is_void() {
                rendered.push_str(&value.to_string());
                last = value;
            }
        }
        if has_text {
            Ok(Value::Str(rendered.trim().to_owned()))
        } else {
            Ok(last)
        }
    }

    /// Evaluate one unit's action in a fresh root scope.
    pub fn run_unit(&mut self, unit: &Unit) -> Result<Value> {
        self.with_root(|engine, root| engine.call_action(unit.action(), root))
    }

    /// Evaluate every unit in order.  A failing unit is reported and the
    /// rest still run.
    pub fn play(&mut self, scenario: &Scenario) -> Vec<Result<Value>> {
        scenario
            .units()
            .iter()
            .enumerate()
            .map(|(index, unit)| {
                let result = self.run_unit(unit);
                if let Err(e) = &result {
                    warn!(index, action = %unit.action(), error = %e, "unit failed");
                }
                result
            })
            .collect()
    }

    fn with_root<T>(&mut self, f: impl FnOnce(&mut Engine, ScopeId) -> T) -> T {
        let mark = self.scopes.len();
        let root = self.scopes.root();
        let out = f(self, root);
        self.scopes.truncate(mark);
        out
    }

    /// Define a user macro, visible unqualified from now on.
    pub(crate) fn define_user(&mut self, name: &str, value: Value) -> Result<()> {
        self.context.define_in(USER, name, value)?;
        if !self.context.is_used(USER) {
            self.context.use_package(USER)?;
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("globals", &self.globals)
            .field("scopes", &self.scopes.len())
            .field("syntax", &self.syntax)
            .field("normalizer", &self.normalizer)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
