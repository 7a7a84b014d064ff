//! Function registry: named namespaces plus the "current" namespace.
//!
//! Packages are imported into a named namespace and then *used*, which
//! merges them into current so their members resolve without a prefix.
//! A dotted name `a.b.key` resolves as key `key` in namespace `a.b`.

use std::collections::HashMap;

use tracing::debug;

use super::error::{Result, ScriptError};
use super::namespace::{NameSpace, SEPARATOR};
use super::value::{Function, Value};

/// An immutable bundle of functions, used only as an import source.
#[derive(Debug, Clone, Default)]
pub struct FunctionPackage {
    name: String,
    functions: Vec<Function>,
}

impl FunctionPackage {
    pub fn new(name: &str) -> Self {
        FunctionPackage { name: name.to_owned(), functions: Vec::new() }
    }

    pub fn with(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ActionContext {
    spaces: HashMap<String, NameSpace>,
    current: NameSpace,
    used: Vec<String>,
}

impl ActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every function of `package` into namespace `ns`, creating it
    /// on first use.
    pub fn import_package(&mut self, package: &FunctionPackage, ns: &str) -> Result<()> {
        if ns.is_empty() {
            return Err(ScriptError::InvalidName(ns.to_owned()));
        }
        debug!(package = package.name(), namespace = ns, count = package.len(), "import");
        for function in package.functions() {
            self.define_in(ns, function.name(), Value::Function(function.clone()))?;
        }
        Ok(())
    }

    /// Merge namespace `ns` into current.
    pub fn use_package(&mut self, ns: &str) -> Result<()> {
        let space = self
            .spaces
            .get(ns)
            .ok_or_else(|| ScriptError::NameSpaceNotFound(ns.to_owned()))?;
        debug!(namespace = ns, "use");
        self.current.include(space);
        if !self.is_used(ns) {
            self.used.push(ns.to_owned());
        }
        Ok(())
    }

    pub fn is_used(&self, ns: &str) -> bool {
        self.used.iter().any(|u| u == ns)
    }

    /// Define `key` in namespace `ns`; if `ns` is in use, current sees it
    /// immediately.
    pub fn define_in(&mut self, ns: &str, key: &str, value: Value) -> Result<()> {
        if self.is_used(ns) {
            self.current.define(key, value.clone())?;
        }
        self.spaces.entry(ns.to_owned()).or_default().define(key, value)
    }

    /// Resolve a possibly dotted name.
    pub fn resolve(&self, name: &str) -> Result<&Value> {
        let found = match name.rsplit_once(SEPARATOR) {
            Some((ns, key)) => self.spaces.get(ns).and_then(|space| space.get(key)),
            None => self.current.get(name),
        };
        found.ok_or_else(|| ScriptError::ActionNotFound(name.to_owned()))
    }

    /// Resolve a name that must denote a function.
    pub fn resolve_function(&self, name: &str) -> Result<Function> {
        match self.resolve(name)? {
            Value::Function(f) => Ok(f.clone()),
            _ => Err(ScriptError::ActionNotFound(name.to_owned())),
        }
    }

    pub fn namespace(&self, ns: &str) -> Option<&NameSpace> {
        self.spaces.get(ns)
    }

    pub fn current(&self) -> &NameSpace {
        &self.current
    }

    /// Drop every namespace, including current.
    pub fn clear(&mut self) {
        self.spaces.clear();
        self.current.clear();
        self.used.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
