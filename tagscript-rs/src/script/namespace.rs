//! Flat key/value store with per-key write sealing.
//!
//! Used for global variables and for function tables.  Keys are non-empty
//! and never contain [`SEPARATOR`], which is reserved for qualified
//! `namespace.key` names.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::error::{Result, ScriptError};
use super::value::Value;

/// Separator between a namespace name and a key.
pub const SEPARATOR: char = '.';

/// A sealed-key aware variable table.
#[derive(Debug, Default, Clone)]
pub struct NameSpace {
    vars: HashMap<String, Value>,
    sealed: HashSet<String>,
}

impl NameSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject empty keys and keys containing the separator.
    pub fn check_key(key: &str) -> Result<()> {
        if key.is_empty() || key.contains(SEPARATOR) {
            return Err(ScriptError::InvalidName(key.to_owned()));
        }
        Ok(())
    }

    /// Set (or overwrite) a key.  Fails if the key is sealed; the prior
    /// value is left in place.
    pub fn define(&mut self, key: &str, value: Value) -> Result<()> {
        Self::check_key(key)?;
        if self.sealed.contains(key) {
            return Err(ScriptError::VariableSealed(key.to_owned()));
        }
        self.vars.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Remove a key.  Sealed keys cannot be removed.
    pub fn undefine(&mut self, key: &str) -> Result<Option<Value>> {
        if self.sealed.contains(key) {
            return Err(ScriptError::VariableSealed(key.to_owned()));
        }
        Ok(self.vars.remove(key))
    }

    /// Write-protect `key`.  The key need not be defined yet.
    pub fn seal(&mut self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        debug!(key = %key, "seal");
        self.sealed.insert(key.to_owned());
        Ok(())
    }

    pub fn un_seal(&mut self, key: &str) {
        debug!(key = %key, "unseal");
        self.sealed.remove(key);
    }

    pub fn is_sealed(&self, key: &str) -> bool {
        self.sealed.contains(key)
    }

    /// Merge `other` into this namespace.
    ///
    /// Keys sealed here are never overwritten; keys sealed in `other` stay
    /// sealed after the merge.
    pub fn include(&mut self, other: &NameSpace) {
        for (key, value) in &other.vars {
            if !self.sealed.contains(key) {
                self.vars.insert(key.clone(), value.clone());
            }
        }
        self.sealed.extend(other.sealed.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Drop every key and seal.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.sealed.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let mut ns = NameSpace::new();
        ns.define("wrap", Value::Int(1)).unwrap();
        assert_eq!(ns.get("wrap"), Some(&Value::Int(1)));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn bad_keys_rejected() {
        let mut ns = NameSpace::new();
        assert!(matches!(ns.define("", Value::Void), Err(ScriptError::InvalidName(_))));
        assert!(matches!(ns.define("a.b", Value::Void), Err(ScriptError::InvalidName(_))));
    }

    #[test]
    fn sealed_key_keeps_prior_value() {
        let mut ns = NameSpace::new();
        ns.define("x", Value::Int(1)).unwrap();
        ns.seal("x").unwrap();
        assert!(matches!(ns.define("x", Value::Int(2)), Err(ScriptError::VariableSealed(_))));
        assert_eq!(ns.get("x"), Some(&Value::Int(1)));
        assert!(ns.undefine("x").is_err());
    }

    #[test]
    fn unseal_allows_writes() {
        let mut ns = NameSpace::new();
        ns.define("x", Value::Int(1)).unwrap();
        ns.seal("x").unwrap();
        ns.un_seal("x");
        ns.define("x", Value::Int(2)).unwrap();
        assert_eq!(ns.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn include_respects_seals_both_ways() {
        let mut target = NameSpace::new();
        target.define("kept", Value::Int(1)).unwrap();
        target.seal("kept").unwrap();

        let mut other = NameSpace::new();
        other.define("kept", Value::Int(99)).unwrap();
        other.define("fresh", Value::Int(2)).unwrap();
        other.seal("fresh").unwrap();

        target.include(&other);
        assert_eq!(target.get("kept"), Some(&Value::Int(1)));
        assert_eq!(target.get("fresh"), Some(&Value::Int(2)));
        assert!(target.is_sealed("fresh"));
        assert!(target.is_sealed("kept"));
    }

    #[test]
    fn undefine_unsealed() {
        let mut ns = NameSpace::new();
        ns.define("gone", Value::Int(1)).unwrap();
        assert_eq!(ns.undefine("gone").unwrap(), Some(Value::Int(1)));
        assert!(!ns.contains_key("gone"));
    }
}
