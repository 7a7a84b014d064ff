//! Chained variable scopes.
//!
//! Scopes live in an arena and are addressed by [`ScopeId`].  Each record
//! stores its parent's id, fixed at creation, so the chain is always a tree.
//! Lookups walk toward the root; writes only ever touch the addressed frame,
//! which gives ordinary shadowing.
//!
//! The engine marks the arena before a top-level evaluation and truncates it
//! afterwards, so scopes never outlive the evaluation that created them.

use std::collections::HashMap;

use super::value::Value;

/// Index of a scope record inside a [`Scopes`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Frame {
    parent: Option<ScopeId>,
    vars: HashMap<String, Value>,
}

/// Arena of scope frames.
#[derive(Debug, Default)]
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a scope with no parent.
    pub fn root(&mut self) -> ScopeId {
        self.alloc(None)
    }

    /// Allocate a scope whose lookups fall back to `parent`.
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.alloc(Some(parent))
    }

    fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.frames.push(Frame { parent, vars: HashMap::new() });
        ScopeId(self.frames.len() - 1)
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.frames.get(id.0).and_then(|f| f.parent)
    }

    /// Look `key` up along the chain; Null on a total miss.
    pub fn get(&self, id: ScopeId, key: &str) -> Value {
        let mut cur = Some(id);
        while let Some(ScopeId(i)) = cur {
            let Some(frame) = self.frames.get(i) else { break };
            if let Some(v) = frame.vars.get(key) {
                return v.clone();
            }
            cur = frame.parent;
        }
        Value::Null
    }

    pub fn contains_key(&self, id: ScopeId, key: &str) -> bool {
        let mut cur = Some(id);
        while let Some(ScopeId(i)) = cur {
            let Some(frame) = self.frames.get(i) else { break };
            if frame.vars.contains_key(key) {
                return true;
            }
            cur = frame.parent;
        }
        false
    }

    /// Bind `key` in this frame only.
    pub fn set(&mut self, id: ScopeId, key: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.get_mut(id.0) {
            frame.vars.insert(key.into(), value);
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every scope allocated after `mark` (a value of [`len`](Self::len)).
    pub fn truncate(&mut self, mark: usize) {
        self.frames.truncate(mark);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_value_visible_from_child() {
        let mut s = Scopes::new();
        let root = s.root();
        s.set(root, "x", Value::Int(1));
        let child = s.child(root);
        assert_eq!(s.get(child, "x"), Value::Int(1));
        assert!(s.contains_key(child, "x"));
    }

    #[test]
    fn child_set_shadows_without_touching_parent() {
        let mut s = Scopes::new();
        let root = s.root();
        s.set(root, "x", Value::Int(1));
        let child = s.child(root);
        s.set(child, "x", Value::Int(2));
        assert_eq!(s.get(child, "x"), Value::Int(2));
        assert_eq!(s.get(root, "x"), Value::Int(1));
    }

    #[test]
    fn total_miss_is_null() {
        let mut s = Scopes::new();
        let root = s.root();
        let child = s.child(root);
        assert_eq!(s.get(child, "nope"), Value::Null);
        assert!(!s.contains_key(child, "nope"));
    }

    #[test]
    fn truncate_releases_scopes() {
        let mut s = Scopes::new();
        let mark = s.len();
        let root = s.root();
        s.child(root);
        assert_eq!(s.len(), mark + 2);
        s.truncate(mark);
        assert!(s.is_empty());
        assert_eq!(s.get(root, "x"), Value::Null);
    }

    #[test]
    fn parent_links() {
        let mut s = Scopes::new();
        let root = s.root();
        let child = s.child(root);
        assert_eq!(s.parent(child), Some(root));
        assert_eq!(s.parent(root), None);
    }
}
