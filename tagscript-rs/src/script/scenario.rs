//! Parsed scenarios: an ordered list of units plus named labels.

use std::collections::HashMap;
use std::fmt;

use super::error::{Result, ScriptError};
use super::value::ActionCall;

/// One `(text, action)` pair.  Text-only units carry a `pass` action.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    text: String,
    action: ActionCall,
}

impl Unit {
    pub fn new(text: impl Into<String>, action: ActionCall) -> Self {
        Unit { text: text.into(), action }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Unit::new(text, ActionCall::pass())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn action(&self) -> &ActionCall {
        &self.action
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action.is_pass() {
            f.write_str(&self.text)
        } else {
            write!(f, "{}{}", self.text, self.action)
        }
    }
}

/// A named jump target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    id: String,
    index: usize,
    title: String,
}

impl Label {
    pub fn new(id: impl Into<String>, index: usize, title: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ScriptError::InvalidName(id));
        }
        Ok(Label { id, index, title: title.into() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Index of the unit this label jumps to.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Immutable result of one parse call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    units: Vec<Unit>,
    labels: Vec<Label>,
    by_name: HashMap<String, usize>,
}

impl Scenario {
    /// Build a scenario.  Every label index must address a unit; when two
    /// labels share a name the first one wins.
    pub fn new(units: Vec<Unit>, labels: Vec<Label>) -> Result<Self> {
        let mut kept = Vec::with_capacity(labels.len());
        let mut by_name = HashMap::with_capacity(labels.len());
        for label in labels {
            if label.index >= units.len() {
                return Err(ScriptError::malformed(format!(
                    "label `{}` points at unit {} of {}",
                    label.id,
                    label.index,
                    units.len()
                )));
            }
            if by_name.contains_key(&label.id) {
                tracing::warn!(label = %label.id, "duplicate label ignored");
                continue;
            }
            by_name.insert(label.id.clone(), kept.len());
            kept.push(label);
        }
        Ok(Scenario { units, labels: kept, by_name })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.by_name.get(name).map(|&i| &self.labels[i])
    }

    /// The first declared label pointing at `index`.
    pub fn label_at(&self, index: usize) -> Option<&Label> {
        self.labels.iter().find(|l| l.index == index)
    }

    /// Labels in declaration order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: usize) -> Vec<Unit> {
        (0..n).map(|i| Unit::plain(format!("u{i}"))).collect()
    }

    #[test]
    fn queries() {
        let labels = vec![Label::new("a", 1, "").unwrap(), Label::new("b", 2, "End").unwrap()];
        let s = Scenario::new(units(3), labels).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(0).map(Unit::text), Some("u0"));
        assert!(s.get(3).is_none());
        assert_eq!(s.label("b").map(Label::index), Some(2));
        assert_eq!(s.label_at(1).map(Label::id), Some("a"));
        assert!(s.label_at(0).is_none());
        assert_eq!(s.labels().len(), 2);
    }

    #[test]
    fn label_out_of_range_rejected() {
        let labels = vec![Label::new("a", 3, "").unwrap()];
        assert!(matches!(Scenario::new(units(3), labels), Err(ScriptError::MalformedInput(_))));
    }

    #[test]
    fn first_duplicate_label_wins() {
        let labels = vec![Label::new("a", 0, "one").unwrap(), Label::new("a", 1, "two").unwrap()];
        let s = Scenario::new(units(2), labels).unwrap();
        assert_eq!(s.label("a").map(Label::title), Some("one"));
        assert_eq!(s.labels().len(), 1);
    }

    #[test]
    fn empty_label_id_rejected() {
        assert!(Label::new("", 0, "").is_err());
    }

    #[test]
    fn unit_display() {
        assert_eq!(Unit::plain("hi").to_string(), "hi");
        assert_eq!(Unit::new("hi", ActionCall::new("br", "")).to_string(), "hi[br]");
    }
}
