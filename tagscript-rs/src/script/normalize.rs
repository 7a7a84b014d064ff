//! Dialect normalisation: raw scenario lines → canonical lines.
//!
//! ```text
//! lines ─► Dialect::prepare ─► tiered designators ─► Dialect::finish
//! ```
//!
//! Every line passes through the tiers in [`Tier`] order and, within a
//! tier, through the designators in registration order.  A designator
//! returning [`Rewrite::Protect`] ends processing for that line.

use std::fmt;

use tracing::trace;

use super::designator::{
    CommentDesignator, Designator, LabelDesignator, LineBreakDesignator, RegexDesignator,
    Rewrite, TagLineDesignator, Tier,
};

// ── Dialect hooks ─────────────────────────────────────────────────────────────

/// Whole-document hooks around the per-line rules.
///
/// `finish` must leave only plain text and canonical bracket tags.
pub trait Dialect {
    fn prepare(&self, lines: Vec<String>) -> Vec<String> {
        lines
    }

    fn finish(&self, lines: Vec<String>) -> Vec<String> {
        lines
    }
}

/// Identity hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainDialect;

impl Dialect for PlainDialect {}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Settings for the built-in designators plus any extra regex rules.
#[derive(Debug, Clone)]
pub struct DialectConfig {
    pub comment_markers: Vec<String>,
    pub label_prefix: String,
    pub title_separator: char,
    pub break_marker: String,
    pub auto_break: bool,
    pub rules: Vec<RegexDesignator>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        DialectConfig {
            comment_markers: vec!["//".to_owned()],
            label_prefix: "*".to_owned(),
            title_separator: ' ',
            break_marker: "\\".to_owned(),
            auto_break: false,
            rules: Vec::new(),
        }
    }
}

// ── Normalizer ────────────────────────────────────────────────────────────────

pub struct Normalizer {
    designators: Vec<Box<dyn Designator>>,
    dialect: Box<dyn Dialect>,
}

impl Normalizer {
    /// No rules; lines pass through untouched.
    pub fn new() -> Self {
        Normalizer { designators: Vec::new(), dialect: Box::new(PlainDialect) }
    }

    /// The built-in rules configured by `cfg`, followed by its regex rules.
    pub fn standard(cfg: &DialectConfig) -> Self {
        let mut n = Normalizer::new();
        n.register(TagLineDesignator);
        n.register(CommentDesignator::new(&cfg.comment_markers));
        n.register(LabelDesignator::new(&cfg.label_prefix, cfg.title_separator));
        n.register(LineBreakDesignator::new(&cfg.break_marker, cfg.auto_break));
        for rule in &cfg.rules {
            n.register(rule.clone());
        }
        n
    }

    pub fn register(&mut self, designator: impl Designator + 'static) {
        self.designators.push(Box::new(designator));
    }

    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Box::new(dialect);
        self
    }

    pub fn len(&self) -> usize {
        self.designators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designators.is_empty()
    }

    pub fn normalize<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        let lines = lines.iter().map(|l| l.as_ref().to_owned()).collect();
        let lines = self.dialect.prepare(lines);
        let lines = lines.iter().map(|l| self.normalize_line(l)).collect();
        self.dialect.finish(lines)
    }

    /// Run one line through every tier.
    pub fn normalize_line(&self, line: &str) -> String {
        let mut cur = line.to_owned();
        for tier in Tier::ALL {
            for d in self.designators.iter().filter(|d| d.tier() == tier) {
                match d.rewrite(&cur) {
                    Rewrite::Keep => {}
                    Rewrite::Replace(next) => {
                        trace!(rule = d.name(), %tier, from = %cur, to = %next, "rewrite");
                        cur = next;
                    }
                    Rewrite::Protect(next) => {
                        trace!(rule = d.name(), %tier, line = %next, "protect");
                        return next;
                    }
                }
            }
        }
        cur
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::standard(&DialectConfig::default())
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer").field("designators", &self.designators).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
