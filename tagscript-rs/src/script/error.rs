//! Error conditions raised by the parser and evaluator.
//!
//! Every kind except [`ScriptError::MalformedInput`] is recoverable: the
//! caller may retry with a default, skip the unit, or report and continue.

use thiserror::Error;

/// A parse or evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Unterminated bracket or quote nesting.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A primitive conversion was requested on an incompatible value kind.
    #[error("cannot convert {kind} value `{value}` to {target}")]
    NotConvertible {
        kind: &'static str,
        value: String,
        target: &'static str,
    },

    /// A dotted action name did not resolve to a function.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// A write was attempted on a sealed namespace key.
    #[error("variable is sealed: {0}")]
    VariableSealed(String),

    /// Arity or kind mismatch while binding arguments to formals.
    #[error("{message} (formals: [{formals}], received: `{input}`)")]
    WrongTypeArgument {
        message: String,
        formals: String,
        input: String,
    },

    /// A namespace key was empty or contained the separator character.
    #[error("invalid name `{0}`")]
    InvalidName(String),

    /// `use_package` named a namespace that was never imported.
    #[error("no such namespace: {0}")]
    NameSpaceNotFound(String),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ScriptError>;

impl ScriptError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ScriptError::MalformedInput(msg.into())
    }

    /// `true` for conditions the surrounding scenario can continue past.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScriptError::MalformedInput(_))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
