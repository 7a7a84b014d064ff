//! Bracket-tag scenario language.
//!
//! Scenarios are prose interleaved with bracket tags:
//!
//! ```text
//! *start  The Beginning
//! Hello there.\
//! [setglobal met true]You look tired.[wait 2]
//! ```
//!
//! The pipeline has four stages:
//!
//! - [`normalize`]: dialect lines (`*label`, trailing `\`, `//` comments)
//!   are rewritten into canonical tags by tiered [`designator`]s
//! - [`tokenizer`]: canonical lines become `(text, action)` [`Unit`]s and
//!   [`Label`]s, collected into a [`Scenario`]
//! - [`element`]: tags, lists, script blocks and literals become [`Value`]s
//! - [`engine`]: actions are resolved in the [`ActionContext`], their
//!   arguments bound into a fresh [`scope`], and dispatched
//!
//! # Quick start
//!
//! ```rust
//! use tagscript::script::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let scenario = engine.parse_script("*intro\nHello[setglobal seen 1]\n[add $seen 41]").unwrap();
//! assert_eq!(scenario.len(), 3);
//! assert_eq!(scenario.label("intro").unwrap().index(), 1);
//!
//! let results = engine.play(&scenario);
//! assert_eq!(results[2], Ok(Value::Int(42)));
//! ```

pub mod bind;
pub mod builtins;
pub mod context;
pub mod designator;
pub mod element;
pub mod engine;
pub mod error;
pub mod expand;
pub mod namespace;
pub mod normalize;
pub mod scenario;
pub mod scope;
pub mod split;
pub mod tokenizer;
pub mod value;

// Re-exports for convenience.
pub use bind::{ArgumentSyntax, Formal, Formals};
pub use context::{ActionContext, FunctionPackage};
pub use designator::{Designator, Rewrite, Tier};
pub use element::parse_element;
pub use engine::{Engine, Execution};
pub use error::{Result, ScriptError};
pub use namespace::NameSpace;
pub use normalize::{Dialect, DialectConfig, Normalizer};
pub use scenario::{Label, Scenario, Unit};
pub use scope::{ScopeId, Scopes};
pub use split::split_elements;
pub use value::{ActionCall, Function, HashedList, ScriptBlock, Value, ValueKind};
