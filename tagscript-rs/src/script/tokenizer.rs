//! Canonical lines → units → [`Scenario`].
//!
//! A unit ends right after the tag that closes it, or at the end of a line
//! when no tag is open.  A tag left open at the end of a line continues on
//! the next one.  Units that would hold only whitespace are never emitted.
//!
//! ```text
//! foo[br]bar[br][label a]baz   →   foo[br] | bar[br] | [label a] | baz
//! ```

use tracing::trace;

use super::bind::{bind_arguments, Formal, Formals};
use super::builtins::STD;
use super::element::{find_tag_start, parse_element};
use super::engine::Engine;
use super::error::{Result, ScriptError};
use super::scenario::{Label, Scenario, Unit};
use super::split::{Nesting, ESCAPE};
use super::value::{ActionCall, Value};

/// Name of the action that declares a jump label.
pub const LABEL: &str = "label";

/// Formals of [`LABEL`]: `name` and an optional `title`.
pub fn label_formals() -> Formals {
    Formals::new(vec![Formal::required("name"), Formal::optional("title", "")])
}

/// `label` itself, or qualified with the standard package.
fn is_label(name: &str) -> bool {
    name == LABEL || name.strip_prefix(STD).and_then(|n| n.strip_prefix('.')) == Some(LABEL)
}

/// Split canonical lines into unit strings.
pub fn split_units<S: AsRef<str>>(lines: &[S]) -> Result<Vec<String>> {
    let mut units = Vec::new();
    let mut buf = String::new();
    let mut nest = Nesting::for_text();

    for line in lines {
        if nest.in_bracket() {
            buf.push('\n');
        }
        for ch in line.as_ref().chars() {
            let was_open = nest.in_bracket();
            buf.push(ch);
            nest.feed(ch);
            if was_open && !nest.in_bracket() {
                push_unit(&mut units, &mut buf);
            }
        }
        if !nest.in_bracket() {
            push_unit(&mut units, &mut buf);
            nest.clear_escape();
        }
    }

    if nest.in_bracket() {
        return Err(ScriptError::malformed(format!("{} in `{}`", nest.describe(), buf.trim())));
    }
    Ok(units)
}

fn push_unit(units: &mut Vec<String>, buf: &mut String) {
    let unit = std::mem::take(buf);
    if !unit.trim().is_empty() {
        trace!(unit = %unit, "unit");
        units.push(unit);
    }
}

/// Split one unit string into its leading text and its action.
pub fn split_unit(unit: &str) -> Result<(String, ActionCall)> {
    let Some(start) = find_tag_start(unit) else {
        return Ok((unescape_text(unit), ActionCall::pass()));
    };
    let (text, tag) = unit.split_at(start);
    match parse_element(tag)? {
        Value::Action(call) => Ok((unescape_text(text), call)),
        _ => Err(ScriptError::malformed(format!("expected a tag in `{unit}`"))),
    }
}

/// Drop the backslash from every `\x` pair in prose.
fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Build a scenario from canonical lines.
///
/// A `label` unit's label points at the unit that follows it (the last
/// unit when the label is final).  Its arguments are bound in an empty
/// scope, so they should be literals.
pub fn tokenize<S: AsRef<str>>(engine: &mut Engine, lines: &[S]) -> Result<Scenario> {
    let (units, labels) = split_units(lines)?.iter().try_fold(
        (Vec::new(), Vec::new()),
        |(mut units, mut labels): (Vec<Unit>, Vec<Label>), raw| -> Result<_> {
            let (text, call) = split_unit(raw)?;
            if is_label(call.name()) {
                labels.push(bind_label(engine, &call, units.len() + 1)?);
            }
            units.push(Unit::new(text, call));
            Ok((units, labels))
        },
    )?;

    let last = units.len().saturating_sub(1);
    let labels = labels
        .into_iter()
        .map(|l| if l.index() > last { Label::new(l.id(), last, l.title()) } else { Ok(l) })
        .collect::<Result<Vec<_>>>()?;
    Scenario::new(units, labels)
}

fn bind_label(engine: &mut Engine, call: &ActionCall, index: usize) -> Result<Label> {
    let mark = engine.scopes().len();
    let root = engine.scopes_mut().root();
    let bound = bind_arguments(engine, &label_formals(), false, call.args(), root).and_then(|scope| {
        let name = engine.scopes().get(scope, "name").as_string()?;
        let title = engine.scopes().get(scope, "title").as_string_or("");
        Label::new(name, index, title)
    });
    engine.scopes_mut().truncate(mark);
    bound
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn units(src: &str) -> Vec<String> {
        split_units(&src.lines().collect::<Vec<_>>()).expect("split failed")
    }

    #[test]
    fn unit_ends_after_each_tag() {
        assert_eq!(
            units("foo[br]bar[br][label a]baz"),
            vec!["foo[br]", "bar[br]", "[label a]", "baz"]
        );
    }

    #[test]
    fn blank_lines_produce_nothing() {
        assert_eq!(units("a\n\n\n  \nb"), vec!["a", "b"]);
    }

    #[test]
    fn open_tag_spans_lines() {
        assert_eq!(units("x[do {\n  a\n}]y"), vec!["x[do {\n  a\n}]", "y"]);
    }

    #[test]
    fn prose_parens_and_quotes_do_not_nest() {
        assert_eq!(units("sad :( \"so\" [br]ok"), vec!["sad :( \"so\" [br]", "ok"]);
    }

    #[test]
    fn escaped_bracket_is_text() {
        assert_eq!(units("a \\[b] c"), vec!["a \\[b] c"]);
        let (text, call) = split_unit("a \\[b] c").unwrap();
        assert_eq!(text, "a [b] c");
        assert!(call.is_pass());
    }

    #[test]
    fn unterminated_tag_rejected() {
        let lines = ["ok", "[foo (bar"];
        assert!(matches!(split_units(&lines), Err(ScriptError::MalformedInput(_))));
    }

    #[test]
    fn unit_text_and_action() {
        let (text, call) = split_unit("Hello [wait 3]").unwrap();
        assert_eq!(text, "Hello ");
        assert_eq!(call, ActionCall::new("wait", "3"));
    }

    #[test]
    fn labels_point_at_next_unit() {
        let mut engine = Engine::new();
        let s = tokenize(&mut engine, &["foo[br]bar[br][label a]baz[br]hoge[label b][br]fuga"]).unwrap();
        assert_eq!(s.len(), 7);
        assert_eq!(s.labels().len(), 2);
        assert!(s.label_at(2).is_none());
        assert_eq!(s.label_at(3).map(Label::id), Some("a"));
        assert_eq!(s.label_at(5).map(Label::id), Some("b"));
    }

    #[test]
    fn trailing_label_clamps_to_last_unit() {
        let mut engine = Engine::new();
        let s = tokenize(&mut engine, &["intro", "[label end \"The End\"]"]).unwrap();
        let end = s.label("end").unwrap();
        assert_eq!(end.index(), 1);
        assert_eq!(end.title(), "The End");
    }

    #[test]
    fn label_without_name_is_an_argument_error() {
        let mut engine = Engine::new();
        let err = tokenize(&mut engine, &["[label]"]).unwrap_err();
        assert!(matches!(err, ScriptError::WrongTypeArgument { .. }));
        assert_eq!(engine.scopes().len(), 0);
    }

    #[test]
    fn only_the_standard_label_declares_labels() {
        let mut engine = Engine::new();
        let s = tokenize(&mut engine, &["[story.label x]a", "[std.label y]b"]).unwrap();
        assert_eq!(s.labels().len(), 1);
        assert!(s.label("x").is_none());
        assert_eq!(s.label("y").map(Label::index), Some(3));
    }
}
