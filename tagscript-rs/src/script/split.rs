//! Bracket- and quote-aware scanning shared by the element parser, the
//! tokenizer and the line designators.
//!
//! The central piece is [`split_elements`], which breaks an argument or
//! list body into its top-level chunks:
//!
//! ```text
//! foo [bar baz] "a b" (1 2)   →   foo | [bar baz] | "a b" | (1 2)
//! ```
//!
//! A backslash escapes the character that follows it everywhere.  Inside a
//! `{…}` script block only braces are tracked, so embedded foreign syntax
//! never needs escaping.

use super::error::{Result, ScriptError};

pub const ESCAPE: char = '\\';

// ── Nesting tracker ───────────────────────────────────────────────────────────

/// Running bracket/quote state of a left-to-right scan.
#[derive(Debug, Clone, Default)]
pub(crate) struct Nesting {
    square: usize,
    round: usize,
    curly: usize,
    quotes: usize,
    escaped: bool,
    /// Count `"` outside brackets too (element mode).  In text mode quotes
    /// only matter inside a tag.
    top_level_quotes: bool,
}

impl Nesting {
    /// State for splitting argument and list bodies.
    pub(crate) fn for_elements() -> Self {
        Nesting { top_level_quotes: true, ..Nesting::default() }
    }

    /// State for scanning prose with embedded tags.
    pub(crate) fn for_text() -> Self {
        Nesting::default()
    }

    pub(crate) fn in_quote(&self) -> bool {
        self.quotes % 2 == 1
    }

    pub(crate) fn in_bracket(&self) -> bool {
        self.square + self.round + self.curly > 0
    }

    pub(crate) fn is_balanced(&self) -> bool {
        !self.in_bracket() && !self.in_quote()
    }

    /// `true` while the previous character was an unconsumed backslash.
    pub(crate) fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Forget a pending escape (a chunk boundary swallows it).
    pub(crate) fn clear_escape(&mut self) {
        self.escaped = false;
    }

    pub(crate) fn feed(&mut self, ch: char) {
        if self.escaped {
            self.escaped = false;
            return;
        }
        if ch == ESCAPE {
            self.escaped = true;
            return;
        }
        // Prose outside a tag only ever opens with `[`.
        if !self.top_level_quotes && !self.in_bracket() && ch != '[' {
            return;
        }
        if self.curly > 0 {
            match ch {
                '{' => self.curly += 1,
                '}' => self.curly -= 1,
                _ => {}
            }
            return;
        }
        if ch == '"' {
            if self.top_level_quotes || self.in_bracket() {
                self.quotes += 1;
            }
            return;
        }
        if self.in_quote() {
            return;
        }
        // Stray closers clamp at zero rather than going negative.
        match ch {
            '[' => self.square += 1,
            ']' => self.square = self.square.saturating_sub(1),
            '(' => self.round += 1,
            ')' => self.round = self.round.saturating_sub(1),
            '{' => self.curly += 1,
            '}' => {}
            _ => {}
        }
        if !self.top_level_quotes && !self.in_bracket() {
            self.quotes = 0;
        }
    }

    pub(crate) fn describe(&self) -> String {
        let mut open = Vec::new();
        if self.square > 0 {
            open.push(format!("{} `[`", self.square));
        }
        if self.round > 0 {
            open.push(format!("{} `(`", self.round));
        }
        if self.curly > 0 {
            open.push(format!("{} `{{`", self.curly));
        }
        if self.in_quote() {
            open.push("a `\"`".to_owned());
        }
        format!("unterminated {}", open.join(", "))
    }
}

// ── Splitting ─────────────────────────────────────────────────────────────────

/// Split `src` into its top-level elements.
///
/// Whitespace-delimited chunks are accumulated until every bracket counter
/// is zero and the quote count is even; chunks that stay joined are glued
/// back together with exactly one space.  Input that ends while still
/// nested is rejected with [`ScriptError::MalformedInput`].
pub fn split_elements(src: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut nest = Nesting::for_elements();

    for chunk in src.split_whitespace() {
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(chunk);
        for ch in chunk.chars() {
            nest.feed(ch);
        }
        nest.clear_escape();
        if nest.is_balanced() {
            out.push(std::mem::take(&mut buf));
        }
    }

    if !buf.is_empty() {
        return Err(ScriptError::malformed(format!("{} in `{src}`", nest.describe())));
    }
    Ok(out)
}

/// Byte offset of the first `target` that is not backslash-escaped.
pub fn find_unescaped(s: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == target {
            return Some(i);
        }
    }
    None
}

/// Byte offset of the closer matching the opener at the start of `s`.
///
/// Recognised openers are `[`, `(`, `{` and `"`.
pub(crate) fn matching_close(s: &str) -> Option<usize> {
    let first = s.chars().next()?;
    if first == '"' {
        return find_unescaped(&s[1..], '"').map(|i| i + 1);
    }
    if !matches!(first, '[' | '(' | '{') {
        return None;
    }
    let mut nest = Nesting::for_elements();
    for (i, ch) in s.char_indices() {
        nest.feed(ch);
        if nest.is_balanced() {
            return Some(i);
        }
    }
    None
}

/// Split `key=value` when the prefix is a plain key.
///
/// Keys start with a letter or `_` and continue with alphanumerics, `_`,
/// `-` or `.`; anything else (quotes, brackets, sigils) means the chunk is
/// positional.
pub fn split_keyed(chunk: &str) -> Option<(&str, &str)> {
    let pos = chunk.find('=')?;
    let (key, value) = (&chunk[..pos], &chunk[pos + 1..]);
    let mut chars = key.chars();
    let first = chars.next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
        Some((key, value))
    } else {
        None
    }
}

// ── Quoting ───────────────────────────────────────────────────────────────────

/// Remove one level of `\"` and `\\` escaping.
pub fn unescape_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == ESCAPE {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// Wrap `s` in double quotes, escaping embedded quotes and backslashes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
    out.push('"');
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
