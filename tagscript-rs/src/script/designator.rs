//! Line rewrite rules.
//!
//! A [`Designator`] turns one dialect construct into canonical bracket
//! tags.  Every designator belongs to a [`Tier`]; the normalizer runs the
//! tiers in the order they are declared here:
//!
//! | Tier      | Built-in                | Example                                   |
//! |-----------|-------------------------|-------------------------------------------|
//! | `TagType` | [`TagLineDesignator`]   | `[wait 3]` stays untouched                |
//! | `Middle`  | [`CommentDesignator`]   | `hello // note` → `hello`                 |
//! | `Head`    | [`LabelDesignator`]     | `*start  Chapter  One` → `[label start "Chapter One"]` |
//! | `Tail`    | [`LineBreakDesignator`] | `hello\` → `hello[br]`                    |
//!
//! [`RegexDesignator`] lets configuration add rules to any tier.

use std::fmt;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;

use super::split::{matching_close, quote, Nesting, ESCAPE};

/// Precedence group of a designator.  Earlier tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Recognises lines that are already canonical and protects them.
    TagType,
    /// In-line rewrites.
    Middle,
    /// Rewrites triggered by a line prefix.
    Head,
    /// Rewrites triggered by a line suffix.
    Tail,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::TagType, Tier::Middle, Tier::Head, Tier::Tail];

    pub fn name(self) -> &'static str {
        match self {
            Tier::TagType => "tag-type",
            Tier::Middle => "middle",
            Tier::Head => "head",
            Tier::Tail => "tail",
        }
    }

    /// Inverse of [`name`](Self::name); also accepts `tagtype`.
    pub fn from_name(name: &str) -> Option<Tier> {
        match name.to_ascii_lowercase().as_str() {
            "tag-type" | "tagtype" => Some(Tier::TagType),
            "middle" => Some(Tier::Middle),
            "head" => Some(Tier::Head),
            "tail" => Some(Tier::Tail),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of offering a line to a designator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Not applicable; the line continues unchanged.
    Keep,
    /// Use this text from now on.
    Replace(String),
    /// Use this text and skip every remaining rule.
    Protect(String),
}

/// A stateless line → line rewrite rule.
pub trait Designator: fmt::Debug {
    fn tier(&self) -> Tier;

    fn name(&self) -> &str;

    fn rewrite(&self, line: &str) -> Rewrite;
}

// ── Tag-type tier ─────────────────────────────────────────────────────────────

/// Protects lines made only of canonical tags.
#[derive(Debug, Default, Clone)]
pub struct TagLineDesignator;

impl Designator for TagLineDesignator {
    fn tier(&self) -> Tier {
        Tier::TagType
    }

    fn name(&self) -> &str {
        "tag-line"
    }

    fn rewrite(&self, line: &str) -> Rewrite {
        if is_tags_only(line) {
            Rewrite::Protect(line.to_owned())
        } else {
            Rewrite::Keep
        }
    }
}

/// `[a] [b x]` yes, `[a] text` no, empty no.
fn is_tags_only(line: &str) -> bool {
    let mut rest = line.trim();
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return false;
        }
        match matching_close(rest) {
            Some(end) => rest = rest[end + 1..].trim_start(),
            None => return false,
        }
    }
    true
}

// ── Middle tier ───────────────────────────────────────────────────────────────

/// Truncates a line at the first comment marker outside any tag.
pub struct CommentDesignator {
    markers: Vec<String>,
    finder: Option<AhoCorasick>,
}

impl CommentDesignator {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers: Vec<String> = markers
            .into_iter()
            .map(|m| m.as_ref().to_owned())
            .filter(|m| !m.is_empty())
            .collect();
        let finder = (!markers.is_empty()).then(|| {
            AhoCorasickBuilder::new()
                .match_kind(MatchKind::LeftmostFirst)
                .build(&markers)
        });
        CommentDesignator { markers, finder }
    }
}

impl fmt::Debug for CommentDesignator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommentDesignator").field("markers", &self.markers).finish()
    }
}

impl Designator for CommentDesignator {
    fn tier(&self) -> Tier {
        Tier::Middle
    }

    fn name(&self) -> &str {
        "comment"
    }

    fn rewrite(&self, line: &str) -> Rewrite {
        let Some(finder) = &self.finder else { return Rewrite::Keep };
        for m in finder.find_iter(line) {
            if is_top_level(line, m.start()) {
                return Rewrite::Replace(line[..m.start()].trim_end().to_owned());
            }
        }
        Rewrite::Keep
    }
}

/// `true` when byte offset `at` is outside every tag and not escaped.
fn is_top_level(line: &str, at: usize) -> bool {
    let mut nest = Nesting::for_text();
    for ch in line[..at].chars() {
        nest.feed(ch);
    }
    !nest.in_bracket() && !nest.is_escaped()
}

// ── Head tier ─────────────────────────────────────────────────────────────────

/// `*name title` → `[label name "title"]`.
///
/// Runs of whitespace in the title collapse to one space; an empty title is
/// omitted.
#[derive(Debug, Clone)]
pub struct LabelDesignator {
    prefix: String,
    separator: char,
}

impl LabelDesignator {
    pub fn new(prefix: &str, separator: char) -> Self {
        LabelDesignator { prefix: prefix.to_owned(), separator }
    }
}

impl Default for LabelDesignator {
    fn default() -> Self {
        LabelDesignator::new("*", ' ')
    }
}

impl Designator for LabelDesignator {
    fn tier(&self) -> Tier {
        Tier::Head
    }

    fn name(&self) -> &str {
        "label"
    }

    fn rewrite(&self, line: &str) -> Rewrite {
        if self.prefix.is_empty() {
            return Rewrite::Keep;
        }
        let Some(body) = line.trim_start().strip_prefix(self.prefix.as_str()) else {
            return Rewrite::Keep;
        };
        let (name, title) = match split_unescaped(body, self.separator) {
            Some((name, title)) => (name.trim(), title),
            None => (body.trim(), ""),
        };
        if name.is_empty() {
            return Rewrite::Keep;
        }
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            Rewrite::Replace(format!("[label {name}]"))
        } else {
            Rewrite::Replace(format!("[label {name} {}]", quote(&title)))
        }
    }
}

fn split_unescaped(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == sep || (sep == ' ' && ch.is_whitespace()) {
            return Some((&s[..i], &s[i + ch.len_utf8()..]));
        }
    }
    None
}

// ── Tail tier ─────────────────────────────────────────────────────────────────

/// Trailing line-break marker.
///
/// With `auto` off a trailing marker is replaced by `[br]`.  With `auto` on
/// every text line gets a `[br]` and the marker suppresses it; the
/// suppressed line ends in `[pass]` so a second pass leaves it alone.
#[derive(Debug, Clone)]
pub struct LineBreakDesignator {
    marker: String,
    auto: bool,
}

impl LineBreakDesignator {
    pub fn new(marker: &str, auto: bool) -> Self {
        LineBreakDesignator { marker: marker.to_owned(), auto }
    }

    /// Text before an unescaped trailing marker.
    fn strip_marker<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.marker.is_empty() {
            return None;
        }
        let head = line.strip_suffix(self.marker.as_str())?;
        let escapes = head.chars().rev().take_while(|&c| c == ESCAPE).count();
        (escapes % 2 == 0).then_some(head)
    }
}

impl Default for LineBreakDesignator {
    fn default() -> Self {
        LineBreakDesignator::new("\\", false)
    }
}

impl Designator for LineBreakDesignator {
    fn tier(&self) -> Tier {
        Tier::Tail
    }

    fn name(&self) -> &str {
        "line-break"
    }

    fn rewrite(&self, line: &str) -> Rewrite {
        let line = line.trim_end();
        match (self.strip_marker(line), self.auto) {
            (Some(head), false) => Rewrite::Replace(format!("{head}[br]")),
            (Some(head), true) => Rewrite::Replace(format!("{head}[pass]")),
            (None, true) if !line.is_empty() && !line.ends_with(']') => {
                Rewrite::Replace(format!("{line}[br]"))
            }
            (None, _) => Rewrite::Keep,
        }
    }
}

// ── Configurable ──────────────────────────────────────────────────────────────

/// Regex replacement rule, `$1`-style captures allowed in the replacement.
#[derive(Debug, Clone)]
pub struct RegexDesignator {
    tier: Tier,
    regex: Regex,
    replacement: String,
}

impl RegexDesignator {
    pub fn new(tier: Tier, pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(RegexDesignator {
            tier,
            regex: Regex::new(pattern)?,
            replacement: replacement.to_owned(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl Designator for RegexDesignator {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn name(&self) -> &str {
        self.regex.as_str()
    }

    fn rewrite(&self, line: &str) -> Rewrite {
        if self.regex.is_match(line) {
            Rewrite::Replace(self.regex.replace_all(line, self.replacement.as_str()).into_owned())
        } else {
            Rewrite::Keep
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn replaced(d: &dyn Designator, line: &str) -> String {
        match d.rewrite(line) {
            Rewrite::Replace(s) | Rewrite::Protect(s) => s,
            Rewrite::Keep => line.to_owned(),
        }
    }

    #[test]
    fn tag_lines_protected() {
        let d = TagLineDesignator;
        assert_eq!(d.rewrite("[wait 3]"), Rewrite::Protect("[wait 3]".into()));
        assert_eq!(d.rewrite("  [a] [b (c)]"), Rewrite::Protect("  [a] [b (c)]".into()));
        assert_eq!(d.rewrite("[a] text"), Rewrite::Keep);
        assert_eq!(d.rewrite("text [a]"), Rewrite::Keep);
        assert_eq!(d.rewrite("[open"), Rewrite::Keep);
        assert_eq!(d.rewrite(""), Rewrite::Keep);
    }

    #[test]
    fn comment_truncates_at_first_marker() {
        let d = CommentDesignator::new(["//", "#"]);
        assert_eq!(replaced(&d, "hello // note"), "hello");
        assert_eq!(replaced(&d, "hi # there // x"), "hi");
        assert_eq!(replaced(&d, "plain"), "plain");
    }

    #[test]
    fn comment_marker_inside_tag_or_escaped_is_kept() {
        let d = CommentDesignator::new(["//"]);
        assert_eq!(d.rewrite("[link http://x]"), Rewrite::Keep);
        assert_eq!(d.rewrite("a \\// b"), Rewrite::Keep);
        assert_eq!(replaced(&d, "[link http://x] // gone"), "[link http://x]");
    }

    #[test]
    fn no_markers_never_rewrites() {
        let d = CommentDesignator::new(Vec::<String>::new());
        assert_eq!(d.rewrite("a // b"), Rewrite::Keep);
    }

    #[test]
    fn label_with_title() {
        let d = LabelDesignator::default();
        assert_eq!(replaced(&d, "*start  Chapter   One "), "[label start \"Chapter One\"]");
    }

    #[test]
    fn label_without_title() {
        let d = LabelDesignator::default();
        assert_eq!(replaced(&d, "*start"), "[label start]");
        assert_eq!(replaced(&d, "*start   "), "[label start]");
        assert_eq!(d.rewrite("*"), Rewrite::Keep);
        assert_eq!(d.rewrite("start"), Rewrite::Keep);
    }

    #[test]
    fn label_custom_separator() {
        let d = LabelDesignator::new("#", '|');
        assert_eq!(replaced(&d, "#end|The  End"), "[label end \"The End\"]");
    }

    #[test]
    fn break_marker_forces_br() {
        let d = LineBreakDesignator::default();
        assert_eq!(replaced(&d, "hello\\"), "hello[br]");
        assert_eq!(d.rewrite("hello\\\\"), Rewrite::Keep);
        assert_eq!(d.rewrite("hello"), Rewrite::Keep);
    }

    #[test]
    fn auto_break_and_suppression() {
        let d = LineBreakDesignator::new("\\", true);
        assert_eq!(replaced(&d, "hello"), "hello[br]");
        assert_eq!(replaced(&d, "hello\\"), "hello[pass]");
        assert_eq!(d.rewrite("hello[br]"), Rewrite::Keep);
        assert_eq!(d.rewrite(""), Rewrite::Keep);
    }

    #[test]
    fn regex_rule() {
        let d = RegexDesignator::new(Tier::Head, r"^@(\w+)\s*(.*)$", "[$1 $2]").unwrap();
        assert_eq!(replaced(&d, "@wait 3"), "[wait 3]");
        assert_eq!(d.rewrite("wait"), Rewrite::Keep);
        assert!(RegexDesignator::new(Tier::Head, "(", "").is_err());
    }

    #[test]
    fn tier_names() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_name(tier.name()), Some(tier));
        }
        assert_eq!(Tier::from_name("nope"), None);
    }
}
