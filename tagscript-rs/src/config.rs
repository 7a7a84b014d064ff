//! `.tagscriptrc` configuration file parser.
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/syntax <key>=<value> …` | macro prefix, expand-all token, default separator, rest marker |
//! | `/dialect <key>=<value> …` | comment markers, label prefix, title separator, break marker, auto break |
//! | `/set <name>=<value>` or `/set <name> <value>` | pre-define a global |
//! | `/seal <name> …` | seal globals |
//! | `/rule <tier> <regex> => <replacement>` | extra regex designator |
//! | Lines starting with `;` | comment, ignored |
//!
//! Values may be double-quoted to carry spaces: `/dialect comment="// #"`.

use std::path::Path;

use crate::script::designator::{RegexDesignator, Tier};
use crate::script::{parse_element, ArgumentSyntax, DialectConfig, Engine, NameSpace};

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed configuration: engine syntax, dialect and preset globals.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub syntax: ArgumentSyntax,
    pub dialect: DialectConfig,
    pub globals: NameSpace,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Every bad line is reported and skipped; the rest still applies.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else {
                errors.push(ConfigError { line: lineno, message: format!("not a directive: {line}") });
                continue;
            };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let args_str = args_str.trim();

            let result = match cmd {
                "syntax" => for_each_setting(args_str, |k, v| set_syntax(&mut config.syntax, k, v)),
                "dialect" => for_each_setting(args_str, |k, v| set_dialect(&mut config.dialect, k, v)),
                "set" => parse_set(args_str, &mut config.globals),
                "seal" => parse_seal(args_str, &mut config.globals),
                "rule" => parse_rule(args_str).map(|rule| config.dialect.rules.push(rule)),
                other => Err(format!("unknown directive /{other}")),
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// An engine using this configuration.
    pub fn engine(&self) -> Engine {
        Engine::with_settings(self.syntax.clone(), &self.dialect, self.globals.clone())
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted
/// stretches and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

fn for_each_setting(
    args_str: &str,
    mut apply: impl FnMut(&str, &str) -> Result<(), String>,
) -> Result<(), String> {
    let tokens = split_args(args_str);
    if tokens.is_empty() {
        return Err("expected key=value".into());
    }
    for tok in &tokens {
        let (key, value) = tok
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{tok}'"))?;
        apply(key.trim(), value)?;
    }
    Ok(())
}

fn single_char(key: &str, value: &str) -> Result<char, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("{key}: expected a single character, got '{value}'")),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("{key}: expected on/off, got '{value}'")),
    }
}

// ── /syntax ───────────────────────────────────────────────────────────────────

fn set_syntax(syntax: &mut ArgumentSyntax, key: &str, value: &str) -> Result<(), String> {
    match key {
        "macro_prefix" if !value.is_empty() => syntax.macro_prefix = value.to_owned(),
        "expand_all" => syntax.expand_all = value.to_owned(),
        "default_separator" => syntax.default_separator = single_char(key, value)?,
        "rest_marker" => syntax.rest_marker = single_char(key, value)?,
        "macro_prefix" => return Err("macro_prefix: must not be empty".into()),
        _ => return Err(format!("syntax: unknown key '{key}'")),
    }
    Ok(())
}

// ── /dialect ──────────────────────────────────────────────────────────────────

fn set_dialect(dialect: &mut DialectConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "comment" => dialect.comment_markers = value.split_whitespace().map(str::to_owned).collect(),
        "label_prefix" => dialect.label_prefix = value.to_owned(),
        "title_separator" => dialect.title_separator = single_char(key, value)?,
        "break_marker" => dialect.break_marker = value.to_owned(),
        "auto_break" => dialect.auto_break = parse_bool(key, value)?,
        _ => return Err(format!("dialect: unknown key '{key}'")),
    }
    Ok(())
}

// ── /set, /seal ───────────────────────────────────────────────────────────────

/// Parse `/set <name>=<value>` or `/set <name> <value>`.  The value is an
/// element, so `(a b)` is a list and `"1"` the integer 1.
fn parse_set(args_str: &str, globals: &mut NameSpace) -> Result<(), String> {
    if args_str.is_empty() {
        return Err("/set: requires an argument".into());
    }
    let (name, value) = args_str
        .split_once(|c: char| c == '=' || c.is_ascii_whitespace())
        .ok_or_else(|| format!("/set: missing value for '{args_str}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("/set: variable name cannot be empty".into());
    }
    let value = parse_element(value).map_err(|e| format!("/set {name}: {e}"))?;
    globals.define(name, value).map_err(|e| format!("/set: {e}"))
}

fn parse_seal(args_str: &str, globals: &mut NameSpace) -> Result<(), String> {
    let names = split_args(args_str);
    if names.is_empty() {
        return Err("/seal: requires a name".into());
    }
    for name in &names {
        globals.seal(name).map_err(|e| format!("/seal: {e}"))?;
    }
    Ok(())
}

// ── /rule ─────────────────────────────────────────────────────────────────────

/// Parse `/rule <tier> <regex> => <replacement>`.
fn parse_rule(args_str: &str) -> Result<RegexDesignator, String> {
    let (tier, rest) = args_str
        .split_once(|c: char| c.is_ascii_whitespace())
        .ok_or("/rule: expected <tier> <regex> => <replacement>")?;
    let tier = Tier::from_name(tier).ok_or_else(|| format!("/rule: unknown tier '{tier}'"))?;
    let (pattern, replacement) = rest
        .split_once("=>")
        .ok_or("/rule: missing '=>'")?;
    RegexDesignator::new(tier, pattern.trim(), replacement.trim())
        .map_err(|e| format!("/rule: {e}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Value;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("foo bar baz"), ["foo", "bar", "baz"]);
    }

    #[test]
    fn split_quoted_value() {
        assert_eq!(split_args(r#"comment="// #" x=1"#), ["comment=// #", "x=1"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- /syntax --------------------------------------------------------------

    #[test]
    fn syntax_keys() {
        let (cfg, errs) =
            Config::load_str("/syntax macro_prefix=& expand_all=&& default_separator=: rest_marker=+");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.syntax.macro_prefix, "&");
        assert_eq!(cfg.syntax.expand_all, "&&");
        assert_eq!(cfg.syntax.default_separator, ':');
        assert_eq!(cfg.syntax.rest_marker, '+');
    }

    #[test]
    fn syntax_rejects_multi_char_separator() {
        let (cfg, errs) = Config::load_str("/syntax default_separator=::");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
        assert_eq!(cfg.syntax.default_separator, '=');
    }

    // -- /dialect -------------------------------------------------------------

    #[test]
    fn dialect_keys() {
        let (cfg, errs) = Config::load_str(
            "/dialect comment=\"// #\" label_prefix=@ \"title_separator=|\"\n\
             /dialect break_marker=~ auto_break=on",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.dialect.comment_markers, ["//", "#"]);
        assert_eq!(cfg.dialect.label_prefix, "@");
        assert_eq!(cfg.dialect.title_separator, '|');
        assert_eq!(cfg.dialect.break_marker, "~");
        assert!(cfg.dialect.auto_break);
    }

    #[test]
    fn dialect_unknown_key() {
        let (_, errs) = Config::load_str("/dialect colour=red");
        assert_eq!(errs.len(), 1);
    }

    // -- /set, /seal ----------------------------------------------------------

    #[test]
    fn set_equals_syntax() {
        let (cfg, errs) = Config::load_str("/set wrap=1");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.globals.get("wrap"), Some(&Value::Int(1)));
    }

    #[test]
    fn set_space_syntax_keeps_value_whole() {
        let (cfg, errs) = Config::load_str("/set greeting hello world\n/set items (a b)");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.globals.get("greeting"), Some(&Value::Str("hello world".into())));
        assert_eq!(cfg.globals.get("items").map(Value::size), Some(2));
    }

    #[test]
    fn set_after_seal_is_rejected() {
        let (cfg, errs) = Config::load_str("/set hp=10\n/seal hp\n/set hp=0");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 3);
        assert_eq!(cfg.globals.get("hp"), Some(&Value::Int(10)));
        assert!(cfg.globals.is_sealed("hp"));
    }

    #[test]
    fn set_bad_name() {
        let (_, errs) = Config::load_str("/set a.b=1");
        assert_eq!(errs.len(), 1);
    }

    // -- /rule ----------------------------------------------------------------

    #[test]
    fn rule_compiles_regex() {
        let (cfg, errs) = Config::load_str(r"/rule head ^@(\w+)$ => [$1]");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.dialect.rules.len(), 1);
        assert_eq!(cfg.dialect.rules[0].pattern(), r"^@(\w+)$");
    }

    #[test]
    fn rule_errors() {
        let (_, errs) = Config::load_str("/rule nowhere a => b\n/rule head ( => x\n/rule head abc");
        assert_eq!(errs.iter().map(|e| e.line).collect::<Vec<_>>(), [1, 2, 3]);
    }

    // -- Comments & skipping --------------------------------------------------

    #[test]
    fn semicolon_comments_ignored() {
        let (cfg, errs) = Config::load_str(
            ";; This is a comment\n\
             ; Also a comment\n\
             /set real=yes",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.globals.len(), 1);
    }

    #[test]
    fn unknown_directive_reported_and_skipped() {
        let (cfg, errs) = Config::load_str("/frobnicate\n/set x=1");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
        assert_eq!(cfg.globals.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn engine_uses_config() {
        let (cfg, errs) = Config::load_str("/set start=5\n/seal start\n/dialect label_prefix=#");
        assert!(errs.is_empty(), "{errs:?}");
        let mut engine = cfg.engine();
        let s = engine.parse_script("#top\n[add $start 1]").unwrap();
        assert_eq!(s.label("top").map(|l| l.index()), Some(1));
        assert_eq!(engine.play(&s)[1], Ok(Value::Int(6)));
        let v = engine.parse_element("[setglobal start 0]").unwrap();
        assert!(engine.evaluate(&v).is_err());
    }

    #[test]
    fn load_file_reads_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"/set x=2\n").unwrap();
        let (cfg, errs) = Config::load_file(f.path()).unwrap();
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.globals.get("x"), Some(&Value::Int(2)));
    }
}
