//! Command-line argument parsing.
//!
//! Usage:
//!   tagscript [-d] [-f[<rc>]] [-p] [<file>]
//!   tagscript [-d] [-f[<rc>]] -e<element>

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};

pub const USAGE: &str = "Usage: tagscript [-d] [-f[<rc>]] [-p] [-e<element>] [<file>|-]";

const RC_NAME: &str = ".tagscriptrc";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which config file to load.
    pub config: ConfigFile,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Evaluate every unit after listing (`-p`).
    pub play: bool,
    /// Parse a single element instead of a file (`-e<element>`).
    pub element: Option<String>,
    /// Scenario to read.
    pub input: Input,
}

/// How to choose the user config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search the standard locations (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip user config.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// Where the scenario comes from.
#[derive(Debug, Default, PartialEq)]
pub enum Input {
    /// No positional argument.
    #[default]
    None,
    /// `-`: standard input.
    Stdin,
    File(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'p' => args.play = true,

                // -f[<rc>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                // -e<element>
                'e' => {
                    let element = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-e requires an element argument".to_owned());
                    };
                    args.element = Some(element);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        1 => {
            let p = positional.remove(0);
            args.input = if p == "-" { Input::Stdin } else { Input::File(PathBuf::from(p)) };
        }
        n => return Err(format!("too many arguments ({n})")),
    }

    if args.element.is_some() && args.input != Input::None {
        return Err("-e cannot be combined with a scenario file".to_owned());
    }
    if args.element.is_some() && args.play {
        return Err("-p needs a scenario file".to_owned());
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Candidate config locations, in search order.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        paths.push(base.home_dir().join(RC_NAME));
    }
    if let Some(project) = ProjectDirs::from("", "", "tagscript") {
        paths.push(project.config_dir().join("tagscriptrc"));
    }
    paths.push(PathBuf::from(".").join(RC_NAME));
    paths
}

/// Search for the user config file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    config_candidates().into_iter().find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(!a.play && !a.debug);
        assert_eq!(a.input, Input::None);
        assert!(matches!(a.config, ConfigFile::Search));
    }

    #[test]
    fn file_positional() {
        let a = parse_argv(&argv(&["story.txt"])).unwrap();
        assert_eq!(a.input, Input::File(PathBuf::from("story.txt")));
    }

    #[test]
    fn dash_is_stdin() {
        let a = parse_argv(&argv(&["-p", "-"])).unwrap();
        assert_eq!(a.input, Input::Stdin);
        assert!(a.play);
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-dp", "x"])).unwrap();
        assert!(a.debug && a.play);
    }

    #[test]
    fn config_skip() {
        let a = parse_argv(&argv(&["-f", "-p", "x"])).unwrap();
        assert!(matches!(a.config, ConfigFile::Skip));
        assert!(a.play);
    }

    #[test]
    fn config_explicit_embedded() {
        let a = parse_argv(&argv(&["-fmy.rc"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.rc")));
    }

    #[test]
    fn config_explicit_separate() {
        let a = parse_argv(&argv(&["-f", "my.rc", "story.txt"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.rc")));
        assert_eq!(a.input, Input::File(PathBuf::from("story.txt")));
    }

    #[test]
    fn element_embedded_and_separate() {
        let a = parse_argv(&argv(&["-e(a b)"])).unwrap();
        assert_eq!(a.element.as_deref(), Some("(a b)"));
        let a = parse_argv(&argv(&["-e", "[add 1 2]"])).unwrap();
        assert_eq!(a.element.as_deref(), Some("[add 1 2]"));
    }

    #[test]
    fn element_needs_argument() {
        assert!(parse_argv(&argv(&["-e"])).is_err());
    }

    #[test]
    fn element_excludes_file() {
        assert!(parse_argv(&argv(&["-e1", "story.txt"])).is_err());
        assert!(parse_argv(&argv(&["-p", "-e1"])).is_err());
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }

    #[test]
    fn candidates_end_with_working_dir() {
        let c = config_candidates();
        assert_eq!(c.last(), Some(&PathBuf::from(".").join(RC_NAME)));
    }
}
