//! Command-line argument parsing.
//!
//! Usage:
//!   dags [-f[<file>]] [-c<script>] [-p] [-i] [-z] [-o] [-d] [<script-file>…]

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which config file to load.
    pub config: ConfigFile,
    /// Inline script (`-c<script>`), handled before any script files.
    pub script: Option<String>,
    /// What to do with each script.
    pub mode: Mode,
    /// Indent pretty-printed output one level (`-i`).
    pub indent: bool,
    /// Route store access through the overlay (`-o`).
    pub overlay: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Script files, in order.
    pub files: Vec<PathBuf>,
}

/// How to choose the config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search `~/.dagsrc`, then `./.dagsrc` (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the config file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// What to do with each script.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Execute it and print the output.
    #[default]
    Run,
    /// Print it formatted one command per line (`-p`).
    Pretty,
    /// Print it on one line (`-z`).
    Compress,
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
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            args.files.extend(argv[i..].iter().map(PathBuf::from));
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            args.files.push(PathBuf::from(arg));
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'i' => args.indent = true,
                'o' => args.overlay = true,
                'p' => set_mode(&mut args, Mode::Pretty)?,
                'z' => set_mode(&mut args, Mode::Compress)?,

                // -f[<file>]
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

                // -c<script>
                'c' => {
                    let script = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires a script argument".to_owned());
                    };
                    args.script = Some(script);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if args.script.is_none() && args.files.is_empty() {
        return Err("nothing to do: give -c<script> or a script file".to_owned());
    }
    Ok(args)
}

fn set_mode(args: &mut CliArgs, mode: Mode) -> Result<(), String> {
    if args.mode != Mode::Run && args.mode != mode {
        return Err("-p and -z cannot be combined".to_owned());
    }
    args.mode = mode;
    Ok(())
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the config file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let home = directories::BaseDirs::new().map(|d| d.home_dir().join(".dagsrc"));
    home.into_iter()
        .chain(std::iter::once(PathBuf::from("./.dagsrc")))
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
