//! Purpose: `papyra` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (raw or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod color_json;
mod command_dispatch;

use color_json::colorize_json;
use papyra::api::{
    CopyOptions, Document, DumpOptions, Error, ErrorKind, Handle, Mode, copy, dump, exists, load,
    remove, sorted, stat, to_exit_code, to_string,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `papyra --help` to see commands and flags."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let result = command_dispatch::dispatch_command(cli.command, color_mode);

    result
        .map_err(add_parse_hint)
        .map_err(add_busy_hint)
        .map_err(add_io_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PAPYRA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(
    name = "papyra",
    version,
    about = "Plain-file toolkit for text, binary, and JSON data",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Files are plain paths; output is raw text or JSON by command.

Mental model:
  - `write` puts text in a file (overwrite, append, or exclusive create)
  - `read` / `lines` get it back
  - `json` loads, edits, and saves structured documents
"#,
    after_help = r#"EXAMPLES
  $ papyra write notes.txt 'Hello papyra!'
  $ papyra read notes.txt
  $ papyra json set data.json user.city '"Delhi"' --create
  $ papyra json get data.json user.city
  $ papyra json fmt data.json --sort-keys
"#
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize pretty JSON output and diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file's text content to stdout
    Read {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Emit a file's lines as JSON, in order
    Lines {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Write text to a file, from the argument or stdin
    Write {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Text to write; reads stdin when omitted
        text: Option<String>,
        /// Add at the end instead of overwriting
        #[arg(long)]
        append: bool,
        /// Fail if the file already exists
        #[arg(long, conflicts_with = "append")]
        create_new: bool,
        /// Force content to stable storage before exiting
        #[arg(long)]
        sync: bool,
    },
    /// Copy a file byte for byte
    Copy {
        #[arg(value_hint = ValueHint::FilePath)]
        src: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        dest: PathBuf,
        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,
        /// Re-read the destination and compare SHA-256 digests
        #[arg(long)]
        verify: bool,
    },
    /// Report whether a file exists
    Exists {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Remove a file
    Rm {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Succeed even if the file is missing
        #[arg(long)]
        force: bool,
    },
    /// Show file size and modification time
    Stat {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Load, edit, and save JSON documents
    Json {
        #[command(subcommand)]
        subcommand: JsonCommand,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum JsonCommand {
    /// Reformat a JSON file
    Fmt {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Emit compact output instead of pretty
        #[arg(long)]
        compact: bool,
        /// Spaces per indent level
        #[arg(long, default_value_t = 2, conflicts_with = "compact")]
        indent: usize,
        /// Order object keys lexicographically
        #[arg(long)]
        sort_keys: bool,
        /// Rewrite the file in place instead of printing
        #[arg(long)]
        write: bool,
    },
    /// Print the value at a dotted key path
    Get {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        path: String,
    },
    /// Set the value at a dotted key path and save the document
    Set {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        path: String,
        /// New value, as JSON text
        value: String,
        /// Create the document if it does not exist
        #[arg(long)]
        create: bool,
    },
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

fn add_parse_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Parse || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check the file contains valid UTF-8 JSON. `papyra read <file>` shows the raw text.")
}

fn add_busy_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Busy || err.hint().is_some() {
        return err;
    }
    err.with_hint("Another process holds the file lock. Retry once it finishes.")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check the path, free disk space, and filesystem permissions.")
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal",
        ErrorKind::Usage => "usage",
        ErrorKind::NotFound => "not-found",
        ErrorKind::AlreadyExists => "already-exists",
        ErrorKind::Busy => "busy",
        ErrorKind::Permission => "permission",
        ErrorKind::Parse => "parse",
        ErrorKind::Io => "io",
    }
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let json = if is_tty || use_color {
        colorize_json(&value, 2, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let rendered = serde_json::to_string(&error_json(err))
        .unwrap_or_else(|_| r#"{"error":{"kind":"internal"}}"#.to_string());
    eprintln!("{rendered}");
}

fn error_text(err: &Error, use_color: bool) -> String {
    let label = colorize_label("error:", use_color);
    let mut text = format!("{label} {err}");
    if let Some(hint) = err.hint() {
        text.push_str("\nhint: ");
        text.push_str(hint);
    }
    text
}

fn colorize_label(label: &str, enabled: bool) -> String {
    if !enabled {
        return label.to_string();
    }
    format!("\u{1b}[31m{label}\u{1b}[0m")
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(kind_label(err.kind())));
    if let Some(message) = err.message() {
        inner.insert("message".to_string(), json!(message));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(source) = StdError::source(err) {
        inner.insert("cause".to_string(), json!(source.to_string()));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::{clap_error_summary, kind_label, normalize_args};
    use crate::ErrorKind;
    use clap::Parser;
    use std::ffi::OsString;

    #[test]
    fn triple_dash_help_is_normalized() {
        let args = normalize_args(vec![
            OsString::from("papyra"),
            OsString::from("---help"),
        ]);
        assert_eq!(args[1], OsString::from("--help"));
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(kind_label(ErrorKind::NotFound), "not-found");
        assert_eq!(kind_label(ErrorKind::AlreadyExists), "already-exists");
        assert_eq!(kind_label(ErrorKind::Parse), "parse");
    }

    #[test]
    fn unknown_subcommand_summarizes_to_one_line() {
        let err = super::Cli::try_parse_from(["papyra", "frobnicate"]).expect_err("bad command");
        let summary = clap_error_summary(&err);
        assert!(!summary.is_empty());
        assert!(!summary.contains('\n'));
    }
}
