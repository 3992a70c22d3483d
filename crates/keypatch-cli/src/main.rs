//! Command-line interface for `keypatch-core`.
//!
//! Diff mode prints the patch turning FILE1 into FILE2 (or STDIN) and exits
//! with status 1 when the documents differ. Patch mode (`-p`) applies the
//! patch in FILE1 to FILE2 (or STDIN) and prints the result.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use keypatch_core::{ApplyOptions, DiffOptions, Node, Patch, Pointer};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "KEYPATCH_LOG";

const EXAMPLES: &str = r#"Examples:
  keypatch a.json b.json
  cat b.json | keypatch a.json
  keypatch --key /users=id a.json b.json
  keypatch -o patch.json a.json b.json; keypatch -p patch.json a.json

Logging is controlled by the KEYPATCH_LOG environment variable (default "warn")."#;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "keypatch",
    version,
    about = "Diff and patch JSON and YAML documents.",
    override_usage = "keypatch [OPTIONS] FILE1 [FILE2]",
    after_help = EXAMPLES
)]
struct Cli {
    /// Apply the patch in FILE1 to FILE2 or STDIN.
    #[arg(short = 'p', long = "patch", action = ArgAction::SetTrue)]
    patch: bool,

    /// Write output to FILE instead of STDOUT.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Read and write YAML instead of JSON.
    #[arg(long = "yaml", action = ArgAction::SetTrue)]
    yaml: bool,

    /// Reconcile the array at POINTER by FIELD; a bare POINTER compares
    /// elements by value. Repeatable.
    #[arg(short = 'k', long = "key", value_name = "POINTER[=FIELD]")]
    keys: Vec<String>,

    /// JSON object mapping array pointers to key fields (or null).
    #[arg(long = "keys", value_name = "FILE")]
    keys_file: Option<PathBuf>,

    /// Address keyed array elements through value locators.
    #[arg(long = "locators", action = ArgAction::SetTrue)]
    locators: bool,

    /// Skip patch operations whose value locator matches nothing.
    #[arg(long = "lenient", action = ArgAction::SetTrue)]
    lenient: bool,

    /// Maximum nesting depth for diff and patch.
    #[arg(long = "max-depth", value_name = "N")]
    max_depth: Option<usize>,

    /// Indent JSON output.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,

    /// Diagnostic log format on STDERR.
    #[arg(long = "log-format", value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Positional inputs (FILE1 \[FILE2]).
    #[arg(value_name = "FILE", num_args = 1..=2, required = true)]
    inputs: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    match try_main(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let _ = writeln!(io::stderr(), "keypatch: {err:#}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn try_main(cli: &Cli) -> Result<i32> {
    let (first, second) = match cli.inputs.as_slice() {
        [first] => (InputSource::File(first.clone()), InputSource::Stdin),
        [first, second] => (InputSource::File(first.clone()), InputSource::File(second.clone())),
        _ => bail!("expected FILE1 [FILE2]"),
    };

    if cli.patch {
        run_patch(cli, &first, &second)
    } else {
        run_diff(cli, &first, &second)
    }
}

fn run_diff(cli: &Cli, first: &InputSource, second: &InputSource) -> Result<i32> {
    let source = parse_node(&read_input(first)?, cli.yaml).context("failed to parse first input")?;
    let target = parse_node(&read_input(second)?, cli.yaml).context("failed to parse second input")?;

    let options = build_diff_options(cli)?;
    debug!(keys = options.key_fields().len(), locators = options.emit_locators(), "diffing inputs");
    let patch = keypatch_core::diff(&source, &target, &options).context("failed to compute diff")?;

    let have_diff = !patch.is_empty();
    write_output(cli, &render(&patch, cli)?)?;
    Ok(i32::from(have_diff))
}

fn run_patch(cli: &Cli, first: &InputSource, second: &InputSource) -> Result<i32> {
    let patch = parse_patch(&read_input(first)?, cli.yaml).context("failed to parse patch")?;
    let document = parse_node(&read_input(second)?, cli.yaml).context("failed to parse document")?;

    let mut options = ApplyOptions::default().with_strict(!cli.lenient);
    if let Some(depth) = cli.max_depth {
        options = options.with_max_depth(depth)?;
    }
    debug!(operations = patch.len(), strict = options.strict(), "applying patch");
    let patched =
        keypatch_core::apply_with(&document, &patch, &options).context("failed to apply patch")?;

    write_output(cli, &render(&patched, cli)?)?;
    Ok(0)
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn read_input(source: &InputSource) -> Result<String> {
    match source {
        InputSource::File(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).context("failed to read STDIN")?;
            Ok(buffer)
        }
    }
}

fn parse_node(input: &str, yaml: bool) -> Result<Node> {
    let node = if yaml { Node::from_yaml_str(input)? } else { Node::from_json_str(input)? };
    Ok(node)
}

fn parse_patch(input: &str, yaml: bool) -> Result<Patch> {
    if yaml {
        return Ok(serde_yaml::from_str(input)?);
    }
    Ok(Patch::from_json_str(input)?)
}

fn render<T: Serialize>(value: &T, cli: &Cli) -> Result<String> {
    let rendered = if cli.yaml {
        serde_yaml::to_string(value)?
    } else if cli.pretty {
        serde_json::to_string_pretty(value)? + "\n"
    } else {
        serde_json::to_string(value)? + "\n"
    };
    Ok(rendered)
}

fn write_output(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(path) = &cli.output {
        fs::write(path, rendered.as_bytes())
            .with_context(|| format!("failed to write output to {}", path.display()))?;
    } else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_diff_options(cli: &Cli) -> Result<DiffOptions> {
    let mut entries = match &cli.keys_file {
        Some(path) => read_keys_file(path)?,
        None => BTreeMap::new(),
    };
    for raw in &cli.keys {
        let (pointer, key) = parse_key_flag(raw)?;
        entries.insert(pointer, key);
    }

    let mut options = DiffOptions::default().with_key_fields(entries)?.with_locators(cli.locators);
    if let Some(depth) = cli.max_depth {
        options = options.with_max_depth(depth)?;
    }
    Ok(options)
}

fn read_keys_file(path: &Path) -> Result<BTreeMap<Pointer, Option<String>>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw: BTreeMap<String, Option<String>> = serde_json::from_str(&text)
        .with_context(|| format!("{} must be a JSON object of pointer to field or null", path.display()))?;
    raw.into_iter()
        .map(|(pointer, key)| {
            let pointer = pointer.parse().map_err(|err| anyhow!("invalid key pointer {pointer:?}: {err}"))?;
            Ok((pointer, key))
        })
        .collect()
}

/// Splits `POINTER=FIELD` at the first `=`; a bare pointer selects value
/// identity.
fn parse_key_flag(raw: &str) -> Result<(Pointer, Option<String>)> {
    let (pointer, key) = match raw.split_once('=') {
        Some((pointer, key)) => (pointer, Some(key.to_owned())),
        None => (raw, None),
    };
    let pointer = pointer.parse().with_context(|| format!("invalid --key pointer {pointer:?}"))?;
    Ok((pointer, key))
}

#[cfg(test)]
mod tests {
    use super::{parse_key_flag, Cli, LogFormat};
    use clap::Parser;

    #[test]
    fn key_flag_with_field() {
        let (pointer, key) = parse_key_flag("/users=id").unwrap();
        assert_eq!(pointer.to_string(), "/users");
        assert_eq!(key.as_deref(), Some("id"));
    }

    #[test]
    fn bare_key_flag_selects_value_identity() {
        let (pointer, key) = parse_key_flag("/tags").unwrap();
        assert_eq!(pointer.to_string(), "/tags");
        assert_eq!(key, None);
    }

    #[test]
    fn root_key_flag() {
        let (pointer, key) = parse_key_flag("=id").unwrap();
        assert!(pointer.is_empty());
        assert_eq!(key.as_deref(), Some("id"));
    }

    #[test]
    fn relative_key_pointer_is_rejected() {
        assert!(parse_key_flag("users=id").is_err());
    }

    #[test]
    fn parses_repeated_keys() {
        let cli = Cli::try_parse_from(["keypatch", "--key", "/a=id", "-k", "/b", "x.json", "y.json"]).unwrap();
        assert_eq!(cli.keys, ["/a=id", "/b"]);
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn rejects_three_inputs() {
        assert!(Cli::try_parse_from(["keypatch", "a", "b", "c"]).is_err());
    }
}
