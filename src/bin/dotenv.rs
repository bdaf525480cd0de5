use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{self, Command};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use envloader::{EnvLoader, Error, QuoteMode, TargetEnv};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILE: &str = ".env";

/// Run commands with variables loaded from dotenv files.
#[derive(Debug, Parser)]
#[command(name = "dotenv", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load dotenv files and execute a command.
    Run(RunArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
struct RunArgs {
    /// Dotenv file path(s). Repeat or pass comma-separated paths. Defaults to .env.
    #[arg(short = 'f', long = "file", value_name = "PATHS")]
    files: Vec<String>,

    /// Override existing environment variables.
    #[arg(short = 'o', long = "override", visible_alias = "overload")]
    override_existing: bool,

    /// Keys that must be set once loading finishes. Repeat or pass comma-separated keys.
    #[arg(short = 'r', long = "required", value_name = "KEYS")]
    required: Vec<String>,

    /// Fail on quoted values that are not closed instead of reading them unquoted.
    #[arg(long)]
    strict_quotes: bool,

    /// Print loader diagnostics to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Command to execute, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

fn main() {
    process::exit(run(env::args_os()));
}

fn run(args: impl IntoIterator<Item = OsString>) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let code = err.exit_code();
            let _ = err.print();
            return code;
        }
    };

    match cli.command {
        Commands::Run(args) => {
            init_tracing(args.verbose);
            match execute_run(args) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("dotenv: {err:#}");
                    1
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn file_paths(raw: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for value in raw {
        let before = files.len();
        files.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(PathBuf::from),
        );
        if files.len() == before {
            anyhow::bail!("`-f/--file` requires at least one path");
        }
    }

    if files.is_empty() {
        files.push(PathBuf::from(DEFAULT_FILE));
    }
    Ok(files)
}

fn execute_run(args: RunArgs) -> anyhow::Result<i32> {
    let files = file_paths(&args.files)?;
    let quote_mode = if args.strict_quotes {
        QuoteMode::Strict
    } else {
        QuoteMode::Lenient
    };

    let mut loader = EnvLoader::new()
        .paths(&files)
        .override_existing(args.override_existing)
        .quote_mode(quote_mode)
        .target(TargetEnv::from_memory(snapshot_process_env()));
    for keys in &args.required {
        loader = loader.required(keys);
    }

    let report = loader.load()?;
    tracing::debug!(
        loaded = report.loaded,
        skipped_existing = report.skipped_existing,
        files_read = report.files_read,
        "environment prepared"
    );

    let target = loader
        .into_target()
        .into_memory()
        .context("loader target is not an in-memory environment")?;

    let Some((program, program_args)) = args.command.split_first() else {
        anyhow::bail!("missing command after `run`");
    };
    let mut command = Command::new(program);
    command.args(program_args);
    for (key, value) in changed_vars(&target) {
        if value.contains('\0') {
            return Err(Error::InvalidValue { key: key.clone() }.into());
        }
        command.env(key, value);
    }

    execute_command(command, program)
}

fn snapshot_process_env() -> BTreeMap<String, String> {
    env::vars_os()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// Variables whose value differs from the current process environment.
fn changed_vars(target: &BTreeMap<String, String>) -> impl Iterator<Item = (&String, &String)> {
    target.iter().filter(|(key, value)| {
        env::var_os(key).is_none_or(|current| current.to_string_lossy() != value.as_str())
    })
}

#[cfg(unix)]
fn execute_command(mut command: Command, program: &OsString) -> anyhow::Result<i32> {
    let err = command.exec();
    Err(err).with_context(|| format!("failed to execute `{}`", program.to_string_lossy()))
}

#[cfg(not(unix))]
fn execute_command(mut command: Command, program: &OsString) -> anyhow::Result<i32> {
    let status = command
        .status()
        .with_context(|| format!("failed to execute `{}`", program.to_string_lossy()))?;
    Ok(status.code().unwrap_or(1))
}
