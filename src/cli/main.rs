//! Background removal command line tool
//!
//! `remove-bg <INPUT_PATH> <OUTPUT_PATH>` reads one image, removes its
//! background and writes the PNG result. Tuning happens through environment
//! variables only, see [`RemovalConfig::from_env`].

use crate::{
    config::RemovalConfig,
    processor::BackgroundRemovalProcessor,
    services::ImageIOService,
    tracing_config::{init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Remove the background from a single image
#[derive(Parser, Debug)]
#[command(name = "remove-bg")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Source image
    #[arg(value_name = "INPUT_PATH", allow_hyphen_values = true)]
    pub input: PathBuf,

    /// Destination for the PNG result, created or replaced
    #[arg(value_name = "OUTPUT_PATH", allow_hyphen_values = true)]
    pub output: PathBuf,
}

/// One-line usage text printed for malformed invocations
#[must_use]
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

/// Entry point of the `remove-bg` binary
#[must_use]
pub fn main() -> ExitCode {
    run(std::env::args_os())
}

/// Parse a full argument list, the first entry being the program name
///
/// Exactly two user arguments are accepted and both are taken literally, so
/// `--` and paths starting with `-` are paths rather than clap syntax.
#[must_use]
pub fn parse_args<I, T>(args: I) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let [program, input, output] = <[OsString; 3]>::try_from(args).ok()?;
    Cli::try_parse_from([program, OsString::from("--"), input, output]).ok()
}

/// Run the tool with explicit arguments, the first being the program name
///
/// Exit code 1 covers both usage errors and runtime failures.
pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    run_with(args, BackgroundRemovalProcessor::new)
}

/// Same as [`run`] with a caller-supplied processor constructor
pub fn run_with<I, T, F>(args: I, make_processor: F) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    F: FnOnce(RemovalConfig) -> crate::Result<BackgroundRemovalProcessor>,
{
    let Some(cli) = parse_args(args) else {
        eprintln!("{}", usage());
        return ExitCode::FAILURE;
    };

    if let Err(e) = init_cli_tracing() {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match execute_with(&cli, make_processor) {
        Ok(()) => {
            println!("{}", success_line(&cli.output));
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::debug!(error = ?e, "Background removal run failed");
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Status line printed on stdout after the output is written
///
/// Non-UTF-8 bytes in the path are shown as U+FFFD.
#[must_use]
pub fn success_line(output: &Path) -> String {
    format!("OK: {}", output.as_os_str().to_string_lossy())
}

fn execute_with<F>(cli: &Cli, make_processor: F) -> Result<()>
where
    F: FnOnce(RemovalConfig) -> crate::Result<BackgroundRemovalProcessor>,
{
    let _span = spans::file_processing(&cli.input, &cli.output).entered();

    let config = RemovalConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        model = %config.model,
        backend = %config.backend,
        execution_provider = %config.execution_provider,
        "Starting background removal"
    );

    let input = ImageIOService::read_input(&cli.input)?;
    let output = make_processor(config)
        .and_then(|mut processor| processor.process_bytes(&input))
        .context("Background removal failed")?;
    ImageIOService::write_output(&cli.output, &output)?;

    tracing::info!(output_bytes = output.len(), "Background removal complete");
    Ok(())
}
