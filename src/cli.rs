use crate::config::PipelineConfig;
use crate::errors::{AppError, AppResult};
use crate::extractor::extract;
use crate::models::FailurePolicy;
use crate::pipeline::Pipeline;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// CLI metadata constants
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
const APP_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

fn continue_on_error_arg() -> Arg<'static> {
    Arg::new("continue_on_error")
        .long("continue-on-error")
        .help("Keep publishing after a failed write and list the failed transactions at the end")
        .action(ArgAction::SetTrue)
}

/// Builds the command-line definition.
pub fn build_command() -> Command<'static> {
    Command::new("saleevent-ingest")
        .version(APP_VERSION)
        .author(APP_AUTHOR)
        .about(APP_ABOUT)
        .subcommand(
            Command::new("env")
                .about("Run one batch with configuration from environment variables (default)")
                .after_help("Reads AZURE_STORAGE_CONNECTION_STRING, AZURE_TABLE_CONNECTION_STRING,\nBLOB_CONTAINER_NAME, BLOB_NAME and TABLE_NAME.\nOptional: ARCHIVE_CONTAINER_NAME, ON_ERROR, REQUEST_TIMEOUT_SECS.")
                .arg(continue_on_error_arg()),
        )
        .subcommand(
            Command::new("toml")
                .about("Run one batch using a TOML configuration file")
                .arg(
                    Arg::new("config")
                        .help("Path to the TOML config file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(continue_on_error_arg()),
        )
        .subcommand(
            Command::new("inspect")
                .about("Extract a local XML file and print the table rows it would produce, without writing anything")
                .arg(
                    Arg::new("file")
                        .help("Path to the XML batch file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

/// Parses command-line arguments and executes the selected command.
///
/// Without a subcommand the configuration is read from the environment, as
/// with `env`.
///
/// # Returns
///
/// Returns `Ok(())` once every event has been published. Returns an error if:
/// - Configuration is missing or invalid
/// - The source document cannot be read or is not well-formed XML
/// - A table or blob write fails
pub async fn cli() -> AppResult<()> {
    let matches = build_command().get_matches();
    run_matches(&matches).await
}

async fn run_matches(matches: &ArgMatches) -> AppResult<()> {
    match matches.subcommand() {
        Some(("toml", sub)) => {
            let config_path = required_path(sub, "config")?;
            let config = PipelineConfig::from_toml_file(config_path)?;
            run_pipeline(apply_overrides(config, sub)).await
        }
        Some(("inspect", sub)) => {
            let file = required_path(sub, "file")?;
            inspect(file).await
        }
        Some(("env", sub)) => {
            let config = PipelineConfig::from_env()?;
            run_pipeline(apply_overrides(config, sub)).await
        }
        _ => run_pipeline(PipelineConfig::from_env()?).await,
    }
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> AppResult<&'a PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .ok_or_else(|| AppError::InvalidConfig(format!("missing <{id}> argument")))
}

fn apply_overrides(mut config: PipelineConfig, matches: &ArgMatches) -> PipelineConfig {
    if matches
        .get_one::<bool>("continue_on_error")
        .copied()
        .unwrap_or(false)
    {
        config.on_error = FailurePolicy::Continue;
    }
    config
}

async fn run_pipeline(config: PipelineConfig) -> AppResult<()> {
    let pipeline = Pipeline::from_config(&config)?;
    let report = pipeline.run().await?;
    report.into_result()?;
    println!("Done.");
    Ok(())
}

/// Extracts a local XML file and prints the table row of every sale event as
/// one JSON line, in document order. Nothing is written to storage.
pub async fn inspect(path: &Path) -> AppResult<()> {
    let xml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::SourceUnavailable(format!("{}: {e}", path.display())))?;

    let mut stdout = std::io::stdout().lock();
    let rows = write_rows(&xml, &mut stdout)?;

    info!(
        file = %path.display(),
        rows,
        "Inspection finished, nothing was written"
    );
    Ok(())
}

/// Writes one JSON table row per extracted sale event to `out`.
///
/// Returns the number of rows written.
pub fn write_rows<W: Write>(xml: &str, out: &mut W) -> AppResult<usize> {
    let events = extract(xml)?;
    for extracted in &events {
        let line = serde_json::to_string(&extracted.event.to_row())
            .map_err(|e| AppError::Io(format!("Failed to encode row: {e}")))?;
        writeln!(out, "{line}")?;
    }
    Ok(events.len())
}
