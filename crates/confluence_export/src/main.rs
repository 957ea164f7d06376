mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use confluence_export_core::client::{ConfluenceClient, ConfluenceClientConfig};
use confluence_export_core::config::{Credentials, DEFAULT_CONFIG_FILENAME, load_config};
use confluence_export_core::convert::ExternalConverter;
use confluence_export_core::driver::{ExportOptions, ExportReport, run_export};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "confluence-export",
    version,
    about = "Export Confluence spaces to a local tree of Markdown files"
)]
struct Cli {
    #[arg(
        short = 'a',
        long = "accountname",
        value_name = "NAME",
        help = "Confluence account name (NAME.atlassian.net)"
    )]
    account_name: String,
    #[arg(
        short = 'd',
        long = "outputdir",
        value_name = "PATH",
        help = "Local output directory"
    )]
    output_dir: PathBuf,
    #[arg(
        short = 's',
        long = "spaces",
        value_name = "KEYS",
        value_delimiter = ',',
        help = "Comma-separated list of space keys to export (default: all)"
    )]
    spaces: Vec<String>,
    #[arg(long, value_name = "PATH", help = "Config file (default: ./.confluence-export.toml)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_logging(cli.verbose)?;

    let credentials = Credentials::from_env()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let config = load_config(&config_path)?;
    let settings = config.resolve(&cli.account_name)?;

    let converter = ExternalConverter::pandoc(settings.pandoc_path.clone());
    if !converter.is_available() {
        warn!(
            program = %converter.program().display(),
            "pandoc is not installed or not on PATH; pages will be skipped"
        );
    }

    let mut client = ConfluenceClient::new(
        ConfluenceClientConfig::from_settings(&settings),
        credentials,
    )?;
    info!(
        account = %cli.account_name,
        site = %client.config().site_url,
        "fetching spaces"
    );

    let report = run_export(
        &ExportOptions {
            output_dir: cli.output_dir.clone(),
            space_keys: cli.spaces.clone(),
        },
        &mut client,
        &converter,
    )?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize export report")?
        );
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &ExportReport) {
    println!("export report");
    println!("output_dir: {}", report.output_dir);
    println!("spaces.found: {}", report.spaces_found);
    println!("spaces.selected: {}", report.spaces_selected);
    println!("spaces.exported: {}", report.spaces_exported);
    println!("spaces.skipped: {}", report.spaces_skipped);
    println!("pages.found: {}", report.pages_found);
    println!("pages.exported: {}", report.pages_exported);
    println!("pages.skipped: {}", report.pages_skipped);
    println!("attachments.written: {}", report.attachments_written);
    println!("attachments.failed: {}", report.attachments_failed);
    println!("attachments.skipped: {}", report.attachments_skipped);
    println!("request_count: {}", report.request_count);
    if report.errors.is_empty() {
        println!("errors: <none>");
    } else {
        println!("errors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }
}
