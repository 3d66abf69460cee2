//! testrail-relay - forward Newman run results to TestRail
//!
//! A CLI tool that reads a finished Newman run summary, folds the
//! assertions that reference TestRail case IDs into one result per
//! case, and posts those results to a TestRail run.
//!
//! Exit codes:
//!   0 - Success, or no case IDs found (nothing to publish)
//!   1 - Runtime error (bad summary, config, TestRail API failure, etc.)

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod testrail;

use analysis::ResultAggregator;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, FileConfig, DEFAULT_CONFIG_FILE};
use models::{PublishReport, ReportMetadata, RunSummary};
use testrail::TestRailClient;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("testrail-relay v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_relay(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Relay failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .testrail-relay.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = FileConfig::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with example settings.", DEFAULT_CONFIG_FILE);
    println!("   Keep the API key in TESTRAIL_APIKEY rather than in the file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Aggregate the run and publish it. Returns the exit code.
async fn run_relay(args: Args) -> Result<i32> {
    let summary_path = args
        .summary
        .clone()
        .context("A run summary is required (--summary FILE)")?;

    // Step 1: Read the finished run
    println!("📥 Reading run summary: {}", summary_path.display());
    let summary = RunSummary::load(&summary_path)?;
    let executions = summary.executions();

    // Step 2: Fold assertions into per-case results
    let aggregator = ResultAggregator::from_executions(executions);
    let assertions = aggregator.assertions_seen();
    info!(
        "Found {} case IDs across {} assertions in {} executions",
        aggregator.len(),
        assertions,
        executions.len()
    );

    if aggregator.is_empty() {
        println!(
            "\nℹ️  No TestRail case IDs (C<number>) found in {} assertions. Nothing to publish.",
            assertions
        );
        return Ok(0);
    }

    // Step 3: Configuration is only needed from here on
    let config = if args.dry_run {
        match load_config(&args) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Dry run without TestRail configuration: {:#}", e);
                None
            }
        }
    } else {
        Some(load_config(&args)?)
    };

    let extras = config
        .as_ref()
        .map(Config::result_extras)
        .unwrap_or_default();
    let results = aggregator.finalize(&extras);

    let metadata = ReportMetadata {
        source: summary_path.display().to_string(),
        generated_at: Utc::now(),
        executions: executions.len(),
        assertions,
    };
    let report = PublishReport::new(metadata, results);

    if let Some(ref output_path) = args.output {
        std::fs::write(output_path, render_report(&report, args.format)?)
            .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
        info!("Report written to {}", output_path.display());
    }

    print_summary(&report);

    if args.dry_run {
        println!("\n{}", render_report(&report, args.format)?);
        println!("✅ Dry run complete. No TestRail calls were made.");
        return Ok(0);
    }

    // Step 4: Publish
    let config = config.context("TestRail configuration is required")?;
    println!(
        "\n🚀 Publishing {} results to {} (project {})",
        report.results.len(),
        config.base_url(),
        config.project_id
    );

    let client = TestRailClient::from_config(&config, args.timeout)?;
    let outcome = testrail::publish(&client, &config, &report.results)
        .await
        .context("Failed to publish results to TestRail")?;

    println!(
        "\n✅ {} results published to run {}: {}",
        outcome.submitted, outcome.run_id, outcome.run_url
    );

    Ok(0)
}

/// Print per-status counts.
fn print_summary(report: &PublishReport) {
    let summary = &report.summary;
    println!("\n📊 Case Summary:");
    println!("   Cases: {}", summary.total);
    println!(
        "   - ✅ Passed: {} | ❌ Failed: {} | ⏭️ Skipped: {}",
        summary.passed, summary.failed, summary.skipped
    );
}

fn render_report(report: &PublishReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report),
    })
}

/// Load configuration: file (explicit or default) overridden by the environment.
fn load_config(args: &Args) -> Result<Config> {
    let file = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        FileConfig::load(config_path)?
    } else {
        match FileConfig::load_default() {
            Ok(Some(file)) => {
                info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
                file
            }
            Ok(None) => {
                debug!("No config file found, using environment only");
                FileConfig::default()
            }
            Err(e) => {
                warn!("Failed to load config: {:#}", e);
                FileConfig::default()
            }
        }
    };

    let config = Config::from_env(file, &args.env_prefix)
        .context("Invalid TestRail configuration")?;
    debug!("Configuration: {:?}", config);

    Ok(config)
}
