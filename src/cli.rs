//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// testrail-relay - forward Newman results to TestRail
///
/// Reads a Newman JSON run summary, collects assertions whose labels carry
/// TestRail case IDs (e.g. "C1234 status is 200"), and posts one result per
/// case to a TestRail run. Connection settings come from TESTRAIL_* environment
/// variables and an optional .testrail-relay.toml.
///
/// Examples:
///   testrail-relay --summary newman/run.json
///   testrail-relay --summary newman/run.json --dry-run
///   testrail-relay --summary newman/run.json --output results.md
///   testrail-relay --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Newman JSON run summary (from `newman run -r json`)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub summary: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .testrail-relay.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Prefix of the environment variables to read (PREFIX_DOMAIN, ...)
    #[arg(long, default_value = "TESTRAIL", value_name = "PREFIX")]
    pub env_prefix: String,

    /// Aggregate and print the results without contacting TestRail
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the aggregated results to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for --output and --dry-run (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Request timeout in seconds for TestRail API calls
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .testrail-relay.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for local reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match self.summary {
            Some(ref path) if !path.is_file() => {
                return Err(format!("Run summary not found: {}", path.display()));
            }
            None => return Err("A run summary is required (--summary FILE)".to_string()),
            _ => {}
        }

        let prefix_ok = !self.env_prefix.is_empty()
            && self
                .env_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !prefix_ok {
            return Err(format!(
                "Environment prefix must be non-empty and alphanumeric: {:?}",
                self.env_prefix
            ));
        }

        if self.timeout == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
