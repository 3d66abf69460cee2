//! Publish pipeline.
//!
//! Resolves the target run (existing, latest, or newly created) and submits
//! the finalized results to it. Steps run strictly in order; a failed run
//! lookup or creation stops the pipeline before any results are posted.

use crate::config::{Config, RunSelector};
use crate::models::CaseResult;
use crate::testrail::client::{AddRun, RemoteApiError, TestRailClient, TestRun};
use tracing::{info, warn};

/// Title used when neither an override nor a project/suite name is available.
pub const FALLBACK_TITLE: &str = "Automated Test Run";

/// What a successful publish produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub run_id: u64,
    pub run_url: String,
    pub submitted: usize,
}

/// Resolve the run and submit `results` to it.
pub async fn publish(
    client: &TestRailClient,
    config: &Config,
    results: &[CaseResult],
) -> Result<PublishOutcome, RemoteApiError> {
    let case_ids: Vec<u64> = results.iter().map(|r| r.case_id).collect();

    let run = resolve_run(client, config, &case_ids).await?;
    info!("Submitting {} results to run {}", results.len(), run.id);

    let created = client.add_results_for_cases(run.id, results).await?;
    info!("TestRail accepted {} results", created.len());

    Ok(PublishOutcome {
        run_id: run.id,
        run_url: run_url(config, &run),
        submitted: results.len(),
    })
}

/// Find or create the run results go to.
pub async fn resolve_run(
    client: &TestRailClient,
    config: &Config,
    case_ids: &[u64],
) -> Result<TestRun, RemoteApiError> {
    match config.run {
        RunSelector::Existing(run_id) => {
            info!("Using existing run {}", run_id);
            client.get_run(run_id).await
        }
        RunSelector::Latest => {
            let runs = client.get_runs(config.project_id).await?;
            let run_id = select_latest(&runs, config.project_id)?;
            info!("Using latest run {} of project {}", run_id, config.project_id);
            client.get_run(run_id).await
        }
        RunSelector::New => {
            let title = resolve_title(client, config).await;
            let request = build_add_run(config, title, case_ids);
            info!("Creating run \"{}\" in project {}", request.name, config.project_id);
            client.add_run(config.project_id, &request).await
        }
    }
}

/// Title for a new run: the override, else `"<suite or project name>: Automated Test Run"`.
///
/// A failed name lookup is logged and falls back to [`FALLBACK_TITLE`].
pub async fn resolve_title(client: &TestRailClient, config: &Config) -> String {
    if let Some(title) = &config.title {
        return title.clone();
    }

    let name = match config.suite_id {
        Some(suite_id) => client.get_suite(suite_id).await.map(|suite| suite.name),
        None => client
            .get_project(config.project_id)
            .await
            .map(|project| project.name),
    };

    match name {
        Ok(name) => format!("{}: {}", name, FALLBACK_TITLE),
        Err(e) => {
            warn!("Could not derive run title: {}", e);
            FALLBACK_TITLE.to_string()
        }
    }
}

/// First entry of a run list, which TestRail orders most recent first.
pub fn select_latest(runs: &[TestRun], project_id: u64) -> Result<u64, RemoteApiError> {
    runs.first()
        .map(|run| run.id)
        .ok_or(RemoteApiError::NoRunsFound { project_id })
}

/// Body for a new run; restricted to `case_ids` unless all cases are included.
pub fn build_add_run(config: &Config, name: String, case_ids: &[u64]) -> AddRun {
    AddRun {
        name,
        suite_id: config.suite_id,
        include_all: config.include_all,
        case_ids: if config.include_all {
            None
        } else {
            Some(case_ids.to_vec())
        },
    }
}

/// Browser URL of a run.
pub fn run_url(config: &Config, run: &TestRun) -> String {
    run.url
        .clone()
        .unwrap_or_else(|| format!("{}/index.php?/runs/view/{}", config.base_url(), run.id))
}
