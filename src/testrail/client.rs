//! TestRail API v2 client.
//!
//! Thin typed wrapper over the handful of endpoints the relay needs. Every
//! call returns a [`RemoteApiError`] on transport failure, non-success status
//! or an undecodable body; non-success bodies are logged before returning.

use crate::config::Config;
use crate::models::CaseResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Errors raised while talking to TestRail.
#[derive(Debug, Error)]
pub enum RemoteApiError {
    #[error("TestRail API error {status} on {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: String,
        message: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no runs found for project {project_id}")]
    NoRunsFound { project_id: u64 },

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A TestRail project.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[allow(dead_code)] // Response field
    pub id: u64,
    pub name: String,
}

/// A TestRail suite.
#[derive(Debug, Clone, Deserialize)]
pub struct Suite {
    #[allow(dead_code)] // Response field
    pub id: u64,
    pub name: String,
}

/// A TestRail run.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRun {
    pub id: u64,
    #[serde(default)]
    #[allow(dead_code)] // Response field
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// `get_runs` answers with a bare array on older instances and a paginated
/// object on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunList {
    Legacy(Vec<TestRun>),
    Paginated { runs: Vec<TestRun> },
}

impl From<RunList> for Vec<TestRun> {
    fn from(list: RunList) -> Self {
        match list {
            RunList::Legacy(runs) | RunList::Paginated { runs } => runs,
        }
    }
}

/// Body of `add_run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddRun {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,
    pub include_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_ids: Option<Vec<u64>>,
}

#[derive(Debug, Serialize)]
struct AddResults<'a> {
    results: &'a [CaseResult],
}

/// Client for one TestRail instance.
pub struct TestRailClient {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    api_key: String,
}

impl TestRailClient {
    /// Create a client for the instance described by `config`.
    pub fn from_config(config: &Config, timeout_seconds: u64) -> Result<Self, RemoteApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(RemoteApiError::Client)?;

        Ok(Self::with_http_client(
            http_client,
            config.base_url(),
            config.username.clone(),
            config.api_key.clone(),
        ))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: String,
        username: String,
        api_key: String,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_key,
        }
    }

    /// Full URL of an API endpoint such as `get_run/1`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/index.php?/api/v2/{}", self.base_url, endpoint)
    }

    pub async fn get_project(&self, project_id: u64) -> Result<Project, RemoteApiError> {
        self.get(&format!("get_project/{}", project_id)).await
    }

    pub async fn get_suite(&self, suite_id: u64) -> Result<Suite, RemoteApiError> {
        self.get(&format!("get_suite/{}", suite_id)).await
    }

    pub async fn get_run(&self, run_id: u64) -> Result<TestRun, RemoteApiError> {
        self.get(&format!("get_run/{}", run_id)).await
    }

    /// Runs of a project, most recent first.
    pub async fn get_runs(&self, project_id: u64) -> Result<Vec<TestRun>, RemoteApiError> {
        let list: RunList = self.get(&format!("get_runs/{}", project_id)).await?;
        Ok(list.into())
    }

    pub async fn add_run(&self, project_id: u64, run: &AddRun) -> Result<TestRun, RemoteApiError> {
        self.post(&format!("add_run/{}", project_id), run).await
    }

    /// Submit results for cases; returns the created result records.
    pub async fn add_results_for_cases(
        &self,
        run_id: u64,
        results: &[CaseResult],
    ) -> Result<Vec<serde_json::Value>, RemoteApiError> {
        self.post(
            &format!("add_results_for_cases/{}", run_id),
            &AddResults { results },
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RemoteApiError> {
        let request = self
            .http_client
            .get(self.endpoint_url(endpoint))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        self.send(endpoint, request).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, RemoteApiError> {
        let request = self.http_client.post(self.endpoint_url(endpoint)).json(body);
        self.send(endpoint, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteApiError> {
        debug!("TestRail request: {}", endpoint);

        let response = request
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !status.is_success() {
            error!("TestRail API error {} on {}: {}", status, endpoint, body);
            return Err(RemoteApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| RemoteApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> RemoteApiError {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("cannot connect to TestRail at {}", self.base_url)
        } else {
            e.to_string()
        };

        RemoteApiError::Transport {
            endpoint: endpoint.to_string(),
            message,
            source: e,
        }
    }
}
