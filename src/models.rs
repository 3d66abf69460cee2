//! Data models for the result relay.
//!
//! This module contains the structures read from a Newman run summary,
//! the per-case results sent to TestRail, and the local report types.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A completed run as exported by Newman's JSON reporter.
///
/// Both the full export (`{"run": {"executions": [...]}}`) and a bare
/// `{"executions": [...]}` document are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunSummary {
    Export { run: Run },
    Bare(Run),
}

impl RunSummary {
    /// Load a run summary from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run summary: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse run summary: {}", path.display()))
    }

    /// Parse a run summary from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// The executions of the run, in order.
    pub fn executions(&self) -> &[Execution] {
        match self {
            RunSummary::Export { run } | RunSummary::Bare(run) => &run.executions,
        }
    }
}

/// The `run` section of a summary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub executions: Vec<Execution>,
}

/// One executed request and the assertions evaluated against its response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub item: Option<ItemRef>,
    #[serde(default)]
    pub request: Option<RequestDescriptor>,
    #[serde(default)]
    pub assertions: Option<Vec<Assertion>>,
}

impl Execution {
    /// Assertions of this execution; an absent list is treated as empty.
    pub fn assertions(&self) -> &[Assertion] {
        self.assertions.as_deref().unwrap_or(&[])
    }

    /// Display name of the executed item, if the summary carries one.
    pub fn name(&self) -> Option<&str> {
        self.item.as_ref().and_then(|item| item.name.as_deref())
    }
}

/// Collection item reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Request descriptor of an execution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub url: Option<RequestUrl>,
}

/// A request URL, either as a raw string or as Postman's structured form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestUrl {
    Raw(String),
    Parts {
        #[serde(default)]
        raw: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        host: Vec<String>,
        #[serde(default)]
        path: Vec<String>,
    },
    /// Any other shape; kept so an odd URL never fails the whole summary.
    Other(serde_json::Value),
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestUrl::Raw(url) => write!(f, "{}", url),
            RequestUrl::Parts { raw: Some(raw), .. } => write!(f, "{}", raw),
            RequestUrl::Parts {
                protocol,
                host,
                path,
                ..
            } => {
                if let Some(protocol) = protocol {
                    write!(f, "{}://", protocol)?;
                }
                write!(f, "{}", host.join("."))?;
                if !path.is_empty() {
                    write!(f, "/{}", path.join("/"))?;
                }
                Ok(())
            }
            RequestUrl::Other(value) => write!(f, "{}", value),
        }
    }
}

/// A single assertion result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assertion {
    /// Assertion label, possibly containing case IDs such as `C123`.
    pub assertion: String,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub error: Option<AssertionError>,
}

/// The error attached to a failed assertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssertionError {
    #[serde(default)]
    pub message: String,
}

/// Outcome of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Skipped,
    Failed,
}

impl CaseStatus {
    /// TestRail's fixed status ID for this outcome.
    pub fn status_id(&self) -> u8 {
        match self {
            CaseStatus::Passed => 1,
            CaseStatus::Skipped => 4,
            CaseStatus::Failed => 5,
        }
    }

    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "✅",
            CaseStatus::Skipped => "⏭️",
            CaseStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Passed => write!(f, "Passed"),
            CaseStatus::Skipped => write!(f, "Skipped"),
            CaseStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Fields attached uniformly to every finalized result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultExtras {
    pub version: Option<String>,
    pub custom: BTreeMap<String, String>,
}

/// A finalized result for one TestRail case, in the shape TestRail accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub case_id: u64,
    #[serde(skip)]
    pub status: CaseStatus,
    pub status_id: u8,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub custom: BTreeMap<String, String>,
}

/// Counts of finalized results by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResultSummary {
    /// Creates a summary from a list of results.
    pub fn from_results(results: &[CaseResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result.status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
                CaseStatus::Skipped => summary.skipped += 1,
            }
        }

        summary
    }
}

/// Metadata about a local report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Path of the run summary that was aggregated.
    pub source: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of executions in the run.
    pub executions: usize,
    /// Number of assertions seen across all executions.
    pub assertions: usize,
}

/// The aggregated results of one run, as rendered locally.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub metadata: ReportMetadata,
    pub summary: ResultSummary,
    pub results: Vec<CaseResult>,
}

impl PublishReport {
    /// Creates a report, computing the summary from the results.
    pub fn new(metadata: ReportMetadata, results: Vec<CaseResult>) -> Self {
        Self {
            metadata,
            summary: ResultSummary::from_results(&results),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "collection": {"info": {"name": "demo"}},
        "run": {
            "stats": {},
            "executions": [
                {
                    "item": {"name": "Get user"},
                    "request": {"url": {"protocol": "https", "host": ["api", "example", "com"], "path": ["users", "1"]}},
                    "assertions": [
                        {"assertion": "C101 should return 200", "skipped": false},
                        {"assertion": "C101 should have header", "error": {"name": "AssertionError", "message": "missing header"}}
                    ]
                },
                {
                    "request": {"url": "https://api.example.com/health"}
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_newman_export() {
        let summary = RunSummary::from_json(EXPORT).unwrap();
        let executions = summary.executions();
        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].name(), Some("Get user"));
        assert_eq!(executions[0].assertions().len(), 2);
        assert!(!executions[0].assertions()[0].skipped);
        assert_eq!(
            executions[0].assertions()[1].error.as_ref().map(|e| e.message.as_str()),
            Some("missing header")
        );
        assert!(executions[1].assertions().is_empty());
    }

    #[test]
    fn test_parse_bare_run() {
        let summary =
            RunSummary::from_json(r#"{"executions": [{"assertions": [{"assertion": "C1 ok"}]}]}"#)
                .unwrap();
        assert_eq!(summary.executions().len(), 1);
    }

    #[test]
    fn test_request_url_display() {
        let summary = RunSummary::from_json(EXPORT).unwrap();
        let urls: Vec<String> = summary
            .executions()
            .iter()
            .filter_map(|e| e.request.as_ref()?.url.as_ref().map(|u| u.to_string()))
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://api.example.com/users/1".to_string(),
                "https://api.example.com/health".to_string()
            ]
        );
    }

    #[test]
    fn test_unusual_url_shape_is_tolerated() {
        let summary = RunSummary::from_json(
            r#"{"run": {"executions": [{"request": {"url": {"host": "api.example.com"}}, "assertions": [{"assertion": "C5 ok"}]}]}}"#,
        )
        .unwrap();
        assert_eq!(summary.executions()[0].assertions().len(), 1);
    }

    #[test]
    fn test_status_ids() {
        assert_eq!(CaseStatus::Passed.status_id(), 1);
        assert_eq!(CaseStatus::Skipped.status_id(), 4);
        assert_eq!(CaseStatus::Failed.status_id(), 5);
    }

    #[test]
    fn test_case_result_serialization() {
        let mut custom = BTreeMap::new();
        custom.insert("custom_env".to_string(), "staging".to_string());
        let result = CaseResult {
            case_id: 7,
            status: CaseStatus::Failed,
            status_id: 5,
            comment: "\nboom".to_string(),
            version: None,
            custom,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["case_id"], 7);
        assert_eq!(json["status_id"], 5);
        assert_eq!(json["custom_env"], "staging");
        assert!(json.get("version").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_result_summary() {
        let make = |case_id, status: CaseStatus| CaseResult {
            case_id,
            status,
            status_id: status.status_id(),
            comment: String::new(),
            version: None,
            custom: BTreeMap::new(),
        };
        let results = vec![
            make(1, CaseStatus::Passed),
            make(2, CaseStatus::Failed),
            make(3, CaseStatus::Failed),
            make(4, CaseStatus::Skipped),
        ];

        let summary = ResultSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 1);
    }
}
