//! Assertion-to-case aggregation.
//!
//! Folds the assertions of one run into exactly one result per TestRail
//! case ID. A failure for a case always wins; a status is never downgraded.

use crate::models::{Assertion, CaseResult, CaseStatus, Execution, ResultExtras};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// ASCII word boundaries and digits only; a neighbouring `é` or `٣` is not a word character.
static CASE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)C([0-9]+)(?-u:\b)").expect("case ID pattern is valid")
});

/// Extract case IDs from an assertion label.
///
/// The label is split on single spaces and each token is matched on its own,
/// keeping the first `C<digits>` hit per token. A token like `seeC123` does
/// not match because there is no word boundary before the `C`. IDs are
/// numeric, so `C007` and `C7` name the same case.
pub fn extract_case_ids(label: &str) -> Vec<u64> {
    label
        .split(' ')
        .filter_map(|token| CASE_ID_PATTERN.captures(token))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Status and comment derived from one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: CaseStatus,
    pub comment: Option<String>,
}

/// Classify a single assertion.
pub fn classify(assertion: &Assertion) -> Classification {
    if assertion.skipped {
        return Classification {
            status: CaseStatus::Skipped,
            comment: None,
        };
    }

    match &assertion.error {
        Some(error) => Classification {
            status: CaseStatus::Failed,
            comment: Some(format!(
                "{}: FAILED\nError message: {}",
                assertion.assertion, error.message
            )),
        },
        None => Classification {
            status: CaseStatus::Passed,
            comment: Some(format!("{}: PASSED", assertion.assertion)),
        },
    }
}

/// Insertion-ordered set of distinct comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSet(IndexSet<String>);

impl CommentSet {
    /// Add a comment unless an identical one is already present.
    pub fn insert(&mut self, comment: String) -> bool {
        self.0.insert(comment)
    }

    #[allow(dead_code)] // Inspected by tests
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Join the comments, each prefixed by a newline.
    pub fn flatten(&self) -> String {
        self.0.iter().map(|c| format!("\n{}", c)).collect()
    }
}

/// A case result while the aggregation pass is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    pub status: CaseStatus,
    pub comments: CommentSet,
}

/// Aggregates the assertions of a single run.
///
/// One instance per run; [`ResultAggregator::finalize`] consumes it.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: IndexMap<u64, PendingResult>,
    assertions_seen: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the aggregation pass over all executions of a run.
    pub fn from_executions(executions: &[Execution]) -> Self {
        let mut aggregator = Self::new();
        for execution in executions {
            aggregator.add_execution(execution);
        }
        aggregator
    }

    /// Fold every assertion of one execution.
    pub fn add_execution(&mut self, execution: &Execution) {
        if let Some(url) = execution.request.as_ref().and_then(|r| r.url.as_ref()) {
            debug!(
                "Execution {} ({})",
                execution.name().unwrap_or("<unnamed>"),
                url
            );
        }

        for assertion in execution.assertions() {
            self.add_assertion(assertion);
        }
    }

    /// Fold one assertion into every case ID its label references.
    pub fn add_assertion(&mut self, assertion: &Assertion) {
        self.assertions_seen += 1;

        let case_ids = extract_case_ids(&assertion.assertion);
        if case_ids.is_empty() {
            return;
        }

        let classification = classify(assertion);
        for case_id in case_ids {
            debug!("C{} <- {} ({})", case_id, assertion.assertion, classification.status);
            self.merge(case_id, classification.clone());
        }
    }

    /// Merge a classification into the result for `case_id`.
    pub fn merge(&mut self, case_id: u64, incoming: Classification) {
        match self.results.get_mut(&case_id) {
            None => {
                let mut comments = CommentSet::default();
                if let Some(comment) = incoming.comment {
                    comments.insert(comment);
                }
                self.results.insert(
                    case_id,
                    PendingResult {
                        status: incoming.status,
                        comments,
                    },
                );
            }
            Some(existing) => {
                if let Some(comment) = incoming.comment {
                    existing.comments.insert(comment);
                }
                if incoming.status == CaseStatus::Failed {
                    existing.status = CaseStatus::Failed;
                }
            }
        }
    }

    /// Look at a case result before finalizing.
    #[allow(dead_code)] // Inspected by tests
    pub fn get(&self, case_id: u64) -> Option<&PendingResult> {
        self.results.get(&case_id)
    }

    /// Referenced case IDs, in first-seen order.
    #[allow(dead_code)] // Inspected by tests
    pub fn case_ids(&self) -> Vec<u64> {
        self.results.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of assertions folded so far, matched or not.
    pub fn assertions_seen(&self) -> usize {
        self.assertions_seen
    }

    /// Flatten comments and attach the uniform extras, ending the pass.
    ///
    /// Results keep the order in which their case IDs were first seen.
    pub fn finalize(self, extras: &ResultExtras) -> Vec<CaseResult> {
        self.results
            .into_iter()
            .map(|(case_id, pending)| CaseResult {
                case_id,
                status: pending.status,
                status_id: pending.status.status_id(),
                comment: pending.comments.flatten(),
                version: extras.version.clone(),
                custom: extras.custom.clone(),
            })
            .collect()
    }
}
