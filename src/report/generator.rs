//! Local report generation.
//!
//! Renders the aggregated case results of a run as Markdown or JSON, for
//! dry runs and for archiving alongside CI artifacts.

use crate::models::{CaseResult, CaseStatus, PublishReport, ReportMetadata, ResultSummary};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &PublishReport) -> String {
    let mut output = String::new();

    output.push_str("# TestRail Relay Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_results_section(&report.results));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Run Summary:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Executions:** {}\n", metadata.executions));
    section.push_str(&format!("- **Assertions:** {}\n", metadata.assertions));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &ResultSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} Passed | {} Failed | {} Skipped | **Total** |\n",
        CaseStatus::Passed.emoji(),
        CaseStatus::Failed.emoji(),
        CaseStatus::Skipped.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.passed, summary.failed, summary.skipped, summary.total
    ));

    section
}

/// Generate the per-case results section.
fn generate_results_section(results: &[CaseResult]) -> String {
    let mut section = String::new();

    section.push_str("## Cases\n\n");

    if results.is_empty() {
        section.push_str("No case IDs were referenced by any assertion.\n\n");
        return section;
    }

    // Failures first, then by case ID
    let mut ordered: Vec<&CaseResult> = results.iter().collect();
    ordered.sort_by_key(|r| (r.status != CaseStatus::Failed, r.case_id));

    for result in ordered {
        section.push_str(&generate_case_block(result));
    }

    section
}

/// Generate a single case block.
fn generate_case_block(result: &CaseResult) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} C{} {}\n\n",
        result.status.emoji(),
        result.case_id,
        result.status
    ));

    if let Some(ref version) = result.version {
        block.push_str(&format!("**Version:** {}\n\n", version));
    }

    let comment = result.comment.trim_start_matches('\n');
    if !comment.is_empty() {
        block.push_str("```\n");
        block.push_str(comment);
        block.push_str("\n```\n\n");
    }

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by testrail-relay*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &PublishReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn case(case_id: u64, status: CaseStatus, comment: &str) -> CaseResult {
        CaseResult {
            case_id,
            status,
            status_id: status.status_id(),
            comment: comment.to_string(),
            version: Some("3.1.0".to_string()),
            custom: BTreeMap::new(),
        }
    }

    fn create_test_report() -> PublishReport {
        let metadata = ReportMetadata {
            source: "newman/run.json".to_string(),
            generated_at: Utc::now(),
            executions: 4,
            assertions: 9,
        };

        PublishReport::new(
            metadata,
            vec![
                case(7, CaseStatus::Passed, "\nC7 status is 200: PASSED"),
                case(
                    12,
                    CaseStatus::Failed,
                    "\nC12 has body: FAILED\nError message: expected object",
                ),
                case(3, CaseStatus::Skipped, ""),
            ],
        )
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# TestRail Relay Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`newman/run.json`"));
        assert!(markdown.contains("| 1 | 1 | 1 | **3** |"));
        assert!(markdown.contains("Error message: expected object"));
    }

    #[test]
    fn test_failures_listed_first() {
        let markdown = generate_markdown_report(&create_test_report());
        let failed = markdown.find("C12 Failed").unwrap();
        let skipped = markdown.find("C3 Skipped").unwrap();
        let passed = markdown.find("C7 Passed").unwrap();
        assert!(failed < skipped);
        assert!(skipped < passed);
    }

    #[test]
    fn test_skipped_case_has_no_comment_block() {
        let block = generate_case_block(&case(3, CaseStatus::Skipped, ""));
        assert!(block.contains("C3 Skipped"));
        assert!(block.contains("**Version:** 3.1.0"));
        assert!(!block.contains("```"));
    }

    #[test]
    fn test_empty_results() {
        let section = generate_results_section(&[]);
        assert!(section.contains("No case IDs"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"status_id\": 5"));
        assert!(json.contains("\"case_id\": 12"));
    }
}
