//! Report rendering.
//!
//! Turns score reports, before/after comparisons, and the change log
//! into human-readable text or structured JSON.

use ally_core::{ChangeRecord, IssueCategory, ScoreDiff, ScoreReport};
use serde::Serialize;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Structured JSON.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Everything one report covers. The diff and change log are present
/// only after an enhancement run.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub report: &'a ScoreReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<&'a ScoreDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<&'a [ChangeRecord]>,
}

/// Render a report in the requested format.
pub fn render(document: &ReportDocument<'_>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(document),
        OutputFormat::Json => serde_json::to_string_pretty(document)
            .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize report: {}\"}}", e)),
    }
}

fn render_text(document: &ReportDocument<'_>) -> String {
    let report = document.report;
    let mut output = String::new();

    output.push_str("=== Presentation Accessibility Report ===\n\n");
    output.push_str(&format!("Overall score: {:.0}/100\n", report.overall));
    output.push_str(&format!("{}\n\n", report.summary()));

    output.push_str("Category scores:\n");
    for category in IssueCategory::ALL {
        let score = report.category_scores.get(&category).copied().unwrap_or(100.0);
        output.push_str(&format!("  {:<16} {:>5.0}\n", category.as_str(), score));
    }
    output.push('\n');

    if report.issues.is_empty() {
        output.push_str("No accessibility issues found.\n");
    } else {
        output.push_str(&format!("Found {} issue(s):\n\n", report.issues.len()));
        let mut current_slide = usize::MAX;
        for issue in &report.issues {
            if issue.slide != current_slide {
                current_slide = issue.slide;
                output.push_str(&format!("--- Slide {} ---\n", current_slide + 1));
            }
            output.push_str(&format!(
                "[{}] {}: {}\n",
                issue.severity, issue.category, issue.message
            ));
            if let Some(ref suggestion) = issue.suggested_fix {
                output.push_str(&format!("  Fix: {}\n", suggestion));
            }
        }
        output.push('\n');
    }

    if let Some(diff) = document.diff {
        output.push_str("Before/after:\n");
        output.push_str(&format!(
            "  Overall: {:.0} -> {:.0}\n",
            diff.before_overall, diff.after_overall
        ));
        for delta in &diff.categories {
            if (delta.after - delta.before).abs() > f64::EPSILON {
                output.push_str(&format!(
                    "  {:<16} {:>5.0} -> {:>5.0}\n",
                    delta.category.as_str(),
                    delta.before,
                    delta.after
                ));
            }
        }
        output.push_str(&format!(
            "  {} issue(s) resolved, {} remaining, {} introduced\n\n",
            diff.resolved.len(),
            diff.remaining.len(),
            diff.introduced.len()
        ));
    }

    if let Some(changes) = document.changes {
        if changes.is_empty() {
            output.push_str("No changes were applied.\n");
        } else {
            output.push_str(&format!("Applied {} change(s):\n", changes.len()));
            for change in changes {
                output.push_str(&format!(
                    "  {}: {} \"{}\" -> \"{}\"\n",
                    change.shape, change.field, change.old_value, change.new_value
                ));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use ally_core::{Issue, Severity, ShapeRef};
    use std::collections::BTreeMap;

    fn sample_report() -> ScoreReport {
        let mut category_scores = BTreeMap::new();
        for category in IssueCategory::ALL {
            category_scores.insert(category, 100.0);
        }
        category_scores.insert(IssueCategory::AltText, 0.0);
        ScoreReport {
            overall: 72.0,
            category_scores,
            issues: vec![Issue::for_shape(
                ShapeRef::new(0, 1),
                IssueCategory::AltText,
                Severity::High,
                "Image on slide 1 is missing alternative text",
            )
            .with_suggestion("Add a description")],
        }
    }

    #[test]
    fn test_text_report_lists_issues_per_slide() {
        let report = sample_report();
        let rendered = render(
            &ReportDocument {
                report: &report,
                diff: None,
                changes: None,
            },
            OutputFormat::Text,
        );
        assert!(rendered.contains("Overall score: 72/100"));
        assert!(rendered.contains("--- Slide 1 ---"));
        assert!(rendered.contains("[HIGH] Alt Text:"));
        assert!(rendered.contains("Fix: Add a description"));
    }

    #[test]
    fn test_json_report_is_valid() {
        let report = sample_report();
        let rendered = render(
            &ReportDocument {
                report: &report,
                diff: None,
                changes: None,
            },
            OutputFormat::Json,
        );
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(parsed["report"]["overall"], 72.0);
        assert!(parsed["report"]["issues"].is_array());
        assert!(parsed.get("diff").is_none());
    }

    #[test]
    fn test_change_log_rendered() {
        let report = sample_report();
        let changes = vec![ChangeRecord::new(
            ShapeRef::new(0, 0),
            "min_font_pt",
            "12.0pt",
            "18.0pt",
        )];
        let rendered = render(
            &ReportDocument {
                report: &report,
                diff: None,
                changes: Some(&changes),
            },
            OutputFormat::Text,
        );
        assert!(rendered.contains("Applied 1 change(s)"));
        assert!(rendered.contains("min_font_pt"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }
}
