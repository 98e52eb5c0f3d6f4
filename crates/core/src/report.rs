//! Score reports and before/after comparison.

use crate::issue::{Issue, IssueCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete scoring pass over one presentation state. Created once per
/// analysis pass and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Weighted overall score in [0, 100].
    pub overall: f64,

    /// Per-category scores in [0, 100].
    pub category_scores: BTreeMap<IssueCategory, f64>,

    /// All findings, in stable document order.
    pub issues: Vec<Issue>,
}

impl ScoreReport {
    /// One-line verbal summary for the overall score.
    pub fn summary(&self) -> &'static str {
        if self.overall >= 90.0 {
            "Excellent accessibility. Minor improvements possible."
        } else if self.overall >= 70.0 {
            "Good accessibility. Some improvements recommended."
        } else if self.overall >= 50.0 {
            "Fair accessibility. Several important issues to address."
        } else {
            "Poor accessibility. Major issues need immediate attention."
        }
    }

    /// Issues belonging to the given slide, in order.
    pub fn issues_for_slide(&self, slide: usize) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.slide == slide)
    }

    /// Issues of one category, in order.
    pub fn issues_in_category(&self, category: IssueCategory) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.category == category)
    }
}

/// Per-category before/after score movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDelta {
    pub category: IssueCategory,
    pub before: f64,
    pub after: f64,
}

impl CategoryDelta {
    pub fn improvement(&self) -> f64 {
        self.after - self.before
    }
}

/// Comparison of two independent score reports taken before and after
/// enhancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDiff {
    pub before_overall: f64,
    pub after_overall: f64,
    pub categories: Vec<CategoryDelta>,

    /// Issues present before that no longer appear for the same
    /// shape and category.
    pub resolved: Vec<Issue>,

    /// Issues present in both reports.
    pub remaining: Vec<Issue>,

    /// Issues that appeared only after enhancement.
    pub introduced: Vec<Issue>,
}

impl ScoreDiff {
    /// Diff two reports by category score and by issue identity.
    pub fn between(before: &ScoreReport, after: &ScoreReport) -> Self {
        let after_ids: std::collections::BTreeSet<_> =
            after.issues.iter().map(|i| i.identity()).collect();
        let before_ids: std::collections::BTreeSet<_> =
            before.issues.iter().map(|i| i.identity()).collect();

        let resolved = before
            .issues
            .iter()
            .filter(|i| !after_ids.contains(&i.identity()))
            .cloned()
            .collect();
        let remaining = after
            .issues
            .iter()
            .filter(|i| before_ids.contains(&i.identity()))
            .cloned()
            .collect();
        let introduced = after
            .issues
            .iter()
            .filter(|i| !before_ids.contains(&i.identity()))
            .cloned()
            .collect();

        let categories = IssueCategory::ALL
            .iter()
            .map(|&category| CategoryDelta {
                category,
                before: before.category_scores.get(&category).copied().unwrap_or(100.0),
                after: after.category_scores.get(&category).copied().unwrap_or(100.0),
            })
            .collect();

        Self {
            before_overall: before.overall,
            after_overall: after.overall,
            categories,
            resolved,
            remaining,
            introduced,
        }
    }
}
