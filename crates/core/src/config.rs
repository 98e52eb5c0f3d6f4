//! Pipeline configuration.
//!
//! A single immutable [`AllyConfig`] is built once and passed through the
//! analyzer, scorer, and enhancement passes. Thresholds and weights are
//! configuration, not constants baked into the engines.

use crate::issue::{IssueCategory, Severity};
use serde::{Deserialize, Serialize};

/// Thresholds and weights for analysis, scoring, and enhancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllyConfig {
    /// Minimum recommended font size in points.
    pub min_font_pt: f32,

    /// Required contrast ratio for normal text.
    pub contrast_normal: f64,

    /// Required contrast ratio for large text.
    pub contrast_large: f64,

    /// Size at which text qualifies as large.
    pub large_text_pt: f32,

    /// Size at which bold text qualifies as large.
    pub bold_large_text_pt: f32,

    /// Longer-edge bound for images sent to the describer.
    pub max_image_edge_px: u32,

    /// Maximum describe attempts per image before falling back.
    pub alt_text_retry_limit: u32,

    /// Concurrent describe requests.
    pub describe_workers: usize,

    /// Readability score below which text is flagged as complex.
    pub complexity_threshold: f64,

    /// Whether the enhancement pass applies simplification candidates.
    /// Off by default: simplification is advisory.
    pub complexity_auto_apply: bool,

    pub category_weights: CategoryWeights,
    pub severity_weights: SeverityWeights,
}

impl Default for AllyConfig {
    fn default() -> Self {
        Self {
            min_font_pt: 18.0,
            contrast_normal: 4.5,
            contrast_large: 3.0,
            large_text_pt: 18.0,
            bold_large_text_pt: 14.0,
            max_image_edge_px: 512,
            alt_text_retry_limit: 3,
            describe_workers: 4,
            complexity_threshold: 50.0,
            complexity_auto_apply: false,
            category_weights: CategoryWeights::default(),
            severity_weights: SeverityWeights::default(),
        }
    }
}

/// Relative importance of each category in the overall score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub alt_text: f64,
    pub font_size: f64,
    pub contrast: f64,
    pub complexity: f64,
    pub structure: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            alt_text: 0.30,
            font_size: 0.25,
            contrast: 0.25,
            complexity: 0.20,
            structure: 0.10,
        }
    }
}

impl CategoryWeights {
    /// Weight for one category.
    pub fn weight(&self, category: IssueCategory) -> f64 {
        match category {
            IssueCategory::AltText => self.alt_text,
            IssueCategory::FontSize => self.font_size,
            IssueCategory::Contrast => self.contrast,
            IssueCategory::Complexity => self.complexity,
            IssueCategory::Structure => self.structure,
        }
    }

    /// Sum of all weights, for normalization.
    pub fn total(&self) -> f64 {
        IssueCategory::ALL.iter().map(|&c| self.weight(c)).sum()
    }
}

/// Numeric penalty weight per severity level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 3.0,
            high: 7.0,
        }
    }
}

impl SeverityWeights {
    /// Weight for one severity level.
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
        }
    }

    /// The largest weight; one issue at this weight zeroes out a
    /// single-element category.
    pub fn max(&self) -> f64 {
        self.high.max(self.medium).max(self.low)
    }
}
