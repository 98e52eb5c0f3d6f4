//! Accessibility analysis, scoring, and remediation engines.
//!
//! The pipeline runs in a fixed order: the [`analyzer`] probes the document
//! read-only, the [`scoring`] aggregator turns findings into a weighted
//! score, and the [`enhance`] orchestrator applies fixes before a second
//! analysis pass measures the improvement.

pub mod alttext;
pub mod analyzer;
pub mod complexity;
pub mod contrast;
pub mod enhance;
pub mod fonts;
pub mod report;
pub mod scoring;

pub use alttext::{
    AltTextCoordinator, AltTextState, CancelFlag, DescribeError, DetailLevel, ImageDescriber,
    NullDescriber,
};
pub use analyzer::Analyzer;
pub use enhance::{EnhanceOutcome, Enhancer};
pub use report::OutputFormat;
pub use scoring::Scorer;

use ally_core::{AllyConfig, Presentation, ScoreDiff, ScoreReport};

/// Run a full read-only analysis pass: analyzer plus scorer.
pub fn analyze_presentation(presentation: &Presentation, config: &AllyConfig) -> ScoreReport {
    let issues = Analyzer::new(config).analyze(presentation);
    Scorer::new(config).score(presentation, issues)
}

/// Result of a complete enhancement session: baseline report, applied
/// changes, post-enhancement report, and their comparison.
#[derive(Debug)]
pub struct EnhanceSession {
    pub before: ScoreReport,
    pub outcome: EnhanceOutcome,
    pub after: ScoreReport,
    pub diff: ScoreDiff,
}

/// Analyze, enhance in place, then re-analyze.
pub async fn enhance_presentation<D: ImageDescriber>(
    presentation: &mut Presentation,
    config: &AllyConfig,
    describer: &D,
    cancel: &CancelFlag,
) -> EnhanceSession {
    let before = analyze_presentation(presentation, config);
    let outcome = Enhancer::new(config, describer)
        .enhance(presentation, cancel)
        .await;
    let after = analyze_presentation(presentation, config);
    let diff = ScoreDiff::between(&before, &after);
    EnhanceSession {
        before,
        outcome,
        after,
        diff,
    }
}
