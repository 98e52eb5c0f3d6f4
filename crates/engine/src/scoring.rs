//! Weighted score aggregation.
//!
//! Converts an issue list into a 0-100 score per category plus a
//! weighted overall number. Penalties are normalized by how many
//! elements a category actually inspected, so a one-slide deck is not
//! judged on the same absolute scale as a fifty-slide one.

use ally_core::{
    AllyConfig, Issue, IssueCategory, Presentation, ScoreReport, ShapeKind,
};
use std::collections::BTreeMap;

/// Aggregates issues into a [`ScoreReport`].
pub struct Scorer<'a> {
    config: &'a AllyConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a AllyConfig) -> Self {
        Self { config }
    }

    /// Score the presentation given the analyzer's findings. Pure and
    /// deterministic: same document and config, same report.
    pub fn score(&self, presentation: &Presentation, issues: Vec<Issue>) -> ScoreReport {
        let inspected = count_inspected(presentation);
        let max_weight = self.config.severity_weights.max();

        let mut category_scores = BTreeMap::new();
        for category in IssueCategory::ALL {
            let penalty: f64 = issues
                .iter()
                .filter(|i| i.category == category)
                .map(|i| self.config.severity_weights.weight(i.severity))
                .sum();
            let denominator = max_weight * inspected.get(&category).copied().unwrap_or(0).max(1) as f64;
            let score = (100.0 - 100.0 * penalty / denominator).clamp(0.0, 100.0);
            category_scores.insert(category, score);
        }

        let weights = &self.config.category_weights;
        let total_weight = weights.total();
        let overall = if total_weight > 0.0 {
            (category_scores
                .iter()
                .map(|(&category, score)| weights.weight(category) * score)
                .sum::<f64>()
                / total_weight)
                .clamp(0.0, 100.0)
        } else {
            100.0
        };

        ScoreReport {
            overall,
            category_scores,
            issues,
        }
    }
}

/// How many elements each category had available to inspect.
fn count_inspected(presentation: &Presentation) -> BTreeMap<IssueCategory, usize> {
    let mut counts = BTreeMap::new();
    let mut add = |category: IssueCategory, n: usize| {
        *counts.entry(category).or_insert(0) += n;
    };

    for slide in &presentation.slides {
        // Title presence is checked once per slide.
        add(IssueCategory::Structure, 1);

        for shape in &slide.shapes {
            match &shape.kind {
                ShapeKind::Picture(_) => add(IssueCategory::AltText, 1),
                ShapeKind::Text(text) => {
                    add(IssueCategory::Structure, 1);
                    if text.min_font_size().is_some() {
                        add(IssueCategory::FontSize, 1);
                    }
                    if text.runs.iter().any(|r| r.color.is_some()) {
                        add(IssueCategory::Contrast, 1);
                    }
                    if !text.text().trim().is_empty() {
                        add(IssueCategory::Complexity, 1);
                    }
                }
                ShapeKind::Other => {}
            }
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use ally_core::{
        PictureShape, PresentationFormat, RgbColor, Run, Severity, Shape, ShapeRef, Slide,
        TextShape,
    };

    fn empty_deck() -> Presentation {
        Presentation::new("empty.pptx", PresentationFormat::Pptx)
    }

    #[test]
    fn test_empty_presentation_scores_perfect() {
        let config = AllyConfig::default();
        let report = Scorer::new(&config).score(&empty_deck(), Vec::new());
        assert_eq!(report.overall, 100.0);
        assert!(report.issues.is_empty());
        assert!(report.category_scores.values().all(|&s| s == 100.0));
    }

    #[test]
    fn test_single_high_issue_zeroes_single_element_category() {
        let config = AllyConfig::default();
        let mut prs = empty_deck();
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        slide.add_shape(Shape {
            index: 0,
            xml_id: 2,
            name: "Picture 1".into(),
            kind: ShapeKind::Picture(PictureShape::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "")),
        });
        prs.add_slide(slide);

        let issues = vec![Issue::for_shape(
            ShapeRef::new(0, 0),
            IssueCategory::AltText,
            Severity::High,
            "missing alt",
        )];
        let report = Scorer::new(&config).score(&prs, issues);
        assert_eq!(report.category_scores[&IssueCategory::AltText], 0.0);
        assert!(report.overall < 100.0);
    }

    #[test]
    fn test_low_issue_penalizes_less_than_high() {
        let config = AllyConfig::default();
        let mut prs = empty_deck();
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        for i in 0..2 {
            slide.add_shape(Shape {
                index: i,
                xml_id: (i + 2) as u32,
                name: format!("Body {i}"),
                kind: ShapeKind::Text(TextShape {
                    runs: vec![Run {
                        text: "text".into(),
                        size_pt: Some(16.0),
                        ..Run::default()
                    }],
                    ..TextShape::default()
                }),
            });
        }
        prs.add_slide(slide);

        let scorer = Scorer::new(&config);
        let low = scorer.score(
            &prs,
            vec![Issue::for_shape(
                ShapeRef::new(0, 0),
                IssueCategory::FontSize,
                Severity::Low,
                "16pt",
            )],
        );
        let high = scorer.score(
            &prs,
            vec![Issue::for_shape(
                ShapeRef::new(0, 0),
                IssueCategory::FontSize,
                Severity::High,
                "8pt",
            )],
        );
        assert!(
            low.category_scores[&IssueCategory::FontSize]
                > high.category_scores[&IssueCategory::FontSize]
        );
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let config = AllyConfig::default();
        let mut prs = empty_deck();
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        slide.add_shape(Shape {
            index: 0,
            xml_id: 2,
            name: "Body".into(),
            kind: ShapeKind::Text(TextShape {
                runs: vec![Run {
                    text: "dim small text".into(),
                    size_pt: Some(12.0),
                    bold: false,
                    color: Some(RgbColor::new(180, 180, 180)),
                }],
                ..TextShape::default()
            }),
        });
        prs.add_slide(slide);

        let analyzer = Analyzer::new(&config);
        let scorer = Scorer::new(&config);
        let a = scorer.score(&prs, analyzer.analyze(&prs));
        let b = scorer.score(&prs, analyzer.analyze(&prs));
        assert_eq!(a.overall, b.overall);
        assert_eq!(a.category_scores, b.category_scores);
        assert_eq!(a.issues.len(), b.issues.len());
    }

    #[test]
    fn test_unaffected_categories_stay_perfect() {
        let config = AllyConfig::default();
        let mut prs = empty_deck();
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        slide.add_shape(Shape {
            index: 0,
            xml_id: 2,
            name: "Picture 1".into(),
            kind: ShapeKind::Picture(PictureShape::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "")),
        });
        prs.add_slide(slide);

        let issues = vec![Issue::for_shape(
            ShapeRef::new(0, 0),
            IssueCategory::AltText,
            Severity::High,
            "missing alt",
        )];
        let report = Scorer::new(&config).score(&prs, issues);
        assert_eq!(report.category_scores[&IssueCategory::Contrast], 100.0);
        assert_eq!(report.category_scores[&IssueCategory::FontSize], 100.0);
        assert_eq!(report.category_scores[&IssueCategory::Complexity], 100.0);
    }
}
