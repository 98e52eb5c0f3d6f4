//! Read-only accessibility analysis.
//!
//! Walks the presentation tree and produces an ordered issue list. The
//! traversal never mutates the document, and the output is exactly
//! reproducible for identical input: issues are ordered by slide index,
//! then shape index, then category.

use crate::alttext::is_missing_or_placeholder;
use crate::complexity;
use crate::contrast;
use ally_core::{
    AllyConfig, Issue, IssueCategory, Presentation, RgbColor, Severity, ShapeKind, ShapeRef,
    TextShape,
};

/// Read-only probe over a presentation.
pub struct Analyzer<'a> {
    config: &'a AllyConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a AllyConfig) -> Self {
        Self { config }
    }

    /// Produce the ordered issue list for the current document state.
    pub fn analyze(&self, presentation: &Presentation) -> Vec<Issue> {
        let mut issues = Vec::new();

        for (slide_index, slide) in presentation.slides.iter().enumerate() {
            for (shape_index, shape) in slide.shapes.iter().enumerate() {
                let shape_ref = ShapeRef::new(slide_index, shape_index);
                match &shape.kind {
                    ShapeKind::Text(text) => self.check_text_shape(shape_ref, text, &mut issues),
                    ShapeKind::Picture(picture) => {
                        if is_missing_or_placeholder(&picture.alt_text) {
                            issues.push(
                                Issue::for_shape(
                                    shape_ref,
                                    IssueCategory::AltText,
                                    Severity::High,
                                    format!(
                                        "Image on slide {} is missing alternative text",
                                        slide_index + 1
                                    ),
                                )
                                .with_suggestion(
                                    "Add a description of the image content for screen readers",
                                ),
                            );
                        }
                    }
                    ShapeKind::Other => {}
                }
            }

            if !slide.has_title() {
                issues.push(Issue::for_slide(
                    slide_index,
                    IssueCategory::Structure,
                    Severity::Low,
                    format!("Slide {} has no title", slide_index + 1),
                ));
            }
        }

        issues.sort_by_key(|i| i.sort_key());
        issues
    }

    fn check_text_shape(&self, shape_ref: ShapeRef, text: &TextShape, issues: &mut Vec<Issue>) {
        let slide_number = shape_ref.slide + 1;
        let content = text.text();

        if content.trim().is_empty() && !text.runs.is_empty() {
            issues.push(Issue::for_shape(
                shape_ref,
                IssueCategory::Structure,
                Severity::Low,
                format!("Text shape on slide {slide_number} is empty"),
            ));
            return;
        }

        // Invalid font sizes are an element-level invariant violation:
        // record and skip the numeric checks for this shape.
        if text
            .runs
            .iter()
            .any(|r| r.size_pt.is_some_and(|s| !s.is_finite() || s <= 0.0))
        {
            issues.push(Issue::for_shape(
                shape_ref,
                IssueCategory::Structure,
                Severity::Low,
                format!("Text shape on slide {slide_number} has an invalid font size"),
            ));
            return;
        }

        self.check_font_size(shape_ref, text, issues);
        self.check_contrast(shape_ref, text, issues);
        self.check_complexity(shape_ref, &content, issues);
    }

    fn check_font_size(&self, shape_ref: ShapeRef, text: &TextShape, issues: &mut Vec<Issue>) {
        let Some(smallest) = text.min_font_size() else {
            return;
        };
        let minimum = self.config.min_font_pt;
        if smallest >= minimum {
            return;
        }

        // Severity scales with how far below the minimum the text sits.
        let severity = if smallest < minimum * 2.0 / 3.0 {
            Severity::High
        } else if smallest < minimum * 0.85 {
            Severity::Medium
        } else {
            Severity::Low
        };

        issues.push(
            Issue::for_shape(
                shape_ref,
                IssueCategory::FontSize,
                severity,
                format!(
                    "Font size {smallest}pt on slide {} is below the {minimum}pt minimum",
                    shape_ref.slide + 1
                ),
            )
            .with_suggestion(format!("Scale the shape's text up to at least {minimum}pt")),
        );
    }

    fn check_contrast(&self, shape_ref: ShapeRef, text: &TextShape, issues: &mut Vec<Issue>) {
        let background = text.fill.unwrap_or(RgbColor::WHITE);

        // Worst offending run determines the shape's contrast issue.
        let mut worst: Option<(f64, f64)> = None; // (ratio, required)
        for run in &text.runs {
            let Some(color) = run.color else {
                // No explicit color: theme resolution is out of scope,
                // so there is nothing reliable to check.
                continue;
            };
            let ratio = contrast::contrast_ratio(color, background);
            let required =
                contrast::required_ratio(run.size_pt.unwrap_or(0.0), run.bold, self.config);
            if ratio < required && worst.map_or(true, |(w, _)| ratio < w) {
                worst = Some((ratio, required));
            }
        }

        if let Some((ratio, required)) = worst {
            let severity = if ratio < 2.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            issues.push(
                Issue::for_shape(
                    shape_ref,
                    IssueCategory::Contrast,
                    severity,
                    format!(
                        "Contrast ratio {ratio:.2}:1 on slide {} is below the required {required}:1",
                        shape_ref.slide + 1
                    ),
                )
                .with_suggestion("Darken the text or its background to separate their luminance"),
            );
        }
    }

    fn check_complexity(&self, shape_ref: ShapeRef, content: &str, issues: &mut Vec<Issue>) {
        // Short labels and headings do not carry enough prose to rate.
        if content.split_whitespace().count() < 15 {
            return;
        }

        let score = complexity::readability_score(content);
        let threshold = self.config.complexity_threshold;
        if score >= threshold {
            return;
        }

        let severity = if score < threshold - 15.0 {
            Severity::Medium
        } else {
            Severity::Low
        };

        let mut issue = Issue::for_shape(
            shape_ref,
            IssueCategory::Complexity,
            severity,
            format!(
                "Text on slide {} has a readability score of {score:.0}, below {threshold:.0}",
                shape_ref.slide + 1
            ),
        );

        let candidate = complexity::simplify(content);
        if candidate != content {
            issue = issue.with_suggestion(candidate);
        }
        issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ally_core::{PictureShape, Presentation, PresentationFormat, Run, Shape, Slide};

    fn text_shape(runs: Vec<Run>, is_title: bool) -> ShapeKind {
        ShapeKind::Text(TextShape {
            runs,
            fill: None,
            is_title,
        })
    }

    fn title_run(text: &str) -> Run {
        Run {
            text: text.into(),
            size_pt: Some(32.0),
            ..Run::default()
        }
    }

    fn deck(shapes: Vec<ShapeKind>) -> Presentation {
        let mut prs = Presentation::new("deck.pptx", PresentationFormat::Pptx);
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        for (i, kind) in shapes.into_iter().enumerate() {
            slide.add_shape(Shape {
                index: i,
                xml_id: (i + 2) as u32,
                name: format!("Shape {}", i + 1),
                kind,
            });
        }
        prs.add_slide(slide);
        prs
    }

    #[test]
    fn test_missing_alt_text_flagged_high() {
        let config = AllyConfig::default();
        let prs = deck(vec![
            text_shape(vec![title_run("Quarterly Update")], true),
            ShapeKind::Picture(PictureShape::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "")),
        ]);

        let issues = Analyzer::new(&config).analyze(&prs);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::AltText);
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[0].shape, Some(1));
    }

    #[test]
    fn test_placeholder_alt_text_counts_as_missing() {
        let config = AllyConfig::default();
        let prs = deck(vec![
            text_shape(vec![title_run("Title")], true),
            ShapeKind::Picture(PictureShape::new(
                vec![0xFF, 0xD8, 0xFF, 0xE0],
                "Description automatically generated",
            )),
        ]);

        let issues = Analyzer::new(&config).analyze(&prs);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::AltText);
    }

    #[test]
    fn test_small_font_severity_scales_with_deficit() {
        let config = AllyConfig::default();
        let small = |pt: f32| {
            text_shape(
                vec![Run {
                    text: "body text".into(),
                    size_pt: Some(pt),
                    ..Run::default()
                }],
                false,
            )
        };
        let prs = deck(vec![
            text_shape(vec![title_run("Title")], true),
            small(10.0),
            small(14.0),
            small(16.5),
        ]);

        let issues = Analyzer::new(&config).analyze(&prs);
        let font_issues: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::FontSize)
            .collect();
        assert_eq!(font_issues.len(), 3);
        assert_eq!(font_issues[0].severity, Severity::High);
        assert_eq!(font_issues[1].severity, Severity::Medium);
        assert_eq!(font_issues[2].severity, Severity::Low);
    }

    #[test]
    fn test_contrast_severity_bands() {
        let config = AllyConfig::default();
        // White on light gray: ratio well under 2.0, High severity.
        let glare = ShapeKind::Text(TextShape {
            runs: vec![Run {
                text: "hard to read".into(),
                size_pt: Some(14.0),
                bold: false,
                color: Some(RgbColor::WHITE),
            }],
            fill: Some(RgbColor::new(200, 200, 200)),
            is_title: false,
        });
        // Mid gray on white: between 2.0 and 4.5, Medium severity.
        let muted = ShapeKind::Text(TextShape {
            runs: vec![Run {
                text: "slightly faint".into(),
                size_pt: Some(14.0),
                bold: false,
                color: Some(RgbColor::new(130, 130, 130)),
            }],
            fill: None,
            is_title: false,
        });
        let prs = deck(vec![text_shape(vec![title_run("Title")], true), glare, muted]);

        let issues = Analyzer::new(&config).analyze(&prs);
        let contrast_issues: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Contrast)
            .collect();
        assert_eq!(contrast_issues.len(), 2);
        assert_eq!(contrast_issues[0].severity, Severity::High);
        assert_eq!(contrast_issues[1].severity, Severity::Medium);
    }

    #[test]
    fn test_large_text_exemption_applies() {
        let config = AllyConfig::default();
        // ~3.4:1 fails normal text but passes 18pt large text.
        let color = RgbColor::new(140, 140, 140);
        let ratio = crate::contrast::contrast_ratio(color, RgbColor::WHITE);
        assert!(ratio > 3.0 && ratio < 4.5, "fixture ratio {ratio:.2}");

        let large = ShapeKind::Text(TextShape {
            runs: vec![Run {
                text: "headline".into(),
                size_pt: Some(20.0),
                bold: false,
                color: Some(color),
            }],
            fill: None,
            is_title: false,
        });
        let prs = deck(vec![text_shape(vec![title_run("Title")], true), large]);

        let issues = Analyzer::new(&config).analyze(&prs);
        assert!(issues
            .iter()
            .all(|i| i.category != IssueCategory::Contrast));
    }

    #[test]
    fn test_complex_text_flagged_with_suggestion() {
        let config = AllyConfig::default();
        let dense = "Organizational stakeholders subsequently operationalized \
                     multidimensional accessibility remediation methodologies \
                     notwithstanding considerable infrastructural impediments \
                     throughout numerous interdepartmental collaborative \
                     initiatives during extended evaluation periods.";
        let prs = deck(vec![
            text_shape(vec![title_run("Title")], true),
            text_shape(vec![title_run(dense)], false),
        ]);

        let issues = Analyzer::new(&config).analyze(&prs);
        let complexity_issue = issues
            .iter()
            .find(|i| i.category == IssueCategory::Complexity)
            .expect("complex text should be flagged");
        assert!(complexity_issue.suggested_fix.is_some());
    }

    #[test]
    fn test_missing_title_is_structural() {
        let config = AllyConfig::default();
        let prs = deck(vec![text_shape(vec![title_run("Not a title")], false)]);

        let issues = Analyzer::new(&config).analyze(&prs);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Structure);
        assert_eq!(issues[0].severity, Severity::Low);
        assert_eq!(issues[0].shape, None);
    }

    #[test]
    fn test_invalid_font_size_is_element_fatal_only() {
        let config = AllyConfig::default();
        let prs = deck(vec![
            text_shape(vec![title_run("Title")], true),
            text_shape(
                vec![Run {
                    text: "broken".into(),
                    size_pt: Some(-3.0),
                    ..Run::default()
                }],
                false,
            ),
            ShapeKind::Picture(PictureShape::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "")),
        ]);

        let issues = Analyzer::new(&config).analyze(&prs);
        // The invalid shape yields a structure issue; the rest of the
        // document is still analyzed.
        assert!(issues
            .iter()
            .any(|i| i.category == IssueCategory::Structure && i.shape == Some(1)));
        assert!(issues.iter().any(|i| i.category == IssueCategory::AltText));
    }

    #[test]
    fn test_analysis_is_deterministic_and_ordered() {
        let config = AllyConfig::default();
        let prs = deck(vec![
            ShapeKind::Picture(PictureShape::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "")),
            text_shape(
                vec![Run {
                    text: "tiny".into(),
                    size_pt: Some(10.0),
                    ..Run::default()
                }],
                false,
            ),
        ]);

        let analyzer = Analyzer::new(&config);
        let first = analyzer.analyze(&prs);
        let second = analyzer.analyze(&prs);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.sort_key(), b.sort_key());
            assert_eq!(a.message, b.message);
        }
        // Stable ordering: shape issues by index, slide-level last.
        let keys: Vec<_> = first.iter().map(|i| i.sort_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
