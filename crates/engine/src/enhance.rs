//! Enhancement orchestration.
//!
//! Applies engine fixes in a fixed order so runs are reproducible:
//! font rescaling first (it can move text into the large-text contrast
//! exemption), then contrast, then alt text, then opt-in simplification.
//! Every applied fix appends a change record; element-level failures are
//! recorded and skipped without aborting the pass.

use crate::alttext::{AltTextCoordinator, CancelFlag, ImageDescriber};
use crate::complexity;
use crate::contrast;
use crate::fonts;
use ally_core::{
    AllyConfig, ChangeRecord, ColorPair, Issue, IssueCategory, Presentation, RgbColor, Severity,
    ShapeKind, ShapeRef,
};
use std::collections::BTreeMap;

/// What an enhancement pass did to the document.
#[derive(Debug, Default)]
pub struct EnhanceOutcome {
    /// Applied fixes, in application order.
    pub changes: Vec<ChangeRecord>,

    /// Elements whose fix was skipped, with the recorded reason.
    pub skipped: Vec<Issue>,
}

/// Applies fixes to a presentation. Single-writer: holds the only
/// mutable borrow of the document for the duration of the pass.
pub struct Enhancer<'a, D> {
    config: &'a AllyConfig,
    describer: &'a D,
}

impl<'a, D: ImageDescriber> Enhancer<'a, D> {
    pub fn new(config: &'a AllyConfig, describer: &'a D) -> Self {
        Self { config, describer }
    }

    /// Run the full enhancement pass. Idempotent apart from the opt-in
    /// complexity stage: a second run appends no change records.
    pub async fn enhance(
        &self,
        presentation: &mut Presentation,
        cancel: &CancelFlag,
    ) -> EnhanceOutcome {
        let mut outcome = EnhanceOutcome::default();

        for slide_index in 0..presentation.slides.len() {
            if cancel.is_cancelled() {
                return outcome;
            }
            self.fix_fonts(presentation, slide_index, &mut outcome);
            self.fix_contrast(presentation, slide_index, &mut outcome);
        }

        if cancel.is_cancelled() {
            return outcome;
        }
        self.fix_alt_text(presentation, cancel, &mut outcome).await;

        if self.config.complexity_auto_apply && !cancel.is_cancelled() {
            self.fix_complexity(presentation, &mut outcome);
        }

        log::debug!(
            "enhancement pass applied {} change(s), skipped {}",
            outcome.changes.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn fix_fonts(
        &self,
        presentation: &mut Presentation,
        slide_index: usize,
        outcome: &mut EnhanceOutcome,
    ) {
        let slide = &mut presentation.slides[slide_index];
        for (shape_index, shape) in slide.shapes.iter_mut().enumerate() {
            let ShapeKind::Text(text) = &mut shape.kind else {
                continue;
            };
            let shape_ref = ShapeRef::new(slide_index, shape_index);
            let before = text.min_font_size();
            match fonts::rescale(text, self.config.min_font_pt) {
                Ok(Some(_factor)) => {
                    outcome.changes.push(ChangeRecord::new(
                        shape_ref,
                        "min_font_pt",
                        format_pt(before),
                        format_pt(text.min_font_size()),
                    ));
                }
                Ok(None) => {}
                Err(e) => outcome.skipped.push(Issue::for_shape(
                    shape_ref,
                    IssueCategory::Structure,
                    Severity::Low,
                    format!("Font fix skipped: {e}"),
                )),
            }
        }
    }

    fn fix_contrast(
        &self,
        presentation: &mut Presentation,
        slide_index: usize,
        outcome: &mut EnhanceOutcome,
    ) {
        let slide = &mut presentation.slides[slide_index];
        for (shape_index, shape) in slide.shapes.iter_mut().enumerate() {
            let ShapeKind::Text(text) = &mut shape.kind else {
                continue;
            };
            let shape_ref = ShapeRef::new(slide_index, shape_index);
            let mut fill = text.fill;

            for run in text.runs.iter_mut() {
                let Some(color) = run.color else {
                    continue;
                };
                let background = fill.unwrap_or(RgbColor::WHITE);
                let required =
                    contrast::required_ratio(run.size_pt.unwrap_or(0.0), run.bold, self.config);
                if contrast::contrast_ratio(color, background) >= required {
                    continue;
                }

                let fix = contrast::fix_contrast(ColorPair::new(color, background), required);
                if fix.pair.foreground != color {
                    outcome.changes.push(ChangeRecord::new(
                        shape_ref,
                        "run_color",
                        color.to_hex(),
                        fix.pair.foreground.to_hex(),
                    ));
                    run.color = Some(fix.pair.foreground);
                }
                if fix.pair.background != background {
                    outcome.changes.push(ChangeRecord::new(
                        shape_ref,
                        "fill",
                        background.to_hex(),
                        fix.pair.background.to_hex(),
                    ));
                    fill = Some(fix.pair.background);
                }
                if !fix.met {
                    log::warn!(
                        "contrast on {shape_ref} only reached {:.2}:1 of required {required}:1",
                        fix.ratio
                    );
                }
            }

            text.fill = fill;
        }
    }

    async fn fix_alt_text(
        &self,
        presentation: &mut Presentation,
        cancel: &CancelFlag,
        outcome: &mut EnhanceOutcome,
    ) {
        // Snapshot current alt texts so change records carry old values.
        let previous: BTreeMap<ShapeRef, String> = presentation
            .iter_shapes()
            .filter_map(|(shape_ref, shape)| match &shape.kind {
                ShapeKind::Picture(p) => Some((shape_ref, p.alt_text.clone())),
                _ => None,
            })
            .collect();

        let results = AltTextCoordinator::new(self.config, self.describer)
            .run(presentation, cancel, false)
            .await;

        for result in results {
            if result.changed {
                let old = previous.get(&result.shape).cloned().unwrap_or_default();
                outcome.changes.push(ChangeRecord::new(
                    result.shape,
                    "alt_text",
                    old,
                    result.alt_text,
                ));
            }
        }
    }

    fn fix_complexity(&self, presentation: &mut Presentation, outcome: &mut EnhanceOutcome) {
        for slide_index in 0..presentation.slides.len() {
            let slide = &mut presentation.slides[slide_index];
            for (shape_index, shape) in slide.shapes.iter_mut().enumerate() {
                let ShapeKind::Text(text) = &mut shape.kind else {
                    continue;
                };
                let content = text.text();
                if content.split_whitespace().count() < 15 {
                    continue;
                }
                if !complexity::flag_complex(&content, self.config.complexity_threshold) {
                    continue;
                }

                let simplified = complexity::simplify(&content);
                if simplified == content
                    || complexity::readability_score(&simplified)
                        <= complexity::readability_score(&content)
                {
                    continue;
                }

                text.set_text(simplified.clone());
                outcome.changes.push(ChangeRecord::new(
                    ShapeRef::new(slide_index, shape_index),
                    "text",
                    truncate(&content),
                    truncate(&simplified),
                ));
            }
        }
    }
}

fn format_pt(size: Option<f32>) -> String {
    match size {
        Some(v) => format!("{v:.1}pt"),
        None => "unset".to_string(),
    }
}

/// Clip long text values so the change log stays readable.
fn truncate(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(LIMIT).collect();
        format!("{clipped}...")
    }
}
