//! Alt-text coordination: extraction, preprocessing, description via an
//! injected capability, fallback, and write-back.
//!
//! Each image moves through a small state machine:
//! `Pending -> Extracted -> DescribeRequested -> (Described | FallbackUsed) -> Applied`.
//! Legacy metafile images (WMF/EMF) cannot be decoded and go straight
//! from `Extracted` to `FallbackUsed`; this is a permanent limitation,
//! not an error path.

use ally_core::{AllyConfig, Error, ImageFormat, Presentation, Result, ShapeKind, ShapeRef};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::Semaphore;

/// How much detail to request from the describer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    Concise,
    Detailed,
}

/// Failure modes of the external description capability.
#[derive(Debug, ThisError)]
pub enum DescribeError {
    /// The service was unreachable or timed out; worth retrying.
    #[error("transient describe failure: {0}")]
    Transient(String),

    /// The service rejected the request outright.
    #[error("permanent describe failure: {0}")]
    Permanent(String),
}

/// External image-description capability. Injected so tests can swap in
/// a deterministic stub.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe a preprocessed JPEG image. Returns the description text.
    async fn describe(
        &self,
        image: &[u8],
        detail: DetailLevel,
    ) -> std::result::Result<String, DescribeError>;
}

/// Describer used when no external capability is configured: every
/// request fails permanently and images receive fallback text.
pub struct NullDescriber;

#[async_trait]
impl ImageDescriber for NullDescriber {
    async fn describe(
        &self,
        _image: &[u8],
        _detail: DetailLevel,
    ) -> std::result::Result<String, DescribeError> {
        Err(DescribeError::Permanent(
            "no image describer configured".into(),
        ))
    }
}

/// Lifecycle state of one image's alt-text processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltTextState {
    Pending,
    Extracted,
    DescribeRequested,
    Described,
    FallbackUsed,
    Applied,
}

/// Outcome for one picture shape.
#[derive(Debug, Clone)]
pub struct AltTextOutcome {
    pub shape: ShapeRef,
    pub state: AltTextState,
    pub alt_text: String,
    /// Whether the document was modified for this image.
    pub changed: bool,
}

/// Cooperative cancellation flag, checked between images.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Alt-text values that count as missing: the generic strings office
/// tooling or earlier runs of this pipeline leave behind.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "description automatically generated",
    "automatically generated",
    "automated description unavailable",
    "cannot be described automatically",
];

/// Whether alt text is absent for accessibility purposes: empty,
/// whitespace, or a known placeholder.
pub fn is_missing_or_placeholder(alt_text: &str) -> bool {
    let trimmed = alt_text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Static fallback when description fails or the service is unavailable.
pub fn fallback_text(slide_number: usize) -> String {
    format!("Image on slide {slide_number} (automated description unavailable)")
}

/// Fallback for legacy metafile images that cannot be decoded.
pub fn metafile_fallback_text(slide_number: usize, format: ImageFormat) -> String {
    let name = match format {
        ImageFormat::Wmf => "WMF",
        ImageFormat::Emf => "EMF",
        _ => "metafile",
    };
    format!("Graphic on slide {slide_number} in a legacy {name} format that cannot be described automatically")
}

/// Convert an embedded image into describer input: 3-channel color with
/// transparency composited onto white, longer edge bounded, JPEG-encoded.
pub fn preprocess_image(data: &[u8], max_edge: u32) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| Error::ImageError(format!("failed to decode embedded image: {e}")))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut canvas = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        if alpha > 0 {
            canvas.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
        }
    }

    let mut flattened = image::DynamicImage::ImageRgb8(canvas);
    if width.max(height) > max_edge {
        flattened = flattened.resize(max_edge, max_edge, image::imageops::FilterType::Lanczos3);
    }

    let mut buffer = Vec::new();
    flattened
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .map_err(|e| Error::ImageError(format!("failed to encode image: {e}")))?;
    Ok(buffer)
}

enum Prepared {
    /// Ready to send to the describer.
    Describable { jpeg: Vec<u8>, detail: DetailLevel },
    /// Goes straight to fallback text.
    Fallback { alt_text: String },
}

/// Coordinates description of every picture in a presentation.
pub struct AltTextCoordinator<'a, D> {
    describer: &'a D,
    config: &'a AllyConfig,
    /// Initial backoff delay; doubled on each retry.
    base_backoff: Duration,
}

impl<'a, D: ImageDescriber> AltTextCoordinator<'a, D> {
    pub fn new(config: &'a AllyConfig, describer: &'a D) -> Self {
        Self {
            describer,
            config,
            base_backoff: Duration::from_millis(500),
        }
    }

    /// Override the retry backoff base (tests use a near-zero delay).
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// Describe and apply alt text for every picture that needs it.
    ///
    /// Describe requests run concurrently, bounded by the configured
    /// worker count, and results are re-joined to the owning shape
    /// regardless of completion order. Cancellation is honored between
    /// images: a shape's alt text is either the old value or the new
    /// one, never partial. Re-running over already-applied images is a
    /// no-op unless `force` is set.
    pub async fn run(
        &self,
        presentation: &mut Presentation,
        cancel: &CancelFlag,
        force: bool,
    ) -> Vec<AltTextOutcome> {
        let mut outcomes = Vec::new();
        let mut jobs: Vec<(ShapeRef, Prepared)> = Vec::new();

        // Count pictures per slide: a slide's sole image carries the
        // slide's visual message and is described in more detail.
        let pictures_per_slide: Vec<usize> = presentation
            .slides
            .iter()
            .map(|s| {
                s.shapes
                    .iter()
                    .filter(|sh| matches!(sh.kind, ShapeKind::Picture(_)))
                    .count()
            })
            .collect();

        for (shape_ref, shape) in presentation.iter_shapes() {
            let ShapeKind::Picture(picture) = &shape.kind else {
                continue;
            };
            let slide_number = shape_ref.slide + 1;

            if !force && !is_missing_or_placeholder(&picture.alt_text) {
                // Already applied with real text.
                outcomes.push(AltTextOutcome {
                    shape: shape_ref,
                    state: AltTextState::Applied,
                    alt_text: picture.alt_text.clone(),
                    changed: false,
                });
                continue;
            }

            let prepared = if picture.format.is_metafile() {
                Prepared::Fallback {
                    alt_text: metafile_fallback_text(slide_number, picture.format),
                }
            } else {
                match preprocess_image(&picture.data, self.config.max_image_edge_px) {
                    Ok(jpeg) => {
                        let detail = if pictures_per_slide[shape_ref.slide] == 1 {
                            DetailLevel::Detailed
                        } else {
                            DetailLevel::Concise
                        };
                        Prepared::Describable { jpeg, detail }
                    }
                    Err(e) => {
                        log::warn!("cannot preprocess image on {shape_ref}: {e}");
                        Prepared::Fallback {
                            alt_text: fallback_text(slide_number),
                        }
                    }
                }
            };
            jobs.push((shape_ref, prepared));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.describe_workers.max(1)));
        let described: Vec<AltTextOutcome> = stream::iter(jobs)
            .map(|(shape_ref, prepared)| {
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                async move {
                    match prepared {
                        Prepared::Fallback { alt_text } => AltTextOutcome {
                            shape: shape_ref,
                            state: AltTextState::FallbackUsed,
                            alt_text,
                            changed: false,
                        },
                        Prepared::Describable { jpeg, detail } => {
                            // Semaphore errors only on close, which never happens here.
                            let _permit = semaphore.acquire_owned().await.ok();
                            if cancel.is_cancelled() {
                                return AltTextOutcome {
                                    shape: shape_ref,
                                    state: AltTextState::Extracted,
                                    alt_text: String::new(),
                                    changed: false,
                                };
                            }
                            self.describe_with_retry(shape_ref, &jpeg, detail).await
                        }
                    }
                }
            })
            .buffer_unordered(self.config.describe_workers.max(1))
            .collect()
            .await;

        // Apply results back to the owning shapes, single-writer.
        for outcome in described {
            let mut outcome = outcome;
            if matches!(
                outcome.state,
                AltTextState::Described | AltTextState::FallbackUsed
            ) {
                if let Some(shape) = presentation.shape_mut(outcome.shape) {
                    if let ShapeKind::Picture(picture) = &mut shape.kind {
                        if picture.alt_text != outcome.alt_text {
                            picture.alt_text = outcome.alt_text.clone();
                            outcome.changed = true;
                        }
                        outcome.state = AltTextState::Applied;
                    }
                }
            }
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|o| o.shape);
        outcomes
    }

    /// One image: request description with bounded retries, then fall
    /// back. Alt text is never left empty.
    async fn describe_with_retry(
        &self,
        shape_ref: ShapeRef,
        jpeg: &[u8],
        detail: DetailLevel,
    ) -> AltTextOutcome {
        let attempts = self.config.alt_text_retry_limit.max(1);
        let mut backoff = self.base_backoff;

        for attempt in 1..=attempts {
            match self.describer.describe(jpeg, detail).await {
                Ok(text) if !text.trim().is_empty() => {
                    return AltTextOutcome {
                        shape: shape_ref,
                        state: AltTextState::Described,
                        alt_text: text.trim().to_string(),
                        changed: false,
                    };
                }
                Ok(_) => {
                    log::warn!("describer returned empty text for {shape_ref}");
                }
                Err(e) => {
                    log::warn!("describe attempt {attempt}/{attempts} failed for {shape_ref}: {e}");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        AltTextOutcome {
            shape: shape_ref,
            state: AltTextState::FallbackUsed,
            alt_text: fallback_text(shape_ref.slide + 1),
            changed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ally_core::{PictureShape, PresentationFormat, Shape, Slide};
    use std::sync::atomic::AtomicUsize;

    /// Deterministic stub: fails `failures` times, then succeeds.
    struct StubDescriber {
        failures: usize,
        calls: AtomicUsize,
        response: String,
    }

    impl StubDescriber {
        fn new(failures: usize, response: &str) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageDescriber for StubDescriber {
        async fn describe(
            &self,
            _image: &[u8],
            _detail: DetailLevel,
        ) -> std::result::Result<String, DescribeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DescribeError::Transient("unreachable".into()))
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn deck_with_pictures(pictures: Vec<PictureShape>) -> Presentation {
        let mut prs = Presentation::new("deck.pptx", PresentationFormat::Pptx);
        let mut slide = Slide::new(1, "ppt/slides/slide1.xml");
        for (i, picture) in pictures.into_iter().enumerate() {
            slide.add_shape(Shape {
                index: i,
                xml_id: (i + 2) as u32,
                name: format!("Picture {}", i + 1),
                kind: ShapeKind::Picture(picture),
            });
        }
        prs.add_slide(slide);
        prs
    }

    fn coordinator_config() -> AllyConfig {
        AllyConfig::default()
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_missing_or_placeholder(""));
        assert!(is_missing_or_placeholder("   "));
        assert!(is_missing_or_placeholder("Description automatically generated"));
        assert!(is_missing_or_placeholder(&fallback_text(3)));
        assert!(!is_missing_or_placeholder("A bar chart of Q4 revenue"));
    }

    #[test]
    fn test_preprocess_produces_bounded_jpeg() {
        let jpeg = preprocess_image(&tiny_png(), 512).unwrap();
        assert_eq!(ImageFormat::from_magic(&jpeg), ImageFormat::Jpeg);

        let reloaded = image::load_from_memory(&jpeg).unwrap();
        assert!(reloaded.width() <= 512 && reloaded.height() <= 512);
    }

    #[test]
    fn test_preprocess_downscales_longer_edge() {
        let wide = image::RgbaImage::from_pixel(64, 16, image::Rgba([0, 0, 0, 255]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(wide)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();

        let jpeg = preprocess_image(&buffer, 32).unwrap();
        let reloaded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(reloaded.width(), 32);
        assert_eq!(reloaded.height(), 8, "aspect ratio should be preserved");
    }

    #[test]
    fn test_preprocess_rejects_garbage() {
        assert!(preprocess_image(b"not an image at all", 512).is_err());
    }

    #[tokio::test]
    async fn test_describe_success_applies_text() {
        let config = coordinator_config();
        let describer = StubDescriber::new(0, "A small blue square");
        let mut prs = deck_with_pictures(vec![PictureShape::new(tiny_png(), "")]);

        let outcomes = AltTextCoordinator::new(&config, &describer)
            .with_base_backoff(Duration::from_millis(1))
            .run(&mut prs, &CancelFlag::new(), false)
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].state, AltTextState::Applied);
        assert!(outcomes[0].changed);
        let ShapeKind::Picture(picture) = &prs.slides[0].shapes[0].kind else {
            panic!("picture expected");
        };
        assert_eq!(picture.alt_text, "A small blue square");
    }

    #[tokio::test]
    async fn test_retry_then_fallback() {
        let config = coordinator_config();
        // More failures than the retry limit: the coordinator must give
        // up and use the placeholder.
        let describer = StubDescriber::new(10, "never reached");
        let mut prs = deck_with_pictures(vec![PictureShape::new(tiny_png(), "")]);

        let outcomes = AltTextCoordinator::new(&config, &describer)
            .with_base_backoff(Duration::from_millis(1))
            .run(&mut prs, &CancelFlag::new(), false)
            .await;

        assert_eq!(describer.call_count(), config.alt_text_retry_limit as usize);
        assert_eq!(outcomes[0].state, AltTextState::Applied);
        let ShapeKind::Picture(picture) = &prs.slides[0].shapes[0].kind else {
            panic!("picture expected");
        };
        assert_eq!(picture.alt_text, fallback_text(1));
        assert!(!picture.alt_text.is_empty(), "alt text must never stay empty");
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_bound() {
        let config = coordinator_config();
        let describer = StubDescriber::new(2, "Recovered description");
        let mut prs = deck_with_pictures(vec![PictureShape::new(tiny_png(), "")]);

        AltTextCoordinator::new(&config, &describer)
            .with_base_backoff(Duration::from_millis(1))
            .run(&mut prs, &CancelFlag::new(), false)
            .await;

        assert_eq!(describer.call_count(), 3);
        let ShapeKind::Picture(picture) = &prs.slides[0].shapes[0].kind else {
            panic!("picture expected");
        };
        assert_eq!(picture.alt_text, "Recovered description");
    }

    #[tokio::test]
    async fn test_metafile_goes_straight_to_fallback() {
        let config = coordinator_config();
        let describer = StubDescriber::new(0, "should not be called");
        let wmf_bytes = vec![0xD7, 0xCD, 0xC6, 0x9A, 0x00, 0x00, 0x00, 0x00];
        let mut prs = deck_with_pictures(vec![PictureShape::new(wmf_bytes, "")]);

        let outcomes = AltTextCoordinator::new(&config, &describer)
            .run(&mut prs, &CancelFlag::new(), false)
            .await;

        assert_eq!(describer.call_count(), 0, "metafiles are never described");
        assert_eq!(outcomes[0].state, AltTextState::Applied);
        let ShapeKind::Picture(picture) = &prs.slides[0].shapes[0].kind else {
            panic!("picture expected");
        };
        assert!(picture.alt_text.contains("WMF"));
    }

    #[tokio::test]
    async fn test_rerun_is_noop_unless_forced() {
        let config = coordinator_config();
        let describer = StubDescriber::new(0, "First description");
        let mut prs = deck_with_pictures(vec![PictureShape::new(tiny_png(), "")]);
        let cancel = CancelFlag::new();

        let coordinator =
            AltTextCoordinator::new(&config, &describer).with_base_backoff(Duration::from_millis(1));
        let first = coordinator.run(&mut prs, &cancel, false).await;
        assert!(first[0].changed);

        let second = coordinator.run(&mut prs, &cancel, false).await;
        assert!(!second[0].changed, "second run must not touch applied text");
        assert_eq!(describer.call_count(), 1);

        let forced = coordinator.run(&mut prs, &cancel, true).await;
        assert_eq!(describer.call_count(), 2);
        assert_eq!(forced[0].state, AltTextState::Applied);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_document_unchanged() {
        let config = coordinator_config();
        let describer = StubDescriber::new(0, "never applied");
        let mut prs = deck_with_pictures(vec![
            PictureShape::new(tiny_png(), ""),
            PictureShape::new(tiny_png(), ""),
        ]);

        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcomes = AltTextCoordinator::new(&config, &describer)
            .run(&mut prs, &cancel, false)
            .await;

        assert!(outcomes.iter().all(|o| !o.changed));
        for shape in &prs.slides[0].shapes {
            let ShapeKind::Picture(picture) = &shape.kind else {
                panic!("picture expected");
            };
            assert!(picture.alt_text.is_empty());
        }
    }

    #[tokio::test]
    async fn test_results_rejoin_to_correct_shapes() {
        let config = coordinator_config();
        let describer = StubDescriber::new(0, "Same text for all");
        let mut prs = deck_with_pictures(vec![
            PictureShape::new(tiny_png(), ""),
            PictureShape::new(tiny_png(), "Existing description kept"),
            PictureShape::new(tiny_png(), ""),
        ]);

        let outcomes = AltTextCoordinator::new(&config, &describer)
            .with_base_backoff(Duration::from_millis(1))
            .run(&mut prs, &CancelFlag::new(), false)
            .await;

        assert_eq!(outcomes.len(), 3);
        // Sorted by shape reference regardless of completion order.
        assert!(outcomes.windows(2).all(|w| w[0].shape < w[1].shape));
        assert!(!outcomes[1].changed);
        let ShapeKind::Picture(kept) = &prs.slides[0].shapes[1].kind else {
            panic!("picture expected");
        };
        assert_eq!(kept.alt_text, "Existing description kept");
    }
}
