//! Core domain types, issue model, score reports, and configuration
//! for presentation accessibility analysis.

pub mod config;
pub mod error;
pub mod issue;
pub mod report;
pub mod types;

pub use config::{AllyConfig, CategoryWeights, SeverityWeights};
pub use error::{Error, Result};
pub use issue::{ChangeRecord, Issue, IssueCategory, Severity};
pub use report::{CategoryDelta, ScoreDiff, ScoreReport};
pub use types::{
    ColorPair, ImageFormat, Presentation, PresentationFormat, PictureShape, RgbColor, Run, Shape,
    ShapeKind, ShapeRef, Slide, TextShape,
};
