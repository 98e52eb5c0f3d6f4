//! Accessibility issues and the enhancement audit trail.

use crate::types::ShapeRef;
use serde::{Deserialize, Serialize};

/// How severe an issue is for the affected reader.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// The accessibility concern an issue belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum IssueCategory {
    AltText,
    FontSize,
    Contrast,
    Complexity,
    Structure,
}

impl IssueCategory {
    /// All categories, in report order.
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::AltText,
        IssueCategory::FontSize,
        IssueCategory::Contrast,
        IssueCategory::Complexity,
        IssueCategory::Structure,
    ];

    /// Display name for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::AltText => "Alt Text",
            IssueCategory::FontSize => "Font Size",
            IssueCategory::Contrast => "Contrast",
            IssueCategory::Complexity => "Text Complexity",
            IssueCategory::Structure => "Structure",
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single accessibility finding. Immutable once created; analysis
/// passes replace issue lists rather than patching them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// 0-based slide index.
    pub slide: usize,

    /// 0-based shape index within the slide. `None` for slide-level
    /// structural findings such as a missing title.
    pub shape: Option<usize>,

    pub category: IssueCategory,
    pub severity: Severity,
    pub message: String,

    /// A concrete candidate fix, when one can be computed.
    pub suggested_fix: Option<String>,
}

impl Issue {
    /// Create an issue anchored to a shape.
    pub fn for_shape(
        shape: ShapeRef,
        category: IssueCategory,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            slide: shape.slide,
            shape: Some(shape.shape),
            category,
            severity,
            message: message.into(),
            suggested_fix: None,
        }
    }

    /// Create a slide-level issue with no owning shape.
    pub fn for_slide(
        slide: usize,
        category: IssueCategory,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            slide,
            shape: None,
            category,
            severity,
            message: message.into(),
            suggested_fix: None,
        }
    }

    /// Attach a suggested fix.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    /// Identity of this issue for diffing: the same shape and category
    /// before and after enhancement means the same logical issue.
    pub fn identity(&self) -> (usize, Option<usize>, IssueCategory) {
        (self.slide, self.shape, self.category)
    }

    /// Sort key giving the required stable ordering: slide index, then
    /// shape index (slide-level issues after all shapes), then category.
    pub fn sort_key(&self) -> (usize, usize, IssueCategory) {
        (self.slide, self.shape.unwrap_or(usize::MAX), self.category)
    }
}

/// One applied modification, recorded by the enhancement pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub shape: ShapeRef,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl ChangeRecord {
    pub fn new(
        shape: ShapeRef,
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            shape,
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_ordering() {
        let mut issues = vec![
            Issue::for_slide(0, IssueCategory::Structure, Severity::Low, "no title"),
            Issue::for_shape(
                ShapeRef::new(0, 1),
                IssueCategory::AltText,
                Severity::High,
                "missing alt",
            ),
            Issue::for_shape(
                ShapeRef::new(0, 0),
                IssueCategory::Contrast,
                Severity::Medium,
                "low contrast",
            ),
            Issue::for_shape(
                ShapeRef::new(0, 0),
                IssueCategory::FontSize,
                Severity::Low,
                "small font",
            ),
        ];
        issues.sort_by_key(|i| i.sort_key());

        // shape 0 issues first (FontSize before Contrast by category order),
        // then shape 1, then the slide-level issue
        assert_eq!(issues[0].category, IssueCategory::FontSize);
        assert_eq!(issues[1].category, IssueCategory::Contrast);
        assert_eq!(issues[2].category, IssueCategory::AltText);
        assert_eq!(issues[3].shape, None);
    }

    #[test]
    fn test_identity_ignores_severity_and_message() {
        let a = Issue::for_shape(
            ShapeRef::new(2, 3),
            IssueCategory::Contrast,
            Severity::High,
            "ratio 1.5",
        );
        let b = Issue::for_shape(
            ShapeRef::new(2, 3),
            IssueCategory::Contrast,
            Severity::Medium,
            "ratio 3.9",
        );
        assert_eq!(a.identity(), b.identity());
    }
}
