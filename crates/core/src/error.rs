//! Error types for presentation accessibility processing.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, analyzing, or exporting a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Embedded image could not be decoded or re-encoded.
    #[error("Image processing error: {0}")]
    ImageError(String),

    /// A single shape carries data that violates a model invariant
    /// (e.g. a negative font size). Fatal for that element only.
    #[error("Invalid shape data: {0}")]
    InvalidShape(String),

    /// Failed to re-serialize the presentation on export.
    #[error("Export error: {0}")]
    ExportError(String),
}
