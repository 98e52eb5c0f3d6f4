//! Domain types for representing a presentation as an addressable tree.
//!
//! A [`Presentation`] owns ordered [`Slide`]s, each of which owns ordered
//! [`Shape`]s. Shapes are a tagged variant over text, picture, and other
//! content so traversals can be exhaustive.

use serde::{Deserialize, Serialize};

/// An entire presentation with its addressable content tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: PresentationFormat,

    /// Slides in presentation order. Slide order is stable and
    /// externally addressable by index.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create a new presentation with the given filename and format.
    pub fn new(filename: impl Into<String>, format: PresentationFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    /// Look up a shape by its stable reference.
    pub fn shape(&self, shape: ShapeRef) -> Option<&Shape> {
        self.slides.get(shape.slide)?.shapes.get(shape.shape)
    }

    /// Mutable lookup of a shape by its stable reference.
    pub fn shape_mut(&mut self, shape: ShapeRef) -> Option<&mut Shape> {
        self.slides.get_mut(shape.slide)?.shapes.get_mut(shape.shape)
    }

    /// Iterate over every shape with its stable reference, in document order.
    pub fn iter_shapes(&self) -> impl Iterator<Item = (ShapeRef, &Shape)> {
        self.slides.iter().enumerate().flat_map(|(s, slide)| {
            slide
                .shapes
                .iter()
                .enumerate()
                .map(move |(i, shape)| (ShapeRef { slide: s, shape: i }, shape))
        })
    }
}

/// The format of the source presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary). Detected but not processable.
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8 && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

/// A single slide and its shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,

    /// Archive part name this slide was loaded from (e.g. `ppt/slides/slide1.xml`).
    pub part_name: String,

    /// Shapes in document order.
    pub shapes: Vec<Shape>,
}

impl Slide {
    /// Create a new slide with the given number and part name.
    pub fn new(number: usize, part_name: impl Into<String>) -> Self {
        Self {
            number,
            part_name: part_name.into(),
            shapes: Vec::new(),
        }
    }

    /// Add a shape to this slide.
    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Whether any shape on this slide is a non-empty title.
    pub fn has_title(&self) -> bool {
        self.shapes.iter().any(|s| match &s.kind {
            ShapeKind::Text(t) => t.is_title && !t.text().trim().is_empty(),
            _ => false,
        })
    }
}

/// A shape on a slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    /// 0-based index within the slide.
    pub index: usize,

    /// Shape id from the source document (`cNvPr id`).
    pub xml_id: u32,

    /// Shape name from the source document.
    pub name: String,

    /// The shape's content.
    pub kind: ShapeKind,
}

/// Tagged shape content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeKind {
    /// A shape with a text body.
    Text(TextShape),
    /// A picture with an image payload and alt text.
    Picture(PictureShape),
    /// Anything else (tables, charts, groups, connectors).
    Other,
}

/// A text shape: ordered runs plus shape-level fill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextShape {
    /// Text runs in reading order.
    pub runs: Vec<Run>,

    /// Explicit solid fill color of the shape, if any. Used as the
    /// text background when checking contrast.
    pub fill: Option<RgbColor>,

    /// Whether this shape is the slide's title placeholder.
    pub is_title: bool,
}

impl TextShape {
    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// The smallest explicit font size among runs, if any run has one.
    pub fn min_font_size(&self) -> Option<f32> {
        self.runs
            .iter()
            .filter_map(|r| r.size_pt)
            .fold(None, |acc, sz| {
                Some(match acc {
                    Some(a) if a <= sz => a,
                    _ => sz,
                })
            })
    }

    /// Replace the shape's visible text, keeping the first run's
    /// formatting and clearing the remaining runs.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.runs.first_mut() {
            Some(first) => {
                first.text = text;
                for run in self.runs.iter_mut().skip(1) {
                    run.text.clear();
                }
            }
            None => self.runs.push(Run::new(text)),
        }
    }
}

/// A text run: a fragment with uniform formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Run {
    /// The text content.
    pub text: String,

    /// Explicit font size in points, if declared.
    pub size_pt: Option<f32>,

    /// Whether the run is bold.
    pub bold: bool,

    /// Explicit font color, if declared.
    pub color: Option<RgbColor>,
}

impl Run {
    /// Create a run with text only.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A picture shape: image payload plus mutable alt text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureShape {
    /// Raw image bytes as stored in the document.
    #[serde(skip)]
    pub data: Vec<u8>,

    /// Detected image format.
    pub format: ImageFormat,

    /// Alternative text attached to the image. Empty when absent.
    pub alt_text: String,
}

impl PictureShape {
    /// Create a picture shape, detecting the format from the payload.
    pub fn new(data: Vec<u8>, alt_text: impl Into<String>) -> Self {
        let format = ImageFormat::from_magic(&data);
        Self {
            data,
            format,
            alt_text: alt_text.into(),
        }
    }

    /// Whether the picture carries any non-whitespace alt text.
    pub fn has_alt_text(&self) -> bool {
        !self.alt_text.trim().is_empty()
    }
}

/// Embedded image formats we can distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    /// Windows Metafile. Cannot be decoded; handled via fallback alt text.
    Wmf,
    /// Enhanced Metafile. Cannot be decoded; handled via fallback alt text.
    Emf,
    Unknown,
}

impl ImageFormat {
    /// Detect an image format from magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Self {
        if bytes.len() < 4 {
            return Self::Unknown;
        }

        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Self::Png
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if bytes.starts_with(b"GIF8") {
            Self::Gif
        } else if bytes.starts_with(b"BM") {
            Self::Bmp
        } else if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00])
            || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            Self::Tiff
        } else if bytes.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A])
            || bytes.starts_with(&[0x01, 0x00, 0x09, 0x00])
        {
            Self::Wmf
        } else if bytes.starts_with(&[0x01, 0x00, 0x00, 0x00]) {
            Self::Emf
        } else {
            Self::Unknown
        }
    }

    /// Whether this is a legacy vector metafile format that cannot be
    /// decoded for description.
    pub fn is_metafile(&self) -> bool {
        matches!(self, Self::Wmf | Self::Emf)
    }
}

/// An RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: RgbColor = RgbColor::new(255, 255, 255);
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);

    /// Create a color from channel values.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a six-digit uppercase-or-lowercase hex triplet (`RRGGBB`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Format as a six-digit uppercase hex triplet (`RRGGBB`).
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A foreground/background color pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub foreground: RgbColor,
    pub background: RgbColor,
}

impl ColorPair {
    pub const fn new(foreground: RgbColor, background: RgbColor) -> Self {
        Self {
            foreground,
            background,
        }
    }
}

/// Stable address of a shape: slide index plus shape index, both 0-based.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ShapeRef {
    pub slide: usize,
    pub shape: usize,
}

impl ShapeRef {
    pub const fn new(slide: usize, shape: usize) -> Self {
        Self { slide, shape }
    }
}

impl std::fmt::Display for ShapeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-based for display, matching slide numbering users see
        write!(f, "slide {}, shape {}", self.slide + 1, self.shape + 1)
    }
}
