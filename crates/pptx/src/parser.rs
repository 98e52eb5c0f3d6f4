//! PPTX file parser implementation.
//!
//! Slides are discovered through the presentation relationships part and
//! parsed in order. Each slide's shape tree is walked with an event
//! reader: text shapes keep their runs (text, size, bold, color) and
//! shape fill, pictures keep their alt text and resolved image payload.

use crate::{is_shape_element, local_name};
use ally_core::{
    Error, PictureShape, Presentation, PresentationFormat, Result, RgbColor, Run, Shape,
    ShapeKind, Slide, TextShape,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::CorruptedFile(format!("Failed to open archive: {}", e)))?;

        let mut presentation = Presentation::new(filename, PresentationFormat::Pptx);

        for (idx, slide_path) in self.slide_order(&mut archive)?.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Ordered slide part names from the presentation relationships.
    fn slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = read_text(archive, "ppt/_rels/presentation.xml.rels")?;
        let mut slides: Vec<(String, Option<usize>)> = Vec::new();

        let mut reader = Reader::from_str(&rels_content);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let rel_type = attr_value(e, b"Type").unwrap_or_default();
                    let target = attr_value(e, b"Target").unwrap_or_default();
                    let id = attr_value(e, b"Id").unwrap_or_default();

                    if rel_type.contains("/slide")
                        && !rel_type.contains("slideLayout")
                        && !rel_type.contains("slideMaster")
                    {
                        let order =
                            extract_slide_number(&id).or_else(|| extract_slide_number(&target));
                        slides.push((resolve_target("ppt", &target), order));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing presentation relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide part into the document model.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<Slide> {
        let content = read_text(archive, slide_path)?;
        let parsed = parse_shape_tree(&content)?;

        let needs_rels = parsed.iter().any(|p| p.blip_rid.is_some());
        let rels = if needs_rels {
            self.slide_rels(archive, slide_path)?
        } else {
            HashMap::new()
        };

        let mut slide = Slide::new(slide_number, slide_path);
        for (index, pending) in parsed.into_iter().enumerate() {
            let kind = match pending.tag {
                ShapeTag::Sp => ShapeKind::Text(TextShape {
                    runs: pending.runs,
                    fill: pending.fill,
                    is_title: pending.is_title,
                }),
                ShapeTag::Pic => {
                    let data = match pending.blip_rid.as_deref().and_then(|rid| rels.get(rid)) {
                        Some(media_path) => match read_binary(archive, media_path) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                log::warn!(
                                    "missing media for picture on slide {}: {}",
                                    slide_number,
                                    e
                                );
                                Vec::new()
                            }
                        },
                        None => {
                            log::warn!(
                                "picture on slide {} has no resolvable image relationship",
                                slide_number
                            );
                            Vec::new()
                        }
                    };
                    ShapeKind::Picture(PictureShape::new(data, pending.alt_text))
                }
                ShapeTag::Other => ShapeKind::Other,
            };
            slide.add_shape(Shape {
                index,
                xml_id: pending.xml_id,
                name: pending.name,
                kind,
            });
        }

        Ok(slide)
    }

    /// Relationship id to resolved part name, for one slide.
    fn slide_rels<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
    ) -> Result<HashMap<String, String>> {
        let (dir, file) = slide_path.rsplit_once('/').unwrap_or(("", slide_path));
        let rels_path = format!("{}/_rels/{}.rels", dir, file);

        let content = match read_text(archive, &rels_path) {
            Ok(content) => content,
            Err(_) => {
                log::debug!("no relationships part at {}", rels_path);
                return Ok(HashMap::new());
            }
        };

        let mut rels = HashMap::new();
        let mut reader = Reader::from_str(&content);
        reader.trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    if let (Some(id), Some(target)) =
                        (attr_value(e, b"Id"), attr_value(e, b"Target"))
                    {
                        rels.insert(id, resolve_target(dir, &target));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing slide relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }
        Ok(rels)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of top-level element produced a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ShapeTag {
    Sp,
    Pic,
    #[default]
    Other,
}

/// A shape mid-parse, before media resolution.
#[derive(Debug, Default)]
struct PendingShape {
    xml_id: u32,
    name: String,
    tag: ShapeTag,
    runs: Vec<Run>,
    fill: Option<RgbColor>,
    is_title: bool,
    alt_text: String,
    blip_rid: Option<String>,
}

/// Where a `solidFill` color applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillTarget {
    Shape,
    Run,
}

/// Walk a slide's XML and collect its top-level shapes in order.
/// Shapes nested in groups are treated as part of the group, not
/// addressed individually.
fn parse_shape_tree(content: &str) -> Result<Vec<PendingShape>> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(content);

    let mut group_depth = 0usize;
    let mut current: Option<PendingShape> = None;
    let mut pending_run: Option<Run> = None;
    let mut in_shape_props = false;
    let mut in_line = false;
    let mut in_run_props = false;
    let mut in_text = false;
    let mut fill_target: Option<FillTarget> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                log::warn!("XML parsing error (continuing): {}", e);
                continue;
            }
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"grpSp" && !is_empty {
                    group_depth += 1;
                    continue;
                }
                if group_depth > 0 {
                    continue;
                }

                match local {
                    _ if is_shape_element(local) && current.is_none() => {
                        let shape = PendingShape {
                            tag: match local {
                                b"sp" => ShapeTag::Sp,
                                b"pic" => ShapeTag::Pic,
                                _ => ShapeTag::Other,
                            },
                            ..PendingShape::default()
                        };
                        if is_empty {
                            shapes.push(shape);
                        } else {
                            current = Some(shape);
                        }
                    }
                    b"cNvPr" => {
                        if let Some(shape) = current.as_mut() {
                            if let Some(id) = attr_value(e, b"id") {
                                shape.xml_id = id.parse().unwrap_or(0);
                            }
                            if let Some(name) = attr_value(e, b"name") {
                                shape.name = name;
                            }
                            if let Some(descr) = attr_value(e, b"descr") {
                                shape.alt_text = descr;
                            }
                        }
                    }
                    b"ph" => {
                        if let Some(shape) = current.as_mut() {
                            if let Some(ph_type) = attr_value(e, b"type") {
                                if ph_type == "title" || ph_type == "ctrTitle" {
                                    shape.is_title = true;
                                }
                            }
                        }
                    }
                    b"spPr" if !is_empty => in_shape_props = true,
                    b"ln" if !is_empty && in_shape_props => in_line = true,
                    b"r" if !is_empty => pending_run = Some(Run::default()),
                    b"rPr" => {
                        if let Some(run) = pending_run.as_mut() {
                            if let Some(sz) = attr_value(e, b"sz") {
                                // Sizes are stored in hundredths of a point.
                                run.size_pt = sz.parse::<f32>().ok().map(|v| v / 100.0);
                            }
                            if let Some(b) = attr_value(e, b"b") {
                                run.bold = b == "1" || b == "true";
                            }
                            if !is_empty {
                                in_run_props = true;
                            }
                        }
                    }
                    b"solidFill" if !is_empty => {
                        fill_target = if in_run_props && pending_run.is_some() {
                            Some(FillTarget::Run)
                        } else if in_shape_props && !in_line {
                            Some(FillTarget::Shape)
                        } else {
                            None
                        };
                    }
                    b"srgbClr" => {
                        if let Some(target) = fill_target {
                            if let Some(color) =
                                attr_value(e, b"val").as_deref().and_then(RgbColor::from_hex)
                            {
                                match target {
                                    FillTarget::Run => {
                                        if let Some(run) = pending_run.as_mut() {
                                            run.color = Some(color);
                                        }
                                    }
                                    FillTarget::Shape => {
                                        if let Some(shape) = current.as_mut() {
                                            shape.fill = Some(color);
                                        }
                                    }
                                }
                            }
                        }
                    }
                    b"blip" => {
                        if let Some(shape) = current.as_mut() {
                            if let Some(rid) = attr_value(e, b"embed") {
                                shape.blip_rid = Some(rid);
                            }
                        }
                    }
                    b"t" if !is_empty => in_text = true,
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                if in_text {
                    if let Some(run) = pending_run.as_mut() {
                        run.text.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"grpSp" {
                    group_depth = group_depth.saturating_sub(1);
                    continue;
                }
                if group_depth > 0 {
                    continue;
                }

                match local {
                    _ if is_shape_element(local) => {
                        if let Some(mut shape) = current.take() {
                            // Some decks mark titles only by shape name.
                            if shape.name.starts_with("Title") {
                                shape.is_title = true;
                            }
                            shapes.push(shape);
                        }
                    }
                    b"spPr" => {
                        in_shape_props = false;
                        in_line = false;
                    }
                    b"ln" => in_line = false,
                    b"rPr" => in_run_props = false,
                    b"solidFill" => fill_target = None,
                    b"t" => in_text = false,
                    b"r" => {
                        if let (Some(run), Some(shape)) = (pending_run.take(), current.as_mut()) {
                            shape.runs.push(run);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

/// Read an attribute by the local part of its key, unescaped.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if local_name(attr.key.as_ref()) == key {
            attr.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Resolve a relationship target against the part's directory.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut dir: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    let mut remainder = target;
    while let Some(rest) = remainder.strip_prefix("../") {
        dir.pop();
        remainder = rest;
    }
    if dir.is_empty() {
        remainder.to_string()
    } else {
        format!("{}/{}", dir.join("/"), remainder)
    }
}

/// Read a text part from the archive.
fn read_text<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;
    Ok(content)
}

/// Read a binary part from the archive.
fn read_binary<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;
    Ok(bytes)
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}
