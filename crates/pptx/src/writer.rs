//! PPTX export: wholesale re-serialization from the document model.
//!
//! Every archive entry is copied through; slide parts are rewritten so
//! run text, font sizes, run colors, shape fills, and picture alt text
//! reflect the in-memory model. Shape and run positions are matched by
//! document order, the same order the parser assigned indices in.

use crate::{is_shape_element, local_name};
use ally_core::{Error, Presentation, Result, Shape, ShapeKind, Slide};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// Writer for PPTX (Office Open XML) files.
pub struct PptxWriter;

impl PptxWriter {
    /// Create a new PPTX writer.
    pub fn new() -> Self {
        Self
    }

    /// Re-serialize the presentation: read every entry from `source`,
    /// rewrite the slide parts from the model, and write the complete
    /// archive to `out`. Fails as a whole; no partial output is valid.
    pub fn write<R: Read + Seek, W: Write + Seek>(
        &self,
        source: R,
        presentation: &Presentation,
        out: W,
    ) -> Result<()> {
        let mut archive = ZipArchive::new(source)
            .map_err(|e| Error::CorruptedFile(format!("Failed to open archive: {}", e)))?;
        let mut writer = ZipWriter::new(out);

        let slides: HashMap<&str, &Slide> = presentation
            .slides
            .iter()
            .map(|s| (s.part_name.as_str(), s))
            .collect();

        for index in 0..archive.len() {
            let name = archive
                .by_index(index)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", index, e)))?
                .name()
                .to_string();

            if let Some(slide) = slides.get(name.as_str()) {
                let mut content = String::new();
                archive
                    .by_index(index)
                    .map_err(|e| Error::ZipError(e.to_string()))?
                    .read_to_string(&mut content)
                    .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;

                let rewritten = rewrite_slide_xml(&content, slide)?;
                writer
                    .start_file(name.as_str(), FileOptions::default())
                    .map_err(|e| Error::ExportError(format!("Failed to start '{}': {}", name, e)))?;
                writer
                    .write_all(rewritten.as_bytes())
                    .map_err(|e| Error::ExportError(format!("Failed to write '{}': {}", name, e)))?;
            } else {
                let entry = archive
                    .by_index_raw(index)
                    .map_err(|e| Error::ZipError(e.to_string()))?;
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| Error::ExportError(format!("Failed to copy '{}': {}", name, e)))?;
            }
        }

        writer
            .finish()
            .map_err(|e| Error::ExportError(format!("Failed to finish archive: {}", e)))?;
        Ok(())
    }

    /// Convenience: re-serialize into an in-memory buffer, so callers
    /// can persist the result in a single filesystem write.
    pub fn write_to_vec<R: Read + Seek>(
        &self,
        source: R,
        presentation: &Presentation,
    ) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write(source, presentation, &mut buffer)?;
        Ok(buffer.into_inner())
    }
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite one slide part from the model.
fn rewrite_slide_xml(content: &str, slide: &Slide) -> Result<String> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut group_depth = 0usize;
    let mut shape_cursor = 0usize;
    let mut current: Option<&Shape> = None;
    let mut run_cursor = 0usize;
    let mut in_run = false;
    let mut in_shape_props = false;
    let mut in_line = false;
    let mut in_run_props = false;
    let mut fill_rewritten = false;
    let mut sppr_had_fill = false;
    let mut in_shape_fill = false;
    let mut in_run_fill = false;
    let mut replace_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error rewriting slide: {}", e)))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                let local = local_name(name.as_ref()).to_vec();

                if local == b"grpSp" && !is_empty {
                    group_depth += 1;
                    write_event(&mut writer, &event)?;
                    continue;
                }
                if group_depth > 0 {
                    write_event(&mut writer, &event)?;
                    continue;
                }

                if is_shape_element(&local) && current.is_none() && !is_empty {
                    current = slide.shapes.get(shape_cursor);
                    shape_cursor += 1;
                    run_cursor = 0;
                    fill_rewritten = false;
                    sppr_had_fill = false;
                    write_event(&mut writer, &event)?;
                    continue;
                }

                match local.as_slice() {
                    b"cNvPr" => {
                        if let Some(ShapeKind::Picture(picture)) = current.map(|s| &s.kind) {
                            let rebuilt = rebuild_with_attr(e, b"descr", &picture.alt_text);
                            write_start_or_empty(&mut writer, rebuilt, is_empty)?;
                        } else {
                            write_event(&mut writer, &event)?;
                        }
                    }
                    b"spPr" => {
                        if is_empty {
                            // An empty spPr may still need a fill inserted.
                            if let Some(fill) = pending_fill(current, false) {
                                let start = own_start(e);
                                writer
                                    .write_event(Event::Start(start.clone()))
                                    .map_err(xml_err)?;
                                write_solid_fill(&mut writer, &fill)?;
                                writer
                                    .write_event(Event::End(start.to_end()))
                                    .map_err(xml_err)?;
                            } else {
                                write_event(&mut writer, &event)?;
                            }
                        } else {
                            in_shape_props = true;
                            write_event(&mut writer, &event)?;
                        }
                    }
                    b"ln" if !is_empty && in_shape_props => {
                        in_line = true;
                        write_event(&mut writer, &event)?;
                    }
                    b"r" if !is_empty => {
                        in_run = true;
                        write_event(&mut writer, &event)?;
                    }
                    b"rPr" if in_run => {
                        let rebuilt = match current_run(current, run_cursor)
                            .and_then(|r| r.size_pt)
                        {
                            Some(size) => {
                                let hundredths = format!("{}", (size * 100.0).round() as u32);
                                rebuild_with_attr(e, b"sz", &hundredths)
                            }
                            None => own_start(e),
                        };
                        if !is_empty {
                            in_run_props = true;
                        }
                        write_start_or_empty(&mut writer, rebuilt, is_empty)?;
                    }
                    b"solidFill" if !is_empty => {
                        if in_run_props {
                            in_run_fill = true;
                        } else if in_shape_props && !in_line {
                            in_shape_fill = true;
                            sppr_had_fill = true;
                        }
                        write_event(&mut writer, &event)?;
                    }
                    b"srgbClr" => {
                        let replacement = if in_run_fill {
                            current_run(current, run_cursor)
                                .and_then(|r| r.color)
                                .map(|c| c.to_hex())
                        } else if in_shape_fill {
                            fill_rewritten = true;
                            text_fill(current).map(|c| c.to_hex())
                        } else {
                            None
                        };
                        match replacement {
                            Some(hex) => {
                                let rebuilt = rebuild_with_attr(e, b"val", &hex);
                                write_start_or_empty(&mut writer, rebuilt, is_empty)?;
                            }
                            None => write_event(&mut writer, &event)?,
                        }
                    }
                    b"t" if !is_empty && in_run => {
                        if let Some(run) = current_run(current, run_cursor) {
                            replace_text = true;
                            write_event(&mut writer, &event)?;
                            writer
                                .write_event(Event::Text(BytesText::new(&run.text)))
                                .map_err(xml_err)?;
                        } else {
                            write_event(&mut writer, &event)?;
                        }
                    }
                    _ => write_event(&mut writer, &event)?,
                }
            }
            Event::Text(_) if replace_text => {
                // Original run text already replaced by the model's value.
            }
            Event::End(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_vec();

                if local == b"grpSp" {
                    group_depth = group_depth.saturating_sub(1);
                    write_event(&mut writer, &event)?;
                    continue;
                }
                if group_depth > 0 {
                    write_event(&mut writer, &event)?;
                    continue;
                }

                match local.as_slice() {
                    _ if is_shape_element(&local) => {
                        current = None;
                        write_event(&mut writer, &event)?;
                    }
                    b"spPr" => {
                        // Insert a fill the original markup lacked. A fill we
                        // could not rewrite (e.g. a theme color) is left alone
                        // rather than doubled up.
                        if let Some(fill) = pending_fill(current, fill_rewritten || sppr_had_fill) {
                            write_solid_fill(&mut writer, &fill)?;
                        }
                        in_shape_props = false;
                        in_line = false;
                        write_event(&mut writer, &event)?;
                    }
                    b"ln" => {
                        in_line = false;
                        write_event(&mut writer, &event)?;
                    }
                    b"rPr" => {
                        in_run_props = false;
                        write_event(&mut writer, &event)?;
                    }
                    b"solidFill" => {
                        in_run_fill = false;
                        in_shape_fill = false;
                        write_event(&mut writer, &event)?;
                    }
                    b"t" => {
                        replace_text = false;
                        write_event(&mut writer, &event)?;
                    }
                    b"r" => {
                        if in_run {
                            run_cursor += 1;
                        }
                        in_run = false;
                        write_event(&mut writer, &event)?;
                    }
                    _ => write_event(&mut writer, &event)?,
                }
            }
            other => write_event(&mut writer, &other)?,
        }
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes)
        .map_err(|e| Error::ExportError(format!("Rewritten slide is not UTF-8: {}", e)))
}

fn xml_err<E: std::fmt::Display>(e: E) -> Error {
    Error::ExportError(format!("Failed to write XML event: {}", e))
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: &Event<'_>) -> Result<()> {
    writer.write_event(event.clone()).map_err(xml_err)
}

fn write_start_or_empty(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: BytesStart<'static>,
    is_empty: bool,
) -> Result<()> {
    let event = if is_empty {
        Event::Empty(element)
    } else {
        Event::Start(element)
    };
    writer.write_event(event).map_err(xml_err)
}

/// Owned copy of a start element with all attributes preserved.
/// Values are unescaped on read; the writer re-escapes on output.
fn own_start(e: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        out.push_attribute((key.as_str(), value.as_str()));
    }
    out
}

/// Owned copy of a start element with one attribute replaced or added.
/// Matching is by the local part of the attribute key.
fn rebuild_with_attr(e: &BytesStart<'_>, key: &[u8], value: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut replaced = false;
    for attr in e.attributes().flatten() {
        let attr_key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if local_name(attr.key.as_ref()) == key {
            out.push_attribute((attr_key.as_str(), value));
            replaced = true;
        } else {
            let attr_value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_default();
            out.push_attribute((attr_key.as_str(), attr_value.as_str()));
        }
    }
    if !replaced && !value.is_empty() {
        let key_name = String::from_utf8_lossy(key).into_owned();
        out.push_attribute((key_name.as_str(), value));
    }
    out
}

/// The model fill still waiting to be written into this shape's spPr.
fn pending_fill(current: Option<&Shape>, already_rewritten: bool) -> Option<ally_core::RgbColor> {
    if already_rewritten {
        return None;
    }
    match current.map(|s| &s.kind) {
        Some(ShapeKind::Text(text)) => text.fill,
        _ => None,
    }
}

fn text_fill(current: Option<&Shape>) -> Option<ally_core::RgbColor> {
    match current.map(|s| &s.kind) {
        Some(ShapeKind::Text(text)) => text.fill,
        _ => None,
    }
}

fn current_run(current: Option<&Shape>, run_cursor: usize) -> Option<&ally_core::Run> {
    match current.map(|s| &s.kind) {
        Some(ShapeKind::Text(text)) => text.runs.get(run_cursor),
        _ => None,
    }
}

/// Emit `<a:solidFill><a:srgbClr val="..."/></a:solidFill>`.
fn write_solid_fill(writer: &mut Writer<Cursor<Vec<u8>>>, fill: &ally_core::RgbColor) -> Result<()> {
    let fill_start = BytesStart::new("a:solidFill");
    writer
        .write_event(Event::Start(fill_start.clone()))
        .map_err(xml_err)?;
    let mut color = BytesStart::new("a:srgbClr");
    color.push_attribute(("val", fill.to_hex().as_str()));
    writer.write_event(Event::Empty(color)).map_err(xml_err)?;
    writer
        .write_event(Event::End(fill_start.to_end()))
        .map_err(xml_err)?;
    Ok(())
}
