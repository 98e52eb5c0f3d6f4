//! Font size detection and ratio-preserving rescaling.

use ally_core::{Error, Presentation, Result, ShapeKind, ShapeRef, TextShape};

/// Collect the smallest explicit font size of every text shape.
pub fn scan_font_sizes(presentation: &Presentation) -> Vec<(ShapeRef, f32)> {
    presentation
        .iter_shapes()
        .filter_map(|(shape_ref, shape)| match &shape.kind {
            ShapeKind::Text(text) => text.min_font_size().map(|size| (shape_ref, size)),
            _ => None,
        })
        .collect()
}

/// Scale every sized run in the shape so the smallest run reaches
/// `min_pt`, preserving the size ratios between runs.
///
/// Sizes are never decreased: when the smallest run already meets the
/// minimum, nothing changes. Returns the applied scale factor, or `None`
/// when no change was needed.
pub fn rescale(shape: &mut TextShape, min_pt: f32) -> Result<Option<f32>> {
    let Some(smallest) = shape.min_font_size() else {
        return Ok(None);
    };

    if !smallest.is_finite() || smallest <= 0.0 {
        return Err(Error::InvalidShape(format!(
            "font size {smallest}pt is not a positive finite value"
        )));
    }

    if smallest >= min_pt {
        return Ok(None);
    }

    let factor = min_pt / smallest;
    for run in &mut shape.runs {
        if let Some(size) = run.size_pt {
            // Round to a tenth of a point, the finest granularity the
            // document format can represent losslessly here.
            run.size_pt = Some(((size * factor) * 10.0).round() / 10.0);
        }
    }

    log::debug!(
        "rescaled text shape by {:.3} to lift {}pt runs to {}pt",
        factor,
        smallest,
        min_pt
    );
    Ok(Some(factor))
}
