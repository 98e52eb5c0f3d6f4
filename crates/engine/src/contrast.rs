//! WCAG contrast arithmetic and minimal-change color adjustment.
//!
//! Pure numeric module: relative luminance, contrast ratios, the
//! large-text exemption, and a lightness-stepping search that nudges a
//! color pair toward a target ratio while preserving hue.

use ally_core::{AllyConfig, ColorPair, RgbColor};

/// HSL lightness moved per search step.
const LIGHTNESS_STEP: f64 = 0.02;

/// Relative luminance of a color per the WCAG formula: each sRGB channel
/// is linearized, then weighted.
pub fn relative_luminance(color: RgbColor) -> f64 {
    fn linearize(channel: u8) -> f64 {
        let v = channel as f64 / 255.0;
        if v <= 0.03928 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    }

    0.2126 * linearize(color.r) + 0.7152 * linearize(color.g) + 0.0722 * linearize(color.b)
}

/// Contrast ratio between two colors. Symmetric, in [1, 21].
pub fn contrast_ratio(a: RgbColor, b: RgbColor) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la > lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Required ratio for text of the given size and weight. Large text
/// (18pt+, or 14pt+ bold) gets the lower bar.
pub fn required_ratio(size_pt: f32, bold: bool, config: &AllyConfig) -> f64 {
    if size_pt >= config.large_text_pt || (bold && size_pt >= config.bold_large_text_pt) {
        config.contrast_large
    } else {
        config.contrast_normal
    }
}

/// Outcome of a contrast adjustment search.
#[derive(Debug, Clone, Copy)]
pub struct ContrastFix {
    /// The adjusted pair. Foreground and background are never swapped.
    pub pair: ColorPair,

    /// Ratio achieved by the adjusted pair.
    pub ratio: f64,

    /// Whether the target ratio was reached. When false, `pair` is the
    /// closest achievable pair; the caller decides how to report it.
    pub met: bool,
}

/// Search for the smallest lightness adjustment satisfying `target`.
///
/// The darker side of the pair is pushed toward black in small HSL
/// lightness steps, which always moves the two luminances apart: dark
/// text on a light background gets darker text, light text gets a darker
/// background. Hue and saturation are preserved. The achieved ratio is
/// never below the input pair's ratio.
pub fn fix_contrast(pair: ColorPair, target: f64) -> ContrastFix {
    let mut fg = pair.foreground;
    let mut bg = pair.background;
    let mut ratio = contrast_ratio(fg, bg);

    if ratio >= target {
        return ContrastFix {
            pair,
            ratio,
            met: true,
        };
    }

    let darken_foreground = relative_luminance(fg) < relative_luminance(bg);

    loop {
        let subject = if darken_foreground { fg } else { bg };
        let (h, s, l) = rgb_to_hsl(subject);
        let next = hsl_to_rgb(h, s, (l - LIGHTNESS_STEP).max(0.0));
        if next == subject {
            // Floor reached without movement; report the closest pair.
            break;
        }

        if darken_foreground {
            fg = next;
        } else {
            bg = next;
        }
        ratio = contrast_ratio(fg, bg);
        if ratio >= target {
            break;
        }
    }

    ContrastFix {
        pair: ColorPair::new(fg, bg),
        ratio,
        met: ratio >= target,
    }
}

/// RGB to HSL, all components in [0, 1] except hue in degrees.
pub fn rgb_to_hsl(color: RgbColor) -> (f64, f64, f64) {
    let r = color.r as f64 / 255.0;
    let g = color.g as f64 / 255.0;
    let b = color.b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let delta = max - min;
    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, l)
}

/// HSL back to RGB. Inverse of [`rgb_to_hsl`] up to 8-bit rounding.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> RgbColor {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());

    let (r1, g1, b1) = match hp {
        v if v < 1.0 => (c, x, 0.0),
        v if v < 2.0 => (x, c, 0.0),
        v if v < 3.0 => (0.0, c, x),
        v if v < 4.0 => (0.0, x, c),
        v if v < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = l - c / 2.0;
    let to_channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    RgbColor::new(to_channel(r1), to_channel(g1), to_channel(b1))
}
