//! Maps a name position chosen in the designer onto the real template.
//!
//! The designer stores `certNameX`, `certNameY` and `certFontSize` against a
//! canvas [`REFERENCE_WIDTH`] units wide with a top-left origin. Templates are
//! uploaded at any resolution, and PDF text is positioned from the bottom-left
//! at its baseline, so the saved values are only turned into absolute
//! coordinates here, once the template size is known.

/// Width of the design canvas the layout is saved against.
pub const REFERENCE_WIDTH: f64 = 800.0;

/// Fraction of the font size between the top of the dragged text box and the
/// text baseline. An approximation, not a font metric: fonts with unusual
/// ascenders land a little high or low.
pub const DEFAULT_BASELINE_RATIO: f64 = 0.8;

/// Approximate centre of the 800x600 design canvas.
pub const DEFAULT_NAME_X: f64 = 400.0;
pub const DEFAULT_NAME_Y: f64 = 300.0;
pub const DEFAULT_FONT_SIZE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateLayout {
    pub name_x: f64,
    pub name_y: f64,
    pub font_size: f64,
    pub font_family: String,
}

impl CertificateLayout {
    /// Builds a layout from the stored event fields. Missing or unusable
    /// coordinates fall back to the canvas centre rather than (0, 0), where the
    /// name would be clipped or invisible.
    pub fn from_saved(
        name_x: Option<f64>,
        name_y: Option<f64>,
        font_size: Option<f64>,
        font_family: &str,
    ) -> Self {
        let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v >= 0.0);
        Self {
            name_x: usable(name_x).unwrap_or(DEFAULT_NAME_X),
            name_y: usable(name_y).unwrap_or(DEFAULT_NAME_Y),
            font_size: font_size
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(DEFAULT_FONT_SIZE),
            font_family: font_family.to_string(),
        }
    }
}

/// Pixel dimensions of the decoded template image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateSize {
    pub width: f64,
    pub height: f64,
}

/// Absolute, bottom-left-origin coordinates on the template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

pub fn map_to_template(
    layout: &CertificateLayout,
    template: TemplateSize,
    baseline_ratio: f64,
) -> Placement {
    let scale = template.width / REFERENCE_WIDTH;
    let font_size = layout.font_size * scale;
    let x = layout.name_x * scale;
    let y = template.height - (layout.name_y * scale) - (font_size * baseline_ratio);

    Placement {
        scale,
        x,
        y,
        font_size,
    }
}
