use std::io::Cursor;
use std::sync::Arc;

use ::image::RgbImage;
use printpdf::*;
use tracing::warn;

use super::layout::{Placement, TemplateSize};
use crate::pdf::{embed_image, flatten_alpha, pt_to_mm, rgb, RenderError};

/// A template decoded once per batch and shared by every attendee's render.
#[derive(Clone)]
pub struct CertificateTemplate {
    pixels: Arc<RgbImage>,
    size: TemplateSize,
}

impl CertificateTemplate {
    /// Accepts any raster format the `image` crate can sniff, so a PNG saved
    /// with a `.jpg` name still decodes.
    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        let decoded =
            ::image::load_from_memory(bytes).map_err(|e| RenderError::Image(e.to_string()))?;
        let pixels = flatten_alpha(&decoded);
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::Image("template has no pixels".to_string()));
        }
        Ok(Self {
            pixels: Arc::new(pixels),
            size: TemplateSize {
                width: width as f64,
                height: height as f64,
            },
        })
    }

    pub fn size(&self) -> TemplateSize {
        self.size
    }
}

/// The face the attendee name is set in.
#[derive(Clone)]
pub enum CertificateFont {
    Builtin(BuiltinFont),
    /// TrueType/OpenType bytes, embedded into each document.
    Embedded(Arc<Vec<u8>>),
}

impl CertificateFont {
    /// Built-in face for a designer family name. Anything unrecognised is
    /// Helvetica.
    pub fn builtin_for(family: &str) -> Self {
        let family = family.to_ascii_lowercase();
        if family.contains("times") {
            Self::Builtin(BuiltinFont::TimesRoman)
        } else if family.contains("courier") {
            Self::Builtin(BuiltinFont::Courier)
        } else {
            Self::Builtin(BuiltinFont::Helvetica)
        }
    }

    pub fn is_script_family(family: &str) -> bool {
        let family = family.to_ascii_lowercase();
        family.contains("great vibes") || family.contains("cursive")
    }
}

/// One single-page certificate: the template at 1 px = 1 pt with the name
/// drawn at `placement`.
pub fn render_certificate(
    template: &CertificateTemplate,
    font: &CertificateFont,
    placement: Placement,
    attendee_name: &str,
) -> Result<Vec<u8>, RenderError> {
    let width_mm = pt_to_mm(template.size.width as f32);
    let height_mm = pt_to_mm(template.size.height as f32);

    let (doc, page, layer) =
        PdfDocument::new("Certificate", Mm(width_mm), Mm(height_mm), "Certificate");
    let layer = doc.get_page(page).get_layer(layer);

    embed_image(&layer, (*template.pixels).clone(), 0.0, 0.0, width_mm);

    let font_ref = match font {
        CertificateFont::Builtin(builtin) => doc
            .add_builtin_font(builtin.clone())
            .map_err(|e| RenderError::Pdf(e.to_string()))?,
        CertificateFont::Embedded(bytes) => {
            match doc.add_external_font(Cursor::new(bytes.as_slice())) {
                Ok(font_ref) => font_ref,
                Err(e) => {
                    warn!(error = %e, "Embedding certificate font failed, using Helvetica");
                    doc.add_builtin_font(BuiltinFont::Helvetica)
                        .map_err(|e| RenderError::Pdf(e.to_string()))?
                }
            }
        }
    };

    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    layer.use_text(
        attendee_name,
        placement.font_size as f32,
        Mm(pt_to_mm(placement.x as f32)),
        Mm(pt_to_mm(placement.y as f32)),
        &font_ref,
    );

    doc.save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))
}
