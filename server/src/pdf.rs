//! Drawing helpers shared by the ticket and certificate renderers.

use ::image::{DynamicImage, Luma, Rgba, RgbImage};
use printpdf::*;
use qrcode::QrCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create PDF: {0}")]
    Pdf(String),
    #[error("Failed to generate QR code: {0}")]
    Qr(String),
    #[error("Failed to decode image: {0}")]
    Image(String),
    #[error("Failed to load font: {0}")]
    Font(String),
}

const MM_PER_PT: f32 = 25.4 / 72.0;

pub fn pt_to_mm(pt: f32) -> f32 {
    pt * MM_PER_PT
}

pub fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Composites against white; PDF image XObjects here carry no alpha channel.
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)) as u8;
        out.put_pixel(x, y, ::image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Places `image` with its bottom-left corner at (`x`, `y`), scaled to
/// `width_mm` wide.
pub fn embed_image(layer: &PdfLayerReference, image: RgbImage, x: f32, y: f32, width_mm: f32) {
    let (width_px, height_px) = image.dimensions();
    let dpi = (width_px as f32) / (width_mm / 25.4);

    let xobject = Image::from(ImageXObject {
        width: Px(width_px as usize),
        height: Px(height_px as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: image.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    xobject.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

/// Renders `payload` verbatim as a QR symbol.
pub fn qr_image(payload: &str) -> Result<DynamicImage, RenderError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| RenderError::Qr(e.to_string()))?;
    let image = code.render::<Luma<u8>>().quiet_zone(true).build();
    Ok(DynamicImage::ImageLuma8(image))
}

pub fn draw_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    let points = vec![
        (Point::new(Mm(x1), Mm(y1)), false),
        (Point::new(Mm(x2), Mm(y2)), false),
    ];
    layer.add_line(Line {
        points,
        is_closed: false,
    });
}

pub fn draw_rect_outline(layer: &PdfLayerReference, x: f32, y: f32, width: f32, height: f32) {
    draw_line(layer, x, y, x + width, y);
    draw_line(layer, x + width, y, x + width, y + height);
    draw_line(layer, x + width, y + height, x, y + height);
    draw_line(layer, x, y + height, x, y);
}
