//! The printable A5 ticket mailed at registration.

use std::path::Path;

use ::image::{DynamicImage, GenericImageView};
use chrono::{DateTime, Utc};
use printpdf::*;
use tracing::{debug, warn};

use crate::pdf::{draw_line, draw_rect_outline, embed_image, flatten_alpha, qr_image, rgb, RenderError};

// A5 landscape
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 148.0;
const MARGIN_MM: f32 = 6.0;

const LEFT_MM: f32 = 14.0;
const QR_X_MM: f32 = 150.0;
const QR_Y_MM: f32 = 42.0;
const QR_SIZE_MM: f32 = 46.0;

const LOGO_MAX_WIDTH_MM: f32 = 36.0;
const LOGO_MAX_HEIGHT_MM: f32 = 14.0;

const FOOTER_TEXT: &str = "Please present this ticket at the event entrance. One-time use only.";

#[derive(Debug, Clone)]
pub struct TicketDetails {
    pub organization: String,
    pub title: String,
    pub venue: String,
    pub date_time: DateTime<Utc>,
    pub attendee: String,
    pub token: String,
}

/// Reads and decodes the header logo. Any problem yields `None` and the
/// ticket falls back to a text header. Blocking.
pub fn load_logo(path: Option<&Path>) -> Option<DynamicImage> {
    let path = path?;
    match ::image::open(path) {
        Ok(img) => {
            debug!(path = %path.display(), "Loaded ticket logo");
            Some(img)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ticket logo unavailable, using text header");
            None
        }
    }
}

pub fn format_date_time(date_time: &DateTime<Utc>) -> String {
    date_time.format("%A, %B %-d, %Y at %-I:%M %p UTC").to_string()
}

/// Single-page ticket. The QR symbol encodes the bare token.
pub fn render_ticket(
    ticket: &TicketDetails,
    logo: Option<&DynamicImage>,
) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Ticket {}", ticket.token),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Ticket",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let mono = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    // Border
    layer.set_outline_color(rgb(0.2, 0.2, 0.2));
    layer.set_outline_thickness(1.5);
    draw_rect_outline(
        &layer,
        MARGIN_MM,
        MARGIN_MM,
        PAGE_WIDTH_MM - 2.0 * MARGIN_MM,
        PAGE_HEIGHT_MM - 2.0 * MARGIN_MM,
    );

    // Header
    let header_y = PAGE_HEIGHT_MM - MARGIN_MM - 18.0;
    match logo {
        Some(img) => {
            let (w, h) = img.dimensions();
            let (w, h) = (w.max(1) as f32, h.max(1) as f32);
            let width_mm = LOGO_MAX_WIDTH_MM.min(LOGO_MAX_HEIGHT_MM * w / h);
            embed_image(&layer, flatten_alpha(img), LEFT_MM, header_y, width_mm);
        }
        None => {
            layer.set_fill_color(rgb(0.1, 0.1, 0.1));
            layer.use_text(&ticket.organization, 14.0, Mm(LEFT_MM), Mm(header_y + 5.0), &bold);
        }
    }
    layer.set_fill_color(rgb(0.35, 0.35, 0.35));
    layer.use_text("EVENT TICKET", 12.0, Mm(QR_X_MM), Mm(header_y + 5.0), &bold);

    layer.set_outline_thickness(0.5);
    draw_line(&layer, MARGIN_MM + 4.0, header_y - 3.0, PAGE_WIDTH_MM - MARGIN_MM - 4.0, header_y - 3.0);

    // Details
    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    layer.use_text(&ticket.title, 20.0, Mm(LEFT_MM), Mm(header_y - 16.0), &bold);

    let fields = [
        ("DATE & TIME", format_date_time(&ticket.date_time)),
        ("VENUE", ticket.venue.clone()),
        ("ATTENDEE", ticket.attendee.clone()),
    ];
    let mut y = header_y - 32.0;
    for (label, value) in &fields {
        layer.set_fill_color(rgb(0.45, 0.45, 0.45));
        layer.use_text(*label, 9.0, Mm(LEFT_MM), Mm(y), &regular);
        layer.set_fill_color(rgb(0.0, 0.0, 0.0));
        layer.use_text(value.as_str(), 12.0, Mm(LEFT_MM), Mm(y - 6.0), &bold);
        y -= 18.0;
    }

    // QR code with the token under it
    let qr = qr_image(&ticket.token)?;
    embed_image(&layer, qr.to_rgb8(), QR_X_MM, QR_Y_MM, QR_SIZE_MM);
    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    layer.use_text(&ticket.token, 11.0, Mm(QR_X_MM + 4.0), Mm(QR_Y_MM - 6.0), &mono);

    // Footer
    draw_line(&layer, MARGIN_MM + 4.0, MARGIN_MM + 12.0, PAGE_WIDTH_MM - MARGIN_MM - 4.0, MARGIN_MM + 12.0);
    layer.set_fill_color(rgb(0.4, 0.4, 0.4));
    layer.use_text(FOOTER_TEXT, 9.0, Mm(LEFT_MM), Mm(MARGIN_MM + 5.0), &regular);

    doc.save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))
}
