use lettre::Address;
use uuid::Uuid;

use crate::utils::error::AppError;

/// Trims a required text field, rejecting it when absent or blank.
pub fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::ValidationError(format!("{field} is required"))),
    }
}

/// Blank optional fields are stored as absent.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ids arrive as path segments; one that does not parse cannot name a record.
pub fn parse_id(what: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(format!("{what} not found")))
}

/// Lower-cases and trims an address so the (event, email) constraint is
/// case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.trim().parse::<Address>().is_ok()
}

/// `Autumn Hack 2025!` -> `Autumn_Hack_2025_`
pub fn ticket_filename(event_title: &str) -> String {
    let stem: String = event_title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}_Ticket.pdf")
}

/// `Ada Lovelace` -> `Ada_Lovelace_Certificate.pdf`. Used for mail
/// attachments, where the transport encodes the name.
pub fn certificate_filename(attendee_name: &str) -> String {
    format!("{}_Certificate.pdf", attendee_name.trim().replace(' ', "_"))
}

/// Header-safe variant of [`certificate_filename`] for a download's
/// `Content-Disposition`; anything but ASCII alphanumerics, `-` and `.`
/// becomes `_`.
pub fn certificate_download_filename(attendee_name: &str) -> String {
    let stem: String = attendee_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_Certificate.pdf")
}

pub fn validate_layout_value(field: &str, value: Option<f64>, allow_zero: bool) -> Result<(), AppError> {
    let Some(v) = value else {
        return Ok(());
    };
    let in_range = if allow_zero { v >= 0.0 } else { v > 0.0 };
    if v.is_finite() && in_range {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "{field} must be a finite {} number",
            if allow_zero { "non-negative" } else { "positive" }
        )))
    }
}
