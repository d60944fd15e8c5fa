use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::certificates::layout::CertificateLayout;

pub const DEFAULT_MAX_ATTENDEES: i32 = 100;
pub const DEFAULT_CERT_FONT_FAMILY: &str = "Helvetica";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Past,
    Cancelled,
}

impl EventStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Some(Self::Upcoming),
            "past" => Some(Self::Past),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Past => "past",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub full_description: Option<String>,
    pub venue: String,
    pub map_url: Option<String>,
    pub date_time: DateTime<Utc>,
    pub status: String,
    pub max_attendees: i32,
    pub image_url: Option<String>,
    pub is_registration_enabled: bool,
    pub is_certificate_enabled: bool,
    pub certificate_template_url: Option<String>,
    pub cert_name_x: Option<f64>,
    pub cert_name_y: Option<f64>,
    pub cert_font_size: Option<f64>,
    pub cert_font_family: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Rows only ever hold values accepted by [`EventStatus::parse`]; anything
    /// else reads as upcoming.
    pub fn status(&self) -> EventStatus {
        EventStatus::parse(&self.status).unwrap_or(EventStatus::Upcoming)
    }

    pub fn accepts_registrations(&self) -> bool {
        self.is_registration_enabled && self.status() != EventStatus::Cancelled
    }

    pub fn certificate_layout(&self) -> CertificateLayout {
        CertificateLayout::from_saved(
            self.cert_name_x,
            self.cert_name_y,
            self.cert_font_size,
            &self.cert_font_family,
        )
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id,
            title: self.title.clone(),
            venue: self.venue.clone(),
            date_time: self.date_time,
            full_description: self.full_description.clone(),
        }
    }
}

/// The slice of an event embedded in ticket and registration listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub date_time: DateTime<Utc>,
    pub full_description: Option<String>,
}

/// Validated input for inserting an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub full_description: Option<String>,
    pub venue: String,
    pub map_url: Option<String>,
    pub date_time: DateTime<Utc>,
    pub status: EventStatus,
    pub max_attendees: i32,
    pub image_url: Option<String>,
    pub is_registration_enabled: bool,
    pub is_certificate_enabled: bool,
    pub certificate_template_url: Option<String>,
    pub cert_name_x: Option<f64>,
    pub cert_name_y: Option<f64>,
    pub cert_font_size: Option<f64>,
    pub cert_font_family: String,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub venue: Option<String>,
    pub map_url: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub max_attendees: Option<i32>,
    pub image_url: Option<String>,
    pub is_registration_enabled: Option<bool>,
    pub is_certificate_enabled: Option<bool>,
    pub certificate_template_url: Option<String>,
    pub cert_name_x: Option<f64>,
    pub cert_name_y: Option<f64>,
    pub cert_font_size: Option<f64>,
    pub cert_font_family: Option<String>,
}

impl EventChanges {
    pub fn apply(self, event: &mut Event) {
        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.description {
            event.description = v;
        }
        if let Some(v) = self.full_description {
            event.full_description = Some(v);
        }
        if let Some(v) = self.venue {
            event.venue = v;
        }
        if let Some(v) = self.map_url {
            event.map_url = Some(v);
        }
        if let Some(v) = self.date_time {
            event.date_time = v;
        }
        if let Some(v) = self.status {
            event.status = v.as_str().to_string();
        }
        if let Some(v) = self.max_attendees {
            event.max_attendees = v;
        }
        if let Some(v) = self.image_url {
            event.image_url = Some(v);
        }
        if let Some(v) = self.is_registration_enabled {
            event.is_registration_enabled = v;
        }
        if let Some(v) = self.is_certificate_enabled {
            event.is_certificate_enabled = v;
        }
        if let Some(v) = self.certificate_template_url {
            event.certificate_template_url = Some(v);
        }
        if let Some(v) = self.cert_name_x {
            event.cert_name_x = Some(v);
        }
        if let Some(v) = self.cert_name_y {
            event.cert_name_y = Some(v);
        }
        if let Some(v) = self.cert_font_size {
            event.cert_font_size = Some(v);
        }
        if let Some(v) = self.cert_font_family {
            event.cert_font_family = v;
        }
        event.updated_at = Utc::now();
    }
}

/// Body of `POST /events`. Required fields are optional here so that a
/// missing one becomes a validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub venue: Option<String>,
    pub map_url: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub max_attendees: Option<i32>,
    pub image_url: Option<String>,
    pub is_registration_enabled: Option<bool>,
    pub is_certificate_enabled: Option<bool>,
    pub certificate_template_url: Option<String>,
    pub cert_name_x: Option<f64>,
    pub cert_name_y: Option<f64>,
    pub cert_font_size: Option<f64>,
    pub cert_font_family: Option<String>,
}
