use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::event::EventSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Attended,
}

impl RegistrationStatus {
    pub fn from_attended(is_attended: bool) -> Self {
        if is_attended {
            Self::Attended
        } else {
            Self::Registered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Attended => "attended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub token_id: String,
    pub is_attended: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn attendee_summary(&self) -> AttendeeSummary {
        AttendeeSummary {
            id: self.id,
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            token_id: self.token_id.clone(),
            is_attended: self.is_attended,
        }
    }

    /// Flips the flag and keeps `status` in step with it.
    pub fn set_attended(&mut self, is_attended: bool) {
        self.is_attended = is_attended;
        self.status = RegistrationStatus::from_attended(is_attended)
            .as_str()
            .to_string();
        self.updated_at = Utc::now();
    }
}

/// Validated input for inserting a registration. `user_email` is already
/// normalised.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub token_id: String,
}

/// Body of `POST /registrations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub event_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub is_attended: bool,
}

/// What the check-in console shows for a scanned ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub token_id: String,
    pub is_attended: bool,
}

/// A registration with its event populated, as served by the ticket lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    #[serde(flatten)]
    pub registration: Registration,
    pub event: EventSummary,
}

/// A registration with the event title and date for admin listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationListing {
    #[serde(flatten)]
    pub registration: Registration,
    pub event: Option<EventBrief>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBrief {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub date_time: DateTime<Utc>,
}
