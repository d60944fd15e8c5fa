use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use tracing::info;

use crate::auth::AuthContext;
use crate::models::event::{DEFAULT_CERT_FONT_FAMILY, DEFAULT_MAX_ATTENDEES};
use crate::models::{CreateEventRequest, EventChanges, EventStatus, NewEvent};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};
use crate::utils::validation::{optional, parse_id, required, validate_layout_value};

use super::json_body;

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.store.list_events().await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id("Event", &id)?;
    let event = state
        .store
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn create_event(
    auth: AuthContext,
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let new_event = validate_new_event(json_body(payload)?)?;

    let event = state.store.create_event(new_event).await?;
    info!(event_id = %event.id, "Event created");
    Ok(created(event, "Event created successfully"))
}

pub async fn update_event(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EventChanges>, JsonRejection>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let id = parse_id("Event", &id)?;
    let changes = json_body(payload)?;
    validate_changes(&changes)?;

    let event = state
        .store
        .update_event(id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    info!(event_id = %event.id, "Event updated");
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let id = parse_id("Event", &id)?;
    if !state.store.delete_event(id).await? {
        return Err(AppError::NotFound("Event not found".to_string()));
    }
    info!(event_id = %id, "Event deleted");
    Ok(empty_success("Event deleted successfully"))
}

fn validate_new_event(request: CreateEventRequest) -> Result<NewEvent, AppError> {
    let title = required("title", request.title)?;
    let description = required("description", request.description)?;
    let venue = required("venue", request.venue)?;
    let date_time = request
        .date_time
        .ok_or_else(|| AppError::ValidationError("dateTime is required".to_string()))?;
    validate_layout(request.cert_name_x, request.cert_name_y, request.cert_font_size)?;
    let max_attendees = request.max_attendees.unwrap_or(DEFAULT_MAX_ATTENDEES);
    if max_attendees <= 0 {
        return Err(AppError::ValidationError(
            "maxAttendees must be positive".to_string(),
        ));
    }

    Ok(NewEvent {
        title,
        description,
        full_description: optional(request.full_description),
        venue,
        map_url: optional(request.map_url),
        date_time,
        status: request.status.unwrap_or(EventStatus::Upcoming),
        max_attendees,
        image_url: optional(request.image_url),
        is_registration_enabled: request.is_registration_enabled.unwrap_or(true),
        is_certificate_enabled: request.is_certificate_enabled.unwrap_or(false),
        certificate_template_url: optional(request.certificate_template_url),
        cert_name_x: request.cert_name_x,
        cert_name_y: request.cert_name_y,
        cert_font_size: request.cert_font_size,
        cert_font_family: optional(request.cert_font_family)
            .unwrap_or_else(|| DEFAULT_CERT_FONT_FAMILY.to_string()),
    })
}

fn validate_changes(changes: &EventChanges) -> Result<(), AppError> {
    for (field, value) in [
        ("title", &changes.title),
        ("description", &changes.description),
        ("venue", &changes.venue),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::ValidationError(format!("{field} cannot be blank")));
        }
    }
    if changes.max_attendees.is_some_and(|n| n <= 0) {
        return Err(AppError::ValidationError(
            "maxAttendees must be positive".to_string(),
        ));
    }
    validate_layout(changes.cert_name_x, changes.cert_name_y, changes.cert_font_size)
}

fn validate_layout(x: Option<f64>, y: Option<f64>, font_size: Option<f64>) -> Result<(), AppError> {
    validate_layout_value("certNameX", x, true)?;
    validate_layout_value("certNameY", y, true)?;
    validate_layout_value("certFontSize", font_size, false)
}
