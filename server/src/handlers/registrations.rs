use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthContext;
use crate::checkin;
use crate::models::{
    AttendanceUpdate, EventBrief, Registration, RegistrationListing, RegistrationRequest,
};
use crate::state::AppState;
use crate::tickets;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, pdf, success};
use crate::utils::validation::parse_id;

use super::json_body;

const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub event_id: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let registration = tickets::register(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config,
        request,
    )
    .await?;
    Ok(created(registration, "Registration successful"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let ticket = tickets::ticket_view(state.store.as_ref(), &token).await?;
    Ok(success(ticket, "Ticket retrieved successfully"))
}

pub async fn download_ticket(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let (bytes, filename) = tickets::ticket_pdf(state.store.as_ref(), &state.config, &token).await?;
    Ok(pdf(bytes, &filename))
}

pub async fn list_registrations(
    auth: AuthContext,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let event_id = match query.event_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_id("Event", raw)?),
        _ => None,
    };
    let registrations = state.store.list_registrations(event_id, None).await?;
    let listings = with_event_briefs(&state, registrations).await?;
    Ok(success(listings, "Registrations retrieved successfully"))
}

pub async fn recent_registrations(
    auth: AuthContext,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let registrations = state
        .store
        .list_registrations(None, Some(RECENT_LIMIT))
        .await?;
    let listings = with_event_briefs(&state, registrations).await?;
    Ok(success(listings, "Recent registrations retrieved successfully"))
}

/// Staff view of one event's attendee list.
pub async fn event_registrations(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id("Event", &event_id)?;
    if state.store.get_event(event_id).await?.is_none() {
        return Err(AppError::NotFound("Event not found".to_string()));
    }
    let registrations = state.store.list_registrations(Some(event_id), None).await?;
    Ok(success(registrations, "Registrations retrieved successfully"))
}

pub async fn delete_registration(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let id = parse_id("Registration", &id)?;
    if !state.store.delete_registration(id).await? {
        return Err(AppError::NotFound("Registration not found".to_string()));
    }
    info!(registration_id = %id, "Registration deleted");
    Ok(empty_success("Registration deleted successfully"))
}

/// `:tokenId` may be the raw scanner payload (URL-encoded), not just the token.
pub async fn check_in(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(payload): Path<String>,
) -> Result<Response, AppError> {
    let attendee = checkin::check_in(state.store.as_ref(), &payload)
        .await?
        .into_result()?;
    Ok(success(attendee, "Check-in successful"))
}

pub async fn update_attendance(
    _auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AttendanceUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id("Registration", &id)?;
    let update = json_body(payload)?;
    let registration = checkin::set_attendance(state.store.as_ref(), id, update.is_attended).await?;
    Ok(success(registration, "Attendance updated successfully"))
}

async fn with_event_briefs(
    state: &AppState,
    registrations: Vec<Registration>,
) -> Result<Vec<RegistrationListing>, AppError> {
    let briefs: HashMap<_, _> = state
        .store
        .list_events()
        .await?
        .into_iter()
        .map(|e| {
            (
                e.id,
                EventBrief {
                    id: e.id,
                    title: e.title,
                    date_time: e.date_time,
                },
            )
        })
        .collect();

    Ok(registrations
        .into_iter()
        .map(|registration| RegistrationListing {
            event: briefs.get(&registration.event_id).cloned(),
            registration,
        })
        .collect())
}
