//! Ticket check-in at the door.
//!
//! A registration moves `registered -> attended` exactly once through a scan.
//! The store flips the flag with a conditional update, so of two concurrent
//! scans of the same ticket only one sees [`CheckInResult::Verified`].

pub mod scanner;

pub use scanner::{ScanGate, ScanState};

use tracing::info;
use uuid::Uuid;

use crate::models::{AttendeeSummary, Registration};
use crate::store::Store;
use crate::utils::error::AppError;

/// Outcome of one scan. Only `Verified` changed anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInResult {
    Verified(AttendeeSummary),
    AlreadyCheckedIn(AttendeeSummary),
    InvalidTicket,
}

impl CheckInResult {
    /// Success keeps the attendee; the other outcomes become the matching
    /// error so the HTTP layer can answer with a distinct status.
    pub fn into_result(self) -> Result<AttendeeSummary, AppError> {
        match self {
            CheckInResult::Verified(attendee) => Ok(attendee),
            CheckInResult::AlreadyCheckedIn(attendee) => Err(AppError::AlreadyCheckedIn {
                user_name: attendee.user_name,
            }),
            CheckInResult::InvalidTicket => {
                Err(AppError::InvalidTicket("unknown token".to_string()))
            }
        }
    }
}

/// Reduces a scanned payload to a token. Both a bare token and a ticket URL
/// ending in `/<token>` are accepted.
pub fn normalize_payload(payload: &str) -> Option<String> {
    let candidate = payload.trim().trim_end_matches('/');
    let token = candidate.rsplit('/').next().unwrap_or(candidate).trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub async fn check_in(store: &dyn Store, payload: &str) -> Result<CheckInResult, AppError> {
    let Some(token) = normalize_payload(payload) else {
        return Ok(CheckInResult::InvalidTicket);
    };

    if let Some(registration) = store.mark_attended(&token).await? {
        info!(registration_id = %registration.id, "Attendee checked in");
        return Ok(CheckInResult::Verified(registration.attendee_summary()));
    }

    // The conditional update matched nothing: either the token is unknown or
    // the ticket was already used.
    Ok(match store.registration_by_token(&token).await? {
        Some(registration) => {
            info!(registration_id = %registration.id, "Duplicate scan");
            CheckInResult::AlreadyCheckedIn(registration.attendee_summary())
        }
        None => CheckInResult::InvalidTicket,
    })
}

/// Admin override in either direction, including undoing a check-in.
pub async fn set_attendance(
    store: &dyn Store,
    registration_id: Uuid,
    is_attended: bool,
) -> Result<Registration, AppError> {
    let registration = store
        .set_attendance(registration_id, is_attended)
        .await?
        .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
    info!(registration_id = %registration.id, is_attended, "Attendance updated");
    Ok(registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, NewEvent, NewRegistration};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, Registration) {
        let store = MemoryStore::new();
        let event = store
            .create_event(NewEvent {
                title: "Rust Meetup".into(),
                description: "Monthly".into(),
                full_description: None,
                venue: "Hall A".into(),
                map_url: None,
                date_time: Utc::now(),
                status: EventStatus::Upcoming,
                max_attendees: 100,
                image_url: None,
                is_registration_enabled: true,
                is_certificate_enabled: false,
                certificate_template_url: None,
                cert_name_x: None,
                cert_name_y: None,
                cert_font_size: None,
                cert_font_family: "Helvetica".into(),
            })
            .await
            .unwrap();
        let registration = store
            .insert_registration(NewRegistration {
                event_id: event.id,
                user_id: None,
                user_name: "Ada Lovelace".into(),
                user_email: "ada@example.com".into(),
                user_phone: None,
                token_id: "AbC123xYz789".into(),
            })
            .await
            .unwrap();
        (store, registration)
    }

    #[test]
    fn payloads_reduce_to_their_last_segment() {
        assert_eq!(normalize_payload("AbC123xYz789").as_deref(), Some("AbC123xYz789"));
        assert_eq!(
            normalize_payload("https://events.example.com/ticket/AbC123xYz789").as_deref(),
            Some("AbC123xYz789")
        );
        assert_eq!(
            normalize_payload(" https://events.example.com/ticket/AbC123xYz789/ \n").as_deref(),
            Some("AbC123xYz789")
        );
        assert_eq!(normalize_payload("   "), None);
        assert_eq!(normalize_payload("///"), None);
    }

    #[tokio::test]
    async fn first_scan_verifies() {
        let (store, registration) = seeded().await;
        let result = check_in(&store, &registration.token_id).await.unwrap();
        match result {
            CheckInResult::Verified(attendee) => {
                assert_eq!(attendee.user_name, "Ada Lovelace");
                assert!(attendee.is_attended);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_scan_is_a_duplicate_and_changes_nothing() {
        let (store, registration) = seeded().await;
        check_in(&store, &registration.token_id).await.unwrap();
        let before = store
            .registration_by_token(&registration.token_id)
            .await
            .unwrap()
            .unwrap();

        let result = check_in(&store, &format!("https://x.test/ticket/{}", registration.token_id))
            .await
            .unwrap();
        assert!(matches!(result, CheckInResult::AlreadyCheckedIn(ref a) if a.user_name == "Ada Lovelace"));

        let after = store
            .registration_by_token(&registration.token_id)
            .await
            .unwrap()
            .unwrap();
        assert!(after.is_attended);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_and_mutates_nothing() {
        let (store, registration) = seeded().await;
        let result = check_in(&store, "ZZZZZZZZZZZZ").await.unwrap();
        assert_eq!(result, CheckInResult::InvalidTicket);

        let untouched = store.registration_by_id(registration.id).await.unwrap().unwrap();
        assert!(!untouched.is_attended);
    }

    #[tokio::test]
    async fn concurrent_scans_verify_once() {
        let (store, registration) = seeded().await;
        let store = Arc::new(store);
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let store = Arc::clone(&store);
                let token = registration.token_id.clone();
                tokio::spawn(async move { check_in(store.as_ref(), &token).await.unwrap() })
            })
            .collect();

        let mut verified = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                CheckInResult::Verified(_) => verified += 1,
                CheckInResult::AlreadyCheckedIn(_) => duplicates += 1,
                CheckInResult::InvalidTicket => panic!("token exists"),
            }
        }
        assert_eq!((verified, duplicates), (1, 5));
    }

    #[tokio::test]
    async fn attendance_can_be_undone() {
        let (store, registration) = seeded().await;
        check_in(&store, &registration.token_id).await.unwrap();

        let undone = set_attendance(&store, registration.id, false).await.unwrap();
        assert!(!undone.is_attended);
        assert_eq!(undone.status, "registered");

        let result = check_in(&store, &registration.token_id).await.unwrap();
        assert!(matches!(result, CheckInResult::Verified(_)));

        assert!(matches!(
            set_attendance(&store, Uuid::new_v4(), true).await.err().unwrap(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn outcomes_map_to_errors() {
        let attendee = AttendeeSummary {
            id: Uuid::new_v4(),
            user_name: "Ada".into(),
            user_email: "ada@example.com".into(),
            token_id: "t".into(),
            is_attended: true,
        };
        assert!(CheckInResult::Verified(attendee.clone()).into_result().is_ok());
        assert!(matches!(
            CheckInResult::AlreadyCheckedIn(attendee).into_result(),
            Err(AppError::AlreadyCheckedIn { ref user_name }) if user_name == "Ada"
        ));
        assert!(matches!(
            CheckInResult::InvalidTicket.into_result(),
            Err(AppError::InvalidTicket(_))
        ));
    }
}
