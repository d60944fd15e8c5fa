//! Registration: token issuing, persistence and the ticket email.

use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};
use uuid::Uuid;

use super::document::{load_logo, render_ticket, TicketDetails};
use crate::config::Config;
use crate::mail::{MailAttachment, Mailer, OutgoingMail};
use crate::models::{Event, NewRegistration, Registration, RegistrationRequest, TicketView};
use crate::store::{Store, StoreError, UniqueKey};
use crate::utils::error::AppError;
use crate::utils::validation::{
    is_valid_email, normalize_email, optional, required, ticket_filename,
};

/// Alphanumeric, so it needs no escaping in a URL path and fits a small QR
/// symbol.
pub const TOKEN_LENGTH: usize = 12;

const TOKEN_ATTEMPTS: usize = 3;

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Validates the request, persists the registration and mails the ticket.
///
/// The (event, email) pair is unique in the store itself; a second
/// registration loses at insert time, however close together the two
/// requests arrive. A failed ticket email is logged and does not undo the
/// registration.
pub async fn register(
    store: &dyn Store,
    mailer: &dyn Mailer,
    config: &Config,
    request: RegistrationRequest,
) -> Result<Registration, AppError> {
    let event_id = required("eventId", request.event_id)?;
    let event_id = Uuid::parse_str(&event_id)
        .map_err(|_| AppError::ValidationError("eventId is not a valid id".to_string()))?;
    let user_name = required("userName", request.user_name)?;
    let user_email = normalize_email(&required("userEmail", request.user_email)?);
    if !is_valid_email(&user_email) {
        return Err(AppError::ValidationError(
            "userEmail is not a valid email address".to_string(),
        ));
    }
    let user_phone = optional(request.user_phone);

    let event = store
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !event.accepts_registrations() {
        return Err(AppError::ValidationError(
            "Registration is closed for this event".to_string(),
        ));
    }

    let mut attempt = 0;
    let registration = loop {
        attempt += 1;
        let candidate = NewRegistration {
            event_id,
            user_id: request.user_id,
            user_name: user_name.clone(),
            user_email: user_email.clone(),
            user_phone: user_phone.clone(),
            token_id: generate_token(),
        };
        match store.insert_registration(candidate).await {
            Ok(registration) => break registration,
            Err(StoreError::UniqueViolation(UniqueKey::Token)) if attempt < TOKEN_ATTEMPTS => {
                warn!(attempt, "Ticket token collision, issuing a new token");
            }
            Err(e) => return Err(e.into()),
        }
    };

    info!(
        registration_id = %registration.id,
        event_id = %event.id,
        "Registration created"
    );

    if let Err(e) = deliver_ticket(mailer, config, &event, &registration).await {
        warn!(
            registration_id = %registration.id,
            error = %e,
            "Ticket email not delivered; registration kept"
        );
    }

    Ok(registration)
}

/// Mails the ticket link and, when it renders, the PDF.
pub async fn deliver_ticket(
    mailer: &dyn Mailer,
    config: &Config,
    event: &Event,
    registration: &Registration,
) -> Result<(), AppError> {
    let attachment = match build_ticket_pdf(config, event, registration).await {
        Ok(pdf) => Some(MailAttachment::pdf(ticket_filename(&event.title), pdf)),
        Err(e) => {
            warn!(registration_id = %registration.id, error = %e, "Ticket PDF not rendered, sending link only");
            None
        }
    };

    mailer
        .send(ticket_mail(config, event, registration, attachment))
        .await
        .map_err(|e| AppError::DeliveryFailed(e.to_string()))
}

fn ticket_mail(
    config: &Config,
    event: &Event,
    registration: &Registration,
    attachment: Option<MailAttachment>,
) -> OutgoingMail {
    let link = format!("{}/ticket/{}", config.frontend_url, registration.token_id);
    let title = &event.title;
    let name = &registration.user_name;
    let token = &registration.token_id;

    OutgoingMail {
        to: registration.user_email.clone(),
        subject: format!("Your Ticket: {title}"),
        text: format!(
            "Hi {name},\n\nYou're registered for {title}.\n\n\
             Your ticket token: {token}\nView your ticket: {link}\n\n\
             Your ticket is attached. Show the QR code at the entrance.\n"
        ),
        html: Some(format!(
            "<h1>You're registered!</h1>\
             <p>Hi {name},</p>\
             <p>Thanks for registering for <strong>{title}</strong>.</p>\
             <p>Your ticket token: <code>{token}</code></p>\
             <p><a href=\"{link}\">View your ticket</a></p>\
             <p>Your ticket is attached. Show the QR code at the entrance.</p>"
        )),
        attachments: attachment.into_iter().collect(),
    }
}

async fn build_ticket_pdf(
    config: &Config,
    event: &Event,
    registration: &Registration,
) -> Result<Vec<u8>, AppError> {
    let details = TicketDetails {
        organization: config.organization_name.clone(),
        title: event.title.clone(),
        venue: event.venue.clone(),
        date_time: event.date_time,
        attendee: registration.user_name.clone(),
        token: registration.token_id.clone(),
    };
    let logo_path = config.ticket_logo_path.clone();

    tokio::task::spawn_blocking(move || {
        let logo = load_logo(logo_path.as_deref());
        render_ticket(&details, logo.as_ref())
    })
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .map_err(|e| AppError::RenderError(e.to_string()))
}

/// Registration plus event summary for the public ticket page.
pub async fn ticket_view(store: &dyn Store, token: &str) -> Result<TicketView, AppError> {
    let (registration, event) = ticket_parts(store, token).await?;
    Ok(TicketView {
        registration,
        event: event.summary(),
    })
}

/// The ticket PDF and its download filename.
pub async fn ticket_pdf(
    store: &dyn Store,
    config: &Config,
    token: &str,
) -> Result<(Vec<u8>, String), AppError> {
    let (registration, event) = ticket_parts(store, token).await?;
    let pdf = build_ticket_pdf(config, &event, &registration).await?;
    Ok((pdf, ticket_filename(&event.title)))
}

async fn ticket_parts(store: &dyn Store, token: &str) -> Result<(Registration, Event), AppError> {
    let registration = store
        .registration_by_token(token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    let event = store
        .get_event(registration.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok((registration, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::RecordingMailer;
    use crate::models::{EventStatus, NewEvent};
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn test_config() -> Config {
        Config {
            ticket_logo_path: None,
            ..Config::default()
        }
    }

    async fn seed_event(store: &MemoryStore, status: EventStatus, open: bool) -> Event {
        store
            .create_event(NewEvent {
                title: "Autumn Hack 2025!".into(),
                description: "Hackathon".into(),
                full_description: None,
                venue: "Main Hall".into(),
                map_url: None,
                date_time: Utc::now(),
                status,
                max_attendees: 100,
                image_url: None,
                is_registration_enabled: open,
                is_certificate_enabled: false,
                certificate_template_url: None,
                cert_name_x: None,
                cert_name_y: None,
                cert_font_size: None,
                cert_font_family: "Helvetica".into(),
            })
            .await
            .unwrap()
    }

    fn request(event: &Event, email: &str) -> RegistrationRequest {
        RegistrationRequest {
            event_id: Some(event.id.to_string()),
            user_id: None,
            user_name: Some("Grace Hopper".into()),
            user_email: Some(email.into()),
            user_phone: Some("  ".into()),
        }
    }

    #[test]
    fn tokens_are_short_and_url_safe() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_token(), token);
    }

    #[tokio::test]
    async fn registration_mails_the_ticket() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let event = seed_event(&store, EventStatus::Upcoming, true).await;

        let registration = register(&store, &mailer, &test_config(), request(&event, "Grace@Example.com "))
            .await
            .unwrap();
        assert_eq!(registration.user_email, "grace@example.com");
        assert_eq!(registration.user_phone, None);
        assert!(!registration.is_attended);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Your Ticket: Autumn Hack 2025!");
        assert!(sent[0].text.contains(&format!(
            "http://localhost:5173/ticket/{}",
            registration.token_id
        )));
        assert_eq!(sent[0].attachments[0].filename, "Autumn_Hack_2025__Ticket.pdf");
        assert!(sent[0].attachments[0].content.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn same_email_twice_is_a_duplicate() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let event = seed_event(&store, EventStatus::Upcoming, true).await;

        register(&store, &mailer, &test_config(), request(&event, "grace@example.com"))
            .await
            .unwrap();
        let err = register(&store, &mailer, &test_config(), request(&event, "GRACE@example.com"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::DuplicateRegistration(_)));
        assert_eq!(
            store.list_registrations(Some(event.id), None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn mail_failure_keeps_the_registration() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::failing_for(["grace@example.com"]);
        let event = seed_event(&store, EventStatus::Upcoming, true).await;

        let registration = register(&store, &mailer, &test_config(), request(&event, "grace@example.com"))
            .await
            .unwrap();
        assert!(store
            .registration_by_token(&registration.token_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn closed_or_cancelled_events_refuse() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let closed = seed_event(&store, EventStatus::Upcoming, false).await;
        let cancelled = seed_event(&store, EventStatus::Cancelled, true).await;

        for event in [&closed, &cancelled] {
            let err = register(&store, &mailer, &test_config(), request(event, "a@example.com"))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn missing_fields_and_unknown_events() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();

        let err = register(&store, &mailer, &test_config(), RegistrationRequest::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = register(
            &store,
            &mailer,
            &test_config(),
            RegistrationRequest {
                event_id: Some(Uuid::new_v4().to_string()),
                user_name: Some("Grace".into()),
                user_email: Some("grace@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn ticket_lookup_and_pdf() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let event = seed_event(&store, EventStatus::Upcoming, true).await;
        let registration = register(&store, &mailer, &test_config(), request(&event, "g@example.com"))
            .await
            .unwrap();

        let view = ticket_view(&store, &registration.token_id).await.unwrap();
        assert_eq!(view.event.title, event.title);

        let (pdf, filename) = ticket_pdf(&store, &test_config(), &registration.token_id)
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(filename, "Autumn_Hack_2025__Ticket.pdf");

        assert!(matches!(
            ticket_view(&store, "nope").await.err().unwrap(),
            AppError::NotFound(_)
        ));
    }
}
