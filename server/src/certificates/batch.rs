//! Renders and mails one certificate per attendee of an event.
//!
//! [`CertificateJob::prepare`] runs every check that can fail the whole batch
//! before anything is sent. [`CertificateJob::dispatch`] then works through the
//! attendees with bounded concurrency, and a failure for one attendee only
//! lands in the [`BatchSummary`].

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::fonts::resolve_font;
use super::layout::{map_to_template, Placement};
use super::render::{render_certificate, CertificateFont, CertificateTemplate};
use crate::config::Config;
use crate::mail::{MailAttachment, Mailer, OutgoingMail};
use crate::models::{Event, Registration};
use crate::store::Store;
use crate::utils::error::AppError;
use crate::utils::validation::{certificate_filename, is_valid_email};

const FALLBACK_ATTENDEE_NAME: &str = "Attendee";
const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailure {
    pub registration_id: Uuid,
    pub user_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl BatchSummary {
    pub fn message(&self) -> String {
        if self.failed == 0 {
            format!("Sent {} emails.", self.sent)
        } else {
            format!("Sent {} emails, {} failed.", self.sent, self.failed)
        }
    }
}

/// Everything a batch needs, loaded once and shared by every attendee.
pub struct CertificateJob {
    event: Event,
    template: CertificateTemplate,
    font: CertificateFont,
    placement: Placement,
    attendees: Vec<Registration>,
}

impl CertificateJob {
    pub async fn prepare(
        store: &dyn Store,
        config: &Config,
        event_id: Uuid,
        attended_only: bool,
    ) -> Result<Self, AppError> {
        let event = store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        if !event.is_certificate_enabled {
            return Err(AppError::PreconditionFailed(
                "Certificates are not enabled for this event".to_string(),
            ));
        }

        let mut attendees = store.list_registrations(Some(event.id), None).await?;
        if attended_only {
            attendees.retain(|r| r.is_attended);
        }
        if attendees.is_empty() {
            return Err(AppError::PreconditionFailed(
                "No registrations found for this event".to_string(),
            ));
        }

        let template = load_template(config, &event).await?;
        let layout = event.certificate_layout();
        let placement =
            map_to_template(&layout, template.size(), config.certificates.baseline_ratio);
        let font = load_font(config, &layout.font_family).await?;

        info!(
            event_id = %event.id,
            attendees = attendees.len(),
            template_width = template.size().width,
            template_height = template.size().height,
            "Certificate batch prepared"
        );

        Ok(Self {
            event,
            template,
            font,
            placement,
            attendees,
        })
    }

    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }

    pub async fn dispatch(self, mailer: Arc<dyn Mailer>, concurrency: usize) -> BatchSummary {
        let Self {
            event,
            template,
            font,
            placement,
            attendees,
        } = self;
        let shared = Arc::new(SharedAssets {
            title: event.title.clone(),
            template,
            font,
            placement,
        });

        let outcomes: Vec<(Registration, Result<(), String>)> = stream::iter(attendees)
            .map(|registration| {
                let shared = Arc::clone(&shared);
                let mailer = Arc::clone(&mailer);
                async move {
                    let outcome = deliver(&shared, mailer.as_ref(), &registration).await;
                    (registration, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for (registration, outcome) in outcomes {
            match outcome {
                Ok(()) => summary.sent += 1,
                Err(reason) => {
                    warn!(
                        event_id = %event.id,
                        registration_id = %registration.id,
                        reason = %reason,
                        "Certificate not delivered"
                    );
                    summary.failed += 1;
                    summary.failures.push(DeliveryFailure {
                        registration_id: registration.id,
                        user_name: registration.user_name,
                        reason,
                    });
                }
            }
        }

        info!(
            event_id = %event.id,
            sent = summary.sent,
            failed = summary.failed,
            "Certificate batch finished"
        );
        summary
    }
}

struct SharedAssets {
    title: String,
    template: CertificateTemplate,
    font: CertificateFont,
    placement: Placement,
}

async fn deliver(
    shared: &SharedAssets,
    mailer: &dyn Mailer,
    registration: &Registration,
) -> Result<(), String> {
    if !is_valid_email(&registration.user_email) {
        return Err("missing or invalid email address".to_string());
    }

    let name = display_name(&registration.user_name);
    let pdf = {
        let template = shared.template.clone();
        let font = shared.font.clone();
        let placement = shared.placement;
        let name = name.clone();
        tokio::task::spawn_blocking(move || {
            render_certificate(&template, &font, placement, &name)
        })
        .await
        .map_err(|e| format!("render task failed: {e}"))?
        .map_err(|e| e.to_string())?
    };

    mailer
        .send(certificate_mail(&shared.title, registration, &name, pdf))
        .await
        .map_err(|e| e.to_string())
}

fn certificate_mail(
    title: &str,
    registration: &Registration,
    name: &str,
    pdf: Vec<u8>,
) -> OutgoingMail {
    OutgoingMail {
        to: registration.user_email.clone(),
        subject: format!("Your Certificate for {title}"),
        text: format!(
            "Dear {name},\n\nThank you for attending {title}. \
             Please find your certificate of participation attached.\n"
        ),
        html: Some(format!(
            "<p>Dear {name},</p>\
             <p>Thank you for attending <strong>{title}</strong>. \
             Please find your certificate of participation attached.</p>"
        )),
        attachments: vec![MailAttachment::pdf(certificate_filename(name), pdf)],
    }
}

fn display_name(user_name: &str) -> String {
    let trimmed = user_name.trim();
    if trimmed.is_empty() {
        FALLBACK_ATTENDEE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One certificate for an arbitrary name, used by the layout designer's
/// preview. Needs a readable template but no registrations.
pub async fn render_preview(
    store: &dyn Store,
    config: &Config,
    event_id: Uuid,
    name: &str,
) -> Result<Vec<u8>, AppError> {
    let event = store
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let template = load_template(config, &event).await?;
    let layout = event.certificate_layout();
    let placement = map_to_template(&layout, template.size(), config.certificates.baseline_ratio);
    let font = load_font(config, &layout.font_family).await?;
    let name = display_name(name);

    tokio::task::spawn_blocking(move || render_certificate(&template, &font, placement, &name))
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .map_err(|e| AppError::RenderError(e.to_string()))
}

async fn load_template(config: &Config, event: &Event) -> Result<CertificateTemplate, AppError> {
    let missing =
        || AppError::PreconditionFailed("No certificate template uploaded for this event".to_string());

    let reference = event
        .certificate_template_url
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(missing)?;
    let path = resolve_template_path(&config.upload_dir, reference).ok_or_else(|| {
        warn!(event_id = %event.id, reference, "Template reference outside upload directory");
        missing()
    })?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(event_id = %event.id, path = %path.display(), "Template file missing");
            return Err(missing());
        }
        Err(e) => {
            return Err(AppError::TemplateUnreadable(format!(
                "Certificate template could not be read: {e}"
            )))
        }
    };

    tokio::task::spawn_blocking(move || CertificateTemplate::decode(&bytes))
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .map_err(|e| {
            AppError::TemplateUnreadable(format!("Certificate template could not be decoded: {e}"))
        })
}

/// Resolves the batch font, giving up on a slow script-font source after the
/// configured timeout and using the built-in face instead.
async fn load_font(config: &Config, family: &str) -> Result<CertificateFont, AppError> {
    let timeout = config.certificates.font_timeout;
    let owned_family = family.to_string();
    let script_source = config.certificates.script_font.clone();
    let task = tokio::task::spawn_blocking(move || {
        resolve_font(&owned_family, script_source.as_deref(), timeout)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|e| AppError::InternalServerError(e.to_string())),
        Err(_) => {
            warn!(family, "Script font still loading after timeout, using built-in face");
            Ok(CertificateFont::builtin_for(family))
        }
    }
}

/// Maps a stored template reference onto a file under `upload_dir`. Absolute
/// paths other than the `/uploads/` prefix and any `..` are refused.
fn resolve_template_path(upload_dir: &Path, reference: &str) -> Option<PathBuf> {
    let relative = reference
        .trim()
        .strip_prefix(UPLOADS_PREFIX)
        .unwrap_or(reference.trim());
    let relative = Path::new(relative);

    let mut resolved = upload_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (resolved != upload_dir).then_some(resolved)
}
