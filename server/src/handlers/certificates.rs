use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::auth::AuthContext;
use crate::certificates::batch::{render_preview, CertificateJob};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{pdf, success, with_status};
use crate::utils::validation::{certificate_download_filename, parse_id};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendQuery {
    pub attended_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub name: Option<String>,
}

/// Runs the batch on its own task. If it outlives the configured timeout the
/// request answers `202` and the task keeps delivering.
pub async fn send_certificates(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SendQuery>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let id = parse_id("Event", &id)?;

    let job = CertificateJob::prepare(
        state.store.as_ref(),
        &state.config,
        id,
        query.attended_only.unwrap_or(false),
    )
    .await?;
    let queued = job.attendee_count();

    let batch = tokio::spawn(job.dispatch(
        Arc::clone(&state.mailer),
        state.config.certificates.concurrency,
    ));

    match tokio::time::timeout(state.config.certificates.batch_timeout, batch).await {
        Ok(Ok(summary)) => {
            let message = summary.message();
            Ok(success(summary, message))
        }
        Ok(Err(e)) => Err(AppError::InternalServerError(format!(
            "certificate batch task failed: {e}"
        ))),
        Err(_) => {
            warn!(event_id = %id, queued, "Certificate batch still running after request timeout");
            Ok(with_status(
                StatusCode::ACCEPTED,
                json!({ "queued": queued }),
                format!("Sending {queued} certificates in the background."),
            ))
        }
    }
}

pub async fn preview_certificate(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, AppError> {
    auth.require_admin()?;
    let id = parse_id("Event", &id)?;
    let name = query.name.unwrap_or_default();

    let bytes = render_preview(state.store.as_ref(), &state.config, id, &name).await?;
    let filename = certificate_download_filename(if name.trim().is_empty() {
        "Preview"
    } else {
        name.as_str()
    });
    Ok(pdf(bytes, &filename))
}
