use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::{StoreError, UniqueKey};
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("{user_name} is already checked in")]
    AlreadyCheckedIn { user_name: String },

    #[error("Certificate template unreadable: {0}")]
    TemplateUnreadable(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Document rendering failed: {0}")]
    RenderError(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(UniqueKey::EventEmail) => AppError::DuplicateRegistration(
                "User already registered for this event".to_string(),
            ),
            StoreError::UniqueViolation(UniqueKey::Token) => {
                AppError::InternalServerError("ticket token collision".to_string())
            }
            StoreError::MissingEvent => AppError::NotFound("Event not found".to_string()),
            StoreError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateRegistration(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTicket(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyCheckedIn { .. } => StatusCode::CONFLICT,
            AppError::TemplateUnreadable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            AppError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::RenderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DuplicateRegistration(_) => "DUPLICATE_REGISTRATION",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidTicket(_) => "INVALID_TICKET",
            AppError::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            AppError::TemplateUnreadable(_) => "TEMPLATE_UNREADABLE",
            AppError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AppError::DeliveryFailed(_) => "DELIVERY_FAILED",
            AppError::RenderError(_) => "RENDER_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::RenderError(msg)
            | AppError::DeliveryFailed(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            _ => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::DuplicateRegistration(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::TemplateUnreadable(msg)
            | AppError::PreconditionFailed(msg)
            | AppError::DeliveryFailed(msg) => msg.clone(),
            AppError::InvalidTicket(_) => "Registration token not found".to_string(),
            AppError::AlreadyCheckedIn { user_name } => {
                format!("{user_name} has already been checked in")
            }
            AppError::RenderError(_) => "Failed to render document".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let public_message = self.public_message();

        // Only the duplicate-scan case carries structured details: the console
        // shows who was already admitted.
        let details = match &self {
            AppError::AlreadyCheckedIn { user_name } => Some(json!({ "userName": user_name })),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}
