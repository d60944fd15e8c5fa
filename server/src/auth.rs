//! Per-request staff capability.
//!
//! Handlers that need a role take an [`AuthContext`] argument; it is built
//! from the `Authorization: Bearer` header of that request alone. Holding one
//! at all means staff (admin or volunteer); admin-only handlers also call
//! [`AuthContext::require_admin`].

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Volunteer,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub role: Role,
}

impl AuthContext {
    pub fn from_token(token: &str, config: &Config) -> Result<Self, AppError> {
        if matches_secret(token, config.admin_token.as_deref()) {
            return Ok(Self { role: Role::Admin });
        }
        if matches_secret(token, config.volunteer_token.as_deref()) {
            return Ok(Self {
                role: Role::Volunteer,
            });
        }
        Err(AppError::AuthError("Invalid access token".to_string()))
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Volunteer => Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }
}

fn matches_secret(presented: &str, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len() && presented.ct_eq(expected).unwrap_u8() == 1
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::AuthError("Expected a bearer token".to_string()))?;

        AuthContext::from_token(token, &state.config)
    }
}
