//! Persistence boundary.
//!
//! Handlers and services only see [`Store`]. Uniqueness of registrations is a
//! property of the backend, not of the callers: both backends reject a second
//! registration for the same (event, email) pair at insert time, which is what
//! closes the check-then-insert race.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent, NewRegistration, Registration};

/// Which unique constraint an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    EventEmail,
    Token,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    UniqueViolation(UniqueKey),

    #[error("referenced event does not exist")]
    MissingEvent,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn create_event(&self, event: NewEvent) -> StoreResult<Event>;

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>>;

    /// Events ordered by date, soonest first.
    async fn list_events(&self) -> StoreResult<Vec<Event>>;

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>>;

    /// Removes the event and its registrations.
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_registration(&self, registration: NewRegistration)
        -> StoreResult<Registration>;

    async fn registration_by_id(&self, id: Uuid) -> StoreResult<Option<Registration>>;

    async fn registration_by_token(&self, token: &str) -> StoreResult<Option<Registration>>;

    /// Newest first. `limit` of `None` returns everything.
    async fn list_registrations(
        &self,
        event_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Registration>>;

    /// Atomically flips `is_attended` from false to true for the given token.
    /// Returns `None` when no unattended registration carries the token, which
    /// covers both unknown tokens and repeat scans.
    async fn mark_attended(&self, token: &str) -> StoreResult<Option<Registration>>;

    async fn set_attendance(&self, id: Uuid, is_attended: bool)
        -> StoreResult<Option<Registration>>;

    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool>;
}
