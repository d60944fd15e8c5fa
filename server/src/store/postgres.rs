use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, UniqueKey};
use crate::models::{
    Event, EventChanges, NewEvent, NewRegistration, Registration, RegistrationStatus,
};

const TOKEN_CONSTRAINT: &str = "registrations_token_key";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let key = match db_err.constraint() {
                Some(TOKEN_CONSTRAINT) => UniqueKey::Token,
                _ => UniqueKey::EventEmail,
            };
            return StoreError::UniqueViolation(key);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingEvent;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, Event>(
            "INSERT INTO events (
                id, title, description, full_description, venue, map_url, date_time,
                status, max_attendees, image_url, is_registration_enabled,
                is_certificate_enabled, certificate_template_url, cert_name_x,
                cert_name_y, cert_font_size, cert_font_family
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.full_description)
        .bind(&event.venue)
        .bind(&event.map_url)
        .bind(event.date_time)
        .bind(event.status.as_str())
        .bind(event.max_attendees)
        .bind(&event.image_url)
        .bind(event.is_registration_enabled)
        .bind(event.is_certificate_enabled)
        .bind(&event.certificate_template_url)
        .bind(event.cert_name_x)
        .bind(event.cert_name_y)
        .bind(event.cert_font_size)
        .bind(&event.cert_font_family)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date_time ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>(
            "UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                full_description = COALESCE($4, full_description),
                venue = COALESCE($5, venue),
                map_url = COALESCE($6, map_url),
                date_time = COALESCE($7, date_time),
                status = COALESCE($8, status),
                max_attendees = COALESCE($9, max_attendees),
                image_url = COALESCE($10, image_url),
                is_registration_enabled = COALESCE($11, is_registration_enabled),
                is_certificate_enabled = COALESCE($12, is_certificate_enabled),
                certificate_template_url = COALESCE($13, certificate_template_url),
                cert_name_x = COALESCE($14, cert_name_x),
                cert_name_y = COALESCE($15, cert_name_y),
                cert_font_size = COALESCE($16, cert_font_size),
                cert_font_family = COALESCE($17, cert_font_family),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.full_description)
        .bind(changes.venue)
        .bind(changes.map_url)
        .bind(changes.date_time)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.max_attendees)
        .bind(changes.image_url)
        .bind(changes.is_registration_enabled)
        .bind(changes.is_certificate_enabled)
        .bind(changes.certificate_template_url)
        .bind(changes.cert_name_x)
        .bind(changes.cert_name_y)
        .bind(changes.cert_font_size)
        .bind(changes.cert_font_family)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> StoreResult<Registration> {
        sqlx::query_as::<_, Registration>(
            "INSERT INTO registrations (
                id, event_id, user_id, user_name, user_email, user_phone, token_id,
                is_attended, status
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(registration.event_id)
        .bind(registration.user_id)
        .bind(&registration.user_name)
        .bind(&registration.user_email)
        .bind(&registration.user_phone)
        .bind(&registration.token_id)
        .bind(RegistrationStatus::Registered.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    async fn registration_by_id(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn registration_by_token(&self, token: &str) -> StoreResult<Option<Registration>> {
        let row =
            sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE token_id = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn list_registrations(
        &self,
        event_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, Registration>(
            "SELECT * FROM registrations
             WHERE ($1::uuid IS NULL OR event_id = $1)
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_attended(&self, token: &str) -> StoreResult<Option<Registration>> {
        // The predicate on is_attended makes concurrent scans of one ticket
        // resolve to exactly one winner.
        let row = sqlx::query_as::<_, Registration>(
            "UPDATE registrations
             SET is_attended = TRUE, status = $2, updated_at = $3
             WHERE token_id = $1 AND is_attended = FALSE
             RETURNING *",
        )
        .bind(token)
        .bind(RegistrationStatus::Attended.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_attendance(
        &self,
        id: Uuid,
        is_attended: bool,
    ) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, Registration>(
            "UPDATE registrations
             SET is_attended = $2, status = $3, updated_at = $4
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(is_attended)
        .bind(RegistrationStatus::from_attended(is_attended).as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
