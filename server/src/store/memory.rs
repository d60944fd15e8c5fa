use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreResult, StoreError, UniqueKey};
use crate::models::{
    Event, EventChanges, NewEvent, NewRegistration, Registration, RegistrationStatus,
};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    registrations: HashMap<Uuid, Registration>,
}

/// In-process backend. A single lock guards both tables, so the uniqueness
/// checks and the insert happen as one step.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create_event(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let row = Event {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            full_description: event.full_description,
            venue: event.venue,
            map_url: event.map_url,
            date_time: event.date_time,
            status: event.status.as_str().to_string(),
            max_attendees: event.max_attendees,
            image_url: event.image_url,
            is_registration_enabled: event.is_registration_enabled,
            is_certificate_enabled: event.is_certificate_enabled,
            certificate_template_url: event.certificate_template_url,
            cert_name_x: event.cert_name_x,
            cert_name_y: event.cert_name_y,
            cert_font_size: event.cert_font_size,
            cert_font_family: event.cert_font_family,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self.tables.lock().await.events.values().cloned().collect();
        events.sort_by_key(|e| e.date_time);
        Ok(events)
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let mut tables = self.tables.lock().await;
        let Some(event) = tables.events.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(event);
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let removed = tables.events.remove(&id).is_some();
        if removed {
            tables.registrations.retain(|_, r| r.event_id != id);
        }
        Ok(removed)
    }

    async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> StoreResult<Registration> {
        let mut tables = self.tables.lock().await;

        if !tables.events.contains_key(&registration.event_id) {
            return Err(StoreError::MissingEvent);
        }
        for existing in tables.registrations.values() {
            if existing.event_id == registration.event_id
                && existing.user_email == registration.user_email
            {
                return Err(StoreError::UniqueViolation(UniqueKey::EventEmail));
            }
            if existing.token_id == registration.token_id {
                return Err(StoreError::UniqueViolation(UniqueKey::Token));
            }
        }

        let now = Utc::now();
        let row = Registration {
            id: Uuid::new_v4(),
            event_id: registration.event_id,
            user_id: registration.user_id,
            user_name: registration.user_name,
            user_email: registration.user_email,
            user_phone: registration.user_phone,
            token_id: registration.token_id,
            is_attended: false,
            status: RegistrationStatus::Registered.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.registrations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn registration_by_id(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        Ok(self.tables.lock().await.registrations.get(&id).cloned())
    }

    async fn registration_by_token(&self, token: &str) -> StoreResult<Option<Registration>> {
        Ok(self
            .tables
            .lock()
            .await
            .registrations
            .values()
            .find(|r| r.token_id == token)
            .cloned())
    }

    async fn list_registrations(
        &self,
        event_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Registration>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Registration> = tables
            .registrations
            .values()
            .filter(|r| event_id.map_or(true, |id| r.event_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            rows.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(rows)
    }

    async fn mark_attended(&self, token: &str) -> StoreResult<Option<Registration>> {
        let mut tables = self.tables.lock().await;
        let Some(reg) = tables
            .registrations
            .values_mut()
            .find(|r| r.token_id == token && !r.is_attended)
        else {
            return Ok(None);
        };
        reg.set_attended(true);
        Ok(Some(reg.clone()))
    }

    async fn set_attendance(
        &self,
        id: Uuid,
        is_attended: bool,
    ) -> StoreResult<Option<Registration>> {
        let mut tables = self.tables.lock().await;
        let Some(reg) = tables.registrations.get_mut(&id) else {
            return Ok(None);
        };
        reg.set_attended(is_attended);
        Ok(Some(reg.clone()))
    }

    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.registrations.remove(&id).is_some())
    }
}
