//! Remote store abstraction.
//!
//! [`RemoteStore`] is the seam between the sync layer and the backend.
//! [`RestStore`] talks to the hosted backend over HTTP and a websocket
//! change feed; [`MemoryStore`] is an in-process stand-in with the same
//! behavior, used by tests, demos, and local seeding.

mod events;
mod memory;
mod realtime;
mod rest;

pub use events::{ChangeEvent, ChangeFeed};
pub use memory::{MemoryStore, MemoryUser};
pub use rest::RestStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{BackendKind, Config};
use crate::error::{StoreResult, SyncError, SyncResult};
use crate::models::{
    AuthUser, Booking, BookingStatus, Chat, Course, Message, Session, Slot, SlotStatus, Teacher,
    UserRole,
};

/// Insert payload for a new slot. The backend assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewSlot {
    pub teacher_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: SlotStatus,
}

/// Insert payload for a new booking row, snapshot fields included.
#[derive(Debug, Clone, Serialize)]
pub struct NewBooking {
    pub student_id: String,
    pub teacher_id: i64,
    pub slot_id: Option<i64>,
    pub teacher_name: String,
    pub style: String,
    pub location: String,
    pub price: String,
    pub image: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: BookingStatus,
    pub status_label: String,
}

/// Insert payload for a new message. Id and timestamp are assigned remotely.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: String,
    pub text: String,
}

/// Everything the app needs from a backend.
///
/// Bulk reads return raw rows (bookings with their embedded teacher join,
/// chats with their embedded messages); normalization is the sync layer's
/// job. Writes return the stored row so callers see backend-assigned ids.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // Auth
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Session>;
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> StoreResult<Session>;
    async fn sign_out(&self, access_token: &str) -> StoreResult<()>;
    async fn fetch_user(&self, access_token: &str) -> StoreResult<AuthUser>;

    /// Sets the access token attached to subsequent table requests.
    /// `None` falls back to the anonymous key.
    fn set_auth(&self, access_token: Option<String>);

    // Bulk reads
    async fn fetch_teachers(&self) -> StoreResult<Vec<Teacher>>;
    async fn fetch_slots(&self) -> StoreResult<Vec<Slot>>;
    async fn fetch_bookings(&self) -> StoreResult<Vec<Booking>>;
    async fn fetch_chats(&self) -> StoreResult<Vec<Chat>>;

    // Writes
    async fn update_slot_status(&self, slot_id: i64, status: SlotStatus) -> StoreResult<Slot>;
    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot>;
    async fn delete_slot(&self, slot_id: i64) -> StoreResult<()>;
    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking>;
    async fn insert_chat(&self, participants: [String; 2]) -> StoreResult<Chat>;
    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message>;
    async fn touch_chat(&self, chat_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn upsert_teacher(&self, teacher: Teacher) -> StoreResult<Teacher>;
    async fn upsert_course(&self, teacher_id: i64, course: Course) -> StoreResult<Teacher>;
    async fn delete_course(&self, teacher_id: i64, course_id: i64) -> StoreResult<Teacher>;

    /// Opens the live change feed. The caller owns the returned feed; at
    /// most one should be active per app session.
    async fn subscribe(&self) -> StoreResult<ChangeFeed>;
}

/// Builds the store selected by the config.
pub fn create_store(config: &Config) -> SyncResult<Arc<dyn RemoteStore>> {
    match config.backend.kind {
        BackendKind::Memory => Ok(Arc::new(MemoryStore::with_fixtures())),
        BackendKind::Rest => {
            let url = config.backend.url.clone().ok_or_else(|| {
                SyncError::Config("backend.url is required for the rest backend".to_string())
            })?;
            let anon_key = config.backend.anon_key.clone().ok_or_else(|| {
                SyncError::Config("backend.anon_key is required for the rest backend".to_string())
            })?;
            Ok(Arc::new(RestStore::new(url, anon_key)))
        }
    }
}
