//! In-process backend.
//!
//! Keeps every table in a mutex and publishes change events on a broadcast
//! bus, so the full sync pipeline (including the live feed) runs without a
//! network. Used for demos and tests.
//!
//! Deliberately as permissive as the real backend: no slot conflict check,
//! no chat pair uniqueness. Those guards live client-side.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AuthUser, Booking, Chat, Course, Message, Session, Slot, SlotStatus, Teacher, TeacherJoin,
    UserRole,
};
use crate::seed;

use super::events::{ChangeEvent, ChangeFeed};
use super::{NewBooking, NewMessage, NewSlot, RemoteStore};

/// An account known to the in-process store.
#[derive(Debug, Clone)]
pub struct MemoryUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Default)]
struct Tables {
    teachers: Vec<Teacher>,
    slots: Vec<Slot>,
    bookings: Vec<Booking>,
    /// Chat rows only; messages live in their own table like on the backend.
    chats: Vec<Chat>,
    messages: Vec<Message>,
    users: Vec<MemoryUser>,
    /// Access token to user id.
    sessions: HashMap<String, String>,
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(ChangeFeed::CHANNEL_CAPACITY);
        Self {
            tables: Mutex::new(Tables::default()),
            events,
        }
    }

    /// Store pre-loaded with the demo teachers, a week of slots and the
    /// demo accounts.
    pub fn with_fixtures() -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.lock().unwrap();
            tables.teachers = seed::fixture_teachers();
            tables.slots = seed::fixture_slots(seed::fixture_start_date());
            tables.users = seed::fixture_users();
        }
        store
    }

    /// Registers an account without going through signup.
    pub fn add_user(&self, user: MemoryUser) {
        self.tables.lock().unwrap().users.push(user);
    }

    fn emit(&self, event: ChangeEvent) {
        // No open feed is fine.
        let _ = self.events.send(event);
    }

    fn auth_user(user: &MemoryUser) -> AuthUser {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "name".to_string(),
            serde_json::Value::String(user.name.clone()),
        );
        metadata.insert(
            "role".to_string(),
            serde_json::Value::String(user.role.to_string()),
        );
        AuthUser {
            id: user.id.clone(),
            email: Some(user.email.clone()),
            user_metadata: metadata,
        }
    }

    fn open_session(tables: &mut Tables, user: &MemoryUser) -> Session {
        let token = Uuid::new_v4().to_string();
        tables.sessions.insert(token.clone(), user.id.clone());
        Session {
            access_token: token,
            refresh_token: None,
            expires_at: None,
            user: Self::auth_user(user),
        }
    }

    fn teacher_join(tables: &Tables, teacher_id: i64) -> Option<TeacherJoin> {
        tables.teachers.iter().find(|t| t.id == teacher_id).map(|t| TeacherJoin {
            name: Some(t.name.clone()),
            style: Some(t.style.clone()),
            location: Some(t.location.clone()),
            price: Some(t.price.clone()),
            image: t.image.clone(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Session> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StoreError::Unauthorized("Invalid login credentials".to_string()))?;
        if user.password != password {
            return Err(StoreError::Unauthorized(
                "Invalid login credentials".to_string(),
            ));
        }
        Ok(Self::open_session(&mut tables, &user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        let user = MemoryUser {
            id: format!("user-{}", Uuid::new_v4()),
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role,
        };
        tables.users.push(user.clone());
        Ok(Self::open_session(&mut tables, &user))
    }

    async fn sign_out(&self, access_token: &str) -> StoreResult<()> {
        self.tables.lock().unwrap().sessions.remove(access_token);
        Ok(())
    }

    async fn fetch_user(&self, access_token: &str) -> StoreResult<AuthUser> {
        let tables = self.tables.lock().unwrap();
        let user_id = tables
            .sessions
            .get(access_token)
            .ok_or_else(|| StoreError::Unauthorized("invalid or expired token".to_string()))?;
        let user = tables
            .users
            .iter()
            .find(|u| &u.id == user_id)
            .ok_or_else(|| StoreError::Unauthorized("unknown user".to_string()))?;
        Ok(Self::auth_user(user))
    }

    fn set_auth(&self, _access_token: Option<String>) {
        // Table access is not token-gated in-process.
    }

    async fn fetch_teachers(&self) -> StoreResult<Vec<Teacher>> {
        Ok(self.tables.lock().unwrap().teachers.clone())
    }

    async fn fetch_slots(&self) -> StoreResult<Vec<Slot>> {
        Ok(self.tables.lock().unwrap().slots.clone())
    }

    async fn fetch_bookings(&self) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .bookings
            .iter()
            .cloned()
            .map(|mut booking| {
                booking.joined_teacher = Self::teacher_join(&tables, booking.teacher_id);
                booking
            })
            .collect())
    }

    async fn fetch_chats(&self) -> StoreResult<Vec<Chat>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .chats
            .iter()
            .cloned()
            .map(|mut chat| {
                // Embedded like the backend join: present but unsorted.
                chat.messages = tables
                    .messages
                    .iter()
                    .filter(|m| m.chat_id == chat.id)
                    .cloned()
                    .collect();
                chat
            })
            .collect())
    }

    async fn update_slot_status(&self, slot_id: i64, status: SlotStatus) -> StoreResult<Slot> {
        let updated = {
            let mut tables = self.tables.lock().unwrap();
            let slot = tables
                .slots
                .iter_mut()
                .find(|s| s.id == slot_id)
                .ok_or_else(|| StoreError::NotFound(format!("slot {slot_id}")))?;
            slot.status = status;
            slot.clone()
        };
        self.emit(ChangeEvent::SlotUpdated(updated.clone()));
        Ok(updated)
    }

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot> {
        let inserted = {
            let mut tables = self.tables.lock().unwrap();
            let id = tables.slots.iter().map(|s| s.id).max().unwrap_or(0) + 1;
            let row = Slot {
                id,
                teacher_id: slot.teacher_id,
                date: slot.date,
                time: slot.time,
                status: slot.status,
            };
            tables.slots.push(row.clone());
            row
        };
        self.emit(ChangeEvent::SlotInserted(inserted.clone()));
        Ok(inserted)
    }

    async fn delete_slot(&self, slot_id: i64) -> StoreResult<()> {
        let removed = {
            let mut tables = self.tables.lock().unwrap();
            let before = tables.slots.len();
            tables.slots.retain(|s| s.id != slot_id);
            tables.slots.len() < before
        };
        // Deleting a missing row succeeds, like a filtered DELETE.
        if removed {
            self.emit(ChangeEvent::SlotDeleted { id: slot_id });
        }
        Ok(())
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        let inserted = {
            let mut tables = self.tables.lock().unwrap();
            let id = tables.bookings.iter().map(|b| b.id).max().unwrap_or(0) + 1;
            let row = Booking {
                id,
                student_id: booking.student_id,
                teacher_id: booking.teacher_id,
                slot_id: booking.slot_id,
                teacher_name: booking.teacher_name,
                style: booking.style,
                location: booking.location,
                price: booking.price,
                image: booking.image,
                date: booking.date,
                time: booking.time,
                status: booking.status,
                status_label: booking.status_label,
                joined_teacher: None,
            };
            tables.bookings.push(row.clone());
            row
        };
        self.emit(ChangeEvent::BookingInserted(inserted.clone()));
        Ok(inserted)
    }

    async fn insert_chat(&self, participants: [String; 2]) -> StoreResult<Chat> {
        let inserted = {
            let mut tables = self.tables.lock().unwrap();
            let row = Chat {
                id: Uuid::new_v4(),
                participants,
                created_at: Utc::now(),
                last_message_at: None,
                messages: Vec::new(),
            };
            tables.chats.push(row.clone());
            row
        };
        self.emit(ChangeEvent::ChatInserted(inserted.clone()));
        Ok(inserted)
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        let inserted = {
            let mut tables = self.tables.lock().unwrap();
            if !tables.chats.iter().any(|c| c.id == message.chat_id) {
                // Foreign key violation on the real backend.
                return Err(StoreError::Conflict(
                    "message references unknown chat".to_string(),
                ));
            }
            let row = Message {
                id: Uuid::new_v4(),
                chat_id: message.chat_id,
                sender_id: message.sender_id,
                text: message.text,
                created_at: Utc::now(),
            };
            tables.messages.push(row.clone());
            row
        };
        self.emit(ChangeEvent::MessageInserted(inserted.clone()));
        Ok(inserted)
    }

    async fn touch_chat(&self, chat_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))?;
        chat.last_message_at = Some(at);
        Ok(())
    }

    async fn upsert_teacher(&self, teacher: Teacher) -> StoreResult<Teacher> {
        let mut tables = self.tables.lock().unwrap();
        match tables.teachers.iter_mut().find(|t| t.id == teacher.id) {
            Some(existing) => *existing = teacher.clone(),
            None => tables.teachers.push(teacher.clone()),
        }
        Ok(teacher)
    }

    async fn upsert_course(&self, teacher_id: i64, course: Course) -> StoreResult<Teacher> {
        let mut tables = self.tables.lock().unwrap();
        let teacher = tables
            .teachers
            .iter_mut()
            .find(|t| t.id == teacher_id)
            .ok_or_else(|| StoreError::NotFound(format!("teacher {teacher_id}")))?;
        match teacher.courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => *existing = course,
            None => teacher.courses.push(course),
        }
        Ok(teacher.clone())
    }

    async fn delete_course(&self, teacher_id: i64, course_id: i64) -> StoreResult<Teacher> {
        let mut tables = self.tables.lock().unwrap();
        let teacher = tables
            .teachers
            .iter_mut()
            .find(|t| t.id == teacher_id)
            .ok_or_else(|| StoreError::NotFound(format!("teacher {teacher_id}")))?;
        teacher.courses.retain(|c| c.id != course_id);
        Ok(teacher.clone())
    }

    async fn subscribe(&self) -> StoreResult<ChangeFeed> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(ChangeFeed::CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change feed lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(ChangeFeed::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn sample_slot_payload(teacher_id: i64) -> NewSlot {
        NewSlot {
            teacher_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            status: SlotStatus::Available,
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let session = store
            .sign_up("nina@example.com", "pass", "Nina", UserRole::Student)
            .await
            .unwrap();
        assert_eq!(session.user.email.as_deref(), Some("nina@example.com"));

        let again = store.sign_in("nina@example.com", "pass").await.unwrap();
        assert_eq!(again.user.id, session.user.id);

        let fetched = store.fetch_user(&again.access_token).await.unwrap();
        assert_eq!(fetched.id, session.user.id);
        assert_eq!(
            fetched.user_metadata.get("name").and_then(|v| v.as_str()),
            Some("Nina")
        );
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store
            .sign_up("nina@example.com", "pass", "Nina", UserRole::Student)
            .await
            .unwrap();
        let err = store
            .sign_up("NINA@example.com", "other", "Other", UserRole::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let store = MemoryStore::with_fixtures();
        let err = store.sign_in("sarah@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let store = MemoryStore::with_fixtures();
        let session = store.sign_in("sarah@example.com", "danse123").await.unwrap();
        store.sign_out(&session.access_token).await.unwrap();
        let err = store.fetch_user(&session.access_token).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_with_fixtures_is_populated() {
        let store = MemoryStore::with_fixtures();
        assert_eq!(store.fetch_teachers().await.unwrap().len(), 4);
        assert_eq!(store.fetch_slots().await.unwrap().len(), 35);
        assert!(store.fetch_bookings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_slot_status_emits_event() {
        let store = MemoryStore::new();
        let slot = store.insert_slot(sample_slot_payload(1)).await.unwrap();
        let mut feed = store.subscribe().await.unwrap();

        let updated = store
            .update_slot_status(slot.id, SlotStatus::Booked)
            .await
            .unwrap();
        assert_eq!(updated.status, SlotStatus::Booked);

        match feed.recv().await {
            Some(ChangeEvent::SlotUpdated(s)) => {
                assert_eq!(s.id, slot.id);
                assert_eq!(s.status, SlotStatus::Booked);
            }
            other => panic!("expected SlotUpdated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_missing_slot_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_slot_status(42, SlotStatus::Booked)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_slot_emits_only_when_removed() {
        let store = MemoryStore::new();
        let slot = store.insert_slot(sample_slot_payload(1)).await.unwrap();
        let mut feed = store.subscribe().await.unwrap();

        store.delete_slot(9999).await.unwrap();
        store.delete_slot(slot.id).await.unwrap();

        match feed.recv().await {
            Some(ChangeEvent::SlotDeleted { id }) => assert_eq!(id, slot.id),
            other => panic!("expected SlotDeleted, got {other:?}"),
        }
        assert!(store.fetch_slots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_bookings_embeds_teacher() {
        let store = MemoryStore::with_fixtures();
        store
            .insert_booking(NewBooking {
                student_id: "s1".to_string(),
                teacher_id: 1,
                slot_id: Some(1),
                teacher_name: "Sophie Martin".to_string(),
                style: "Ballet Classique".to_string(),
                location: "Paris 11e".to_string(),
                price: "30".to_string(),
                image: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                status: crate::models::BookingStatus::Upcoming,
                status_label: "Payé".to_string(),
            })
            .await
            .unwrap();

        let bookings = store.fetch_bookings().await.unwrap();
        assert_eq!(bookings.len(), 1);
        let join = bookings[0].joined_teacher.as_ref().unwrap();
        assert_eq!(join.name.as_deref(), Some("Sophie Martin"));
    }

    #[tokio::test]
    async fn test_message_flow() {
        let store = MemoryStore::new();
        let chat = store
            .insert_chat(["s1".to_string(), "t1".to_string()])
            .await
            .unwrap();

        let message = store
            .insert_message(NewMessage {
                chat_id: chat.id,
                sender_id: "s1".to_string(),
                text: "Bonjour !".to_string(),
            })
            .await
            .unwrap();
        store.touch_chat(chat.id, message.created_at).await.unwrap();

        let chats = store.fetch_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].messages.len(), 1);
        assert_eq!(chats[0].messages[0].text, "Bonjour !");
        assert_eq!(chats[0].last_message_at, Some(message.created_at));
    }

    #[tokio::test]
    async fn test_insert_message_unknown_chat_conflicts() {
        let store = MemoryStore::new();
        let err = store
            .insert_message(NewMessage {
                chat_id: Uuid::new_v4(),
                sender_id: "s1".to_string(),
                text: "perdu".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_course_upsert_and_delete() {
        let store = MemoryStore::with_fixtures();
        let course = Course {
            id: 90,
            title: "Stage d'été".to_string(),
            style: "Contemporain".to_string(),
            level: "Tous niveaux".to_string(),
            price: "45".to_string(),
            duration: "2h".to_string(),
            rating: 0.0,
            reviews: 0,
        };

        let teacher = store.upsert_course(4, course.clone()).await.unwrap();
        assert_eq!(teacher.courses.len(), 1);

        let mut renamed = course;
        renamed.title = "Stage d'hiver".to_string();
        let teacher = store.upsert_course(4, renamed).await.unwrap();
        assert_eq!(teacher.courses.len(), 1);
        assert_eq!(teacher.courses[0].title, "Stage d'hiver");

        let teacher = store.delete_course(4, 90).await.unwrap();
        assert!(teacher.courses.is_empty());
    }
}
