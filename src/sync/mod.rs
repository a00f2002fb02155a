//! Client data synchronization.
//!
//! [`SyncService`] owns the remote store, the session, the in-memory
//! [`Mirror`] and the favorites set. Reads come from the mirror; writes go
//! to the backend and come back through the change feed. A single consumer
//! task folds feed events into the mirror, so there is exactly one writer
//! ordering and no per-screen subscriptions.

mod mirror;

pub use mirror::Mirror;

use std::cmp::Reverse;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, SyncError, SyncResult};
use crate::favorites::Favorites;
use crate::models::{
    Booking, BookingStatus, Chat, Course, Message, Slot, SlotStatus, Teacher, UserRole,
    DEFAULT_STATUS_LABEL, FALLBACK_TEACHER_NAME,
};
use crate::remote::{ChangeEvent, NewBooking, NewMessage, NewSlot, RemoteStore};
use crate::session::SessionManager;
use crate::storage::LocalStorage;

/// Applied events are re-broadcast to observers on a bus this deep.
const EVENT_BUS_CAPACITY: usize = 256;

pub struct SyncService {
    store: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    mirror: Arc<RwLock<Mirror>>,
    favorites: Favorites,
    /// Bumped after every mirror mutation.
    generation: watch::Sender<u64>,
    /// Applied feed events, re-published for observers.
    events: broadcast::Sender<ChangeEvent>,
    feed_task: StdMutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<SessionManager>,
        storage: LocalStorage,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            store,
            session,
            mirror: Arc::new(RwLock::new(Mirror::default())),
            favorites: Favorites::new(storage),
            generation,
            events,
            feed_task: StdMutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Receiver that ticks once per mirror mutation.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Every event the consumer task has applied, from subscription onward.
    pub fn events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    // ---- Bulk load ----

    /// Fetches all four tables and replaces the mirror wholesale.
    ///
    /// Each read is independent: a failed one is logged and contributes an
    /// empty list, the others still land. Chats arrive with their messages
    /// embedded; bookings with their teacher row joined.
    pub async fn load_all(&self) {
        let teachers = match self.store.fetch_teachers().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to load teachers, continuing without");
                Vec::new()
            }
        };
        let slots = match self.store.fetch_slots().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to load slots, continuing without");
                Vec::new()
            }
        };
        let bookings = match self.store.fetch_bookings().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to load bookings, continuing without");
                Vec::new()
            }
        };
        let chats = match self.store.fetch_chats().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "failed to load chats, continuing without");
                Vec::new()
            }
        };

        info!(
            teachers = teachers.len(),
            slots = slots.len(),
            bookings = bookings.len(),
            chats = chats.len(),
            "loaded backend state"
        );

        self.mirror
            .write()
            .await
            .replace_all(teachers, slots, bookings, chats);
        self.bump();
    }

    // ---- Change feed ----

    /// Opens the change feed and spawns the consumer task. At most one feed
    /// per service; calling this while one is live is a no-op.
    pub async fn subscribe(&self) -> SyncResult<()> {
        {
            let guard = self.feed_task.lock().unwrap();
            if guard.as_ref().is_some_and(|task| !task.is_finished()) {
                debug!("change feed already live");
                return Ok(());
            }
        }

        let mut feed = self.store.subscribe().await.map_err(SyncError::RemoteRead)?;

        // Opening the feed awaited; a concurrent call may have installed a
        // consumer in the meantime. Re-check under the lock and keep the
        // winner, dropping the extra feed (its producer aborts on drop).
        let mut guard = self.feed_task.lock().unwrap();
        if guard.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("change feed already live");
            return Ok(());
        }

        let mirror = self.mirror.clone();
        let generation = self.generation.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                mirror.write().await.apply(&event);
                generation.send_modify(|g| *g += 1);
                // Observers come and go; no receiver is fine.
                let _ = events.send(event);
            }
            debug!("change feed closed");
        });

        if let Some(stale) = guard.replace(task) {
            stale.abort();
        }
        drop(guard);
        info!("subscribed to change feed");
        Ok(())
    }

    /// Stops the consumer task and closes the feed. Safe to call twice.
    pub fn unsubscribe(&self) {
        if let Some(task) = self.feed_task.lock().unwrap().take() {
            task.abort();
            info!("unsubscribed from change feed");
        }
    }

    // ---- Booking ----

    /// Books an available slot for the signed-in student.
    ///
    /// Two remote writes: flip the slot to booked, then insert the booking
    /// row. If the insert fails the slot flip is reverted; if the revert
    /// fails too, the error is logged and the insert failure is returned.
    /// The mirror is never written here; both rows come back through the
    /// feed.
    pub async fn book_slot(&self, slot_id: i64) -> SyncResult<Booking> {
        let user = self
            .session
            .current_user()
            .ok_or_else(|| SyncError::Auth("log in to book a slot".to_string()))?;

        // Preconditions against the mirror only; no remote calls yet.
        let (slot, teacher) = {
            let mirror = self.mirror.read().await;
            let slot = mirror
                .slot(slot_id)
                .ok_or_else(|| SyncError::NotFound(format!("slot {slot_id}")))?
                .clone();
            let teacher = mirror.teacher(slot.teacher_id).cloned();
            (slot, teacher)
        };
        if !slot.is_available() {
            return Err(SyncError::Conflict(format!(
                "slot {slot_id} is already booked"
            )));
        }

        self.store
            .update_slot_status(slot_id, SlotStatus::Booked)
            .await?;

        let booking = NewBooking {
            student_id: user.id,
            teacher_id: slot.teacher_id,
            slot_id: Some(slot.id),
            teacher_name: teacher
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| FALLBACK_TEACHER_NAME.to_string()),
            style: teacher.as_ref().map(|t| t.style.clone()).unwrap_or_default(),
            location: teacher
                .as_ref()
                .map(|t| t.location.clone())
                .unwrap_or_default(),
            price: teacher.as_ref().map(|t| t.price.clone()).unwrap_or_default(),
            image: teacher.as_ref().and_then(|t| t.image.clone()),
            date: slot.date,
            time: slot.time,
            status: BookingStatus::Upcoming,
            status_label: DEFAULT_STATUS_LABEL.to_string(),
        };

        match self.store.insert_booking(booking).await {
            Ok(stored) => {
                info!(booking_id = stored.id, slot_id, "slot booked");
                Ok(stored)
            }
            Err(write_err) => {
                warn!(error = %write_err, slot_id, "booking insert failed, reverting slot");
                if let Err(revert_err) = self
                    .store
                    .update_slot_status(slot_id, SlotStatus::Available)
                    .await
                {
                    error!(
                        error = %revert_err,
                        slot_id,
                        "slot revert failed, slot is stuck booked without a booking"
                    );
                }
                Err(write_err.into())
            }
        }
    }

    // ---- Chat ----

    /// Returns the chat with `other_user_id`, creating it on first contact.
    ///
    /// The mirror lookup can race another client creating the same pair; a
    /// conflict on insert means someone else won, so the chats are
    /// refetched and the winner returned.
    pub async fn start_chat(&self, other_user_id: &str) -> SyncResult<Chat> {
        let user = self
            .session
            .current_user()
            .ok_or_else(|| SyncError::Auth("log in to start a chat".to_string()))?;

        {
            let mirror = self.mirror.read().await;
            if let Some(existing) = mirror.chat_between(&user.id, other_user_id) {
                debug!(chat_id = %existing.id, "reusing existing chat");
                return Ok(existing.clone());
            }
        }

        match self
            .store
            .insert_chat([user.id.clone(), other_user_id.to_string()])
            .await
        {
            Ok(chat) => {
                info!(chat_id = %chat.id, "chat created");
                Ok(chat)
            }
            Err(StoreError::Conflict(_)) => {
                debug!("chat creation conflicted, refetching");
                let chats = self
                    .store
                    .fetch_chats()
                    .await
                    .map_err(SyncError::RemoteRead)?;
                chats
                    .into_iter()
                    .find(|c| c.involves(&user.id, other_user_id))
                    .ok_or_else(|| {
                        SyncError::Conflict("chat creation conflicted".to_string())
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Sends a message and bumps the chat's activity timestamp.
    ///
    /// The timestamp bump is display metadata; if it fails the message is
    /// already stored, so the failure is logged and the send still succeeds.
    /// No local append either way; the message lands via the feed.
    pub async fn send_message(&self, chat_id: Uuid, text: &str) -> SyncResult<Message> {
        let user = self
            .session
            .current_user()
            .ok_or_else(|| SyncError::Auth("log in to send messages".to_string()))?;

        let message = self
            .store
            .insert_message(NewMessage {
                chat_id,
                sender_id: user.id,
                text: text.to_string(),
            })
            .await?;

        if let Err(err) = self.store.touch_chat(chat_id, message.created_at).await {
            warn!(error = %err, chat_id = %chat_id, "failed to bump chat timestamp");
        }

        Ok(message)
    }

    // ---- Favorites ----

    /// Flips a teacher in or out of the local favorites and returns the new
    /// membership.
    pub fn toggle_favorite(&self, teacher_id: i64) -> SyncResult<bool> {
        Ok(self.favorites.toggle(teacher_id)?)
    }

    pub fn is_favorite(&self, teacher_id: i64) -> SyncResult<bool> {
        Ok(self.favorites.is_favorite(teacher_id)?)
    }

    pub fn favorites(&self) -> SyncResult<Vec<i64>> {
        Ok(self.favorites.all()?)
    }

    // ---- Teacher-side operations ----

    fn require_teacher(&self) -> SyncResult<()> {
        let user = self
            .session
            .current_user()
            .ok_or_else(|| SyncError::Auth("log in first".to_string()))?;
        if user.role != UserRole::Teacher {
            return Err(SyncError::Auth("a teacher account is required".to_string()));
        }
        Ok(())
    }

    /// Adds or replaces a course on a teacher profile. The feed carries no
    /// teacher events, so the returned row replaces the mirror copy here.
    pub async fn upsert_course(&self, teacher_id: i64, course: Course) -> SyncResult<Teacher> {
        self.require_teacher()?;
        let teacher = self.store.upsert_course(teacher_id, course).await?;
        self.mirror.write().await.upsert_teacher(teacher.clone());
        self.bump();
        Ok(teacher)
    }

    pub async fn delete_course(&self, teacher_id: i64, course_id: i64) -> SyncResult<Teacher> {
        self.require_teacher()?;
        let teacher = self.store.delete_course(teacher_id, course_id).await?;
        self.mirror.write().await.upsert_teacher(teacher.clone());
        self.bump();
        Ok(teacher)
    }

    /// Publishes a new available slot. It reaches the mirror via the feed.
    pub async fn add_slot(
        &self,
        teacher_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> SyncResult<Slot> {
        self.require_teacher()?;
        let slot = self
            .store
            .insert_slot(NewSlot {
                teacher_id,
                date,
                time,
                status: SlotStatus::Available,
            })
            .await?;
        info!(slot_id = slot.id, teacher_id, "slot published");
        Ok(slot)
    }

    /// Withdraws a slot. Refused while the mirror shows it booked, since
    /// the booking would be orphaned.
    pub async fn remove_slot(&self, slot_id: i64) -> SyncResult<()> {
        self.require_teacher()?;
        {
            let mirror = self.mirror.read().await;
            match mirror.slot(slot_id) {
                None => return Err(SyncError::NotFound(format!("slot {slot_id}"))),
                Some(slot) if !slot.is_available() => {
                    return Err(SyncError::Conflict(format!(
                        "slot {slot_id} has a booking"
                    )));
                }
                Some(_) => {}
            }
        }
        self.store.delete_slot(slot_id).await?;
        Ok(())
    }

    // ---- Read accessors ----

    pub async fn is_loaded(&self) -> bool {
        self.mirror.read().await.is_loaded()
    }

    pub async fn teachers(&self) -> Vec<Teacher> {
        self.mirror.read().await.teachers.clone()
    }

    /// Case-insensitive match on name, style and location.
    pub async fn search_teachers(&self, query: &str) -> Vec<Teacher> {
        self.mirror
            .read()
            .await
            .teachers
            .iter()
            .filter(|t| t.matches(query))
            .cloned()
            .collect()
    }

    pub async fn teacher(&self, id: i64) -> Option<Teacher> {
        self.mirror.read().await.teacher(id).cloned()
    }

    pub async fn slots(&self) -> Vec<Slot> {
        self.mirror.read().await.slots.clone()
    }

    /// A teacher's bookable slots, soonest first.
    pub async fn slots_for_teacher(&self, teacher_id: i64) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .mirror
            .read()
            .await
            .slots
            .iter()
            .filter(|s| s.teacher_id == teacher_id && s.is_available())
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.date, s.time));
        slots
    }

    /// The signed-in user's bookings, most recent lesson first.
    pub async fn bookings(&self) -> Vec<Booking> {
        let mut bookings = self.mirror.read().await.bookings.clone();
        bookings.sort_by_key(|b| Reverse((b.date, b.time)));
        bookings
    }

    /// Chats by last activity, newest first.
    pub async fn chats(&self) -> Vec<Chat> {
        let mut chats = self.mirror.read().await.chats.clone();
        chats.sort_by_key(|c| Reverse(c.last_activity()));
        chats
    }

    pub async fn chat(&self, id: Uuid) -> Option<Chat> {
        self.mirror.read().await.chat(id).cloned()
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
