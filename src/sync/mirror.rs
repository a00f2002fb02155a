//! The in-memory mirror of backend state.
//!
//! One plain struct behind a lock. Mutation happens in exactly two places:
//! a wholesale `replace_all` after a bulk load, and `apply` for change feed
//! events. Applying the same event twice leaves the mirror unchanged, so a
//! reconnect replaying recent events is harmless.

use tracing::debug;

use crate::models::{Booking, Chat, Message, Slot, Teacher};
use crate::remote::ChangeEvent;

#[derive(Debug, Default)]
pub struct Mirror {
    pub teachers: Vec<Teacher>,
    pub slots: Vec<Slot>,
    pub bookings: Vec<Booking>,
    pub chats: Vec<Chat>,
    loaded: bool,
}

impl Mirror {
    /// Whether a bulk load has completed at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replaces the whole mirror with freshly fetched rows, normalizing on
    /// the way in: bookings get their display fallbacks resolved, chat
    /// messages are sorted by timestamp.
    pub fn replace_all(
        &mut self,
        teachers: Vec<Teacher>,
        slots: Vec<Slot>,
        bookings: Vec<Booking>,
        mut chats: Vec<Chat>,
    ) {
        for chat in &mut chats {
            chat.sort_messages();
        }
        self.teachers = teachers;
        self.slots = slots;
        self.bookings = bookings.into_iter().map(Booking::hydrate).collect();
        self.chats = chats;
        self.loaded = true;
    }

    /// Folds one change event into the mirror.
    pub fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::SlotInserted(slot) | ChangeEvent::SlotUpdated(slot) => {
                self.upsert_slot(slot.clone());
            }
            ChangeEvent::SlotDeleted { id } => {
                self.slots.retain(|s| s.id != *id);
            }
            ChangeEvent::BookingInserted(booking) => {
                let booking = booking.clone().hydrate();
                match self.bookings.iter_mut().find(|b| b.id == booking.id) {
                    Some(existing) => *existing = booking,
                    None => self.bookings.push(booking),
                }
            }
            ChangeEvent::ChatInserted(chat) => {
                // The echo of our own insert must not clobber messages that
                // already arrived.
                if !self.chats.iter().any(|c| c.id == chat.id) {
                    self.chats.push(chat.clone());
                }
            }
            ChangeEvent::MessageInserted(message) => {
                self.apply_message(message);
            }
        }
    }

    fn upsert_slot(&mut self, slot: Slot) {
        match self.slots.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }

    fn apply_message(&mut self, message: &Message) {
        let Some(chat) = self.chats.iter_mut().find(|c| c.id == message.chat_id) else {
            // The chat insert may still be in flight; the next bulk load
            // picks the message up.
            debug!(chat_id = %message.chat_id, "message for unknown chat, skipping");
            return;
        };

        match chat.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => chat.messages.push(message.clone()),
        }
        chat.sort_messages();

        chat.last_message_at = Some(match chat.last_message_at {
            Some(at) if at >= message.created_at => at,
            _ => message.created_at,
        });
    }

    pub fn slot(&self, id: i64) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn teacher(&self, id: i64) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    pub fn chat(&self, id: uuid::Uuid) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    /// The chat whose participant pair is {a, b}, in either order.
    pub fn chat_between(&self, a: &str, b: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.involves(a, b))
    }

    pub fn upsert_teacher(&mut self, teacher: Teacher) {
        match self.teachers.iter_mut().find(|t| t.id == teacher.id) {
            Some(existing) => *existing = teacher,
            None => self.teachers.push(teacher),
        }
    }
}
