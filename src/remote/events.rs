//! Change feed events.
//!
//! Every row change the backend reports is normalized into a [`ChangeEvent`]
//! before the rest of the app sees it, so the mirror has a single, typed
//! entry point regardless of which store produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{Booking, Chat, Message, Slot};

/// A single row change reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChangeEvent {
    SlotInserted(Slot),
    SlotUpdated(Slot),
    SlotDeleted { id: i64 },
    BookingInserted(Booking),
    ChatInserted(Chat),
    MessageInserted(Message),
}

impl ChangeEvent {
    /// Table this event belongs to.
    pub fn table(&self) -> &'static str {
        match self {
            ChangeEvent::SlotInserted(_)
            | ChangeEvent::SlotUpdated(_)
            | ChangeEvent::SlotDeleted { .. } => "slots",
            ChangeEvent::BookingInserted(_) => "bookings",
            ChangeEvent::ChatInserted(_) => "chats",
            ChangeEvent::MessageInserted(_) => "messages",
        }
    }

    /// Row operation, as the backend names it.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::SlotInserted(_)
            | ChangeEvent::BookingInserted(_)
            | ChangeEvent::ChatInserted(_)
            | ChangeEvent::MessageInserted(_) => "INSERT",
            ChangeEvent::SlotUpdated(_) => "UPDATE",
            ChangeEvent::SlotDeleted { .. } => "DELETE",
        }
    }
}

/// Receiving half of a live change subscription.
///
/// At most one feed is active per service. Dropping it aborts the producer
/// task, so teardown happens exactly once no matter how the feed goes away.
#[derive(Debug)]
pub struct ChangeFeed {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    /// Default bound for feed channels.
    pub const CHANNEL_CAPACITY: usize = 256;

    pub fn new(events: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Feed without a producer task of its own; used by tests that push
    /// synthetic events through the sender half directly.
    pub fn from_receiver(events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { events, task: None }
    }

    /// Next event, or `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotStatus;
    use chrono::{NaiveDate, NaiveTime};

    fn sample_slot() -> Slot {
        Slot {
            id: 5,
            teacher_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            status: SlotStatus::Available,
        }
    }

    #[test]
    fn test_event_table_and_kind() {
        let event = ChangeEvent::SlotUpdated(sample_slot());
        assert_eq!(event.table(), "slots");
        assert_eq!(event.kind(), "UPDATE");

        let event = ChangeEvent::SlotDeleted { id: 5 };
        assert_eq!(event.table(), "slots");
        assert_eq!(event.kind(), "DELETE");
    }

    #[test]
    fn test_event_serialized_shape() {
        let event = ChangeEvent::SlotDeleted { id: 5 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "slot_deleted");
        assert_eq!(json["data"]["id"], 5);

        let parsed: ChangeEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(parsed, ChangeEvent::SlotDeleted { id: 5 }));
    }

    #[tokio::test]
    async fn test_feed_from_receiver_delivers_then_closes() {
        let (tx, rx) = mpsc::channel(4);
        let mut feed = ChangeFeed::from_receiver(rx);

        tx.send(ChangeEvent::SlotInserted(sample_slot()))
            .await
            .unwrap();
        drop(tx);

        assert!(matches!(
            feed.recv().await,
            Some(ChangeEvent::SlotInserted(_))
        ));
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_feed_aborts_task() {
        let (_tx, rx) = mpsc::channel::<ChangeEvent>(1);
        let task = tokio::spawn(async {
            // Parked forever; only an abort can end it.
            std::future::pending::<()>().await;
        });
        let watcher = task.abort_handle();

        let feed = ChangeFeed::new(rx, task);
        drop(feed);

        // Give the runtime a few ticks to process the abort.
        for _ in 0..100 {
            if watcher.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(watcher.is_finished());
    }
}
