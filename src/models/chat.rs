use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conversation between exactly two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub participants: [String; 2],
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Present in joined bulk reads, absent in feed events.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Chat {
    /// True if this chat is between exactly these two users, in either order.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.participants[0] == a && self.participants[1] == b)
            || (self.participants[0] == b && self.participants[1] == a)
    }

    pub fn other_participant(&self, me: &str) -> Option<&str> {
        if self.participants[0] == me {
            Some(&self.participants[1])
        } else if self.participants[1] == me {
            Some(&self.participants[0])
        } else {
            None
        }
    }

    /// Timestamp used to order chat lists, newest first.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }

    /// Restores the message ordering invariant: ascending by timestamp,
    /// ties kept in arrival order.
    pub fn sort_messages(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chat_between(a: &str, b: &str) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            participants: [a.to_string(), b.to_string()],
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
            last_message_at: None,
            messages: Vec::new(),
        }
    }

    fn message_at(chat_id: Uuid, secs: u32, text: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: "s1".to_string(),
            text: text.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, secs).unwrap(),
        }
    }

    #[test]
    fn test_involves_is_order_insensitive() {
        let chat = chat_between("s1", "t1");
        assert!(chat.involves("s1", "t1"));
        assert!(chat.involves("t1", "s1"));
        assert!(!chat.involves("s1", "t2"));
    }

    #[test]
    fn test_other_participant() {
        let chat = chat_between("s1", "t1");
        assert_eq!(chat.other_participant("s1"), Some("t1"));
        assert_eq!(chat.other_participant("t1"), Some("s1"));
        assert_eq!(chat.other_participant("s2"), None);
    }

    #[test]
    fn test_last_activity_prefers_last_message() {
        let mut chat = chat_between("s1", "t1");
        assert_eq!(chat.last_activity(), chat.created_at);

        let later = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
        chat.last_message_at = Some(later);
        assert_eq!(chat.last_activity(), later);
    }

    #[test]
    fn test_sort_messages_orders_by_timestamp() {
        let mut chat = chat_between("s1", "t1");
        chat.messages = vec![
            message_at(chat.id, 30, "third"),
            message_at(chat.id, 10, "first"),
            message_at(chat.id, 20, "second"),
        ];
        chat.sort_messages();
        let texts: Vec<&str> = chat.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sort_messages_keeps_arrival_order_for_ties() {
        let mut chat = chat_between("s1", "t1");
        chat.messages = vec![
            message_at(chat.id, 10, "a"),
            message_at(chat.id, 10, "b"),
            message_at(chat.id, 5, "zero"),
        ];
        chat.sort_messages();
        let texts: Vec<&str> = chat.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["zero", "a", "b"]);
    }

    #[test]
    fn test_chat_deserialize_without_messages_key() {
        let json = r#"{
            "id": "6dca7cd6-04b1-44f5-9ad1-d20b4ede64cd",
            "participants": ["s1", "t1"],
            "created_at": "2025-03-01T09:00:00Z"
        }"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert!(chat.messages.is_empty());
        assert!(chat.last_message_at.is_none());
    }
}
