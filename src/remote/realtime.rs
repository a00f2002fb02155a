//! Websocket change feed protocol.
//!
//! The hosted backend publishes row changes over a Phoenix-style channel
//! socket: the client joins one channel per table, sends a heartbeat every
//! thirty seconds, and receives INSERT/UPDATE/DELETE frames carrying the
//! changed row. This module owns the frame building/parsing and the
//! long-lived pump task with its reconnect loop.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::events::ChangeEvent;

/// Channels joined on connect, one per mirrored table with live changes.
const CHANNEL_TOPICS: [&str; 4] = [
    "realtime:public:slots",
    "realtime:public:bookings",
    "realtime:public:chats",
    "realtime:public:messages",
];

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const MAX_BACKOFF_SECS: u64 = 30;

/// One frame on the channel socket, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Builds the websocket URL for the change feed.
pub fn build_ws_url(base_url: &str, anon_key: &str) -> String {
    // Convert http(s) to ws(s) if needed
    let base = if base_url.starts_with("http://") {
        base_url.replace("http://", "ws://")
    } else if base_url.starts_with("https://") {
        base_url.replace("https://", "wss://")
    } else if !base_url.starts_with("ws://") && !base_url.starts_with("wss://") {
        format!("ws://{}", base_url)
    } else {
        base_url.to_string()
    };

    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        base.trim_end_matches('/'),
        urlencoding::encode(anon_key)
    )
}

fn frame(topic: &str, event: &str, reference: u64) -> String {
    let message = SocketMessage {
        topic: topic.to_string(),
        event: event.to_string(),
        payload: serde_json::json!({}),
        reference: Some(reference.to_string()),
    };
    // Serializing a value built from plain strings cannot fail.
    serde_json::to_string(&message).unwrap_or_default()
}

pub fn join_frame(topic: &str, reference: u64) -> String {
    frame(topic, "phx_join", reference)
}

pub fn heartbeat_frame(reference: u64) -> String {
    frame("phoenix", "heartbeat", reference)
}

/// Maps a change frame to a [`ChangeEvent`].
///
/// Returns `None` for frames the mirror does not consume (unknown tables,
/// event classes outside the subscription, undecodable records). Undecodable
/// records are logged; everything else is silently skipped.
pub fn parse_event(message: &SocketMessage) -> Option<ChangeEvent> {
    let table = message.topic.strip_prefix("realtime:public:")?;
    match (table, message.event.as_str()) {
        ("slots", "INSERT") => from_record(message, ChangeEvent::SlotInserted),
        ("slots", "UPDATE") => from_record(message, ChangeEvent::SlotUpdated),
        ("slots", "DELETE") => {
            // Deletes only carry the old row; the id is all the mirror needs.
            let id = message.payload.get("old_record")?.get("id")?.as_i64()?;
            Some(ChangeEvent::SlotDeleted { id })
        }
        ("bookings", "INSERT") => from_record(message, ChangeEvent::BookingInserted),
        ("chats", "INSERT") => from_record(message, ChangeEvent::ChatInserted),
        ("messages", "INSERT") => from_record(message, ChangeEvent::MessageInserted),
        _ => None,
    }
}

fn from_record<T, F>(message: &SocketMessage, wrap: F) -> Option<ChangeEvent>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> ChangeEvent,
{
    let record = message.payload.get("record")?;
    match serde_json::from_value(record.clone()) {
        Ok(row) => Some(wrap(row)),
        Err(e) => {
            warn!(topic = %message.topic, error = %e, "failed to decode change record");
            None
        }
    }
}

/// Pump task: connects, joins channels, and forwards parsed events until the
/// receiving side goes away. Reconnects with capped backoff plus jitter on
/// any connection failure.
pub(crate) async fn run_feed(ws_url: String, tx: mpsc::Sender<ChangeEvent>) {
    let mut backoff_secs = 1u64;
    loop {
        match connect_async(&ws_url).await {
            Ok((stream, _)) => {
                debug!("change feed connected");
                backoff_secs = 1;
                if !pump(stream, &tx).await {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "change feed connect failed");
            }
        }

        if tx.is_closed() {
            return;
        }

        let jitter = rand::rng().random_range(0..500);
        debug!(seconds = backoff_secs, "reconnecting change feed");
        tokio::time::sleep(Duration::from_millis(backoff_secs * 1000 + jitter)).await;
        backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
    }
}

/// Runs one connection. Returns true to reconnect, false to stop for good.
async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    tx: &mpsc::Sender<ChangeEvent>,
) -> bool {
    let (mut sender, mut receiver) = stream.split();
    let mut frame_ref: u64 = 0;

    for topic in CHANNEL_TOPICS {
        frame_ref += 1;
        if sender
            .send(Message::Text(join_frame(topic, frame_ref).into()))
            .await
            .is_err()
        {
            return true;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it, we just connected.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                frame_ref += 1;
                if sender
                    .send(Message::Text(heartbeat_frame(frame_ref).into()))
                    .await
                    .is_err()
                {
                    return true;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let parsed: SocketMessage = match serde_json::from_str(text.as_str()) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!(error = %e, "unparseable feed frame");
                            continue;
                        }
                    };
                    match parsed.event.as_str() {
                        "phx_reply" => debug!(topic = %parsed.topic, "channel reply"),
                        "phx_error" | "phx_close" => {
                            warn!(topic = %parsed.topic, "channel dropped; reconnecting");
                            return true;
                        }
                        _ => {
                            if let Some(event) = parse_event(&parsed) {
                                if tx.send(event).await.is_err() {
                                    // Consumer dropped the feed.
                                    return false;
                                }
                            }
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        return true;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "change feed read error");
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_ws_url_with_https() {
        let url = build_ws_url("https://abc.example.co", "test-key");
        assert_eq!(
            url,
            "wss://abc.example.co/realtime/v1/websocket?apikey=test-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_build_ws_url_with_http() {
        let url = build_ws_url("http://localhost:54321", "test-key");
        assert_eq!(
            url,
            "ws://localhost:54321/realtime/v1/websocket?apikey=test-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_build_ws_url_bare_host() {
        let url = build_ws_url("localhost:54321", "test-key");
        assert_eq!(
            url,
            "ws://localhost:54321/realtime/v1/websocket?apikey=test-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_build_ws_url_encodes_key_and_trims_slash() {
        let url = build_ws_url("https://abc.example.co/", "a+b/c");
        assert_eq!(
            url,
            "wss://abc.example.co/realtime/v1/websocket?apikey=a%2Bb%2Fc&vsn=1.0.0"
        );
    }

    #[test]
    fn test_join_frame_shape() {
        let frame: SocketMessage =
            serde_json::from_str(&join_frame("realtime:public:slots", 1)).unwrap();
        assert_eq!(frame.topic, "realtime:public:slots");
        assert_eq!(frame.event, "phx_join");
        assert_eq!(frame.reference.as_deref(), Some("1"));
    }

    #[test]
    fn test_heartbeat_frame_shape() {
        let frame: SocketMessage = serde_json::from_str(&heartbeat_frame(7)).unwrap();
        assert_eq!(frame.topic, "phoenix");
        assert_eq!(frame.event, "heartbeat");
        assert_eq!(frame.reference.as_deref(), Some("7"));
    }

    fn change_frame(topic: &str, event: &str, payload: serde_json::Value) -> SocketMessage {
        SocketMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: None,
        }
    }

    #[test]
    fn test_parse_slot_insert() {
        let message = change_frame(
            "realtime:public:slots",
            "INSERT",
            json!({
                "record": {
                    "id": 5,
                    "teacher_id": 1,
                    "date": "2025-03-10",
                    "time": "14:00:00",
                    "status": "available"
                }
            }),
        );
        match parse_event(&message) {
            Some(ChangeEvent::SlotInserted(slot)) => {
                assert_eq!(slot.id, 5);
                assert_eq!(slot.teacher_id, 1);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_slot_delete_uses_old_record() {
        let message = change_frame(
            "realtime:public:slots",
            "DELETE",
            json!({ "old_record": { "id": 9, "status": "available" } }),
        );
        assert!(matches!(
            parse_event(&message),
            Some(ChangeEvent::SlotDeleted { id: 9 })
        ));
    }

    #[test]
    fn test_parse_ignores_unsubscribed_event_classes() {
        let message = change_frame(
            "realtime:public:bookings",
            "UPDATE",
            json!({ "record": { "id": 1 } }),
        );
        assert!(parse_event(&message).is_none());

        let message = change_frame("realtime:public:reviews", "INSERT", json!({}));
        assert!(parse_event(&message).is_none());

        let message = change_frame("phoenix", "heartbeat", json!({}));
        assert!(parse_event(&message).is_none());
    }

    #[test]
    fn test_parse_message_insert() {
        let message = change_frame(
            "realtime:public:messages",
            "INSERT",
            json!({
                "record": {
                    "id": "0b26dfa8-8a3c-45a2-8f63-7f8e9a3a5f11",
                    "chat_id": "6dca7cd6-04b1-44f5-9ad1-d20b4ede64cd",
                    "sender_id": "s1",
                    "text": "Bonjour!",
                    "created_at": "2025-03-01T10:00:00Z"
                }
            }),
        );
        match parse_event(&message) {
            Some(ChangeEvent::MessageInserted(msg)) => assert_eq!(msg.text, "Bonjour!"),
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_undecodable_record_is_skipped() {
        let message = change_frame(
            "realtime:public:slots",
            "INSERT",
            json!({ "record": { "id": "not-a-number" } }),
        );
        assert!(parse_event(&message).is_none());
    }
}
