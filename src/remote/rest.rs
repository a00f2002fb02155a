//! HTTP remote store.
//!
//! Speaks the hosted backend's two HTTP surfaces: the auth endpoints under
//! `/auth/v1/` and the table endpoints under `/rest/v1/` (filterable reads,
//! writes returning the stored row via the `Prefer: return=representation`
//! header). The change feed rides the websocket protocol in
//! [`super::realtime`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ChangeFeed;
use super::realtime;
use super::{NewBooking, NewMessage, NewSlot, RemoteStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{AuthUser, Booking, Chat, Course, Message, Session, Slot, SlotStatus, Teacher, UserRole};

/// Projection used for booking reads: every booking column plus the display
/// subset of the referenced teacher row.
const BOOKING_SELECT: &str = "*,teachers(name,style,location,price,image)";

/// Projection used for chat reads: chat rows with their messages embedded.
const CHAT_SELECT: &str = "*,messages(*)";

pub struct RestStore {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    access_token: RwLock<Option<String>>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            anon_key: anon_key.into(),
            http: reqwest::Client::new(),
            access_token: RwLock::new(None),
        }
    }

    /// Token sent as the bearer: the user's access token when signed in,
    /// the anonymous key otherwise.
    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Maps non-success statuses to typed errors.
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        Err(match status.as_u16() {
            401 | 403 => StoreError::Unauthorized(message),
            404 => StoreError::NotFound(message),
            409 => StoreError::Conflict(message),
            code => StoreError::Http {
                status: code,
                message,
            },
        })
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Vec<T>> {
        let response = self
            .http
            .get(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Inserts a row and returns the stored representation.
    async fn insert_row<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<T> {
        let response = self
            .http
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = Self::check(response).await?.json().await?;
        first_row(rows, table)
    }

    /// Patches rows matching `id_filter` and returns the stored rows.
    async fn update_rows<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        id_filter: &str,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .http
            .patch(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .header("Prefer", "return=representation")
            .query(&[("id", id_filter)])
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_teacher(&self, teacher_id: i64) -> StoreResult<Teacher> {
        let filter = format!("eq.{}", teacher_id);
        let rows: Vec<Teacher> = self
            .get_rows("teachers", &[("select", "*"), ("id", filter.as_str())])
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("teacher {}", teacher_id)))
    }
}

fn first_row<T>(rows: Vec<T>, table: &str) -> StoreResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(format!("no {} row matched", table)))
}

/// Pulls a human-readable message out of an error body. The auth and table
/// endpoints use different field names; fall back to the raw text.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error detail".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Response shape of the token-granting auth endpoints.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds until expiry.
    #[serde(default)]
    expires_in: Option<i64>,
    /// Absolute expiry as unix seconds; newer backends send this too.
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Session> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = Self::check(response).await?.json().await?;
        Ok(token.into_session())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> StoreResult<Session> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name, "role": role }
            }))
            .send()
            .await?;
        let body: serde_json::Value = Self::check(response).await?.json().await?;
        match serde_json::from_value::<TokenResponse>(body) {
            Ok(token) => Ok(token.into_session()),
            // Without an access token there is no session to hand back;
            // the project likely has email confirmation turned on.
            Err(_) => Err(StoreError::Protocol(
                "signup did not return a session; is email confirmation enabled?".to_string(),
            )),
        }
    }

    async fn sign_out(&self, access_token: &str) -> StoreResult<()> {
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_user(&self, access_token: &str) -> StoreResult<AuthUser> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn set_auth(&self, access_token: Option<String>) {
        *self.access_token.write().unwrap() = access_token;
    }

    async fn fetch_teachers(&self) -> StoreResult<Vec<Teacher>> {
        self.get_rows("teachers", &[("select", "*"), ("order", "id.asc")])
            .await
    }

    async fn fetch_slots(&self) -> StoreResult<Vec<Slot>> {
        self.get_rows("slots", &[("select", "*"), ("order", "id.asc")])
            .await
    }

    async fn fetch_bookings(&self) -> StoreResult<Vec<Booking>> {
        self.get_rows(
            "bookings",
            &[("select", BOOKING_SELECT), ("order", "date.desc")],
        )
        .await
    }

    async fn fetch_chats(&self) -> StoreResult<Vec<Chat>> {
        self.get_rows("chats", &[("select", CHAT_SELECT)]).await
    }

    async fn update_slot_status(&self, slot_id: i64, status: SlotStatus) -> StoreResult<Slot> {
        let filter = format!("eq.{}", slot_id);
        let rows: Vec<Slot> = self
            .update_rows("slots", &filter, &json!({ "status": status }))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("slot {}", slot_id)))
    }

    async fn insert_slot(&self, slot: NewSlot) -> StoreResult<Slot> {
        self.insert_row("slots", &slot).await
    }

    async fn delete_slot(&self, slot_id: i64) -> StoreResult<()> {
        let filter = format!("eq.{}", slot_id);
        let response = self
            .http
            .delete(self.rest_url("slots"))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .query(&[("id", filter.as_str())])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        self.insert_row("bookings", &booking).await
    }

    async fn insert_chat(&self, participants: [String; 2]) -> StoreResult<Chat> {
        self.insert_row("chats", &json!({ "participants": participants }))
            .await
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        self.insert_row("messages", &message).await
    }

    async fn touch_chat(&self, chat_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let filter = format!("eq.{}", chat_id);
        let response = self
            .http
            .patch(self.rest_url("chats"))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .query(&[("id", filter.as_str())])
            .json(&json!({ "last_message_at": at }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert_teacher(&self, teacher: Teacher) -> StoreResult<Teacher> {
        let response = self
            .http
            .post(self.rest_url("teachers"))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&teacher)
            .send()
            .await?;
        let rows: Vec<Teacher> = Self::check(response).await?.json().await?;
        first_row(rows, "teachers")
    }

    async fn upsert_course(&self, teacher_id: i64, course: Course) -> StoreResult<Teacher> {
        let mut teacher = self.fetch_teacher(teacher_id).await?;
        match teacher.courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => *existing = course,
            None => teacher.courses.push(course),
        }
        let filter = format!("eq.{}", teacher_id);
        let rows: Vec<Teacher> = self
            .update_rows("teachers", &filter, &json!({ "courses": teacher.courses }))
            .await?;
        first_row(rows, "teachers")
    }

    async fn delete_course(&self, teacher_id: i64, course_id: i64) -> StoreResult<Teacher> {
        let mut teacher = self.fetch_teacher(teacher_id).await?;
        teacher.courses.retain(|c| c.id != course_id);
        let filter = format!("eq.{}", teacher_id);
        let rows: Vec<Teacher> = self
            .update_rows("teachers", &filter, &json!({ "courses": teacher.courses }))
            .await?;
        first_row(rows, "teachers")
    }

    async fn subscribe(&self) -> StoreResult<ChangeFeed> {
        let (tx, rx) = mpsc::channel(ChangeFeed::CHANNEL_CAPACITY);
        let ws_url = realtime::build_ws_url(&self.base_url, &self.anon_key);
        let task = tokio::spawn(realtime::run_feed(ws_url, tx));
        Ok(ChangeFeed::new(rx, task))
    }
}
