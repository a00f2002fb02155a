//! Session lifecycle.
//!
//! Owns the auth state machine and the locally cached session. Every state
//! change goes out on a watch channel so the CLI (and the sync layer) can
//! react without polling.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{CurrentUser, Session, UserRole};
use crate::remote::RemoteStore;
use crate::storage::LocalStorage;

/// Where the client currently stands with the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    /// A credential exchange is in flight.
    Authenticating,
    Authenticated(CurrentUser),
}

pub struct SessionManager {
    store: Arc<dyn RemoteStore>,
    storage: LocalStorage,
    session_key: String,
    /// Raw session, kept for the access token.
    session: RwLock<Option<Session>>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// `scope` distinguishes cached sessions per backend; pass the backend
    /// URL, or any stable label for backends without one.
    pub fn new(store: Arc<dyn RemoteStore>, storage: LocalStorage, scope: &str) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            store,
            storage,
            session_key: session_key(scope),
            session: RwLock::new(None),
            state,
        }
    }

    /// Watch channel carrying every state transition.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        match &*self.state.borrow() {
            SessionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.state.borrow(), SessionState::Authenticated(_))
    }

    pub fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub async fn log_in(&self, email: &str, password: &str) -> SyncResult<CurrentUser> {
        self.state.send_replace(SessionState::Authenticating);
        match self.store.sign_in(email, password).await {
            Ok(session) => Ok(self.adopt(session)),
            Err(err) => {
                self.state.send_replace(SessionState::Unauthenticated);
                Err(SyncError::Auth(err.to_string()))
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> SyncResult<CurrentUser> {
        self.state.send_replace(SessionState::Authenticating);
        match self.store.sign_up(email, password, name, role).await {
            Ok(session) => Ok(self.adopt(session)),
            Err(err) => {
                self.state.send_replace(SessionState::Unauthenticated);
                Err(SyncError::Auth(err.to_string()))
            }
        }
    }

    /// Revokes the session remotely when possible and always clears it
    /// locally.
    pub async fn log_out(&self) -> SyncResult<()> {
        let session = self.session.write().unwrap().take();
        if let Some(session) = session {
            if let Err(err) = self.store.sign_out(&session.access_token).await {
                warn!(error = %err, "remote sign-out failed, clearing local session anyway");
            }
        }
        self.store.set_auth(None);
        self.storage.remove(&self.session_key)?;
        self.state.send_replace(SessionState::Unauthenticated);
        Ok(())
    }

    /// Picks up a previously cached session, if any. A cache that cannot be
    /// read or has expired is discarded rather than surfaced.
    pub fn restore(&self) -> SyncResult<Option<CurrentUser>> {
        let session: Session = match self.storage.get(&self.session_key) {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(error = %err, "discarding unreadable session cache");
                self.storage.remove(&self.session_key)?;
                return Ok(None);
            }
        };

        if session_expired(&session) {
            debug!("cached session expired");
            self.storage.remove(&self.session_key)?;
            return Ok(None);
        }

        let user = CurrentUser::from_auth(&session.user);
        self.store.set_auth(Some(session.access_token.clone()));
        *self.session.write().unwrap() = Some(session);
        self.state
            .send_replace(SessionState::Authenticated(user.clone()));
        Ok(Some(user))
    }

    fn adopt(&self, session: Session) -> CurrentUser {
        if let Err(err) = self.storage.set(&self.session_key, &session) {
            warn!(error = %err, "failed to cache session, it will not survive a restart");
        }
        let user = CurrentUser::from_auth(&session.user);
        self.store.set_auth(Some(session.access_token.clone()));
        *self.session.write().unwrap() = Some(session);
        self.state
            .send_replace(SessionState::Authenticated(user.clone()));
        user
    }
}

/// One cached session per backend: `dc_session_` plus the first 8 hex chars
/// of the scope's SHA-256.
fn session_key(scope: &str) -> String {
    let digest = Sha256::digest(scope.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("dc_session_{}", &hex[..8])
}

fn session_expired(session: &Session) -> bool {
    if session.is_expired() {
        return true;
    }
    // Sessions cached before expiry tracking landed have no expires_at;
    // fall back to the token's own exp claim.
    if session.expires_at.is_none() {
        if let Some(exp) = jwt_expiry(&session.access_token) {
            return exp <= Utc::now();
        }
    }
    false
}

/// Reads the `exp` claim out of a JWT without verifying it. Opaque tokens
/// yield `None`.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthUser;
    use crate::remote::MemoryStore;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (SessionManager, Arc<MemoryStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_fixtures());
        let manager = SessionManager::new(
            store.clone(),
            LocalStorage::new(temp_dir.path()),
            "memory",
        );
        (manager, store, temp_dir)
    }

    #[test]
    fn test_session_key_is_stable_and_scoped() {
        let a = session_key("https://abc.supabase.co");
        let b = session_key("https://abc.supabase.co");
        let c = session_key("https://other.supabase.co");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("dc_session_"));
        assert_eq!(a.len(), "dc_session_".len() + 8);
    }

    #[test]
    fn test_jwt_expiry() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;

        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"s1","exp":1700000000}"#);
        let token = format!("header.{payload}.sig");
        assert_eq!(
            jwt_expiry(&token),
            DateTime::from_timestamp(1_700_000_000, 0)
        );

        assert_eq!(jwt_expiry("not-a-jwt"), None);
    }

    #[tokio::test]
    async fn test_log_in_happy_path() {
        let (manager, _store, _temp) = setup();
        assert_eq!(manager.current_state(), SessionState::Unauthenticated);

        let user = manager.log_in("sarah@example.com", "danse123").await.unwrap();
        assert_eq!(user.id, "s1");
        assert_eq!(user.name, "Sarah");
        assert_eq!(user.role, UserRole::Student);

        assert!(manager.is_authenticated());
        assert_eq!(manager.current_user(), Some(user));
        assert!(manager.access_token().is_some());
    }

    #[tokio::test]
    async fn test_log_in_failure_resets_state() {
        let (manager, _store, _temp) = setup();
        let err = manager.log_in("sarah@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert_eq!(manager.current_state(), SessionState::Unauthenticated);
        assert!(manager.access_token().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_authenticates() {
        let (manager, _store, _temp) = setup();
        let user = manager
            .sign_up("nina@example.com", "pass", "Nina", UserRole::Teacher)
            .await
            .unwrap();
        assert_eq!(user.name, "Nina");
        assert_eq!(user.role, UserRole::Teacher);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_fixtures());

        let manager = SessionManager::new(
            store.clone(),
            LocalStorage::new(temp_dir.path()),
            "memory",
        );
        manager.log_in("sarah@example.com", "danse123").await.unwrap();

        // Fresh manager over the same storage, as after a restart.
        let restarted = SessionManager::new(
            store.clone(),
            LocalStorage::new(temp_dir.path()),
            "memory",
        );
        let user = restarted.restore().unwrap().expect("cached session");
        assert_eq!(user.id, "s1");
        assert!(restarted.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_cache() {
        let (manager, _store, _temp) = setup();
        assert_eq!(manager.restore().unwrap(), None);
        assert_eq!(manager.current_state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_drops_expired_session() {
        let (manager, _store, _temp) = setup();

        let session = Session {
            access_token: "stale".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            user: AuthUser {
                id: "s1".to_string(),
                email: Some("sarah@example.com".to_string()),
                user_metadata: serde_json::Map::new(),
            },
        };
        manager
            .storage
            .set(&manager.session_key, &session)
            .unwrap();

        assert_eq!(manager.restore().unwrap(), None);
        // The stale cache is gone.
        let cached: Option<Session> = manager.storage.get(&manager.session_key).unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_log_out_clears_everything() {
        let (manager, store, temp_dir) = setup();
        manager.log_in("sarah@example.com", "danse123").await.unwrap();
        let token = manager.access_token().unwrap();

        manager.log_out().await.unwrap();
        assert_eq!(manager.current_state(), SessionState::Unauthenticated);
        assert!(manager.access_token().is_none());

        // Token revoked remotely.
        assert!(store.fetch_user(&token).await.is_err());

        // Nothing left to restore.
        let restarted = SessionManager::new(
            store.clone(),
            LocalStorage::new(temp_dir.path()),
            "memory",
        );
        assert_eq!(restarted.restore().unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_watch_notifies() {
        let (manager, _store, _temp) = setup();
        let mut receiver = manager.state();

        manager.log_in("sarah@example.com", "danse123").await.unwrap();
        receiver.changed().await.unwrap();
        assert!(matches!(
            &*receiver.borrow_and_update(),
            SessionState::Authenticated(_)
        ));
    }
}
