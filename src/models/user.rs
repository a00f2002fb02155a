use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// An authenticated backend session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now(),
            None => false,
        }
    }
}

/// The raw user record returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

/// The profile shape the rest of the app consumes, derived from [`AuthUser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub avatar: Option<String>,
}

impl CurrentUser {
    /// Derives the profile with per-field fallbacks:
    /// name from metadata, else the email local part, else "Utilisateur";
    /// role from metadata, else student; avatar from metadata, else none.
    pub fn from_auth(user: &AuthUser) -> Self {
        let meta_str = |key: &str| {
            user.user_metadata
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = meta_str("name")
            .or_else(|| {
                user.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Utilisateur".to_string());

        let role = meta_str("role")
            .and_then(|r| r.parse().ok())
            .unwrap_or(UserRole::Student);

        CurrentUser {
            id: user.id.clone(),
            name,
            email: user.email.clone(),
            role,
            avatar: meta_str("avatar_url"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Teacher => write!(f, "teacher"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            _ => Err(format!(
                "Invalid role '{}'. Valid options: student, teacher",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth_user(email: Option<&str>, metadata: Value) -> AuthUser {
        AuthUser {
            id: "u-1".to_string(),
            email: email.map(str::to_string),
            user_metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_current_user_from_full_metadata() {
        let user = auth_user(
            Some("sophie@example.com"),
            json!({ "name": "Sophie", "role": "teacher", "avatar_url": "https://x/avatar.png" }),
        );
        let current = CurrentUser::from_auth(&user);
        assert_eq!(current.name, "Sophie");
        assert_eq!(current.role, UserRole::Teacher);
        assert_eq!(current.avatar.as_deref(), Some("https://x/avatar.png"));
    }

    #[test]
    fn test_current_user_name_falls_back_to_email_local_part() {
        let user = auth_user(Some("marc.v@example.com"), json!({}));
        let current = CurrentUser::from_auth(&user);
        assert_eq!(current.name, "marc.v");
        assert_eq!(current.role, UserRole::Student);
    }

    #[test]
    fn test_current_user_name_falls_back_to_placeholder() {
        let user = auth_user(None, json!({}));
        let current = CurrentUser::from_auth(&user);
        assert_eq!(current.name, "Utilisateur");
        assert!(current.avatar.is_none());
    }

    #[test]
    fn test_current_user_ignores_unknown_role() {
        let user = auth_user(Some("a@b.c"), json!({ "role": "admin" }));
        let current = CurrentUser::from_auth(&user);
        assert_eq!(current.role, UserRole::Student);
    }

    #[test]
    fn test_session_expiry() {
        let user = auth_user(Some("a@b.c"), json!({}));
        let mut session = Session {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            user,
        };
        assert!(!session.is_expired());

        session.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        assert!(session.is_expired());

        session.expires_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_user_role_round_trip() {
        assert_eq!(UserRole::from_str("teacher").unwrap(), UserRole::Teacher);
        assert_eq!(UserRole::from_str("STUDENT").unwrap(), UserRole::Student);
        assert!(UserRole::from_str("admin").is_err());
        assert_eq!(format!("{}", UserRole::Teacher), "teacher");
    }
}
