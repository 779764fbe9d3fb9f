use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity issued by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    /// Opaque bearer token for store calls
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Exchanged for a new access token once `expires_at` is near
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Session {
    /// Whether the access token is expired, or will be within `margin`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at - margin <= now)
    }

    /// A session can be used if its token is still valid or can be refreshed
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some() || !self.expires_within(Duration::zero(), now)
    }
}

/// Process-wide authentication state
///
/// `Unknown` only exists until the first session lookup completes; after that
/// the state moves between `Anonymous` and `Authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unknown,
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    /// An expired session that cannot be refreshed counts as no session
    pub fn from_session(session: Option<Session>) -> Self {
        match session {
            Some(session) if session.is_usable(Utc::now()) => SessionState::Authenticated(session),
            _ => SessionState::Anonymous,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session().map(|session| session.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}

/// Public profile row created alongside every auth principal (`users` table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
}

impl Profile {
    /// Profile for a new principal; the username is the local part of the email
    pub fn for_principal(id: Uuid, email: &str) -> Self {
        let username = email.split('@').next().unwrap_or_default().to_string();
        Self {
            id,
            email: email.to_string(),
            username,
        }
    }
}
