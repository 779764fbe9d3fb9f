//! Session lifecycle
//!
//! [`SessionManager`] is the only writer of the process-wide [`SessionState`].
//! It resolves the stored session once at startup, mirrors the store's
//! session-change notifications for the rest of the process, and performs the
//! explicit sign-in, sign-up and sign-out flows. Everything else reads the
//! state through a `watch` receiver.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    db::{RemoteStore, ALREADY_REGISTERED_MESSAGE, INVALID_LOGIN_MESSAGE},
    error::{AppError, AppResult},
    models::{Profile, Session, SessionState},
};

/// Minimum password length accepted by the sign-up form
pub const MIN_PASSWORD_LEN: usize = 6;

/// Checks the sign-up form before anything is sent to the store
pub fn validate_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    if password != confirmation {
        return Err(AppError::InvalidInput("Passwords do not match".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Handle to the session-change subscription started by [`SessionManager::initialize`]
///
/// Dropping the handle leaves the subscription running.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Stops mirroring store notifications
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

pub struct SessionManager {
    store: Arc<dyn RemoteStore>,
    state_tx: Arc<watch::Sender<SessionState>>,
    initialized: AtomicBool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unknown);
        Self {
            store,
            state_tx: Arc::new(state_tx),
            initialized: AtomicBool::new(false),
        }
    }

    /// Current state snapshot
    pub fn current(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state_tx.borrow().session().cloned()
    }

    /// Subscribe to session state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Resolves the stored session, then mirrors store notifications
    ///
    /// May only be called once per manager.
    pub async fn initialize(&self) -> AppResult<SubscriptionHandle> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(AppError::Internal(
                "session manager already initialized".to_string(),
            ));
        }

        // Subscribe before resolving so nothing published in between is missed
        let mut changes = self.store.auth_subscribe();
        changes.borrow_and_update();

        let current = match self.store.auth_current_user().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve stored session");
                None
            }
        };
        tracing::info!(
            authenticated = current.is_some(),
            store = self.store.name(),
            "Session resolved"
        );
        publish(&self.state_tx, SessionState::from_session(current));

        let state_tx = Arc::clone(&self.state_tx);
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let session = changes.borrow_and_update().clone();
                tracing::debug!(
                    authenticated = session.is_some(),
                    "Session change notification"
                );
                publish(&state_tx, SessionState::from_session(session));
            }
            tracing::debug!("Session notifications closed");
        });

        Ok(SubscriptionHandle { task })
    }

    /// Password sign-in
    ///
    /// The store's generic credential rejection becomes
    /// [`AppError::InvalidCredentials`]; other errors pass through unchanged.
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let session = self
            .store
            .auth_sign_in(email, password)
            .await
            .map_err(|e| match e {
                AppError::Auth(message) if message == INVALID_LOGIN_MESSAGE => {
                    AppError::InvalidCredentials
                }
                other => other,
            })?;

        publish(&self.state_tx, SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Creates the auth principal and its profile row
    ///
    /// If the profile cannot be written the new principal is signed back out
    /// and [`AppError::ProfileCreationFailed`] is returned, leaving the state
    /// `Anonymous`.
    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<Session> {
        let session = self
            .store
            .auth_sign_up(email, password)
            .await
            .map_err(|e| match e {
                AppError::Auth(message) if message.contains(ALREADY_REGISTERED_MESSAGE) => {
                    AppError::AccountExists
                }
                other => other,
            })?;

        let profile_email = if session.email.is_empty() {
            email
        } else {
            session.email.as_str()
        };
        let profile = Profile::for_principal(session.user_id, profile_email);

        if let Err(e) = self.store.profile_insert(&profile).await {
            tracing::error!(
                error = %e,
                user_id = %session.user_id,
                "Profile creation failed, rolling back sign-up"
            );
            if let Err(e) = self.store.auth_sign_out().await {
                tracing::warn!(error = %e, "Sign-out during sign-up rollback failed");
            }
            publish(&self.state_tx, SessionState::Anonymous);
            return Err(AppError::ProfileCreationFailed);
        }

        tracing::info!(user_id = %session.user_id, username = %profile.username, "Account created");
        publish(&self.state_tx, SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Ends the session locally and remotely; remote failures are only logged
    pub async fn sign_out(&self) {
        if let Err(e) = self.store.auth_sign_out().await {
            tracing::error!(error = %e, "Failed to log out");
        }
        publish(&self.state_tx, SessionState::Anonymous);
    }
}

/// Publishes `next` unless it equals the current state
fn publish(state_tx: &watch::Sender<SessionState>, next: SessionState) {
    state_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockRemoteStore;
    use uuid::Uuid;

    fn session(email: &str) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            access_token: "token".to_string(),
            expires_at: None,
            refresh_token: None,
        }
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("secret1", "secret1").is_ok());

        let err = validate_new_password("secret1", "secret2").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Passwords do not match");

        let err = validate_new_password("abc", "abc").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_sign_in_maps_generic_rejection() {
        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_in()
            .times(1)
            .returning(|_, _| Err(AppError::Auth(INVALID_LOGIN_MESSAGE.to_string())));

        let manager = SessionManager::new(Arc::new(store));
        let err = manager.sign_in("ada@example.com", "nope").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(manager.current(), SessionState::Unknown);
    }

    #[tokio::test]
    async fn test_sign_in_passes_other_errors_through() {
        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_in()
            .returning(|_, _| Err(AppError::Auth("Email not confirmed".to_string())));

        let manager = SessionManager::new(Arc::new(store));
        let err = manager.sign_in("ada@example.com", "pw").await.unwrap_err();

        assert!(matches!(err, AppError::Auth(message) if message == "Email not confirmed"));
    }

    #[tokio::test]
    async fn test_sign_in_publishes_session() {
        let expected = session("ada@example.com");
        let returned = expected.clone();

        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_in()
            .withf(|email, password| email == "ada@example.com" && password == "secret1")
            .returning(move |_, _| Ok(returned.clone()));

        let manager = SessionManager::new(Arc::new(store));
        let mut states = manager.subscribe();

        let signed_in = manager.sign_in("ada@example.com", "secret1").await.unwrap();

        assert_eq!(signed_in, expected);
        assert!(states.has_changed().unwrap());
        assert_eq!(
            *states.borrow_and_update(),
            SessionState::Authenticated(expected)
        );
    }

    #[tokio::test]
    async fn test_sign_up_rolls_back_when_profile_fails() {
        let created = session("ada@example.com");

        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_up()
            .times(1)
            .returning(move |_, _| Ok(created.clone()));
        store
            .expect_profile_insert()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("permission denied".to_string())));
        store.expect_auth_sign_out().times(1).returning(|| Ok(()));

        let manager = SessionManager::new(Arc::new(store));
        let err = manager.sign_up("ada@example.com", "secret1").await.unwrap_err();

        assert!(matches!(err, AppError::ProfileCreationFailed));
        assert_eq!(manager.current(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let created = session("ada@example.com");
        let user_id = created.user_id;

        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_up()
            .returning(move |_, _| Ok(created.clone()));
        store
            .expect_profile_insert()
            .withf(move |profile| profile.id == user_id && profile.username == "ada")
            .times(1)
            .returning(|_| Ok(()));
        store.expect_auth_sign_out().never();

        let manager = SessionManager::new(Arc::new(store));
        manager.sign_up("ada@example.com", "secret1").await.unwrap();

        assert_eq!(manager.current().user_id(), Some(user_id));
    }

    #[tokio::test]
    async fn test_sign_up_existing_account() {
        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_up()
            .returning(|_, _| Err(AppError::Auth(ALREADY_REGISTERED_MESSAGE.to_string())));
        store.expect_profile_insert().never();

        let manager = SessionManager::new(Arc::new(store));
        let err = manager.sign_up("ada@example.com", "secret1").await.unwrap_err();

        assert!(matches!(err, AppError::AccountExists));
    }

    #[tokio::test]
    async fn test_sign_out_clears_state_even_on_error() {
        let mut store = MockRemoteStore::new();
        store
            .expect_auth_sign_in()
            .returning(|email, _| Ok(session(email)));
        store
            .expect_auth_sign_out()
            .times(2)
            .returning(|| Err(AppError::ExternalApi("offline".to_string())));

        let manager = SessionManager::new(Arc::new(store));
        manager.sign_in("ada@example.com", "secret1").await.unwrap();

        manager.sign_out().await;
        assert_eq!(manager.current(), SessionState::Anonymous);
        manager.sign_out().await;
        assert_eq!(manager.current(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_initialize_resolves_then_follows_notifications() {
        let (changes_tx, changes_rx) = watch::channel(None);
        let stored = session("ada@example.com");
        let resolved = stored.clone();

        let mut store = MockRemoteStore::new();
        store
            .expect_auth_subscribe()
            .times(1)
            .returning(move || changes_rx.clone());
        store
            .expect_auth_current_user()
            .times(1)
            .returning(move || Ok(Some(resolved.clone())));
        store.expect_name().return_const("mock");

        let manager = SessionManager::new(Arc::new(store));
        let mut states = manager.subscribe();
        let handle = manager.initialize().await.unwrap();

        assert!(handle.is_active());
        assert_eq!(manager.current(), SessionState::Authenticated(stored));

        changes_tx.send_replace(None);
        states.borrow_and_update();
        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), SessionState::Anonymous);

        let other = session("grace@example.com");
        changes_tx.send_replace(Some(other.clone()));
        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), SessionState::Authenticated(other));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_initialize_only_once() {
        let (_changes_tx, changes_rx) = watch::channel(None);

        let mut store = MockRemoteStore::new();
        store
            .expect_auth_subscribe()
            .times(1)
            .returning(move || changes_rx.clone());
        store
            .expect_auth_current_user()
            .times(1)
            .returning(|| Ok(None));
        store.expect_name().return_const("mock");

        let manager = SessionManager::new(Arc::new(store));
        manager.initialize().await.unwrap();
        assert_eq!(manager.current(), SessionState::Anonymous);

        let second = manager.initialize().await;
        assert!(matches!(second, Err(AppError::Internal(_))));
    }
}
