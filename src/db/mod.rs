//! Persistence and authentication store abstraction
//!
//! The client never talks to a database directly. Everything it persists, and
//! every identity it holds, goes through a [`RemoteStore`]: the hosted REST
//! service in production ([`RestStore`]) or the process-local
//! [`InMemoryStore`] in tests and offline runs.
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CollectionItem, CollectionQuery, ItemUpdate, NewCollectionItem, Profile, Session},
};

pub mod memory;
pub mod rest;

pub use memory::{InMemoryStore, StoreOperation};
pub use rest::RestStore;

/// Store message returned when an email/password pair is rejected
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login credentials";

/// Store message returned when signing up with an email that is already taken
pub const ALREADY_REGISTERED_MESSAGE: &str = "User already registered";

/// Trait for the remote persistence + auth service
///
/// Auth operations hold the store's own copy of the session; collection
/// operations are authorized with it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Password sign-in
    async fn auth_sign_in(&self, email: &str, password: &str) -> AppResult<Session>;

    /// Creates an auth principal and signs it in
    async fn auth_sign_up(&self, email: &str, password: &str) -> AppResult<Session>;

    /// Ends the store-side session; the local copy is dropped even on error
    async fn auth_sign_out(&self) -> AppResult<()>;

    /// The session the store currently holds, if it is still valid
    async fn auth_current_user(&self) -> AppResult<Option<Session>>;

    /// Session-change notifications (`None` when signed out)
    fn auth_subscribe(&self) -> watch::Receiver<Option<Session>>;

    /// Inserts the public profile row for a new principal
    async fn profile_insert(&self, profile: &Profile) -> AppResult<()>;

    async fn collection_insert(&self, item: &NewCollectionItem) -> AppResult<()>;

    async fn collection_select(&self, query: &CollectionQuery) -> AppResult<Vec<CollectionItem>>;

    async fn collection_update(&self, id: Uuid, fields: &ItemUpdate) -> AppResult<()>;

    async fn collection_delete(&self, id: Uuid) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
