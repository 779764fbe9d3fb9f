use std::collections::{HashMap, HashSet};

use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::{
    db::{RemoteStore, ALREADY_REGISTERED_MESSAGE, INVALID_LOGIN_MESSAGE},
    error::{AppError, AppResult},
    models::{CollectionItem, CollectionQuery, ItemUpdate, NewCollectionItem, Profile, Session},
};

const MIN_PASSWORD_LEN: usize = 6;

/// Store operations, used for failure injection and the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    SignIn,
    SignUp,
    SignOut,
    CurrentUser,
    ProfileInsert,
    Insert,
    Select,
    Update,
    Delete,
}

struct Principal {
    id: Uuid,
    password: String,
}

#[derive(Default)]
struct StoreInner {
    principals: HashMap<String, Principal>,
    profiles: HashMap<Uuid, Profile>,
    items: Vec<CollectionItem>,
    failing: HashSet<StoreOperation>,
    calls: Vec<StoreOperation>,
}

/// Process-local store with the same contract as the hosted one
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
    session_tx: watch::Sender<Option<Session>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with nobody signed in
    pub fn new() -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            inner: RwLock::new(StoreInner::default()),
            session_tx,
        }
    }

    /// Registers a principal with a profile, without signing it in
    pub async fn register(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().await;
        inner.principals.insert(
            email.to_string(),
            Principal {
                id,
                password: password.to_string(),
            },
        );
        inner.profiles.insert(id, Profile::for_principal(id, email));
        id
    }

    /// Inserts a row directly, bypassing auth and the call log
    pub async fn seed_item(&self, item: CollectionItem) {
        self.inner.write().await.items.push(item);
    }

    /// Makes every subsequent call of `operation` fail
    pub async fn fail(&self, operation: StoreOperation) {
        self.inner.write().await.failing.insert(operation);
    }

    pub async fn clear_failures(&self) {
        self.inner.write().await.failing.clear();
    }

    /// Operations invoked so far, in order
    pub async fn calls(&self) -> Vec<StoreOperation> {
        self.inner.read().await.calls.clone()
    }

    pub async fn items(&self) -> Vec<CollectionItem> {
        self.inner.read().await.items.clone()
    }

    pub async fn profile(&self, id: Uuid) -> Option<Profile> {
        self.inner.read().await.profiles.get(&id).cloned()
    }

    pub async fn principal_id(&self, email: &str) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .principals
            .get(email)
            .map(|principal| principal.id)
    }

    fn current_user_id(&self) -> AppResult<Uuid> {
        self.session_tx
            .borrow()
            .as_ref()
            .map(|session| session.user_id)
            .ok_or(AppError::NotAuthenticated)
    }

    /// Logs the call and applies injected failures
    fn record(inner: &mut StoreInner, operation: StoreOperation) -> AppResult<()> {
        inner.calls.push(operation);
        if inner.failing.contains(&operation) {
            return Err(AppError::ExternalApi(format!(
                "injected failure for {:?}",
                operation
            )));
        }
        Ok(())
    }

    fn open_session(&self, user_id: Uuid, email: &str) -> Session {
        let session = Session {
            user_id,
            email: email.to_string(),
            access_token: Uuid::new_v4().to_string(),
            expires_at: None,
            refresh_token: None,
        };
        self.session_tx.send_replace(Some(session.clone()));
        session
    }
}

#[async_trait::async_trait]
impl RemoteStore for InMemoryStore {
    async fn auth_sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let user_id = {
            let mut inner = self.inner.write().await;
            Self::record(&mut inner, StoreOperation::SignIn)?;
            match inner.principals.get(email) {
                Some(principal) if principal.password == password => principal.id,
                _ => return Err(AppError::Auth(INVALID_LOGIN_MESSAGE.to_string())),
            }
        };

        Ok(self.open_session(user_id, email))
    }

    async fn auth_sign_up(&self, email: &str, password: &str) -> AppResult<Session> {
        let user_id = {
            let mut inner = self.inner.write().await;
            Self::record(&mut inner, StoreOperation::SignUp)?;
            if inner.principals.contains_key(email) {
                return Err(AppError::Auth(ALREADY_REGISTERED_MESSAGE.to_string()));
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(AppError::Auth(
                    "Password should be at least 6 characters".to_string(),
                ));
            }

            let id = Uuid::new_v4();
            inner.principals.insert(
                email.to_string(),
                Principal {
                    id,
                    password: password.to_string(),
                },
            );
            id
        };

        Ok(self.open_session(user_id, email))
    }

    async fn auth_sign_out(&self) -> AppResult<()> {
        let result = Self::record(&mut *self.inner.write().await, StoreOperation::SignOut);
        self.session_tx.send_replace(None);
        result
    }

    async fn auth_current_user(&self) -> AppResult<Option<Session>> {
        Self::record(&mut *self.inner.write().await, StoreOperation::CurrentUser)?;
        Ok(self.session_tx.borrow().clone())
    }

    fn auth_subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    async fn profile_insert(&self, profile: &Profile) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        Self::record(&mut inner, StoreOperation::ProfileInsert)?;
        if inner.profiles.contains_key(&profile.id) {
            return Err(AppError::ExternalApi(format!(
                "duplicate profile {}",
                profile.id
            )));
        }
        inner.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn collection_insert(&self, item: &NewCollectionItem) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        Self::record(&mut inner, StoreOperation::Insert)?;
        if item.owner_id != self.current_user_id()? {
            return Err(AppError::ExternalApi(
                "row violates owner policy".to_string(),
            ));
        }
        inner.items.push(item.clone().with_id(Uuid::new_v4()));
        Ok(())
    }

    async fn collection_select(&self, query: &CollectionQuery) -> AppResult<Vec<CollectionItem>> {
        let mut inner = self.inner.write().await;
        Self::record(&mut inner, StoreOperation::Select)?;
        let user_id = self.current_user_id()?;
        Ok(inner
            .items
            .iter()
            .filter(|item| item.owner_id == user_id && query.matches(item))
            .cloned()
            .collect())
    }

    async fn collection_update(&self, id: Uuid, fields: &ItemUpdate) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        Self::record(&mut inner, StoreOperation::Update)?;
        let user_id = self.current_user_id()?;
        // Filters that match nothing succeed, as they do against the hosted store
        if let Some(item) = inner
            .items
            .iter_mut()
            .find(|item| item.id == id && item.owner_id == user_id)
        {
            fields.apply(item);
        }
        Ok(())
    }

    async fn collection_delete(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        Self::record(&mut inner, StoreOperation::Delete)?;
        let user_id = self.current_user_id()?;
        inner
            .items
            .retain(|item| !(item.id == id && item.owner_id == user_id));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
