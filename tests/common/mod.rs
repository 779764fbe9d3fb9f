use std::{collections::HashMap, sync::Arc, time::Duration};

use movie_tracker::{
    db::InMemoryStore,
    models::ApiCandidate,
    services::{
        providers::MetadataProvider, CollectionView, MutationPipeline, SearchDebouncer,
        SessionManager, SubscriptionHandle,
    },
    AppResult,
};

/// Provider answering from a fixed table; unknown queries return nothing
#[derive(Default)]
pub struct StaticProvider {
    results: HashMap<String, Vec<ApiCandidate>>,
}

impl StaticProvider {
    pub fn with(mut self, query: &str, results: Vec<ApiCandidate>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }
}

#[async_trait::async_trait]
impl MetadataProvider for StaticProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<ApiCandidate>> {
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub fn movie(id: u64, title: &str) -> ApiCandidate {
    ApiCandidate {
        id,
        title: Some(title.to_string()),
        name: None,
        media_type: "movie".to_string(),
        poster_path: Some(format!("/{}.jpg", id)),
    }
}

pub fn show(id: u64, name: &str) -> ApiCandidate {
    ApiCandidate {
        id,
        title: None,
        name: Some(name.to_string()),
        media_type: "tv".to_string(),
        poster_path: None,
    }
}

/// Engine components over an in-memory store
///
/// The session is initialized; the collection view is only refreshed when a
/// test asks for it, so store call logs stay deterministic.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub session: Arc<SessionManager>,
    pub search: Arc<SearchDebouncer>,
    pub view: Arc<CollectionView>,
    pub mutations: MutationPipeline,
    subscription: SubscriptionHandle,
}

impl Harness {
    pub async fn new(provider: StaticProvider) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let session = Arc::new(SessionManager::new(store.clone()));
        let search = Arc::new(SearchDebouncer::with_window(
            Arc::new(provider),
            Duration::from_millis(300),
        ));
        let view = Arc::new(CollectionView::new(store.clone(), session.subscribe()));
        let mutations =
            MutationPipeline::new(store.clone(), session.subscribe(), view.clone(), search.clone());
        let subscription = session.initialize().await.unwrap();

        Self {
            store,
            session,
            search,
            view,
            mutations,
            subscription,
        }
    }

    /// Registers and signs in a user, returning its id
    pub async fn signed_in(&self, email: &str) -> uuid::Uuid {
        let id = self.store.register(email, "secret1").await;
        self.session.sign_in(email, "secret1").await.unwrap();
        id
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
