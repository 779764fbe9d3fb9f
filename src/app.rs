use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::Config,
    db::{RemoteStore, RestStore},
    error::AppResult,
    models::SessionState,
    services::{
        providers::{MetadataProvider, TmdbProvider},
        CollectionView, MutationPipeline, SearchDebouncer, SessionManager, SubscriptionHandle,
    },
};

/// Everything the interface talks to, wired to one store and one provider
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub search: Arc<SearchDebouncer>,
    pub collection: Arc<CollectionView>,
    pub mutations: MutationPipeline,
    pub image_base: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        provider: Arc<dyn MetadataProvider>,
        search_window: Duration,
        image_base: String,
    ) -> Self {
        let session = Arc::new(SessionManager::new(store.clone()));
        let search = Arc::new(SearchDebouncer::with_window(provider, search_window));
        let collection = Arc::new(CollectionView::new(store.clone(), session.subscribe()));
        let mutations =
            MutationPipeline::new(store, session.subscribe(), collection.clone(), search.clone());

        Self {
            session,
            search,
            collection,
            mutations,
            image_base,
        }
    }

    /// Hosted store and TMDB, as configured
    pub fn from_config(config: &Config) -> Self {
        let store = RestStore::new(config.store_url.clone(), config.store_api_key.clone())
            .with_session_file(&config.session_file);
        let provider = TmdbProvider::new(config.tmdb_api_key.clone(), config.tmdb_api_url.clone());

        Self::new(
            Arc::new(store),
            Arc::new(provider),
            config.search_debounce(),
            config.tmdb_image_url.clone(),
        )
    }

    /// Resolves the session and starts the background tasks
    pub async fn start(&self) -> AppResult<Background> {
        let session = self.session.initialize().await?;
        let collection = self.collection.watch_session();
        let search = clear_search_on_sign_out(self.search.clone(), self.session.subscribe());
        Ok(Background {
            session,
            collection,
            search,
        })
    }
}

/// Empties the search box whenever the signed-in user goes away or changes
fn clear_search_on_sign_out(
    search: Arc<SearchDebouncer>,
    mut session: watch::Receiver<SessionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut user = session.borrow_and_update().user_id();
        while session.changed().await.is_ok() {
            let next = session.borrow_and_update().user_id();
            if next.is_none() || (user.is_some() && next != user) {
                search.reset();
            }
            user = next;
        }
    })
}

/// Background tasks started by [`AppState::start`]
pub struct Background {
    session: SubscriptionHandle,
    collection: JoinHandle<()>,
    search: JoinHandle<()>,
}

impl Background {
    pub fn stop(&self) {
        self.session.cancel();
        self.collection.abort();
        self.search.abort();
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Top-level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Loading,
    Login,
    Signup,
    Home,
}

impl Screen {
    /// The screen actually shown for a requested one
    ///
    /// Nothing but the loading screen renders before the session resolves.
    /// Signed-in users always land on home; everyone else gets the login
    /// screen unless they asked for sign-up.
    pub fn resolve(requested: Screen, state: &SessionState) -> Screen {
        match state {
            SessionState::Unknown => Screen::Loading,
            SessionState::Authenticated(_) => Screen::Home,
            SessionState::Anonymous => match requested {
                Screen::Signup => Screen::Signup,
                _ => Screen::Login,
            },
        }
    }
}
