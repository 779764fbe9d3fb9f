//! Filtered view over the signed-in user's collection
//!
//! The visible set is always the result of one authoritative store fetch for
//! the current `(session, filter)` pair. Changing either re-runs the fetch;
//! nothing is filtered locally. Fetches are tagged with a generation so a
//! slow response for an older filter can never replace a newer one.
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::{sync::watch, task::JoinHandle};
use uuid::Uuid;

use crate::{
    db::RemoteStore,
    models::{CollectionItem, MediaFilter, SessionState, ViewFilter, WatchStatus},
};

#[derive(Default)]
struct ViewState {
    filter: ViewFilter,
    generation: u64,
}

struct ViewInner {
    store: Arc<dyn RemoteStore>,
    session: watch::Receiver<SessionState>,
    state: Mutex<ViewState>,
    items_tx: watch::Sender<Vec<CollectionItem>>,
}

impl ViewInner {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn refresh(&self) {
        let (filter, generation) = {
            let mut state = self.lock();
            state.generation += 1;
            (state.filter, state.generation)
        };

        let owner = self.session.borrow().user_id();
        let Some(owner_id) = owner else {
            self.publish(generation, Vec::new());
            return;
        };

        let query = filter.query_for(owner_id);
        let items = match self.store.collection_select(&query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    owner_id = %owner_id,
                    status = %filter.status,
                    media_type = %filter.media_type,
                    "Failed to fetch collection"
                );
                Vec::new()
            }
        };

        let still_signed_in = self.session.borrow().user_id() == Some(owner_id);
        if !still_signed_in {
            tracing::debug!(owner_id = %owner_id, "Session changed during fetch, discarding");
            return;
        }
        self.publish(generation, items);
    }

    fn publish(&self, generation: u64, items: Vec<CollectionItem>) {
        let state = self.lock();
        if state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "Discarding superseded collection fetch"
            );
            return;
        }
        tracing::debug!(
            items = items.len(),
            status = %state.filter.status,
            media_type = %state.filter.media_type,
            "Visible set updated"
        );
        self.items_tx.send_replace(items);
    }
}

pub struct CollectionView {
    inner: Arc<ViewInner>,
}

impl CollectionView {
    pub fn new(store: Arc<dyn RemoteStore>, session: watch::Receiver<SessionState>) -> Self {
        let (items_tx, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(ViewInner {
                store,
                session,
                state: Mutex::new(ViewState::default()),
                items_tx,
            }),
        }
    }

    pub fn filter(&self) -> ViewFilter {
        self.inner.lock().filter
    }

    /// Switches the media-type filter and refetches
    pub async fn set_media_type(&self, media_type: MediaFilter) {
        let filter = ViewFilter {
            media_type,
            ..self.filter()
        };
        self.set_filter(filter).await;
    }

    /// Switches between the two lists and refetches
    pub async fn set_status(&self, status: WatchStatus) {
        let filter = ViewFilter {
            status,
            ..self.filter()
        };
        self.set_filter(filter).await;
    }

    /// Replaces the filter; an unchanged filter does not refetch
    pub async fn set_filter(&self, filter: ViewFilter) {
        {
            let mut state = self.inner.lock();
            if state.filter == filter {
                return;
            }
            state.filter = filter;
        }
        self.refresh().await;
    }

    /// Re-runs the fetch for the current session and filter
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    /// Refetches whenever the session changes, starting with the current one
    pub fn watch_session(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut session = self.inner.session.clone();
        tokio::spawn(async move {
            session.borrow_and_update();
            inner.refresh().await;
            while session.changed().await.is_ok() {
                session.borrow_and_update();
                inner.refresh().await;
            }
        })
    }

    /// The visible set
    pub fn items(&self) -> Vec<CollectionItem> {
        self.inner.items_tx.borrow().clone()
    }

    /// Looks an item up in the visible set
    pub fn find(&self, id: Uuid) -> Option<CollectionItem> {
        self.inner
            .items_tx
            .borrow()
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CollectionItem>> {
        self.inner.items_tx.subscribe()
    }
}
