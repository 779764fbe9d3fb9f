//! Add / toggle / delete
//!
//! Every mutation writes to the store and then re-runs the collection view's
//! current fetch, whether or not the write succeeded. There is no local
//! patching of the visible set. Failures are logged and reported as
//! [`MutationOutcome::Failed`]; they never propagate as errors.
use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    db::RemoteStore,
    models::{ItemUpdate, NewCollectionItem, SearchCandidate, Session, SessionState},
    services::{collection::CollectionView, search::SearchDebouncer},
};

/// What to add: a picked suggestion, or the raw text of the search box
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddRequest {
    Candidate(SearchCandidate),
    Text(String),
}

impl From<SearchCandidate> for AddRequest {
    fn from(candidate: SearchCandidate) -> Self {
        AddRequest::Candidate(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The write was acknowledged
    Applied,
    /// Nothing was written (no session, empty input, no search match)
    Skipped,
    /// The write or the lookup before it failed
    Failed,
}

pub struct MutationPipeline {
    store: Arc<dyn RemoteStore>,
    session: watch::Receiver<SessionState>,
    view: Arc<CollectionView>,
    search: Arc<SearchDebouncer>,
}

impl MutationPipeline {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: watch::Receiver<SessionState>,
        view: Arc<CollectionView>,
        search: Arc<SearchDebouncer>,
    ) -> Self {
        Self {
            store,
            session,
            view,
            search,
        }
    }

    fn session(&self) -> Option<Session> {
        self.session.borrow().session().cloned()
    }

    /// Adds a title to the list currently being viewed
    ///
    /// Raw text is resolved with an immediate provider query and its top
    /// result. On success the search box and suggestions are cleared.
    pub async fn add_item(&self, request: impl Into<AddRequest>) -> MutationOutcome {
        let Some(session) = self.session() else {
            tracing::debug!("Add ignored, not signed in");
            return MutationOutcome::Skipped;
        };

        let candidate = match request.into() {
            AddRequest::Candidate(candidate) => candidate,
            AddRequest::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return MutationOutcome::Skipped;
                }
                match self.search.resolve(text).await {
                    Ok(Some(candidate)) => candidate,
                    Ok(None) => {
                        tracing::warn!(query = %text, "No search results to add");
                        return MutationOutcome::Skipped;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, query = %text, "Failed to add title");
                        return MutationOutcome::Failed;
                    }
                }
            }
        };

        let status = self.view.filter().status;
        let row = NewCollectionItem::from_candidate(&candidate, status, session.user_id);
        let result = self.store.collection_insert(&row).await;
        self.view.refresh().await;

        match result {
            Ok(()) => {
                tracing::info!(
                    external_id = candidate.external_id,
                    title = %candidate.title,
                    status = %status,
                    "Title added"
                );
                self.search.reset();
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    external_id = candidate.external_id,
                    "Failed to add title"
                );
                MutationOutcome::Failed
            }
        }
    }

    /// Moves an item to the other list
    ///
    /// The target is the complement of the item's status as last fetched; an
    /// item missing from the visible set falls back to the view's status.
    pub async fn toggle_status(&self, item_id: Uuid) -> MutationOutcome {
        if self.session().is_none() {
            return MutationOutcome::Skipped;
        }

        let current = match self.view.find(item_id) {
            Some(item) => item.status,
            None => {
                let status = self.view.filter().status;
                tracing::debug!(item_id = %item_id, status = %status, "Item not visible, using view status");
                status
            }
        };
        let target = current.complement();

        let result = self
            .store
            .collection_update(item_id, &ItemUpdate::status(target))
            .await;
        self.view.refresh().await;

        match result {
            Ok(()) => {
                tracing::info!(item_id = %item_id, status = %target, "Status changed");
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, item_id = %item_id, "Failed to update status");
                MutationOutcome::Failed
            }
        }
    }

    /// Removes an item by its store id
    pub async fn delete_item(&self, item_id: Uuid) -> MutationOutcome {
        if self.session().is_none() {
            return MutationOutcome::Skipped;
        }

        let result = self.store.collection_delete(item_id).await;
        self.view.refresh().await;

        match result {
            Ok(()) => {
                tracing::info!(item_id = %item_id, "Title removed");
                MutationOutcome::Applied
            }
            Err(e) => {
                tracing::error!(error = %e, item_id = %item_id, "Failed to delete title");
                MutationOutcome::Failed
            }
        }
    }
}
