//! Debounced title search
//!
//! Every keystroke goes through [`SearchDebouncer::input`]. Each input gets a
//! new generation number; the provider is only queried once the input has
//! been left alone for the quiescence window, and a response is only shown if
//! its generation is still the newest when it arrives. Superseded requests
//! are left to finish and their results are dropped.
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    error::AppResult,
    models::{ApiCandidate, SearchCandidate},
    services::providers::MetadataProvider,
};

/// Quiescence window before a query is sent
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Trimmed inputs must be longer than this to reach the provider
pub const MIN_QUERY_LEN: usize = 2;

/// Number of suggestions shown
pub const MAX_SUGGESTIONS: usize = 5;

/// The suggestion list currently on screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    /// Generation of the input these results belong to
    pub generation: u64,
    /// Trimmed query text the results were fetched for
    pub query: String,
    pub candidates: Vec<SearchCandidate>,
}

#[derive(Default)]
struct DebounceState {
    generation: u64,
    input: String,
    timer: Option<JoinHandle<()>>,
}

struct DebouncerInner {
    provider: Arc<dyn MetadataProvider>,
    window: Duration,
    state: Mutex<DebounceState>,
    results_tx: watch::Sender<Suggestions>,
}

impl DebouncerInner {
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs once the window has elapsed without another keystroke
    fn fire(self: Arc<Self>, generation: u64, query: String) {
        if self.lock().generation != generation {
            return;
        }

        tracing::debug!(query = %query, generation, "Debounce window elapsed");
        tokio::spawn(async move {
            let candidates = self.run_query(&query).await;
            self.apply(generation, query, candidates);
        });
    }

    /// Provider failures degrade to an empty list
    async fn run_query(&self, query: &str) -> Vec<SearchCandidate> {
        match self.provider.search(query).await {
            Ok(results) => top_candidates(results),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    query = %query,
                    provider = self.provider.name(),
                    "Failed to search titles"
                );
                Vec::new()
            }
        }
    }

    fn apply(&self, generation: u64, query: String, candidates: Vec<SearchCandidate>) {
        let state = self.lock();
        if state.generation != generation {
            tracing::debug!(
                query = %query,
                generation,
                current = state.generation,
                "Discarding stale search response"
            );
            return;
        }

        self.results_tx.send_replace(Suggestions {
            generation,
            query,
            candidates,
        });
    }
}

/// First [`MAX_SUGGESTIONS`] hits in provider order, minus the ones that
/// cannot be added to a list
fn top_candidates(results: Vec<ApiCandidate>) -> Vec<SearchCandidate> {
    results
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .filter_map(SearchCandidate::from_api)
        .collect()
}

pub struct SearchDebouncer {
    inner: Arc<DebouncerInner>,
}

impl SearchDebouncer {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self::with_window(provider, SEARCH_DEBOUNCE)
    }

    pub fn with_window(provider: Arc<dyn MetadataProvider>, window: Duration) -> Self {
        let (results_tx, _) = watch::channel(Suggestions::default());
        Self {
            inner: Arc::new(DebouncerInner {
                provider,
                window,
                state: Mutex::new(DebounceState::default()),
                results_tx,
            }),
        }
    }

    /// Feeds the current text of the search box
    ///
    /// Restarts the quiescence window. Short inputs clear the suggestions
    /// immediately and never reach the provider.
    pub fn input(&self, text: impl Into<String>) {
        let text = text.into();
        let query = text.trim().to_string();

        let mut state = self.inner.lock();
        state.generation += 1;
        state.input = text;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let generation = state.generation;

        if query.chars().count() <= MIN_QUERY_LEN {
            self.inner.results_tx.send_replace(Suggestions {
                generation,
                query,
                candidates: Vec::new(),
            });
            return;
        }

        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.fire(generation, query);
        }));
    }

    /// Queries the provider right away, bypassing the debounce
    ///
    /// Returns the top-ranked candidate that can be added to a list.
    pub async fn resolve(&self, text: &str) -> AppResult<Option<SearchCandidate>> {
        let results = self.inner.provider.search(text.trim()).await?;
        Ok(results.into_iter().find_map(SearchCandidate::from_api))
    }

    /// Empties the search box and the suggestion list
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.input.clear();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        self.inner.results_tx.send_replace(Suggestions {
            generation: state.generation,
            ..Suggestions::default()
        });
    }

    /// Cancels a pending window; in-flight responses are still discarded
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Raw text of the search box
    pub fn input_text(&self) -> String {
        self.inner.lock().input.clone()
    }

    pub fn suggestions(&self) -> Vec<SearchCandidate> {
        self.inner.results_tx.borrow().candidates.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.inner.results_tx.subscribe()
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::MediaType, services::providers::MockMetadataProvider};
    use std::collections::HashMap;

    fn movie(id: u64, title: &str) -> ApiCandidate {
        ApiCandidate {
            id,
            title: Some(title.to_string()),
            name: None,
            media_type: "movie".to_string(),
            poster_path: Some(format!("/{}.jpg", id)),
        }
    }

    /// Provider whose responses take a per-query amount of time
    struct SlowProvider {
        delays: HashMap<String, Duration>,
        queries: Mutex<Vec<String>>,
    }

    impl SlowProvider {
        fn new(delays: &[(&str, u64)]) -> Self {
            Self {
                delays: delays
                    .iter()
                    .map(|(query, ms)| (query.to_string(), Duration::from_millis(*ms)))
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl MetadataProvider for SlowProvider {
        async fn search(&self, query: &str) -> AppResult<Vec<ApiCandidate>> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            Ok(vec![movie(query.len() as u64, query)])
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    async fn settle() {
        tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_keystrokes_fires_once() {
        let provider = Arc::new(SlowProvider::new(&[]));
        let debouncer = SearchDebouncer::new(provider.clone());

        for text in ["Inc", "Ince", "Incep"] {
            debouncer.input(text);
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        debouncer.input("Inception");

        tokio::time::sleep(SEARCH_DEBOUNCE - Duration::from_millis(1)).await;
        assert!(provider.queries.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*provider.queries.lock().unwrap(), vec!["Inception".to_string()]);

        settle().await;
        let suggestions = debouncer.suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Inception");
        assert_eq!(debouncer.input_text(), "Inception");
        assert_eq!(provider.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_inside_the_window() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_| Ok(Vec::new()));
        provider.expect_name().return_const("mock");

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("batman");
        tokio::time::sleep(Duration::from_millis(250)).await;
        debouncer.input("batman begins");
        tokio::time::sleep(Duration::from_millis(250)).await;
        // 500ms since the first keystroke, still only 250ms of quiet
        debouncer.input("batman begins!");
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_never_reaches_provider() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_search().never();

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        for text in ["a", "ab", "  ab  ", "", "   "] {
            debouncer.input(text);
            settle().await;
            assert!(debouncer.suggestions().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_clears_previous_suggestions() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_| Ok(vec![movie(1, "Alien")]));
        provider.expect_name().return_const("mock");

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("Alien");
        settle().await;
        assert_eq!(debouncer.suggestions().len(), 1);

        debouncer.input("Al");
        assert!(debouncer.suggestions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let provider = Arc::new(SlowProvider::new(&[("bat", 500), ("batman", 50)]));
        let debouncer = SearchDebouncer::new(provider.clone());
        let mut results = debouncer.subscribe();

        debouncer.input("bat");
        // "bat" is sent at 300ms and answers at 800ms
        tokio::time::sleep(Duration::from_millis(310)).await;
        debouncer.input("batman");
        // "batman" is sent at 610ms and answers at 660ms
        tokio::time::sleep(Duration::from_millis(390)).await;
        assert_eq!(debouncer.suggestions()[0].title, "batman");

        results.borrow_and_update();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(
            *provider.queries.lock().unwrap(),
            vec!["bat".to_string(), "batman".to_string()]
        );
        assert!(!results.has_changed().unwrap());
        assert_eq!(debouncer.suggestions()[0].title, "batman");
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_degrades_to_empty() {
        let mut provider = MockMetadataProvider::new();
        let mut calls = 0;
        provider.expect_search().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(vec![movie(1, "Heat")])
            } else {
                Err(AppError::SearchProvider("timeout".to_string()))
            }
        });
        provider.expect_name().return_const("mock");

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("Heat");
        settle().await;
        assert_eq!(debouncer.suggestions().len(), 1);

        debouncer.input("Heat 2");
        settle().await;
        assert!(debouncer.suggestions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_truncated_in_provider_order() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_search().returning(|_| {
            Ok((1..=8)
                .map(|id| movie(id, &format!("Star Trek {}", id)))
                .collect())
        });
        provider.expect_name().return_const("mock");

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("Star Trek");
        settle().await;

        let ids: Vec<u64> = debouncer
            .suggestions()
            .iter()
            .map(|candidate| candidate.external_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_window() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_search().never();

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("Inception");
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(debouncer);
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_input_and_suggestions() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .returning(|_| Ok(vec![movie(1, "Dune")]));
        provider.expect_name().return_const("mock");

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        debouncer.input("Dune");
        settle().await;
        assert!(!debouncer.suggestions().is_empty());

        debouncer.reset();
        assert!(debouncer.suggestions().is_empty());
        assert_eq!(debouncer.input_text(), "");
    }

    #[tokio::test]
    async fn test_resolve_takes_first_addable_candidate() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .withf(|query| query == "dicaprio")
            .returning(|_| {
                Ok(vec![
                    ApiCandidate {
                        id: 6193,
                        title: None,
                        name: Some("Leonardo DiCaprio".to_string()),
                        media_type: "person".to_string(),
                        poster_path: None,
                    },
                    movie(27205, "Inception"),
                ])
            });

        let debouncer = SearchDebouncer::new(Arc::new(provider));
        let candidate = debouncer.resolve("  dicaprio ").await.unwrap().unwrap();

        assert_eq!(candidate.external_id, 27205);
        assert_eq!(candidate.media_type, MediaType::Movie);
    }
}
