/// Metadata search provider abstraction
///
/// The client only needs one thing from a metadata source: a ranked list of
/// candidates for a free-text query. Providers return the raw hits in their
/// own ranking order; truncation and conversion happen in the search layer.
use crate::{error::AppResult, models::ApiCandidate};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Trait for metadata search providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search for movies, TV shows and people by free text
    async fn search(&self, query: &str) -> AppResult<Vec<ApiCandidate>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
