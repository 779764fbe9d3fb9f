/// TMDB multi-search provider
///
/// Uses `/search/multi`, which mixes movies, TV shows and people in a single
/// ranked list.
use crate::{
    error::{AppError, AppResult},
    models::{ApiCandidate, ApiSearchResponse},
    services::providers::MetadataProvider,
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbProvider {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/search/multi", self.api_url)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<ApiCandidate>> {
        let response = self
            .http_client
            .get(self.search_url())
            .query(&[("api_key", self.api_key.as_str()), ("query", query)])
            .send()
            .await
            .map_err(|e| AppError::SearchProvider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchProvider(format!(
                "API returned status {}: {}",
                status, body
            )));
        }

        let body: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::SearchProvider(e.to_string()))?;

        tracing::info!(
            query = %query,
            results = body.results.len(),
            provider = self.name(),
            "Title search completed"
        );

        Ok(body.results)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url() {
        let provider = TmdbProvider::new(
            "test_key".to_string(),
            "https://api.themoviedb.org/3/".to_string(),
        );
        assert_eq!(
            provider.search_url(),
            "https://api.themoviedb.org/3/search/multi"
        );
    }

    #[test]
    fn test_parse_multi_search_response() {
        let body = r#"{
            "page": 1,
            "results": [
                {"id": 27205, "title": "Inception", "media_type": "movie", "poster_path": "/a.jpg", "popularity": 80.1},
                {"id": 1396, "name": "Breaking Bad", "media_type": "tv", "poster_path": null},
                {"id": 6193, "name": "Leonardo DiCaprio", "media_type": "person", "profile_path": "/p.jpg"}
            ],
            "total_pages": 1,
            "total_results": 3
        }"#;

        let response: ApiSearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].display_title(), Some("Inception"));
        assert_eq!(response.results[1].display_title(), Some("Breaking Bad"));
        assert_eq!(response.results[2].poster_path, None);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_a_search_error() {
        let provider = TmdbProvider::new("test_key".to_string(), "http://127.0.0.1:9".to_string());
        let err = provider.search("inception").await.unwrap_err();
        assert!(matches!(err, AppError::SearchProvider(_)));
    }
}
