use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key used for every metadata search
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// TMDB image CDN base URL (poster size is appended per use)
    #[serde(default = "default_tmdb_image_url")]
    pub tmdb_image_url: String,

    /// Base URL of the hosted auth + database service
    pub store_url: String,

    /// Public (anon) key of the hosted auth + database service
    pub store_api_key: String,

    /// Where the signed-in session is kept between runs
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Quiescence window for the search box, in milliseconds
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".movie-tracker/session.json")
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_log_filter() -> String {
    "movie_tracker=info".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects blank credentials, which envy happily accepts
    fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("TMDB_API_KEY", &self.tmdb_api_key),
            ("STORE_URL", &self.store_url),
            ("STORE_API_KEY", &self.store_api_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Failed to load config: {} must not be empty", name);
            }
        }
        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
