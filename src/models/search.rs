use serde::{Deserialize, Serialize};

use super::{poster_url, MediaType};

// ============================================================================
// TMDB API Types
// ============================================================================

/// Raw response from TMDB `/search/multi`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSearchResponse {
    #[serde(default)]
    pub results: Vec<ApiCandidate>,
}

/// One raw search hit; movies carry `title`, TV shows carry `name`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiCandidate {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl ApiCandidate {
    /// Display title: `title` if present, else `name`
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .filter(|title| !title.is_empty())
    }
}

/// A search result that can be added to the collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchCandidate {
    pub external_id: u64,
    pub title: String,
    pub media_type: MediaType,
    pub poster_path: Option<String>,
}

impl SearchCandidate {
    /// Converts a raw hit, rejecting people and untitled entries
    pub fn from_api(candidate: ApiCandidate) -> Option<Self> {
        let media_type = candidate.media_type.parse::<MediaType>().ok()?;
        let title = candidate.display_title()?.to_string();

        Some(Self {
            external_id: candidate.id,
            title,
            media_type,
            poster_path: candidate.poster_path,
        })
    }

    /// Thumbnail URL used in the suggestion list
    pub fn thumbnail_url(&self, image_base: &str) -> Option<String> {
        poster_url(image_base, "w92", self.poster_path.as_deref())
    }
}
