use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub mod collection;
pub mod search;
pub mod session;

pub use collection::{CollectionItem, CollectionQuery, ItemUpdate, NewCollectionItem, ViewFilter};
pub use search::{ApiCandidate, ApiSearchResponse, SearchCandidate};
pub use session::{Profile, Session, SessionState};

/// Kind of media a collection item refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Anime,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Movie, MediaType::Tv, MediaType::Anime];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Anime => "anime",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            "anime" => Ok(MediaType::Anime),
            other => Err(AppError::InvalidInput(format!(
                "unknown media type: {}",
                other
            ))),
        }
    }
}

/// Which of the two lists an item sits on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    #[default]
    ToWatch,
    Watched,
}

impl WatchStatus {
    /// The other list
    pub fn complement(self) -> Self {
        match self {
            WatchStatus::ToWatch => WatchStatus::Watched,
            WatchStatus::Watched => WatchStatus::ToWatch,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WatchStatus::ToWatch => "to_watch",
            WatchStatus::Watched => "watched",
        }
    }
}

impl Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_watch" => Ok(WatchStatus::ToWatch),
            "watched" => Ok(WatchStatus::Watched),
            other => Err(AppError::InvalidInput(format!(
                "unknown watch status: {}",
                other
            ))),
        }
    }
}

/// Media-type half of the view filter; `All` disables the media-type predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaFilter {
    #[default]
    All,
    Only(MediaType),
}

impl MediaFilter {
    /// The media type to filter on, if any
    pub fn media_type(self) -> Option<MediaType> {
        match self {
            MediaFilter::All => None,
            MediaFilter::Only(media_type) => Some(media_type),
        }
    }
}

impl Display for MediaFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaFilter::All => f.write_str("all"),
            MediaFilter::Only(media_type) => f.write_str(media_type.as_str()),
        }
    }
}

impl FromStr for MediaFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MediaFilter::All),
            other => other.parse().map(MediaFilter::Only),
        }
    }
}

impl From<MediaType> for MediaFilter {
    fn from(media_type: MediaType) -> Self {
        MediaFilter::Only(media_type)
    }
}

/// Builds a poster URL such as `https://image.tmdb.org/t/p/w500/abc.jpg`
pub fn poster_url(image_base: &str, size: &str, poster_path: Option<&str>) -> Option<String> {
    poster_path
        .filter(|path| !path.is_empty())
        .map(|path| format!("{}/{}{}", image_base.trim_end_matches('/'), size, path))
}
