use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MediaFilter, MediaType, SearchCandidate, WatchStatus};

/// A title on one of the user's lists, as persisted in the `movies` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionItem {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Provider (TMDB) identifier
    #[serde(rename = "tmdb_id")]
    pub external_id: u64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    pub media_type: MediaType,
    pub status: WatchStatus,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
}

/// Insert payload for a collection row; the store assigns the id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCollectionItem {
    #[serde(rename = "tmdb_id")]
    pub external_id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub media_type: MediaType,
    pub status: WatchStatus,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
}

impl NewCollectionItem {
    /// Creates the row for `candidate` on the `status` list of `owner_id`
    pub fn from_candidate(candidate: &SearchCandidate, status: WatchStatus, owner_id: Uuid) -> Self {
        Self {
            external_id: candidate.external_id,
            title: candidate.title.clone(),
            poster_path: candidate.poster_path.clone(),
            media_type: candidate.media_type,
            status,
            owner_id,
        }
    }

    pub fn with_id(self, id: Uuid) -> CollectionItem {
        CollectionItem {
            id,
            external_id: self.external_id,
            title: self.title,
            poster_path: self.poster_path,
            media_type: self.media_type,
            status: self.status,
            owner_id: self.owner_id,
        }
    }
}

/// Partial update of a collection row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WatchStatus>,
}

impl ItemUpdate {
    pub fn status(status: WatchStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn apply(&self, item: &mut CollectionItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
    }
}

/// Predicate for a collection fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionQuery {
    pub owner_id: Uuid,
    pub status: WatchStatus,
    /// `None` matches every media type
    pub media_type: Option<MediaType>,
}

impl CollectionQuery {
    pub fn matches(&self, item: &CollectionItem) -> bool {
        item.owner_id == self.owner_id
            && item.status == self.status
            && self.media_type.map_or(true, |media_type| item.media_type == media_type)
    }
}

/// Client-side filter selecting which part of the collection is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub media_type: MediaFilter,
    pub status: WatchStatus,
}

impl ViewFilter {
    pub fn new(media_type: MediaFilter, status: WatchStatus) -> Self {
        Self { media_type, status }
    }

    /// The store query for this filter on behalf of `owner_id`
    pub fn query_for(&self, owner_id: Uuid) -> CollectionQuery {
        CollectionQuery {
            owner_id,
            status: self.status,
            media_type: self.media_type.media_type(),
        }
    }
}
