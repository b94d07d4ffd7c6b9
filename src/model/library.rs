use serde::{Deserialize, Serialize};

/// Searchable title of a library entry, used by the catalog cache filters.
pub trait Titled {
    fn title(&self) -> &str;
    /// Secondary search field (album artist). Empty for most kinds.
    fn secondary(&self) -> &str {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub title: String,
    pub uri: Option<String>,
    pub album_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: String,
    pub uri: Option<String>,
    pub artist: Option<String>,
    pub album_art_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub uri: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: String,
    pub title: String,
    pub uri: Option<String>,
}

impl Titled for Artist {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for Album {
    fn title(&self) -> &str {
        &self.title
    }
    fn secondary(&self) -> &str {
        self.artist.as_deref().unwrap_or("")
    }
}

impl Titled for Track {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for Genre {
    fn title(&self) -> &str {
        &self.title
    }
}

/// Filtered browse result. `total_matches` counts matches before truncation
/// to `max_items`; `number_returned` counts the items actually included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseResult<T> {
    pub items: Vec<T>,
    pub total_matches: usize,
    pub number_returned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCounts {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub genres: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub last_refreshed_at: Option<String>,
    pub is_refreshing: bool,
    pub item_counts: ItemCounts,
}

/// Entire library cache, for clients that filter locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryCacheDump {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub genres: Vec<Genre>,
    pub last_refreshed_at: Option<String>,
}
