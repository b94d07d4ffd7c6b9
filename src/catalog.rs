//! Server-side music library cache.
//!
//! Browsing the library through the speakers is slow, so the full catalog is
//! held in memory and rebuilt wholesale on refresh. At most one refresh runs
//! at a time: a second manual trigger is rejected with `RefreshInProgress`,
//! and the daily scheduler logs and skips. A failed refresh leaves the
//! previous contents untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::device::DeviceControl;
use crate::error::AppError;
use crate::model::{
    Album, Artist, BrowseResult, CacheStatus, Genre, ItemCounts, LibraryCacheDump, Titled, Track,
};

/// Upper bound passed to the device facility per kind. Large enough to pull
/// a whole household library in one page.
const CATALOG_PAGE_SIZE: usize = 10_000;

#[derive(Default)]
struct CatalogStore {
    artists: IndexMap<String, Artist>,
    albums: IndexMap<String, Album>,
    tracks: IndexMap<String, Track>,
    genres: IndexMap<String, Genre>,
    last_refreshed_at: Option<DateTime<Local>>,
}

impl CatalogStore {
    fn counts(&self) -> ItemCounts {
        ItemCounts {
            artists: self.artists.len(),
            albums: self.albums.len(),
            tracks: self.tracks.len(),
            genres: self.genres.len(),
        }
    }
}

pub struct CatalogCache {
    device: Arc<dyn DeviceControl>,
    store: Mutex<CatalogStore>,
    /// Single-flight guard. `try_lock` losers are rejected rather than
    /// queued; the mutex (not a bare bool) closes the check-then-set window.
    refresh_guard: tokio::sync::Mutex<()>,
    /// Mirror of the guard for cheap status reporting.
    refreshing: AtomicBool,
}

impl CatalogCache {
    pub fn new(device: Arc<dyn DeviceControl>) -> Self {
        Self {
            device,
            store: Mutex::new(CatalogStore::default()),
            refresh_guard: tokio::sync::Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Rebuild the whole catalog from the device facility.
    ///
    /// Returns the new per-kind counts. Errors with `RefreshInProgress` when
    /// another refresh holds the guard.
    pub async fn refresh(&self) -> Result<ItemCounts, AppError> {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            return Err(AppError::RefreshInProgress);
        };

        self.refreshing.store(true, Ordering::SeqCst);
        let result = self.refresh_inner().await;
        self.refreshing.store(false, Ordering::SeqCst);

        match &result {
            Ok(counts) => log::info!(
                "library cache refreshed: {} artists, {} albums, {} tracks, {} genres",
                counts.artists,
                counts.albums,
                counts.tracks,
                counts.genres
            ),
            Err(e) => log::error!("library cache refresh failed: {e}"),
        }
        result
    }

    async fn refresh_inner(&self) -> Result<ItemCounts, AppError> {
        // Fetch everything before touching the store, so a failure partway
        // through leaves the previous cache intact.
        let artists = self.device.browse_artists(CATALOG_PAGE_SIZE).await?;
        let albums = self.device.browse_albums(CATALOG_PAGE_SIZE).await?;
        let tracks = self.device.browse_tracks(CATALOG_PAGE_SIZE).await?;
        let genres = self.device.browse_genres(CATALOG_PAGE_SIZE).await?;

        let mut store = self.store.lock();
        store.artists = artists.into_iter().map(|a| (a.id.clone(), a)).collect();
        store.albums = albums.into_iter().map(|a| (a.id.clone(), a)).collect();
        store.tracks = tracks.into_iter().map(|t| (t.id.clone(), t)).collect();
        store.genres = genres.into_iter().map(|g| (g.id.clone(), g)).collect();
        store.last_refreshed_at = Some(Local::now());
        Ok(store.counts())
    }

    pub fn get_artists(&self, search: Option<&str>, max_items: usize) -> BrowseResult<Artist> {
        filter_entries(self.store.lock().artists.values(), search, max_items)
    }

    pub fn get_albums(&self, search: Option<&str>, max_items: usize) -> BrowseResult<Album> {
        filter_entries(self.store.lock().albums.values(), search, max_items)
    }

    pub fn get_tracks(&self, search: Option<&str>, max_items: usize) -> BrowseResult<Track> {
        filter_entries(self.store.lock().tracks.values(), search, max_items)
    }

    pub fn get_genres(&self, search: Option<&str>, max_items: usize) -> BrowseResult<Genre> {
        filter_entries(self.store.lock().genres.values(), search, max_items)
    }

    pub fn get_cache_status(&self) -> CacheStatus {
        let store = self.store.lock();
        CacheStatus {
            last_refreshed_at: store.last_refreshed_at.map(|t| t.to_rfc3339()),
            is_refreshing: self.refreshing.load(Ordering::SeqCst),
            item_counts: store.counts(),
        }
    }

    /// Everything, for clients that cache and filter locally.
    pub fn get_full_cache(&self) -> LibraryCacheDump {
        let store = self.store.lock();
        LibraryCacheDump {
            artists: store.artists.values().cloned().collect(),
            albums: store.albums.values().cloned().collect(),
            tracks: store.tracks.values().cloned().collect(),
            genres: store.genres.values().cloned().collect(),
            last_refreshed_at: store.last_refreshed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Case-insensitive substring filter over title (and the secondary field,
/// the album artist), then truncation to `max_items`. `total_matches` counts
/// before truncation.
fn filter_entries<'a, T>(
    entries: impl Iterator<Item = &'a T>,
    search: Option<&str>,
    max_items: usize,
) -> BrowseResult<T>
where
    T: Titled + Clone + 'a,
{
    let needle = search.map(str::to_lowercase).unwrap_or_default();
    let mut matches: Vec<&T> = entries
        .filter(|entry| {
            needle.is_empty()
                || entry.title().to_lowercase().contains(&needle)
                || entry.secondary().to_lowercase().contains(&needle)
        })
        .collect();

    let total_matches = matches.len();
    matches.truncate(max_items);
    let items: Vec<T> = matches.into_iter().cloned().collect();
    let number_returned = items.len();

    BrowseResult {
        items,
        total_matches,
        number_returned,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::test_support::{album, artist, FakeDevice};
    use std::time::Duration;

    fn cached_catalog() -> (Arc<FakeDevice>, CatalogCache) {
        let device = Arc::new(FakeDevice {
            artists: vec![
                artist("artist-1", "Cher"),
                artist("artist-2", "Cherry Poppin' Daddies"),
                artist("artist-3", "Zero 7"),
            ],
            albums: vec![
                album("album-1", "Believe", "Cher"),
                album("album-2", "Simple Things", "Zero 7"),
            ],
            ..FakeDevice::default()
        });
        let catalog = CatalogCache::new(device.clone());
        (device, catalog)
    }

    #[tokio::test]
    async fn refresh_then_filter_case_insensitively() {
        let (_, catalog) = cached_catalog();
        catalog.refresh().await.unwrap();

        let result = catalog.get_artists(Some("cher"), 100);
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.number_returned, 2);
        assert_eq!(result.items[0].title, "Cher");
        assert_eq!(result.items[1].title, "Cherry Poppin' Daddies");

        // max_items truncates after filtering
        let truncated = catalog.get_artists(Some("cher"), 1);
        assert_eq!(truncated.total_matches, 2);
        assert_eq!(truncated.number_returned, 1);
        assert_eq!(truncated.items.len(), 1);
    }

    #[tokio::test]
    async fn album_search_matches_artist_field() {
        let (_, catalog) = cached_catalog();
        catalog.refresh().await.unwrap();

        let result = catalog.get_albums(Some("zero"), 100);
        assert_eq!(result.total_matches, 1);
        assert_eq!(result.items[0].title, "Simple Things");
    }

    #[tokio::test]
    async fn concurrent_refresh_is_single_flight() {
        let (device, _) = cached_catalog();
        let device = Arc::new(FakeDevice {
            artists: device.artists.clone(),
            browse_delay: Some(Duration::from_millis(50)),
            ..FakeDevice::default()
        });
        let catalog = CatalogCache::new(device.clone());

        let (first, second) = tokio::join!(catalog.refresh(), catalog.refresh());

        // Exactly one refresh ran the underlying queries
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::RefreshInProgress))));
        assert_eq!(
            device.browse_calls.load(std::sync::atomic::Ordering::SeqCst),
            4 // one per kind, from the single winning refresh
        );
        assert!(!catalog.get_cache_status().is_refreshing);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_contents() {
        let (device, catalog) = cached_catalog();
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.get_cache_status().item_counts.artists, 3);
        let refreshed_at = catalog.get_cache_status().last_refreshed_at;

        device
            .fail_browse
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = catalog.refresh().await.unwrap_err();
        assert!(matches!(err, AppError::CacheRefresh { .. }));

        // Old contents and timestamp survive
        let status = catalog.get_cache_status();
        assert_eq!(status.item_counts.artists, 3);
        assert_eq!(status.last_refreshed_at, refreshed_at);
        assert!(!status.is_refreshing);
    }

    #[tokio::test]
    async fn status_before_first_refresh() {
        let (_, catalog) = cached_catalog();
        let status = catalog.get_cache_status();
        assert!(status.last_refreshed_at.is_none());
        assert!(!status.is_refreshing);
        assert_eq!(status.item_counts, ItemCounts::default());
        assert_eq!(catalog.get_artists(None, 10).total_matches, 0);
    }
}
