//! Shared test fakes. Compiled only for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::device::DeviceControl;
use crate::error::AppError;
use crate::model::{Album, Artist, Genre, ListItem, QueueItem, Speaker, Track};

/// Configurable in-memory device. Discovery results are consumed one per
/// call (the last one repeats); browse calls are counted and can be slowed
/// down or made to fail to exercise cache behavior.
#[derive(Default)]
pub(crate) struct FakeDevice {
    pub discovery_results: Mutex<VecDeque<Vec<String>>>,
    pub discover_calls: AtomicUsize,

    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub genres: Vec<Genre>,

    pub browse_delay: Option<Duration>,
    pub browse_calls: AtomicUsize,
    pub fail_browse: AtomicBool,
}

impl FakeDevice {
    pub fn with_discovery(results: Vec<Vec<String>>) -> Self {
        Self {
            discovery_results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    async fn browse_hook(&self) -> Result<(), AppError> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.browse_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_browse.load(Ordering::SeqCst) {
            return Err(AppError::CacheRefresh {
                message: "fake browse failure".to_string(),
            });
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[async_trait]
impl DeviceControl for FakeDevice {
    async fn discover_speakers(&self) -> Result<Vec<String>, AppError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        let mut results = self.discovery_results.lock();
        if results.len() > 1 {
            Ok(results.pop_front().unwrap_or_default())
        } else {
            Ok(results.front().cloned().unwrap_or_default())
        }
    }

    async fn get_speaker_info(&self, name: &str) -> Result<Speaker, AppError> {
        Ok(Speaker {
            name: name.to_string(),
            ..Speaker::default()
        })
    }

    async fn get_favorites(&self, _: &str) -> Result<Vec<ListItem>, AppError> {
        Ok(Vec::new())
    }
    async fn get_queue(&self, _: &str) -> Result<Vec<QueueItem>, AppError> {
        Ok(Vec::new())
    }

    async fn browse_artists(&self, _: usize) -> Result<Vec<Artist>, AppError> {
        self.browse_hook().await?;
        Ok(self.artists.clone())
    }
    async fn browse_albums(&self, _: usize) -> Result<Vec<Album>, AppError> {
        self.browse_hook().await?;
        Ok(self.albums.clone())
    }
    async fn browse_tracks(&self, _: usize) -> Result<Vec<Track>, AppError> {
        self.browse_hook().await?;
        Ok(self.tracks.clone())
    }
    async fn browse_genres(&self, _: usize) -> Result<Vec<Genre>, AppError> {
        self.browse_hook().await?;
        Ok(self.genres.clone())
    }
}

pub(crate) fn artist(id: &str, title: &str) -> Artist {
    Artist {
        id: id.to_string(),
        title: title.to_string(),
        uri: None,
        album_count: None,
    }
}

pub(crate) fn album(id: &str, title: &str, by: &str) -> Album {
    Album {
        id: id.to_string(),
        title: title.to_string(),
        uri: None,
        artist: Some(by.to_string()),
        album_art_uri: None,
    }
}
