//! Device-control facility seam.
//!
//! Speaker discovery, per-speaker state and library browsing are provided by
//! an external facility reachable over HTTP. The trait keeps the rest of the
//! service independent of that facility so tests can substitute fakes; the
//! production adapter issues typed queries against the supervised command
//! server and parses its text output.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::{build_command_url, parse_command_response};
use crate::error::AppError;
use crate::model::{Album, Artist, CommandRequest, CommandResult, Genre, ListItem, QueueItem, Speaker, Track};
use crate::parse;

#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Run a network scan and return the speaker names found, in discovery
    /// order. An empty result is valid.
    async fn discover_speakers(&self) -> Result<Vec<String>, AppError>;

    /// Detailed state of one speaker. Unreachable speakers come back with
    /// `is_offline` set rather than an error.
    async fn get_speaker_info(&self, name: &str) -> Result<Speaker, AppError>;

    async fn get_favorites(&self, name: &str) -> Result<Vec<ListItem>, AppError>;
    async fn get_queue(&self, name: &str) -> Result<Vec<QueueItem>, AppError>;

    async fn browse_artists(&self, max_items: usize) -> Result<Vec<Artist>, AppError>;
    async fn browse_albums(&self, max_items: usize) -> Result<Vec<Album>, AppError>;
    async fn browse_tracks(&self, max_items: usize) -> Result<Vec<Track>, AppError>;
    async fn browse_genres(&self, max_items: usize) -> Result<Vec<Genre>, AppError>;
}

/// Per-query timeout. Discovery rescans the whole network and gets longer.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpDeviceControl {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceControl {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// GET a facility endpoint returning a JSON array of speaker names.
    async fn fetch_speaker_names(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, AppError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                message: e.to_string(),
            })?;
        let body = response.text().await.map_err(|e| AppError::Transport {
            message: format!("failed to read {endpoint} response: {e}"),
        })?;
        serde_json::from_str::<Vec<String>>(&body).map_err(|e| AppError::Protocol {
            message: format!("unparsable {endpoint} response: {e}"),
        })
    }

    /// One typed query against the command server.
    async fn query(
        &self,
        speaker: &str,
        action: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandResult, AppError> {
        let request = CommandRequest::new(speaker, action, args);
        let url = build_command_url(&self.base_url, &request)?;
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::Transport {
                message: e.to_string(),
            })?;
        let body = response.text().await.map_err(|e| AppError::Transport {
            message: format!("failed to read response for '{action}': {e}"),
        })?;
        parse_command_response(&body)
    }

    /// Library browsing goes through the first discovered speaker; the
    /// library is shared across the household, so any speaker will do.
    async fn library_speaker(&self) -> Result<String, AppError> {
        let mut names = self.fetch_speaker_names("speakers", QUERY_TIMEOUT).await?;
        if names.is_empty() {
            names = self
                .fetch_speaker_names("rediscover", DISCOVERY_TIMEOUT)
                .await?;
        }
        names.into_iter().next().ok_or_else(|| AppError::CacheRefresh {
            message: "no speakers available to browse the library".to_string(),
        })
    }

    async fn browse_list(
        &self,
        action: &str,
        max_items: usize,
    ) -> Result<Vec<ListItem>, AppError> {
        let speaker = self.library_speaker().await?;
        let result = self
            .query(&speaker, action, &[max_items.to_string()], DISCOVERY_TIMEOUT)
            .await?;
        if !result.is_success() {
            return Err(AppError::CacheRefresh {
                message: format!("'{action}' failed: {}", result.error_msg),
            });
        }
        Ok(parse::parse_numbered_list(&result.result))
    }
}

#[async_trait]
impl DeviceControl for HttpDeviceControl {
    async fn discover_speakers(&self) -> Result<Vec<String>, AppError> {
        self.fetch_speaker_names("rediscover", DISCOVERY_TIMEOUT)
            .await
    }

    async fn get_speaker_info(&self, name: &str) -> Result<Speaker, AppError> {
        let volume = match self.query(name, "volume", &[], QUERY_TIMEOUT).await {
            Ok(r) => r,
            Err(e) => {
                // Unreachable speakers are reported, not errored, so a whole
                // listing survives one dead device.
                return Ok(Speaker {
                    name: name.to_string(),
                    is_offline: true,
                    error_message: Some(e.to_string()),
                    ..Speaker::default()
                });
            }
        };

        let mute = self.query(name, "mute", &[], QUERY_TIMEOUT).await.ok();
        let state = self.query(name, "state", &[], QUERY_TIMEOUT).await.ok();
        let track = self.query(name, "track", &[], QUERY_TIMEOUT).await.ok();

        let parsed_volume = volume
            .is_success()
            .then(|| volume.result.trim().parse::<u8>().ok())
            .flatten();

        Ok(Speaker {
            name: name.to_string(),
            is_coordinator: true,
            volume: parsed_volume,
            is_muted: mute
                .filter(CommandResult::is_success)
                .map(|r| parse::parse_on_off(&r.result)),
            playback_state: state
                .filter(CommandResult::is_success)
                .map(|r| r.result.trim().to_string()),
            current_track: track
                .filter(CommandResult::is_success)
                .map(|r| r.result.trim().to_string()),
            ..Speaker::default()
        })
    }

    async fn get_favorites(&self, name: &str) -> Result<Vec<ListItem>, AppError> {
        let result = self
            .query(name, "list_favourites", &[], QUERY_TIMEOUT)
            .await?;
        Ok(parse::parse_numbered_list(&result.result))
    }

    async fn get_queue(&self, name: &str) -> Result<Vec<QueueItem>, AppError> {
        let result = self.query(name, "queue", &[], QUERY_TIMEOUT).await?;
        Ok(parse::parse_queue_list(&result.result))
    }

    async fn browse_artists(&self, max_items: usize) -> Result<Vec<Artist>, AppError> {
        let items = self.browse_list("list_artists", max_items).await?;
        Ok(items
            .into_iter()
            .map(|item| Artist {
                id: format!("artist-{}", item.number),
                title: item.name,
                uri: None,
                album_count: None,
            })
            .collect())
    }

    async fn browse_albums(&self, max_items: usize) -> Result<Vec<Album>, AppError> {
        let items = self.browse_list("list_albums", max_items).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                // Album rows come back pipe-delimited: `Artist: X | Album: Y`
                let (artist, album, _) = parse::parse_pipe_fields(&item.name);
                let title = if album.is_empty() { item.name } else { album };
                Album {
                    id: format!("album-{}", item.number),
                    title,
                    uri: None,
                    artist: (!artist.is_empty()).then_some(artist),
                    album_art_uri: None,
                }
            })
            .collect())
    }

    async fn browse_tracks(&self, max_items: usize) -> Result<Vec<Track>, AppError> {
        let items = self.browse_list("list_tracks", max_items).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let (artist, album, title) = parse::parse_pipe_fields(&item.name);
                let title = if title.is_empty() { item.name } else { title };
                Track {
                    id: format!("track-{}", item.number),
                    title,
                    uri: None,
                    artist: (!artist.is_empty()).then_some(artist),
                    album: (!album.is_empty()).then_some(album),
                    album_art_uri: None,
                    duration: None,
                }
            })
            .collect())
    }

    async fn browse_genres(&self, max_items: usize) -> Result<Vec<Genre>, AppError> {
        let items = self.browse_list("list_genres", max_items).await?;
        Ok(items
            .into_iter()
            .map(|item| Genre {
                id: format!("genre-{}", item.number),
                title: item.name,
                uri: None,
            })
            .collect())
    }
}
