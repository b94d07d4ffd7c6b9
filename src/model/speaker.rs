use serde::{Deserialize, Serialize};

/// A Sonos speaker on the network, as reported by the device-control facility.
///
/// Not persisted — rebuilt per request. A speaker that failed to answer is
/// returned with `is_offline` set and an `error_message` instead of an error,
/// so one dead speaker never breaks a whole listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    pub name: String,
    pub ip_address: Option<String>,
    pub model: Option<String>,
    pub is_coordinator: bool,
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_members: Vec<String>,
    pub volume: Option<u8>,
    pub is_muted: Option<bool>,
    pub current_track: Option<String>,
    pub playback_state: Option<String>,
    pub is_offline: bool,
    pub error_message: Option<String>,
}

/// Status snapshot of the supervised command server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub is_running: bool,
    pub process_id: Option<u32>,
    pub server_url: Option<String>,
    pub started_at: Option<String>,
}

/// A numbered list entry (favorites, playlists, radio stations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub number: u32,
    pub name: String,
}

/// Request to add a share link (Spotify, Apple Music, ...) to the queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkRequest {
    pub url: String,
}

/// A queue entry with track details parsed from the command server output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub is_current: bool,
}
