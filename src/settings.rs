use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::persist::{read_json, write_json};

/// Application settings stored as JSON in the data directory.
///
/// Every field has a default so a partially-written or older settings file
/// still loads. CLI flags override individual fields after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    /// Address the web API binds to.
    pub host: String,
    pub port: u16,

    /// Directory holding macros and other persisted state.
    pub data_dir: PathBuf,

    /// Port the supervised soco-cli HTTP API server listens on.
    pub bridge_port: u16,
    /// Executable launched by the process supervisor.
    pub bridge_executable: PathBuf,

    /// Default per-command timeout in seconds. Long-running actions (seek,
    /// queue imports) get a larger caller-supplied timeout.
    pub command_timeout_secs: u64,

    /// Local hour (0-23) at which the library cache refreshes daily.
    /// 0 disables scheduled refreshes.
    pub library_refresh_hour: u32,

    /// Upgrade priority ring: 0 = canary (immediate), 1-3 = staged rollout.
    /// Read by the external upgrade tooling, not by this service.
    pub upgrade_ring: u8,
    /// Local hour (0-23) at which the external upgrade tooling checks.
    pub upgrade_check_hour: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            bridge_port: 8001,
            bridge_executable: PathBuf::from("sonos-http-api-server"),
            command_timeout_secs: 10,
            library_refresh_hour: 3,
            upgrade_ring: 3,
            upgrade_check_hour: 4,
        }
    }
}

impl AppSettings {
    /// URL of the supervised command server.
    pub fn bridge_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.bridge_port)
    }
}

/// Load settings from `data_dir`, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_or_default(data_dir: &Path) -> AppSettings {
    let path = crate::paths::settings_path(data_dir);
    if !path.exists() {
        let mut settings = AppSettings::default();
        settings.data_dir = data_dir.to_path_buf();
        return settings;
    }
    match read_json::<AppSettings>(&path) {
        Ok(mut settings) => {
            settings.data_dir = data_dir.to_path_buf();
            settings
        }
        Err(e) => {
            log::warn!("failed to read {}: {e}; using defaults", path.display());
            let mut settings = AppSettings::default();
            settings.data_dir = data_dir.to_path_buf();
            settings
        }
    }
}

/// Save settings to the data directory (atomic write).
pub fn save_settings(settings: &AppSettings) -> Result<(), AppError> {
    std::fs::create_dir_all(&settings.data_dir)?;
    write_json(&crate::paths::settings_path(&settings.data_dir), settings)
}
