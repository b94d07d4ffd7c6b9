//! Centralized path definitions for the data directory.
//!
//! This module is the single source of truth for leaf filenames and
//! path-building functions. No other module should hard-code these strings.

use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const MACROS_FILE: &str = "macros.txt";
pub const MACROS_METADATA_FILE: &str = "macros-metadata.json";

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

pub fn macros_path(data_dir: &Path) -> PathBuf {
    data_dir.join(MACROS_FILE)
}

pub fn macros_metadata_path(data_dir: &Path) -> PathBuf {
    data_dir.join(MACROS_METADATA_FILE)
}
