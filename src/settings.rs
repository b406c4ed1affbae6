use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DB_FILE: &str = "ofxbook.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Log every SQL statement under the `ofxbook::sql` target.
    #[serde(default)]
    pub echo_sql: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            echo_sql: false,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

const APP_DIR: &str = "ofxbook";

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn settings_path() -> PathBuf {
    home().join(".config").join(APP_DIR).join("settings.json")
}

/// The platform documents folder when one is configured, else `~/Documents`.
fn default_data_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| home().join("Documents"))
        .join(APP_DIR)
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// Settings stored at `path`; defaults when the file is absent or corrupt.
pub fn load_settings_from(path: &Path) -> Settings {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Settings::default();
    };
    serde_json::from_str(&content)
        .inspect_err(|e| log::warn!("ignoring unreadable {}: {e}", path.display()))
        .unwrap_or_default()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| Error::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Database to open: an explicit `--db` path wins over settings.
pub fn resolve_db_path(db: Option<&str>, settings: &Settings) -> PathBuf {
    match db {
        Some(path) => PathBuf::from(shellexpand_path(path)),
        None => settings.db_path(),
    }
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
