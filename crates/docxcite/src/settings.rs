/*
 * settings.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Persisted user settings: Zotero credentials and the citation style.
 */

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docxcite_core::Credentials;

/// Current settings format version.
pub const CURRENT_SETTINGS_VERSION: u32 = 1;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to parse settings: {0}")]
    Parse(String),

    #[error("Settings version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("No configuration directory available; pass --settings")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// User settings stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Settings format version (for migrations)
    pub version: u32,

    /// Whitespace-separated Zotero user ids.
    #[serde(default)]
    pub user_ids: String,

    /// Whitespace-separated Zotero group ids.
    #[serde(default)]
    pub group_ids: String,

    #[serde(default)]
    pub api_key: String,

    /// Path or URL of a CSL style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_SETTINGS_VERSION,
            user_ids: String::new(),
            group_ids: String::new(),
            api_key: String::new(),
            style: None,
        }
    }
}

impl Settings {
    /// `settings.json` in the user's configuration directory.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("docxcite").join(SETTINGS_FILE))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load settings, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))?;

        if settings.version > CURRENT_SETTINGS_VERSION {
            return Err(SettingsError::VersionTooNew {
                found: settings.version,
                supported: CURRENT_SETTINGS_VERSION,
            });
        }
        if settings.version < CURRENT_SETTINGS_VERSION {
            warn!(
                old_version = settings.version,
                new_version = CURRENT_SETTINGS_VERSION,
                "Settings version upgrade needed (not yet implemented)"
            );
        }

        Ok(settings)
    }

    /// Save settings, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        fs::write(path, content)?;
        debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user_ids, &self.group_ids, self.api_key.clone())
    }

    /// The API key with all but its last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let visible = chars.len().min(4);
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}
