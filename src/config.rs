//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the mirror-service
//! registry plus timing constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Override for the default mirror's landing page URL
    pub mirror_base_url: Option<String>,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit path to the Chrome/Chromium binary; autodetected when unset
    pub chrome_path: Option<String>,

    /// Bound for landing-page load and input-control waits, in seconds
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Bound for the post-submission success-element wait, in seconds
    #[serde(default = "default_submission_timeout_secs")]
    pub submission_timeout_secs: u64,

    /// Directory for ephemeral downloaded media files
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Fixed path for the diagnostic screenshot, overwritten on each failure
    #[serde(default = "default_screenshot_path")]
    pub screenshot_path: PathBuf,
}

const fn default_headless() -> bool {
    true
}

const fn default_navigation_timeout_secs() -> u64 {
    30
}

const fn default_submission_timeout_secs() -> u64 {
    60
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("diagnostics/last_failure.png")
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: the token is also accepted under the name the original
        // deployment used.
        if settings.telegram_token.is_empty() {
            if let Ok(val) = std::env::var("TELEGRAM_BOT_TOKEN") {
                if !val.is_empty() {
                    settings.telegram_token = val;
                }
            }
        }

        Ok(settings)
    }
}

/// Navigation and extraction rules for one mirror/unlock service.
///
/// Re-pointing the bot at a different mirror is a configuration change:
/// selectors and class markers live here, never in the session code.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Registry identifier
    pub id: &'static str,
    /// Landing page of the mirror service; also the base for relative hrefs
    pub base_url: String,
    /// CSS selector of the link input control
    pub input_selector: String,
    /// CSS selector of the form submit control
    pub submit_selector: String,
    /// Class marker of the avatar image carrying title/thumbnail
    pub avatar_marker: String,
    /// Class marker of the success link carrying the video URL
    pub success_marker: String,
    /// Output format of the mirror service; no sniffing needed
    pub mime_type: String,
}

/// Ordered registry of mirror services, built once at startup.
///
/// The first entry is the default. This replaces implicit registration
/// side effects with an explicit, ordered mapping.
#[derive(Debug, Clone)]
pub struct MirrorRegistry {
    mirrors: Vec<MirrorConfig>,
}

impl MirrorRegistry {
    /// Build the registry of known mirrors, applying settings overrides.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let mut mirrors = vec![snaptik()];
        if let Some(base) = settings.mirror_base_url.as_ref() {
            mirrors[0].base_url.clone_from(base);
        }
        Self { mirrors }
    }

    /// The default mirror (first registered).
    #[must_use]
    pub fn default_mirror(&self) -> &MirrorConfig {
        &self.mirrors[0]
    }

    /// Look up a mirror by its identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MirrorConfig> {
        self.mirrors.iter().find(|m| m.id == id)
    }
}

fn snaptik() -> MirrorConfig {
    MirrorConfig {
        id: "snaptik",
        base_url: "https://snaptik.app".to_string(),
        input_selector: "input[name=\"url\"]".to_string(),
        submit_selector: "button[type=\"submit\"]".to_string(),
        avatar_marker: "avatar".to_string(),
        success_marker: "success".to_string(),
        mime_type: "video/mp4".to_string(),
    }
}

/// Default caption when the extracted descriptor has no title
pub const DEFAULT_VIDEO_CAPTION: &str = "Video";
/// Reply for the direct-message path when resolution fails
pub const CANNOT_LOAD_NOTICE: &str = "Cannot load this video, sorry.";
/// Placeholder edit for the inline path when no video was found
pub const NO_VIDEO_NOTICE: &str = "No video found for this link.";

// Telegram API retry configuration
/// Initial backoff delay for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retry attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            mirror_base_url: None,
            headless: true,
            chrome_path: None,
            navigation_timeout_secs: 30,
            submission_timeout_secs: 60,
            download_dir: default_download_dir(),
            screenshot_path: default_screenshot_path(),
        }
    }

    #[test]
    fn test_registry_default_is_snaptik() {
        let registry = MirrorRegistry::from_settings(&test_settings());
        let mirror = registry.default_mirror();
        assert_eq!(mirror.id, "snaptik");
        assert_eq!(mirror.base_url, "https://snaptik.app");
        assert_eq!(mirror.mime_type, "video/mp4");
        assert!(registry.get("snaptik").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_registry_base_url_override() {
        let mut settings = test_settings();
        settings.mirror_base_url = Some("https://mirror.example".to_string());
        let registry = MirrorRegistry::from_settings(&settings);
        assert_eq!(registry.default_mirror().base_url, "https://mirror.example");
        // The override re-points the existing mirror rather than adding one
        assert_eq!(registry.default_mirror().id, "snaptik");
    }
}
