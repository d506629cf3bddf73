//! Configuration system for minaret.
//!
//! TOML-based configuration management: file loading with a custom
//! directory override, default template generation on first run,
//! post-load validation, and hot reload via a file watcher.
//!
//! ## Configuration Structure
//!
//! ```toml
//! #[Feed]
//! feed_dir = "~/.local/share/minaret/feed"  # Snapshot documents directory
//!
//! #[Command channel]
//! channel_address = "127.0.0.1:4455"  # Command server (omit to disable)
//! channel_retry_limit = 5             # Reconnect attempts before giving up
//! channel_retry_delay_ms = 3000       # Fixed backoff between attempts
//!
//! #[Locale]
//! timezone = "America/New_York"       # IANA zone name (warning on mismatch)
//!
//! #[Playback]
//! speech_command = "espeak-ng"        # Speech synthesis command line
//! player_command = "mpv"              # Audio player command line
//! mixer_command = "amixer"            # Volume control (omit to disable)
//! speech_wpm = 200                    # Assumed speech rate for duration estimates
//!
//! #[Display]
//! ticker_fallback = "..."             # Ticker line when no segments published
//! page_duration_secs = 10             # Default secondary page dwell
//! notice_toggle_secs = 10             # Schedule grid / change notice alternation
//! announce_overlay_secs = 5           # Announcement overlay dwell
//! iqamah_alert_window_secs = 30       # Iqamah countdown overlay window
//! reload_grace_ms = 1200              # Overlay grace delay after a reload
//! ```
//!
//! All fields are optional; absent values take the defaults above.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::constants::*;

pub mod builder;
pub mod loading;
mod validation;
pub mod watcher;

pub use loading::{get_config_path, get_custom_config_dir, set_config_dir};
pub use watcher::ConfigWatcher;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Directory holding the JSON snapshot documents
    pub feed_dir: Option<String>,
    /// host:port of the command server; channel disabled when absent
    pub channel_address: Option<String>,
    pub channel_retry_limit: Option<u32>,
    pub channel_retry_delay_ms: Option<u64>,
    /// IANA timezone name, validated against chrono-tz
    pub timezone: Option<String>,
    pub speech_command: Option<String>,
    pub player_command: Option<String>,
    pub mixer_command: Option<String>,
    pub speech_wpm: Option<u32>,
    pub ticker_fallback: Option<String>,
    pub page_duration_secs: Option<u64>,
    pub notice_toggle_secs: Option<u64>,
    pub announce_overlay_secs: Option<u64>,
    pub iqamah_alert_window_secs: Option<i64>,
    pub reload_grace_ms: Option<u64>,
}

impl Config {
    /// Load configuration using automatic path detection,
    /// creating a default file on first run.
    pub fn load() -> Result<Self> {
        loading::load()
    }

    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        loading::load_from_path(path)
    }

    pub fn feed_dir(&self) -> PathBuf {
        match self.feed_dir.as_deref() {
            Some(dir) => loading::expand_tilde(dir),
            None => loading::default_feed_dir(),
        }
    }

    pub fn channel_retry_limit(&self) -> u32 {
        self.channel_retry_limit
            .unwrap_or(DEFAULT_CHANNEL_RETRY_LIMIT)
    }

    pub fn channel_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.channel_retry_delay_ms
                .unwrap_or(DEFAULT_CHANNEL_RETRY_DELAY_MS),
        )
    }

    pub fn speech_command(&self) -> String {
        self.speech_command
            .clone()
            .unwrap_or_else(|| DEFAULT_SPEECH_COMMAND.to_string())
    }

    pub fn player_command(&self) -> String {
        self.player_command
            .clone()
            .unwrap_or_else(|| DEFAULT_PLAYER_COMMAND.to_string())
    }

    pub fn speech_wpm(&self) -> u32 {
        self.speech_wpm.unwrap_or(DEFAULT_SPEECH_WPM)
    }

    pub fn ticker_fallback(&self) -> String {
        self.ticker_fallback
            .clone()
            .unwrap_or_else(|| DEFAULT_TICKER_FALLBACK.to_string())
    }

    pub fn page_duration_secs(&self) -> u64 {
        self.page_duration_secs.unwrap_or(DEFAULT_PAGE_DURATION_SECS)
    }

    pub fn notice_toggle_secs(&self) -> u64 {
        self.notice_toggle_secs.unwrap_or(DEFAULT_NOTICE_TOGGLE_SECS)
    }

    pub fn announce_overlay_secs(&self) -> u64 {
        self.announce_overlay_secs
            .unwrap_or(DEFAULT_ANNOUNCE_OVERLAY_SECS)
    }

    pub fn iqamah_alert_window_secs(&self) -> i64 {
        self.iqamah_alert_window_secs
            .unwrap_or(DEFAULT_IQAMAH_ALERT_WINDOW_SECS)
    }

    pub fn reload_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reload_grace_ms.unwrap_or(DEFAULT_RELOAD_GRACE_MS))
    }

    /// Log the loaded configuration in the startup block.
    pub fn log_config(&self, debug_enabled: bool) {
        log_block_start!("Loaded configuration");
        log_indented!("Feed directory: {}", self.feed_dir().display());
        match &self.channel_address {
            Some(address) => {
                log_indented!("Command channel: {}", address);
                log_indented!(
                    "Channel retry: {} attempts, {}ms delay",
                    self.channel_retry_limit(),
                    self.channel_retry_delay().as_millis()
                );
            }
            None => log_indented!("Command channel: disabled"),
        }
        if let Some(tz) = &self.timezone {
            log_indented!("Timezone: {}", tz);
        }
        log_indented!(
            "Playback: speech '{}' ({} wpm), player '{}'",
            self.speech_command(),
            self.speech_wpm(),
            self.player_command()
        );
        match &self.mixer_command {
            Some(mixer) => log_indented!("Mixer: {}", mixer),
            None => log_indented!("Mixer: disabled"),
        }

        if debug_enabled {
            log_indented!("Page duration: {}s", self.page_duration_secs());
            log_indented!("Notice toggle: {}s", self.notice_toggle_secs());
            log_indented!("Announce overlay: {}s", self.announce_overlay_secs());
            log_indented!("Iqamah alert window: {}s", self.iqamah_alert_window_secs());
            log_indented!("Reload grace: {}ms", self.reload_grace().as_millis());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.channel_retry_limit(), 5);
        assert_eq!(config.channel_retry_delay().as_millis(), 3000);
        assert_eq!(config.speech_command(), "espeak-ng");
        assert_eq!(config.player_command(), "mpv");
        assert_eq!(config.speech_wpm(), 200);
        assert_eq!(config.page_duration_secs(), 10);
        assert_eq!(config.notice_toggle_secs(), 10);
        assert_eq!(config.announce_overlay_secs(), 5);
        assert_eq!(config.iqamah_alert_window_secs(), 30);
        assert_eq!(config.reload_grace().as_millis(), 1200);
        assert!(config.channel_address.is_none());
        assert!(config.mixer_command.is_none());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            feed_dir = "/var/lib/minaret/feed"
            channel_address = "127.0.0.1:4455"
            speech_wpm = 170
            iqamah_alert_window_secs = 45
            "#,
        )
        .unwrap();
        assert_eq!(config.feed_dir(), PathBuf::from("/var/lib/minaret/feed"));
        assert_eq!(config.channel_address.as_deref(), Some("127.0.0.1:4455"));
        assert_eq!(config.speech_wpm(), 170);
        assert_eq!(config.iqamah_alert_window_secs(), 45);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let config: Config = toml::from_str("legacy_field = true").unwrap();
        assert!(config.feed_dir.is_none());
    }
}
