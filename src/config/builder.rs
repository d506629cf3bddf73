//! Configuration file building and default config creation.
//!
//! Writes the commented first-run template and keeps its columns aligned
//! through a small builder.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::loading::display_path;
use crate::constants::*;

/// Create a default config file at `path`.
pub fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let config_content = ConfigBuilder::new()
        .add_section("Feed")
        .add_setting(
            "feed_dir",
            &format!("\"{}\"", super::loading::default_feed_dir().display()),
            "Directory holding the JSON snapshot documents",
        )
        .add_section("Command channel")
        .add_setting(
            "#channel_address",
            "\"127.0.0.1:4455\"",
            "Command server host:port (uncomment to enable)",
        )
        .add_setting(
            "channel_retry_limit",
            &DEFAULT_CHANNEL_RETRY_LIMIT.to_string(),
            "Reconnect attempts before giving up (1+)",
        )
        .add_setting(
            "channel_retry_delay_ms",
            &DEFAULT_CHANNEL_RETRY_DELAY_MS.to_string(),
            "Fixed backoff between attempts (100-60000)ms",
        )
        .add_section("Locale")
        .add_setting(
            "#timezone",
            "\"America/New_York\"",
            "IANA zone name, warned about when it differs from the system zone",
        )
        .add_section("Playback")
        .add_setting(
            "speech_command",
            &format!("\"{DEFAULT_SPEECH_COMMAND}\""),
            "Speech synthesis command line",
        )
        .add_setting(
            "player_command",
            &format!("\"{DEFAULT_PLAYER_COMMAND}\""),
            "Audio player command line",
        )
        .add_setting(
            "#mixer_command",
            "\"amixer\"",
            "Volume control command (uncomment to enable)",
        )
        .add_setting(
            "speech_wpm",
            &DEFAULT_SPEECH_WPM.to_string(),
            "Assumed speech rate for duration estimates (50-500)",
        )
        .add_section("Display")
        .add_setting(
            "ticker_fallback",
            &format!("\"{DEFAULT_TICKER_FALLBACK}\""),
            "Ticker line shown when no segments are published",
        )
        .add_setting(
            "page_duration_secs",
            &DEFAULT_PAGE_DURATION_SECS.to_string(),
            "Default secondary page dwell (1-600)s",
        )
        .add_setting(
            "notice_toggle_secs",
            &DEFAULT_NOTICE_TOGGLE_SECS.to_string(),
            "Schedule grid / change notice alternation (1-600)s",
        )
        .add_setting(
            "announce_overlay_secs",
            &DEFAULT_ANNOUNCE_OVERLAY_SECS.to_string(),
            "Announcement overlay dwell (1-120)s",
        )
        .add_setting(
            "iqamah_alert_window_secs",
            &DEFAULT_IQAMAH_ALERT_WINDOW_SECS.to_string(),
            "Iqamah countdown overlay window (5-600)s",
        )
        .add_setting(
            "reload_grace_ms",
            &DEFAULT_RELOAD_GRACE_MS.to_string(),
            "Overlay grace delay after a successful reload (0-10000)ms",
        )
        .build();

    fs::write(path, config_content + "\n").context("Failed to write default configuration")?;

    log_block_start!("Created default configuration file");
    log_indented!("{}", display_path(path));

    Ok(())
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

#[derive(Clone)]
struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

#[derive(Clone)]
enum EntryType {
    Section,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{key} = {value}");
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        // Align comments one column past the widest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn default_template_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minaret.toml");
        create_default_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("#[Feed]"));
        assert!(content.contains("speech_command"));
        // Channel stays commented out by default
        assert!(content.contains("#channel_address"));

        let config: Config = toml::from_str(&content).unwrap();
        assert!(config.channel_address.is_none());
        assert_eq!(config.speech_wpm(), DEFAULT_SPEECH_WPM);
        assert_eq!(config.page_duration_secs(), DEFAULT_PAGE_DURATION_SECS);
    }

    #[test]
    fn builder_aligns_comments() {
        let content = ConfigBuilder::new()
            .add_section("One")
            .add_setting("a", "1", "first")
            .add_setting("long_key", "2", "second")
            .build();

        let lines: Vec<&str> = content.lines().collect();
        let first_hash = lines[1].find('#').unwrap();
        let second_hash = lines[2].find('#').unwrap();
        assert_eq!(first_hash, second_hash);
    }
}
