//! File watching for hot config reloading.
//!
//! Monitors minaret.toml and triggers the same reload path as SIGUSR2 when
//! it changes, so edits apply without a manual signal.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use super::loading::display_path;
use crate::signals::SignalMessage;

/// Debounce duration for file change events (in milliseconds).
/// Editors often write files in multiple steps; one reload covers them.
const DEBOUNCE_MS: u64 = 500;

/// Configuration file watcher that monitors for changes and triggers reloads.
pub struct ConfigWatcher {
    /// Channel sender for sending reload messages to the engine loop
    signal_sender: Sender<SignalMessage>,
    /// Whether debug logging is enabled
    debug_enabled: bool,
}

impl ConfigWatcher {
    pub fn new(signal_sender: Sender<SignalMessage>, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            debug_enabled,
        }
    }

    /// Start watching the configuration file for changes.
    ///
    /// Spawns a background thread that owns the notify watcher and sends
    /// reload messages when the file content actually changes.
    pub fn start(self) -> Result<()> {
        let config_path = super::loading::get_config_path()?;

        if !config_path.exists() {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("No configuration file found to watch for hot reload");
            }
            return Ok(());
        }

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Watching configuration for hot reload:");
            log_indented!("{}", display_path(&config_path));
        }

        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                            let _ = tx.send(event);
                        }
                        _ => {}
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        // Watch the parent directory rather than the file itself; editors
        // commonly replace the file, which drops a direct file watch.
        let watch_dir = config_path
            .parent()
            .map(PathBuf::from)
            .context("Config file has no parent directory")?;
        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", watch_dir.display()))?;

        let signal_sender = self.signal_sender;
        let debug_enabled = self.debug_enabled;

        thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                // Keep the watcher alive by moving it into the thread
                let _watcher = watcher;
                let mut last_reload_time = std::time::Instant::now();
                let mut last_content = std::fs::read_to_string(&config_path).ok();

                for event in rx {
                    let affects_config = event.paths.iter().any(|event_path| {
                        event_path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .map(|name| name == "minaret.toml" || name.starts_with("minaret.toml"))
                            .unwrap_or(false)
                    });

                    if !affects_config {
                        continue;
                    }

                    let elapsed = last_reload_time.elapsed();
                    if elapsed < Duration::from_millis(DEBOUNCE_MS) {
                        continue;
                    }

                    // Skip metadata-only events that left the content alone
                    let current_content = std::fs::read_to_string(&config_path).ok();
                    if current_content == last_content {
                        continue;
                    }
                    last_content = current_content;
                    last_reload_time = std::time::Instant::now();

                    if debug_enabled {
                        log_pipe!();
                        log_info!("Configuration file change detected");
                    }

                    if signal_sender.send(SignalMessage::Reload).is_err() {
                        // Engine is gone; stop watching
                        return;
                    }
                }
            })
            .context("Failed to spawn config watcher thread")?;

        Ok(())
    }
}
