//! Application runner that wires the daemon together.
//!
//! Builds every subsystem in dependency order (config, lock, signals,
//! watcher, IPC, channel, playback), hands them to the engine, and tears
//! everything down cleanly when the engine loop returns.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::channel::Channel;
use crate::config::Config;
use crate::engine::{Engine, EngineParams};
use crate::feed::file::FileFeed;
use crate::playback::PlaybackService;
use crate::playback::volume::{MixerVolume, NoopVolume, VolumeControl};
use crate::signals::setup_signal_handler;
use crate::state::ipc::{IpcNotifier, IpcServer};
use crate::time_source::RealTimeSource;

/// Builder-style runner for the kiosk daemon.
pub struct Minaret {
    debug_enabled: bool,
    show_headers: bool,
}

impl Minaret {
    /// Create a new runner with defaults matching a normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            show_headers: true,
        }
    }

    /// Skip header display (used when a command already printed them)
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Execute the daemon with the configured settings.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        // Commands like simulate install their own source first
        if !crate::time_source::is_initialized() {
            crate::time_source::init_time_source(Arc::new(RealTimeSource));
        }

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(crate::constants::EXIT_FAILURE);
            }
        };

        // Single-instance enforcement before any worker threads exist
        let (lock_file, lock_path) = crate::io::lock::acquire_lock()?;

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        // Config file watcher for hot reload (optional, degrades gracefully)
        let watcher = crate::config::watcher::ConfigWatcher::new(
            signal_state.signal_sender.clone(),
            self.debug_enabled,
        );
        if let Err(e) = watcher.start()
            && self.debug_enabled
        {
            log_pipe!();
            log_warning!("Config file watching unavailable: {e}");
            log_indented!("Hot config reload disabled, use SIGUSR2 for manual reload");
        }

        config.log_config(self.debug_enabled);

        // IPC view broadcast for the status command and display frontends
        let (notifier, event_receiver) = IpcNotifier::new();
        let ipc_server = match IpcServer::start(
            event_receiver,
            Arc::clone(&signal_state.running),
            self.debug_enabled,
        ) {
            Ok(server) => Some(server),
            Err(e) => {
                log_pipe!();
                log_warning!("IPC server unavailable: {e:#}");
                log_indented!("'minaret status' will not work for this run");
                None
            }
        };

        // Real-time command channel, only when an address is configured
        let channel = config.channel_address.clone().map(|address| {
            log_block_start!("Connecting command channel: {address}");
            Channel::start(
                address,
                config.channel_retry_limit(),
                config.channel_retry_delay(),
                signal_state.signal_sender.clone(),
                self.debug_enabled,
            )
        });
        let channel_link = channel.as_ref().map(|c| c.link());

        let volume: Box<dyn VolumeControl> = match config.mixer_command.clone() {
            Some(cmd) => Box::new(MixerVolume::new(cmd)),
            None => Box::new(NoopVolume),
        };
        let playback = PlaybackService::new(
            config.speech_command(),
            config.player_command(),
            config.speech_wpm(),
            volume,
        );

        let feed = Box::new(FileFeed::new(config.feed_dir()));

        let mut engine = Engine::new(EngineParams {
            config,
            signal_state,
            feed,
            playback,
            channel_link,
            ipc: Some(notifier),
            debug_enabled: self.debug_enabled,
        });

        let result = engine.run();

        // Engine has returned; make sure every worker thread sees the stop
        // flag even when the exit came from the simulation window ending.
        engine.running_flag().store(false, Ordering::SeqCst);

        if let Some(channel) = channel {
            channel.shutdown();
        }
        if let Some(server) = ipc_server
            && let Err(e) = server.shutdown()
        {
            log_warning!("IPC server shutdown: {e:#}");
        }

        drop(lock_file);
        if let Err(e) = std::fs::remove_file(&lock_path) {
            if self.debug_enabled {
                log_debug!("Could not remove lock file {lock_path}: {e}");
            }
        } else if self.debug_enabled {
            log_debug!("Removed lock file: {lock_path}");
        }

        log_end!();
        result
    }
}
