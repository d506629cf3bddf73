//! Signal handling and cross-thread messaging for minaret.
//!
//! Every worker thread (signal watcher, command channel, config watcher)
//! funnels typed messages through one mpsc channel into the engine loop;
//! workers never touch engine state directly.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crate::channel::InboundEvent;

/// Unified message type consumed by the engine loop.
#[derive(Debug, Clone)]
pub enum SignalMessage {
    /// Re-fetch all feed snapshots (SIGUSR2, config edit, or remote reload).
    Reload,
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
    /// Command pushed by the real-time channel server.
    ChannelCommand(InboundEvent),
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Atomic flag indicating if the engine should keep running
    pub running: Arc<AtomicBool>,
    /// Channel receiver for unified signal messages
    pub signal_receiver: std::sync::mpsc::Receiver<SignalMessage>,
    /// Channel sender, cloned into worker threads
    pub signal_sender: std::sync::mpsc::Sender<SignalMessage>,
}

/// Set up the signal watcher thread and the unified message channel.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("Failed to register signal handlers")?;

    let running_clone = Arc::clone(&running);
    let signal_sender_clone = signal_sender.clone();

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                match sig {
                    SIGUSR2 => {
                        if debug_enabled {
                            log_pipe!();
                            log_debug!("Received SIGUSR2, requesting snapshot reload");
                        }
                        if let Err(e) = signal_sender_clone.send(SignalMessage::Reload) {
                            log_warning!("Failed to forward reload signal: {e}");
                        }
                    }
                    _ => {
                        let user_message = match sig {
                            SIGINT => "Received interrupt signal, initiating graceful shutdown...",
                            SIGTERM => {
                                "Received termination request, initiating graceful shutdown..."
                            }
                            SIGHUP => "Received hangup signal, initiating graceful shutdown...",
                            _ => "Received shutdown signal, initiating graceful shutdown...",
                        };
                        log_pipe!();
                        log_info!("{}", user_message);

                        if let Err(e) = signal_sender_clone.send(SignalMessage::Shutdown) {
                            log_warning!("Failed to send shutdown message: {e}");
                        }
                        running_clone.store(false, Ordering::SeqCst);

                        // Keep the thread alive so repeated signals during
                        // shutdown are drained rather than killing the process.
                    }
                }
            }
        })
        .context("Failed to spawn signal watcher thread")?;

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
