//! IPC (Inter-Process Communication) system for minaret.
//!
//! Unix socket-based broadcast of kiosk view-state events to external
//! consumers. The engine pushes typed events through a non-blocking
//! channel; a background server thread fans them out to connected
//! clients.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, mpsc};

use crate::state::view::{FetchStatus, KioskView, OverlayState};

pub mod client;
pub mod events;
mod server;

use events::IpcEvent;

/// IPC notifier for sending typed events from the engine to the server.
///
/// Non-blocking sends so a slow or dead IPC thread can never stall the
/// engine tick.
pub struct IpcNotifier {
    event_sender: mpsc::Sender<IpcEvent>,
}

impl IpcNotifier {
    /// Create a new IpcNotifier and the receiver for the server thread.
    pub fn new() -> (Self, mpsc::Receiver<IpcEvent>) {
        let (event_sender, event_receiver) = mpsc::channel();
        let notifier = Self { event_sender };
        (notifier, event_receiver)
    }

    /// Broadcast the full kiosk view after any change.
    pub fn send_view_changed(&self, view: &KioskView) {
        let _ = self.event_sender.send(IpcEvent::view_changed(view.clone()));
    }

    /// Broadcast a prayer-period rollover.
    pub fn send_period_changed(&self, from: Option<String>, to: Option<String>) {
        let _ = self.event_sender.send(IpcEvent::period_changed(from, to));
    }

    /// Broadcast an overlay appearing or being dismissed.
    pub fn send_overlay_changed(&self, overlay: &OverlayState) {
        let _ = self
            .event_sender
            .send(IpcEvent::overlay_changed(overlay.clone()));
    }

    /// Broadcast one feed query's reload progress.
    pub fn send_reload_progress(&self, query: &str, status: FetchStatus) {
        let _ = self
            .event_sender
            .send(IpcEvent::reload_progress(query, status));
    }

    /// Broadcast that an announcement was dispatched.
    pub fn send_announce_started(&self, spoken: bool) {
        let _ = self.event_sender.send(IpcEvent::announce_started(spoken));
    }
}

/// IPC server that manages Unix socket connections and broadcasts events.
///
/// Runs in its own thread so socket churn never touches the engine loop.
pub struct IpcServer {
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl IpcServer {
    /// Start the IPC server in a background thread.
    pub fn start(
        event_receiver: mpsc::Receiver<IpcEvent>,
        running_flag: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<Self> {
        let running = Arc::clone(&running_flag);

        let thread_handle = std::thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || {
                if let Err(e) = Self::run(event_receiver, running, debug_enabled) {
                    log_warning!("IPC server stopped: {e:#}");
                }
            })
            .context("Failed to spawn IPC server thread")?;

        Ok(Self {
            thread_handle: Some(thread_handle),
        })
    }

    /// Wait for the server thread to finish.
    ///
    /// The running flag is controlled by the signal handler; this only
    /// joins the thread.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("IPC server thread panicked"))?;
        }

        Ok(())
    }

    fn run(
        event_receiver: mpsc::Receiver<IpcEvent>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<()> {
        let socket_path = server::socket_path().context("Failed to get IPC socket path")?;

        let socket_server = server::IpcSocketServer::new(socket_path)
            .context("Failed to create IPC socket server")?;

        socket_server
            .run(event_receiver, running, debug_enabled)
            .context("IPC socket server failed")?;

        Ok(())
    }
}
