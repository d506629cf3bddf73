//! Unix socket server implementation for minaret IPC.
//!
//! Low-level Unix domain socket server that accepts client connections and
//! broadcasts view-state events as JSON lines. Broadcast-only protocol:
//! clients never send data, so a successful read doubles as a liveness
//! probe.

use anyhow::{Context, Result};
use nix::unistd::getuid;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use crate::state::ipc::events::IpcEvent;
use crate::state::view::KioskView;

/// Unix socket server for handling IPC client connections.
pub struct IpcSocketServer {
    socket_path: PathBuf,
    listener: UnixListener,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    /// Last full view, replayed to new clients on connect.
    current_view: Option<KioskView>,
}

/// Represents a connected IPC client.
struct ClientConnection {
    raw_stream: UnixStream,
    writer: BufWriter<UnixStream>,
    connected_at: Instant,
}

impl IpcSocketServer {
    /// Create a new IPC socket server bound at `socket_path`.
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        // Non-blocking so the server loop can interleave accepts with
        // event broadcasting.
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking mode")?;

        Ok(Self {
            socket_path,
            listener,
            clients: HashMap::new(),
            next_client_id: 1,
            current_view: None,
        })
    }

    /// Run the main server loop until the shutdown flag clears.
    pub fn run(
        mut self,
        event_receiver: mpsc::Receiver<IpcEvent>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<()> {
        if debug_enabled {
            log_debug!("IPC server starting on socket: {:?}", self.socket_path);
        }

        while running.load(Ordering::SeqCst) {
            // Drain pending events from the engine (non-blocking)
            while let Ok(event) = event_receiver.try_recv() {
                self.update_state(event, debug_enabled)?;
            }

            self.accept(debug_enabled)?;
            self.prune_clients(debug_enabled);

            thread::sleep(Duration::from_millis(10));
        }

        if debug_enabled {
            log_debug!("IPC server shutting down");
        }

        self.cleanup()?;
        Ok(())
    }

    /// Update the retained view and broadcast the event to all clients.
    fn update_state(&mut self, event: IpcEvent, debug_enabled: bool) -> Result<()> {
        if let IpcEvent::ViewChanged { ref view } = event {
            self.current_view = Some(view.clone());
        }

        self.broadcast_event(&event, debug_enabled)
    }

    /// Broadcast an IpcEvent to all connected clients.
    fn broadcast_event(&mut self, event: &IpcEvent, debug_enabled: bool) -> Result<()> {
        let json_line =
            serde_json::to_string(event).context("Failed to serialize IpcEvent to JSON")?;
        let message = format!("{}\n", json_line);

        let mut failed_clients = Vec::new();

        for (client_id, client) in &mut self.clients {
            if client.writer.write_all(message.as_bytes()).is_err()
                || client.writer.flush().is_err()
            {
                failed_clients.push(*client_id);
            }
        }

        for client_id in failed_clients {
            self.drop_client(client_id, debug_enabled);
        }

        Ok(())
    }

    /// Accept new client connections (non-blocking).
    fn accept(&mut self, debug_enabled: bool) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    let client_id = self.next_client_id;
                    self.next_client_id += 1;

                    stream
                        .set_nonblocking(true)
                        .context("Failed to set client stream to non-blocking mode")?;

                    let writer_stream = stream
                        .try_clone()
                        .context("Failed to clone stream for writer")?;

                    let mut client = ClientConnection {
                        raw_stream: stream,
                        writer: BufWriter::new(writer_stream),
                        connected_at: Instant::now(),
                    };

                    // Replay the current view so one-shot `status` clients
                    // never have to wait for the next change.
                    if let Some(ref view) = self.current_view {
                        let event = IpcEvent::view_changed(view.clone());
                        let json_line = serde_json::to_string(&event)
                            .context("Failed to serialize current view for new client")?;
                        let message = format!("{}\n", json_line);

                        if let Err(e) = client.writer.write_all(message.as_bytes()) {
                            if debug_enabled {
                                log_debug!(
                                    "Failed to send current view to client {}: {}",
                                    client_id,
                                    e
                                );
                            }
                            continue;
                        }
                        if let Err(e) = client.writer.flush() {
                            if debug_enabled {
                                log_debug!(
                                    "Failed to flush current view to client {}: {}",
                                    client_id,
                                    e
                                );
                            }
                            continue;
                        }
                    }

                    self.clients.insert(client_id, client);
                    if debug_enabled {
                        log_debug!("IPC connections: {}", self.clients.len());
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    break;
                }
                Err(e) => {
                    if debug_enabled {
                        log_debug!("Error accepting client connection: {}", e);
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Remove disconnected clients by attempting to read from them.
    ///
    /// Clients never send data in this protocol, so read() returning 0 or a
    /// connection error marks the client dead.
    fn prune_clients(&mut self, debug_enabled: bool) {
        use std::io::Read;
        let mut disconnected = Vec::new();

        for (client_id, client) in &mut self.clients {
            let mut buffer = [0u8; 1];
            match client.raw_stream.read(&mut buffer) {
                Ok(0) => {
                    disconnected.push(*client_id);
                }
                Ok(_) => {
                    // Unexpected data; keep the connection alive
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::ConnectionReset
                        || e.kind() == std::io::ErrorKind::BrokenPipe =>
                {
                    disconnected.push(*client_id);
                }
                Err(_) => {
                    disconnected.push(*client_id);
                }
            }
        }

        for client_id in disconnected {
            self.drop_client(client_id, debug_enabled);
        }
    }

    fn drop_client(&mut self, client_id: u32, debug_enabled: bool) {
        if let Some(client) = self.clients.remove(&client_id)
            && debug_enabled
        {
            let duration = client.connected_at.elapsed();
            if duration.as_secs() < 2 {
                log_debug!(
                    "IPC one-shot client served ({}ms) - connections: {}",
                    duration.as_millis(),
                    self.clients.len()
                );
            } else {
                log_debug!(
                    "IPC client disconnected after {}s - connections: {}",
                    duration.as_secs(),
                    self.clients.len()
                );
            }
        }
    }

    /// Clean up server resources on shutdown.
    fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove socket file: {:?}", self.socket_path))?;
        }
        Ok(())
    }
}

/// Get the socket path for the IPC server.
///
/// Primary: `$XDG_RUNTIME_DIR/minaret/minaret.sock`
/// Fallback: `/run/user/{uid}/minaret/minaret.sock`
pub fn socket_path() -> Result<PathBuf> {
    let runtime_dir = if let Ok(xdg_runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime_dir)
    } else {
        let uid = getuid();
        PathBuf::from(format!("/run/user/{}", uid))
    };

    Ok(runtime_dir.join("minaret").join("minaret.sock"))
}
