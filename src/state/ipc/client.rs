//! IPC client utilities for connecting to a running minaret process.
//!
//! Client-side utilities for connecting to the IPC socket and receiving
//! view-state events. Used by the status command and testing.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use super::events::IpcEvent;
use super::server::socket_path;
use crate::state::view::KioskView;

/// IPC client for connecting to the minaret process.
pub struct IpcClient {
    #[allow(dead_code)]
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl IpcClient {
    /// Connect to the minaret IPC socket.
    pub fn connect() -> Result<Self> {
        let socket_path = socket_path().context("Failed to get IPC socket path")?;

        let stream = UnixStream::connect(&socket_path).with_context(|| {
            format!(
                "Failed to connect to minaret IPC socket at {:?}. Is minaret running?",
                socket_path
            )
        })?;

        // Set read timeout to prevent hanging
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set read timeout on IPC socket")?;

        let reader_stream = stream
            .try_clone()
            .context("Failed to clone stream for reader")?;
        let reader = BufReader::new(reader_stream);

        Ok(Self { stream, reader })
    }

    /// Read the current kiosk view from the server.
    ///
    /// The server replays the retained view immediately on connection, so
    /// the first `view_changed` event carries the current state. Other
    /// event types that arrive first are skipped.
    pub fn current(&mut self) -> Result<KioskView> {
        loop {
            match self.next_event()? {
                IpcEvent::ViewChanged { view } => return Ok(view),
                _ => continue,
            }
        }
    }

    /// Receive the next event from the server.
    ///
    /// Blocks until an event arrives. Used for implementing follow mode in
    /// the status command.
    pub fn next_event(&mut self) -> Result<IpcEvent> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .context("Failed to read event from IPC socket")?;

        if line.trim().is_empty() {
            return Err(anyhow::anyhow!("Connection closed by server"));
        }

        let event: IpcEvent = serde_json::from_str(line.trim())
            .with_context(|| format!("Failed to parse IPC event JSON: {}", line.trim()))?;

        Ok(event)
    }

    /// Check if a minaret process is serving the IPC socket.
    pub fn is_running() -> bool {
        if let Ok(socket_path) = socket_path()
            && socket_path.exists()
        {
            if let Ok(_stream) = UnixStream::connect(&socket_path) {
                return true;
            }
        }
        false
    }
}
