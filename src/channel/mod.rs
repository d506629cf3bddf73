//! Real-time command channel.
//!
//! Maintains one persistent TCP connection to the command server with
//! bounded reconnection. A dedicated reader thread parses newline-delimited
//! JSON events and forwards them into the engine's message channel; the
//! engine sends acknowledgements back through a [`ChannelLink`] that shares
//! the live socket. Transport failures are retried with a fixed backoff and
//! surfaced only as logs.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;

pub mod events;

pub use events::{Ack, AckStatus, AnnouncePayload, InboundEvent, OutboundEvent};

use crate::signals::SignalMessage;

/// Poll granularity for the reader thread's shutdown checks.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("command channel is not connected")]
    NotConnected,

    #[error("failed to write to command channel: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to encode channel event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Shared handle to the live socket, used by the engine to send
/// acknowledgements while the reader thread owns the read half.
#[derive(Clone, Default)]
pub struct ChannelLink {
    stream: Arc<Mutex<Option<TcpStream>>>,
}

impl ChannelLink {
    /// Send one outbound event as a JSON line. Fails with
    /// [`ChannelError::NotConnected`] when no connection is up; callers
    /// log and move on.
    pub fn send(&self, event: &OutboundEvent) -> Result<(), ChannelError> {
        let mut guard = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        let stream = guard.as_mut().ok_or(ChannelError::NotConnected)?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn attach(&self, stream: TcpStream) {
        *self.stream.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    }

    fn detach(&self) {
        let mut guard = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stream) = guard.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// The channel component: reader thread plus the shared link.
pub struct Channel {
    running: Arc<AtomicBool>,
    link: ChannelLink,
    handle: Option<thread::JoinHandle<()>>,
}

impl Channel {
    /// Connect to `address` and start the reader thread. Inbound commands
    /// are forwarded to `sender` as [`SignalMessage::ChannelCommand`].
    pub fn start(
        address: String,
        retry_limit: u32,
        retry_delay: Duration,
        sender: Sender<SignalMessage>,
        debug_enabled: bool,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let link = ChannelLink::default();

        let thread_running = Arc::clone(&running);
        let thread_link = link.clone();
        let handle = thread::Builder::new()
            .name("channel-reader".to_string())
            .spawn(move || {
                reader_loop(
                    &address,
                    retry_limit,
                    retry_delay,
                    &sender,
                    &thread_running,
                    &thread_link,
                    debug_enabled,
                );
            })
            .ok();

        Self {
            running,
            link,
            handle,
        }
    }

    pub fn link(&self) -> ChannelLink {
        self.link.clone()
    }

    /// Tear down the connection: stop the reader thread and close the
    /// socket so no stale handler survives a remount.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.link.detach();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(
    address: &str,
    retry_limit: u32,
    retry_delay: Duration,
    sender: &Sender<SignalMessage>,
    running: &AtomicBool,
    link: &ChannelLink,
    debug_enabled: bool,
) {
    let mut attempts: u32 = 0;

    while running.load(Ordering::SeqCst) {
        let stream = match TcpStream::connect(address) {
            Ok(stream) => stream,
            Err(e) => {
                attempts += 1;
                if attempts >= retry_limit {
                    log_warning!(
                        "Command channel unreachable at {address} after {attempts} attempts, giving up: {e}"
                    );
                    return;
                }
                if debug_enabled {
                    log_debug!(
                        "Command channel connect failed (attempt {attempts}/{retry_limit}): {e}"
                    );
                }
                sleep_interruptibly(retry_delay, running);
                continue;
            }
        };

        attempts = 0;

        if stream.set_read_timeout(Some(READ_TIMEOUT)).is_err() {
            continue;
        }
        match stream.try_clone() {
            Ok(write_half) => link.attach(write_half),
            Err(e) => {
                log_warning!("Failed to clone channel socket: {e}");
                continue;
            }
        }

        log_info!("Command channel connected to {address}");
        read_events(stream, sender, running, debug_enabled);
        link.detach();

        if running.load(Ordering::SeqCst) {
            log_warning!("Command channel disconnected, reconnecting...");
            sleep_interruptibly(retry_delay, running);
        }
    }
}

fn read_events(
    stream: TcpStream,
    sender: &Sender<SignalMessage>,
    running: &AtomicBool,
    debug_enabled: bool,
) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    match serde_json::from_str::<InboundEvent>(trimmed) {
                        Ok(event) => {
                            if debug_enabled {
                                log_debug!("Channel command received: {event:?}");
                            }
                            if sender.send(SignalMessage::ChannelCommand(event)).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            log_warning!("Ignoring malformed channel event: {e}");
                        }
                    }
                }
                line.clear();
            }
            // Timeout polls let the shutdown flag be observed; a partial
            // line stays in the buffer for the next pass.
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                if debug_enabled {
                    log_debug!("Channel read error: {e}");
                }
                return;
            }
        }
    }
}

fn sleep_interruptibly(total: Duration, running: &AtomicBool) {
    let step = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let chunk = remaining.min(step);
        thread::sleep(chunk);
        remaining = remaining.saturating_sub(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::TcpListener;

    #[test]
    fn forwards_commands_and_sends_acks() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, rx) = std::sync::mpsc::channel();

        let channel = Channel::start(address, 3, Duration::from_millis(50), tx, false);

        let (server_side, _) = listener.accept().unwrap();
        let mut server_writer = server_side.try_clone().unwrap();
        writeln!(server_writer, r#"{{"event":"client:reload"}}"#).unwrap();

        let message = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            message,
            SignalMessage::ChannelCommand(InboundEvent::Reload { .. })
        ));

        // Engine-side ack travels back over the same socket.
        let now = chrono::Local.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        channel
            .link()
            .send(&OutboundEvent::Refreshed {
                ack: Ack::received(now),
            })
            .unwrap();

        let mut server_reader = BufReader::new(server_side);
        let mut ack_line = String::new();
        server_reader.read_line(&mut ack_line).unwrap();
        assert!(ack_line.contains(r#""event":"client:refreshed""#));
        assert!(ack_line.contains(r#""status":"received""#));

        channel.shutdown();
    }

    #[test]
    fn send_without_connection_fails() {
        let link = ChannelLink::default();
        let now = chrono::Local.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let result = link.send(&OutboundEvent::Announced {
            ack: Ack::received(now),
        });
        assert!(matches!(result, Err(ChannelError::NotConnected)));
    }

    #[test]
    fn gives_up_after_retry_limit() {
        // Port 1 is essentially guaranteed closed.
        let (tx, _rx) = std::sync::mpsc::channel();
        let channel = Channel::start(
            "127.0.0.1:1".to_string(),
            2,
            Duration::from_millis(10),
            tx,
            false,
        );
        // The reader thread should terminate on its own.
        std::thread::sleep(Duration::from_millis(300));
        channel.shutdown();
    }
}
