//! Implementation of the stop command.
//!
//! Terminates a running minaret instance with SIGTERM and waits for it
//! to release the lock before returning.

use anyhow::Result;
use std::time::Duration;

/// How long to wait for the daemon to exit after SIGTERM.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Stop the running instance, waiting for a clean shutdown.
pub fn handle_stop_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    if debug_enabled {
        log_debug!("Lock file: {}", crate::io::lock::lock_path());
    }

    let Some(pid) = crate::io::lock::read_lock_pid() else {
        log_pipe!();
        log_warning!("No running minaret instance found");
        log_end!();
        return Ok(());
    };

    log_block_start!("Stopping minaret (PID: {pid})...");

    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        log_pipe!();
        log_error!("Failed to signal minaret: {e}");
        log_end!();
        return Ok(());
    }

    let deadline = std::time::Instant::now() + STOP_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if !crate::io::lock::is_process_running(pid) {
            log_decorated!("minaret stopped");
            log_end!();
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    log_pipe!();
    log_warning!("minaret did not exit within {} seconds", STOP_TIMEOUT.as_secs());
    log_indented!("It may still be shutting down, or stuck in playback");
    log_end!();
    Ok(())
}

/// Display help for the stop command
pub fn display_help() {
    log_version!();
    log_block_start!("stop - Terminate the running minaret instance");
    log_block_start!("Usage: minaret stop");
    log_block_start!("Sends SIGTERM and waits up to {} seconds for the", STOP_TIMEOUT.as_secs());
    log_indented!("daemon to shut down and release its lock file.");
    log_end!();
}
