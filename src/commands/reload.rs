//! Implementation of the reload command.
//!
//! Signals a running minaret instance to re-fetch every feed snapshot,
//! the same path a config edit or a remote `client:reload` takes.

use anyhow::Result;

/// Signal the running instance with SIGUSR2.
pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    // Fail fast on a broken config before touching the daemon
    let _ = crate::config::Config::load()?;

    if debug_enabled {
        log_debug!("Lock file: {}", crate::io::lock::lock_path());
    }

    match crate::io::lock::read_lock_pid() {
        Some(pid) => {
            log_block_start!("Signaling minaret to reload feed snapshots...");

            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            match kill(Pid::from_raw(pid as i32), Signal::SIGUSR2) {
                Ok(_) => {
                    log_decorated!("Sent reload signal to minaret (PID: {pid})");
                    log_indented!("The running instance will re-fetch all snapshots");
                }
                Err(e) => {
                    log_pipe!();
                    log_error!("Failed to signal minaret: {e}");
                }
            }
            log_end!();
        }
        None => {
            log_pipe!();
            log_warning!("No running minaret instance found");
            log_indented!("Start one with 'minaret' before reloading");
            log_end!();
        }
    }

    Ok(())
}

/// Display help for the reload command
pub fn display_help() {
    log_version!();
    log_block_start!("reload - Re-fetch feed snapshots in the running instance");
    log_block_start!("Usage: minaret reload");
    log_block_start!("Sends SIGUSR2 to the running daemon. The daemon re-reads its");
    log_indented!("configuration, re-fetches all five feed snapshots, and resets");
    log_indented!("the banner and page cycling state.");
    log_end!();
}
