//! Lock file management for single-instance enforcement.
//!
//! Only one minaret instance may drive a kiosk at a time. The lock file in
//! the runtime directory holds the daemon PID so sibling commands (reload,
//! stop) can signal it, and stale locks from crashed processes are cleaned
//! up on the next start.

use anyhow::Result;
use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use crate::config;

/// Acquire an exclusive lock on the lock file.
///
/// The lock file contains the process ID on the first line and the config
/// directory (empty when default) on the second.
///
/// # Returns
/// - `Ok((lock_file, lock_path))` if the lock was acquired
/// - Never returns if another instance is running (exits with an error)
pub fn acquire_lock() -> Result<(File, String)> {
    let lock_path = lock_path();

    // Open without truncating to preserve content owned by a live instance
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    match lock_file.try_lock_exclusive() {
        Ok(()) => {
            let lock_file = write_lock_content(lock_file)?;
            Ok((lock_file, lock_path))
        }
        Err(_) => {
            // handle_lock_conflict either resolves a stale lock or exits
            handle_lock_conflict(&lock_path)?;

            let retry_lock_file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;

            match retry_lock_file.try_lock_exclusive() {
                Ok(()) => {
                    let retry_lock_file = write_lock_content(retry_lock_file)?;
                    Ok((retry_lock_file, lock_path))
                }
                Err(e) => {
                    log_error_exit!("Failed to acquire lock after cleanup attempt: {}", e);
                    std::process::exit(crate::constants::EXIT_FAILURE);
                }
            }
        }
    }
}

fn write_lock_content(mut lock_file: File) -> Result<File> {
    lock_file.set_len(0)?;
    lock_file.seek(SeekFrom::Start(0))?;

    let pid = std::process::id();
    writeln!(&lock_file, "{pid}")?;
    if let Some(ref dir) = config::get_custom_config_dir() {
        writeln!(&lock_file, "{}", dir.display())?;
    } else {
        writeln!(&lock_file)?;
    }
    lock_file.flush()?;

    Ok(lock_file)
}

/// Handle lock file conflicts.
///
/// # Returns
/// - `Ok(())` if the conflict was resolved (stale lock removed)
/// - Never returns if another instance is running (calls std::process::exit)
pub fn handle_lock_conflict(lock_path: &str) -> Result<()> {
    let lock_content = match std::fs::read_to_string(lock_path) {
        Ok(content) => content,
        Err(_) => {
            // Lock file was already cleaned up
            return Ok(());
        }
    };

    let lines: Vec<&str> = lock_content.trim().lines().collect();

    if lines.is_empty() || lines.len() > 2 {
        log_warning!("Lock file format invalid, removing");
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    }

    let pid = match lines[0].parse::<u32>() {
        Ok(pid) => pid,
        Err(_) => {
            log_warning!("Lock file contains invalid PID, removing stale lock");
            let _ = std::fs::remove_file(lock_path);
            return Ok(());
        }
    };

    if !is_process_running(pid) {
        log_warning!("Removing stale lock file (process {pid} no longer running)");
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    }

    log_pipe!();
    log_error!("minaret is already running (PID: {pid})");
    log_block_start!("Did you mean to:");
    log_indented!("• Reload feed snapshots: minaret reload");
    log_indented!("• Inspect the kiosk view: minaret status");
    log_indented!("• Stop the daemon: minaret stop");
    log_block_start!("Cannot start - another minaret instance is running");
    log_end!();
    std::process::exit(crate::constants::EXIT_FAILURE)
}

/// Path of the single-instance lock file.
pub fn lock_path() -> String {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    format!("{runtime_dir}/minaret.lock")
}

/// Read the PID of the running instance from the lock file, if any.
///
/// Used by sibling commands (reload, stop) to signal the daemon.
pub fn read_lock_pid() -> Option<u32> {
    let content = std::fs::read_to_string(lock_path()).ok()?;
    let pid = content.lines().next()?.trim().parse::<u32>().ok()?;
    if is_process_running(pid) { Some(pid) } else { None }
}

/// Check whether a process with the given PID exists.
pub fn is_process_running(pid: u32) -> bool {
    // Signal 0 probes existence without delivering anything
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn absent_pid_is_not_running() {
        // PID beyond the default pid_max
        assert!(!is_process_running(4_194_305));
    }
}
