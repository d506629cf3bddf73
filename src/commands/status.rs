//! Implementation of the status command.
//!
//! Connects to the IPC socket of a running instance, prints the current
//! kiosk view, and in follow mode keeps streaming events until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::state::ipc::client::IpcClient;
use crate::state::ipc::events::IpcEvent;
use crate::state::view::{FetchStatus, KioskView, OverlayState};

/// Print the current kiosk view, optionally following updates.
pub fn handle_status_command(debug_enabled: bool, follow: bool) -> Result<()> {
    log_version!();

    if !IpcClient::is_running() {
        log_pipe!();
        log_warning!("No running minaret instance found");
        log_indented!("Start one with 'minaret' before querying status");
        log_end!();
        return Ok(());
    }

    let mut client = IpcClient::connect()?;
    let view = client.current()?;
    print_view(&view);

    if !follow {
        log_end!();
        return Ok(());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;

    log_block_start!("Following view updates (Ctrl+C to stop)...");

    while !interrupted.load(Ordering::SeqCst) {
        match client.next_event() {
            Ok(event) => print_event(&event, debug_enabled),
            Err(e) => {
                if interrupted.load(Ordering::SeqCst) {
                    break;
                }
                // Read timeouts just mean a quiet second
                if e.root_cause()
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| {
                        matches!(
                            io.kind(),
                            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                        )
                    })
                {
                    continue;
                }
                log_pipe!();
                log_warning!("Lost connection to minaret: {e:#}");
                break;
            }
        }
    }

    log_end!();
    Ok(())
}

fn print_view(view: &KioskView) {
    log_block_start!("Prayer schedule");
    for row in &view.rows {
        let marker = if row.highlighted { " *" } else { "" };
        log_indented!(
            "{:<8} {:>9}  Iqamah {:>9}{}",
            row.name,
            row.prayer_time,
            row.iqamah_time,
            marker
        );
    }

    if let Some(countdown) = &view.countdown {
        log_block_start!(
            "Next Iqamah: {} at {} (in {})",
            countdown.prayer,
            countdown.iqamah_clock,
            countdown.remaining
        );
    }

    if let Some(zawal) = &view.zawal {
        log_block_start!("Zawal windows");
        log_indented!("Morning: {} - {}", zawal.morning_start, zawal.morning_end);
        log_indented!("Midday:  {} - {}", zawal.midday_start, zawal.midday_end);
        if let Some(active) = &zawal.active {
            log_indented!("Active now: {active}");
        }
    }

    if let Some(jumuah) = &view.jumuah {
        log_block_start!("Jumu'ah: {}", jumuah.join(", "));
    }

    if !view.overlay.is_none() {
        log_block_start!("Overlay: {}", overlay_summary(&view.overlay));
    }

    log_block_start!("Dates: {} / {}", view.dates.gregorian, view.dates.hijri);
    log_block_start!("Ticker: {}", view.ticker);
}

fn print_event(event: &IpcEvent, debug_enabled: bool) {
    match event {
        IpcEvent::ViewChanged { view } => {
            if debug_enabled {
                print_view(view);
            }
        }
        IpcEvent::PeriodChanged {
            from_period,
            to_period,
        } => {
            log_block_start!(
                "Period changed: {} -> {}",
                from_period.as_deref().unwrap_or("none"),
                to_period.as_deref().unwrap_or("none")
            );
        }
        IpcEvent::OverlayChanged { overlay } => {
            log_block_start!("Overlay: {}", overlay_summary(overlay));
        }
        IpcEvent::ReloadProgress { query, status } => {
            let status = match status {
                FetchStatus::Pending => "pending",
                FetchStatus::Done => "done",
            };
            log_indented!("Reload {query}: {status}");
        }
        IpcEvent::AnnounceStarted { spoken } => {
            let mode = if *spoken { "spoken" } else { "audio" };
            log_block_start!("Announcement dispatched ({mode})");
        }
    }
}

fn overlay_summary(overlay: &OverlayState) -> String {
    match overlay {
        OverlayState::None => "none".to_string(),
        OverlayState::Reload { steps } => {
            let done = steps
                .iter()
                .filter(|s| s.status == FetchStatus::Done)
                .count();
            format!("reloading ({done}/{} fetched)", steps.len())
        }
        OverlayState::Announce { text } => {
            format!("announcement: {}", text.lines().next().unwrap_or(""))
        }
        OverlayState::IqamahAlert { prayer, remaining } => {
            format!("Iqamah alert: {prayer} in {remaining}")
        }
    }
}

/// Display help for the status command
pub fn display_help() {
    log_version!();
    log_block_start!("status - Show the current kiosk view");
    log_block_start!("Usage: minaret status [--follow]");
    log_block_start!("Options:");
    log_indented!("--follow, -f  Keep streaming view events until Ctrl+C");
    log_end!();
}
