//! Implementation of the simulate command.
//!
//! Runs the kiosk against a simulated clock so a full day of schedule
//! transitions, Iqamah alerts, and refetch deadlines can be observed in
//! minutes. A multiplier of -1 selects fast-forward mode, where sleeps
//! complete instantly and the clock jumps by the requested duration.

use anyhow::{Result, anyhow};
use chrono::Local;
use std::sync::Arc;

use crate::logger::Log;
use crate::time_source::{SimulatedTimeSource, init_time_source, parse_datetime};

/// Run the daemon over the given simulated time window.
pub fn handle_simulate_command(
    start: &str,
    end: &str,
    multiplier: f64,
    debug_enabled: bool,
    config_dir: Option<String>,
    log_to_file: bool,
) -> Result<()> {
    let start_time = parse_datetime(start).map_err(|e| anyhow!("invalid start time: {e}"))?;
    let end_time = parse_datetime(end).map_err(|e| anyhow!("invalid end time: {e}"))?;

    if end_time <= start_time {
        return Err(anyhow!("simulation end must be after its start"));
    }

    // -1 selects fast-forward; anything else non-positive is a mistake
    let multiplier = if multiplier == -1.0 {
        0.0
    } else if multiplier <= 0.0 {
        return Err(anyhow!(
            "speed multiplier must be positive (or -1 for fast-forward)"
        ));
    } else {
        multiplier
    };

    if let Some(dir) = config_dir {
        crate::config::loading::set_config_dir(Some(dir))?;
    }

    // Held for the whole run so the writer thread flushes on exit
    let _logger_guard = if log_to_file {
        // Terminal header goes out before the simulated clock starts, so
        // these lines carry no timestamp prefix
        log_version!();
        log_block_start!("Simulating {start} -> {end}");
        log_simulation_speed(multiplier);

        let log_filename = format!(
            "minaret-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        log_block_start!("Logging simulation output to: {}", log_filename);

        init_time_source(Arc::new(SimulatedTimeSource::new(
            start_time, end_time, multiplier,
        )));

        // From here on all logger output is routed to the file
        let guard = Log::start_file_logging(log_filename)?;

        // Repeat the header into the file, now with simulated timestamps
        log_version!();
        log_block_start!("Simulating {start} -> {end}");
        log_simulation_speed(multiplier);

        Some(guard)
    } else {
        init_time_source(Arc::new(SimulatedTimeSource::new(
            start_time, end_time, multiplier,
        )));

        log_version!();
        log_block_start!("Simulating {start} -> {end}");
        log_simulation_speed(multiplier);

        None
    };

    // Header already printed above
    crate::minaret::Minaret::new(debug_enabled).without_headers().run()
}

fn log_simulation_speed(multiplier: f64) {
    if multiplier == 0.0 {
        log_indented!("Fast-forward mode: sleeps complete instantly");
    } else {
        log_indented!("Speed: {multiplier}x");
    }
}

/// Display help for the simulate command
pub fn display_help() {
    log_version!();
    log_block_start!("simulate - Run the kiosk against simulated time");
    log_block_start!("Usage: minaret simulate <start> <end> [multiplier] [--log]");
    log_block_start!("Arguments:");
    log_indented!("start       Window start, \"YYYY-MM-DD HH:MM:SS\" local time");
    log_indented!("end         Window end, same format");
    log_indented!("multiplier  Speed factor (default 60; -1 = fast-forward)");
    log_block_start!("Options:");
    log_indented!("--log, -l   Divert simulation output to a timestamped log file");
    log_block_start!("Examples:");
    log_indented!("# A full day at one simulated minute per real second");
    log_indented!("minaret simulate \"2025-03-01 00:00:00\" \"2025-03-02 00:00:00\"");
    log_pipe!();
    log_indented!("# Jump straight through the evening prayers, output to a file");
    log_indented!("minaret simulate \"2025-03-01 17:00:00\" \"2025-03-01 21:00:00\" -1 --log");
    log_end!();
}
