//! Help command implementation.
//!
//! Dispatches to command-specific help or shows the general command list.

use anyhow::Result;

/// Show brief usage for a command (used for error messages)
pub fn show_command_usage(command: &str) {
    match command {
        "reload" => log_block_start!("Usage: minaret reload"),
        "status" => log_block_start!("Usage: minaret status [--follow]"),
        "stop" => log_block_start!("Usage: minaret stop"),
        "simulate" => {
            log_block_start!("Usage: minaret simulate <start> <end> [multiplier] [--log]")
        }
        _ => log_block_start!("Usage: minaret [OPTIONS] [COMMAND]"),
    }
}

/// Run the help command (dispatcher)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("reload") => super::reload::display_help(),
        Some("status") => super::status::display_help(),
        Some("stop") => super::stop::display_help(),
        Some("simulate") => super::simulate::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_version!();
            log_pipe!();
            log_warning!("Unknown command: {unknown}");
            log_end!();
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("reload                   Re-fetch feed snapshots in the running instance");
    log_indented!("status [--follow]        Show the current kiosk view");
    log_indented!("stop                     Terminate the running instance");
    log_indented!("simulate <start> <end>   Run against simulated time");
    log_indented!("help [COMMAND]           Show detailed help for a command");
    log_indented!("version                  Show version information");
    log_block_start!("Options:");
    log_indented!("--debug, -d              Verbose debug output");
    log_indented!("--config, -c <DIR>       Use an alternate configuration directory");
    log_pipe!();
    log_info!("Use 'minaret help <command>' to see detailed help for a specific command.");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: minaret help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_end!();
}
