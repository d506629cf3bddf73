//! Binary entry point: parse arguments and dispatch.
//!
//! All real logic lives in the library; this file only routes each
//! `CliAction` to its handler and maps failures to a non-zero exit.

use anyhow::Result;

use minaret::Minaret;
use minaret::args::{CliAction, ParsedArgs};
use minaret::{log_end, log_error, log_pipe, log_version};

fn main() -> Result<()> {
    let args = ParsedArgs::parse();

    match args.action {
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            minaret::config::loading::set_config_dir(config_dir)?;
            Minaret::new(debug_enabled).run()
        }
        CliAction::Reload {
            debug_enabled,
            config_dir,
        } => {
            minaret::config::loading::set_config_dir(config_dir)?;
            minaret::commands::reload::handle_reload_command(debug_enabled)
        }
        CliAction::Status {
            debug_enabled,
            follow,
        } => minaret::commands::status::handle_status_command(debug_enabled, follow),
        CliAction::Stop {
            debug_enabled,
            config_dir,
        } => {
            minaret::config::loading::set_config_dir(config_dir)?;
            minaret::commands::stop::handle_stop_command(debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            config_dir,
            start,
            end,
            multiplier,
            log_to_file,
        } => minaret::commands::simulate::handle_simulate_command(
            &start,
            &end,
            multiplier,
            debug_enabled,
            config_dir,
            log_to_file,
        ),
        CliAction::Help { command } => {
            minaret::commands::help::run_help_command(command.as_deref())
        }
        CliAction::Version => {
            log_version!();
            log_end!();
            Ok(())
        }
        CliAction::InvalidUsage { message } => {
            log_version!();
            log_pipe!();
            log_error!("{message}");
            minaret::commands::help::show_command_usage("");
            log_end!();
            std::process::exit(minaret::constants::EXIT_FAILURE);
        }
    }
}
