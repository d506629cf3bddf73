//! Command-line argument parsing.
//!
//! Hand-rolled parsing kept deliberately small: a handful of subcommands,
//! two global flags, and everything else routed to help.

/// The action the invocation resolved to.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the kiosk daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Ask a running instance to re-fetch feed snapshots
    Reload {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Print the current kiosk view from a running instance
    Status { debug_enabled: bool, follow: bool },
    /// Stop a running instance
    Stop {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Run the daemon against simulated time
    Simulate {
        debug_enabled: bool,
        config_dir: Option<String>,
        start: String,
        end: String,
        multiplier: f64,
        log_to_file: bool,
    },
    /// Show help, optionally for one subcommand
    Help { command: Option<String> },
    /// Show version information
    Version,
    /// Unusable invocation; message explains what was wrong
    InvalidUsage { message: String },
}

/// Result of parsing the process arguments.
#[derive(Debug)]
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    pub fn parse() -> Self {
        Self::from_args(std::env::args().skip(1).collect())
    }

    pub fn from_args(args: Vec<String>) -> Self {
        // Global flags may appear anywhere; strip them first.
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();
        let mut want_help = false;
        let mut want_version = false;
        let mut follow = false;
        let mut log_to_file = false;

        let mut idx = 0;
        while idx < args.len() {
            match args[idx].as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--help" | "-h" => want_help = true,
                "--version" | "-V" => want_version = true,
                "--follow" | "-f" => follow = true,
                "--log" | "-l" => log_to_file = true,
                "--config" | "-c" => {
                    let Some(value) = args.get(idx + 1).filter(|v| !v.starts_with('-')) else {
                        return Self::invalid(format!(
                            "{} requires a directory argument",
                            args[idx]
                        ));
                    };
                    config_dir = Some(value.clone());
                    idx += 1;
                }
                // Negative numbers ("-1" fast-forward) are positionals, not flags
                flag if flag.starts_with('-') && flag.parse::<f64>().is_err() => {
                    return Self::invalid(format!("unknown option: {flag}"));
                }
                other => positional.push(other.to_string()),
            }
            idx += 1;
        }

        if want_version {
            return Self::action(CliAction::Version);
        }
        if want_help {
            return Self::action(CliAction::Help {
                command: positional.first().cloned(),
            });
        }

        let action = match positional.first().map(String::as_str) {
            None => CliAction::Run {
                debug_enabled,
                config_dir,
            },
            Some("reload") => CliAction::Reload {
                debug_enabled,
                config_dir,
            },
            Some("status") => CliAction::Status {
                debug_enabled,
                follow,
            },
            Some("stop") => CliAction::Stop {
                debug_enabled,
                config_dir,
            },
            Some("simulate") => {
                let start = positional.get(1).cloned();
                let end = positional.get(2).cloned();
                let (Some(start), Some(end)) = (start, end) else {
                    return Self::invalid(
                        "simulate requires a start and end datetime (YYYY-MM-DD HH:MM:SS)"
                            .to_string(),
                    );
                };
                let multiplier = match positional.get(3) {
                    Some(raw) => match raw.parse::<f64>() {
                        Ok(m) => m,
                        Err(_) => {
                            return Self::invalid(format!("invalid speed multiplier: {raw}"));
                        }
                    },
                    None => 60.0,
                };
                CliAction::Simulate {
                    debug_enabled,
                    config_dir,
                    start,
                    end,
                    multiplier,
                    log_to_file,
                }
            }
            Some("help") => CliAction::Help {
                command: positional.get(1).cloned(),
            },
            Some("version") => CliAction::Version,
            Some(unknown) => {
                return Self::invalid(format!("unknown command: {unknown}"));
            }
        };

        Self::action(action)
    }

    fn action(action: CliAction) -> Self {
        Self { action }
    }

    fn invalid(message: String) -> Self {
        Self {
            action: CliAction::InvalidUsage { message },
        }
    }
}
