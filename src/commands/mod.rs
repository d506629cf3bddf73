//! One-shot CLI command handlers.
//!
//! Each subcommand lives in its own submodule; all of them talk to a
//! running daemon through the lock file, signals, or the IPC socket
//! rather than sharing state in-process.

pub mod help;
pub mod reload;
pub mod simulate;
pub mod status;
pub mod stop;
