//! # Minaret Library
//!
//! Internal library for the minaret kiosk daemon.
//!
//! Minaret drives a masjid prayer-schedule kiosk: it derives the daily
//! schedule and Iqamah times from published feed snapshots, cycles banner
//! and page content on deadlines, listens for remote reload/announce
//! commands, and broadcasts every view change over a Unix socket.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Minaret` wires subsystems together and owns cleanup
//! - **Engine**: `engine` runs the serialized 1-second tick loop
//! - **Domain**: `schedule` (prayer/Iqamah/zawal derivation), `cycle`
//!   (banner and page rotation), `feed` (snapshot cache and sources)
//! - **Edges**: `channel` (TCP command link), `state::ipc` (view
//!   broadcast), `playback` (speech and audio dispatch)
//! - **Infrastructure**: signal handling, config hot-reload, lock file,
//!   logging, and the swappable time source used by `simulate`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

// Public API modules
pub mod args;
pub mod channel;
pub mod commands;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod engine;
pub mod feed;
pub mod io;
pub mod playback;
pub mod schedule;
pub mod signals;
pub mod state;
pub mod time_source;

// Internal modules
mod minaret;

// Re-export for binary
pub use minaret::Minaret;
