//! Event data structures for the IPC system.
//!
//! Typed events broadcast to connected clients whenever the kiosk view
//! changes; `minaret status` consumes them.

use serde::{Deserialize, Serialize};

use crate::state::view::{FetchStatus, KioskView, OverlayState};

/// All possible IPC events that can be broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum IpcEvent {
    /// The full kiosk view after any change.
    ViewChanged {
        #[serde(flatten)]
        view: KioskView,
    },

    /// The active prayer period rolled over.
    PeriodChanged {
        from_period: Option<String>,
        to_period: Option<String>,
    },

    /// A blocking overlay appeared or was dismissed.
    OverlayChanged { overlay: OverlayState },

    /// One feed query of an in-flight reload changed status.
    ReloadProgress { query: String, status: FetchStatus },

    /// An announcement overlay was dispatched.
    AnnounceStarted {
        /// True when the text was spoken, false for pre-rendered audio.
        spoken: bool,
    },
}

impl IpcEvent {
    pub fn view_changed(view: KioskView) -> Self {
        IpcEvent::ViewChanged { view }
    }

    pub fn period_changed(from: Option<String>, to: Option<String>) -> Self {
        IpcEvent::PeriodChanged {
            from_period: from,
            to_period: to,
        }
    }

    pub fn overlay_changed(overlay: OverlayState) -> Self {
        IpcEvent::OverlayChanged { overlay }
    }

    pub fn reload_progress(query: &str, status: FetchStatus) -> Self {
        IpcEvent::ReloadProgress {
            query: query.to_string(),
            status,
        }
    }

    pub fn announce_started(spoken: bool) -> Self {
        IpcEvent::AnnounceStarted { spoken }
    }
}
