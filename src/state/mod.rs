//! Kiosk display state and its IPC broadcast surface.

pub mod ipc;
pub mod view;

pub use view::{
    ChangeNoticeView, ChangeRow, CountdownView, CycleView, DatesView, FetchStatus, KioskView,
    OverlayState, ReloadStep, ScheduleRow, ZawalView,
};
