//! Serialized kiosk view state.
//!
//! The engine rebuilds a [`KioskView`] every tick and broadcasts it over
//! IPC whenever it changes. Every field is already formatted for display:
//! absent or malformed upstream data degrades to the placeholder glyph
//! here, never to an error.

use serde::{Deserialize, Serialize};

/// One row of the five-prayer schedule grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub name: String,
    /// 12-hour clock display, or "--:--" when the time is absent.
    pub prayer_time: String,
    pub iqamah_time: String,
    /// True for the row of the currently active prayer period.
    pub highlighted: bool,
}

/// Countdown to the next upcoming Iqamah.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownView {
    pub prayer: String,
    pub iqamah_clock: String,
    /// "HH:MM:SS", clamped at zero.
    pub remaining: String,
}

/// The two daily forbidden-prayer windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZawalView {
    pub morning_start: String,
    pub morning_end: String,
    pub midday_start: String,
    pub midday_end: String,
    /// Which window contains the current instant, if either.
    pub active: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Pending,
    Done,
}

/// Per-query progress shown on the reload overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadStep {
    pub query: String,
    pub status: FetchStatus,
}

/// Blocking overlay currently covering the kiosk, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayState {
    None,
    Reload { steps: Vec<ReloadStep> },
    Announce { text: String },
    IqamahAlert { prayer: String, remaining: String },
}

impl OverlayState {
    pub fn is_none(&self) -> bool {
        matches!(self, OverlayState::None)
    }
}

/// Position of the content-cycling machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleView {
    /// "primary" or "secondary"
    pub phase: String,
    /// Secondary page index when in the secondary phase.
    pub page_index: Option<usize>,
    pub banner_index: usize,
    /// "schedule_grid" or "change_notice"
    pub panel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatesView {
    pub gregorian: String,
    pub hijri: String,
}

/// One row of the upcoming Iqamah-change notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub name: String,
    pub iqamah_time: String,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNoticeView {
    pub effective_date: String,
    pub rows: Vec<ChangeRow>,
}

/// Complete display state pushed to IPC clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskView {
    pub active_period: Option<String>,
    pub rows: Vec<ScheduleRow>,
    pub countdown: Option<CountdownView>,
    pub zawal: Option<ZawalView>,
    pub cycle: CycleView,
    pub overlay: OverlayState,
    pub ticker: String,
    pub dates: DatesView,
    /// Jumuah Iqamah pair, present on Fridays when published.
    pub jumuah: Option<Vec<String>>,
    pub iqamah_change: Option<ChangeNoticeView>,
}

impl KioskView {
    /// View rendered before any snapshot has loaded.
    pub fn placeholder(ticker_fallback: &str) -> Self {
        use crate::constants::TIME_PLACEHOLDER;
        use crate::schedule::PrayerName;

        let rows = PrayerName::ALL
            .iter()
            .map(|name| ScheduleRow {
                name: name.display_name().to_string(),
                prayer_time: TIME_PLACEHOLDER.to_string(),
                iqamah_time: TIME_PLACEHOLDER.to_string(),
                highlighted: false,
            })
            .collect();

        Self {
            active_period: None,
            rows,
            countdown: None,
            zawal: None,
            cycle: CycleView {
                phase: "primary".to_string(),
                page_index: None,
                banner_index: 0,
                panel: "schedule_grid".to_string(),
            },
            overlay: OverlayState::None,
            ticker: ticker_fallback.to_string(),
            dates: DatesView {
                gregorian: String::new(),
                hijri: String::new(),
            },
            jumuah: None,
            iqamah_change: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_view_renders_five_rows() {
        let view = KioskView::placeholder("Welcome");
        assert_eq!(view.rows.len(), 5);
        assert_eq!(view.rows[0].name, "Fajr");
        assert_eq!(view.rows[4].name, "Isha");
        assert!(view.rows.iter().all(|r| r.prayer_time == "--:--"));
        assert_eq!(view.ticker, "Welcome");
        assert!(view.overlay.is_none());
    }

    #[test]
    fn overlay_serializes_with_kind_tag() {
        let overlay = OverlayState::IqamahAlert {
            prayer: "Dhuhr".to_string(),
            remaining: "00:00:25".to_string(),
        };
        let json = serde_json::to_string(&overlay).unwrap();
        assert!(json.contains("\"kind\":\"iqamah_alert\""));
        assert!(json.contains("\"remaining\":\"00:00:25\""));
    }

    #[test]
    fn view_round_trips_through_json() {
        let view = KioskView::placeholder("fallback");
        let json = serde_json::to_string(&view).unwrap();
        let back: KioskView = serde_json::from_str(&json).unwrap();
        assert_eq!(view, back);
    }
}
