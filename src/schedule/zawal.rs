//! Zawal (forbidden-prayer) window computation.
//!
//! Two daily windows during which prayer is discouraged: a fixed interval
//! just after sunrise, and a variable interval ending exactly at Dhuhr
//! whose start sits a fixed margin before the solar-noon midpoint.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::ZAWAL_MARGIN_MINUTES;

use super::clock;

/// Which window contains a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZawalWindow {
    Morning,
    Midday,
}

/// Today's two forbidden windows, half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZawalWindows {
    pub morning_start: NaiveDateTime,
    pub morning_end: NaiveDateTime,
    pub midday_start: NaiveDateTime,
    pub midday_end: NaiveDateTime,
}

impl ZawalWindows {
    /// The window containing `now`, if any.
    pub fn active_window(&self, now: NaiveDateTime) -> Option<ZawalWindow> {
        if now >= self.morning_start && now < self.morning_end {
            Some(ZawalWindow::Morning)
        } else if now >= self.midday_start && now < self.midday_end {
            Some(ZawalWindow::Midday)
        } else {
            None
        }
    }
}

/// Compute today's windows from the raw Sunrise/Sunset/Dhuhr strings.
///
/// Returns `None` when any of the three inputs is missing or malformed.
/// Morning window: `[Sunrise, Sunrise + margin)`. Midday window:
/// `[Sunrise + floor((Sunset - Sunrise) / 2) - margin, Dhuhr)`.
pub fn compute_zawal(
    sunrise: &str,
    sunset: &str,
    dhuhr: &str,
    today: NaiveDate,
) -> Option<ZawalWindows> {
    let sunrise = clock::resolve_time(today, sunrise)?;
    let sunset = clock::resolve_time(today, sunset)?;
    let dhuhr = clock::resolve_time(today, dhuhr)?;

    let margin = Duration::minutes(ZAWAL_MARGIN_MINUTES);
    let half_day_minutes = (sunset - sunrise).num_minutes() / 2;
    let midday_start = sunrise + Duration::minutes(half_day_minutes) - margin;

    Some(ZawalWindows {
        morning_start: sunrise,
        morning_end: sunrise + margin,
        midday_start,
        midday_end: dhuhr,
    })
}
