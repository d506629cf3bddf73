//! Iqamah-change detection and the notice display policy.
//!
//! The published table changes a handful of times per month; the kiosk
//! announces the next change ahead of time so the congregation is not
//! surprised. Detection compares raw table strings verbatim; a value
//! going from "06:30" to absent counts as a change like any other.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::feed::IqamahEntry;

use super::PrayerName;

/// Per-field flags for which Iqamah times differ at the change date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFields {
    pub fajr: bool,
    pub dhuhr: bool,
    pub asr: bool,
    pub maghrib: bool,
    pub isha: bool,
}

impl ChangedFields {
    pub fn any(&self) -> bool {
        self.fajr || self.dhuhr || self.asr || self.maghrib || self.isha
    }

    pub fn is_changed(&self, name: PrayerName) -> bool {
        match name {
            PrayerName::Fajr => self.fajr,
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }
}

/// The next upcoming change in the Iqamah table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqamahChange {
    pub date: NaiveDate,
    pub times: IqamahEntry,
    pub changed: ChangedFields,
}

fn diff(previous: &IqamahEntry, entry: &IqamahEntry) -> ChangedFields {
    ChangedFields {
        fajr: previous.fajr != entry.fajr,
        dhuhr: previous.dhuhr != entry.dhuhr,
        asr: previous.asr != entry.asr,
        maghrib: previous.maghrib != entry.maghrib,
        isha: previous.isha != entry.isha,
    }
}

/// Scan the table for the first entry at or after `today` that differs
/// from its predecessor in any of the five fields.
///
/// Entries strictly before `today` only advance the comparison baseline;
/// they are never candidates. Returns `None` when no entry differs.
pub fn detect_next_change(entries: &[IqamahEntry], today: NaiveDate) -> Option<IqamahChange> {
    let mut sorted: Vec<&IqamahEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date));

    let mut previous: Option<&IqamahEntry> = None;
    for entry in sorted {
        let Some(prev) = previous else {
            previous = Some(entry);
            continue;
        };

        if entry.date < today {
            previous = Some(entry);
            continue;
        }

        let changed = diff(prev, entry);
        if changed.any() {
            return Some(IqamahChange {
                date: entry.date,
                times: entry.clone(),
                changed,
            });
        }
        previous = Some(entry);
    }
    None
}

/// Days from `today` until the change takes effect.
pub fn days_until(change_date: NaiveDate, today: NaiveDate) -> i64 {
    (change_date - today).num_days()
}

/// Whether the change notice is eligible for display.
///
/// `always_display` short-circuits unconditionally, even with no change
/// detected. Otherwise a configured window of `timer_days` must cover
/// the change: `0 < days_until <= timer_days`. The change day itself is
/// excluded since the grid already shows the new times by then.
pub fn should_show_change_notice(
    always_display: bool,
    timer_days: Option<i64>,
    change_date: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    if always_display {
        return true;
    }
    let (Some(timer_days), Some(change_date)) = (timer_days, change_date) else {
        return false;
    };
    let remaining = days_until(change_date, today);
    remaining > 0 && remaining <= timer_days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, fajr: &str, dhuhr: &str) -> IqamahEntry {
        IqamahEntry {
            date: date.parse().unwrap(),
            fajr: Some(fajr.to_string()),
            dhuhr: Some(dhuhr.to_string()),
            asr: Some("16:00".into()),
            maghrib: None,
            isha: Some("20:00".into()),
            jumuah: vec![],
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn finds_first_differing_entry_after_today() {
        let entries = vec![
            entry("2025-01-01", "06:30", "12:30"),
            entry("2025-01-10", "06:30", "12:30"),
            entry("2025-01-15", "06:30", "13:00"),
        ];
        let change = detect_next_change(&entries, day("2025-01-05")).unwrap();
        assert_eq!(change.date, day("2025-01-15"));
        assert!(change.changed.dhuhr);
        assert!(!change.changed.fajr);
        assert!(!change.changed.asr);
        assert!(!change.changed.maghrib);
        assert!(!change.changed.isha);
    }

    #[test]
    fn entries_before_today_only_move_the_baseline() {
        // The 01-03 change already happened; only the 01-20 one is upcoming
        let entries = vec![
            entry("2025-01-01", "06:30", "12:30"),
            entry("2025-01-03", "06:00", "12:30"),
            entry("2025-01-20", "06:00", "13:00"),
        ];
        let change = detect_next_change(&entries, day("2025-01-05")).unwrap();
        assert_eq!(change.date, day("2025-01-20"));
        assert!(change.changed.dhuhr);
        assert!(!change.changed.fajr);
    }

    #[test]
    fn unsorted_input_is_sorted_before_scanning() {
        let entries = vec![
            entry("2025-01-15", "06:30", "13:00"),
            entry("2025-01-01", "06:30", "12:30"),
            entry("2025-01-10", "06:30", "12:30"),
        ];
        let change = detect_next_change(&entries, day("2025-01-05")).unwrap();
        assert_eq!(change.date, day("2025-01-15"));
    }

    #[test]
    fn uniform_table_has_no_change() {
        let entries = vec![
            entry("2025-01-01", "06:30", "12:30"),
            entry("2025-01-10", "06:30", "12:30"),
        ];
        assert_eq!(detect_next_change(&entries, day("2025-01-05")), None);
    }

    #[test]
    fn value_disappearing_counts_as_change() {
        let mut second = entry("2025-01-10", "06:30", "12:30");
        second.fajr = None;
        let entries = vec![entry("2025-01-01", "06:30", "12:30"), second];
        let change = detect_next_change(&entries, day("2025-01-05")).unwrap();
        assert!(change.changed.fajr);
    }

    #[test]
    fn always_display_short_circuits_everything() {
        let today = day("2025-01-05");
        assert!(should_show_change_notice(true, None, None, today));
        assert!(should_show_change_notice(
            true,
            Some(0),
            Some(day("2025-01-05")),
            today
        ));
    }

    #[test]
    fn notice_window_excludes_change_day_and_respects_threshold() {
        let today = day("2025-01-05");
        let change = Some(day("2025-01-08"));
        assert!(should_show_change_notice(false, Some(3), change, today));
        assert!(!should_show_change_notice(false, Some(2), change, today));
        // On the change day itself the notice is suppressed
        assert!(!should_show_change_notice(
            false,
            Some(3),
            Some(today),
            today
        ));
        // Zero or missing window never shows
        assert!(!should_show_change_notice(false, Some(0), change, today));
        assert!(!should_show_change_notice(false, None, change, today));
        // No change detected, nothing to show
        assert!(!should_show_change_notice(false, Some(3), None, today));
    }
}
