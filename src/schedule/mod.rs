//! Schedule derivation.
//!
//! Turns the raw provider snapshots into today's resolved five-prayer
//! schedule, then answers the two questions the kiosk asks every second:
//! which prayer window is active now, and when is the next Iqamah. All
//! functions here are pure over explicit `now`/`today` arguments so the
//! simulated clock and the tests exercise exactly the production paths.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::feed::{DailyPrayerTimes, IqamahEntry};

pub mod changes;
pub mod clock;
pub mod zawal;

/// The five daily prayers, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerName {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    /// All prayers in canonical order.
    pub const ALL: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "fajr",
            PrayerName::Dhuhr => "dhuhr",
            PrayerName::Asr => "asr",
            PrayerName::Maghrib => "maghrib",
            PrayerName::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
        }
    }
}

impl std::fmt::Display for PrayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerName::Fajr),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerName::Dhuhr),
            "asr" => Ok(PrayerName::Asr),
            "maghrib" => Ok(PrayerName::Maghrib),
            "isha" => Ok(PrayerName::Isha),
            _ => Err(anyhow::anyhow!("Unknown prayer name: {}", s)),
        }
    }
}

/// One row of today's resolved schedule.
///
/// `prayer_time` is `None` only when the provider string was malformed;
/// such rows render as placeholders and never qualify as the active
/// period or the next Iqamah.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScheduleEntry {
    pub name: PrayerName,
    pub prayer_time: Option<NaiveDateTime>,
    pub iqamah_time: Option<NaiveDateTime>,
}

impl ResolvedScheduleEntry {
    /// The time the congregation actually gathers: the Iqamah when the
    /// table publishes one, the prayer time otherwise.
    pub fn effective_iqamah(&self) -> Option<NaiveDateTime> {
        self.iqamah_time.or(self.prayer_time)
    }
}

/// The next upcoming Iqamah event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NextIqamah {
    pub name: PrayerName,
    pub time: NaiveDateTime,
}

/// Resolve today's five-entry schedule.
///
/// Prayer times come from the provider record; Iqamah times from the
/// table entry for today, except Maghrib whose Iqamah is always derived
/// as Sunset plus the configured offset.
pub fn build_schedule(
    day: &DailyPrayerTimes,
    iqamah: Option<&IqamahEntry>,
    maghrib_offset_minutes: i64,
    today: NaiveDate,
) -> [ResolvedScheduleEntry; 5] {
    let times = &day.timings;
    let table = |f: fn(&IqamahEntry) -> Option<&String>| -> Option<NaiveDateTime> {
        clock::resolve_iqamah(today, iqamah.and_then(|e| f(e).map(String::as_str)))
    };

    let maghrib_iqamah = clock::resolve_time(today, &times.sunset)
        .map(|t| t + chrono::Duration::minutes(maghrib_offset_minutes));

    [
        ResolvedScheduleEntry {
            name: PrayerName::Fajr,
            prayer_time: clock::resolve_time(today, &times.fajr),
            iqamah_time: table(|e| e.fajr.as_ref()),
        },
        ResolvedScheduleEntry {
            name: PrayerName::Dhuhr,
            prayer_time: clock::resolve_time(today, &times.dhuhr),
            iqamah_time: table(|e| e.dhuhr.as_ref()),
        },
        ResolvedScheduleEntry {
            name: PrayerName::Asr,
            prayer_time: clock::resolve_time(today, &times.asr),
            iqamah_time: table(|e| e.asr.as_ref()),
        },
        ResolvedScheduleEntry {
            name: PrayerName::Maghrib,
            prayer_time: clock::resolve_time(today, &times.maghrib),
            iqamah_time: maghrib_iqamah,
        },
        ResolvedScheduleEntry {
            name: PrayerName::Isha,
            prayer_time: clock::resolve_time(today, &times.isha),
            iqamah_time: table(|e| e.isha.as_ref()),
        },
    ]
}

/// The prayer window active at `now`, or `None` before the first prayer.
///
/// The active window is the latest resolved entry whose prayer time is at
/// or before `now`; the last window runs until end of day.
pub fn current_prayer_period(
    schedule: &[ResolvedScheduleEntry],
    now: NaiveDateTime,
) -> Option<PrayerName> {
    let resolved: Vec<(&ResolvedScheduleEntry, NaiveDateTime)> = schedule
        .iter()
        .filter_map(|e| e.prayer_time.map(|t| (e, t)))
        .collect();

    for (i, (entry, start)) in resolved.iter().enumerate() {
        if now < *start {
            continue;
        }
        match resolved.get(i + 1) {
            Some((_, next_start)) if now >= *next_start => continue,
            _ => return Some(entry.name),
        }
    }
    None
}

/// The next Iqamah event at or after `now`.
///
/// Walks the schedule in canonical order, preferring the earliest
/// qualifying boundary: before a prayer time the entry's effective Iqamah
/// qualifies; between a prayer time and its Iqamah the Iqamah still
/// qualifies. Once today is exhausted, falls back to tomorrow's Fajr
/// Iqamah from the table.
pub fn next_iqamah(
    schedule: &[ResolvedScheduleEntry],
    now: NaiveDateTime,
    tomorrow_fajr: Option<NaiveDateTime>,
) -> Option<NextIqamah> {
    for entry in schedule {
        let Some(prayer_time) = entry.prayer_time else {
            continue;
        };
        if now < prayer_time {
            if let Some(effective) = entry.effective_iqamah() {
                return Some(NextIqamah {
                    name: entry.name,
                    time: effective,
                });
            }
        }
        if let Some(iqamah) = entry.iqamah_time {
            if now < iqamah {
                return Some(NextIqamah {
                    name: entry.name,
                    time: iqamah,
                });
            }
        }
    }

    tomorrow_fajr.map(|time| NextIqamah {
        name: PrayerName::Fajr,
        time,
    })
}

/// Resolve tomorrow's Fajr Iqamah from a table entry for tomorrow's date.
pub fn tomorrow_fajr_iqamah(
    tomorrow_entry: Option<&IqamahEntry>,
    today: NaiveDate,
) -> Option<NaiveDateTime> {
    let tomorrow = today.succ_opt()?;
    clock::resolve_iqamah(
        tomorrow,
        tomorrow_entry.and_then(|e| e.fajr.as_deref()),
    )
}

/// Whether `date` is a Friday (Jumuah times apply).
pub fn is_jumuah(date: NaiveDate) -> bool {
    date.weekday() == chrono::Weekday::Fri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{CalendarDay, DateDescriptor, PrayerTimings};
    use chrono::NaiveTime;

    fn day_record() -> DailyPrayerTimes {
        DailyPrayerTimes {
            timings: PrayerTimings {
                fajr: "05:00".into(),
                sunrise: "06:30".into(),
                dhuhr: "12:00".into(),
                asr: "15:30".into(),
                sunset: "18:00".into(),
                maghrib: "18:00".into(),
                isha: "19:30".into(),
                imsak: None,
                midnight: None,
                first_third: None,
                last_third: None,
            },
            date: DateDescriptor {
                gregorian: CalendarDay {
                    date: "05-01-2025".into(),
                    day: "05".into(),
                    month: None,
                    year: None,
                },
                hijri: CalendarDay {
                    date: "05-07-1446".into(),
                    day: "05".into(),
                    month: None,
                    year: None,
                },
            },
        }
    }

    fn iqamah_entry() -> IqamahEntry {
        IqamahEntry {
            date: today(),
            fajr: Some("05:45".into()),
            dhuhr: Some("12:30".into()),
            asr: Some("16:00".into()),
            maghrib: Some("23:00".into()),
            isha: Some("20:00".into()),
            jumuah: vec![],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        today().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn schedule_carries_five_prayers_in_canonical_order() {
        let schedule = build_schedule(&day_record(), Some(&iqamah_entry()), 5, today());
        let names: Vec<_> = schedule.iter().map(|e| e.name).collect();
        assert_eq!(names, PrayerName::ALL.to_vec());
    }

    #[test]
    fn maghrib_iqamah_is_sunset_plus_offset_ignoring_table() {
        // Table says 23:00; derived value must win
        let schedule = build_schedule(&day_record(), Some(&iqamah_entry()), 5, today());
        let maghrib = &schedule[3];
        assert_eq!(maghrib.iqamah_time, Some(at(18, 5)));
    }

    #[test]
    fn maghrib_iqamah_derived_even_without_table_entry() {
        let schedule = build_schedule(&day_record(), None, 10, today());
        assert_eq!(schedule[3].iqamah_time, Some(at(18, 10)));
        assert_eq!(schedule[0].iqamah_time, None);
    }

    #[test]
    fn current_period_is_monotonic_across_the_day() {
        let schedule = build_schedule(&day_record(), None, 0, today());
        assert_eq!(current_prayer_period(&schedule, at(4, 59)), None);
        assert_eq!(
            current_prayer_period(&schedule, at(11, 59)),
            Some(PrayerName::Fajr)
        );
        assert_eq!(
            current_prayer_period(&schedule, at(12, 0)),
            Some(PrayerName::Dhuhr)
        );
        assert_eq!(
            current_prayer_period(&schedule, at(23, 59)),
            Some(PrayerName::Isha)
        );
    }

    #[test]
    fn malformed_prayer_time_never_qualifies() {
        let mut record = day_record();
        record.timings.fajr = "garbage".into();
        let schedule = build_schedule(&record, None, 0, today());
        assert_eq!(schedule[0].prayer_time, None);
        // Before Dhuhr nothing is active; Fajr cannot win with no time
        assert_eq!(current_prayer_period(&schedule, at(6, 0)), None);
    }

    #[test]
    fn next_iqamah_prefers_upcoming_boundaries_in_order() {
        let schedule = build_schedule(&day_record(), Some(&iqamah_entry()), 5, today());
        // Before Fajr: Fajr's Iqamah
        assert_eq!(
            next_iqamah(&schedule, at(4, 0), None),
            Some(NextIqamah {
                name: PrayerName::Fajr,
                time: at(5, 45)
            })
        );
        // Between Fajr prayer and its Iqamah: still Fajr's Iqamah
        assert_eq!(
            next_iqamah(&schedule, at(5, 20), None),
            Some(NextIqamah {
                name: PrayerName::Fajr,
                time: at(5, 45)
            })
        );
        // After Fajr Iqamah: Dhuhr's
        assert_eq!(
            next_iqamah(&schedule, at(6, 0), None).map(|n| n.name),
            Some(PrayerName::Dhuhr)
        );
    }

    #[test]
    fn next_iqamah_without_table_uses_prayer_time() {
        let schedule = build_schedule(&day_record(), None, 0, today());
        assert_eq!(
            next_iqamah(&schedule, at(4, 0), None),
            Some(NextIqamah {
                name: PrayerName::Fajr,
                time: at(5, 0)
            })
        );
    }

    #[test]
    fn exhausted_day_falls_back_to_tomorrow_fajr() {
        let schedule = build_schedule(&day_record(), Some(&iqamah_entry()), 5, today());
        let tomorrow = today().succ_opt().unwrap();
        let tomorrow_entry = IqamahEntry {
            date: tomorrow,
            fajr: Some("05:10".into()),
            dhuhr: None,
            asr: None,
            maghrib: None,
            isha: None,
            jumuah: vec![],
        };
        let fallback = tomorrow_fajr_iqamah(Some(&tomorrow_entry), today());
        let next = next_iqamah(&schedule, at(22, 30), fallback).unwrap();
        assert_eq!(next.name, PrayerName::Fajr);
        assert_eq!(
            next.time,
            tomorrow.and_time(NaiveTime::from_hms_opt(5, 10, 0).unwrap())
        );
    }

    #[test]
    fn exhausted_day_without_tomorrow_entry_returns_none() {
        let schedule = build_schedule(&day_record(), Some(&iqamah_entry()), 5, today());
        assert_eq!(next_iqamah(&schedule, at(22, 30), None), None);
    }

    #[test]
    fn jumuah_is_friday() {
        // 2025-01-03 was a Friday
        assert!(is_jumuah(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()));
        assert!(!is_jumuah(today()));
    }
}
