//! Pure clock-string utilities.
//!
//! Everything here is total: malformed input degrades to `None` or a
//! placeholder string, never an error. The provider publishes times as
//! "HH:MM" or "HH:MM:SS", occasionally suffixed with a zone annotation
//! ("05:30 (EST)"); seconds and annotations are discarded.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::constants::{SEGMENT_DELIMITER, TICKER_SEPARATOR, TIME_PLACEHOLDER};

/// Parse a clock-of-day string, discarding seconds and any suffix.
///
/// Returns `None` for non-numeric tokens or out-of-range values.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let clock = raw.split_whitespace().next()?;
    let mut parts = clock.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Bind a clock-of-day to a calendar date at zero seconds.
pub fn resolve_at(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time.with_second(0).unwrap_or(time))
}

/// Parse and bind a raw time string to a calendar date.
pub fn resolve_time(date: NaiveDate, raw: &str) -> Option<NaiveDateTime> {
    parse_time_of_day(raw).map(|t| resolve_at(date, t))
}

/// Resolve an Iqamah-table value to a timestamp on the given date.
///
/// Absent values and the literal placeholder "--:--" both mean the table
/// publishes no fixed Iqamah for that prayer.
pub fn resolve_iqamah(date: NaiveDate, raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == TIME_PLACEHOLDER {
        return None;
    }
    resolve_time(date, raw)
}

/// Format a timestamp as a 12-hour clock, "h:mm AM/PM".
pub fn format_clock_12h(t: NaiveDateTime) -> String {
    let hour = t.hour();
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    let period = if hour >= 12 { "PM" } else { "AM" };
    format!("{}:{:02} {}", display_hour, t.minute(), period)
}

/// Show a value or the placeholder glyph when absent.
pub fn display_or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| TIME_PLACEHOLDER.to_string())
}

/// Map a 1-based day of month to a 0-based table index, clamped at 0.
pub fn day_index(day_of_month: u32) -> usize {
    day_of_month.saturating_sub(1) as usize
}

/// Zero-padded "HH:MM:SS" remaining until `target`, clamped at zero.
pub fn countdown_text(target: NaiveDateTime, now: NaiveDateTime) -> String {
    let secs = (target - now).num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Assemble the scrolling ticker line from `|||`-delimited source text.
///
/// Segments are trimmed, empties dropped, and the rest joined with a
/// bullet separator; the fallback line stands in when nothing remains.
pub fn ticker_line(raw: Option<&str>, fallback: &str) -> String {
    let segments: Vec<&str> = raw
        .unwrap_or("")
        .split(SEGMENT_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        fallback.to_string()
    } else {
        segments.join(TICKER_SEPARATOR)
    }
}

/// Join announcement segments with line breaks for the blocking overlay.
pub fn announcement_text(raw: &str) -> String {
    raw.split(SEGMENT_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
    }

    #[test]
    fn parses_and_discards_seconds() {
        assert_eq!(
            parse_time_of_day("05:30:45"),
            NaiveTime::from_hms_opt(5, 30, 0)
        );
        assert_eq!(parse_time_of_day("05:30"), NaiveTime::from_hms_opt(5, 30, 0));
    }

    #[test]
    fn strips_zone_annotation() {
        assert_eq!(
            parse_time_of_day("05:30 (EST)"),
            NaiveTime::from_hms_opt(5, 30, 0)
        );
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range() {
        assert_eq!(parse_time_of_day("ab:cd"), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("12:61"), None);
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("12"), None);
    }

    #[test]
    fn twelve_hour_formatting() {
        let t = |h, m| date().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap());
        assert_eq!(format_clock_12h(t(0, 5)), "12:05 AM");
        assert_eq!(format_clock_12h(t(13, 0)), "1:00 PM");
        assert_eq!(format_clock_12h(t(12, 0)), "12:00 PM");
        assert_eq!(format_clock_12h(t(23, 59)), "11:59 PM");
    }

    #[test]
    fn iqamah_placeholder_and_absent_resolve_to_none() {
        assert_eq!(resolve_iqamah(date(), None), None);
        assert_eq!(resolve_iqamah(date(), Some("--:--")), None);
        assert_eq!(resolve_iqamah(date(), Some("  --:--  ")), None);
        assert_eq!(resolve_iqamah(date(), Some("")), None);
        assert_eq!(
            resolve_iqamah(date(), Some("06:30")),
            Some(date().and_time(NaiveTime::from_hms_opt(6, 30, 0).unwrap()))
        );
    }

    #[test]
    fn day_index_clamps_at_zero() {
        assert_eq!(day_index(0), 0);
        assert_eq!(day_index(1), 0);
        assert_eq!(day_index(31), 30);
    }

    #[test]
    fn countdown_is_zero_padded_and_clamped() {
        let now = date().and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        let target = date().and_time(NaiveTime::from_hms_opt(12, 5, 7).unwrap());
        assert_eq!(countdown_text(target, now), "02:05:07");
        assert_eq!(countdown_text(now, target), "00:00:00");
    }

    #[test]
    fn ticker_joins_trimmed_segments() {
        assert_eq!(
            ticker_line(Some("  First ||| Second|||   "), "fallback"),
            "First     •     Second"
        );
        assert_eq!(ticker_line(Some("   "), "fallback"), "fallback");
        assert_eq!(ticker_line(None, "fallback"), "fallback");
    }

    #[test]
    fn announcement_joins_with_line_breaks() {
        assert_eq!(announcement_text("One|||Two ||| "), "One\nTwo");
    }
}
