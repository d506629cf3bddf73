//! Cross-module flows: snapshot caching, change-notice policy, and the
//! countdown fallback to tomorrow's Fajr.

use chrono::NaiveDate;

use minaret::feed::{FeedError, FeedQuery, FeedStore, IqamahEntry, file::FileFeed};
use minaret::schedule::changes::{detect_next_change, should_show_change_notice};
use minaret::schedule::{self, PrayerName, clock};
use minaret::state::view::KioskView;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry(d: NaiveDate, fajr: &str, isha: &str) -> IqamahEntry {
    IqamahEntry {
        date: d,
        fajr: Some(fajr.to_string()),
        dhuhr: Some("13:30".to_string()),
        asr: Some("17:00".to_string()),
        maghrib: None,
        isha: Some(isha.to_string()),
        jumuah: vec![],
    }
}

#[test]
fn store_keeps_stale_snapshot_when_refresh_fails() {
    let dir = tempfile::tempdir().unwrap();
    let banners_path = dir.path().join("banners.json");
    std::fs::write(
        &banners_path,
        r#"[{"filename": "a.png", "url": "https://cdn/a.png"}]"#,
    )
    .unwrap();

    let feed = FileFeed::new(dir.path());
    let mut store = FeedStore::new();
    store.refresh(&feed, FeedQuery::Banners).unwrap();
    assert_eq!(store.banners().unwrap().len(), 1);

    // The fetcher wrote a truncated document; refresh fails but the
    // cached snapshot survives
    std::fs::write(&banners_path, "[{\"filename\":").unwrap();
    match store.refresh(&feed, FeedQuery::Banners) {
        Err(FeedError::Parse { query, .. }) => assert_eq!(query, "banners"),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(store.banners().unwrap().len(), 1);
    assert_eq!(store.banners().unwrap()[0].filename, "a.png");

    // And on recovery the new snapshot replaces it
    std::fs::write(
        &banners_path,
        r#"[{"filename": "b.png", "url": "https://cdn/b.png"}, {"filename": "c.png", "url": "https://cdn/c.png"}]"#,
    )
    .unwrap();
    store.refresh(&feed, FeedQuery::Banners).unwrap();
    assert_eq!(store.banners().unwrap().len(), 2);
}

#[test]
fn store_is_empty_before_first_successful_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let feed = FileFeed::new(dir.path());
    let mut store = FeedStore::new();

    assert!(matches!(
        store.refresh(&feed, FeedQuery::IqamahTable),
        Err(FeedError::Unavailable("iqamah table"))
    ));
    assert!(store.iqamah_month().is_none());
}

#[test]
fn change_notice_window_policy() {
    // Table: stable through March 14, Fajr and Isha move on March 15
    let entries = vec![
        entry(date(2025, 3, 1), "06:00", "21:00"),
        entry(date(2025, 3, 8), "06:00", "21:00"),
        entry(date(2025, 3, 15), "05:45", "21:15"),
    ];

    let change = detect_next_change(&entries, date(2025, 3, 10)).expect("change on March 15");
    assert_eq!(change.date, date(2025, 3, 15));
    assert!(change.changed.is_changed(PrayerName::Fajr));
    assert!(change.changed.is_changed(PrayerName::Isha));
    assert!(!change.changed.is_changed(PrayerName::Dhuhr));

    let show = |today: NaiveDate, always: bool, timer: Option<i64>| {
        should_show_change_notice(always, timer, Some(change.date), today)
    };

    // 5 days out with a 7-day timer: shown
    assert!(show(date(2025, 3, 10), false, Some(7)));
    // 5 days out with a 3-day timer: not yet
    assert!(!show(date(2025, 3, 10), false, Some(3)));
    // The change day itself: the grid already shows the new times
    assert!(!show(date(2025, 3, 15), false, Some(7)));
    // No timer configured: never shown on its own
    assert!(!show(date(2025, 3, 12), false, None));
    // Always-display overrides everything
    assert!(show(date(2025, 3, 20), true, None));
}

#[test]
fn change_detection_skips_past_entries() {
    // The only difference is already behind us
    let entries = vec![
        entry(date(2025, 3, 1), "06:00", "21:00"),
        entry(date(2025, 3, 5), "05:45", "21:00"),
    ];
    assert!(detect_next_change(&entries, date(2025, 3, 10)).is_none());
}

#[test]
fn countdown_falls_back_to_tomorrow_fajr_after_isha() {
    let today = date(2025, 3, 1);
    let day = minaret::feed::DailyPrayerTimes {
        timings: minaret::feed::PrayerTimings {
            fajr: "05:10".into(),
            sunrise: "06:40".into(),
            dhuhr: "12:30".into(),
            asr: "15:45".into(),
            sunset: "18:20".into(),
            maghrib: "18:20".into(),
            isha: "19:50".into(),
            imsak: None,
            midnight: None,
            first_third: None,
            last_third: None,
        },
        date: minaret::feed::DateDescriptor {
            gregorian: minaret::feed::CalendarDay {
                date: "01-03-2025".into(),
                day: "1".into(),
                month: None,
                year: None,
            },
            hijri: minaret::feed::CalendarDay {
                date: "01-09-1446".into(),
                day: "1".into(),
                month: None,
                year: None,
            },
        },
    };
    let resolved = schedule::build_schedule(&day, Some(&entry(today, "05:30", "20:10")), 5, today);

    let tomorrow_entry = entry(date(2025, 3, 2), "05:25", "20:10");
    let tomorrow_fajr = schedule::tomorrow_fajr_iqamah(Some(&tomorrow_entry), today);
    assert_eq!(
        tomorrow_fajr,
        clock::resolve_time(date(2025, 3, 2), "05:25")
    );

    // Past today's Isha Iqamah the countdown targets tomorrow's Fajr
    let late = today.and_hms_opt(22, 0, 0).unwrap();
    let next = schedule::next_iqamah(&resolved, late, tomorrow_fajr).expect("fallback target");
    assert_eq!(next.name, PrayerName::Fajr);
    assert_eq!(next.time, tomorrow_fajr.unwrap());

    // Earlier in the evening today's Isha still wins
    let evening = today.and_hms_opt(19, 55, 0).unwrap();
    let next = schedule::next_iqamah(&resolved, evening, tomorrow_fajr).unwrap();
    assert_eq!(next.name, PrayerName::Isha);
}

#[test]
fn placeholder_view_serializes_with_stable_shape() {
    let view = KioskView::placeholder("Welcome");
    let json = serde_json::to_value(&view).unwrap();

    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["name"], "Fajr");
    assert_eq!(rows[0]["prayer_time"], "--:--");
    assert_eq!(json["overlay"]["kind"], "none");
    assert_eq!(json["ticker"], "Welcome");

    // Round-trips through the IPC wire format
    let back: KioskView = serde_json::from_value(json).unwrap();
    assert_eq!(back, view);
}
