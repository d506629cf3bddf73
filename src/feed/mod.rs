//! Typed snapshots from the upstream data layer.
//!
//! The kiosk never talks to the network itself. An external fetcher keeps a
//! directory of JSON snapshot documents current; this module defines the
//! five logical queries the engine consumes (daily prayer times, banners,
//! masjid configuration, Iqamah table, content pages), a [`FeedSource`]
//! trait over them, and a [`FeedStore`] cache that survives failed
//! refreshes so the display never blanks out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file;

pub use file::FileFeed;

/// One month-day of prayer times as published by the timings provider.
///
/// All times are "HH:MM" or "HH:MM:SS" local strings, possibly suffixed
/// with a zone annotation ("05:30 (EST)"), parsed lazily at derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrayerTimes {
    pub timings: PrayerTimings,
    pub date: DateDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimings {
    #[serde(rename = "Fajr")]
    pub fajr: String,
    #[serde(rename = "Sunrise")]
    pub sunrise: String,
    #[serde(rename = "Dhuhr")]
    pub dhuhr: String,
    #[serde(rename = "Asr")]
    pub asr: String,
    #[serde(rename = "Sunset")]
    pub sunset: String,
    #[serde(rename = "Maghrib")]
    pub maghrib: String,
    #[serde(rename = "Isha")]
    pub isha: String,
    #[serde(rename = "Imsak", default)]
    pub imsak: Option<String>,
    #[serde(rename = "Midnight", default)]
    pub midnight: Option<String>,
    #[serde(rename = "Firstthird", default)]
    pub first_third: Option<String>,
    #[serde(rename = "Lastthird", default)]
    pub last_third: Option<String>,
}

/// Gregorian and Hijri descriptors for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateDescriptor {
    pub gregorian: CalendarDay,
    pub hijri: CalendarDay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    /// "DD-MM-YYYY" in the provider's convention
    pub date: String,
    /// Day of month as a string, e.g. "07"
    pub day: String,
    #[serde(default)]
    pub month: Option<MonthRef>,
    #[serde(default)]
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRef {
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub en: Option<String>,
}

impl CalendarDay {
    /// Human-readable "7 Muharram 1447" style line, degrading to the raw
    /// date string when month data is missing.
    pub fn display_line(&self) -> String {
        let day = self.day.trim_start_matches('0');
        let day = if day.is_empty() { "0" } else { day };
        match (
            self.month.as_ref().and_then(|m| m.en.as_deref()),
            self.year.as_deref(),
        ) {
            (Some(month), Some(year)) => format!("{day} {month} {year}"),
            (Some(month), None) => format!("{day} {month}"),
            _ => self.date.clone(),
        }
    }
}

/// One row of the published Iqamah table.
///
/// Time fields are raw strings; "--:--" and absent both mean "no fixed
/// Iqamah for that prayer". Compared verbatim by the change detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqamahEntry {
    pub date: chrono::NaiveDate,
    #[serde(default)]
    pub fajr: Option<String>,
    #[serde(default)]
    pub dhuhr: Option<String>,
    #[serde(default)]
    pub asr: Option<String>,
    #[serde(default)]
    pub maghrib: Option<String>,
    #[serde(default)]
    pub isha: Option<String>,
    /// Up to two Friday congregation times, in service order
    #[serde(default)]
    pub jumuah: Vec<String>,
}

/// A month of Iqamah entries as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqamahMonth {
    pub year: i32,
    pub month: u32,
    pub data: Vec<IqamahEntry>,
}

impl IqamahMonth {
    /// Look up the entry for a specific date.
    pub fn entry_for(&self, date: chrono::NaiveDate) -> Option<&IqamahEntry> {
        self.data.iter().find(|e| e.date == date)
    }
}

/// Singleton masjid configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasjidConfig {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub qr_link: Option<String>,
    #[serde(default)]
    pub ticker_text: Option<String>,
    /// Announcement source text, segments separated by a literal `|||`
    #[serde(default)]
    pub announcements: Option<String>,
    /// Minutes added to Sunset to produce the Maghrib Iqamah
    #[serde(default)]
    pub maghrib_sunset_addition_minutes: Option<f64>,
    /// When set, the change notice is always eligible for display
    #[serde(default)]
    pub always_display_iqamaah_time: Option<bool>,
    /// Days before a detected change during which the notice shows
    #[serde(default)]
    pub display_timer_duration: Option<i64>,
}

impl MasjidConfig {
    /// Maghrib offset with the provider's non-finite guard applied.
    pub fn maghrib_offset_minutes(&self) -> i64 {
        match self.maghrib_sunset_addition_minutes {
            Some(m) if m.is_finite() => m as i64,
            _ => 0,
        }
    }
}

/// One carousel banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub filename: String,
    pub url: String,
    /// Per-banner display seconds; engine default applies when unset or non-positive
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Kind of a secondary content page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "image-text")]
    ImageText,
}

/// One secondary display page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPage {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub page_type: PageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Display seconds; engine default applies when unset or non-positive
    #[serde(default)]
    pub page_duration: Option<u64>,
    pub order: i32,
    pub is_active: bool,
}

/// Errors from the snapshot layer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no {0} snapshot available")]
    Unavailable(&'static str),
    #[error("failed to read {query} snapshot: {source}")]
    Io {
        query: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {query} snapshot: {source}")]
    Parse {
        query: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The five logical queries the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedQuery {
    PrayerTimes,
    Banners,
    MasjidConfig,
    IqamahTable,
    Pages,
}

impl FeedQuery {
    /// All queries in the order a reload fetches them.
    pub const ALL: [FeedQuery; 5] = [
        FeedQuery::PrayerTimes,
        FeedQuery::Banners,
        FeedQuery::MasjidConfig,
        FeedQuery::IqamahTable,
        FeedQuery::Pages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedQuery::PrayerTimes => "prayer times",
            FeedQuery::Banners => "banners",
            FeedQuery::MasjidConfig => "masjid config",
            FeedQuery::IqamahTable => "iqamah table",
            FeedQuery::Pages => "pages",
        }
    }
}

impl std::fmt::Display for FeedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abstraction over the upstream snapshot provider.
#[cfg_attr(test, mockall::automock)]
pub trait FeedSource: Send {
    fn fetch_prayer_month(&self) -> Result<Vec<DailyPrayerTimes>, FeedError>;
    fn fetch_banners(&self) -> Result<Vec<Banner>, FeedError>;
    fn fetch_masjid_config(&self) -> Result<MasjidConfig, FeedError>;
    fn fetch_iqamah_month(&self) -> Result<IqamahMonth, FeedError>;
    fn fetch_pages(&self) -> Result<Vec<ContentPage>, FeedError>;
}

/// In-memory cache of the latest good snapshot per query.
///
/// A failed refresh leaves the previous snapshot in place; consumers only
/// ever observe `None` before the very first successful fetch.
#[derive(Default)]
pub struct FeedStore {
    prayer_month: Option<Vec<DailyPrayerTimes>>,
    banners: Option<Vec<Banner>>,
    masjid_config: Option<MasjidConfig>,
    iqamah_month: Option<IqamahMonth>,
    pages: Option<Vec<ContentPage>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh a single query from the source, keeping stale data on error.
    pub fn refresh(
        &mut self,
        source: &dyn FeedSource,
        query: FeedQuery,
    ) -> Result<(), FeedError> {
        match query {
            FeedQuery::PrayerTimes => {
                self.prayer_month = Some(source.fetch_prayer_month()?);
            }
            FeedQuery::Banners => {
                self.banners = Some(source.fetch_banners()?);
            }
            FeedQuery::MasjidConfig => {
                self.masjid_config = Some(source.fetch_masjid_config()?);
            }
            FeedQuery::IqamahTable => {
                self.iqamah_month = Some(source.fetch_iqamah_month()?);
            }
            FeedQuery::Pages => {
                self.pages = Some(source.fetch_pages()?);
            }
        }
        Ok(())
    }

    /// Prayer-times record for a 1-based day of month, if fetched.
    ///
    /// The provider publishes one record per month day; a 1-based day maps
    /// to a 0-based table index, clamped at the first entry.
    pub fn prayer_day(&self, day_of_month: u32) -> Option<&DailyPrayerTimes> {
        let table = self.prayer_month.as_ref()?;
        table.get(crate::schedule::clock::day_index(day_of_month))
    }

    pub fn prayer_month(&self) -> Option<&[DailyPrayerTimes]> {
        self.prayer_month.as_deref()
    }

    pub fn banners(&self) -> Option<&[Banner]> {
        self.banners.as_deref()
    }

    pub fn masjid_config(&self) -> Option<&MasjidConfig> {
        self.masjid_config.as_ref()
    }

    pub fn iqamah_month(&self) -> Option<&IqamahMonth> {
        self.iqamah_month.as_ref()
    }

    /// Active content pages in display order.
    pub fn active_pages(&self) -> Vec<&ContentPage> {
        let mut pages: Vec<&ContentPage> = self
            .pages
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter(|p| p.is_active)
            .collect();
        pages.sort_by_key(|p| p.order);
        pages
    }
}
