//! File-backed snapshot source.
//!
//! The external fetcher maintains a directory of JSON documents, one per
//! logical query. This source re-reads them on demand; the engine treats a
//! missing file as "no snapshot yet" rather than an error worth crashing on.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{
    Banner, ContentPage, DailyPrayerTimes, FeedError, FeedSource, IqamahMonth, MasjidConfig,
};

/// Snapshot filenames inside the feed directory.
const PRAYER_TIMES_FILE: &str = "prayer_times.json";
const BANNERS_FILE: &str = "banners.json";
const MASJID_CONFIG_FILE: &str = "masjid_config.json";
const IQAMAH_TIMES_FILE: &str = "iqamah_times.json";
const PAGES_FILE: &str = "pages.json";

/// Reads snapshot documents from a directory.
pub struct FileFeed {
    dir: PathBuf,
}

impl FileFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str, query: &'static str) -> Result<T, FeedError> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Err(FeedError::Unavailable(query));
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| FeedError::Io { query, source })?;
        serde_json::from_str(&raw).map_err(|source| FeedError::Parse { query, source })
    }
}

impl FeedSource for FileFeed {
    fn fetch_prayer_month(&self) -> Result<Vec<DailyPrayerTimes>, FeedError> {
        self.read(PRAYER_TIMES_FILE, "prayer times")
    }

    fn fetch_banners(&self) -> Result<Vec<Banner>, FeedError> {
        self.read(BANNERS_FILE, "banners")
    }

    fn fetch_masjid_config(&self) -> Result<MasjidConfig, FeedError> {
        self.read(MASJID_CONFIG_FILE, "masjid config")
    }

    fn fetch_iqamah_month(&self) -> Result<IqamahMonth, FeedError> {
        self.read(IQAMAH_TIMES_FILE, "iqamah table")
    }

    fn fetch_pages(&self) -> Result<Vec<ContentPage>, FeedError> {
        self.read(PAGES_FILE, "pages")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FileFeed::new(dir.path());
        match feed.fetch_banners() {
            Err(FeedError::Unavailable(query)) => assert_eq!(query, "banners"),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BANNERS_FILE), "not json").unwrap();
        let feed = FileFeed::new(dir.path());
        assert!(matches!(
            feed.fetch_banners(),
            Err(FeedError::Parse { query: "banners", .. })
        ));
    }

    #[test]
    fn reads_banner_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BANNERS_FILE),
            r#"[{"filename": "eid.png", "url": "https://cdn/eid.png", "duration": 12}]"#,
        )
        .unwrap();
        let feed = FileFeed::new(dir.path());
        let banners = feed.fetch_banners().unwrap();
        assert_eq!(banners.len(), 1);
        assert_eq!(banners[0].duration, Some(12));
    }
}
