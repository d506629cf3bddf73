//! Application-wide constants and default values.

/// Exit code used when startup fails before the engine takes over
pub const EXIT_FAILURE: i32 = 1;

/// How often the engine loop wakes to poll for signals while waiting
pub const SIGNAL_POLL_INTERVAL_MS: u64 = 250;

/// Placeholder glyph shown wherever a time is missing or unparseable
pub const TIME_PLACEHOLDER: &str = "--:--";

/// Separator joining ticker segments on the scrolling line
pub const TICKER_SEPARATOR: &str = "     •     ";

/// Delimiter between segments inside ticker/announcement source text
pub const SEGMENT_DELIMITER: &str = "|||";

/// Minutes the morning forbidden window extends past sunrise, and the
/// margin subtracted before solar midpoint for the midday window
pub const ZAWAL_MARGIN_MINUTES: i64 = 15;

/// Default seconds a secondary page (or carousel banner) stays on screen
pub const DEFAULT_PAGE_DURATION_SECS: u64 = 10;

/// Seconds between schedule-grid / change-notice alternations
pub const DEFAULT_NOTICE_TOGGLE_SECS: u64 = 10;

/// Seconds the announcement overlay stays up once shown
pub const DEFAULT_ANNOUNCE_OVERLAY_SECS: u64 = 5;

/// Seconds before an Iqamah at which the countdown overlay appears
pub const DEFAULT_IQAMAH_ALERT_WINDOW_SECS: i64 = 30;

/// Grace delay before the reload overlay is dismissed after all fetches land
pub const DEFAULT_RELOAD_GRACE_MS: u64 = 1200;

/// Default reconnect policy for the command channel
pub const DEFAULT_CHANNEL_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_CHANNEL_RETRY_DELAY_MS: u64 = 3000;

/// Assumed speech rate for estimating spoken-announcement duration
pub const DEFAULT_SPEECH_WPM: u32 = 200;

/// Minimum estimated speech duration regardless of word count
pub const MIN_SPEECH_DURATION_SECS: u64 = 8;

/// Default commands for the speech and audio collaborators
pub const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";
pub const DEFAULT_PLAYER_COMMAND: &str = "mpv";

/// Fallback ticker line when no segments are configured
pub const DEFAULT_TICKER_FALLBACK: &str = "Welcome to the masjid";

/// Local hours at which feed snapshots are refetched daily
pub const FEED_REFRESH_HOURS: [u32; 2] = [6, 18];

/// Backward clock adjustments at or under this many seconds are treated
/// as NTP corrections and ignored
pub const NTP_ADJUSTMENT_TOLERANCE_SECS: i64 = 5;
