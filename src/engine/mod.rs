//! The serialized engine loop.
//!
//! All application state lives on this one thread. Worker threads (signals,
//! command channel, config watcher) only ever post messages into the mpsc
//! channel; the loop alternates between a phase-aligned 1-second tick and
//! message handling via `recv_timeout`.
//!
//! Tick ordering: the current period, zawal window, and next-Iqamah
//! countdown are always recomputed before the Iqamah-proximity check, which
//! runs prayer-by-prayer in canonical order and stops at the first
//! qualifying prayer.

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime};

use crate::channel::{Ack, AnnouncePayload, ChannelLink, InboundEvent, OutboundEvent};
use crate::config::Config;
use crate::constants::*;
use crate::cycle::{ContentCycle, CycleEvent, CyclePhase, NoticePanel};
use crate::feed::{FeedQuery, FeedSource, FeedStore};
use crate::playback::PlaybackService;
use crate::schedule::{
    self, PrayerName, ResolvedScheduleEntry,
    changes::{detect_next_change, should_show_change_notice},
    clock,
    zawal::{ZawalWindow, ZawalWindows, compute_zawal},
};
use crate::signals::{SignalMessage, SignalState};
use crate::state::ipc::IpcNotifier;
use crate::state::view::{
    ChangeNoticeView, ChangeRow, CountdownView, CycleView, DatesView, FetchStatus, KioskView,
    OverlayState, ReloadStep, ScheduleRow, ZawalView,
};

/// Forward jump large enough to assume a suspend/resume cycle.
const SUSPEND_THRESHOLD_SECS: u64 = 60;
/// Forward jump worth flagging as a brief stall.
const SHORT_JUMP_THRESHOLD_SECS: u64 = 10;
/// Backward jump that still fits a DST shift or deliberate adjustment.
const DST_THRESHOLD_SECS: u64 = 3700;

pub struct EngineParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub feed: Box<dyn FeedSource>,
    pub playback: PlaybackService,
    pub channel_link: Option<ChannelLink>,
    pub ipc: Option<IpcNotifier>,
    pub debug_enabled: bool,
}

pub struct Engine {
    config: Config,
    signal_state: SignalState,
    feed: Box<dyn FeedSource>,
    store: FeedStore,
    playback: PlaybackService,
    channel_link: Option<ChannelLink>,
    ipc: Option<IpcNotifier>,
    debug_enabled: bool,

    cycle: ContentCycle,
    today: NaiveDate,
    daily_schedule: Option<[ResolvedScheduleEntry; 5]>,
    zawal: Option<ZawalWindows>,
    tomorrow_fajr: Option<NaiveDateTime>,
    current_period: Option<PrayerName>,

    overlay: OverlayState,
    announce_until: Option<NaiveDateTime>,
    reload_grace_until: Option<NaiveDateTime>,
    refetch_at: NaiveDateTime,

    last_view: Option<KioskView>,
    last_check_time: SystemTime,
}

impl Engine {
    pub fn new(params: EngineParams) -> Self {
        let now = crate::time_source::now();
        let notice_toggle = params.config.notice_toggle_secs();
        Self {
            config: params.config,
            signal_state: params.signal_state,
            feed: params.feed,
            store: FeedStore::new(),
            playback: params.playback,
            channel_link: params.channel_link,
            ipc: params.ipc,
            debug_enabled: params.debug_enabled,
            cycle: ContentCycle::new(notice_toggle),
            today: now.date_naive(),
            daily_schedule: None,
            zawal: None,
            tomorrow_fajr: None,
            current_period: None,
            overlay: OverlayState::None,
            announce_until: None,
            reload_grace_until: None,
            refetch_at: next_refresh_deadline(now.naive_local()),
            last_view: None,
            last_check_time: crate::time_source::system_now(),
        }
    }

    /// Shared stop flag, used by the runner to halt worker threads after
    /// the loop returns.
    pub fn running_flag(&self) -> &std::sync::Arc<std::sync::atomic::AtomicBool> {
        &self.signal_state.running
    }

    /// Run the engine until shutdown (or the end of a simulation window).
    pub fn run(&mut self) -> Result<()> {
        let startup_now = crate::time_source::now().naive_local();

        // Initial snapshot load; failures leave placeholder rendering and
        // the scheduled refetch or a reload command fills the gap later.
        self.run_reload(startup_now, ReloadTrigger::Silent);
        self.recompute_day(startup_now);
        self.reset_cycle(startup_now);

        log_block_start!("Kiosk engine started");
        if let Some(schedule) = &self.daily_schedule {
            for entry in schedule {
                log_indented!(
                    "{}: {} (Iqamah {})",
                    entry.name.display_name(),
                    entry
                        .prayer_time
                        .map(clock::format_clock_12h)
                        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
                    entry
                        .iqamah_time
                        .map(clock::format_clock_12h)
                        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
                );
            }
        } else {
            log_indented!("No prayer times available yet");
        }

        while self.signal_state.running.load(Ordering::SeqCst)
            && !crate::time_source::simulation_ended()
        {
            let now = crate::time_source::now();
            let now_naive = now.naive_local();

            self.check_time_anomaly(now_naive);

            if now.date_naive() != self.today {
                log_block_start!("Day rollover, rebuilding schedule");
                self.recompute_day(now_naive);
                self.reset_cycle(now_naive);
            }

            if now_naive >= self.refetch_at {
                if self.debug_enabled {
                    log_pipe!();
                    log_debug!("Scheduled snapshot refetch");
                }
                // Re-anchor first so a failing feed can't hot-loop the fetch
                self.refetch_at = next_refresh_deadline(now_naive);
                self.run_reload(now_naive, ReloadTrigger::Silent);
            }

            self.playback.poll(now);
            self.tick(now_naive);

            match self.wait_for_message(now) {
                Some(SignalMessage::Shutdown) => break,
                Some(SignalMessage::Reload) => {
                    self.reload_config();
                    let now = crate::time_source::now().naive_local();
                    self.run_reload(now, ReloadTrigger::Overlay);
                }
                Some(SignalMessage::ChannelCommand(event)) => {
                    let now = crate::time_source::now().naive_local();
                    self.handle_channel_command(event, now);
                }
                None => {}
            }
        }

        self.playback.stop_all();
        log_block_start!("Kiosk engine stopped");
        Ok(())
    }

    /// One clock tick: recompute derived schedule state, drive overlay
    /// deadlines and the content cycle, then publish the view if changed.
    fn tick(&mut self, now: NaiveDateTime) {
        // Expired overlays first so this tick renders their dismissal
        if let Some(until) = self.reload_grace_until
            && now >= until
        {
            self.reload_grace_until = None;
            if matches!(self.overlay, OverlayState::Reload { .. }) {
                self.set_overlay(OverlayState::None);
            }
        }
        if let Some(until) = self.announce_until
            && now >= until
        {
            self.announce_until = None;
            if matches!(self.overlay, OverlayState::Announce { .. }) {
                self.set_overlay(OverlayState::None);
            }
        }

        // (a) current period, zawal, countdown
        let period = self
            .daily_schedule
            .as_ref()
            .and_then(|s| schedule::current_prayer_period(s, now));
        if period != self.current_period {
            let from = self.current_period.map(|p| p.display_name().to_string());
            let to = period.map(|p| p.display_name().to_string());
            log_block_start!(
                "Prayer period: {} -> {}",
                from.as_deref().unwrap_or("none"),
                to.as_deref().unwrap_or("none")
            );
            if let Some(ipc) = &self.ipc {
                ipc.send_period_changed(from, to);
            }
            self.current_period = period;
        }

        // (b) Iqamah proximity, first qualifying prayer in canonical order
        // wins. Never clobbers a reload or announce overlay.
        if matches!(
            self.overlay,
            OverlayState::None | OverlayState::IqamahAlert { .. }
        ) {
            let alert = self.daily_schedule.as_ref().and_then(|s| {
                s.iter().find_map(|entry| {
                    let iqamah = entry.effective_iqamah()?;
                    let remaining = (iqamah - now).num_seconds();
                    if remaining > 0 && remaining <= self.config.iqamah_alert_window_secs() {
                        Some(OverlayState::IqamahAlert {
                            prayer: entry.name.display_name().to_string(),
                            remaining: clock::countdown_text(iqamah, now),
                        })
                    } else {
                        None
                    }
                })
            });
            match alert {
                Some(overlay) => self.set_overlay(overlay),
                None => {
                    if matches!(self.overlay, OverlayState::IqamahAlert { .. }) {
                        self.set_overlay(OverlayState::None);
                    }
                }
            }
        }

        // Content cycle deadlines
        let notice_eligible = self.notice_eligible(now.date());
        let events = self.cycle.tick(now, notice_eligible);
        if self.debug_enabled {
            for event in &events {
                match event {
                    CycleEvent::BannerAdvanced(i) => log_debug!("Banner advanced to {}", i + 1),
                    CycleEvent::EnteredSecondary(i) => {
                        log_debug!("Entered secondary page {}", i + 1)
                    }
                    CycleEvent::AdvancedSecondary(i) => {
                        log_debug!("Advanced to secondary page {}", i + 1)
                    }
                    CycleEvent::ReturnedToPrimary => log_debug!("Returned to primary screen"),
                    CycleEvent::PanelToggled(panel) => log_debug!("Panel toggled: {panel:?}"),
                }
            }
        }

        let view = self.build_view(now);
        if self.last_view.as_ref() != Some(&view) {
            if let Some(ipc) = &self.ipc {
                ipc.send_view_changed(&view);
            }
            self.last_view = Some(view);
        }
    }

    /// Detect wall-clock jumps between ticks and re-anchor all deadlines
    /// when one occurs.
    fn check_time_anomaly(&mut self, now: NaiveDateTime) {
        let current = crate::time_source::system_now();
        let (anomaly, reason) = detect_time_anomaly(current, self.last_check_time);
        self.last_check_time = current;

        if anomaly {
            if let Some(reason) = reason {
                log_pipe!();
                log_warning!("{reason}");
                log_indented!("Recomputing schedule and re-anchoring deadlines");
            }
            self.recompute_day(now);
            self.reset_cycle(now);
            self.refetch_at = next_refresh_deadline(now);
        }
    }

    /// Rebuild today's derived schedule state from the cached snapshots.
    fn recompute_day(&mut self, now: NaiveDateTime) {
        let today = now.date();
        self.today = today;

        let maghrib_offset = self
            .store
            .masjid_config()
            .map(|c| c.maghrib_offset_minutes())
            .unwrap_or(0);

        let iqamah_today = self.store.iqamah_month().and_then(|m| m.entry_for(today));

        self.daily_schedule = self
            .store
            .prayer_day(today.day())
            .map(|day| schedule::build_schedule(day, iqamah_today, maghrib_offset, today));

        self.zawal = self.store.prayer_day(today.day()).and_then(|day| {
            compute_zawal(
                &day.timings.sunrise,
                &day.timings.sunset,
                &day.timings.dhuhr,
                today,
            )
        });

        self.tomorrow_fajr = today.succ_opt().and_then(|tomorrow| {
            let entry = self
                .store
                .iqamah_month()
                .and_then(|m| m.entry_for(tomorrow));
            schedule::tomorrow_fajr_iqamah(entry, today)
        });

        self.refetch_at = next_refresh_deadline(now);
    }

    /// Reset the content cycle to its initial state (primary phase,
    /// banner 0, schedule grid), cancelling any in-flight deadline.
    fn reset_cycle(&mut self, now: NaiveDateTime) {
        let banner_durations: Vec<u64> = self
            .store
            .banners()
            .unwrap_or(&[])
            .iter()
            .map(|b| {
                // A published duration of 0 means "use the default", not "skip"
                b.duration
                    .filter(|&d| d > 0)
                    .unwrap_or(self.config.page_duration_secs())
            })
            .collect();
        let page_durations: Vec<u64> = self
            .store
            .active_pages()
            .iter()
            .map(|p| {
                p.page_duration
                    .filter(|&d| d > 0)
                    .unwrap_or(self.config.page_duration_secs())
            })
            .collect();
        self.cycle.reset(
            now,
            banner_durations,
            page_durations,
            self.config.notice_toggle_secs(),
        );
    }

    fn notice_eligible(&self, today: NaiveDate) -> bool {
        let Some(masjid) = self.store.masjid_config() else {
            return false;
        };
        let change = self
            .store
            .iqamah_month()
            .and_then(|m| detect_next_change(&m.data, today));
        should_show_change_notice(
            masjid.always_display_iqamaah_time.unwrap_or(false),
            masjid.display_timer_duration,
            change.map(|c| c.date),
            today,
        )
    }

    /// Sequentially re-fetch every snapshot, reporting per-query progress.
    ///
    /// On success the content cycle resets to its initial state and, for
    /// commanded reloads, the progress overlay stays up for a short grace
    /// delay. Any fetch failure dismisses the overlay immediately and
    /// leaves previously cached data in place.
    fn run_reload(&mut self, now: NaiveDateTime, trigger: ReloadTrigger) {
        if matches!(self.overlay, OverlayState::Reload { .. }) {
            log_pipe!();
            log_warning!("Reload requested while one is already in progress, ignoring");
            if trigger.acked() {
                self.send_ack(AckKind::Refreshed, Ack::error("reload already in progress", local_now()));
            }
            return;
        }

        let show_overlay = trigger.overlay();
        let mut steps: Vec<ReloadStep> = FeedQuery::ALL
            .iter()
            .map(|q| ReloadStep {
                query: q.as_str().to_string(),
                status: FetchStatus::Pending,
            })
            .collect();

        if show_overlay {
            log_block_start!("Reloading feed snapshots");
            self.set_overlay(OverlayState::Reload {
                steps: steps.clone(),
            });
        }

        for (i, query) in FeedQuery::ALL.iter().enumerate() {
            match self.store.refresh(self.feed.as_ref(), *query) {
                Ok(()) => {
                    steps[i].status = FetchStatus::Done;
                    if let Some(ipc) = &self.ipc {
                        ipc.send_reload_progress(query.as_str(), FetchStatus::Done);
                    }
                    if show_overlay {
                        log_indented!("{query}: done");
                        self.set_overlay(OverlayState::Reload {
                            steps: steps.clone(),
                        });
                    }
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("Reload failed fetching {query}: {e}");
                    log_indented!("Keeping previously cached snapshots");
                    if show_overlay {
                        self.set_overlay(OverlayState::None);
                    }
                    if trigger.acked() {
                        self.send_ack(
                            AckKind::Refreshed,
                            Ack::error(format!("failed to fetch {query}: {e}"), local_now()),
                        );
                    }
                    return;
                }
            }
        }

        self.recompute_day(now);
        self.reset_cycle(now);

        if show_overlay {
            self.reload_grace_until =
                Some(now + chrono::Duration::milliseconds(self.config.reload_grace().as_millis() as i64));
        }
        if trigger.acked() {
            self.send_ack(AckKind::Refreshed, Ack::received(local_now()));
        }
    }

    fn handle_channel_command(&mut self, event: InboundEvent, now: NaiveDateTime) {
        match event {
            InboundEvent::Reload { .. } => {
                log_block_start!("Remote reload command received");
                self.run_reload(now, ReloadTrigger::Commanded);
            }
            InboundEvent::Announce { payload } => {
                log_block_start!("Remote announce command received");
                self.handle_announce(payload.unwrap_or_default(), now);
            }
        }
    }

    /// Announcing state: refresh the masjid config for the freshest text,
    /// display it as a blocking overlay, dispatch playback, and ack
    /// immediately after dispatch rather than after the overlay dwell.
    fn handle_announce(&mut self, payload: AnnouncePayload, now: NaiveDateTime) {
        if let Err(e) = self.store.refresh(self.feed.as_ref(), FeedQuery::MasjidConfig) {
            log_warning!("Could not refresh masjid config for announcement: {e}");
        }

        let raw_text = self
            .store
            .masjid_config()
            .and_then(|c| c.announcements.clone())
            .or(payload.text);

        let Some(raw_text) = raw_text.filter(|t| !t.trim().is_empty()) else {
            log_indented!("No announcement content available");
            self.send_ack(
                AckKind::Announced,
                Ack::error("no announcement content", local_now()),
            );
            return;
        };

        let text = clock::announcement_text(&raw_text);
        self.set_overlay(OverlayState::Announce { text: text.clone() });
        self.announce_until =
            Some(now + chrono::Duration::seconds(self.config.announce_overlay_secs() as i64));

        let playback_now = crate::time_source::now();
        let result = match payload.audio_url.as_deref() {
            Some(url) => self.playback.play_audio(url).map(|()| false),
            None => self.playback.speak(&text, playback_now).map(|_| true),
        };

        match result {
            Ok(spoken) => {
                if let Some(ipc) = &self.ipc {
                    ipc.send_announce_started(spoken);
                }
                self.send_ack(AckKind::Announced, Ack::received(local_now()));
            }
            Err(crate::playback::PlaybackError::Conflict) => {
                // Never queued: the overlay still shows for its default
                // window and the command is not failed.
                log_warning!("Playback busy, announcement displayed without audio");
                self.send_ack(AckKind::Announced, Ack::received(local_now()));
            }
            Err(e) => {
                log_pipe!();
                log_error!("Announcement playback failed: {e}");
                self.send_ack(
                    AckKind::Announced,
                    Ack::error(e.to_string(), local_now()),
                );
            }
        }
    }

    /// Re-read minaret.toml, keeping the running config on any error.
    fn reload_config(&mut self) {
        match Config::load() {
            Ok(new_config) => {
                if new_config != self.config {
                    log_block_start!("Applying updated configuration");
                    if new_config.channel_address != self.config.channel_address {
                        log_indented!("Channel address changes apply on next start");
                    }
                    if !self.playback.is_busy() {
                        let volume: Box<dyn crate::playback::volume::VolumeControl> =
                            match new_config.mixer_command.clone() {
                                Some(cmd) => Box::new(crate::playback::volume::MixerVolume::new(cmd)),
                                None => Box::new(crate::playback::volume::NoopVolume),
                            };
                        self.playback = PlaybackService::new(
                            new_config.speech_command(),
                            new_config.player_command(),
                            new_config.speech_wpm(),
                            volume,
                        );
                    } else {
                        log_indented!("Playback settings apply after current playback finishes");
                    }
                    self.config = new_config;
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Config reload failed, keeping previous configuration: {e:#}");
            }
        }
    }

    fn set_overlay(&mut self, overlay: OverlayState) {
        if self.overlay != overlay {
            self.overlay = overlay;
            if let Some(ipc) = &self.ipc {
                ipc.send_overlay_changed(&self.overlay);
            }
        }
    }

    fn send_ack(&self, kind: AckKind, ack: Ack) {
        let Some(link) = &self.channel_link else {
            return;
        };
        let event = match kind {
            AckKind::Refreshed => OutboundEvent::Refreshed { ack },
            AckKind::Announced => OutboundEvent::Announced { ack },
        };
        if let Err(e) = link.send(&event) {
            log_warning!("Failed to send channel acknowledgement: {e}");
        }
    }

    /// Assemble the complete display state for this instant.
    fn build_view(&self, now: NaiveDateTime) -> KioskView {
        let today = now.date();

        let rows = match &self.daily_schedule {
            Some(schedule) => schedule
                .iter()
                .map(|entry| ScheduleRow {
                    name: entry.name.display_name().to_string(),
                    prayer_time: entry
                        .prayer_time
                        .map(clock::format_clock_12h)
                        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
                    iqamah_time: entry
                        .iqamah_time
                        .map(clock::format_clock_12h)
                        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
                    highlighted: self.current_period == Some(entry.name),
                })
                .collect(),
            None => KioskView::placeholder("").rows,
        };

        let countdown = self.daily_schedule.as_ref().and_then(|schedule| {
            schedule::next_iqamah(schedule, now, self.tomorrow_fajr).map(|next| CountdownView {
                prayer: next.name.display_name().to_string(),
                iqamah_clock: clock::format_clock_12h(next.time),
                remaining: clock::countdown_text(next.time, now),
            })
        });

        let zawal = self.zawal.map(|z| ZawalView {
            morning_start: clock::format_clock_12h(z.morning_start),
            morning_end: clock::format_clock_12h(z.morning_end),
            midday_start: clock::format_clock_12h(z.midday_start),
            midday_end: clock::format_clock_12h(z.midday_end),
            active: z.active_window(now).map(|w| {
                match w {
                    ZawalWindow::Morning => "morning",
                    ZawalWindow::Midday => "midday",
                }
                .to_string()
            }),
        });

        let (phase, page_index) = match self.cycle.phase() {
            CyclePhase::Primary => ("primary".to_string(), None),
            CyclePhase::Secondary { index } => ("secondary".to_string(), Some(index)),
        };
        let panel = match self.cycle.panel() {
            NoticePanel::ScheduleGrid => "schedule_grid",
            NoticePanel::ChangeNotice => "change_notice",
        };

        let day_record = self.store.prayer_day(today.day());
        let dates = DatesView {
            gregorian: day_record
                .map(|d| d.date.gregorian.display_line())
                .unwrap_or_default(),
            hijri: day_record
                .map(|d| d.date.hijri.display_line())
                .unwrap_or_default(),
        };

        let jumuah = if schedule::is_jumuah(today) {
            self.store
                .iqamah_month()
                .and_then(|m| m.entry_for(today))
                .map(|e| e.jumuah.clone())
                .filter(|j| !j.is_empty())
        } else {
            None
        };

        let iqamah_change = self
            .store
            .iqamah_month()
            .and_then(|m| detect_next_change(&m.data, today))
            .filter(|_| self.notice_eligible(today))
            .map(|change| {
                let row = |name: PrayerName, raw: Option<&str>| ChangeRow {
                    name: name.display_name().to_string(),
                    iqamah_time: clock::resolve_iqamah(change.date, raw)
                        .map(clock::format_clock_12h)
                        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string()),
                    changed: change.changed.is_changed(name),
                };
                ChangeNoticeView {
                    effective_date: change.date.format("%B %-d, %Y").to_string(),
                    rows: vec![
                        row(PrayerName::Fajr, change.times.fajr.as_deref()),
                        row(PrayerName::Dhuhr, change.times.dhuhr.as_deref()),
                        row(PrayerName::Asr, change.times.asr.as_deref()),
                        row(PrayerName::Maghrib, change.times.maghrib.as_deref()),
                        row(PrayerName::Isha, change.times.isha.as_deref()),
                    ],
                }
            });

        KioskView {
            active_period: self.current_period.map(|p| p.display_name().to_string()),
            rows,
            countdown,
            zawal,
            cycle: CycleView {
                phase,
                page_index,
                banner_index: self.cycle.banner_index(),
                panel: panel.to_string(),
            },
            overlay: self.overlay.clone(),
            ticker: clock::ticker_line(
                self.store
                    .masjid_config()
                    .and_then(|c| c.ticker_text.as_deref()),
                &self.config.ticker_fallback(),
            ),
            dates,
            jumuah,
            iqamah_change,
        }
    }

    /// Sleep until the next wall-clock second boundary, waking early for
    /// any message. Phase alignment keeps the tick from drifting across
    /// the boundary over long uptimes.
    fn wait_for_message(&mut self, now: DateTime<Local>) -> Option<SignalMessage> {
        use std::sync::mpsc::RecvTimeoutError;

        let sleep_duration =
            Duration::from_millis(1000u64.saturating_sub(u64::from(now.timestamp_subsec_millis())));

        let recv_result = if crate::time_source::is_simulated() {
            // The simulated source scales sleeps itself; run it on a side
            // thread and poll for messages meanwhile.
            let sleep_handle = std::thread::spawn(move || {
                crate::time_source::sleep(sleep_duration);
            });

            loop {
                match self
                    .signal_state
                    .signal_receiver
                    .recv_timeout(Duration::from_millis(10))
                {
                    Ok(msg) => break Ok(msg),
                    Err(RecvTimeoutError::Timeout) => {
                        if sleep_handle.is_finished() {
                            break Err(RecvTimeoutError::Timeout);
                        }
                    }
                    Err(e) => break Err(e),
                }
            }
        } else {
            let start = std::time::Instant::now();
            let poll_interval =
                Duration::from_millis(SIGNAL_POLL_INTERVAL_MS).min(sleep_duration.max(Duration::from_millis(1)));
            let mut remaining = sleep_duration;

            loop {
                let chunk = remaining.min(poll_interval);
                match self.signal_state.signal_receiver.recv_timeout(chunk) {
                    Ok(msg) => break Ok(msg),
                    Err(RecvTimeoutError::Timeout) => {
                        if start.elapsed() >= sleep_duration {
                            break Err(RecvTimeoutError::Timeout);
                        }
                        remaining = sleep_duration.saturating_sub(start.elapsed());
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        match recv_result {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                if self.signal_state.running.load(Ordering::SeqCst) {
                    log_pipe!();
                    log_error!("Signal handler disconnected unexpectedly");
                    log_indented!("Signals will no longer be processed");
                }
                None
            }
        }
    }
}

enum ReloadTrigger {
    /// Scheduled refetch or startup load: no overlay, no acknowledgement.
    Silent,
    /// SIGUSR2 or config edit: overlay, no acknowledgement.
    Overlay,
    /// Channel `client:reload`: overlay plus acknowledgement.
    Commanded,
}

impl ReloadTrigger {
    fn overlay(&self) -> bool {
        !matches!(self, ReloadTrigger::Silent)
    }

    fn acked(&self) -> bool {
        matches!(self, ReloadTrigger::Commanded)
    }
}

enum AckKind {
    Refreshed,
    Announced,
}

fn local_now() -> DateTime<Local> {
    crate::time_source::now()
}

/// Next 06:00 or 18:00 local boundary after `now`, as a deadline rather
/// than an interval.
pub fn next_refresh_deadline(now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    for hour in FEED_REFRESH_HOURS {
        if let Some(candidate) = today.and_hms_opt(hour, 0, 0)
            && now < candidate
        {
            return candidate;
        }
    }
    today
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(FEED_REFRESH_HOURS[0], 0, 0))
        .unwrap_or(now)
}

/// Classify a wall-clock jump between ticks.
///
/// Forward jumps flag suspend/resume; backward jumps within the NTP
/// tolerance are ignored, larger ones classified as DST shifts or major
/// clock set-backs.
pub fn detect_time_anomaly(
    current_time: SystemTime,
    last_check_time: SystemTime,
) -> (bool, Option<String>) {
    match current_time.duration_since(last_check_time) {
        Ok(duration) => {
            let secs = duration.as_secs();

            if secs >= SUSPEND_THRESHOLD_SECS {
                let minutes = secs / 60;
                (
                    true,
                    Some(format!(
                        "Long time jump detected ({minutes} minutes). System likely resumed from suspend."
                    )),
                )
            } else if secs >= SHORT_JUMP_THRESHOLD_SECS {
                (
                    true,
                    Some(format!(
                        "Short time jump detected ({secs} seconds). Possible brief suspend or system delay."
                    )),
                )
            } else {
                (false, None)
            }
        }
        Err(_) => match last_check_time.duration_since(current_time) {
            Ok(backwards_duration) => {
                let backwards_secs = backwards_duration.as_secs();

                if backwards_secs <= NTP_ADJUSTMENT_TOLERANCE_SECS as u64 {
                    // NTP correction, ignore
                    (false, None)
                } else if backwards_secs <= DST_THRESHOLD_SECS {
                    (
                        true,
                        Some(format!(
                            "Time went backwards by {backwards_secs} seconds. Possible DST transition or clock adjustment."
                        )),
                    )
                } else {
                    let backwards_minutes = backwards_secs / 60;
                    (
                        true,
                        Some(format!(
                            "Large backwards time jump detected ({backwards_minutes} minutes). Major clock adjustment."
                        )),
                    )
                }
            }
            Err(_) => (
                true,
                Some("Unable to calculate time difference. Forcing schedule recompute.".to_string()),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{
        Banner, CalendarDay, ContentPage, DailyPrayerTimes, DateDescriptor, FeedError,
        IqamahEntry, IqamahMonth, MasjidConfig, MockFeedSource, PageType, PrayerTimings,
    };
    use crate::playback::volume::NoopVolume;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn test_signal_state() -> SignalState {
        let (signal_sender, signal_receiver) = std::sync::mpsc::channel();
        SignalState {
            running: Arc::new(AtomicBool::new(true)),
            signal_receiver,
            signal_sender,
        }
    }

    fn timings() -> PrayerTimings {
        PrayerTimings {
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
        }
    }

    fn calendar_day(date: &str, day: &str) -> CalendarDay {
        CalendarDay {
            date: date.into(),
            day: day.into(),
            month: None,
            year: None,
        }
    }

    fn prayer_month() -> Vec<DailyPrayerTimes> {
        (1..=31)
            .map(|d| DailyPrayerTimes {
                timings: timings(),
                date: DateDescriptor {
                    gregorian: calendar_day(&format!("{d:02}-03-2025"), &d.to_string()),
                    hijri: calendar_day(&format!("{d:02}-09-1446"), &d.to_string()),
                },
            })
            .collect()
    }

    fn iqamah_month() -> IqamahMonth {
        IqamahMonth {
            year: 2025,
            month: 3,
            data: vec![IqamahEntry {
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                fajr: Some("05:30".into()),
                dhuhr: Some("12:45".into()),
                asr: Some("16:00".into()),
                maghrib: None,
                isha: Some("20:10".into()),
                jumuah: vec![],
            }],
        }
    }

    fn masjid_config() -> MasjidConfig {
        MasjidConfig {
            year: 2025,
            month: 3,
            time_zone: None,
            qr_link: None,
            ticker_text: Some("Quran class Saturday ||| Parking lot closed".into()),
            announcements: Some("Eid prayer at 8 AM ||| Bring your own mat".into()),
            maghrib_sunset_addition_minutes: Some(5.0),
            always_display_iqamaah_time: Some(false),
            display_timer_duration: None,
        }
    }

    fn happy_feed() -> MockFeedSource {
        let mut feed = MockFeedSource::new();
        feed.expect_fetch_prayer_month()
            .returning(|| Ok(prayer_month()));
        feed.expect_fetch_banners().returning(|| {
            Ok(vec![
                Banner {
                    filename: "a.png".into(),
                    url: "https://cdn/a.png".into(),
                    duration: Some(5),
                },
                Banner {
                    filename: "b.png".into(),
                    url: "https://cdn/b.png".into(),
                    duration: None,
                },
            ])
        });
        feed.expect_fetch_masjid_config()
            .returning(|| Ok(masjid_config()));
        feed.expect_fetch_iqamah_month()
            .returning(|| Ok(iqamah_month()));
        feed.expect_fetch_pages().returning(|| Ok(vec![]));
        feed
    }

    fn engine_with(feed: MockFeedSource) -> Engine {
        let config: Config = toml::from_str("").unwrap();
        let playback = PlaybackService::new(
            "true".to_string(),
            "true".to_string(),
            200,
            Box::new(NoopVolume),
        );
        Engine::new(EngineParams {
            config,
            signal_state: test_signal_state(),
            feed: Box::new(feed),
            playback,
            channel_link: None,
            ipc: None,
            debug_enabled: false,
        })
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn reload_builds_schedule_and_view() {
        let mut engine = engine_with(happy_feed());
        let now = at(10, 0, 0);
        engine.run_reload(now, ReloadTrigger::Silent);
        engine.recompute_day(now);
        engine.reset_cycle(now);
        engine.tick(now);

        let view = engine.last_view.clone().unwrap();
        assert_eq!(view.rows.len(), 5);
        assert_eq!(view.rows[0].prayer_time, "5:10 AM");
        assert_eq!(view.rows[0].iqamah_time, "5:30 AM");
        // Maghrib Iqamah derives from sunset + offset, not the table
        assert_eq!(view.rows[3].iqamah_time, "6:25 PM");
        assert_eq!(view.active_period.as_deref(), Some("Fajr"));
        assert!(view.ticker.contains("Quran class Saturday"));
        assert!(view.ticker.contains(TICKER_SEPARATOR.trim()));
        assert!(view.zawal.is_some());
    }

    #[test]
    fn partial_reload_failure_dismisses_overlay() {
        let mut feed = MockFeedSource::new();
        feed.expect_fetch_prayer_month()
            .returning(|| Ok(prayer_month()));
        // Second of five fetches fails
        feed.expect_fetch_banners()
            .returning(|| Err(FeedError::Unavailable("banners")));
        feed.expect_fetch_masjid_config()
            .returning(|| Ok(masjid_config()));
        feed.expect_fetch_iqamah_month()
            .returning(|| Ok(iqamah_month()));
        feed.expect_fetch_pages().returning(|| Ok(vec![]));

        let mut engine = engine_with(feed);
        let now = at(10, 0, 0);
        engine.run_reload(now, ReloadTrigger::Overlay);

        // Overlay dismissed, nothing left pending
        assert!(engine.overlay.is_none());
        assert!(engine.reload_grace_until.is_none());
        // The successful first fetch is kept
        assert!(engine.store.prayer_month().is_some());
    }

    #[test]
    fn successful_commanded_reload_resets_cycle_and_holds_grace() {
        let mut engine = engine_with(happy_feed());
        let now = at(10, 0, 0);
        engine.run_reload(now, ReloadTrigger::Overlay);

        assert!(matches!(engine.overlay, OverlayState::Reload { .. }));
        if let OverlayState::Reload { steps } = &engine.overlay {
            assert!(steps.iter().all(|s| s.status == FetchStatus::Done));
        }
        assert_eq!(engine.cycle.phase(), CyclePhase::Primary);
        assert!(engine.reload_grace_until.is_some());

        // Grace expiry dismisses the overlay on the next tick
        engine.tick(at(10, 0, 2));
        assert!(engine.overlay.is_none());
    }

    #[test]
    fn zero_durations_fall_back_to_default_dwell() {
        let mut feed = MockFeedSource::new();
        feed.expect_fetch_prayer_month()
            .returning(|| Ok(prayer_month()));
        feed.expect_fetch_banners().returning(|| {
            Ok(vec![
                Banner {
                    filename: "a.png".into(),
                    url: "https://cdn/a.png".into(),
                    duration: Some(5),
                },
                Banner {
                    filename: "b.png".into(),
                    url: "https://cdn/b.png".into(),
                    duration: Some(0),
                },
            ])
        });
        feed.expect_fetch_masjid_config()
            .returning(|| Ok(masjid_config()));
        feed.expect_fetch_iqamah_month()
            .returning(|| Ok(iqamah_month()));
        feed.expect_fetch_pages().returning(|| {
            Ok(vec![ContentPage {
                id: "p1".into(),
                title: "Donation drive".into(),
                page_type: PageType::Text,
                content: Some("Target: new carpet".into()),
                image_url: None,
                page_duration: Some(0),
                order: 1,
                is_active: true,
            }])
        });

        let mut engine = engine_with(feed);
        engine.run_reload(at(10, 0, 0), ReloadTrigger::Silent);
        assert_eq!(engine.cycle.phase(), CyclePhase::Primary);

        // A published duration of 0 holds for the 10s default, not an
        // instant skip
        engine.tick(at(10, 0, 5));
        assert_eq!(engine.cycle.banner_index(), 1);
        engine.tick(at(10, 0, 6));
        assert_eq!(engine.cycle.phase(), CyclePhase::Primary);
        assert_eq!(engine.cycle.banner_index(), 1);

        // Banner cycle completes at 5 + 10, handing off to the page
        engine.tick(at(10, 0, 15));
        assert_eq!(engine.cycle.phase(), CyclePhase::Secondary { index: 0 });
        engine.tick(at(10, 0, 16));
        assert_eq!(engine.cycle.phase(), CyclePhase::Secondary { index: 0 });

        // The zero-duration page dwells its full 10s too
        engine.tick(at(10, 0, 25));
        assert_eq!(engine.cycle.phase(), CyclePhase::Primary);
    }

    #[test]
    fn iqamah_alert_appears_within_window_and_clears() {
        let mut engine = engine_with(happy_feed());
        let now = at(10, 0, 0);
        engine.run_reload(now, ReloadTrigger::Silent);

        // 25 seconds before Dhuhr Iqamah (12:45)
        engine.tick(at(12, 44, 35));
        match &engine.overlay {
            OverlayState::IqamahAlert { prayer, remaining } => {
                assert_eq!(prayer, "Dhuhr");
                assert_eq!(remaining, "00:00:25");
            }
            other => panic!("expected iqamah alert, got {other:?}"),
        }

        // Past the Iqamah the alert clears
        engine.tick(at(12, 45, 1));
        assert!(engine.overlay.is_none());
    }

    #[test]
    fn announce_without_content_acks_error_and_shows_nothing() {
        let mut feed = MockFeedSource::new();
        feed.expect_fetch_prayer_month()
            .returning(|| Ok(prayer_month()));
        feed.expect_fetch_banners().returning(|| Ok(vec![]));
        feed.expect_fetch_masjid_config().returning(|| {
            Ok(MasjidConfig {
                announcements: None,
                ..masjid_config()
            })
        });
        feed.expect_fetch_iqamah_month()
            .returning(|| Ok(iqamah_month()));
        feed.expect_fetch_pages().returning(|| Ok(vec![]));

        let mut engine = engine_with(feed);
        let now = at(10, 0, 0);
        engine.handle_announce(AnnouncePayload::default(), now);

        assert!(engine.overlay.is_none());
        assert!(engine.announce_until.is_none());
    }

    #[test]
    fn announce_shows_overlay_and_dismisses_after_window() {
        let mut engine = engine_with(happy_feed());
        let now = at(10, 0, 0);
        engine.run_reload(now, ReloadTrigger::Silent);
        engine.handle_announce(AnnouncePayload::default(), now);

        match &engine.overlay {
            OverlayState::Announce { text } => {
                assert_eq!(text, "Eid prayer at 8 AM\nBring your own mat");
            }
            other => panic!("expected announce overlay, got {other:?}"),
        }

        // Default window is 5 seconds
        engine.tick(at(10, 0, 4));
        assert!(matches!(engine.overlay, OverlayState::Announce { .. }));
        engine.tick(at(10, 0, 6));
        assert!(engine.overlay.is_none());
    }

    #[test]
    fn refresh_deadline_picks_next_boundary() {
        assert_eq!(next_refresh_deadline(at(3, 0, 0)), at(6, 0, 0));
        assert_eq!(next_refresh_deadline(at(6, 0, 0)), at(18, 0, 0));
        assert_eq!(next_refresh_deadline(at(12, 0, 0)), at(18, 0, 0));
        let next = next_refresh_deadline(at(19, 0, 0));
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2025, 3, 2)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn forward_jump_is_flagged_backward_ntp_is_not() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let (anomaly, _) = detect_time_anomaly(base + Duration::from_secs(120), base);
        assert!(anomaly);

        let (anomaly, _) = detect_time_anomaly(base + Duration::from_secs(1), base);
        assert!(!anomaly);

        // 3 seconds backwards fits NTP tolerance
        let (anomaly, _) = detect_time_anomaly(base, base + Duration::from_secs(3));
        assert!(!anomaly);

        // 30 minutes backwards does not
        let (anomaly, reason) = detect_time_anomaly(base, base + Duration::from_secs(1800));
        assert!(anomaly);
        assert!(reason.unwrap().contains("backwards"));
    }
}
