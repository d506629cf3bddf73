//! Announcement playback service.
//!
//! Single owned instance driving speech synthesis and audio playback as
//! child processes. A boolean exclusive lock guards playback: a second
//! `speak`/`play_audio` call while the first is active is rejected, never
//! queued. The lock releases on a polled deadline for speech (the word-count
//! duration estimate) and on child exit for audio; the engine tick calls
//! [`PlaybackService::poll`] to drive both.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;

pub mod speech;
pub mod volume;

use speech::{estimate_speech_duration, normalize_for_speech};
use volume::VolumeControl;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Lock already held. Callers fall back to a default duration estimate
    /// instead of failing the triggering command.
    #[error("playback already in progress")]
    Conflict,

    /// The speech or player process failed to start.
    #[error("failed to start {kind} process '{command}': {source}")]
    Load {
        kind: &'static str,
        command: String,
        source: std::io::Error,
    },
}

enum ActiveJob {
    Speech {
        child: Child,
        release_at: DateTime<Local>,
    },
    Audio {
        child: Child,
    },
}

pub struct PlaybackService {
    speech_command: String,
    player_command: String,
    speech_wpm: u32,
    volume: Box<dyn VolumeControl>,
    /// Exclusive playback lock. Exactly one owner at a time, no reentrancy.
    locked: bool,
    active: Option<ActiveJob>,
}

impl PlaybackService {
    pub fn new(
        speech_command: String,
        player_command: String,
        speech_wpm: u32,
        volume: Box<dyn VolumeControl>,
    ) -> Self {
        Self {
            speech_command,
            player_command,
            speech_wpm,
            volume,
            locked: false,
            active: None,
        }
    }

    /// Whether the exclusive lock is currently held.
    pub fn is_busy(&self) -> bool {
        self.locked
    }

    /// Speak `text` through the configured speech engine.
    ///
    /// Acquires the lock, spawns the speech process with normalized text,
    /// and returns the estimated duration. The lock releases when
    /// [`poll`](Self::poll) observes the estimate deadline, not when the
    /// process exits.
    pub fn speak(&mut self, text: &str, now: DateTime<Local>) -> Result<Duration, PlaybackError> {
        if self.locked {
            return Err(PlaybackError::Conflict);
        }

        self.raise_volume();

        let spoken = normalize_for_speech(text);
        let estimated = estimate_speech_duration(text, self.speech_wpm);

        let mut command = build_command("speech", &self.speech_command)?;
        command
            .arg("-s")
            .arg(self.speech_wpm.to_string())
            .arg(&spoken)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| PlaybackError::Load {
            kind: "speech",
            command: self.speech_command.clone(),
            source,
        })?;

        let release_at = now + chrono::Duration::milliseconds(estimated.as_millis() as i64);
        self.locked = true;
        self.active = Some(ActiveJob::Speech { child, release_at });

        Ok(estimated)
    }

    /// Play a pre-rendered audio resource through the configured player.
    ///
    /// The lock releases when [`poll`](Self::poll) observes the player
    /// process exit. A spawn failure leaves the lock unheld.
    pub fn play_audio(&mut self, url: &str) -> Result<(), PlaybackError> {
        if self.locked {
            return Err(PlaybackError::Conflict);
        }

        self.raise_volume();

        let mut command = build_command("player", &self.player_command)?;
        command
            .arg("--no-video")
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| PlaybackError::Load {
            kind: "player",
            command: self.player_command.clone(),
            source,
        })?;

        self.locked = true;
        self.active = Some(ActiveJob::Audio { child });

        Ok(())
    }

    /// Forcibly halt any in-flight playback.
    ///
    /// Does not release the lock itself; the owning release path (the speech
    /// deadline or the audio exit observed by `poll`) still runs.
    pub fn stop_all(&mut self) {
        if let Some(ActiveJob::Speech { child, .. } | ActiveJob::Audio { child }) =
            self.active.as_mut()
        {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Advance release bookkeeping. Returns true if the lock was released
    /// during this poll.
    pub fn poll(&mut self, now: DateTime<Local>) -> bool {
        match self.active.as_mut() {
            Some(ActiveJob::Speech { child, release_at }) => {
                if now >= *release_at {
                    let _ = child.kill();
                    let _ = child.wait();
                    self.active = None;
                    self.locked = false;
                    true
                } else {
                    false
                }
            }
            Some(ActiveJob::Audio { child }) => match child.try_wait() {
                Ok(Some(_)) | Err(_) => {
                    self.active = None;
                    self.locked = false;
                    true
                }
                Ok(None) => false,
            },
            None => false,
        }
    }

    // Volume failure is logged and non-fatal.
    fn raise_volume(&self) {
        match self.volume.set_max() {
            Ok(confirmation) => {
                log_debug!("Volume: {confirmation}");
            }
            Err(e) => {
                log_warning!("Failed to raise output volume: {e}");
            }
        }
        if let Ok(level) = self.volume.read_level() {
            log_debug!("Output level: {level}");
        }
    }
}

fn build_command(kind: &'static str, line: &str) -> Result<Command, PlaybackError> {
    let mut parts = line.split_whitespace();
    let program = parts.next().ok_or_else(|| PlaybackError::Load {
        kind,
        command: line.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "empty command line"),
    })?;
    let mut command = Command::new(program);
    command.args(parts);
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::volume::{MockVolumeControl, NoopVolume};
    use super::*;
    use chrono::TimeZone;

    fn service_with(speech: &str, player: &str) -> PlaybackService {
        PlaybackService::new(speech.to_string(), player.to_string(), 200, Box::new(NoopVolume))
    }

    fn t(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn second_speak_while_locked_is_rejected() {
        let mut service = service_with("true", "true");
        let now = t(12, 0, 0);
        service.speak("first announcement", now).unwrap();
        assert!(service.is_busy());
        assert!(matches!(
            service.speak("second announcement", now),
            Err(PlaybackError::Conflict)
        ));
    }

    #[test]
    fn speech_lock_releases_on_estimate_deadline() {
        let mut service = service_with("true", "true");
        let now = t(12, 0, 0);
        let estimated = service.speak("short", now).unwrap();
        assert_eq!(estimated, Duration::from_secs(8));

        // Before the deadline the lock stays held even though the child
        // already exited.
        assert!(!service.poll(t(12, 0, 4)));
        assert!(service.is_busy());

        assert!(service.poll(t(12, 0, 9)));
        assert!(!service.is_busy());
    }

    #[test]
    fn audio_lock_releases_on_process_exit() {
        let mut service = service_with("true", "true");
        service.play_audio("https://example.com/adhan.mp3").unwrap();
        assert!(service.is_busy());

        // "true" exits immediately; give it a moment then poll.
        std::thread::sleep(Duration::from_millis(50));
        assert!(service.poll(t(12, 0, 0)));
        assert!(!service.is_busy());
    }

    #[test]
    fn spawn_failure_leaves_lock_unheld() {
        let mut service = service_with("/nonexistent/speech-engine", "true");
        let result = service.speak("hello", t(12, 0, 0));
        assert!(matches!(result, Err(PlaybackError::Load { .. })));
        assert!(!service.is_busy());
    }

    #[test]
    fn stop_all_does_not_release_lock() {
        let mut service = service_with("sleep 30", "true");
        let now = t(12, 0, 0);
        service.speak("a long announcement", now).unwrap();
        service.stop_all();
        assert!(service.is_busy());
        // Release still happens through the deadline path.
        assert!(service.poll(t(12, 1, 0)));
        assert!(!service.is_busy());
    }

    #[test]
    fn volume_is_raised_before_playback() {
        let mut volume = MockVolumeControl::new();
        volume
            .expect_set_max()
            .times(1)
            .returning(|| Ok("volume set to 100%".to_string()));
        volume
            .expect_read_level()
            .returning(|| Ok("100/100".to_string()));

        let mut service =
            PlaybackService::new("true".to_string(), "true".to_string(), 200, Box::new(volume));
        service.speak("test", t(9, 0, 0)).unwrap();
    }
}
