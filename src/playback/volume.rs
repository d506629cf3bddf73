//! Output-volume collaborator consulted before every playback attempt.
//!
//! The kiosk hardware is expected to sit at full volume whenever an
//! announcement plays, so the service asks this collaborator to raise
//! output to maximum first. Failure here is logged and non-fatal; a
//! missing mixer command degrades to a no-op.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static LEVEL_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,3})%\]").unwrap());

/// Volume operations the playback service needs from the platform mixer.
#[cfg_attr(test, mockall::automock)]
pub trait VolumeControl: Send {
    /// Raise output volume to maximum. Returns a confirmation string.
    fn set_max(&self) -> Result<String>;

    /// Read the current level as a "current/max" string.
    fn read_level(&self) -> Result<String>;
}

/// Mixer-backed implementation shelling out to a configurable command
/// (amixer-compatible argument conventions).
pub struct MixerVolume {
    command: String,
}

impl MixerVolume {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl VolumeControl for MixerVolume {
    fn set_max(&self) -> Result<String> {
        let output = std::process::Command::new(&self.command)
            .args(["-q", "sset", "Master", "100%"])
            .output()
            .with_context(|| format!("Failed to run mixer command '{}'", self.command))?;

        if !output.status.success() {
            anyhow::bail!(
                "Mixer command '{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok("volume set to 100%".to_string())
    }

    fn read_level(&self) -> Result<String> {
        let output = std::process::Command::new(&self.command)
            .args(["sget", "Master"])
            .output()
            .with_context(|| format!("Failed to run mixer command '{}'", self.command))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let current = LEVEL_PERCENT
            .captures(&stdout)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .context("Mixer output did not contain a level percentage")?;

        Ok(format!("{current}/100"))
    }
}

/// No-op implementation used when no mixer command is configured and in
/// tests that don't care about volume.
pub struct NoopVolume;

impl VolumeControl for NoopVolume {
    fn set_max(&self) -> Result<String> {
        Ok("volume control disabled".to_string())
    }

    fn read_level(&self) -> Result<String> {
        Ok("--/--".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_volume_always_succeeds() {
        let volume = NoopVolume;
        assert!(volume.set_max().is_ok());
        assert_eq!(volume.read_level().unwrap(), "--/--");
    }

    #[test]
    fn level_regex_extracts_percentage() {
        let caps = LEVEL_PERCENT
            .captures("  Mono: Playback 65536 [87%] [on]")
            .unwrap();
        assert_eq!(&caps[1], "87");
    }
}
