//! Configuration validation functionality.
//!
//! Range and format checks run after every load so a bad edit fails at
//! reload time with a clear message instead of surfacing as odd display
//! behavior hours later.

use anyhow::Result;
use chrono::Offset;

use super::Config;

/// Validate a loaded configuration before it is applied.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(address) = config.channel_address.as_deref() {
        validate_channel_address(address)?;
    }

    if let Some(limit) = config.channel_retry_limit
        && limit == 0
    {
        anyhow::bail!("channel_retry_limit must be at least 1");
    }

    if let Some(delay_ms) = config.channel_retry_delay_ms
        && !(100..=60_000).contains(&delay_ms)
    {
        anyhow::bail!(
            "channel_retry_delay_ms ({} ms) must be between 100 and 60000 milliseconds",
            delay_ms
        );
    }

    if let Some(tz_name) = config.timezone.as_deref() {
        validate_timezone(tz_name)?;
    }

    if let Some(wpm) = config.speech_wpm
        && !(50..=500).contains(&wpm)
    {
        anyhow::bail!(
            "speech_wpm ({}) must be between 50 and 500 words per minute",
            wpm
        );
    }

    if let Some(secs) = config.page_duration_secs
        && !(1..=600).contains(&secs)
    {
        anyhow::bail!(
            "page_duration_secs ({} s) must be between 1 and 600 seconds",
            secs
        );
    }

    if let Some(secs) = config.notice_toggle_secs
        && !(1..=600).contains(&secs)
    {
        anyhow::bail!(
            "notice_toggle_secs ({} s) must be between 1 and 600 seconds",
            secs
        );
    }

    if let Some(secs) = config.announce_overlay_secs
        && !(1..=120).contains(&secs)
    {
        anyhow::bail!(
            "announce_overlay_secs ({} s) must be between 1 and 120 seconds",
            secs
        );
    }

    if let Some(secs) = config.iqamah_alert_window_secs
        && !(5..=600).contains(&secs)
    {
        anyhow::bail!(
            "iqamah_alert_window_secs ({} s) must be between 5 and 600 seconds",
            secs
        );
    }

    if let Some(ms) = config.reload_grace_ms
        && ms > 10_000
    {
        anyhow::bail!("reload_grace_ms ({} ms) must not exceed 10000 milliseconds", ms);
    }

    if let Some(command) = config.speech_command.as_deref()
        && command.trim().is_empty()
    {
        anyhow::bail!("speech_command must not be empty");
    }

    if let Some(command) = config.player_command.as_deref()
        && command.trim().is_empty()
    {
        anyhow::bail!("player_command must not be empty");
    }

    Ok(())
}

fn validate_channel_address(address: &str) -> Result<()> {
    let Some((host, port)) = address.rsplit_once(':') else {
        anyhow::bail!("channel_address '{}' must be in host:port form", address);
    };
    if host.is_empty() {
        anyhow::bail!("channel_address '{}' is missing a host", address);
    }
    if port.parse::<u16>().is_err() {
        anyhow::bail!("channel_address '{}' has an invalid port", address);
    }
    Ok(())
}

/// Validate the timezone name against the IANA database. A zone that
/// disagrees with the system's current offset is only warned about; all
/// schedule computation stays in local time.
fn validate_timezone(tz_name: &str) -> Result<()> {
    let zone: chrono_tz::Tz = tz_name
        .parse()
        .map_err(|_| anyhow::anyhow!("timezone '{}' is not a valid IANA zone name", tz_name))?;

    let now_utc = chrono::Utc::now();
    let configured_offset = now_utc.with_timezone(&zone).offset().fix();
    let local_offset = now_utc.with_timezone(&chrono::Local).offset().fix();

    if configured_offset != local_offset {
        log_pipe!();
        log_warning!(
            "Configured timezone {} ({}) differs from the system zone ({})",
            tz_name,
            configured_offset,
            local_offset
        );
        log_indented!("Schedule times are computed in the system's local time");
    }

    Ok(())
}
