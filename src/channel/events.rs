//! Wire protocol for the real-time command channel.
//!
//! Newline-delimited JSON, one event object per line, discriminated by an
//! `event` tag. The server pushes `client:reload` and `client:announce`;
//! the engine answers with `client:refreshed` and `client:announced`
//! acknowledgements carrying a status and timestamp.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Commands the server pushes to this client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum InboundEvent {
    #[serde(rename = "client:reload")]
    Reload {
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    #[serde(rename = "client:announce")]
    Announce {
        #[serde(default)]
        payload: Option<AnnouncePayload>,
    },
}

/// Optional announce payload. A pre-rendered audio URL takes precedence
/// over spoken text.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AnnouncePayload {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Acknowledgements sent back to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum OutboundEvent {
    #[serde(rename = "client:refreshed")]
    Refreshed {
        #[serde(flatten)]
        ack: Ack,
    },
    #[serde(rename = "client:announced")]
    Announced {
        #[serde(flatten)]
        ack: Ack,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Received,
    Error,
}

impl Ack {
    pub fn received(now: DateTime<Local>) -> Self {
        Self {
            status: AckStatus::Received,
            error: None,
            timestamp: now.to_rfc3339(),
        }
    }

    pub fn error(message: impl Into<String>, now: DateTime<Local>) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(message.into()),
            timestamp: now.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_reload_event() {
        let event: InboundEvent = serde_json::from_str(r#"{"event":"client:reload"}"#).unwrap();
        assert!(matches!(event, InboundEvent::Reload { payload: None }));
    }

    #[test]
    fn parses_announce_with_audio_url() {
        let event: InboundEvent = serde_json::from_str(
            r#"{"event":"client:announce","payload":{"audio_url":"https://cdn.example/a.mp3"}}"#,
        )
        .unwrap();
        match event {
            InboundEvent::Announce { payload: Some(p) } => {
                assert_eq!(p.audio_url.as_deref(), Some("https://cdn.example/a.mp3"));
                assert!(p.text.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_tag_is_rejected() {
        let result = serde_json::from_str::<InboundEvent>(r#"{"event":"client:restart"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn refreshed_ack_serializes_flat() {
        let now = Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let event = OutboundEvent::Refreshed {
            ack: Ack::received(now),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "client:refreshed");
        assert_eq!(json["status"], "received");
        assert!(json.get("error").is_none());
        assert!(json["timestamp"].as_str().unwrap().starts_with("2025-03-01T12:00:00"));
    }

    #[test]
    fn error_ack_carries_message() {
        let now = Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let event = OutboundEvent::Announced {
            ack: Ack::error("no announcement content", now),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "no announcement content");
    }
}
