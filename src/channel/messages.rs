use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages pushed by the processing service
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerMessage {
    Connected {
        message: Option<String>,
        #[serde(rename = "audioInfo")]
        audio_info: Option<AudioInfo>,
        duration: Option<Value>,
    },
    Progress {
        value: Option<Value>,
        #[serde(rename = "audioInfo")]
        audio_info: Option<AudioInfo>,
        duration: Option<Value>,
    },
    Pong,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct AudioInfo {
    duration: Option<Value>,
}

/// Decoded channel event
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Server acknowledged the connection
    Connected {
        message: Option<String>,
        duration_hint: Option<f64>,
    },
    /// Absolute progress reading; `value` is absent for duration-only updates
    Progress {
        value: Option<f64>,
        duration_hint: Option<f64>,
    },
    /// Reply to a keepalive ping
    Pong,
}

impl ChannelEvent {
    /// Decode a text frame. Unknown message types decode to `None`.
    pub fn decode(text: &str) -> Result<Option<Self>, DecodeError> {
        let event = match serde_json::from_str::<ServerMessage>(text)? {
            ServerMessage::Connected {
                message,
                audio_info,
                duration,
            } => Some(ChannelEvent::Connected {
                message,
                duration_hint: duration_hint(audio_info.as_ref(), duration.as_ref()),
            }),
            ServerMessage::Progress {
                value,
                audio_info,
                duration,
            } => Some(ChannelEvent::Progress {
                value: value.as_ref().and_then(Value::as_f64),
                duration_hint: duration_hint(audio_info.as_ref(), duration.as_ref()),
            }),
            ServerMessage::Pong => Some(ChannelEvent::Pong),
            ServerMessage::Unknown => None,
        };
        Ok(event)
    }

    pub fn duration_hint(&self) -> Option<f64> {
        match self {
            ChannelEvent::Connected { duration_hint, .. }
            | ChannelEvent::Progress { duration_hint, .. } => *duration_hint,
            ChannelEvent::Pong => None,
        }
    }
}

/// `audioInfo.duration` wins over the top-level `duration`; only positive
/// finite numbers are hints (the server sends `null` until it knows).
fn duration_hint(audio_info: Option<&AudioInfo>, duration: Option<&Value>) -> Option<f64> {
    let positive = |v: &Value| v.as_f64().filter(|d| d.is_finite() && *d > 0.0);

    audio_info
        .and_then(|info| info.duration.as_ref())
        .and_then(positive)
        .or_else(|| duration.and_then(positive))
}

/// Messages sent to the processing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

impl ClientMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_connected_with_audio_info() {
        let json = r#"{
            "type": "connected",
            "message": "WebSocket connection established",
            "audioInfo": {"duration": 93.5}
        }"#;

        let event = ChannelEvent::decode(json).unwrap();
        assert_eq!(
            event,
            Some(ChannelEvent::Connected {
                message: Some("WebSocket connection established".to_string()),
                duration_hint: Some(93.5),
            })
        );
    }

    #[test]
    fn test_decode_connected_with_unknown_duration() {
        let json = r#"{"type": "connected", "audioInfo": {"duration": null}}"#;

        let event = ChannelEvent::decode(json).unwrap().unwrap();
        assert_eq!(event.duration_hint(), None);
    }

    #[test]
    fn test_decode_progress() {
        let json = r#"{
            "type": "progress",
            "value": 40,
            "duration": 12.0,
            "timestamp": "2025-01-10T14:30:05.123456"
        }"#;

        let event = ChannelEvent::decode(json).unwrap();
        assert_eq!(
            event,
            Some(ChannelEvent::Progress {
                value: Some(40.0),
                duration_hint: Some(12.0),
            })
        );
    }

    #[test]
    fn test_audio_info_duration_takes_precedence() {
        let json = r#"{"type": "progress", "value": 5, "audioInfo": {"duration": 30}, "duration": 99}"#;

        let event = ChannelEvent::decode(json).unwrap().unwrap();
        assert_eq!(event.duration_hint(), Some(30.0));
    }

    #[test]
    fn test_non_positive_duration_is_not_a_hint() {
        let json = r#"{"type": "progress", "value": 5, "audioInfo": {"duration": 0}, "duration": -3}"#;

        let event = ChannelEvent::decode(json).unwrap().unwrap();
        assert_eq!(event.duration_hint(), None);
    }

    #[test]
    fn test_progress_without_numeric_value() {
        let json = r#"{"type": "progress", "value": "soon", "duration": 8}"#;

        let event = ChannelEvent::decode(json).unwrap();
        assert_eq!(
            event,
            Some(ChannelEvent::Progress {
                value: None,
                duration_hint: Some(8.0),
            })
        );
    }

    #[test]
    fn test_decode_pong_and_unknown() {
        assert_eq!(
            ChannelEvent::decode(r#"{"type": "pong"}"#).unwrap(),
            Some(ChannelEvent::Pong)
        );
        assert_eq!(
            ChannelEvent::decode(r#"{"type": "status", "value": 1}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(ChannelEvent::decode("not json").is_err());
        assert!(ChannelEvent::decode(r#"{"value": 10}"#).is_err());
    }

    #[test]
    fn test_ping_serialization() {
        assert_eq!(ClientMessage::Ping.to_text().unwrap(), r#"{"type":"ping"}"#);
    }
}
