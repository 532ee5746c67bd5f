//! Control frames — JSON text messages a phone interleaves with binary
//! sample packets on its data channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Known control frames, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlFrame {
    /// First frame after the channel opens. Announces the device.
    Hello {
        #[serde(default)]
        label: Option<String>,
    },

    /// Liveness only. Producer clock in milliseconds.
    Ping {
        #[serde(default)]
        t: Option<f64>,
    },
}

/// A classified text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TextFrame {
    Control(ControlFrame),
    /// Anything else. Relayed to viewers as a `msg` event.
    Other(Value),
}

/// Classify a text frame from the data channel. Never fails: non-JSON text
/// is wrapped as `{"text": ...}`.
pub fn parse_text_frame(text: &str) -> TextFrame {
    if let Ok(frame) = serde_json::from_str::<ControlFrame>(text) {
        return TextFrame::Control(frame);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => TextFrame::Other(Value::Object(map)),
        _ => TextFrame::Other(serde_json::json!({ "text": text })),
    }
}
