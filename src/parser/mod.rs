//! Best-effort extraction of JSON objects from free-form model replies.
//!
//! Nothing here fails: a reply with no object, or with one that does not
//! decode, is replaced by the default record of the calling site. The typed
//! views in [`views`] then read the decoded object field by field so a
//! partially well-formed reply keeps whatever it got right.

mod views;

pub use views::*;

use serde_json::{json, Map, Value};
use tracing::debug;

/// How much of an unparseable scene reply is kept for inspection.
pub const RAW_RESPONSE_LIMIT: usize = 500;

/// Greedy brace match: everything from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode the embedded object, or `None` if there is none or it is malformed.
pub fn try_parse_object(text: &str) -> Option<Map<String, Value>> {
    let candidate = extract_json_object(text)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Embedded JSON did not decode");
            None
        }
    }
}

/// Decode the embedded object, falling back to `default` unchanged.
pub fn parse_or_default(text: &str, default: Value) -> Value {
    try_parse_object(text).map(Value::Object).unwrap_or(default)
}

/// Fallback for scene analysis replies; keeps the head of the raw text.
pub fn scene_default(response_text: &str) -> Value {
    json!({
        "instruments": [],
        "visibility_score": 7,
        "scene_challenges": [],
        "estimated_phase": "unknown",
        "raw_response": response_text.chars().take(RAW_RESPONSE_LIMIT).collect::<String>(),
    })
}

/// Fallback for strategy selection replies.
pub fn strategy_default() -> Value {
    json!({
        "detector": "yolov8_surgical",
        "tracker": "byte_track",
        "reasoning": "Default selection",
    })
}

/// Fallback for recovery planning replies.
pub fn recovery_default() -> Value {
    json!({
        "action": "reinitialize",
        "parameters": {},
        "reasoning": "Default recovery",
    })
}
