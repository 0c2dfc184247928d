use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{recovery_default, scene_default, strategy_default, try_parse_object};
use crate::catalog::{Detector, RecoveryAction, Tracker};

/// Where a decoded record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    /// Decoded from the model's reply.
    Model,
    /// The reply had no usable object; the call-site default was used.
    Fallback,
    /// The model call itself failed.
    CallFailed,
}

/// An instrument reported in a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSighting {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

/// Scene analysis of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub instruments: Vec<InstrumentSighting>,
    pub scene_challenges: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_score: Option<f64>,
    pub estimated_phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub origin: ResponseOrigin,
    /// Fields the model sent that are not part of the schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Detector/tracker pairing chosen for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub detector: String,
    pub tracker: String,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub origin: ResponseOrigin,
}

/// Recovery step chosen after a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub action: String,
    pub parameters: Map<String, Value>,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub origin: ResponseOrigin,
}

const SCENE_FIELDS: &[&str] = &[
    "instruments",
    "scene_challenges",
    "visibility_score",
    "estimated_phase",
    "instrument_count",
    "recommendations",
    "raw_response",
    "error",
    "origin",
];

/// Reasoning text used when the model gives none.
pub const MODEL_RECOMMENDATION: &str = "Gemini recommendation";

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn instrument_list(map: &Map<String, Value>) -> Vec<InstrumentSighting> {
    let Some(items) = map.get("instruments").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(kind) => Some(InstrumentSighting {
                kind: kind.clone(),
                visible: None,
            }),
            Value::Object(obj) => str_field(obj, "type").map(|kind| InstrumentSighting {
                kind,
                visible: obj.get("visible").and_then(Value::as_bool),
            }),
            _ => None,
        })
        .collect()
}

impl SceneAnalysis {
    /// Decode a scene reply, or the scene default when it holds no object.
    pub fn from_completion(text: &str) -> Self {
        match try_parse_object(text) {
            Some(map) => Self::from_map(&map, ResponseOrigin::Model),
            None => Self::from_value(&scene_default(text), ResponseOrigin::Fallback),
        }
    }

    /// Read each field independently; bad fields take their own default.
    pub fn from_value(value: &Value, origin: ResponseOrigin) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map, origin),
            None => Self::from_map(&Map::new(), origin),
        }
    }

    fn from_map(map: &Map<String, Value>, origin: ResponseOrigin) -> Self {
        let extra = map
            .iter()
            .filter(|(k, _)| !SCENE_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            instruments: instrument_list(map),
            scene_challenges: string_list(map, "scene_challenges"),
            visibility_score: number_field(map, "visibility_score"),
            estimated_phase: str_field(map, "estimated_phase")
                .unwrap_or_else(|| "unknown".to_string()),
            instrument_count: number_field(map, "instrument_count")
                .filter(|n| *n >= 0.0)
                .map(|n| n as u32),
            recommendations: str_field(map, "recommendations"),
            raw_response: str_field(map, "raw_response"),
            error: str_field(map, "error"),
            origin,
            extra,
        }
    }

    /// Minimal record returned when the vision call itself fails.
    pub fn call_failed(error: impl Into<String>) -> Self {
        Self {
            instruments: Vec::new(),
            scene_challenges: Vec::new(),
            visibility_score: Some(5.0),
            estimated_phase: "unknown".to_string(),
            instrument_count: None,
            recommendations: None,
            raw_response: None,
            error: Some(error.into()),
            origin: ResponseOrigin::CallFailed,
            extra: Map::new(),
        }
    }

    /// Reported count, or the number of listed instruments.
    pub fn effective_instrument_count(&self) -> u32 {
        self.instrument_count
            .unwrap_or(self.instruments.len() as u32)
    }

    /// Instrument types in report order.
    pub fn instrument_types(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.kind.as_str()).collect()
    }
}

impl Strategy {
    /// Decode a strategy reply, or the strategy default when it holds no object.
    pub fn from_completion(text: &str) -> Self {
        match try_parse_object(text) {
            Some(map) => Self::from_map(&map, ResponseOrigin::Model),
            None => Self::from_value(&strategy_default(), ResponseOrigin::Fallback),
        }
    }

    /// Read each field independently; bad fields take their own default.
    pub fn from_value(value: &Value, origin: ResponseOrigin) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map, origin),
            None => Self::from_map(&Map::new(), origin),
        }
    }

    fn from_map(map: &Map<String, Value>, origin: ResponseOrigin) -> Self {
        Self {
            detector: str_field(map, "detector")
                .unwrap_or_else(|| Detector::default().as_str().to_string()),
            tracker: str_field(map, "tracker")
                .unwrap_or_else(|| Tracker::default().as_str().to_string()),
            reasoning: str_field(map, "reasoning")
                .unwrap_or_else(|| MODEL_RECOMMENDATION.to_string()),
            error: None,
            origin,
        }
    }

    /// Selected names that are not on the detector or tracker menu.
    pub fn off_menu(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if self.detector.parse::<Detector>().is_err() {
            names.push(self.detector.as_str());
        }
        if self.tracker.parse::<Tracker>().is_err() {
            names.push(self.tracker.as_str());
        }
        names
    }

    /// Default pairing returned when the reasoning call fails.
    pub fn call_failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            detector: Detector::default().as_str().to_string(),
            tracker: Tracker::default().as_str().to_string(),
            reasoning: format!("Default strategy (error: {})", error),
            error: Some(error),
            origin: ResponseOrigin::CallFailed,
        }
    }
}

impl RecoveryPlan {
    /// Decode a recovery reply, or the recovery default when it holds no object.
    pub fn from_completion(text: &str) -> Self {
        match try_parse_object(text) {
            Some(map) => Self::from_map(&map, ResponseOrigin::Model),
            None => Self::from_value(&recovery_default(), ResponseOrigin::Fallback),
        }
    }

    /// Read each field independently; bad fields take their own default.
    pub fn from_value(value: &Value, origin: ResponseOrigin) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map, origin),
            None => Self::from_map(&Map::new(), origin),
        }
    }

    fn from_map(map: &Map<String, Value>, origin: ResponseOrigin) -> Self {
        Self {
            action: str_field(map, "action")
                .unwrap_or_else(|| RecoveryAction::default().as_str().to_string()),
            parameters: map
                .get("parameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            reasoning: str_field(map, "reasoning")
                .unwrap_or_else(|| MODEL_RECOMMENDATION.to_string()),
            error: None,
            origin,
        }
    }

    /// Whether the action is one of the offered recovery options.
    pub fn is_on_menu(&self) -> bool {
        self.action.parse::<RecoveryAction>().is_ok()
    }

    /// Default recovery returned when the reasoning call fails.
    pub fn call_failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            action: RecoveryAction::default().as_str().to_string(),
            parameters: Map::new(),
            reasoning: format!("Default recovery (error: {})", error),
            error: Some(error),
            origin: ResponseOrigin::CallFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scene_full_reply() {
        let text = r#"Analysis:
{
  "instruments": [{"type": "grasper", "visible": true}, {"type": "hook", "visible": false}],
  "scene_challenges": ["smoke", "blood"],
  "visibility_score": 6,
  "estimated_phase": "dissection",
  "instrument_count": 2,
  "recommendations": "use a smoke-robust detector"
}"#;
        let scene = SceneAnalysis::from_completion(text);
        assert_eq!(scene.origin, ResponseOrigin::Model);
        assert_eq!(scene.instrument_types(), vec!["grasper", "hook"]);
        assert_eq!(scene.instruments[1].visible, Some(false));
        assert_eq!(scene.scene_challenges, vec!["smoke", "blood"]);
        assert_eq!(scene.visibility_score, Some(6.0));
        assert_eq!(scene.estimated_phase, "dissection");
        assert_eq!(scene.instrument_count, Some(2));
        assert!(scene.extra.is_empty());
    }

    #[test]
    fn test_scene_partial_reply_keeps_good_fields() {
        let text = r#"{"instruments": "lots", "visibility_score": "8", "estimated_phase": 3, "surgeon_note": "ok"}"#;
        let scene = SceneAnalysis::from_completion(text);
        assert_eq!(scene.origin, ResponseOrigin::Model);
        assert!(scene.instruments.is_empty());
        assert_eq!(scene.visibility_score, Some(8.0));
        assert_eq!(scene.estimated_phase, "unknown");
        assert_eq!(scene.extra.get("surgeon_note"), Some(&json!("ok")));
    }

    #[test]
    fn test_scene_fallback_keeps_raw_text() {
        let scene = SceneAnalysis::from_completion("The image is too dark to tell.");
        assert_eq!(scene.origin, ResponseOrigin::Fallback);
        assert_eq!(scene.visibility_score, Some(7.0));
        assert_eq!(
            scene.raw_response.as_deref(),
            Some("The image is too dark to tell.")
        );
    }

    #[test]
    fn test_scene_plain_string_instruments() {
        let scene = SceneAnalysis::from_completion(r#"{"instruments": ["grasper", 4, "clipper"]}"#);
        assert_eq!(scene.instrument_types(), vec!["grasper", "clipper"]);
        assert_eq!(scene.effective_instrument_count(), 2);
    }

    #[test]
    fn test_scene_call_failed() {
        let scene = SceneAnalysis::call_failed("quota exceeded");
        assert_eq!(scene.visibility_score, Some(5.0));
        assert_eq!(scene.error.as_deref(), Some("quota exceeded"));
        assert_eq!(scene.origin, ResponseOrigin::CallFailed);
    }

    #[test]
    fn test_strategy_unknown_names_kept() {
        let strategy = Strategy::from_completion(
            r#"{"detector": "byte_track", "tracker": "deep_sort", "reasoning": "ok"}"#,
        );
        assert_eq!(strategy.detector, "byte_track");
        assert_eq!(strategy.tracker, "deep_sort");
        assert_eq!(strategy.reasoning, "ok");
        assert_eq!(strategy.origin, ResponseOrigin::Model);
    }

    #[test]
    fn test_strategy_missing_fields_defaulted() {
        let strategy = Strategy::from_completion(r#"{"detector": "advanced_detector", "tracker": 7}"#);
        assert_eq!(strategy.detector, "advanced_detector");
        assert_eq!(strategy.tracker, "byte_track");
        assert_eq!(strategy.reasoning, MODEL_RECOMMENDATION);
    }

    #[test]
    fn test_strategy_fallback() {
        let strategy = Strategy::from_completion("I cannot provide that.");
        assert_eq!(strategy.detector, "yolov8_surgical");
        assert_eq!(strategy.tracker, "byte_track");
        assert_eq!(strategy.reasoning, "Default selection");
        assert_eq!(strategy.origin, ResponseOrigin::Fallback);
    }

    #[test]
    fn test_strategy_call_failed() {
        let strategy = Strategy::call_failed("timeout");
        assert_eq!(strategy.detector, "yolov8_surgical");
        assert_eq!(strategy.tracker, "byte_track");
        assert_eq!(strategy.reasoning, "Default strategy (error: timeout)");
        assert_eq!(strategy.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_recovery_reply() {
        let plan = RecoveryPlan::from_completion(
            r#"{"action": "switch_tracker", "parameters": {"to": "deep_sort"}, "reasoning": "occlusion"}"#,
        );
        assert_eq!(plan.action, "switch_tracker");
        assert_eq!(plan.parameters.get("to"), Some(&json!("deep_sort")));
        assert_eq!(plan.reasoning, "occlusion");
    }

    #[test]
    fn test_recovery_fallback() {
        let plan = RecoveryPlan::from_completion("no idea");
        assert_eq!(plan.action, "reinitialize");
        assert!(plan.parameters.is_empty());
        assert_eq!(plan.reasoning, "Default recovery");
        assert_eq!(plan.origin, ResponseOrigin::Fallback);
    }

    #[test]
    fn test_strategy_off_menu_names() {
        let on_menu = Strategy::from_completion(
            r#"{"detector": "advanced_detector", "tracker": "deep_sort"}"#,
        );
        assert!(on_menu.off_menu().is_empty());

        let invented = Strategy::from_completion(
            r#"{"detector": "sam_detector", "tracker": "Byte_Track"}"#,
        );
        assert_eq!(invented.off_menu(), vec!["sam_detector"]);
    }

    #[test]
    fn test_recovery_menu_check() {
        assert!(RecoveryPlan::from_completion(r#"{"action": "skip_frames"}"#).is_on_menu());
        assert!(!RecoveryPlan::from_completion(r#"{"action": "reboot"}"#).is_on_menu());
        assert!(RecoveryPlan::call_failed("down").is_on_menu());
    }
}
