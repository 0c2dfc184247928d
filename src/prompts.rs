//! Centralized prompt definitions for the agent's model calls.
//!
//! The scene prompt is fixed; the strategy and recovery prompts embed the
//! current scene or failure context plus the catalog menus.

use serde_json::Value;

use crate::catalog::{Detector, RecoveryAction, Tracker};
use crate::parser::SceneAnalysis;

/// Prompt sent alongside a frame for scene analysis.
pub const SCENE_ANALYSIS_PROMPT: &str = r#"Analyze this surgical laparoscopic frame. Provide a JSON response with:

{
    "instruments": [
        {"type": "grasper/bipolar/hook/scissors/clipper/irrigator", "visible": true/false}
    ],
    "scene_challenges": ["smoke", "blood", "occlusion", "motion_blur"],
    "visibility_score": 1-10,
    "estimated_phase": "preparation/dissection/clipping/packaging",
    "instrument_count": number,
    "recommendations": "description of best tracking approach"
}

Be concise and accurate. Focus on surgical instruments only."#;

/// Visibility assumed in the strategy prompt when the scene has none.
const DEFAULT_VISIBILITY: f64 = 5.0;

/// Strategy selection prompt for a scene.
pub fn strategy_prompt(scene: &SceneAnalysis) -> String {
    let detectors: String = Detector::ALL
        .iter()
        .map(|d| format!("- {}: {}\n", d.as_str(), d.menu_line()))
        .collect();
    let trackers: String = Tracker::ALL
        .iter()
        .map(|t| format!("- {}: {}\n", t.as_str(), t.menu_line()))
        .collect();

    format!(
        r#"You are an AI agent selecting surgical tracking tools.

Scene Analysis:
- Visibility: {visibility}/10
- Challenges: {challenges:?}
- Instruments: {count}
- Phase: {phase}

Available Detectors:
{detectors}
Available Trackers:
{trackers}
Select the best combination. Respond with JSON:
{{
    "detector": "detector_name",
    "tracker": "tracker_name",
    "reasoning": "brief explanation"
}}"#,
        visibility = scene.visibility_score.unwrap_or(DEFAULT_VISIBILITY),
        challenges = scene.scene_challenges,
        count = scene.effective_instrument_count(),
        phase = scene.estimated_phase,
    )
}

/// Recovery planning prompt for a failure.
pub fn recovery_prompt(
    failure_type: &str,
    detector: Option<&str>,
    tracker: Option<&str>,
    context: &Value,
) -> String {
    let options: String = RecoveryAction::ALL
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{}. {} - {}\n", i + 1, action.as_str(), action.description()))
        .collect();

    format!(
        r#"A surgical tracking failure occurred.

Failure Type: {failure_type}
Current Detector: {detector}
Current Tracker: {tracker}
Context: {context}

Recovery Options:
{options}
Select the best recovery action and explain briefly.
Respond with JSON:
{{
    "action": "action_name",
    "parameters": {{}},
    "reasoning": "brief explanation"
}}"#,
        detector = detector.unwrap_or("none"),
        tracker = tracker.unwrap_or("none"),
    )
}
