//! Threshold policy for quality checkpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// At or above this average confidence tracking continues.
pub const CONTINUE_THRESHOLD: f64 = 0.65;
/// Below this average confidence the agent replans.
pub const REPLAN_THRESHOLD: f64 = 0.5;
/// Assumed average confidence when the metrics omit it.
pub const DEFAULT_AVG_CONFIDENCE: f64 = 0.8;

/// Metric key read by the policy.
pub const AVG_CONFIDENCE: &str = "avg_confidence";

/// Outcome of a quality checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    SwitchTool,
    Replan,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Continue => "continue",
            Decision::SwitchTool => "switch_tool",
            Decision::Replan => "replan",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of applying the policy to one set of metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub avg_confidence: f64,
    pub threshold_used: f64,
    pub reasoning: String,
}

/// Map an average confidence onto a decision.
pub fn decide(avg_confidence: f64) -> Decision {
    if avg_confidence >= CONTINUE_THRESHOLD {
        Decision::Continue
    } else if avg_confidence >= REPLAN_THRESHOLD {
        Decision::SwitchTool
    } else {
        Decision::Replan
    }
}

/// Apply the policy to a metrics mapping.
pub fn evaluate(metrics: &BTreeMap<String, f64>) -> Evaluation {
    let avg_confidence = metrics
        .get(AVG_CONFIDENCE)
        .copied()
        .unwrap_or(DEFAULT_AVG_CONFIDENCE);
    let decision = decide(avg_confidence);

    let reasoning = match decision {
        Decision::Continue => format!(
            "Confidence {:.2} >= threshold {}",
            avg_confidence, CONTINUE_THRESHOLD
        ),
        Decision::SwitchTool => format!(
            "Confidence {:.2} below threshold, switching tools",
            avg_confidence
        ),
        Decision::Replan => format!(
            "Confidence {:.2} very low, replanning needed",
            avg_confidence
        ),
    };

    Evaluation {
        decision,
        avg_confidence,
        threshold_used: CONTINUE_THRESHOLD,
        reasoning,
    }
}
