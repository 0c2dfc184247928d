use serde::{Deserialize, Serialize};

use crate::trace::{QualityCheckpoint, ReasoningStep, RecoveryEvent, ToolSwitch};

/// Frames produced by the simulated tracking pass.
pub const SIMULATED_FRAMES: u32 = 30;
/// A quality checkpoint runs on every frame divisible by this (except 0).
pub const CHECKPOINT_INTERVAL: u32 = 10;
/// Average confidence reported at simulated checkpoints.
pub const SIMULATED_AVG_CONFIDENCE: f64 = 0.87;

/// One tracked instrument in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedInstrument {
    pub track_id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: f64,
}

/// Tracking output for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePrediction {
    pub frame: u32,
    pub instruments: Vec<TrackedInstrument>,
}

impl FramePrediction {
    /// The fixed two-instrument frame used by the simulation.
    pub fn simulated(frame: u32) -> Self {
        Self {
            frame,
            instruments: vec![
                TrackedInstrument {
                    track_id: 1,
                    kind: "grasper".to_string(),
                    confidence: 0.9,
                },
                TrackedInstrument {
                    track_id: 2,
                    kind: "bipolar".to_string(),
                    confidence: 0.85,
                },
            ],
        }
    }
}

/// Everything a `track_video` run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    pub video_path: String,
    pub predictions: Vec<FramePrediction>,
    pub tools_used: Vec<String>,
    pub reasoning_trace: Vec<ReasoningStep>,
    pub tool_switches: Vec<ToolSwitch>,
    pub recovery_events: Vec<RecoveryEvent>,
    pub quality_checkpoints: Vec<QualityCheckpoint>,
    pub processing_time_ms: i64,
}
