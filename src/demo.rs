//! Scripted demo scenarios.
//!
//! Each scenario drives a fresh [`SurgAgent`] through strategy selection,
//! a synthetic confidence profile with periodic quality checks, optional
//! mid-run re-selection and failure recovery, then scores the run with a
//! fixed per-difficulty metric table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::agent::{FramePrediction, SurgAgent, TrackedInstrument};
use crate::gemini::ModelBackend;
use crate::parser::{ResponseOrigin, SceneAnalysis, Strategy};
use crate::policy::AVG_CONFIDENCE;
use crate::trace::{QualityCheckpoint, ReasoningStep, RecoveryEvent, Stage, ToolSwitch};

/// Quality checks run every this many frames.
const DEMO_CHECK_INTERVAL: usize = 15;
/// Frames averaged at each demo checkpoint.
const DEMO_CHECK_WINDOW: usize = 10;
/// Frame at which smoke appears in tool-switch scenarios.
const SMOKE_FRAME: u32 = 15;
/// Frame at which tracks are lost in recovery scenarios.
const TRACK_LOSS_FRAME: u32 = 20;

/// Scenario difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A demo scenario configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub num_frames: u32,
    pub difficulty: Difficulty,
    pub has_occlusion: bool,
    pub has_tool_switch: bool,
    pub has_failure_recovery: bool,
    pub expected_score_range: (f64, f64),
}

/// All scenarios in run order.
pub const DEMO_SCENARIOS: &[DemoScenario] = &[
    DemoScenario {
        key: "basic",
        name: "Basic Tracking",
        description: "Simple scene with 2 stable instruments, good visibility",
        num_frames: 30,
        difficulty: Difficulty::Easy,
        has_occlusion: false,
        has_tool_switch: false,
        has_failure_recovery: false,
        expected_score_range: (0.70, 0.85),
    },
    DemoScenario {
        key: "adaptive",
        name: "Adaptive Tool Selection",
        description: "Scene with smoke at frame 15, agent switches to smoke-robust detector",
        num_frames: 60,
        difficulty: Difficulty::Medium,
        has_occlusion: true,
        has_tool_switch: true,
        has_failure_recovery: false,
        expected_score_range: (0.65, 0.80),
    },
    DemoScenario {
        key: "failure_recovery",
        name: "Failure Recovery",
        description: "Track loss at frame 20 due to occlusion, agent recovers by frame 25",
        num_frames: 60,
        difficulty: Difficulty::Hard,
        has_occlusion: true,
        has_tool_switch: true,
        has_failure_recovery: true,
        expected_score_range: (0.55, 0.75),
    },
    DemoScenario {
        key: "high_performance",
        name: "High Performance Agent",
        description: "Well-reasoned agent with full trace, checkpoints, fast execution",
        num_frames: 90,
        difficulty: Difficulty::Hard,
        has_occlusion: true,
        has_tool_switch: true,
        has_failure_recovery: true,
        expected_score_range: (0.75, 0.90),
    },
];

/// Look up a scenario by key.
pub fn scenario(key: &str) -> Option<&'static DemoScenario> {
    DEMO_SCENARIOS.iter().find(|s| s.key == key)
}

/// Scenarios selected by name; `all` (or nothing) selects every scenario.
/// Unknown names are skipped.
pub fn select_scenarios(names: &[String]) -> Vec<&'static DemoScenario> {
    if names.is_empty() || names.iter().any(|n| n == "all") {
        return DEMO_SCENARIOS.iter().collect();
    }
    names.iter().filter_map(|n| scenario(n)).collect()
}

/// Weights of the six score dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub hota: f64,
    pub map: f64,
    pub surgical_context: f64,
    pub realtime: f64,
    pub reasoning_quality: f64,
    pub improvement: f64,
}

impl ScoreInputs {
    /// Weighted composite of all six dimensions.
    pub fn composite(&self) -> f64 {
        0.35 * self.hota
            + 0.25 * self.map
            + 0.15 * self.surgical_context
            + 0.10 * self.realtime
            + 0.10 * self.reasoning_quality
            + 0.05 * self.improvement
    }
}

/// Pass/check against the scenario's expected range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScenarioStatus {
    Pass,
    Check,
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub difficulty: Difficulty,
    pub frames: usize,
    pub strategy: Strategy,
    pub metrics: ScoreInputs,
    pub composite_score: f64,
    pub status: ScenarioStatus,
    pub mean_confidence: f64,
    pub agent_trace: Vec<ReasoningStep>,
    pub tool_switches: Vec<ToolSwitch>,
    pub recovery_events: Vec<RecoveryEvent>,
    pub quality_checkpoints: Vec<QualityCheckpoint>,
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Synthetic detection confidence for a frame of a scenario.
pub fn frame_confidence(scenario: &DemoScenario, frame: u32) -> f64 {
    let mut base = if scenario.difficulty == Difficulty::Easy {
        0.92
    } else {
        0.82
    };
    if scenario.has_occlusion && (15..=25).contains(&frame) {
        base -= 0.12;
    }
    if scenario.has_failure_recovery && frame > 25 {
        base += 0.05;
    }
    (base + f64::from(frame % 5) * 0.01).clamp(0.65, 0.98)
}

/// Fixed accuracy metrics per difficulty and scenario features.
pub fn score_inputs(scenario: &DemoScenario) -> ScoreInputs {
    let (hota, map) = match scenario.difficulty {
        Difficulty::Easy => (0.87, 0.83),
        Difficulty::Medium if scenario.has_tool_switch => (0.75, 0.73),
        Difficulty::Medium => (0.70, 0.68),
        Difficulty::Hard if scenario.has_failure_recovery => (0.73, 0.68),
        Difficulty::Hard => (0.65, 0.58),
    };

    let mut reasoning_quality = 0.667;
    if scenario.has_tool_switch {
        reasoning_quality += 0.1;
    }
    if scenario.has_failure_recovery {
        reasoning_quality += 0.12;
    }

    ScoreInputs {
        hota,
        map,
        surgical_context: 0.85,
        realtime: 1.0,
        reasoning_quality,
        improvement: 0.0,
    }
}

fn scenario_scene(scenario: &DemoScenario, smoke: bool) -> SceneAnalysis {
    let challenges: Vec<&str> = if smoke {
        vec!["smoke", "occlusion"]
    } else {
        vec![]
    };
    let visibility = match (scenario.difficulty, smoke) {
        (_, true) => 4,
        (Difficulty::Easy, false) => 8,
        _ => 6,
    };
    SceneAnalysis::from_value(
        &json!({
            "instruments": [{"type": "grasper", "visible": true}, {"type": "bipolar", "visible": true}],
            "scene_challenges": challenges,
            "visibility_score": visibility,
            "estimated_phase": "calot_triangle_dissection",
            "instrument_count": 2
        }),
        ResponseOrigin::Fallback,
    )
}

/// Drive a fresh agent through one scenario.
pub async fn run_scenario<M: ModelBackend>(
    agent: &mut SurgAgent<M>,
    scenario: &DemoScenario,
) -> ScenarioOutcome {
    info!(scenario = %scenario.key, frames = scenario.num_frames, "Running demo scenario");

    agent.record_step(ReasoningStep::new(
        Stage::SceneAnalysis,
        format!("Analyzed first 5 frames of {} scene", scenario.difficulty.as_str()),
        format!(
            "Detected {} surgical field",
            if scenario.has_occlusion { "challenging" } else { "clear" }
        ),
    ));

    let initial = scenario_scene(scenario, false);
    let mut strategy = agent.select_strategy(&initial).await;

    let mut predictions = Vec::with_capacity(scenario.num_frames as usize);
    let mut confidences = Vec::with_capacity(scenario.num_frames as usize);

    for frame in 0..scenario.num_frames {
        let conf = frame_confidence(scenario, frame);
        confidences.push(round3(conf));
        predictions.push(FramePrediction {
            frame,
            instruments: vec![
                TrackedInstrument {
                    track_id: 1,
                    kind: "grasper".to_string(),
                    confidence: conf,
                },
                TrackedInstrument {
                    track_id: 2,
                    kind: "bipolar".to_string(),
                    confidence: conf - 0.05,
                },
            ],
        });

        if scenario.has_tool_switch && frame == SMOKE_FRAME {
            strategy = agent.select_strategy(&scenario_scene(scenario, true)).await;
        }

        if scenario.has_failure_recovery && frame == TRACK_LOSS_FRAME {
            agent
                .handle_failure(
                    "track_loss",
                    json!({ "frame": frame, "cause": "occlusion", "lost_tracks": [2] }),
                )
                .await;
        }
    }

    for check_frame in (DEMO_CHECK_INTERVAL..confidences.len()).step_by(DEMO_CHECK_INTERVAL) {
        let window = &confidences[check_frame.saturating_sub(DEMO_CHECK_WINDOW)..check_frame];
        let avg = window.iter().sum::<f64>() / window.len() as f64;
        agent.quality_check(
            check_frame as u32,
            BTreeMap::from([(AVG_CONFIDENCE.to_string(), round3(avg))]),
        );
    }

    let mean_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    agent.record_step(ReasoningStep::new(
        Stage::Tracking,
        format!("Processed {} frames", scenario.num_frames),
        "Tracking complete with adaptive strategy",
    ));
    agent.record_step(ReasoningStep::new(
        Stage::Validation,
        "Self-assessment of tracking results",
        format!("Average confidence: {:.2}", mean_confidence),
    ));

    let metrics = score_inputs(scenario);
    let composite_score = metrics.composite();
    let (low, high) = scenario.expected_score_range;
    let status = if (low..=high).contains(&composite_score) {
        ScenarioStatus::Pass
    } else {
        ScenarioStatus::Check
    };

    info!(
        scenario = %scenario.key,
        composite = composite_score,
        status = ?status,
        "Demo scenario evaluated"
    );

    let trace = agent.trace();
    ScenarioOutcome {
        scenario: scenario.name.to_string(),
        difficulty: scenario.difficulty,
        frames: predictions.len(),
        strategy,
        metrics,
        composite_score,
        status,
        mean_confidence,
        agent_trace: trace.steps().to_vec(),
        tool_switches: trace.tool_switches().to_vec(),
        recovery_events: trace.recovery_events().to_vec(),
        quality_checkpoints: trace.quality_checkpoints().to_vec(),
    }
}

/// Run the selected scenarios, each on a fresh agent over a clone of `model`.
pub async fn run_demo<M: ModelBackend + Clone>(
    model: &M,
    scenarios: &[&DemoScenario],
) -> Vec<ScenarioOutcome> {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let mut agent = SurgAgent::new(model.clone());
        outcomes.push(run_scenario(&mut agent, scenario).await);
    }
    outcomes
}

/// Fixed-width table of outcomes with the average composite score.
pub fn render_summary(outcomes: &[ScenarioOutcome]) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    out.push_str(&format!("{}\nDEMO SUMMARY\n{}\n", rule, rule));
    out.push_str(&format!(
        "{:<25} {:<10} {:<10} {:<10}\n",
        "Scenario", "Difficulty", "Composite", "Status"
    ));
    out.push_str(&format!("{}\n", "-".repeat(60)));

    for o in outcomes {
        let status = match o.status {
            ScenarioStatus::Pass => "PASS",
            ScenarioStatus::Check => "CHECK",
        };
        out.push_str(&format!(
            "{:<25} {:<10} {:<10.3} {:<10}\n",
            o.scenario,
            o.difficulty.as_str(),
            o.composite_score,
            status
        ));
    }

    out.push_str(&format!("{}\n", "-".repeat(60)));
    if !outcomes.is_empty() {
        let avg = outcomes.iter().map(|o| o.composite_score).sum::<f64>() / outcomes.len() as f64;
        out.push_str(&format!("{:<25} {:<10} {:.3}\n", "AVERAGE", "", avg));
    }
    out.push_str(&rule);
    out
}
