//! Append-only reasoning trace for one agent session.
//!
//! The recorder keeps four independent logs in creation order. It is owned by
//! the agent and mutated through `&mut self`, so there is exactly one writer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::policy::Decision;

/// Phase of the agent pipeline that produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SceneAnalysis,
    ToolSelection,
    Replanning,
    Validation,
    Tracking,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SceneAnalysis => "scene_analysis",
            Stage::ToolSelection => "tool_selection",
            Stage::Replanning => "replanning",
            Stage::Validation => "validation",
            Stage::Tracking => "tracking",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single step in the agent's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub stage: Stage,
    pub timestamp_ms: i64,
    pub action: String,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
}

/// The selected detector changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSwitch {
    pub frame: u32,
    pub from_tool: String,
    pub to_tool: String,
    pub reason: String,
    pub confidence_before: f64,
    pub confidence_after: Option<f64>,
    pub reasoning: String,
}

/// A failure-handling invocation.
///
/// `success` means a recovery action was chosen and applied; whether the
/// failure actually cleared is not observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub frame: u32,
    pub failure_type: String,
    pub recovery_action: String,
    pub success: bool,
    pub frames_to_recover: u32,
    pub tools_used: Vec<String>,
}

/// A policy decision at some frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckpoint {
    pub frame: u32,
    pub metrics: BTreeMap<String, f64>,
    pub decision: Decision,
    pub threshold_used: f64,
    pub reasoning: String,
}

impl ReasoningStep {
    /// New step stamped with the current time.
    pub fn new(stage: Stage, action: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            stage,
            timestamp_ms: now_ms(),
            action: action.into(),
            reasoning: reasoning.into(),
            inputs: None,
            outputs: None,
        }
    }

    /// Override the timestamp (steps that describe work started earlier).
    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_outputs(mut self, outputs: Value) -> Self {
        self.outputs = Some(outputs);
        self
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Four append-only logs scoped to one agent session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceRecorder {
    reasoning_trace: Vec<ReasoningStep>,
    tool_switches: Vec<ToolSwitch>,
    recovery_events: Vec<RecoveryEvent>,
    quality_checkpoints: Vec<QualityCheckpoint>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, step: ReasoningStep) {
        self.reasoning_trace.push(step);
    }

    pub fn record_switch(&mut self, switch: ToolSwitch) {
        self.tool_switches.push(switch);
    }

    pub fn record_recovery(&mut self, event: RecoveryEvent) {
        self.recovery_events.push(event);
    }

    pub fn record_checkpoint(&mut self, checkpoint: QualityCheckpoint) {
        self.quality_checkpoints.push(checkpoint);
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.reasoning_trace
    }

    pub fn tool_switches(&self) -> &[ToolSwitch] {
        &self.tool_switches
    }

    pub fn recovery_events(&self) -> &[RecoveryEvent] {
        &self.recovery_events
    }

    pub fn quality_checkpoints(&self) -> &[QualityCheckpoint] {
        &self.quality_checkpoints
    }

    /// Human-readable rendering of every step plus counts of the other logs.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(50);
        let mut lines = vec![
            rule.clone(),
            "SurgAgent Reasoning Summary".to_string(),
            rule,
        ];

        for step in &self.reasoning_trace {
            lines.push(format!("\n[{}]", step.stage.as_str().to_uppercase()));
            lines.push(format!("   Action: {}", step.action));
            lines.push(format!("   Reasoning: {}", step.reasoning));
        }

        if !self.tool_switches.is_empty() {
            lines.push(format!("\nTool Switches: {}", self.tool_switches.len()));
        }

        if !self.recovery_events.is_empty() {
            lines.push(format!("Recovery Events: {}", self.recovery_events.len()));
        }

        lines.push(format!(
            "\nQuality Checkpoints: {}",
            self.quality_checkpoints.len()
        ));

        lines.join("\n")
    }
}
