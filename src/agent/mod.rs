//! The agent façade.
//!
//! [`SurgAgent`] owns the current detector/tracker selection and the
//! [`TraceRecorder`]. Every entry point that talks to the model degrades to a
//! default value on failure instead of returning an error; the returned
//! record's `origin` tells the caller which path was taken.

mod tracking;

pub use tracking::*;

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::catalog::phase_violations;
use crate::config::Config;
use crate::error::AppResult;
use crate::gemini::{GeminiClient, InlineImage, ModelBackend, ModelRole, Part};
use crate::parser::{RecoveryPlan, ResponseOrigin, SceneAnalysis, Strategy};
use crate::policy::{self, Decision, AVG_CONFIDENCE};
use crate::prompts::{recovery_prompt, strategy_prompt, SCENE_ANALYSIS_PROMPT};
use crate::trace::{
    now_ms, QualityCheckpoint, ReasoningStep, RecoveryEvent, Stage, ToolSwitch, TraceRecorder,
};

/// Frames a recovery is assumed to take.
pub const RECOVERY_WINDOW_FRAMES: u32 = 5;

/// Serialize a value for the trace, with a warning on failure.
pub(crate) fn serialize_for_log<T: serde::Serialize>(value: &T, context: &str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(
            error = %e,
            context = %context,
            "Failed to serialize value for reasoning trace"
        );
        json!({
            "serialization_error": e.to_string(),
            "context": context
        })
    })
}

/// Agentic instrument-tracking session backed by a hosted model.
pub struct SurgAgent<M = GeminiClient> {
    model: M,
    current_detector: Option<String>,
    current_tracker: Option<String>,
    trace: TraceRecorder,
}

impl SurgAgent<GeminiClient> {
    /// Build an agent talking to Gemini with the given configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = GeminiClient::new(&config.gemini, config.request.clone())?;
        info!(
            base_url = %client.base_url(),
            vision_model = %config.gemini.vision_model,
            reasoning_model = %config.gemini.reasoning_model,
            "SurgAgent initialized with Gemini API"
        );
        Ok(Self::new(client))
    }
}

impl<M: ModelBackend> SurgAgent<M> {
    /// New agent with no tool selection and an empty trace.
    pub fn new(model: M) -> Self {
        Self {
            model,
            current_detector: None,
            current_tracker: None,
            trace: TraceRecorder::new(),
        }
    }

    /// Backend the agent calls; cloned to give demo scenarios fresh agents.
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn current_detector(&self) -> Option<&str> {
        self.current_detector.as_deref()
    }

    pub fn current_tracker(&self) -> Option<&str> {
        self.current_tracker.as_deref()
    }

    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Append a step produced outside the façade's own operations.
    pub fn record_step(&mut self, step: ReasoningStep) {
        self.trace.record_step(step);
    }

    /// Classify instruments, challenges, visibility and phase in one frame.
    pub async fn analyze_scene(&mut self, frame_path: impl AsRef<Path>) -> SceneAnalysis {
        let frame_path = frame_path.as_ref();
        let start = now_ms();

        let image = match InlineImage::from_path(frame_path).await {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %frame_path.display(), error = %e, "Scene analysis error");
                return SceneAnalysis::call_failed(e.to_string());
            }
        };

        let parts = vec![Part::text(SCENE_ANALYSIS_PROMPT), Part::image(image)];
        let text = match self.model.generate(ModelRole::Vision, parts).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %frame_path.display(), error = %e, "Scene analysis error");
                return SceneAnalysis::call_failed(e.to_string());
            }
        };

        let analysis = SceneAnalysis::from_completion(&text);
        if analysis.origin == ResponseOrigin::Fallback {
            warn!(path = %frame_path.display(), "Scene reply had no JSON object, using defaults");
        }

        let mut reasoning = format!(
            "Identified {} instruments, visibility score {}",
            analysis.effective_instrument_count(),
            analysis
                .visibility_score
                .map(|v| v.to_string())
                .unwrap_or_else(|| "N/A".to_string())
        );
        let violations = phase_violations(&analysis.estimated_phase, &analysis.instrument_types());
        if !violations.is_empty() {
            reasoning.push_str(&format!(
                "; unexpected for phase {}: {}",
                analysis.estimated_phase,
                violations.join(", ")
            ));
        }

        info!(
            path = %frame_path.display(),
            instruments = analysis.instruments.len(),
            phase = %analysis.estimated_phase,
            "Scene analyzed"
        );

        self.trace.record_step(
            ReasoningStep::new(
                Stage::SceneAnalysis,
                "Analyzed surgical frame with Gemini Vision",
                reasoning,
            )
            .at(start)
            .with_inputs(json!({ "frame_path": frame_path.display().to_string() }))
            .with_outputs(serialize_for_log(&analysis, "scene_analysis")),
        );

        analysis
    }

    /// Ask the model for a detector/tracker pairing and adopt it.
    pub async fn select_strategy(&mut self, scene: &SceneAnalysis) -> Strategy {
        let start = now_ms();

        let parts = vec![Part::text(strategy_prompt(scene))];
        let text = match self.model.generate(ModelRole::Reasoning, parts).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Strategy selection error");
                return Strategy::call_failed(e.to_string());
            }
        };

        let strategy = Strategy::from_completion(&text);
        let off_menu = strategy.off_menu();
        if !off_menu.is_empty() {
            warn!(tools = ?off_menu, "Model selected tools outside the menu");
        }

        let previous = self.current_detector.replace(strategy.detector.clone());
        self.current_tracker = Some(strategy.tracker.clone());

        if let Some(previous) = previous.filter(|p| !p.is_empty() && *p != strategy.detector) {
            info!(from = %previous, to = %strategy.detector, "Detector switched");
            self.trace.record_switch(ToolSwitch {
                frame: 0,
                from_tool: previous,
                to_tool: strategy.detector.clone(),
                reason: "strategy_update".to_string(),
                confidence_before: 0.0,
                confidence_after: None,
                reasoning: strategy.reasoning.clone(),
            });
        }

        info!(
            detector = %strategy.detector,
            tracker = %strategy.tracker,
            origin = ?strategy.origin,
            "Strategy selected"
        );

        self.trace.record_step(
            ReasoningStep::new(
                Stage::ToolSelection,
                format!("Selected {} + {}", strategy.detector, strategy.tracker),
                strategy.reasoning.clone(),
            )
            .at(start)
            .with_inputs(json!({ "scene_analysis": serialize_for_log(scene, "scene_analysis") }))
            .with_outputs(serialize_for_log(&strategy, "strategy")),
        );

        strategy
    }

    /// Ask the model how to recover from a failure; returns the action name.
    ///
    /// A recovery event is recorded on every call, including when the model
    /// call fails and the default action is used.
    pub async fn handle_failure(&mut self, failure_type: &str, context: Value) -> String {
        let start = now_ms();

        let prompt = recovery_prompt(
            failure_type,
            self.current_detector.as_deref(),
            self.current_tracker.as_deref(),
            &context,
        );

        let plan = match self
            .model
            .generate(ModelRole::Reasoning, vec![Part::text(prompt)])
            .await
        {
            Ok(text) => {
                let plan = RecoveryPlan::from_completion(&text);
                if !plan.is_on_menu() {
                    warn!(action = %plan.action, "Model chose a recovery action outside the menu");
                }
                plan
            }
            Err(e) => {
                warn!(failure_type = %failure_type, error = %e, "Recovery planning error");
                RecoveryPlan::call_failed(e.to_string())
            }
        };

        let frame = context
            .get("frame")
            .and_then(Value::as_u64)
            .and_then(|f| u32::try_from(f).ok())
            .unwrap_or(0);

        let tools_used = [&self.current_detector, &self.current_tracker]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        self.trace.record_recovery(RecoveryEvent {
            frame,
            failure_type: failure_type.to_string(),
            recovery_action: plan.action.clone(),
            success: true,
            frames_to_recover: RECOVERY_WINDOW_FRAMES,
            tools_used,
        });

        info!(
            frame,
            failure_type = %failure_type,
            action = %plan.action,
            origin = ?plan.origin,
            "Recovery action chosen"
        );

        self.trace.record_step(
            ReasoningStep::new(
                Stage::Replanning,
                format!("Recovery action: {}", plan.action),
                plan.reasoning.clone(),
            )
            .at(start)
            .with_inputs(json!({ "failure_type": failure_type, "context": context }))
            .with_outputs(serialize_for_log(&plan, "recovery")),
        );

        plan.action
    }

    /// Apply the threshold policy and record a checkpoint.
    pub fn quality_check(&mut self, frame: u32, metrics: BTreeMap<String, f64>) -> Decision {
        let evaluation = policy::evaluate(&metrics);

        debug!(
            frame,
            avg_confidence = evaluation.avg_confidence,
            decision = %evaluation.decision,
            "Quality checkpoint"
        );

        self.trace.record_checkpoint(QualityCheckpoint {
            frame,
            metrics,
            decision: evaluation.decision,
            threshold_used: evaluation.threshold_used,
            reasoning: evaluation.reasoning,
        });

        evaluation.decision
    }

    /// Run the analysis → strategy → tracking → validation pipeline.
    ///
    /// Frames are not extracted from the video: the scene is a fixed
    /// placeholder and tracking is simulated.
    pub async fn track_video(&mut self, video_path: impl AsRef<Path>) -> TrackingResult {
        let video_path = video_path.as_ref().display().to_string();
        let start = now_ms();
        info!(video = %video_path, "Processing video");

        let scene = placeholder_scene();
        let strategy = self.select_strategy(&scene).await;

        let predictions = self.simulate_tracking(SIMULATED_FRAMES);

        self.trace.record_step(
            ReasoningStep::new(
                Stage::Validation,
                "Self-assessment of tracking results",
                "All frames processed successfully",
            )
            .with_outputs(json!({ "frames": SIMULATED_FRAMES, "tracks": 2 })),
        );

        let tools_used = vec![
            self.current_detector
                .clone()
                .unwrap_or_else(|| strategy.detector.clone()),
            self.current_tracker
                .clone()
                .unwrap_or_else(|| strategy.tracker.clone()),
        ];

        let processing_time_ms = now_ms() - start;
        info!(
            video = %video_path,
            frames = predictions.len(),
            processing_time_ms,
            "Tracking complete"
        );

        TrackingResult {
            video_path,
            predictions,
            tools_used,
            reasoning_trace: self.trace.steps().to_vec(),
            tool_switches: self.trace.tool_switches().to_vec(),
            recovery_events: self.trace.recovery_events().to_vec(),
            quality_checkpoints: self.trace.quality_checkpoints().to_vec(),
            processing_time_ms,
        }
    }

    fn simulate_tracking(&mut self, num_frames: u32) -> Vec<FramePrediction> {
        let mut predictions = Vec::with_capacity(num_frames as usize);
        for frame in 0..num_frames {
            predictions.push(FramePrediction::simulated(frame));

            if frame > 0 && frame % CHECKPOINT_INTERVAL == 0 {
                self.quality_check(
                    frame,
                    BTreeMap::from([(AVG_CONFIDENCE.to_string(), SIMULATED_AVG_CONFIDENCE)]),
                );
            }
        }
        predictions
    }

    /// Human-readable summary of the trace.
    pub fn reasoning_summary(&self) -> String {
        self.trace.summary()
    }
}

/// Scene assumed for the first frame of a video.
pub fn placeholder_scene() -> SceneAnalysis {
    SceneAnalysis::from_value(
        &json!({
            "instruments": [{"type": "grasper"}, {"type": "bipolar"}],
            "visibility_score": 8,
            "scene_challenges": [],
            "estimated_phase": "dissection"
        }),
        ResponseOrigin::Fallback,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GeminiError, GeminiResult};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    mock! {
        pub Model {}

        #[async_trait]
        impl ModelBackend for Model {
            async fn generate(&self, role: ModelRole, parts: Vec<Part>) -> GeminiResult<String>;
        }
    }

    fn reply(text: &'static str) -> MockModel {
        let mut model = MockModel::new();
        model
            .expect_generate()
            .returning(move |_, _| Ok(text.to_string()));
        model
    }

    fn failing() -> MockModel {
        let mut model = MockModel::new();
        model.expect_generate().returning(|_, _| {
            Err(GeminiError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            })
        });
        model
    }

    fn metrics(avg: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([(AVG_CONFIDENCE.to_string(), avg)])
    }

    #[test]
    fn test_new_agent_is_unset() {
        let agent = SurgAgent::new(MockModel::new());
        assert_eq!(agent.current_detector(), None);
        assert_eq!(agent.current_tracker(), None);
        assert!(agent.trace().steps().is_empty());
    }

    #[tokio::test]
    async fn test_select_strategy_from_unset_records_no_switch() {
        let mut model = MockModel::new();
        model
            .expect_generate()
            .with(eq(ModelRole::Reasoning), mockall::predicate::always())
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"detector": "advanced_detector", "tracker": "deep_sort", "reasoning": "smoke"}"#.to_string())
            });
        let mut agent = SurgAgent::new(model);

        let strategy = agent.select_strategy(&placeholder_scene()).await;

        assert_eq!(strategy.detector, "advanced_detector");
        assert_eq!(agent.current_detector(), Some("advanced_detector"));
        assert_eq!(agent.current_tracker(), Some("deep_sort"));
        assert!(agent.trace().tool_switches().is_empty());

        let step = &agent.trace().steps()[0];
        assert_eq!(step.stage, Stage::ToolSelection);
        assert_eq!(step.action, "Selected advanced_detector + deep_sort");
        assert_eq!(step.reasoning, "smoke");
    }

    #[tokio::test]
    async fn test_select_strategy_twice_records_one_switch() {
        let mut model = MockModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(r#"{"detector": "A", "tracker": "t"}"#.to_string()));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(r#"{"detector": "B", "tracker": "t", "reasoning": "better"}"#.to_string()));
        let mut agent = SurgAgent::new(model);

        agent.select_strategy(&placeholder_scene()).await;
        agent.select_strategy(&placeholder_scene()).await;

        let switches = agent.trace().tool_switches();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].from_tool, "A");
        assert_eq!(switches[0].to_tool, "B");
        assert_eq!(switches[0].reason, "strategy_update");
        assert_eq!(switches[0].reasoning, "better");
    }

    #[tokio::test]
    async fn test_select_same_detector_twice_records_no_switch() {
        let mut agent = SurgAgent::new(reply(r#"{"detector": "A", "tracker": "t"}"#));
        agent.select_strategy(&placeholder_scene()).await;
        agent.select_strategy(&placeholder_scene()).await;
        assert!(agent.trace().tool_switches().is_empty());
        assert_eq!(agent.trace().steps().len(), 2);
    }

    #[tokio::test]
    async fn test_select_strategy_call_failure_leaves_state() {
        let mut agent = SurgAgent::new(failing());
        let strategy = agent.select_strategy(&placeholder_scene()).await;

        assert_eq!(strategy.detector, "yolov8_surgical");
        assert_eq!(strategy.tracker, "byte_track");
        assert!(strategy.reasoning.starts_with("Default strategy (error:"));
        assert_eq!(strategy.origin, ResponseOrigin::CallFailed);
        assert_eq!(agent.current_detector(), None);
        assert!(agent.trace().steps().is_empty());
    }

    #[tokio::test]
    async fn test_select_strategy_unparseable_reply_uses_default() {
        let mut agent = SurgAgent::new(reply("I cannot provide that."));
        let strategy = agent.select_strategy(&placeholder_scene()).await;
        assert_eq!(strategy.detector, "yolov8_surgical");
        assert_eq!(strategy.reasoning, "Default selection");
        assert_eq!(strategy.origin, ResponseOrigin::Fallback);
        assert_eq!(agent.current_detector(), Some("yolov8_surgical"));
    }

    #[tokio::test]
    async fn test_handle_failure_records_event() {
        let mut model = MockModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(r#"{"detector": "yolov8_surgical", "tracker": "byte_track"}"#.to_string()));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(r#"{"action": "switch_tracker", "reasoning": "occluded"}"#.to_string()));
        let mut agent = SurgAgent::new(model);
        agent.select_strategy(&placeholder_scene()).await;

        let action = agent
            .handle_failure("track_loss", json!({"frame": 20, "lost_tracks": [2]}))
            .await;

        assert_eq!(action, "switch_tracker");
        let events = agent.trace().recovery_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, 20);
        assert_eq!(events[0].failure_type, "track_loss");
        assert_eq!(events[0].recovery_action, "switch_tracker");
        assert!(events[0].success);
        assert_eq!(events[0].frames_to_recover, 5);
        assert_eq!(events[0].tools_used, vec!["yolov8_surgical", "byte_track"]);

        let step = agent.trace().steps().last().unwrap();
        assert_eq!(step.stage, Stage::Replanning);
        assert_eq!(step.action, "Recovery action: switch_tracker");
        assert_eq!(step.reasoning, "occluded");
    }

    #[tokio::test]
    async fn test_handle_failure_call_failure_still_records_event() {
        let mut agent = SurgAgent::new(failing());
        let action = agent.handle_failure("low_confidence", json!({})).await;

        assert_eq!(action, "reinitialize");
        let events = agent.trace().recovery_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].frame, 0);
        assert!(events[0].tools_used.is_empty());
    }

    #[tokio::test]
    async fn test_handle_failure_unusable_frame_defaults_to_zero() {
        let mut agent = SurgAgent::new(failing());
        for frame in [
            json!(-3),
            json!(2.5),
            json!(u64::from(u32::MAX) + 1),
            json!("20"),
        ] {
            agent
                .handle_failure("track_loss", json!({ "frame": frame }))
                .await;
        }
        agent
            .handle_failure("track_loss", json!({ "frame": u32::MAX }))
            .await;

        let frames: Vec<_> = agent.trace().recovery_events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 0, 0, 0, u32::MAX]);
    }

    #[tokio::test]
    async fn test_handle_failure_each_call_appends_one_event() {
        let mut agent = SurgAgent::new(reply("no json here"));
        for i in 0..3 {
            agent.handle_failure("track_loss", json!({ "frame": i })).await;
        }
        let frames: Vec<_> = agent.trace().recovery_events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn test_quality_check_bands_and_checkpoints() {
        let mut agent = SurgAgent::new(MockModel::new());
        assert_eq!(agent.quality_check(10, metrics(0.65)), Decision::Continue);
        assert_eq!(agent.quality_check(20, metrics(0.5)), Decision::SwitchTool);
        assert_eq!(agent.quality_check(30, metrics(0.2)), Decision::Replan);
        assert_eq!(agent.quality_check(40, BTreeMap::new()), Decision::Continue);

        let checkpoints = agent.trace().quality_checkpoints();
        assert_eq!(checkpoints.len(), 4);
        assert!(checkpoints.iter().all(|c| c.threshold_used == 0.65));
        assert_eq!(checkpoints[2].decision, Decision::Replan);
    }

    #[tokio::test]
    async fn test_analyze_scene_missing_file() {
        let mut agent = SurgAgent::new(MockModel::new());
        let scene = agent.analyze_scene("/no/such/frame.png").await;
        assert_eq!(scene.visibility_score, Some(5.0));
        assert!(scene.error.is_some());
        assert_eq!(scene.origin, ResponseOrigin::CallFailed);
        assert!(agent.trace().steps().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_scene_records_step() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.jpg");
        std::fs::write(&frame, b"jpeg-bytes").unwrap();

        let mut model = MockModel::new();
        model
            .expect_generate()
            .withf(|role, parts| *role == ModelRole::Vision && parts.len() == 2)
            .times(1)
            .returning(|_, _| {
                Ok(r#"Result: {"instruments": [{"type": "grasper"}, {"type": "hook"}], "visibility_score": 6, "estimated_phase": "clipping_cutting", "instrument_count": 2}"#.to_string())
            });
        let mut agent = SurgAgent::new(model);

        let scene = agent.analyze_scene(&frame).await;

        assert_eq!(scene.origin, ResponseOrigin::Model);
        let step = &agent.trace().steps()[0];
        assert_eq!(step.stage, Stage::SceneAnalysis);
        assert_eq!(
            step.reasoning,
            "Identified 2 instruments, visibility score 6; unexpected for phase clipping_cutting: hook"
        );
        assert_eq!(
            step.inputs.as_ref().unwrap()["frame_path"],
            frame.display().to_string()
        );
    }

    #[tokio::test]
    async fn test_analyze_scene_call_failure() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.png");
        std::fs::write(&frame, b"png").unwrap();

        let mut agent = SurgAgent::new(failing());
        let scene = agent.analyze_scene(&frame).await;

        assert_eq!(scene.visibility_score, Some(5.0));
        assert!(scene.error.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_track_video_pipeline() {
        let mut agent = SurgAgent::new(reply(
            r#"{"detector": "yolov8_surgical", "tracker": "byte_track", "reasoning": "clear scene"}"#,
        ));

        let result = agent.track_video("VID01.mp4").await;

        assert_eq!(result.video_path, "VID01.mp4");
        assert_eq!(result.predictions.len(), 30);
        assert_eq!(result.tools_used, vec!["yolov8_surgical", "byte_track"]);
        let frames: Vec<_> = result.quality_checkpoints.iter().map(|c| c.frame).collect();
        assert_eq!(frames, vec![10, 20]);
        let stages: Vec<_> = result.reasoning_trace.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![Stage::ToolSelection, Stage::Validation]);
        assert_eq!(
            result.reasoning_trace[1].outputs,
            Some(json!({"frames": 30, "tracks": 2}))
        );
        assert!(result.processing_time_ms >= 0);
    }

    #[tokio::test]
    async fn test_track_video_with_failed_strategy_uses_defaults() {
        let mut agent = SurgAgent::new(failing());
        let result = agent.track_video("VID02.mp4").await;
        assert_eq!(result.tools_used, vec!["yolov8_surgical", "byte_track"]);
        assert_eq!(result.reasoning_trace.len(), 1);
    }

    #[tokio::test]
    async fn test_reasoning_summary_counts() {
        let mut agent = SurgAgent::new(reply(r#"{"action": "skip_frames"}"#));
        agent.handle_failure("motion_blur", json!({"frame": 3})).await;
        agent.quality_check(10, metrics(0.9));

        let summary = agent.reasoning_summary();
        assert!(summary.contains("[REPLANNING]"));
        assert!(summary.contains("Recovery Events: 1"));
        assert!(summary.contains("Quality Checkpoints: 1"));
        assert!(!summary.contains("Tool Switches"));
    }
}
