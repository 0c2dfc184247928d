//! # SurgAgent
//!
//! An agentic surgical-instrument tracking harness that delegates scene
//! understanding and planning to Google Gemini and keeps a structured trace
//! of every decision.
//!
//! ## Features
//!
//! - **Scene Analysis**: Instruments, challenges, visibility and phase for one frame
//! - **Strategy Selection**: Detector/tracker pairing chosen by the model
//! - **Failure Recovery**: Recovery action chosen by the model after a failure
//! - **Quality Checkpoints**: Threshold policy over average confidence
//! - **Reasoning Trace**: Append-only logs of steps, tool switches, recoveries and checkpoints
//! - **Demo Scenarios**: Scripted runs with composite scoring and JSON reports
//!
//! ## Architecture
//!
//! ```text
//! CLI → SurgAgent → ModelBackend (Gemini generateContent over HTTP)
//!           ↓
//!     TraceRecorder → JSON report
//! ```
//!
//! Model replies are free text. [`parser`] extracts the embedded JSON object
//! and falls back to a per-call default; nothing a model says can make an
//! agent operation fail.
//!
//! ## Example
//!
//! ```ignore
//! use surgagent::{Config, SurgAgent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let mut agent = SurgAgent::from_config(&config)?;
//!     let scene = agent.analyze_scene("frame_000100.png").await;
//!     let strategy = agent.select_strategy(&scene).await;
//!     println!("{} + {}", strategy.detector, strategy.tracker);
//!     println!("{}", agent.reasoning_summary());
//!     Ok(())
//! }
//! ```

/// Agent façade: scene analysis, strategy, recovery, quality checks, tracking.
pub mod agent;
/// Detector, tracker and recovery menus plus phase constraints.
pub mod catalog;
/// Command-line modes.
pub mod cli;
/// Configuration management.
pub mod config;
/// Scripted demo scenarios and scoring.
pub mod demo;
/// Error types and result aliases for the application.
pub mod error;
/// Gemini API client and the model backend seam.
pub mod gemini;
/// Lenient extraction of JSON from model replies.
pub mod parser;
/// Quality checkpoint threshold policy.
pub mod policy;
/// Prompt templates for model calls.
pub mod prompts;
/// JSON report persistence.
pub mod report;
/// Append-only reasoning trace.
pub mod trace;

pub use agent::SurgAgent;
pub use config::Config;
pub use error::{AppError, AppResult};
