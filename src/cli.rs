//! Command-line surface: `--mode {demo,track,analyze}`.

use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

use crate::agent::SurgAgent;
use crate::config::Config;
use crate::demo::{render_summary, run_demo, select_scenarios};
use crate::gemini::ModelBackend;
use crate::parser::SceneAnalysis;
use crate::report::{write_report, DEMO_REPORT, TRACKING_REPORT};

/// SurgAgent: AI-powered surgical instrument tracking
#[derive(Parser, Debug, Clone)]
#[command(name = "surgagent", version, about)]
pub struct Cli {
    /// Operating mode
    #[arg(long, value_enum, default_value_t = Mode::Demo)]
    pub mode: Mode,

    /// Path to surgical video (track mode)
    #[arg(long)]
    pub video: Option<PathBuf>,

    /// Demo scenario: all, basic, adaptive, failure_recovery, high_performance
    #[arg(long, default_value = "all")]
    pub scenario: String,

    /// Google Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Operating mode.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Demo,
    Track,
    Analyze,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute the selected mode.
pub async fn execute(cli: Cli, config: &Config) -> CliResult {
    let mut agent = match SurgAgent::from_config(config) {
        Ok(agent) => agent,
        Err(e) => {
            error!(error = %e, "Failed to initialize agent");
            return CliResult::error(format!("Failed to initialize agent: {}", e));
        }
    };

    match cli.mode {
        Mode::Demo => execute_demo(agent.model(), &cli.scenario, config).await,
        Mode::Track => match cli.video {
            Some(video) => execute_track(agent, video, config).await,
            None => CliResult::error("Error: --video required for track mode"),
        },
        Mode::Analyze => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let analyses = analyze_frames(&mut agent, stdin).await;
            CliResult::success(format!("Analyzed {} frame(s)", analyses.len()))
        }
    }
}

async fn execute_demo<M: ModelBackend + Clone>(
    model: &M,
    scenario: &str,
    config: &Config,
) -> CliResult {
    let scenarios = select_scenarios(&[scenario.to_string()]);
    if scenarios.is_empty() {
        return CliResult::error(format!("Unknown scenario: {}", scenario));
    }

    let outcomes = run_demo(model, &scenarios).await;
    let mut output = render_summary(&outcomes);

    match write_report(&config.report.output_dir, DEMO_REPORT, &outcomes) {
        Ok(path) => output.push_str(&format!("\nResults saved to: {}", path.display())),
        Err(e) => {
            error!(error = %e, "Failed to write demo report");
            return CliResult::error(format!("{}\nFailed to write report: {}", output, e));
        }
    }

    CliResult::success(output)
}

async fn execute_track<M: ModelBackend>(
    mut agent: SurgAgent<M>,
    video: PathBuf,
    config: &Config,
) -> CliResult {
    info!(video = %video.display(), "Tracking video");
    let result = agent.track_video(&video).await;

    let mut output = agent.reasoning_summary();
    output.push_str(&format!(
        "\n\nTracking complete: {} frames with {}",
        result.predictions.len(),
        result.tools_used.join(" + ")
    ));

    match write_report(&config.report.output_dir, TRACKING_REPORT, &result) {
        Ok(path) => {
            output.push_str(&format!("\nResults saved to: {}", path.display()));
            CliResult::success(output)
        }
        Err(e) => {
            error!(error = %e, "Failed to write tracking report");
            CliResult::error(format!("{}\nFailed to write report: {}", output, e))
        }
    }
}

/// Analyze frame paths read line by line until `quit` or end of input.
pub async fn analyze_frames<M, R>(agent: &mut SurgAgent<M>, reader: R) -> Vec<SceneAnalysis>
where
    M: ModelBackend,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut analyses = Vec::new();

    loop {
        print!("Enter frame path (or 'quit'): ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read frame path");
                break;
            }
        };

        let path = line.trim();
        if path.eq_ignore_ascii_case("quit") {
            break;
        }
        if path.is_empty() {
            continue;
        }

        let analysis = agent.analyze_scene(path).await;
        match serde_json::to_string_pretty(&analysis) {
            Ok(json) => println!("\nAnalysis:\n{}\n", json),
            Err(e) => error!(error = %e, "Failed to render analysis"),
        }
        analyses.push(analysis);
    }

    analyses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GeminiError, GeminiResult};
    use crate::gemini::{ModelRole, Part};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ModelBackend for Unreachable {
        async fn generate(&self, _role: ModelRole, _parts: Vec<Part>) -> GeminiResult<String> {
            Err(GeminiError::InvalidResponse {
                message: "unreachable".to_string(),
            })
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["surgagent", "--api-key", "k"]).unwrap();
        assert_eq!(cli.mode, Mode::Demo);
        assert_eq!(cli.scenario, "all");
        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert!(cli.video.is_none());
    }

    #[test]
    fn test_cli_track_mode() {
        let cli =
            Cli::try_parse_from(["surgagent", "--mode", "track", "--video", "VID01.mp4"]).unwrap();
        assert_eq!(cli.mode, Mode::Track);
        assert_eq!(cli.video, Some(PathBuf::from("VID01.mp4")));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["surgagent", "--mode", "train"]).is_err());
    }

    #[test]
    fn test_cli_result_codes() {
        assert_eq!(CliResult::success("ok").exit_code, 0);
        assert_eq!(CliResult::error("bad").exit_code, 1);
    }

    #[tokio::test]
    async fn test_analyze_frames_stops_at_quit() {
        let mut agent = SurgAgent::new(Unreachable);
        let input: &[u8] = b"/missing/a.png\n\n/missing/b.png\nquit\n/missing/c.png\n";
        let analyses = analyze_frames(&mut agent, tokio::io::BufReader::new(input)).await;

        assert_eq!(analyses.len(), 2);
        assert!(analyses.iter().all(|a| a.error.is_some()));
    }

    #[tokio::test]
    async fn test_analyze_frames_stops_at_eof() {
        let mut agent = SurgAgent::new(Unreachable);
        let input: &[u8] = b"/missing/a.png";
        let analyses = analyze_frames(&mut agent, tokio::io::BufReader::new(input)).await;
        assert_eq!(analyses.len(), 1);
    }
}
