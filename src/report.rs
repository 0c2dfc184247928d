//! JSON reports written next to a run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ReportResult;

/// File name for demo scenario results.
pub const DEMO_REPORT: &str = "demo_results.json";
/// File name for video tracking results.
pub const TRACKING_REPORT: &str = "tracking_results.json";

/// Envelope around a report payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report<T> {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub results: T,
}

impl<T> Report<T> {
    pub fn new(results: T) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            results,
        }
    }
}

/// Write `results` as pretty JSON to `dir/file_name`, creating `dir`.
pub fn write_report<T: Serialize>(
    dir: &Path,
    file_name: &str,
    results: &T,
) -> ReportResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let report = Report::new(results);
    let body = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, body)?;

    info!(path = %path.display(), run_id = %report.run_id, "Report written");
    Ok(path)
}
