use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Default Gemini model used for both vision and reasoning calls.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub report: ReportConfig,
}

/// Gemini API configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub reasoning_model: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    /// Zero means a single attempt per call.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Where JSON reports are written
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_env_with_api_key(None)
    }

    /// Load configuration, letting an explicit API key win over `GOOGLE_API_KEY`.
    pub fn from_env_with_api_key(api_key: Option<String>) -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_key = api_key
            .or_else(|| env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config {
                message: "GOOGLE_API_KEY is required".to_string(),
            })?;

        let gemini = GeminiConfig {
            api_key,
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            vision_model: env::var("GEMINI_VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            reasoning_model: env::var("GEMINI_REASONING_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_retries: parse_env("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay_ms: parse_env("RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
        };

        let report = ReportConfig {
            output_dir: PathBuf::from(env::var("REPORT_DIR").unwrap_or_else(|_| ".".to_string())),
        };

        Ok(Config {
            gemini,
            logging,
            request,
            report,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl GeminiConfig {
    /// Build a config for the given key with default endpoint and models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            vision_model: DEFAULT_MODEL.to_string(),
            reasoning_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at another endpoint (used by tests against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_defaults_to_single_attempt() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_gemini_config_builder() {
        let config = GeminiConfig::new("key").with_base_url("http://localhost:1234");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.vision_model, DEFAULT_MODEL);
        assert_eq!(config.reasoning_model, DEFAULT_MODEL);
    }
}
