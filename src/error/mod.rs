use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Gemini error: {0}")]
    Gemini(#[from] GeminiError),
}

/// Gemini API errors
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Prompt blocked: {reason}")]
    Blocked { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors loading a frame for scene analysis
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image format: {path}")]
    UnsupportedFormat { path: PathBuf },
}

/// Report persistence errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for Gemini operations
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_gemini_error_display() {
        let err = GeminiError::Unavailable {
            message: "server down".to_string(),
            retries: 3,
        };
        assert_eq!(err.to_string(), "Gemini unavailable: server down (retries: 3)");

        let err = GeminiError::Api {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - quota exceeded");

        let err = GeminiError::InvalidResponse {
            message: "no candidates".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: no candidates");

        let err = GeminiError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");

        let err = GeminiError::Blocked {
            reason: "SAFETY".to_string(),
        };
        assert_eq!(err.to_string(), "Prompt blocked: SAFETY");
    }

    #[test]
    fn test_image_error_display() {
        let err = ImageError::UnsupportedFormat {
            path: PathBuf::from("frame.bmp"),
        };
        assert_eq!(err.to_string(), "Unsupported image format: frame.bmp");

        let err = ImageError::Read {
            path: PathBuf::from("missing.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "Failed to read image missing.png: not found");
    }

    #[test]
    fn test_gemini_error_conversion_to_app_error() {
        let gemini_err = GeminiError::Timeout { timeout_ms: 1000 };
        let app_err: AppError = gemini_err.into();
        assert!(matches!(app_err, AppError::Gemini(_)));
    }

    #[test]
    fn test_report_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ReportError::from(io);
        assert!(matches!(err, ReportError::Io(_)));
        assert_eq!(err.to_string(), "Failed to write report: denied");
    }
}
