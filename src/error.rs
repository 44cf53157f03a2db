//! Error types for the forecast and chat pipelines.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised anywhere on the upload → fit → forecast → advisory path.
///
/// Every variant is fatal for the request: the HTTP layer turns it into a
/// single `{error}` body, never a partial forecast.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// One or more required columns are absent after header normalization.
    #[error("Missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A cell in a required column could not be parsed.
    #[error("Cannot parse {column} at row {row}: '{value}'")]
    Parse {
        column: String,
        row: usize,
        value: String,
    },

    /// Statistics were requested over a dataset with no rows.
    #[error("Dataset contains no rows")]
    EmptyDataset,

    /// Forecast requested before a successful fit or load.
    #[error("Forecast model has not been fitted or loaded")]
    NotFitted,

    /// The persisted model artifact is missing or cannot be decoded.
    #[error("Model artifact {path} is unusable: {reason}")]
    CorruptModel { path: PathBuf, reason: String },

    /// The upload is neither delimited text nor a spreadsheet.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The upload looked like a supported format but could not be read.
    #[error("Failed to read dataset: {0}")]
    Read(String),

    /// The regressor could not be trained.
    #[error("Training failed: {0}")]
    Training(String),

    /// The fitted model could not be written to its artifact path.
    #[error("Failed to persist model: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the document-grounded chat.
///
/// Per-attachment extraction failures are not represented here: they are
/// logged and skipped by the extractor.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error en el motor de IA: no hay modelos de generación disponibles")]
    NoModelAvailable,

    #[error("Error en el motor de IA: {0}")]
    GenerationEngine(String),

    #[error("Error en el motor de IA: sin respuesta tras {}s", .0.as_secs())]
    GenerationTimeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_every_missing_column() {
        let err = ForecastError::Schema {
            missing: vec!["timestamp".to_string(), "consumo kwh".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("timestamp"));
        assert!(msg.contains("consumo kwh"));
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = ForecastError::Parse {
            column: "timestamp".to_string(),
            row: 3,
            value: "yesterday".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot parse timestamp at row 3: 'yesterday'"
        );
    }

    #[test]
    fn test_chat_errors_identify_generation_engine() {
        let errors = [
            ChatError::NoModelAvailable,
            ChatError::GenerationEngine("quota exceeded".to_string()),
            ChatError::GenerationTimeout(Duration::from_secs(30)),
        ];
        for err in errors {
            assert!(err.to_string().starts_with("Error en el motor de IA"));
        }
    }

    #[test]
    fn test_timeout_message_includes_seconds() {
        let err = ChatError::GenerationTimeout(Duration::from_secs(45));
        assert!(err.to_string().contains("45s"));
    }
}
