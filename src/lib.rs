//! SparkCheck Library
//!
//! This module exposes the consumption forecaster, the advisory rules and
//! the document-grounded chat for the HTTP server, the CLI and tests.

pub mod advisory;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod ingest;
pub mod ml;
pub mod server;
pub mod service;
pub mod traits;

// Re-export commonly used types
pub use advisory::{ConsumptionStats, calculate_stats, generate_advisories};
pub use api::{GeminiClient, ModelInfo};
pub use chat::{Attachment, ChatOrchestrator, ChatResponse, DocumentTextExtractor};
pub use config::AppConfig;
pub use error::{ChatError, ForecastError};
pub use ingest::{Dataset, FileFormat, normalize, read_dataset};
pub use ml::{ConsumptionForecaster, ForecasterState, FORECAST_HOURS};
pub use service::{UploadReport, analyze_upload};
pub use traits::{Clock, DocumentParser, GenerationBackend, MockBackend, MockClock, SystemClock};
