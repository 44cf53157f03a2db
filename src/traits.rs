//! Abstractions over time and external services to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic forecasting
//! - `GenerationBackend`: Abstracting the generative-language service
//! - `DocumentParser`: Abstracting page-by-page document text extraction

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};

use crate::api::ModelInfo;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// This allows injecting mock clocks during testing to create
/// deterministic, reproducible tests for time-dependent logic.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }
}

// ==================== Generation Backend Trait ====================

/// Trait for a generative-language service.
pub trait GenerationBackend: Send + Sync {
    /// List the models visible to the configured credential.
    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelInfo>>> + Send;

    /// Generate free-form content from a single prompt.
    fn generate(&self, model: &str, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Mock backend for testing that records every generation request.
#[derive(Debug, Clone)]
pub struct MockBackend {
    models: Vec<ModelInfo>,
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockBackend {
    /// Create a mock that lists `models` and answers every prompt with `reply`.
    pub fn new(models: Vec<ModelInfo>, reply: &str) -> Self {
        Self {
            models,
            reply: Ok(reply.to_string()),
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every generation request fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.reply = Err(message.to_string());
        self
    }

    /// Sleep for `delay` before answering a generation request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all `(model, prompt)` pairs that were sent.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the count of generation requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl GenerationBackend for MockBackend {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.models.clone())
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

// ==================== Document Parser Trait ====================

/// Trait for extracting text from a document, one string per page.
pub trait DocumentParser: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_system_clock_returns_current_time() {
        let clock = SystemClock;
        let before = Utc::now();
        let clock_time = clock.now_utc();
        let after = Utc::now();

        assert!(clock_time >= before);
        assert!(clock_time <= after);
    }

    #[test]
    fn test_mock_clock_returns_set_time() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap();
        let clock = MockClock::new(fixed_time);

        assert_eq!(clock.now_utc(), fixed_time);
    }

    #[test]
    fn test_mock_clock_can_be_updated() {
        let time1 = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let time2 = Utc.with_ymd_and_hms(2024, 6, 15, 14, 0, 0).unwrap();

        let clock = MockClock::new(time1);
        clock.set_time(time2);
        assert_eq!(clock.now_utc(), time2);
    }

    #[test]
    fn test_mock_clock_advance() {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let clock = MockClock::new(start);

        clock.advance(chrono::Duration::days(1));

        let expected = Utc.with_ymd_and_hms(2024, 6, 16, 10, 0, 0).unwrap();
        assert_eq!(clock.now_utc(), expected);
    }

    #[tokio::test]
    async fn test_mock_backend_records_requests() {
        let backend = MockBackend::new(vec![ModelInfo::generative("models/gemini-pro")], "hola");

        let reply = backend.generate("models/gemini-pro", "¿pico?").await.unwrap();

        assert_eq!(reply, "hola");
        assert_eq!(backend.request_count(), 1);
        assert_eq!(
            backend.requests()[0],
            ("models/gemini-pro".to_string(), "¿pico?".to_string())
        );
    }

    #[tokio::test]
    async fn test_mock_backend_failing() {
        let backend = MockBackend::new(Vec::new(), "unused").failing("quota exceeded");

        let err = backend.generate("m", "p").await.unwrap_err();

        assert_eq!(err.to_string(), "quota exceeded");
        assert!(backend.list_models().await.unwrap().is_empty());
    }
}
