use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Where the trained forecast model is persisted
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// API credential for the generative backend. Never hard-coded.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Substring a model name must contain to be preferred
    pub preferred_model: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single generation call
    pub generation_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            preferred_model: "1.5-flash".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            generation_timeout_secs: 90,
        }
    }
}

fn default_artifact_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spark-check")
        .join("modelo_ia.bin")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        // Conventional variable name for the credential, lower priority than SPARKCHECK__*
        let api_key = std::env::var("GEMINI_API_KEY").ok();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spark-check");

        let builder = Config::builder()
            // 1. Load default values
            // Server
            .set_default("server.bind_address", "0.0.0.0:8000")?
            // Model
            .set_default(
                "model.artifact_path",
                default_artifact_path().to_string_lossy().to_string(),
            )?
            // Generation
            .set_default("generation.api_key", api_key)?
            .set_default("generation.base_url", "https://generativelanguage.googleapis.com")?
            .set_default("generation.preferred_model", "1.5-flash")?
            .set_default("generation.request_timeout_secs", 60)?
            .set_default("generation.connect_timeout_secs", 10)?
            .set_default("generation.generation_timeout_secs", 90)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (SPARKCHECK__GENERATION__API_KEY=...)
            .add_source(Environment::with_prefix("SPARKCHECK").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}
