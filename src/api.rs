use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::traits::GenerationBackend;

/// Generation method a model must advertise to be usable for chat.
pub const GENERATE_CONTENT: &str = "generateContent";

/// A model entry as returned by the model-listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-1.5-flash`.
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Build a model entry that supports content generation.
    pub fn generative(name: &str) -> Self {
        Self {
            name: name.to_string(),
            supported_generation_methods: vec![GENERATE_CONTENT.to_string()],
        }
    }

    /// Whether the model can be used for free-form content generation.
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Response body of `generateContent`.
/// Only the fields needed to recover the answer text are modelled.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    pub fn text(&self) -> Result<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            match self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                Some(reason) => anyhow::bail!("Prompt was blocked: {}", reason),
                None => anyhow::bail!("Generation response contained no text"),
            }
        }

        Ok(text)
    }
}

/// API client for the Generative Language REST service.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("Generation API key is not configured")
    }

    /// Fetch every page of the model listing.
    pub async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let api_key = self.api_key()?;
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = reqwest::Url::parse(&format!("{}/v1beta/models", self.base_url))
                .context("Invalid generation base URL")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", "1000");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .client
                .get(url)
                .header("x-goog-api-key", api_key)
                .send()
                .await
                .context("Failed to send model listing request")?;

            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("Model listing returned error status: {}", status);
            }

            let page = response
                .json::<ListModelsResponse>()
                .await
                .context("Failed to parse model listing response")?;

            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Backend listed {} models", models.len());
        Ok(models)
    }

    /// Send a single-turn generation request to `model`.
    pub async fn generate_content(&self, model: &str, prompt: &str) -> Result<String> {
        let api_key = self.api_key()?;
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        let url = format!("{}/v1beta/{}:generateContent", self.base_url, model);

        let body = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Generation returned error status: {}", status);
        }

        let data = response
            .json::<GenerateResponse>()
            .await
            .context("Failed to parse generation response")?;

        data.text()
    }
}

impl GenerationBackend for GeminiClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.fetch_models().await
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.generate_content(model, prompt).await
    }
}
