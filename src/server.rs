//! HTTP surface: health, upload analysis and document-grounded chat.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::GeminiClient;
use crate::chat::{Attachment, ChatOrchestrator};
use crate::config::AppConfig;
use crate::error::{ChatError, ForecastError};
use crate::ml::ConsumptionForecaster;
use crate::service::{UploadReport, analyze_upload};
use crate::traits::{Clock, SystemClock};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// State shared by every request.
pub struct AppState {
    /// Guards the fit-and-persist critical section
    pub forecaster: Arc<Mutex<ConsumptionForecaster>>,
    pub chat: ChatOrchestrator<GeminiClient>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the production state from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = GeminiClient::new(&config.generation)?;
        Ok(Self::new(
            ConsumptionForecaster::new(config.model.artifact_path.clone()),
            ChatOrchestrator::from_config(client, &config.generation),
            Arc::new(SystemClock),
        ))
    }

    pub fn new(
        forecaster: ConsumptionForecaster,
        chat: ChatOrchestrator<GeminiClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            forecaster: Arc::new(Mutex::new(forecaster)),
            chat,
            clock,
        }
    }
}

// ==================== Errors ====================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forecast(#[from] ForecastError),
    #[error("{0}")]
    Chat(#[from] ChatError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forecast(_) | ApiError::Chat(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::error!("Request failed ({}): {}", status, self);
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ==================== Handlers ====================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadReport>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file content: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No se envió archivo".to_string()))?;
    tracing::info!("Upload received: {} ({} bytes)", filename, bytes.len());

    let forecaster = Arc::clone(&state.forecaster);
    let clock = Arc::clone(&state.clock);
    let report = tokio::task::spawn_blocking(move || {
        let mut forecaster = forecaster.blocking_lock();
        analyze_upload(&filename, &bytes, &mut forecaster, clock.as_ref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Upload analysis task failed: {}", e)))??;

    Ok(Json(report))
}

#[derive(Serialize)]
struct ChatReply {
    response: String,
}

async fn spark_check_ai(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<ChatReply>> {
    let mut prompt: Option<String> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "prompt" => {
                prompt = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read prompt: {}", e))
                })?);
            }
            "files" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read attachment {}: {}", name, e))
                })?;
                attachments.push(Attachment::new(name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let prompt = prompt.ok_or_else(|| ApiError::BadRequest("No se envió pregunta".to_string()))?;
    tracing::info!(
        "Chat request with {} attachment(s): {:?}",
        attachments.len(),
        attachments.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()
    );

    let answer = state.chat.handle(&prompt, attachments).await?;
    Ok(Json(ChatReply {
        response: answer.text,
    }))
}

// ==================== Router ====================

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/health/", get(health))
        .route("/upload", post(upload))
        .route("/upload/", post(upload))
        .route("/spark-check-ai", post(spark_check_ai))
        .route("/spark-check-ai/", post(spark_check_ai));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    if config.generation.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        tracing::warn!("No generation API key configured; chat requests will fail");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    tracing::info!("Listening on {}", config.server.bind_address);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
