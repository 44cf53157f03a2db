//! Document-grounded chat
//!
//! A chat request flows through four steps:
//! 1. Text is extracted from every PDF attachment (`documents`)
//! 2. The guardrail policy, that context and the question are assembled (`prompt`)
//! 3. A generation-capable model is chosen from the backend listing (`models`)
//! 4. The backend generates the answer under a timeout

pub mod documents;
pub mod models;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::ChatError;
use crate::traits::{DocumentParser, GenerationBackend};

pub use documents::{Attachment, DocumentTextExtractor, PdfParser};
pub use models::GenerationModelSelector;

/// Answer returned to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub text: String,
}

/// Composes extraction, prompt assembly, model selection and generation.
pub struct ChatOrchestrator<B, P = PdfParser> {
    backend: B,
    extractor: Arc<DocumentTextExtractor<P>>,
    selector: GenerationModelSelector,
    timeout: Duration,
}

impl<B: GenerationBackend> ChatOrchestrator<B, PdfParser> {
    /// Orchestrator using the PDF parser and the configured model preference.
    pub fn from_config(backend: B, config: &GenerationConfig) -> Self {
        Self::new(
            backend,
            DocumentTextExtractor::new(),
            GenerationModelSelector::new(config.preferred_model.clone()),
            Duration::from_secs(config.generation_timeout_secs),
        )
    }
}

impl<B, P> ChatOrchestrator<B, P>
where
    B: GenerationBackend,
    P: DocumentParser + 'static,
{
    pub fn new(
        backend: B,
        extractor: DocumentTextExtractor<P>,
        selector: GenerationModelSelector,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            extractor: Arc::new(extractor),
            selector,
            timeout,
        }
    }

    /// Answer `question` grounded on the text of `attachments`.
    ///
    /// Attachment failures never surface; only the generation side can fail.
    pub async fn handle(
        &self,
        question: &str,
        attachments: Vec<Attachment>,
    ) -> Result<ChatResponse, ChatError> {
        let extracted = self.extract_context(attachments).await;
        let context = prompt::build_context(&extracted);
        let full_prompt = prompt::assemble(&context, question);

        let models = self.backend.list_models().await.map_err(|e| {
            tracing::error!("Model listing failed: {:#}", e);
            ChatError::GenerationEngine(e.to_string())
        })?;
        let model = self.selector.select(&models)?;
        tracing::info!("Generating answer with {}", model.name);

        let text = tokio::time::timeout(self.timeout, self.backend.generate(&model.name, &full_prompt))
            .await
            .map_err(|_| {
                tracing::error!("Generation timed out after {:?}", self.timeout);
                ChatError::GenerationTimeout(self.timeout)
            })?
            .map_err(|e| {
                tracing::error!("Generation failed: {:#}", e);
                ChatError::GenerationEngine(e.to_string())
            })?;

        Ok(ChatResponse { text })
    }

    async fn extract_context(&self, attachments: Vec<Attachment>) -> String {
        if attachments.is_empty() {
            return String::new();
        }

        let extractor = Arc::clone(&self.extractor);
        match tokio::task::spawn_blocking(move || extractor.extract(&attachments)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Attachment extraction task failed: {}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModelInfo;
    use crate::traits::MockBackend;
    use anyhow::{Context, Result};

    /// Pages are the UTF-8 bytes; "CORRUPT" inputs fail.
    struct TextParser;

    impl DocumentParser for TextParser {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
            let text = std::str::from_utf8(bytes).context("not utf-8")?;
            if text == "CORRUPT" {
                anyhow::bail!("broken document");
            }
            Ok(vec![text.to_string()])
        }
    }

    fn orchestrator(backend: MockBackend) -> ChatOrchestrator<MockBackend, TextParser> {
        ChatOrchestrator::new(
            backend,
            DocumentTextExtractor::with_parser(TextParser),
            GenerationModelSelector::new("1.5-flash"),
            Duration::from_millis(200),
        )
    }

    fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::generative("models/gemini-pro"),
            ModelInfo::generative("models/gemini-1.5-flash"),
        ]
    }

    #[tokio::test]
    async fn test_no_attachments_uses_placeholder_and_policy() {
        let backend = MockBackend::new(models(), "respuesta");
        let chat = orchestrator(backend.clone());

        let response = chat.handle("¿Cuál es mi pico?", Vec::new()).await.unwrap();

        assert_eq!(response.text, "respuesta");
        let (model, sent) = &backend.requests()[0];
        assert_eq!(model, "models/gemini-1.5-flash");
        assert!(sent.contains(prompt::NO_CONTEXT_PLACEHOLDER));
        assert!(sent.contains(prompt::REFUSAL));
        assert!(sent.ends_with("PREGUNTA DEL USUARIO: ¿Cuál es mi pico?"));
    }

    #[tokio::test]
    async fn test_attachment_text_reaches_prompt() {
        let backend = MockBackend::new(models(), "ok");
        let chat = orchestrator(backend.clone());

        chat.handle(
            "¿Voltaje?",
            vec![
                Attachment::new("uno.pdf", "230V a las 19:00"),
                Attachment::new("dos.pdf", "CORRUPT"),
                Attachment::new("tres.pdf", "pico 4.2 kWh"),
                Attachment::new("datos.csv", "ignored"),
            ],
        )
        .await
        .unwrap();

        let sent = &backend.requests()[0].1;
        assert!(sent.contains("DATOS TÉCNICOS EXTRAÍDOS DE LOS DOCUMENTOS:"));
        assert!(sent.contains("--- CONTENIDO DEL ARCHIVO uno.pdf ---"));
        assert!(!sent.contains("dos.pdf"));
        assert!(sent.contains("pico 4.2 kWh"));
        assert!(!sent.contains("ignored"));
        assert!(!sent.contains(prompt::NO_CONTEXT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_only_unreadable_attachments_fall_back_to_placeholder() {
        let backend = MockBackend::new(models(), "ok");
        let chat = orchestrator(backend.clone());

        chat.handle("q", vec![Attachment::new("dos.pdf", "CORRUPT")])
            .await
            .unwrap();

        assert!(backend.requests()[0].1.contains(prompt::NO_CONTEXT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_no_models_available() {
        let backend = MockBackend::new(vec![], "unused");
        let chat = orchestrator(backend.clone());

        let err = chat.handle("q", Vec::new()).await.unwrap_err();

        assert!(matches!(err, ChatError::NoModelAvailable));
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_engine_error() {
        let backend = MockBackend::new(models(), "unused").failing("429 quota exceeded");
        let chat = orchestrator(backend.clone());

        let err = chat.handle("q", Vec::new()).await.unwrap_err();

        match err {
            ChatError::GenerationEngine(msg) => assert!(msg.contains("quota")),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let backend = MockBackend::new(models(), "late").with_delay(Duration::from_secs(5));
        let chat = orchestrator(backend);

        let err = chat.handle("q", Vec::new()).await.unwrap_err();

        assert!(matches!(err, ChatError::GenerationTimeout(_)));
    }
}
