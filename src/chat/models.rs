//! Generation model selection.

use crate::api::ModelInfo;
use crate::error::ChatError;

/// Picks the model a chat request is sent to.
#[derive(Debug, Clone)]
pub struct GenerationModelSelector {
    preferred: String,
}

impl GenerationModelSelector {
    /// `preferred` is matched as a substring of the model name.
    pub fn new(preferred: impl Into<String>) -> Self {
        Self {
            preferred: preferred.into(),
        }
    }

    /// First generation-capable model whose name contains the preferred
    /// marker, otherwise the first generation-capable model in list order.
    pub fn select<'a>(&self, models: &'a [ModelInfo]) -> Result<&'a ModelInfo, ChatError> {
        let mut candidates = models.iter().filter(|m| m.supports_generation());

        let first = candidates.clone().next().ok_or(ChatError::NoModelAvailable)?;

        if self.preferred.is_empty() {
            return Ok(first);
        }

        Ok(candidates
            .find(|m| m.name.contains(&self.preferred))
            .unwrap_or(first))
    }
}
