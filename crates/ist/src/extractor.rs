//! The IST extractor — one model call per request, wrapped in the
//! formatter and normalizer.

use std::sync::Arc;

use coursellm_config::ResolvedLlm;
use coursellm_core::{ExtractionResult, IstRequest, Message, Provider, ProviderRequest, Result};
use tracing::{debug, error, info};

use crate::context::format_context;
use crate::normalize::{RawModelOutput, normalize};
use crate::prompt;

/// Extracts intent, skills and trajectory from a student utterance.
pub struct IstExtractor {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for IstExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IstExtractor")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl IstExtractor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Build from resolved configuration.
    pub fn from_resolved(provider: Arc<dyn Provider>, llm: &ResolvedLlm) -> Self {
        Self::new(provider, llm.model.clone())
            .with_temperature(llm.temperature)
            .with_max_tokens(llm.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one extraction.
    ///
    /// Validation failures and provider failures are returned as errors;
    /// whatever the model replies is normalized into a valid result.
    pub async fn extract(&self, request: &IstRequest) -> Result<ExtractionResult> {
        request.validate()?;

        info!(
            utterance_chars = request.utterance.chars().count(),
            has_course_context = request.course_context.is_some(),
            chat_history = request.chat_history.len(),
            ist_history = request.ist_history.len(),
            has_profile = request.student_profile.is_some(),
            "Extracting IST"
        );

        let blocks = format_context(
            &request.chat_history,
            &request.ist_history,
            request.student_profile.as_ref(),
        );
        let reply = self.complete_json(prompt::ist_messages(request, &blocks)).await?;

        let result = normalize(&RawModelOutput::Text(reply));
        info!(
            intent_chars = result.intent.chars().count(),
            skills = result.skills.len(),
            trajectory = result.trajectory.len(),
            "IST extraction complete"
        );
        Ok(result)
    }

    /// Send `messages` in JSON mode and return the raw reply text.
    pub async fn complete_json(&self, messages: Vec<Message>) -> Result<String> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        let response = self.provider.complete(request).await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "Model invocation failed");
            e
        })?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Model replied"
            );
        }
        Ok(response.message.content)
    }
}
