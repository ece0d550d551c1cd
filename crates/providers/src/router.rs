//! Provider router — builds the configured LLM backend from settings.

use std::sync::Arc;
use std::time::Duration;

use coursellm_config::ResolvedLlm;
use coursellm_core::provider::Provider;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named by resolved configuration.
///
/// Both supported backends speak the OpenAI chat-completions dialect, so
/// only the name, base URL, and credential differ.
pub fn build_from_config(llm: &ResolvedLlm) -> Arc<dyn Provider> {
    info!(
        provider = llm.provider.name(),
        model = %llm.model,
        base_url = %llm.base_url,
        "Configuring LLM provider"
    );

    Arc::new(OpenAiCompatProvider::new(
        llm.provider.name(),
        llm.base_url.clone(),
        llm.api_key.clone(),
        Duration::from_secs(llm.timeout_secs),
    ))
}
