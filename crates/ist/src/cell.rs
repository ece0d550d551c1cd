//! Write-once holder for the extractor.

use std::sync::{Arc, OnceLock};

use coursellm_config::{AppConfig, ConfigError};
use tracing::info;

use crate::extractor::IstExtractor;

/// Holds the extractor once it has been built from configuration.
///
/// Owned by whoever serves requests; reads after initialization take no
/// lock.
#[derive(Default)]
pub struct ExtractorCell {
    inner: OnceLock<Arc<IstExtractor>>,
}

impl ExtractorCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell that is already initialized with `extractor`.
    pub fn with_extractor(extractor: IstExtractor) -> Self {
        let cell = Self::new();
        cell.set(extractor);
        cell
    }

    /// Resolve LLM settings, build the provider and store the extractor.
    ///
    /// Configuration problems are reported before anything is stored.
    /// Once initialized, later calls return the existing extractor.
    pub fn initialize(&self, config: &AppConfig) -> Result<Arc<IstExtractor>, ConfigError> {
        if let Some(existing) = self.inner.get() {
            return Ok(existing.clone());
        }

        let llm = config.resolve_llm()?;
        let provider = coursellm_providers::build_from_config(&llm);
        let extractor = IstExtractor::from_resolved(provider, &llm);
        info!(
            provider = extractor.provider_name(),
            model = extractor.model(),
            "IST extractor initialized"
        );
        Ok(self.set(extractor))
    }

    /// Store `extractor` unless one is already present; returns whichever
    /// is stored.
    pub fn set(&self, extractor: IstExtractor) -> Arc<IstExtractor> {
        self.inner.get_or_init(|| Arc::new(extractor)).clone()
    }

    pub fn get(&self) -> Option<Arc<IstExtractor>> {
        self.inner.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.get().is_some()
    }
}
