//! AI provider implementations for codeloom.
//!
//! - [`AnthropicProvider`] — native Anthropic Messages API with SSE streaming
//! - [`MockProvider`] — deterministic offline stand-in for tests and demos

pub mod anthropic;
pub mod mock;

pub use anthropic::AnthropicProvider;
pub use mock::{MockProvider, MockTurn};

use codeloom_config::AppConfig;
use codeloom_core::error::{Error, ProviderError};
use codeloom_core::provider::Provider;
use std::sync::Arc;

/// Build the provider selected by configuration.
pub fn create_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Error> {
    match config.provider.as_str() {
        "claude" => {
            let api_key = config.anthropic.api_key.clone().ok_or_else(|| {
                Error::Provider(ProviderError::NotConfigured(
                    "anthropic.api_key is not set".into(),
                ))
            })?;
            Ok(Arc::new(
                AnthropicProvider::new(api_key, config.anthropic.model.clone())
                    .with_base_url(config.anthropic.base_url.clone()),
            ))
        }
        "mock" => Ok(Arc::new(MockProvider::new())),
        other => Err(Error::Provider(ProviderError::NotConfigured(format!(
            "unknown provider '{other}'"
        )))),
    }
}
