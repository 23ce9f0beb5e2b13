//! LLM integration for the support relay.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait. The classifier
//! only sees `LlmProvider`.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::LlmSettings;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
///
/// Uses OpenAI's chat-completions API, which honours `response_format`.
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(settings.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completions_api().completion_model(&settings.model);
    tracing::info!("Using OpenAI (model: {})", settings.model);
    Ok(Arc::new(RigAdapter::new(model, &settings.model)))
}
