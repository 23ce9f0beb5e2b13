//! Bridges a rig `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, ResponseFormat, Role,
};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }
}

/// A request split into rig's preamble / history / prompt shape.
#[derive(Debug)]
struct RigTurns {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

/// System turns become the preamble; the last turn must be the user's.
fn split_turns(messages: Vec<ChatMessage>) -> Result<RigTurns, LlmError> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content),
            Role::User => turns.push(Message::user(message.content)),
            Role::Assistant => turns.push(Message::assistant(message.content)),
        }
    }

    let prompt = match turns.pop() {
        Some(prompt @ Message::User { .. }) => prompt,
        _ => {
            return Err(LlmError::RequestFailed {
                provider: "rig".to_string(),
                reason: "request must end with a user turn".to_string(),
            });
        }
    };

    Ok(RigTurns {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: turns,
        prompt,
    })
}

/// Provider-specific body fields for the requested output format.
fn format_params(format: ResponseFormat) -> Option<serde_json::Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(json!({ "response_format": { "type": "json_object" } })),
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let RigTurns {
            preamble,
            history,
            prompt,
        } = split_turns(request.messages)?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(params) = format_params(request.response_format) {
            builder = builder.additional_params(params);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|item| match item {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "response contained no text".to_string(),
            });
        }

        let input_tokens = u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX);
        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        tracing::debug!(
            model = %self.model_name,
            input_tokens,
            output_tokens,
            "Completion finished"
        );

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
