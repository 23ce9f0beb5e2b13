//! Classifier — asks the model for urgency, intent, summary and reply.
//!
//! Never fails outward. Transport, provider and parse failures become
//! `ClassifyOutcome::Degraded` carrying the fixed fallback; a valid JSON
//! object with missing keys gets per-field defaults instead.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider, ResponseFormat};
use crate::pipeline::types::{ClassificationResult, ClassifyOutcome, Intent, Urgency};

/// Classifies customer messages with a chat model.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one message. Always yields a result.
    pub async fn classify(&self, channel: &str, message: &str) -> ClassifyOutcome {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(channel, message)),
        ])
        .with_response_format(ResponseFormat::JsonObject);

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    model = self.llm.model_name(),
                    error = %e,
                    "Classification call failed, using fallback"
                );
                return ClassifyOutcome::degraded(format!("LLM call failed: {e}"));
            }
        };

        match parse_classification(&response.content) {
            Ok(result) => {
                info!(
                    channel,
                    urgency = %result.urgency,
                    intent = %result.intent,
                    "Message classified"
                );
                ClassifyOutcome::Classified(result)
            }
            Err(reason) => {
                warn!(
                    raw_response = %response.content,
                    error = %reason,
                    "Failed to parse classification response, using fallback"
                );
                ClassifyOutcome::degraded(reason)
            }
        }
    }

    /// Like `classify`, discarding whether the result was degraded.
    pub async fn classify_result(&self, channel: &str, message: &str) -> ClassificationResult {
        self.classify(channel, message).await.into_result()
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Fixed instruction sent as the system turn.
pub fn build_system_prompt() -> &'static str {
    "You are a Customer Service Support Agent.\n\n\
     Your job is to:\n\
     1. Classify the message into EXACTLY ONE of:\n\
        - URGENT\n\
        - NOT URGENT\n\n\
     2. Identify the customer's intent. Choose ONE:\n\
        - FAQ\n\
        - Order Issue\n\
        - Refund Request\n\
        - Complaint\n\
        - Product Question\n\
        - General Support\n\
        - Other\n\n\
     3. Write a short, friendly summary (2-3 sentences).\n\n\
     4. Draft a polite reply that the business can send to the customer.\n\
        - Tone: warm, clear, professional.\n\
        - If the customer is upset, apologize first.\n\
        - Always give next steps.\n\n\
     5. If the message is missing important info (like order number, email, photo, etc.),\n\
        politely ask for those details in the reply.\n\n\
     IMPORTANT: Respond ONLY with a single valid JSON object with exactly these four keys:\n\n\
     {\n\
       \"urgency\": \"URGENT or NOT URGENT\",\n\
       \"intent\": \"one of the intents listed\",\n\
       \"summary\": \"short summary here\",\n\
       \"reply\": \"full reply text here\"\n\
     }"
}

/// User turn carrying the channel label and the raw message.
pub fn build_user_prompt(channel: &str, message: &str) -> String {
    format!("Channel: {channel}\nMessage: {message}")
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model output. Errors only when the output is not a JSON object.
fn parse_classification(raw: &str) -> Result<ClassificationResult, String> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| format!("JSON parse error: {e}"))?;
    let Value::Object(fields) = value else {
        return Err(format!("expected a JSON object, got {}", json_kind(&value)));
    };

    let urgency = string_field(&fields, "urgency")
        .map(Urgency::parse)
        .unwrap_or(Urgency::NotUrgent);
    let intent = string_field(&fields, "intent")
        .map(Intent::parse)
        .unwrap_or(Intent::Other);

    if !urgency.is_recognized() {
        warn!(urgency = %urgency, "Model returned an urgency outside the known set");
    }
    if !intent.is_recognized() {
        warn!(intent = %intent, "Model returned an intent outside the known set");
    }

    let result = ClassificationResult {
        urgency,
        intent,
        summary: string_field(&fields, "summary").unwrap_or_default().to_string(),
        reply: string_field(&fields, "reply").unwrap_or_default().to_string(),
    };

    if result.reply.is_empty() {
        debug!("Classification response has no reply text");
    }

    Ok(result)
}

/// A string-valued key; any other JSON type counts as absent.
fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
