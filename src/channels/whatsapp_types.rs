//! WhatsApp Cloud API webhook payload types.
//!
//! Only the path to the first message is decoded. List items are kept as raw
//! JSON and decoded one at a time, so a broken sibling entry, change or
//! message never spoils the one that is actually read.

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::pipeline::types::InboundMessage;

/// Channel label handed to the classifier for WhatsApp messages.
pub const WHATSAPP_CHANNEL: &str = "WhatsApp";

/// Top-level webhook delivery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: Option<ChangeValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    /// Absent for status updates (sent/delivered/read).
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
}

/// A single inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: Option<String>,
}

// ── Extraction ──────────────────────────────────────────────────────

/// Why a delivery produced no message to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Body was not JSON or did not match the payload shape.
    Malformed(String),
    NoEntry,
    NoChange,
    NoValue,
    /// No `messages` key or an empty list (e.g. a status update).
    NoMessages,
    MissingSender,
    UnsupportedType(String),
    EmptyText,
    /// `X-Hub-Signature-256` missing or wrong.
    BadSignature,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed payload: {reason}"),
            Self::NoEntry => f.write_str("no entry"),
            Self::NoChange => f.write_str("no change in first entry"),
            Self::NoValue => f.write_str("no value in first change"),
            Self::NoMessages => f.write_str("no messages"),
            Self::MissingSender => f.write_str("message has no sender"),
            Self::UnsupportedType(kind) => write!(f, "unsupported message type '{kind}'"),
            Self::EmptyText => f.write_str("text message has empty body"),
            Self::BadSignature => f.write_str("signature verification failed"),
        }
    }
}

/// Result of pulling the first text message out of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Message(InboundMessage),
    Skip(SkipReason),
}

impl WebhookPayload {
    /// Decode a raw JSON value. Shape mismatches become `SkipReason::Malformed`.
    pub fn from_value(raw: &Value) -> Result<Self, SkipReason> {
        decode(raw, "payload")
    }

    /// First message of `entry[0].changes[0].value`, if it is usable text.
    pub fn first_text_message(&self) -> ExtractOutcome {
        match self.locate_first_message() {
            Ok(message) => message.to_inbound(),
            Err(reason) => ExtractOutcome::Skip(reason),
        }
    }

    fn locate_first_message(&self) -> Result<WhatsAppMessage, SkipReason> {
        let entry: WebhookEntry =
            decode(first(&self.entry).ok_or(SkipReason::NoEntry)?, "entry[0]")?;
        let change: WebhookChange =
            decode(first(&entry.changes).ok_or(SkipReason::NoChange)?, "changes[0]")?;
        let value = change.value.ok_or(SkipReason::NoValue)?;
        decode(first(&value.messages).ok_or(SkipReason::NoMessages)?, "messages[0]")
    }
}

fn first(items: &Option<Vec<Value>>) -> Option<&Value> {
    items.as_deref().and_then(|items| items.first())
}

fn decode<T: DeserializeOwned>(value: &Value, at: &str) -> Result<T, SkipReason> {
    T::deserialize(value).map_err(|e| SkipReason::Malformed(format!("{at}: {e}")))
}

impl WhatsAppMessage {
    fn to_inbound(&self) -> ExtractOutcome {
        let kind = self.message_type.as_deref().unwrap_or_default();
        if kind != "text" {
            return ExtractOutcome::Skip(SkipReason::UnsupportedType(kind.to_string()));
        }
        let Some(sender) = self.from.as_deref().filter(|s| !s.is_empty()) else {
            return ExtractOutcome::Skip(SkipReason::MissingSender);
        };
        let Some(body) = self
            .text
            .as_ref()
            .and_then(|t| t.body.as_deref())
            .filter(|b| !b.is_empty())
        else {
            return ExtractOutcome::Skip(SkipReason::EmptyText);
        };

        ExtractOutcome::Message(InboundMessage::new(WHATSAPP_CHANNEL, sender, body))
    }
}
