//! Shared types for the message processing pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ── Inbound message ─────────────────────────────────────────────────

/// A customer text message ready for classification.
///
/// Built by the dispatcher from a webhook delivery; lives for one
/// request-reply cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel label passed to the classifier ("WhatsApp").
    pub channel: String,
    /// Platform sender id; also the reply destination.
    pub sender_id: String,
    /// Message body. Never empty.
    pub text: String,
    /// When the delivery was decoded.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

// ── Classification labels ───────────────────────────────────────────

/// Urgency of a customer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urgency {
    Urgent,
    NotUrgent,
    /// A label outside the known set, kept exactly as the model sent it.
    Unrecognized(String),
}

impl Urgency {
    /// Only the exact wire labels map to known variants.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "URGENT" => Self::Urgent,
            "NOT URGENT" => Self::NotUrgent,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Urgent => "URGENT",
            Self::NotUrgent => "NOT URGENT",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

/// What the customer wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Faq,
    OrderIssue,
    RefundRequest,
    Complaint,
    ProductQuestion,
    GeneralSupport,
    Other,
    /// A label outside the known set, kept exactly as the model sent it.
    Unrecognized(String),
}

impl Intent {
    /// Only the exact wire labels map to known variants.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "FAQ" => Self::Faq,
            "Order Issue" => Self::OrderIssue,
            "Refund Request" => Self::RefundRequest,
            "Complaint" => Self::Complaint,
            "Product Question" => Self::ProductQuestion,
            "General Support" => Self::GeneralSupport,
            "Other" => Self::Other,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Faq => "FAQ",
            Self::OrderIssue => "Order Issue",
            Self::RefundRequest => "Refund Request",
            Self::Complaint => "Complaint",
            Self::ProductQuestion => "Product Question",
            Self::GeneralSupport => "General Support",
            Self::Other => "Other",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Urgency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Classification result ───────────────────────────────────────────

/// Summary shown when classification could not run.
pub const FALLBACK_SUMMARY: &str = "Could not parse AI response or an API error occurred.";

/// Reply sent to the customer when classification could not run.
pub const FALLBACK_REPLY: &str = "Hi! Thanks for your message. We’re having a small issue with our assistant. Please try again or contact support directly.";

/// Classification of one inbound message. Always fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub urgency: Urgency,
    pub intent: Intent,
    pub summary: String,
    pub reply: String,
}

impl ClassificationResult {
    /// The fixed result used whenever the model call or its parsing fails.
    pub fn fallback() -> Self {
        Self {
            urgency: Urgency::NotUrgent,
            intent: Intent::Other,
            summary: FALLBACK_SUMMARY.to_string(),
            reply: FALLBACK_REPLY.to_string(),
        }
    }
}

/// Result of a classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    /// The model returned a JSON object (possibly with per-field defaults applied).
    Classified(ClassificationResult),
    /// The model call or parse failed; `result` is always the fallback.
    Degraded {
        result: ClassificationResult,
        reason: String,
    },
}

impl ClassifyOutcome {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            result: ClassificationResult::fallback(),
            reason: reason.into(),
        }
    }

    pub fn result(&self) -> &ClassificationResult {
        match self {
            Self::Classified(result) | Self::Degraded { result, .. } => result,
        }
    }

    pub fn into_result(self) -> ClassificationResult {
        match self {
            Self::Classified(result) | Self::Degraded { result, .. } => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Classified(_) => "classified",
            Self::Degraded { .. } => "degraded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_labels_map_to_known_variants() {
        assert_eq!(Urgency::parse("URGENT"), Urgency::Urgent);
        assert_eq!(Urgency::parse("NOT URGENT"), Urgency::NotUrgent);
        assert_eq!(Intent::parse("Order Issue"), Intent::OrderIssue);
        assert_eq!(Intent::parse("Refund Request"), Intent::RefundRequest);
        assert_eq!(Intent::parse("FAQ"), Intent::Faq);
        assert_eq!(Intent::parse("General Support"), Intent::GeneralSupport);
    }

    #[test]
    fn label_variants_are_kept_as_sent() {
        for raw in ["not_urgent", "urgent", " URGENT ", "Not Urgent"] {
            let urgency = Urgency::parse(raw);
            assert_eq!(urgency, Urgency::Unrecognized(raw.into()));
            assert_eq!(urgency.to_string(), raw);
        }
        for raw in ["ORDER_ISSUE", "order issue", "faq"] {
            assert_eq!(Intent::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn unknown_labels_pass_through_verbatim() {
        let urgency = Urgency::parse("Somewhat urgent");
        assert_eq!(urgency, Urgency::Unrecognized("Somewhat urgent".into()));
        assert_eq!(urgency.as_str(), "Somewhat urgent");
        assert!(!urgency.is_recognized());

        let intent = Intent::parse("Billing");
        assert_eq!(intent.to_string(), "Billing");
        assert!(!intent.is_recognized());
    }

    #[test]
    fn fallback_is_fixed() {
        let fallback = ClassificationResult::fallback();
        assert_eq!(fallback.urgency, Urgency::NotUrgent);
        assert_eq!(fallback.intent, Intent::Other);
        assert_eq!(fallback.summary, FALLBACK_SUMMARY);
        assert_eq!(fallback.reply, FALLBACK_REPLY);
    }

    #[test]
    fn degraded_outcome_carries_fallback() {
        let outcome = ClassifyOutcome::degraded("timeout");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.label(), "degraded");
        assert_eq!(outcome.into_result(), ClassificationResult::fallback());
    }

    #[test]
    fn result_serializes_labels_as_strings() {
        let result = ClassificationResult {
            urgency: Urgency::Urgent,
            intent: Intent::RefundRequest,
            summary: "s".into(),
            reply: "r".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["urgency"], "URGENT");
        assert_eq!(json["intent"], "Refund Request");
    }
}
