//! Inbound dispatcher — webhook delivery → classifier → reply sender.
//!
//! Every delivery is handled on its own with no shared mutable state.
//! Classification always finishes (possibly degraded) before the send is
//! attempted. Nothing here returns an error: structural problems in the
//! payload become a `Skipped` report and are logged.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::channels::whatsapp_types::{ExtractOutcome, SkipReason, WebhookPayload};
use crate::channels::{ReplySender, TransportOutcome};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::{ClassifyOutcome, InboundMessage};

/// What happened to one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Nothing to classify; no reply was sent.
    Skipped(SkipReason),
    /// A text message was classified and a reply send was attempted.
    Replied {
        message: InboundMessage,
        classification: ClassifyOutcome,
        transport: TransportOutcome,
    },
}

impl DeliveryReport {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Replied { .. } => "replied",
        }
    }
}

/// Routes webhook deliveries through classification to the reply channel.
pub struct InboundDispatcher {
    classifier: Arc<Classifier>,
    sender: Arc<dyn ReplySender>,
}

impl InboundDispatcher {
    pub fn new(classifier: Arc<Classifier>, sender: Arc<dyn ReplySender>) -> Self {
        Self { classifier, sender }
    }

    /// Handle a raw request body. Bodies that are not JSON are skipped.
    pub async fn handle_body(&self, body: &[u8]) -> DeliveryReport {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(raw) => self.handle_delivery(&raw).await,
            Err(e) => {
                warn!(error = %e, bytes = body.len(), "Webhook body is not JSON");
                DeliveryReport::Skipped(SkipReason::Malformed(e.to_string()))
            }
        }
    }

    /// Handle one decoded webhook delivery.
    pub async fn handle_delivery(&self, raw: &serde_json::Value) -> DeliveryReport {
        let delivery_id = Uuid::new_v4();
        let span = info_span!("delivery", %delivery_id);

        async move {
            debug!(payload = %raw, "Incoming webhook payload");

            let outcome = match WebhookPayload::from_value(raw) {
                Ok(payload) => payload.first_text_message(),
                Err(reason) => ExtractOutcome::Skip(reason),
            };

            match outcome {
                ExtractOutcome::Message(message) => self.handle_message(message).await,
                ExtractOutcome::Skip(reason) => {
                    log_skip(&reason);
                    DeliveryReport::Skipped(reason)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Classify one message and send the reply to its sender.
    pub async fn handle_message(&self, message: InboundMessage) -> DeliveryReport {
        info!(
            channel = %message.channel,
            sender = %message.sender_id,
            chars = message.text.chars().count(),
            "Processing inbound message"
        );

        let classification = self
            .classifier
            .classify(&message.channel, &message.text)
            .await;
        let result = classification.result();

        info!(
            sender = %message.sender_id,
            outcome = classification.label(),
            urgency = %result.urgency,
            intent = %result.intent,
            "Classification complete"
        );

        let transport = self
            .sender
            .send_text(&message.sender_id, &result.reply)
            .await;

        info!(
            sender = %message.sender_id,
            channel = self.sender.name(),
            transport = transport.label(),
            status = ?transport.status(),
            "Reply dispatch finished"
        );

        DeliveryReport::Replied {
            message,
            classification,
            transport,
        }
    }
}

fn log_skip(reason: &SkipReason) {
    match reason {
        SkipReason::Malformed(_) | SkipReason::MissingSender | SkipReason::BadSignature => {
            warn!(reason = %reason, "Webhook delivery skipped");
        }
        SkipReason::UnsupportedType(_) | SkipReason::EmptyText => {
            info!(reason = %reason, "Ignoring non-text message");
        }
        SkipReason::NoEntry | SkipReason::NoChange | SkipReason::NoValue | SkipReason::NoMessages => {
            debug!(reason = %reason, "Delivery carries no message");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::pipeline::types::{FALLBACK_REPLY, Intent, Urgency};

    /// Mock LLM that records the user turn of each request.
    struct RecordingLlm {
        response: Option<String>,
        user_turns: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn model_name(&self) -> &str {
            "mock-dispatch"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            if let Some(turn) = request.messages.last() {
                self.user_turns.lock().unwrap().push(turn.content.clone());
            }
            match &self.response {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "unreachable".into(),
                }),
            }
        }
    }

    /// Reply sender that records every send.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_text(&self, destination: &str, text: &str) -> TransportOutcome {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            TransportOutcome::Delivered {
                status: 200,
                body: "{}".into(),
            }
        }
    }

    struct Harness {
        llm: Arc<RecordingLlm>,
        sender: Arc<RecordingSender>,
        dispatcher: InboundDispatcher,
    }

    fn harness(response: Option<&str>) -> Harness {
        let llm = Arc::new(RecordingLlm {
            response: response.map(str::to_string),
            user_turns: Mutex::new(Vec::new()),
        });
        let sender = Arc::new(RecordingSender::default());
        let classifier = Arc::new(Classifier::new(llm.clone()));
        let dispatcher = InboundDispatcher::new(classifier, sender.clone());
        Harness {
            llm,
            sender,
            dispatcher,
        }
    }

    const ORDER_REPLY: &str = r#"{"urgency": "URGENT", "intent": "Order Issue", "summary": "Customer asks where the order is.", "reply": "Sorry for the wait! Could you share your order number?"}"#;

    fn text_delivery(from: &str, body: &str) -> serde_json::Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "messages": [{"from": from, "id": "wamid.1", "type": "text", "text": {"body": body}}]
            }}]}]
        })
    }

    #[tokio::test]
    async fn text_delivery_is_classified_and_replied() {
        let h = harness(Some(ORDER_REPLY));

        let report = h
            .dispatcher
            .handle_delivery(&text_delivery("2348100000000", "Where is my order?"))
            .await;

        assert_eq!(
            *h.llm.user_turns.lock().unwrap(),
            vec!["Channel: WhatsApp\nMessage: Where is my order?".to_string()]
        );
        assert_eq!(
            *h.sender.sent.lock().unwrap(),
            vec![(
                "2348100000000".to_string(),
                "Sorry for the wait! Could you share your order number?".to_string()
            )]
        );

        match report {
            DeliveryReport::Replied {
                message,
                classification,
                transport,
            } => {
                assert_eq!(message.channel, "WhatsApp");
                assert_eq!(classification.result().urgency, Urgency::Urgent);
                assert_eq!(classification.result().intent, Intent::OrderIssue);
                assert!(transport.is_delivered());
            }
            other => panic!("Expected Replied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn image_delivery_invokes_nothing() {
        let h = harness(Some(ORDER_REPLY));
        let raw = json!({"entry": [{"changes": [{"value": {
            "messages": [{"from": "1", "type": "image", "image": {"id": "m"}}]
        }}]}]});

        let report = h.dispatcher.handle_delivery(&raw).await;

        assert_eq!(
            report,
            DeliveryReport::Skipped(SkipReason::UnsupportedType("image".into()))
        );
        assert!(h.llm.user_turns.lock().unwrap().is_empty());
        assert!(h.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn structural_deviations_are_skipped() {
        let h = harness(Some(ORDER_REPLY));
        for raw in [
            json!({}),
            json!({"entry": []}),
            json!({"entry": [{"changes": [{"value": {"messages": []}}]}]}),
            json!({"entry": [{"changes": [{"value": {"statuses": []}}]}]}),
            json!({"entry": 5}),
            json!(null),
        ] {
            let report = h.dispatcher.handle_delivery(&raw).await;
            assert!(matches!(report, DeliveryReport::Skipped(_)), "payload: {raw}");
        }
        assert!(h.llm.user_turns.lock().unwrap().is_empty());
        assert!(h.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_body_is_skipped() {
        let h = harness(Some(ORDER_REPLY));
        let report = h.dispatcher.handle_body(b"definitely not json").await;
        assert!(matches!(report, DeliveryReport::Skipped(SkipReason::Malformed(_))));
        assert!(h.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn classifier_failure_still_sends_fallback_reply() {
        let h = harness(None);

        let report = h
            .dispatcher
            .handle_delivery(&text_delivery("15550001111", "hello?"))
            .await;

        assert_eq!(
            *h.sender.sent.lock().unwrap(),
            vec![("15550001111".to_string(), FALLBACK_REPLY.to_string())]
        );
        match report {
            DeliveryReport::Replied { classification, .. } => {
                assert!(classification.is_degraded());
            }
            other => panic!("Expected Replied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn redelivery_runs_two_independent_cycles() {
        let h = harness(Some(ORDER_REPLY));
        let raw = text_delivery("2348100000000", "Where is my order?");

        let first = h.dispatcher.handle_delivery(&raw).await;
        let second = h.dispatcher.handle_delivery(&raw).await;

        assert_eq!(first.label(), "replied");
        assert_eq!(second.label(), "replied");
        assert_eq!(h.llm.user_turns.lock().unwrap().len(), 2);

        let sent = h.sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }
}
