//! Inbound message pipeline.
//!
//! Every webhook delivery flows through:
//! 1. `WebhookPayload::first_text_message()`: decode and pick the first text message
//! 2. `Classifier::classify()`: LLM urgency / intent / summary / reply
//! 3. `ReplySender::send_text()`: one best-effort send of the reply
//!
//! `InboundDispatcher` drives the three steps for one delivery.

pub mod classifier;
pub mod dispatcher;
pub mod types;

pub use classifier::Classifier;
pub use dispatcher::{DeliveryReport, InboundDispatcher};
