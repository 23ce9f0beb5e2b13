//! Channel I/O: the WhatsApp webhook surface and the outbound sender.

pub mod channel;
pub mod cli;
pub mod webhook;
pub mod whatsapp;
pub mod whatsapp_types;

pub use channel::*;
pub use webhook::{WebhookState, webhook_routes};
pub use whatsapp::WhatsAppSender;
