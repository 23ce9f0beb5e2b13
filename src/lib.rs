//! Support relay — WhatsApp webhook to LLM classification to reply.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
