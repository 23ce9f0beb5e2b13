//! WhatsApp channel — sends text replies through the Cloud API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{info, warn};

use crate::channels::{ReplySender, TransportOutcome};
use crate::config::WhatsAppConfig;
use crate::error::ChannelError;

/// Body of a `POST /{phone_number_id}/messages` text send.
#[derive(Debug, Serialize)]
struct SendTextBody<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextPayload<'a>,
}

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    body: &'a str,
}

impl<'a> SendTextBody<'a> {
    fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextPayload { body },
        }
    }
}

/// Outbound sender for one WhatsApp business phone number.
pub struct WhatsAppSender {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppSender {
    pub fn new(config: WhatsAppConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::ClientBuild {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: WhatsAppConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ReplySender for WhatsAppSender {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, destination: &str, text: &str) -> TransportOutcome {
        let url = self.config.messages_url();
        let body = SendTextBody::new(destination, text);

        info!(to = destination, url = %url, chars = text.chars().count(), "Sending WhatsApp message");

        let resp = match self
            .client
            .post(&url)
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(to = destination, error = %e, "WhatsApp send failed before a response");
                return TransportOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if status.is_success() {
            info!(to = destination, status = status.as_u16(), response = %body, "WhatsApp send response");
            TransportOutcome::Delivered {
                status: status.as_u16(),
                body,
            }
        } else {
            warn!(to = destination, status = status.as_u16(), response = %body, "WhatsApp send rejected");
            TransportOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(api_base: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: SecretString::from("wa-token"),
            phone_number_id: "PNID".into(),
            verify_token: SecretString::from("verify"),
            app_secret: None,
            api_base: api_base.to_string(),
            api_version: "v24.0".into(),
            test_recipient: None,
        }
    }

    #[test]
    fn send_body_shape() {
        let json = serde_json::to_value(SendTextBody::new("15551234567", "Hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "15551234567",
                "type": "text",
                "text": {"body": "Hello"}
            })
        );
    }

    #[tokio::test]
    async fn posts_text_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v24.0/PNID/messages"))
            .and(header("authorization", "Bearer wa-token"))
            .and(body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "2348100000000",
                "type": "text",
                "text": {"body": "We're on it!"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"messages": [{"id": "wamid.out"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sender = WhatsAppSender::new(config(&server.uri()), Duration::from_secs(5)).unwrap();
        let outcome = sender.send_text("2348100000000", "We're on it!").await;

        match outcome {
            TransportOutcome::Delivered { status, body } => {
                assert_eq!(status, 200);
                assert!(body.contains("wamid.out"));
            }
            other => panic!("Expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_success_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"expired\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WhatsAppSender::new(config(&server.uri()), Duration::from_secs(5)).unwrap();
        let outcome = sender.send_text("1", "hi").await;

        assert_eq!(
            outcome,
            TransportOutcome::Rejected {
                status: 401,
                body: "{\"error\":\"expired\"}".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_failed() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let sender = WhatsAppSender::new(
            config(&format!("http://127.0.0.1:{port}")),
            Duration::from_secs(2),
        )
        .unwrap();
        let outcome = sender.send_text("1", "hi").await;
        assert!(matches!(outcome, TransportOutcome::Failed { .. }));
    }
}
