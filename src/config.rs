//! Configuration types.
//!
//! Everything is read once at startup and handed to each component's
//! constructor. Nothing below `main` looks at the process environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default chat model for classification.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default Graph API host for the WhatsApp Cloud API.
pub const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com";

/// Default Graph API version.
pub const DEFAULT_WHATSAPP_API_VERSION: &str = "v24.0";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Settings for the classification model.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: SecretString,
    pub model: String,
}

/// Settings for the WhatsApp Cloud API account.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Bearer token for the send-message endpoint.
    pub access_token: SecretString,
    /// Sending account (phone number) identifier.
    pub phone_number_id: String,
    /// Shared secret for the subscription handshake.
    pub verify_token: SecretString,
    /// App secret for `X-Hub-Signature-256`. Signature checks are off when unset.
    pub app_secret: Option<SecretString>,
    pub api_base: String,
    pub api_version: String,
    /// Destination for the `/test-send` diagnostic route.
    pub test_recipient: Option<String>,
}

impl WhatsAppConfig {
    /// Send-message endpoint for the configured account.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Timeout applied to outbound WhatsApp calls.
    pub http_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Full relay configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub whatsapp: WhatsAppConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            llm: LlmSettings::from_lookup(&lookup)?,
            whatsapp: WhatsAppConfig::from_lookup(&lookup)?,
            server: ServerConfig::from_lookup(&lookup)?,
        })
    }
}

impl LlmSettings {
    /// Load only the model settings (used by the CLI classify runner).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_key: SecretString::from(required(lookup, "OPENAI_API_KEY")?),
            model: optional(lookup, "RELAY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

impl WhatsAppConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            access_token: SecretString::from(required(lookup, "WHATSAPP_TOKEN")?),
            phone_number_id: required(lookup, "PHONE_NUMBER_ID")?,
            verify_token: SecretString::from(required(lookup, "VERIFY_TOKEN")?),
            app_secret: optional(lookup, "WHATSAPP_APP_SECRET").map(SecretString::from),
            api_base: optional(lookup, "WHATSAPP_API_BASE")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_API_BASE.to_string()),
            api_version: optional(lookup, "WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_API_VERSION.to_string()),
            test_recipient: optional(lookup, "WHATSAPP_TEST_RECIPIENT"),
        })
    }
}

impl ServerConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match optional(lookup, "RELAY_PORT") {
            Some(raw) => parse_number::<u16>("RELAY_PORT", &raw)?,
            None => defaults.port,
        };
        let http_timeout = match optional(lookup, "RELAY_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number::<u64>("RELAY_HTTP_TIMEOUT_SECS", &raw)?),
            None => defaults.http_timeout,
        };
        Ok(Self { port, http_timeout })
    }
}

/// Treats empty and whitespace-only values as unset.
fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}
