//! Relay configuration.
//!
//! [`RelaySettings`] holds raw, optional values from any source (flags,
//! environment, config file). [`RelayConfig::resolve`] validates them once
//! at startup; a [`ConfigError`] there is fatal.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::OperatorId;
use crate::conversation::{DEFAULT_HISTORY_LIMIT, DEFAULT_SYSTEM_PROMPT};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Upper bound for the per-conversation history length.
pub const MAX_HISTORY_LIMIT: usize = 1000;
/// Telegram caps the long-poll timeout at 50 seconds.
pub const MAX_POLLING_TIMEOUT_SECS: u32 = 50;
const DEFAULT_POLLING_TIMEOUT_SECS: u32 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Unvalidated settings. Later sources fill gaps left by earlier ones via
/// [`RelaySettings::or`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub telegram_bot_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub allowed_user_id: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub history_limit: Option<usize>,
    pub system_prompt: Option<String>,
    pub polling_timeout_secs: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub send_typing_indicator: Option<bool>,
}

impl RelaySettings {
    /// Keep values set here; take the rest from `fallback`.
    pub fn or(self, fallback: RelaySettings) -> Self {
        Self {
            telegram_bot_token: self.telegram_bot_token.or(fallback.telegram_bot_token),
            openai_api_key: self.openai_api_key.or(fallback.openai_api_key),
            allowed_user_id: self.allowed_user_id.or(fallback.allowed_user_id),
            openai_model: self.openai_model.or(fallback.openai_model),
            openai_base_url: self.openai_base_url.or(fallback.openai_base_url),
            history_limit: self.history_limit.or(fallback.history_limit),
            system_prompt: self.system_prompt.or(fallback.system_prompt),
            polling_timeout_secs: self.polling_timeout_secs.or(fallback.polling_timeout_secs),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            send_typing_indicator: self
                .send_typing_indicator
                .or(fallback.send_typing_indicator),
        }
    }
}

impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("telegram_bot_token", &redact(&self.telegram_bot_token))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("allowed_user_id", &self.allowed_user_id)
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("history_limit", &self.history_limit)
            .field("system_prompt", &self.system_prompt)
            .field("polling_timeout_secs", &self.polling_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("send_typing_indicator", &self.send_typing_indicator)
            .finish()
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[redacted]")
}

/// Validated configuration for one relay process.
#[derive(Clone)]
pub struct RelayConfig {
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub operator_id: OperatorId,
    pub model: String,
    pub openai_base_url: Option<String>,
    pub history_limit: usize,
    pub system_prompt: String,
    pub polling_timeout_secs: u32,
    pub request_timeout: Duration,
    pub send_typing_indicator: bool,
}

impl RelayConfig {
    /// Validate settings, applying defaults for optional values.
    pub fn resolve(settings: RelaySettings) -> Result<Self, ConfigError> {
        let telegram_bot_token = required(settings.telegram_bot_token, "TELEGRAM_BOT_TOKEN")?;
        let openai_api_key = required(settings.openai_api_key, "OPENAI_API_KEY")?;
        let operator_id = required(settings.allowed_user_id, "ALLOWED_USER_ID")?.parse()?;

        let history_limit = settings.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if history_limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Invalid {
                key: "PARLEY_HISTORY_LIMIT",
                reason: format!("{} exceeds the maximum of {}", history_limit, MAX_HISTORY_LIMIT),
            });
        }

        let polling_timeout_secs = settings
            .polling_timeout_secs
            .unwrap_or(DEFAULT_POLLING_TIMEOUT_SECS);
        if polling_timeout_secs > MAX_POLLING_TIMEOUT_SECS {
            return Err(ConfigError::Invalid {
                key: "polling_timeout_secs",
                reason: format!("must be at most {}", MAX_POLLING_TIMEOUT_SECS),
            });
        }

        let request_timeout_secs = settings
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let openai_base_url = non_blank(settings.openai_base_url);
        if let Some(url) = &openai_base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                key: "OPENAI_BASE_URL",
                reason: format!("'{}' is not an http(s) URL", url),
            });
        }

        Ok(Self {
            telegram_bot_token,
            openai_api_key,
            operator_id,
            model: non_blank(settings.openai_model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url,
            history_limit,
            system_prompt: non_blank(settings.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            polling_timeout_secs,
            request_timeout: Duration::from_secs(request_timeout_secs),
            send_typing_indicator: settings.send_typing_indicator.unwrap_or(true),
        })
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("telegram_bot_token", &"[redacted]")
            .field("openai_api_key", &"[redacted]")
            .field("operator_id", &self.operator_id)
            .field("model", &self.model)
            .field("openai_base_url", &self.openai_base_url)
            .field("history_limit", &self.history_limit)
            .field("polling_timeout_secs", &self.polling_timeout_secs)
            .field("request_timeout", &self.request_timeout)
            .field("send_typing_indicator", &self.send_typing_indicator)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    non_blank(value).ok_or(ConfigError::Missing(key))
}
