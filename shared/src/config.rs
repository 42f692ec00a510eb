use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::{ValidatedUrl, MAX_TIMEOUT_MS};
use crate::{DEFAULT_BASE_URL, DEFAULT_OTP_SUCCESS_DELAY, DEFAULT_REQUEST_TIMEOUT};

pub const MAX_OTP_SUCCESS_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Runtime settings handed over by the shell, usually as JSON.
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub otp_success_delay_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis())
                .unwrap_or(MAX_TIMEOUT_MS),
            otp_success_delay_ms: u64::try_from(DEFAULT_OTP_SUCCESS_DELAY.as_millis())
                .unwrap_or_default(),
            user_agent: None,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_otp_success_delay(mut self, delay: Duration) -> Self {
        self.otp_success_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ValidatedUrl::new(self.base_url.as_str())
            .map_err(|e| ConfigError::Validation(format!("base_url: {e}")))?;
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_ms must be > 0".into(),
            ));
        }
        if self.request_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "request_timeout_ms must be <= {MAX_TIMEOUT_MS}"
            )));
        }
        if self.otp_success_delay_ms > MAX_OTP_SUCCESS_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "otp_success_delay_ms must be <= {MAX_OTP_SUCCESS_DELAY_MS}"
            )));
        }
        if let Some(agent) = &self.user_agent {
            if agent.trim().is_empty() || agent.contains(['\r', '\n']) {
                return Err(ConfigError::Validation(
                    "user_agent must be a single non-empty line".into(),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn otp_success_delay(&self) -> Duration {
        Duration::from_millis(self.otp_success_delay_ms)
    }
}
