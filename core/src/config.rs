use std::env;
use std::time::Duration;

use url::Url;

use crate::constants::*;
use crate::errors::ClientError;

/// Connection settings of a chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the chat service, e.g. `http://127.0.0.1:8000`. A path
    /// prefix is kept and endpoint paths are appended to it.
    pub base_url: String,
    /// Upper bound for a whole request, including reading a streamed body.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `CLAUDE_CHAT_BASE_URL` and
    /// `CLAUDE_CHAT_TIMEOUT_S`. A timeout that does not parse or is out of
    /// range is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = env::var(BASE_URL_ENV_VAR) {
            config.base_url = base_url;
        }

        if let Ok(timeout_str) = env::var(TIMEOUT_ENV_VAR) {
            match parse_timeout(&timeout_str) {
                Ok(timeout) => config.timeout = timeout,
                Err(e) => tracing::warn!("ignoring {}={:?}: {}", TIMEOUT_ENV_VAR, timeout_str, e),
            }
        }

        config
    }

    pub fn with_timeout_s(mut self, timeout_s: f64) -> Result<Self, ClientError> {
        self.timeout = validate_and_get_timeout_duration(timeout_s)?;
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Checks the settings and returns the parsed base URL.
    pub fn validate(&self) -> Result<Url, ClientError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::InvalidParameter(format!(
                "Invalid base URL format: {} (expected http:// or https://)",
                self.base_url
            )));
        }
        validate_and_get_timeout_duration(self.timeout.as_secs_f64())?;

        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidParameter(format!(
                "Base URL {} cannot carry endpoint paths",
                self.base_url
            )));
        }
        Ok(url)
    }
}

pub fn validate_and_get_timeout_duration(timeout_s: f64) -> Result<Duration, ClientError> {
    if !(MIN_REQUEST_TIMEOUT_S..=MAX_REQUEST_TIMEOUT_S).contains(&timeout_s) {
        return Err(ClientError::InvalidParameter(format!(
            "Timeout {:.3}s is outside the allowed range [{:.3}s, {:.3}s].",
            timeout_s, MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S
        )));
    }
    Ok(Duration::from_secs_f64(timeout_s))
}

fn parse_timeout(timeout_str: &str) -> Result<Duration, ClientError> {
    let timeout_s = timeout_str.trim().parse::<f64>().map_err(|_| {
        ClientError::InvalidParameter(format!("{:?} is not a number of seconds", timeout_str))
    })?;
    validate_and_get_timeout_duration(timeout_s)
}
