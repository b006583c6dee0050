use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::GuardError;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
pub const DEFAULT_WEBHOOK_PORT: u16 = 5000;

/// Default timeout applied to every gateway call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings shared by every client in the SDK.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GuardConfig {
    pub gateway_url: String,
    pub api_key: String,
    /// Public URL the gateway should call back (informational; registered gateway-side).
    pub webhook_url: Option<String>,
    /// Shared secret used to verify `X-AgentGuard-Signature` on inbound webhooks.
    pub webhook_secret: Option<String>,
}

impl GuardConfig {
    pub fn new(gateway_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            api_key: api_key.into(),
            webhook_url: None,
            webhook_secret: None,
        }
    }

    pub fn with_webhook(mut self, url: Option<String>, secret: Option<String>) -> Self {
        self.webhook_url = url;
        self.webhook_secret = secret;
        self
    }

    /// Read configuration from `AGENTGUARD_*` environment variables.
    /// A `.env` file in the working directory is honoured if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            gateway_url: std::env::var("AGENTGUARD_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.into()),
            api_key: std::env::var("AGENTGUARD_API_KEY").unwrap_or_default(),
            webhook_url: non_empty_var("AGENTGUARD_WEBHOOK_URL"),
            webhook_secret: non_empty_var("AGENTGUARD_WEBHOOK_SECRET"),
        }
    }

    /// Explicit arguments win; anything missing falls back to the environment.
    /// Both URL and key must be given for the explicit pair to be used.
    pub fn resolve(gateway_url: Option<&str>, api_key: Option<&str>) -> Result<Self, GuardError> {
        let cfg = match (gateway_url, api_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                let env = Self::from_env();
                Self::new(url, key).with_webhook(env.webhook_url, env.webhook_secret)
            }
            _ => Self::from_env(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.gateway_url.trim().is_empty() {
            return Err(GuardError::Config("gateway_url is required".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(GuardError::Config("agent api key is required".into()));
        }
        url::Url::parse(&self.gateway_url).map_err(|e| {
            GuardError::Config(format!("gateway_url '{}' is not a valid URL: {}", self.gateway_url, e))
        })?;
        Ok(())
    }

    /// Gateway base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.gateway_url.trim_end_matches('/')
    }

    /// Join a gateway-relative path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

/// Bind settings for the webhook listener.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub secret: Option<String>,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_WEBHOOK_PORT,
            secret: None,
        }
    }
}

impl WebhookServerConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            host: std::env::var("AGENTGUARD_WEBHOOK_HOST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.host),
            port: std::env::var("AGENTGUARD_WEBHOOK_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            secret: non_empty_var("AGENTGUARD_WEBHOOK_SECRET"),
        }
    }

    /// Bind settings from the environment, verifying with the secret carried by
    /// `config`. A secret set on the config holder wins over the environment.
    pub fn from_guard_config(config: &GuardConfig) -> Self {
        let env = Self::from_env();
        Self {
            secret: config
                .webhook_secret
                .clone()
                .filter(|s| !s.trim().is_empty())
                .or(env.secret),
            ..env
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
