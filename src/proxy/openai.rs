//! OpenAI-compatible client routed through the gateway.
//!
//! Request and response bodies keep the model API's shape. Only the destination
//! changes: `{gateway}/proxy/v1/<endpoint>` with the agent key as bearer token,
//! plus `X-Original-URL` naming where the call would have gone.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::upstream::UpstreamClient;
use crate::approvals::ApprovalClient;
use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::middleware::key_inject::{inject_agent_key, ORIGINAL_URL_HEADER};
use crate::models::llm::{ChatCompletionRequest, ChatCompletionResponse};

pub const MODEL_PROXY_PREFIX: &str = "proxy/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct GuardedOpenAi {
    config: GuardConfig,
    upstream: UpstreamClient,
    original_base: String,
}

impl GuardedOpenAi {
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self {
            config,
            upstream: UpstreamClient::new()?,
            original_base: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Explicit URL and key, falling back to the environment when either is missing.
    pub fn connect(gateway_url: Option<&str>, api_key: Option<&str>) -> Result<Self, GuardError> {
        Self::new(GuardConfig::resolve(gateway_url, api_key)?)
    }

    pub fn from_env() -> Result<Self, GuardError> {
        Self::new(GuardConfig::from_env())
    }

    /// Model API base reported in `X-Original-URL` (defaults to OpenAI).
    pub fn with_original_base(mut self, base: impl Into<String>) -> Self {
        self.original_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Approval sub-client sharing this client's config and connection pool.
    pub fn approvals(&self) -> ApprovalClient {
        ApprovalClient::from_parts(self.config.clone(), self.upstream.http().clone())
    }

    /// Gateway URL of a model endpoint such as `chat/completions`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        self.config.endpoint(&format!(
            "{}/{}",
            MODEL_PROXY_PREFIX,
            endpoint.trim_start_matches('/')
        ))
    }

    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, GuardError> {
        self.post_typed("chat/completions", request).await
    }

    /// POST any JSON body to a model endpoint and return the raw JSON answer.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Value, GuardError> {
        self.post_typed(endpoint, body).await
    }

    async fn post_typed<B, T>(&self, endpoint: &str, body: &B) -> Result<T, GuardError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = endpoint.trim_start_matches('/');
        let url = self.endpoint_url(endpoint);
        let original = format!("{}/{}", self.original_base, endpoint);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inject_agent_key(&mut headers, &self.config.api_key)?;
        if let Ok(v) = HeaderValue::from_str(&original) {
            headers.insert(ORIGINAL_URL_HEADER, v);
        }

        debug!(endpoint, "forwarding model call to gateway");
        let resp = self
            .upstream
            .forward(Method::POST, &url, headers, serde_json::to_vec(body)?)
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GuardError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
