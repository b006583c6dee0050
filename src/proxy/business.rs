//! Business API calls proxied through the gateway.
//!
//! Instead of calling a third-party API directly, the caller hands the gateway a
//! [`ProxyRequest`] describing the call. The gateway may execute it, block it, or
//! park it behind an approval; [`ProxyOutcome`] reports which.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use super::upstream::UpstreamClient;
use crate::approvals::read_envelope;
use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::middleware::intercept::BUSINESS_PROXY_PATH;
use crate::models::envelope::{ProxyOutcome, ProxyRequest};

/// Optional parts of a proxied call.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequestOptions {
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Appended to the target URL as a query string.
    pub params: Vec<(String, String)>,
}

impl ProxyRequestOptions {
    pub fn json(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

#[derive(Clone)]
pub struct GuardedHttp {
    config: GuardConfig,
    upstream: UpstreamClient,
}

impl GuardedHttp {
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self {
            config,
            upstream: UpstreamClient::new()?,
        })
    }

    pub fn from_env() -> Result<Self, GuardError> {
        Self::new(GuardConfig::from_env())
    }

    pub fn proxy_url(&self) -> String {
        self.config.endpoint(BUSINESS_PROXY_PATH)
    }

    /// Build the envelope for `method url` without sending it.
    pub fn build_request(&self, method: &Method, url: &str, opts: ProxyRequestOptions) -> ProxyRequest {
        let target_url = if opts.params.is_empty() {
            url.to_string()
        } else {
            let query = opts
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}{}", url, sep, query)
        };

        let headers = if opts.headers.is_empty() {
            BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
        } else {
            opts.headers
        };

        ProxyRequest {
            api_key: self.config.api_key.clone(),
            target_url,
            method: method.as_str().to_uppercase(),
            headers,
            body: opts.body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        opts: ProxyRequestOptions,
    ) -> Result<ProxyOutcome, GuardError> {
        let envelope = self.build_request(&method, url, opts);
        debug!(method = %envelope.method, target = %envelope.target_url, "proxying business call");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .upstream
            .forward(
                Method::POST,
                &self.proxy_url(),
                headers,
                serde_json::to_vec(&envelope)?,
            )
            .await?;

        let outcome = ProxyOutcome::from_envelope(read_envelope(resp).await?);
        if let Some(id) = outcome.approval_request_id() {
            info!(approval_id = id, target = %envelope.target_url, "business call is pending approval");
        }
        Ok(outcome)
    }

    pub async fn get(&self, url: &str, opts: ProxyRequestOptions) -> Result<ProxyOutcome, GuardError> {
        self.request(Method::GET, url, opts).await
    }

    pub async fn post(&self, url: &str, opts: ProxyRequestOptions) -> Result<ProxyOutcome, GuardError> {
        self.request(Method::POST, url, opts).await
    }

    pub async fn put(&self, url: &str, opts: ProxyRequestOptions) -> Result<ProxyOutcome, GuardError> {
        self.request(Method::PUT, url, opts).await
    }

    pub async fn delete(&self, url: &str, opts: ProxyRequestOptions) -> Result<ProxyOutcome, GuardError> {
        self.request(Method::DELETE, url, opts).await
    }

    pub async fn patch(&self, url: &str, opts: ProxyRequestOptions) -> Result<ProxyOutcome, GuardError> {
        self.request(Method::PATCH, url, opts).await
    }
}
