//! Outbound request interception.
//!
//! [`Interceptor`] is a `reqwest-middleware` layer. While installed, every request
//! whose URL matches one of its patterns is rewritten into a `POST /proxy/v1/api`
//! envelope so the gateway performs (and governs) the call. Everything else goes
//! out untouched. Instances are independent; there is no process-wide hook.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::Extensions;
use regex::Regex;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use serde_json::Value;
use tracing::debug;

use super::key_inject::inject_agent_key;
use crate::config::GuardConfig;
use crate::errors::GuardError;
use crate::models::envelope::ProxyRequest;

pub const BUSINESS_PROXY_PATH: &str = "proxy/v1/api";

#[derive(Clone)]
pub struct Interceptor {
    inner: Arc<Inner>,
}

struct Inner {
    proxy_url: reqwest::Url,
    api_key: String,
    patterns: Vec<Regex>,
    installed: AtomicBool,
}

impl Interceptor {
    /// Compile `patterns` (regex, matched anywhere in the URL). An empty list
    /// intercepts every request. The interceptor starts uninstalled.
    pub fn new<I, S>(gateway_url: &str, api_key: &str, patterns: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cfg = GuardConfig::new(gateway_url, api_key);
        cfg.validate()?;
        Self::from_config(&cfg, patterns)
    }

    pub fn from_config<I, S>(config: &GuardConfig, patterns: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let proxy_url = reqwest::Url::parse(&config.endpoint(BUSINESS_PROXY_PATH))
            .map_err(|e| GuardError::Config(format!("invalid gateway url: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                proxy_url,
                api_key: config.api_key.clone(),
                patterns,
                installed: AtomicBool::new(false),
            }),
        })
    }

    pub fn install(&self) {
        if !self.inner.installed.swap(true, Ordering::SeqCst) {
            debug!(
                patterns = self.inner.patterns.len(),
                proxy = %self.inner.proxy_url,
                "gateway interception installed"
            );
        }
    }

    pub fn uninstall(&self) {
        if self.inner.installed.swap(false, Ordering::SeqCst) {
            debug!("gateway interception uninstalled");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.inner.installed.load(Ordering::SeqCst)
    }

    /// Pattern check only; ignores the install state.
    pub fn should_intercept(&self, url: &str) -> bool {
        self.inner.patterns.is_empty() || self.inner.patterns.iter().any(|p| p.is_match(url))
    }

    /// Wrap `base` so every request it sends goes through this interceptor.
    pub fn client(&self, base: reqwest::Client) -> ClientWithMiddleware {
        ClientBuilder::new(base).with(self.clone()).build()
    }

    /// Turn `req` into the equivalent gateway proxy request.
    pub fn rewrite(&self, req: Request) -> Result<Request, GuardError> {
        let target_url = req.url().to_string();

        // Repeated headers are comma-joined; values that are not valid text
        // cannot go into the JSON envelope and are dropped.
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in req.headers() {
            let Ok(value) = value.to_str() else {
                debug!(header = %name, "dropping non-text header from proxied request");
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        // Streaming bodies have no byte view and are not forwarded.
        let body = req.body().and_then(|b| b.as_bytes()).map(|bytes| {
            serde_json::from_slice::<Value>(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
        });

        let envelope = ProxyRequest {
            api_key: self.inner.api_key.clone(),
            target_url,
            method: req.method().as_str().to_uppercase(),
            headers,
            body,
        };

        let mut proxied = Request::new(Method::POST, self.inner.proxy_url.clone());
        proxied
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inject_agent_key(proxied.headers_mut(), &self.inner.api_key)?;
        *proxied.body_mut() = Some(serde_json::to_vec(&envelope)?.into());
        *proxied.timeout_mut() = req.timeout().copied();

        Ok(proxied)
    }
}

#[async_trait::async_trait]
impl Middleware for Interceptor {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        if !self.is_installed() || !self.should_intercept(req.url().as_str()) {
            return next.run(req, extensions).await;
        }

        debug!(method = %req.method(), url = %req.url(), "routing request through gateway");
        let proxied = self
            .rewrite(req)
            .map_err(|e| reqwest_middleware::Error::Middleware(anyhow::Error::new(e)))?;
        next.run(proxied, extensions).await
    }
}
