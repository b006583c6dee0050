//! Approval management API client.
//!
//! Two calls, both plain request/response with no caching and no retry:
//! - `GET  /api/v1/approvals/:id/status`
//! - `POST /api/v1/approvals/:id/reason`

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::config::{GuardConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::errors::GuardError;
use crate::middleware::key_inject::agent_key_headers;
use crate::models::approval::{ApprovalStatusResponse, SubmitReasonResponse};
use crate::models::envelope::GatewayEnvelope;

#[derive(Clone)]
pub struct ApprovalClient {
    config: GuardConfig,
    http: reqwest::Client,
}

impl ApprovalClient {
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        Self::with_timeout(config, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: GuardConfig, timeout: Duration) -> Result<Self, GuardError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Ok(Self { config, http })
    }

    /// Build from `AGENTGUARD_*` environment variables.
    pub fn from_env() -> Result<Self, GuardError> {
        Self::new(GuardConfig::from_env())
    }

    pub(crate) fn from_parts(config: GuardConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn approval_url(&self, approval_id: &str, action: &str) -> String {
        self.config.endpoint(&format!(
            "api/v1/approvals/{}/{}",
            urlencoding::encode(approval_id),
            action
        ))
    }

    /// Current server-side state of `approval_id`.
    pub async fn get_status(&self, approval_id: &str) -> Result<ApprovalStatusResponse, GuardError> {
        let url = self.approval_url(approval_id, "status");
        debug!(approval_id, "querying approval status");

        let resp = self
            .http
            .get(&url)
            .headers(agent_key_headers(&self.config.api_key)?)
            .send()
            .await?;

        let envelope = read_envelope(resp).await?;
        let data = envelope.into_data("Failed to query approval status")?;
        let status: ApprovalStatusResponse = serde_json::from_value(data)?;

        debug!(approval_id, status = %status.status, "approval status received");
        Ok(status)
    }

    /// Attach a free-text justification to a pending approval.
    pub async fn submit_reason(
        &self,
        approval_id: &str,
        reason: &str,
    ) -> Result<SubmitReasonResponse, GuardError> {
        let url = self.approval_url(approval_id, "reason");
        debug!(approval_id, "submitting approval reason");

        let resp = self
            .http
            .post(&url)
            .headers(agent_key_headers(&self.config.api_key)?)
            .json(&json!({ "reason": reason }))
            .send()
            .await?;

        read_envelope(resp)
            .await?
            .into_data("Failed to submit approval reason")?;

        Ok(SubmitReasonResponse {
            success: true,
            message: "Approval reason submitted successfully".into(),
        })
    }
}

/// Pass non-2xx responses through as [`GuardError::Gateway`], otherwise decode
/// the `{code, message, data}` wrapper.
pub(crate) async fn read_envelope(resp: reqwest::Response) -> Result<GatewayEnvelope, GuardError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = %status, "gateway returned an error status");
        return Err(GuardError::Gateway {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
