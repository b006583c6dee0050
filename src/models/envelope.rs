//! Wire shapes shared by the gateway's management and proxy endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GuardError;

/// Every gateway JSON response is wrapped as `{ code, message, data }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl GatewayEnvelope {
    pub const SUCCESS: i64 = 200;

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// Unwrap `data`, turning a non-200 `code` into [`GuardError::Api`].
    pub fn into_data(self, context: &str) -> Result<Value, GuardError> {
        if !self.is_success() {
            return Err(GuardError::Api {
                code: self.code,
                message: format!(
                    "{}: {}",
                    context,
                    self.message.as_deref().unwrap_or("Unknown error")
                ),
            });
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

/// Body posted to `/proxy/v1/api` to have the gateway perform a call on our behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub api_key: String,
    pub target_url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// How the gateway disposed of a proxied business call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyOutcome {
    /// The call went through; carries the target's response body.
    Success(Value),
    /// A reviewer must sign off first.
    PendingApproval {
        approval_request_id: String,
        message: String,
    },
    /// `data` in a shape we don't classify further.
    Data(Value),
    Error { message: String, code: Option<i64> },
}

impl ProxyOutcome {
    pub fn from_envelope(envelope: GatewayEnvelope) -> Self {
        if !envelope.is_success() {
            return ProxyOutcome::Error {
                message: envelope.message.unwrap_or_else(|| "Unknown error".into()),
                code: Some(envelope.code),
            };
        }

        let data = match envelope.data {
            Some(d) => d,
            None => {
                return ProxyOutcome::Error {
                    message: envelope.message.unwrap_or_else(|| "Unknown error".into()),
                    code: Some(envelope.code),
                }
            }
        };

        match data.get("status").and_then(Value::as_str) {
            Some("PENDING_APPROVAL") => ProxyOutcome::PendingApproval {
                approval_request_id: data
                    .get("approvalRequestId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                message: "This operation requires approval".into(),
            },
            Some("SUCCESS") if data.get("response").is_some() => {
                ProxyOutcome::Success(data["response"].clone())
            }
            _ => ProxyOutcome::Data(data),
        }
    }

    pub fn approval_request_id(&self) -> Option<&str> {
        match self {
            ProxyOutcome::PendingApproval {
                approval_request_id,
                ..
            } => Some(approval_request_id),
            _ => None,
        }
    }
}
