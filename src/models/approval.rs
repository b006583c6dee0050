use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "approved")]
    Approved,
    #[serde(alias = "rejected")]
    Rejected,
    #[serde(alias = "expired")]
    Expired,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
        }
    }

    /// Anything other than `Pending` is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            "EXPIRED" => Ok(ApprovalStatus::Expired),
            other => Err(format!("unknown approval status '{}'", other)),
        }
    }
}

/// Snapshot of an approval as reported by `GET /api/v1/approvals/:id/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatusResponse {
    pub status: ApprovalStatus,
    /// Present once an approved action has been executed by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<Value>,
    /// Reviewer remark, usually set on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl ApprovalStatusResponse {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    pub fn is_rejected(&self) -> bool {
        self.status == ApprovalStatus::Rejected
    }

    pub fn is_expired(&self) -> bool {
        self.status == ApprovalStatus::Expired
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitReasonResponse {
    pub success: bool,
    pub message: String,
}

/// A decision delivered by the gateway through the approval webhook.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApprovalDecision {
    pub approval_id: String,
    pub status: ApprovalStatus,
    pub execution_result: Option<Value>,
    pub remark: Option<String>,
    pub received_at: DateTime<Utc>,
    /// The complete JSON object as received.
    pub payload: Value,
}

/// Reasons a webhook body cannot be turned into an [`ApprovalDecision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionParseError {
    NotAnObject,
    MissingApprovalId,
    MissingStatus,
    UnknownStatus(String),
}

impl fmt::Display for DecisionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionParseError::NotAnObject => f.write_str("payload is not a JSON object"),
            DecisionParseError::MissingApprovalId => f.write_str("missing approval id"),
            DecisionParseError::MissingStatus => f.write_str("missing status"),
            DecisionParseError::UnknownStatus(s) => write!(f, "unknown status '{}'", s),
        }
    }
}

impl ApprovalDecision {
    /// Build a decision from a parsed webhook body.
    ///
    /// The gateway has used `approvalId`, `approval_id` and `id` for the identifier
    /// and `executionResult`, `execution_result` and `result` for the outcome;
    /// the first present key wins.
    ///
    /// `status` is required. A body without one is refused rather than handed
    /// to the waiter, since a waiter cannot act on an undecided payload.
    pub fn from_payload(payload: Value) -> Result<Self, DecisionParseError> {
        let obj = payload.as_object().ok_or(DecisionParseError::NotAnObject)?;

        let approval_id = ["approvalId", "approval_id", "id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .ok_or(DecisionParseError::MissingApprovalId)?
            .to_string();

        let raw_status = obj
            .get("status")
            .and_then(Value::as_str)
            .ok_or(DecisionParseError::MissingStatus)?;
        let status = raw_status
            .parse::<ApprovalStatus>()
            .map_err(|_| DecisionParseError::UnknownStatus(raw_status.to_string()))?;

        let execution_result = ["executionResult", "execution_result", "result"]
            .iter()
            .find_map(|k| obj.get(*k))
            .filter(|v| !v.is_null())
            .cloned();

        let remark = obj
            .get("remark")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self {
            approval_id,
            status,
            execution_result,
            remark,
            received_at: Utc::now(),
            payload,
        })
    }
}
