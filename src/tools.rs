//! Function-calling tools that let a model manage its own approvals.
//!
//! [`GuardTools::definitions`] goes into the `tools` field of a chat request;
//! when the model calls one, feed the name and raw arguments to
//! [`GuardTools::call`] and return its JSON to the model as a tool message.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::approvals::ApprovalClient;
use crate::models::llm::{ChatMessage, ToolCallInfo};

pub const SUBMIT_APPROVAL_REASON: &str = "submit_approval_reason";
pub const CHECK_APPROVAL_STATUS: &str = "check_approval_status";

#[derive(Clone)]
pub struct GuardTools {
    approvals: ApprovalClient,
}

#[derive(Deserialize)]
struct SubmitArgs {
    approval_id: String,
    reason: String,
}

#[derive(Deserialize)]
struct CheckArgs {
    approval_id: String,
}

impl GuardTools {
    pub fn new(approvals: ApprovalClient) -> Self {
        Self { approvals }
    }

    /// OpenAI function-calling definitions for both tools.
    pub fn definitions() -> Vec<Value> {
        vec![
            json!({
                "type": "function",
                "function": {
                    "name": SUBMIT_APPROVAL_REASON,
                    "description": "Submit a justification for an operation that AgentGuard \
                        intercepted for approval. Use this when a high-risk action was blocked \
                        pending review.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "approval_id": {
                                "type": "string",
                                "description": "Approval request ID (from the interception message)"
                            },
                            "reason": {
                                "type": "string",
                                "description": "Detailed explanation of why the operation is needed"
                            }
                        },
                        "required": ["approval_id", "reason"]
                    }
                }
            }),
            json!({
                "type": "function",
                "function": {
                    "name": CHECK_APPROVAL_STATUS,
                    "description": "Check the status of an approval request. Use this when the \
                        user says the approval has been granted, to fetch the execution result.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "approval_id": {
                                "type": "string",
                                "description": "Approval request ID"
                            }
                        },
                        "required": ["approval_id"]
                    }
                }
            }),
        ]
    }

    pub fn is_guard_tool(name: &str) -> bool {
        name == SUBMIT_APPROVAL_REASON || name == CHECK_APPROVAL_STATUS
    }

    /// Run the named tool. Failures are reported inside the returned JSON so the
    /// model can read them; this never errors.
    pub async fn call(&self, name: &str, arguments: &str) -> Value {
        match name {
            SUBMIT_APPROVAL_REASON => match serde_json::from_str::<SubmitArgs>(arguments) {
                Ok(args) => self.submit_approval_reason(&args.approval_id, &args.reason).await,
                Err(e) => json!({
                    "success": false,
                    "message": format!("Invalid arguments for {}: {}", name, e),
                }),
            },
            CHECK_APPROVAL_STATUS => match serde_json::from_str::<CheckArgs>(arguments) {
                Ok(args) => self.check_approval_status(&args.approval_id).await,
                Err(e) => json!({
                    "status": "error",
                    "message": format!("Invalid arguments for {}: {}", name, e),
                }),
            },
            other => json!({
                "status": "error",
                "message": format!("Unknown tool: {}", other),
            }),
        }
    }

    /// Run every guard tool among `calls` and return one `tool` message per call,
    /// ready to append to the conversation. Calls to other tools are skipped.
    pub async fn handle_tool_calls(&self, calls: &[ToolCallInfo]) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        for call in calls.iter().filter(|c| Self::is_guard_tool(&c.name)) {
            let result = self
                .call(&call.name, call.arguments.as_deref().unwrap_or("{}"))
                .await;
            messages.push(ChatMessage::tool(
                call.call_id.clone().unwrap_or_default(),
                result.to_string(),
            ));
        }
        messages
    }

    pub async fn submit_approval_reason(&self, approval_id: &str, reason: &str) -> Value {
        match self.approvals.submit_reason(approval_id, reason).await {
            Ok(_) => json!({
                "success": true,
                "message": "Approval reason submitted, awaiting reviewer decision",
                "approval_id": approval_id,
                "reason": reason,
            }),
            Err(e) => {
                warn!(approval_id, error = %e, "tool: submit_approval_reason failed");
                json!({
                    "success": false,
                    "message": format!("Failed to submit approval reason: {}", e),
                })
            }
        }
    }

    pub async fn check_approval_status(&self, approval_id: &str) -> Value {
        let status = match self.approvals.get_status(approval_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(approval_id, error = %e, "tool: check_approval_status failed");
                return json!({
                    "status": "error",
                    "message": format!("Failed to query approval status: {}", e),
                });
            }
        };

        if status.is_approved() {
            return match &status.execution_result {
                Some(result) => json!({
                    "status": "approved",
                    "execution_status": "success",
                    "message": "Approved and executed successfully",
                    "content": extract_content(result),
                    "executionResult": result,
                }),
                None => json!({
                    "status": "approved",
                    "execution_status": "pending",
                    "message": "Approved, execution in progress; check again shortly",
                }),
            };
        }
        if status.is_rejected() {
            return json!({
                "status": "rejected",
                "message": format!(
                    "Approval rejected: {}",
                    status.remark.as_deref().unwrap_or("no remark given")
                ),
            });
        }
        if status.is_expired() {
            return json!({
                "status": "expired",
                "message": "Approval request has expired",
            });
        }
        json!({
            "status": "pending",
            "message": "Approval is still pending; check again later",
        })
    }
}

/// Readable text from an execution result: `choices[0].message.content`, then
/// `content`, then pretty-printed JSON. Strings come back as-is.
pub fn extract_content(execution_result: &Value) -> String {
    match execution_result {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            if let Some(choices) = obj.get("choices").and_then(Value::as_array) {
                if let Some(first) = choices.first() {
                    return first
                        .get("message")
                        .and_then(|m| m.get("content"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                }
            }
            if let Some(content) = obj.get("content") {
                return match content {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
            serde_json::to_string_pretty(execution_result).unwrap_or_default()
        }
        other => other.to_string(),
    }
}
