//! AgentGuard SDK: route AI agent traffic through a governance gateway.
//!
//! - [`proxy::openai::GuardedOpenAi`]: OpenAI-compatible client pointed at the gateway
//! - [`proxy::business::GuardedHttp`]: third-party API calls wrapped in the gateway's proxy envelope
//! - [`approvals::ApprovalClient`]: approval status and justification
//! - [`notification::webhook::WebhookServer`]: signed approval callbacks and `wait_for_approval`
//! - [`middleware::intercept::Interceptor`]: pattern-based rewriting for `reqwest` clients

pub mod approvals;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod proxy;
pub mod tools;

pub use approvals::ApprovalClient;
pub use config::{GuardConfig, WebhookServerConfig};
pub use errors::GuardError;
pub use middleware::intercept::Interceptor;
pub use models::approval::{ApprovalDecision, ApprovalStatus, ApprovalStatusResponse};
pub use notification::registry::{CallbackRegistry, WaitOutcome};
pub use notification::webhook::{WebhookHandle, WebhookServer};
pub use proxy::business::{GuardedHttp, ProxyRequestOptions};
pub use proxy::openai::GuardedOpenAi;
pub use tools::GuardTools;
