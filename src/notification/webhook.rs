//! Webhook receiver for approval decisions.
//!
//! The gateway POSTs a signed JSON body to `/agentguard/webhook` when an approval
//! is decided. [`WebhookServer`] verifies the signature, parses the decision and
//! resolves whichever waiter is registered for that approval ID.
//!
//! ```no_run
//! # async fn demo() -> Result<(), agentguard::GuardError> {
//! use std::time::Duration;
//! use agentguard::config::WebhookServerConfig;
//! use agentguard::notification::webhook::WebhookServer;
//!
//! let server = WebhookServer::new(WebhookServerConfig::from_env());
//! let handle = server.spawn().await?;
//! let outcome = server.wait_for_approval("apr_123", Duration::from_secs(300)).await?;
//! handle.shutdown().await?;
//! # Ok(()) }
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::registry::{CallbackRegistry, WaitOutcome};
use super::signature::verify_signature;
use crate::config::{GuardConfig, WebhookServerConfig};
use crate::errors::{GuardError, WebhookError};
use crate::models::approval::ApprovalDecision;

pub const WEBHOOK_PATH: &str = "/agentguard/webhook";
pub const HEALTH_PATH: &str = "/health";
pub const SIGNATURE_HEADER: &str = "x-agentguard-signature";

struct WebhookState {
    registry: CallbackRegistry,
    secret: Option<String>,
}

#[derive(Clone)]
pub struct WebhookServer {
    config: WebhookServerConfig,
    state: Arc<WebhookState>,
}

impl WebhookServer {
    pub fn new(config: WebhookServerConfig) -> Self {
        Self::with_registry(config, CallbackRegistry::new())
    }

    /// Listener for the SDK config holder: bind settings from the environment,
    /// signature secret from `config.webhook_secret`.
    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(WebhookServerConfig::from_guard_config(config))
    }

    /// Serve an existing registry, e.g. one shared with other listeners.
    pub fn with_registry(config: WebhookServerConfig, registry: CallbackRegistry) -> Self {
        let secret = config.secret.clone().filter(|s| !s.is_empty());
        Self {
            config,
            state: Arc::new(WebhookState { registry, secret }),
        }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.state.registry
    }

    pub fn register_callback<F>(&self, approval_id: &str, callback: F) -> Result<(), GuardError>
    where
        F: FnOnce(ApprovalDecision) + Send + 'static,
    {
        self.state.registry.register_callback(approval_id, callback)
    }

    pub fn unregister_callback(&self, approval_id: &str) -> bool {
        self.state.registry.unregister_callback(approval_id)
    }

    pub async fn wait_for_approval(
        &self,
        approval_id: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, GuardError> {
        self.state.registry.wait_for_approval(approval_id, timeout).await
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(WEBHOOK_PATH, post(handle_webhook))
            .route(HEALTH_PATH, get(health))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    /// Bind the configured address and serve in a background task.
    pub async fn spawn(&self) -> Result<WebhookHandle, GuardError> {
        let listener = tokio::net::TcpListener::bind(self.config.addr()).await?;
        let addr = listener.local_addr()?;
        if self.state.secret.is_none() {
            warn!("webhook secret not configured, accepting unsigned callbacks");
        }
        info!("approval webhook listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(WebhookHandle {
            addr,
            shutdown: shutdown_tx,
            task,
        })
    }

    /// Serve in the foreground until the process is interrupted.
    pub async fn serve(&self) -> Result<(), GuardError> {
        let handle = self.spawn().await?;
        tokio::signal::ctrl_c().await?;
        info!("shutting down approval webhook");
        handle.shutdown().await
    }
}

/// A running webhook listener.
pub struct WebhookHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl WebhookHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL a local client can POST callbacks to.
    pub fn webhook_url(&self) -> String {
        let ip = match self.addr.ip() {
            IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        format!("http://{}{}", SocketAddr::new(ip, self.addr.port()), WEBHOOK_PATH)
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(self) -> Result<(), GuardError> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| GuardError::Internal(anyhow::anyhow!("webhook task failed: {}", e)))??;
        Ok(())
    }
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    if let Some(secret) = &state.secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, signature) {
            warn!("rejected approval webhook with invalid signature");
            return Err(WebhookError::InvalidSignature);
        }
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|_| WebhookError::InvalidJson)?;
    if !payload.is_object() {
        return Err(WebhookError::InvalidJson);
    }

    let decision = ApprovalDecision::from_payload(payload).map_err(|e| match e {
        crate::models::approval::DecisionParseError::MissingApprovalId => {
            WebhookError::MissingApprovalId
        }
        other => WebhookError::InvalidPayload(other.to_string()),
    })?;

    info!(approval_id = %decision.approval_id, status = %decision.status, "approval webhook received");
    let delivered = state.registry.resolve(decision);

    Ok(Json(json!({ "received": true, "delivered": delivered })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::ApprovalStatus;
    use crate::notification::signature::sign_payload;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn server(secret: Option<&str>) -> WebhookServer {
        WebhookServer::new(WebhookServerConfig {
            secret: secret.map(String::from),
            ..Default::default()
        })
    }

    fn post(body: &[u8], signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body.to_vec())).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_signed_webhook_invokes_callback() {
        let server = server(Some("s3cret"));
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        server
            .register_callback("A1", move |d| {
                *sink.lock().unwrap() = Some(d);
            })
            .unwrap();

        let body = br#"{"approvalId":"A1","status":"APPROVED","executionResult":{"ok":true}}"#;
        let sig = sign_payload("s3cret", body);
        let resp = server.router().oneshot(post(body, Some(&sig))).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(json_body(resp).await["delivered"], true);

        let decision = seen.lock().unwrap().take().unwrap();
        assert_eq!(decision.status, ApprovalStatus::Approved);
        assert_eq!(decision.execution_result, Some(json!({"ok": true})));
        assert!(!server.registry().is_registered("A1"));
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected_and_not_delivered() {
        let server = server(Some("s3cret"));
        server.register_callback("A1", |_| panic!("must not fire")).unwrap();

        let body = br#"{"approvalId":"A1","status":"APPROVED"}"#;
        let forged = sign_payload("wrong-secret", body);
        let resp = server.router().oneshot(post(body, Some(&forged))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"], "Invalid signature");

        let resp = server.router().oneshot(post(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        assert!(server.registry().is_registered("A1"));
    }

    #[tokio::test]
    async fn test_secret_from_guard_config_is_enforced() {
        let config = GuardConfig::new("http://gw.local", "ag_1")
            .with_webhook(None, Some("from-holder".into()));
        let server = WebhookServer::from_config(&config);
        server.register_callback("A1", |_| panic!("must not fire")).unwrap();

        let body = br#"{"approvalId":"A1","status":"APPROVED"}"#;
        let resp = server.router().oneshot(post(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(server.registry().is_registered("A1"));

        let sig = sign_payload("from-holder", body);
        server.unregister_callback("A1");
        let resp = server.router().oneshot(post(body, Some(&sig))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_decision_without_status_is_rejected_and_kept() {
        let server = server(None);
        server.register_callback("A1", |_| panic!("must not fire")).unwrap();

        let body = br#"{"approvalId":"A1","decision":"approve"}"#;
        let resp = server.router().oneshot(post(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Invalid payload: missing status");
        assert!(server.registry().is_registered("A1"));
    }

    #[tokio::test]
    async fn test_unsigned_accepted_without_secret() {
        let server = server(None);
        let body = br#"{"approval_id":"zzz","status":"REJECTED","remark":"no"}"#;
        let resp = server.router().oneshot(post(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["received"], true);
        assert_eq!(json["delivered"], false);
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let server = server(None);

        let resp = server.router().oneshot(post(b"not json", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Invalid JSON");

        let resp = server
            .router()
            .oneshot(post(br#"{"status":"APPROVED"}"#, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Missing approval ID");

        let resp = server
            .router()
            .oneshot(post(br#"{"approvalId":"A9","status":"SOMETIME"}"#, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let req = Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap();
        let resp = server(None).router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }
}
