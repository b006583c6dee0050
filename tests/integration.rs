//! Integration tests for the gateway-facing clients.
//!
//! A wiremock server stands in for the gateway; each test checks both the
//! request the SDK sends and how it interprets the gateway's answer.

mod approval_client_tests {
    use agentguard::models::approval::ApprovalStatus;
    use agentguard::{ApprovalClient, GuardConfig, GuardError};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApprovalClient {
        ApprovalClient::new(GuardConfig::new(server.uri(), "ag_test")).unwrap()
    }

    #[tokio::test]
    async fn test_get_status_approved_with_result() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_1/status"))
            .and(header("x-agent-api-key", "ag_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {
                    "status": "APPROVED",
                    "executionResult": {"deleted": 3}
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let status = client(&mock_server).get_status("apr_1").await.unwrap();
        assert!(status.is_approved());
        assert_eq!(status.execution_result, Some(json!({"deleted": 3})));
    }

    #[tokio::test]
    async fn test_get_status_rejected_carries_remark() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"status": "REJECTED", "remark": "not in prod"}
            })))
            .mount(&mock_server)
            .await;

        let status = client(&mock_server).get_status("apr_2").await.unwrap();
        assert_eq!(status.status, ApprovalStatus::Rejected);
        assert_eq!(status.remark.as_deref(), Some("not in prod"));
    }

    #[tokio::test]
    async fn test_envelope_error_becomes_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/missing/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 404,
                "message": "approval not found"
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).get_status("missing").await.unwrap_err();
        match err {
            GuardError::Api { code, message } => {
                assert_eq!(code, 404);
                assert!(message.contains("approval not found"), "{}", message);
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_passed_through_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_3/status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            // No local retry: exactly one request.
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).get_status("apr_3").await.unwrap_err();
        match err {
            GuardError::Gateway { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected Gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_reason_posts_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/approvals/apr_4/reason"))
            .and(header("x-agent-api-key", "ag_test"))
            .and(body_json(json!({"reason": "cleanup of test tenant"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resp = client(&mock_server)
            .submit_reason("apr_4", "cleanup of test tenant")
            .await
            .unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_submit_reason_envelope_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/approvals/apr_5/reason"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 409,
                "message": "approval already decided"
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .submit_reason("apr_5", "please")
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Api { code: 409, .. }));
    }
}

mod openai_proxy_tests {
    use agentguard::models::llm::{ChatCompletionRequest, ChatMessage};
    use agentguard::{GuardConfig, GuardError, GuardedOpenAi};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_completion_routes_through_gateway() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/chat/completions"))
            .and(header("authorization", "Bearer ag_llm"))
            .and(header("x-original-url", "https://api.openai.com/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "AgentGuard governs agents."},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 4, "total_tokens": 9}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GuardedOpenAi::new(GuardConfig::new(mock_server.uri(), "ag_llm")).unwrap();
        let request = ChatCompletionRequest::new(
            "gpt-4",
            vec![
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user("What is AgentGuard?"),
            ],
        );

        let resp = client.chat_completion(&request).await.unwrap();
        assert_eq!(resp.first_content(), Some("AgentGuard governs agents."));
        assert_eq!(resp.usage.unwrap().total_tokens, 9);
        assert_eq!(resp.extra["object"], "chat.completion");
    }

    #[tokio::test]
    async fn test_approval_required_is_surfaced_unchanged() {
        let mock_server = MockServer::start().await;
        let gateway_body = json!({
            "error": {"code": "approval_required", "approvalId": "apr_77"}
        });

        Mock::given(method("POST"))
            .and(path("/proxy/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(403).set_body_json(gateway_body.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GuardedOpenAi::new(GuardConfig::new(mock_server.uri(), "ag_llm")).unwrap();
        let request = ChatCompletionRequest::new("gpt-4", vec![ChatMessage::user("Delete all user data")]);

        let err = client.chat_completion(&request).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        match err {
            GuardError::Gateway { body, .. } => {
                let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
                assert_eq!(parsed, gateway_body);
            }
            other => panic!("expected Gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_json_other_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/embeddings"))
            .and(header("x-original-url", "https://llm.internal/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GuardedOpenAi::new(GuardConfig::new(mock_server.uri(), "ag_llm"))
            .unwrap()
            .with_original_base("https://llm.internal/v1/");
        let resp = client
            .post_json("embeddings", &json!({"model": "text-embedding-3-small", "input": "hi"}))
            .await
            .unwrap();
        assert_eq!(resp, json!({"data": []}));
    }

    #[tokio::test]
    async fn test_approvals_subclient_uses_same_gateway() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_9/status"))
            .and(header("x-agent-api-key", "ag_llm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"status": "PENDING"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GuardedOpenAi::new(GuardConfig::new(mock_server.uri(), "ag_llm")).unwrap();
        let status = client.approvals().get_status("apr_9").await.unwrap();
        assert!(status.is_pending());
    }
}

mod business_proxy_tests {
    use agentguard::models::envelope::ProxyOutcome;
    use agentguard::{GuardConfig, GuardError, GuardedHttp, ProxyRequestOptions};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_sends_envelope_and_unwraps_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/api"))
            .and(body_json(json!({
                "apiKey": "ag_biz",
                "targetUrl": "https://api.example.com/users",
                "method": "POST",
                "headers": {"Content-Type": "application/json"},
                "body": {"name": "John Doe"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"status": "SUCCESS", "response": {"id": 101}}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let http = GuardedHttp::new(GuardConfig::new(mock_server.uri(), "ag_biz")).unwrap();
        let outcome = http
            .post(
                "https://api.example.com/users",
                ProxyRequestOptions::json(json!({"name": "John Doe"})),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ProxyOutcome::Success(json!({"id": 101})));
    }

    #[tokio::test]
    async fn test_delete_pending_approval() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"status": "PENDING_APPROVAL", "approvalRequestId": "apr_del_1"}
            })))
            .mount(&mock_server)
            .await;

        let http = GuardedHttp::new(GuardConfig::new(mock_server.uri(), "ag_biz")).unwrap();
        let outcome = http
            .delete("https://api.example.com/users/1", ProxyRequestOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.approval_request_id(), Some("apr_del_1"));
    }

    #[tokio::test]
    async fn test_policy_block_is_an_outcome_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 403,
                "message": "blocked by policy 'no-deletes'"
            })))
            .mount(&mock_server)
            .await;

        let http = GuardedHttp::new(GuardConfig::new(mock_server.uri(), "ag_biz")).unwrap();
        let outcome = http
            .get("https://api.example.com/admin", ProxyRequestOptions::default())
            .await
            .unwrap();
        assert!(matches!(outcome, ProxyOutcome::Error { code: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_gateway_http_failure_propagates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/proxy/v1/api"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let http = GuardedHttp::new(GuardConfig::new(mock_server.uri(), "ag_biz")).unwrap();
        let err = http
            .get("https://api.example.com/x", ProxyRequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Gateway { status: 500, .. }));
    }
}

mod tools_tests {
    use agentguard::tools::{CHECK_APPROVAL_STATUS, SUBMIT_APPROVAL_REASON};
    use agentguard::{ApprovalClient, GuardConfig, GuardTools};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tools(server: &MockServer) -> GuardTools {
        GuardTools::new(ApprovalClient::new(GuardConfig::new(server.uri(), "ag_tools")).unwrap())
    }

    #[tokio::test]
    async fn test_check_status_extracts_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_t1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {
                    "status": "APPROVED",
                    "executionResult": {"choices": [{"message": {"content": "customer deleted"}}]}
                }
            })))
            .mount(&mock_server)
            .await;

        let result = tools(&mock_server)
            .call(CHECK_APPROVAL_STATUS, r#"{"approval_id":"apr_t1"}"#)
            .await;
        assert_eq!(result["status"], "approved");
        assert_eq!(result["execution_status"], "success");
        assert_eq!(result["content"], "customer deleted");
    }

    #[tokio::test]
    async fn test_check_status_approved_without_result_is_pending_execution() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/approvals/apr_t2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {"status": "APPROVED"}
            })))
            .mount(&mock_server)
            .await;

        let result = tools(&mock_server)
            .call(CHECK_APPROVAL_STATUS, r#"{"approval_id":"apr_t2"}"#)
            .await;
        assert_eq!(result["execution_status"], "pending");
    }

    #[tokio::test]
    async fn test_submit_reason_failure_is_reported_in_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/approvals/apr_t3/reason"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = tools(&mock_server)
            .call(SUBMIT_APPROVAL_REASON, r#"{"approval_id":"apr_t3","reason":"needed"}"#)
            .await;
        assert_eq!(result["success"], false);
        assert!(result["message"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let mock_server = MockServer::start().await;
        let tools = tools(&mock_server);

        let result = tools.call("delete_everything", "{}").await;
        assert_eq!(result["status"], "error");

        let result = tools.call(SUBMIT_APPROVAL_REASON, r#"{"approval_id":"x"}"#).await;
        assert_eq!(result["success"], false);
    }
}
