mod chat;
mod import;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(chat::routes())
        .merge(import::routes())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use http_body_util::BodyExt;
    use parrita_core::config::ParritaConfig;
    use parrita_core::llm::GatewayClient;
    use parrita_core::model::DiscoveryCall;
    use parrita_core::storage::SqliteStorage;
    use tower::ServiceExt;
    use uuid::Uuid;

    /// Config whose gateway points at a closed port — requests fail fast.
    fn test_config() -> ParritaConfig {
        let mut config = ParritaConfig::default_config();
        config.gateway.api_key = Some("test-key".into());
        config.gateway.base_url = "http://127.0.0.1:9".into();
        config
    }

    fn test_app(config: ParritaConfig) -> (Router, Arc<AppState>) {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let gateway = GatewayClient::from_config(&config.gateway).unwrap();
        let state = Arc::new(AppState {
            storage,
            gateway,
            http: reqwest::Client::new(),
            config,
        });
        (router().with_state(Arc::clone(&state)), state)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Serve a canned OpenAI-style SSE reply on an ephemeral port.
    async fn spawn_fake_gateway(sse_body: &'static str) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move {
                (
                    [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
                    sse_body,
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    const CSV_FIXTURE: &str = "infos_client,phase_1,phase_2,phase_3,phase_4\n\
        Entreprise: Acme | Secteur: retail | Besoin: facturation,intro retail,explo,affinage,next\n\
        Entreprise: Globex | Secteur: finance,intro finance,explo,affinage,next\n\
        ligne,courte\n";

    // ── health ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_responds_ok() {
        let (app, _) = test_app(test_config());
        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // ── import ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn import_then_list_then_delete_batch() {
        let (app, _) = test_app(test_config());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/import",
                serde_json::json!({ "csvData": CSV_FIXTURE }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["imported"], 2);
        assert_eq!(body["errors"], 1);
        let batch_id = body["batch_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/import/batches")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let batches: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(batches.as_array().unwrap().len(), 1);
        assert_eq!(batches[0]["batch_id"], batch_id.as_str());
        assert_eq!(batches[0]["call_count"], 2);

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/v1/import/batches/{batch_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["deleted"], 2);

        let response = app
            .oneshot(
                Request::get("/api/v1/import/batches")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let batches: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert!(batches.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_rejects_missing_csv_data() {
        let (app, _) = test_app(test_config());
        let response = app
            .oneshot(json_request("POST", "/api/v1/import", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn import_rejects_blank_csv() {
        let (app, _) = test_app(test_config());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/import",
                serde_json::json!({ "csvData": "\n\n" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ── chat validation ────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_rejects_missing_message_or_session() {
        let (app, _) = test_app(test_config());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "sessionId": "s1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "message": "bonjour" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_rejects_overlong_message() {
        let (app, _) = test_app(test_config());
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({
                    "sessionId": "s1",
                    "message": "x".repeat(5001),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("trop long"));
    }

    #[tokio::test]
    async fn chat_rate_limit_denies_with_retry_after() {
        let mut config = test_config();
        config.rate_limit.max_requests = 1;
        let (app, _) = test_app(config);

        // First request consumes the whole window (and fails at the
        // unreachable gateway, which doesn't matter here).
        let first = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "sessionId": "s1", "message": "bonjour" }),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let second = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "sessionId": "s1", "message": "re-bonjour" }),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            second.headers().get("retry-after").unwrap().to_str().unwrap(),
            "600"
        );
        assert!(body_string(second).await.contains("retryAfter"));
    }

    // ── history ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn posted_message_is_last_history_entry_before_any_reply() {
        let (app, state) = test_app(test_config());

        let conversation = parrita_core::model::Conversation::new("s1");
        state.storage.create_conversation(&conversation).await.unwrap();

        // The gateway is unreachable, so no assistant reply is appended —
        // but the user message must already be persisted.
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({
                    "conversationId": conversation.id,
                    "sessionId": "s1",
                    "message": "je veux automatiser ma facturation",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app
            .oneshot(
                Request::get(format!(
                    "/api/v1/conversations/{}/messages",
                    conversation.id
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let messages: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 1);
        let last = messages.last().unwrap();
        assert_eq!(last["role"], "user");
        assert_eq!(last["content"], "je veux automatiser ma facturation");
    }

    #[tokio::test]
    async fn unknown_conversation_history_is_404() {
        let (app, _) = test_app(test_config());
        let response = app
            .oneshot(
                Request::get(format!(
                    "/api/v1/conversations/{}/messages",
                    Uuid::now_v7()
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ── streaming ──────────────────────────────────────────────────────

    const SSE_REPLY: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
        data: {\"choices\":[{\"delta\":{\"content\":\"Bonjour\"}}]}\n\n\
        data: {\"choices\":[{\"delta\":{\"content\":\" paul@acme.fr\"}}]}\n\n\
        data: [DONE]\n\n";

    #[tokio::test]
    async fn chat_relays_stream_and_persists_reply() {
        let mut config = test_config();
        config.gateway.base_url = spawn_fake_gateway(SSE_REPLY).await;
        let (app, state) = test_app(config);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({ "sessionId": "s1", "message": "bonjour" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let conversation_id: Uuid = response
            .headers()
            .get("x-conversation-id")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();

        let body = body_string(response).await;
        assert!(body.contains("Bonjour"));
        assert!(body.contains("paul@acme.fr"));

        // The flush task persists the buffered reply after the stream ends.
        let mut persisted = Vec::new();
        for _ in 0..50 {
            persisted = state.storage.list_messages(conversation_id).await.unwrap();
            if persisted.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].role.as_str(), "user");
        assert_eq!(persisted[1].role.as_str(), "assistant");
        assert_eq!(persisted[1].content, "Bonjour paul@acme.fr");

        // The reply mentions an email, so the conversation qualifies.
        let mut qualified = false;
        for _ in 0..50 {
            qualified = state
                .storage
                .get_conversation(conversation_id)
                .await
                .unwrap()
                .qualified;
            if qualified {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(qualified);
    }

    #[tokio::test]
    async fn chat_discloses_reference_calls_when_context_matches() {
        let mut config = test_config();
        config.gateway.base_url = spawn_fake_gateway(SSE_REPLY).await;
        let (app, state) = test_app(config);

        let call = DiscoveryCall::new(
            "Acme".into(),
            "retail".into(),
            "automatiser la facturation".into(),
            String::new(),
            Uuid::now_v7(),
        )
        .with_phases(Some("intro".into()), Some("explo".into()), None, None);
        state.storage.save_discovery_call(&call).await.unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/chat",
                serde_json::json!({
                    "sessionId": "s1",
                    "message": "nous sommes un retailer et je veux automatiser ma facturation",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        // The disclosure event precedes the relayed tokens.
        let reference_at = body.find("reference_calls").unwrap();
        let first_delta_at = body.find("Bonjour").unwrap();
        assert!(reference_at < first_delta_at);
        assert!(body.contains("Acme"));
    }
}
