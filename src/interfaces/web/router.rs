use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use super::auth;
use super::handlers::{agents, chatbots, executions, knowledge, meta, providers, tokens, tools};
use super::{AppState, sse_executions_endpoint, sse_logs_endpoint};

fn build_dashboard_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_api_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route(
            "/api/agents",
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            "/api/agents/{id}",
            get(agents::get_agent)
                .put(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route("/api/agents/{id}/execute", post(agents::execute_agent))
        .route("/api/agents/{id}/logs", get(agents::agent_logs))
        .route("/api/executions", get(executions::list_executions))
        .route("/api/executions/stream", get(sse_executions_endpoint))
        .route("/api/executions/{id}", get(executions::get_execution))
        .route(
            "/api/providers",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/api/providers/{id}",
            get(providers::get_provider)
                .put(providers::update_provider)
                .delete(providers::delete_provider),
        )
        .route(
            "/api/chatbots",
            get(chatbots::list_chatbots).post(chatbots::create_chatbot),
        )
        .route(
            "/api/chatbots/{id}",
            get(chatbots::get_chatbot)
                .put(chatbots::update_chatbot)
                .delete(chatbots::delete_chatbot),
        )
        .route("/api/tools", get(tools::list_tools).post(tools::create_tool))
        .route(
            "/api/tools/{id}",
            get(tools::get_tool)
                .put(tools::update_tool)
                .delete(tools::delete_tool),
        )
        .route(
            "/api/knowledge",
            get(knowledge::list_knowledge).post(knowledge::register_knowledge),
        )
        .route(
            "/api/knowledge/{id}",
            get(knowledge::get_knowledge).delete(knowledge::delete_knowledge),
        )
        .route("/api/upload", post(knowledge::upload_file))
        .route("/api/schedules/presets", get(meta::schedule_presets))
        .route("/api/me", get(meta::me))
        .route(
            "/api/tokens",
            get(tokens::list_tokens).post(tokens::create_token),
        )
        .route(
            "/api/tokens/{id}",
            axum::routing::delete(tokens::delete_token),
        )
        .route("/api/logs", get(sse_logs_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn(security_headers))
        .layer(build_dashboard_cors(cors_origins))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::ExecutionStatus;
    use crate::interfaces::web::test_state;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::time::Duration;
    use tower::util::ServiceExt;

    async fn app() -> (AppState, Router) {
        let state = test_state(Some("user-1"), true).await;
        let router = build_api_router(state.clone(), &[]);
        (state, router)
    }

    async fn json_request(
        app: &Router,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
        (status, json)
    }

    fn agent_body(name: &str) -> Value {
        json!({
            "name": name,
            "description": "Summarizes the inbox",
            "provider": "provider-1",
            "model": "gpt-4o",
            "schedule": "0 9 * * *",
            "status": "active"
        })
    }

    async fn create_agent(app: &Router, name: &str) -> String {
        let (status, json) =
            json_request(app, Method::POST, "/api/agents", Some(agent_body(name)), None).await;
        assert_eq!(status, StatusCode::OK, "{}", json);
        json["agent"]["id"].as_str().unwrap().to_string()
    }

    async fn wait_for_terminal(app: &Router, execution_id: &str) -> Value {
        let path = format!("/api/executions/{}", execution_id);
        for _ in 0..200 {
            let (_, json) = json_request(app, Method::GET, &path, None, None).await;
            if json["execution"]["status"] != "running" {
                return json["execution"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {} never finished", execution_id);
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let (_, app) = app().await;
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/agents")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(resp.headers().get("content-security-policy").is_some());
    }

    #[tokio::test]
    async fn agent_crud_roundtrip() {
        let (state, app) = app().await;
        let id = create_agent(&app, "Inbox digest").await;
        assert_eq!(state.scheduler.scheduled_count().await, 1);

        let (status, json) = json_request(&app, Method::GET, "/api/agents", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["agents"].as_array().unwrap().len(), 1);
        assert!(json["agents"][0]["nextRun"].is_string());

        let path = format!("/api/agents/{}", id);
        let (status, json) = json_request(
            &app,
            Method::PUT,
            &path,
            Some(json!({ "status": "inactive" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["agent"]["status"], "inactive");
        assert!(json["agent"]["nextRun"].is_null());
        assert_eq!(state.scheduler.scheduled_count().await, 0);

        let (status, _) = json_request(&app, Method::DELETE, &path, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = json_request(&app, Method::GET, &path, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn invalid_agent_is_a_bad_request() {
        let (_, app) = app().await;
        let mut body = agent_body("Hot");
        body["temperature"] = json!(3.5);
        let (status, json) = json_request(&app, Method::POST, "/api/agents", Some(body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("temperature"));
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let (state, app) = app().await;
        let (status, json) = json_request(
            &app,
            Method::POST,
            "/api/agents",
            Some(json!({ "provider": "p", "model": "m" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("name"));

        let mut paused = agent_body("Paused");
        paused["status"] = json!("paused");
        let (status, json) =
            json_request(&app, Method::POST, "/api/agents", Some(paused), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("paused"));

        let id = create_agent(&app, "Valid").await;
        let (status, json) = json_request(
            &app,
            Method::PUT,
            &format!("/api/agents/{}", id),
            Some(json!({ "status": "paused" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(state.store.list_agents("user-1").await.unwrap().len(), 1);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/providers")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn execute_returns_running_id_and_completes_with_three_logs() {
        let (_, app) = app().await;
        let id = create_agent(&app, "Reporter").await;

        let (status, json) = json_request(
            &app,
            Method::POST,
            &format!("/api/agents/{}/execute", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "running");
        let execution_id = json["executionId"].as_str().unwrap().to_string();
        assert!(execution_id.starts_with("exec-"));

        let record = wait_for_terminal(&app, &execution_id).await;
        assert_eq!(record["status"], ExecutionStatus::Completed.as_str());
        assert_eq!(record["logs"].as_array().unwrap().len(), 3);
        assert!(record["output"]["tasksCompleted"].is_number());

        let (_, logs) = json_request(
            &app,
            Method::GET,
            &format!("/api/agents/{}/logs", id),
            None,
            None,
        )
        .await;
        assert_eq!(logs["logs"].as_array().unwrap().len(), 1);

        let (_, agent) =
            json_request(&app, Method::GET, &format!("/api/agents/{}", id), None, None).await;
        assert!(agent["agent"]["lastRun"].is_string());
    }

    #[tokio::test]
    async fn execute_unknown_agent_is_not_found() {
        let (_, app) = app().await;
        let (status, json) =
            json_request(&app, Method::POST, "/api/agents/missing/execute", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Agent not found");
    }

    #[tokio::test]
    async fn rows_are_scoped_to_the_caller() {
        let (state, app) = app().await;
        create_agent(&app, "Mine").await;
        let (raw, _) = state.store.create_api_token("user-2", "cli").await.unwrap();

        let (status, json) =
            json_request(&app, Method::GET, "/api/agents", None, Some(&raw)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["agents"].as_array().unwrap().is_empty());

        let (_, me) = json_request(&app, Method::GET, "/api/me", None, Some(&raw)).await;
        assert_eq!(me["user"]["id"], "user-2");
    }

    async fn open_stream(
        app: &Router,
        path: &str,
        token: Option<&str>,
    ) -> (StatusCode, std::pin::Pin<Box<axum::body::BodyDataStream>>) {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let resp = app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        (resp.status(), Box::pin(resp.into_body().into_data_stream()))
    }

    #[tokio::test]
    async fn execution_stream_only_carries_the_callers_events() {
        use tokio_stream::StreamExt;

        let (state, app) = app().await;
        let id = create_agent(&app, "Streamed").await;
        let (raw, _) = state.store.create_api_token("user-2", "cli").await.unwrap();

        let (status, mut mine) = open_stream(&app, "/api/executions/stream", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, mut theirs) =
            open_stream(&app, "/api/executions/stream", Some(&raw)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = json_request(
            &app,
            Method::POST,
            &format!("/api/agents/{}/execute", id),
            None,
            None,
        )
        .await;
        let execution_id = json["executionId"].as_str().unwrap().to_string();

        let frame = tokio::time::timeout(Duration::from_secs(2), mine.next())
            .await
            .expect("owner should receive an execution event")
            .unwrap()
            .unwrap();
        let text = String::from_utf8_lossy(&frame);
        assert!(text.contains("event: execution"), "{}", text);
        assert!(text.contains(&execution_id), "{}", text);

        wait_for_terminal(&app, &execution_id).await;
        let leaked = tokio::time::timeout(Duration::from_millis(300), theirs.next()).await;
        assert!(leaked.is_err(), "another owner's event was streamed");
    }

    #[tokio::test]
    async fn server_logs_are_limited_to_the_local_dev_user() {
        let (state, app) = app().await;
        let (status, _) = open_stream(&app, "/api/logs", None).await;
        assert_eq!(status, StatusCode::OK);

        let (raw, _) = state.store.create_api_token("user-2", "cli").await.unwrap();
        let (status, json) = json_request(&app, Method::GET, "/api/logs", None, Some(&raw)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);

        let remote = test_state(Some("user-1"), false).await;
        let (raw, _) = remote.store.create_api_token("user-1", "cli").await.unwrap();
        let app = build_api_router(remote, &[]);
        let (status, _) = json_request(&app, Method::GET, "/api/logs", None, Some(&raw)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn chatbot_requires_known_provider() {
        let (_, app) = app().await;
        let (status, _) = json_request(
            &app,
            Method::POST,
            "/api/chatbots",
            Some(json!({ "name": "Helper", "providerId": "nope" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, provider) = json_request(
            &app,
            Method::POST,
            "/api/providers",
            Some(json!({ "name": "OpenAI", "type": "openai", "apiKey": "sk-test-12345" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(provider["provider"]["apiKey"], "sk-...2345");
        let provider_id = provider["provider"]["id"].as_str().unwrap();

        let (status, bot) = json_request(
            &app,
            Method::POST,
            "/api/chatbots",
            Some(json!({ "name": "Helper", "providerId": provider_id })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bot["chatbot"]["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn knowledge_upload_starts_processing() {
        let (_, app) = app().await;
        let boundary = "deckboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.md\"\r\nContent-Type: text/markdown\r\n\r\n# hello\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["file"]["status"], "processing");
        assert_eq!(json["file"]["name"], "notes.md");
        assert_eq!(json["file"]["size"], 7);

        let (status, listed) = json_request(&app, Method::GET, "/api/knowledge", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["files"][0]["id"], json["fileId"]);
    }

    #[tokio::test]
    async fn upload_without_file_part_is_rejected() {
        let (_, app) = app().await;
        let boundary = "deckboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn token_lifecycle_over_http() {
        let (_, app) = app().await;
        let (status, created) = json_request(
            &app,
            Method::POST,
            "/api/tokens",
            Some(json!({ "name": "ci" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let raw = created["token"].as_str().unwrap().to_string();
        let token_id = created["record"]["id"].as_str().unwrap().to_string();

        let (status, me) = json_request(&app, Method::GET, "/api/me", None, Some(&raw)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["user"]["id"], "user-1");

        let (status, _) = json_request(
            &app,
            Method::DELETE,
            &format!("/api/tokens/{}", token_id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = json_request(&app, Method::GET, "/api/me", None, Some(&raw)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn presets_list_every_recognized_schedule() {
        let (_, app) = app().await;
        let (status, json) =
            json_request(&app, Method::GET, "/api/schedules/presets", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let presets = json["presets"].as_array().unwrap();
        assert_eq!(presets.len(), 4);
        assert!(presets.iter().all(|p| p["nextRun"].is_string()));
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected_without_dev_user() {
        let state = test_state(None, true).await;
        let app = build_api_router(state, &[]);
        let (status, _) = json_request(&app, Method::GET, "/api/agents", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn method_not_allowed_returns_405() {
        let (_, app) = app().await;
        let (status, _) = json_request(&app, Method::PATCH, "/api/agents", None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn api_route_contract_has_all_expected_paths() {
        let paths = [
            "/api/agents",
            "/api/agents/agent-1",
            "/api/agents/agent-1/execute",
            "/api/agents/agent-1/logs",
            "/api/executions",
            "/api/executions/stream",
            "/api/executions/exec-1",
            "/api/providers",
            "/api/providers/provider-1",
            "/api/chatbots",
            "/api/chatbots/chatbot-1",
            "/api/tools",
            "/api/tools/tool-1",
            "/api/knowledge",
            "/api/knowledge/knowledge-1",
            "/api/upload",
            "/api/schedules/presets",
            "/api/me",
            "/api/tokens",
            "/api/tokens/token-1",
            "/api/logs",
        ];

        assert_eq!(paths.len(), 21, "Expected exactly 21 API routes");

        let unique: HashSet<&str> = paths.iter().copied().collect();
        assert_eq!(unique.len(), 21, "Duplicate routes found in route contract");

        let (_, app) = app().await;
        for path in paths {
            let req = Request::builder()
                .method(Method::PATCH)
                .uri(path)
                .body(Body::empty())
                .expect("request should build");
            let resp = app
                .clone()
                .oneshot(req)
                .await
                .expect("router oneshot should succeed");
            assert_eq!(
                resp.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "Route missing from router: {}",
                path
            );
        }
    }
}
