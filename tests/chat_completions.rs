use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use reasonify_rs::config::{
    AppConfig, FeaturesConfig, ReasoningConfig, ServerConfig, UpstreamConfig,
};
use reasonify_rs::routing::dispatch::dispatch_request;
use reasonify_rs::routing::ModelTable;
use reasonify_rs::state::AppState;
use reasonify_rs::transport::{HttpTransport, PreparedUpstream};
use serde_json::{json, Value};

fn build_state(base_url: String, reasoning: ReasoningConfig) -> Arc<AppState> {
    let config = AppConfig {
        server: ServerConfig::default(),
        upstream: UpstreamConfig {
            base_url,
            api_key: "upstream-secret".to_string(),
            model_aliases: [("deepseek".to_string(), "deepseek-reasoner".to_string())]
                .into_iter()
                .collect(),
        },
        features: FeaturesConfig::default(),
        reasoning,
    };

    let model_table = ModelTable::new(&config.upstream);
    let prepared_upstream = PreparedUpstream::new(&config.upstream).expect("prepared upstream");

    Arc::new(AppState::new(
        config,
        HttpTransport::new(&ServerConfig::default()),
        model_table,
        prepared_upstream,
    ))
}

fn display_reasoning() -> ReasoningConfig {
    ReasoningConfig {
        display_models: vec!["deepseek-reasoner".to_string()],
        ..ReasoningConfig::default()
    }
}

async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), server)
}

fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize request")))
        .expect("build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&body).expect("json payload")
}

fn completion_with_reasoning() -> Value {
    json!({
        "id": "chatcmpl_mock",
        "object": "chat.completion",
        "created": 1_727_000_000_u64,
        "model": "deepseek-reasoner",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "answer",
                    "reasoning_content": "why"
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 5,
            "completion_tokens": 2,
            "total_tokens": 7
        }
    })
}

#[tokio::test]
async fn test_non_streaming_reasoning_block_prepended() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(completion_with_reasoning()) }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, display_reasoning());
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = response_json(response).await;
    assert_eq!(
        payload["choices"][0]["message"]["content"],
        "<think>\nwhy\n</think>\n\nanswer"
    );
    // The response echoes the client-requested name, not the resolved model.
    assert_eq!(payload["model"], "deepseek");
    assert_eq!(payload["usage"]["total_tokens"], 7);

    server.abort();
}

#[tokio::test]
async fn test_non_streaming_display_disabled_leaves_content() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(completion_with_reasoning()) }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, ReasoningConfig::default());
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = response_json(response).await;
    assert_eq!(payload["choices"][0]["message"]["content"], "answer");

    server.abort();
}

#[tokio::test]
async fn test_missing_finish_reason_and_usage_defaulted() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(json!({
                "id": "chatcmpl_sparse",
                "object": "chat.completion",
                "created": 1_727_000_000_u64,
                "model": "deepseek-reasoner",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "ok"}}
                ]
            }))
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, ReasoningConfig::default());
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    let payload = response_json(response).await;
    assert_eq!(payload["choices"][0]["finish_reason"], "stop");
    assert_eq!(
        payload["usage"],
        json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
    );

    server.abort();
}

#[tokio::test]
async fn test_request_augmented_before_forwarding() {
    let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let captured_clone = Arc::clone(&captured);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let captured = Arc::clone(&captured_clone);
            async move {
                *captured.lock().unwrap() = Some(body);
                Json(completion_with_reasoning())
            }
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let reasoning = ReasoningConfig {
        request_overrides: json!({"top_p": 0.95}),
        model_extra_body: [(
            "deepseek-reasoner".to_string(),
            json!({"chat_template_kwargs": {"enable_thinking": true}}),
        )]
        .into_iter()
        .collect(),
        ..display_reasoning()
    };
    let state = build_state(base_url, reasoning);
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let upstream_body = captured.lock().unwrap().clone().expect("captured body");
    assert_eq!(upstream_body["model"], "deepseek-reasoner");
    assert_eq!(upstream_body["temperature"], json!(0.6));
    assert_eq!(upstream_body["max_tokens"], json!(1024));
    assert_eq!(upstream_body["top_p"], json!(0.95));
    assert_eq!(
        upstream_body["chat_template_kwargs"]["enable_thinking"],
        json!(true)
    );

    server.abort();
}

#[tokio::test]
async fn test_invalid_requests_rejected_without_upstream_call() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let hits = Arc::clone(&hits_clone);
            async move {
                hits.fetch_add(1, Ordering::Relaxed);
                Json(completion_with_reasoning())
            }
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url, ReasoningConfig::default());

    let invalid_bodies = [
        json!({"messages": [{"role": "user", "content": "ping"}]}),
        json!({"model": 42, "messages": [{"role": "user", "content": "ping"}]}),
        json!({"model": "deepseek", "messages": "not-an-array"}),
        json!({"model": "deepseek", "messages": []}),
    ];

    for body in &invalid_bodies {
        let response = dispatch_request(Arc::clone(&state), Arc::<str>::from(""), chat_request(body))
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = response_json(response).await;
        assert_eq!(payload["error"]["type"], "invalid_request_error");
        assert_eq!(payload["error"]["code"], 400);
        assert!(payload["error"]["message"].is_string());
    }

    assert_eq!(hits.load(Ordering::Relaxed), 0);
    server.abort();
}

#[tokio::test]
async fn test_upstream_client_error_forwarded_verbatim() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": {"message": "invalid api key", "type": "authentication_error"}
                })),
            )
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, ReasoningConfig::default());
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The upstream body passes through without reinterpretation.
    let payload = response_json(response).await;
    assert_eq!(payload["error"]["message"], "invalid api key");
    assert_eq!(payload["error"]["type"], "authentication_error");

    server.abort();
}

#[tokio::test]
async fn test_upstream_server_error_normalized() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": {"message": "overloaded"}})),
            )
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, ReasoningConfig::default());
    let request = chat_request(&json!({
        "model": "deepseek",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let payload = response_json(response).await;
    assert_eq!(payload["error"]["message"], "overloaded");
    assert_eq!(payload["error"]["type"], "invalid_request_error");
    assert_eq!(payload["error"]["code"], 503);

    server.abort();
}

#[tokio::test]
async fn test_unknown_model_passes_through_unchanged() {
    let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let captured_clone = Arc::clone(&captured);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let captured = Arc::clone(&captured_clone);
            async move {
                *captured.lock().unwrap() = Some(body);
                Json(completion_with_reasoning())
            }
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;

    let state = build_state(base_url, ReasoningConfig::default());
    let request = chat_request(&json!({
        "model": "some-unlisted-model",
        "messages": [{"role": "user", "content": "ping"}],
    }));

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let upstream_body = captured.lock().unwrap().clone().expect("captured body");
    assert_eq!(upstream_body["model"], "some-unlisted-model");

    server.abort();
}
