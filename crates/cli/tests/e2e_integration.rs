//! End-to-end integration tests for the CourseLLM IST service.
//!
//! These tests drive the full HTTP pipeline: request parsing, context
//! formatting, prompting, the model call, normalization and the response.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use coursellm_config::AppConfig;
use coursellm_core::error::ProviderError;
use coursellm_core::message::Message;
use coursellm_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use coursellm_core::ExtractionResult;
use coursellm_gateway::{GatewayState, build_full_router, build_router};
use coursellm_ist::{ExtractorCell, IstExtractor, MessageAnalyzer};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that answers every call with the same text and keeps
/// the prompts it was sent.
struct ScriptedProvider {
    reply: String,
    prompts: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn text(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_user_prompt(&self) -> String {
        let prompts = self.prompts.lock().unwrap();
        let last = prompts.last().expect("provider was never called");
        last.messages.last().unwrap().content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.prompts.lock().unwrap().push(request);
        Ok(text_response(&self.reply))
    }
}

/// Echoes the utterance section of the prompt back as the intent.
struct EchoIntentProvider;

#[async_trait::async_trait]
impl Provider for EchoIntentProvider {
    fn name(&self) -> &str {
        "e2e_echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = &request.messages.last().unwrap().content;
        let utterance = prompt
            .split("[[ ## utterance ## ]]\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or_default();
        tokio::task::yield_now().await;
        let reply = serde_json::json!({
            "intent": utterance,
            "skills": ["Echo"],
            "trajectory": ["Repeat"]
        });
        Ok(text_response(&reply.to_string()))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

fn app_with(provider: Arc<dyn Provider>) -> axum::Router {
    let cell = ExtractorCell::with_extractor(IstExtractor::new(provider, "mock-model"));
    build_router(Arc::new(GatewayState::new(Arc::new(cell), MessageAnalyzer::noop())))
}

fn post_ist(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/intent-skill-trajectory")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_well_formed(result: &ExtractionResult) {
    assert!(!result.intent.trim().is_empty());
    assert!(!result.skills.is_empty());
    assert!(!result.trajectory.is_empty());
    for item in result.skills.iter().chain(&result.trajectory) {
        assert!(!item.is_empty());
        assert_eq!(item, item.trim());
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_recursion_question_returns_well_formed_ist() {
    let provider = ScriptedProvider::text(
        "Sure! Here is the analysis:\n```json\n{\"intent\": \"Understand what recursion is\", \"skills\": [\"Recursion\", \"Base case\", \"Call stack\"], \"trajectory\": [\"Trace factorial(3) by hand\", \"Write a recursive sum\", \"Compare with a loop\"]}\n```",
    );
    let app = app_with(provider.clone());

    let response = app
        .oneshot(post_ist(r#"{"utterance":"What is recursion?"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: ExtractionResult = serde_json::from_value(read_json(response).await).unwrap();
    assert_well_formed(&result);
    assert_eq!(result.intent, "Understand what recursion is");
    assert_eq!(result.skills.len(), 3);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_health_is_unchanged_by_extractions() {
    let provider = ScriptedProvider::text(
        "{\"intent\": \"Understand recursion\", \"skills\": [\"Recursion\"], \"trajectory\": [\"Trace fib(4)\"]}",
    );
    let app = app_with(provider.clone());
    let health = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    let before = app.clone().oneshot(health()).await.unwrap();
    assert_eq!(before.status(), StatusCode::OK);
    let before = read_json(before).await;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_ist(r#"{"utterance":"What is recursion?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let after = app.oneshot(health()).await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(read_json(after).await, before);
    assert_eq!(before["status"], "healthy");
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn e2e_malformed_model_output_never_breaks_response() {
    let replies = [
        "",
        "I cannot answer that.",
        "{\"intent\": \"Learn sorting\", \"skills\": \"Quicksort; Mergesort\",}",
        "{'intent': 'Learn graphs', 'skills': ['BFS', 'DFS'], 'trajectory': 'Draw a graph\\nRun BFS'}",
        "{\"structured_analysis\": \"{\\\"intent\\\": \\\"Learn hashing\\\"}\"}",
        "[[ ## intent ## ]]\nLearn pointers\n[[ ## skills ## ]]\n- Memory\n- Addresses",
        "{\"intent\": \"Truncated reply\", \"skills\": [\"Par",
        "[1, 2, 3]",
    ];

    for reply in replies {
        let app = app_with(ScriptedProvider::text(reply));
        let response = app
            .oneshot(post_ist(r#"{"utterance":"help"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "reply: {reply:?}");
        let result: ExtractionResult = serde_json::from_value(read_json(response).await).unwrap();
        assert_well_formed(&result);
    }
}

#[tokio::test]
async fn e2e_context_is_rendered_into_prompt() {
    let provider = ScriptedProvider::text("{}");
    let app = app_with(provider.clone());

    let chat: Vec<serde_json::Value> = (0..15)
        .map(|i| {
            let role = if i % 2 == 0 { "student" } else { "tutor" };
            serde_json::json!({"role": role, "content": format!("turn-{i:02}")})
        })
        .collect();
    let strong: Vec<String> = (0..12).map(|i| format!("strong-{i:02}")).collect();
    let body = serde_json::json!({
        "utterance": "Why is my DP table wrong?",
        "course_context": "Algorithms, week 6",
        "chat_history": chat,
        "ist_history": [
            {"intent": "Learn memoization", "skills": ["DP", "Caching"], "trajectory": ["a", "b"]}
        ],
        "student_profile": {
            "strong_skills": strong,
            "weak_skills": ["Recurrences"],
            "course_progress": "60%"
        }
    });

    let response = app.oneshot(post_ist(&body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let prompt = provider.last_user_prompt();
    assert!(prompt.contains("Why is my DP table wrong?"));
    assert!(prompt.contains("Algorithms, week 6"));
    assert!(prompt.contains("Recent chat history (15 messages):"));
    assert!(!prompt.contains("turn-04"));
    assert!(prompt.contains("turn-05"));
    assert!(prompt.contains("turn-14"));
    assert!(prompt.contains("Recent IST events (1 total):"));
    assert!(prompt.contains("Trajectory: 2 steps"));
    assert!(prompt.contains("strong-09"));
    assert!(!prompt.contains("strong-10"));
    assert!(prompt.contains("  - Course progress: 60%"));
}

#[tokio::test]
async fn e2e_empty_utterance_is_rejected_before_model_call() {
    let provider = ScriptedProvider::text("{}");
    let app = app_with(provider.clone());

    let response = app.oneshot(post_ist(r#"{"utterance":""}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn e2e_concurrent_requests_are_independent() {
    let app = app_with(Arc::new(EchoIntentProvider));

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let body = serde_json::json!({ "utterance": format!("question number {i}") });
            let response = app.oneshot(post_ist(&body.to_string())).await.unwrap();
            (i, read_json(response).await)
        }));
    }

    for handle in handles {
        let (i, json) = handle.await.unwrap();
        assert_eq!(json["intent"], format!("question number {i}"));
    }
}

#[tokio::test]
async fn e2e_analyze_message_round_trip() {
    let provider = ScriptedProvider::text(
        r#"{"intent": "Ask how recursion terminates", "skills": ["Base case"], "confusion": "high"}"#,
    );
    let app = app_with(provider.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/analyze-message")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"threadId":"thread-1","messageText":"When does recursion stop?","courseId":"cs101","language":"he"}"#,
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["thread_id"], "thread-1");
    assert!(json["message_id"].as_str().unwrap().starts_with("analysis-"));
    assert_eq!(json["intent"], "Ask how recursion terminates");
    assert_eq!(json["confusion"], "high");

    let prompt = provider.last_user_prompt();
    assert!(prompt.contains("When does recursion stop?"));
    assert!(prompt.contains("\"language\": \"he\""));
}

// ── Real HTTP provider against a local OpenAI-compatible stub ────────────

async fn spawn_chat_completions_stub(status: StatusCode, content: &'static str) -> String {
    use axum::{Json, Router, routing::post};

    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move {
            let body = serde_json::json!({
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": content}}],
                "usage": {"prompt_tokens": 50, "completion_tokens": 20, "total_tokens": 70}
            });
            (status, Json(body))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

fn config_for(base_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.llm.api_key = Some("sk-e2e-test".into());
    config.llm.api_url = Some(base_url);
    config.llm.timeout_secs = 5;
    config
}

#[tokio::test]
async fn e2e_configured_service_talks_to_openai_compatible_endpoint() {
    let base = spawn_chat_completions_stub(
        StatusCode::OK,
        r#"{"intent": "Understand Big-O", "skills": ["Asymptotics"], "trajectory": ["Count operations"]}"#,
    )
    .await;
    let config = config_for(base);

    let cell = Arc::new(ExtractorCell::new());
    cell.initialize(&config).unwrap();
    let app = build_full_router(
        Arc::new(GatewayState::new(cell, MessageAnalyzer::noop())),
        &config.gateway,
    );

    let response = app
        .oneshot(post_ist(r#"{"utterance":"What does O(n) mean?"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["intent"], "Understand Big-O");
    assert_eq!(json["skills"][0], "Asymptotics");
}

#[tokio::test]
async fn e2e_provider_auth_failure_is_500() {
    let base = spawn_chat_completions_stub(StatusCode::UNAUTHORIZED, "").await;
    let config = config_for(base);

    let cell = Arc::new(ExtractorCell::new());
    cell.initialize(&config).unwrap();
    let app = build_router(Arc::new(GatewayState::new(cell, MessageAnalyzer::noop())));

    let response = app
        .oneshot(post_ist(r#"{"utterance":"What does O(n) mean?"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("Authentication failed"));
    assert!(json.get("skills").is_none());
}
