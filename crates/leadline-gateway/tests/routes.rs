use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use leadline_core::testing::{assistant, sample_agent, sample_call, FakePlatform, MemoryBackend, ScriptedModel};
use leadline_core::vapi::RemoteCall;
use leadline_core::{Role, ScoringClient, TranscriptMessage};
use leadline_gateway::{router, AppState};

struct Harness {
    backend: Arc<MemoryBackend>,
    platform: Arc<FakePlatform>,
    scoring: Option<Arc<ScoringClient>>,
}

impl Harness {
    fn new() -> Self {
        Self { backend: Arc::new(MemoryBackend::new()), platform: Arc::new(FakePlatform::new()), scoring: None }
    }

    fn with_model_reply(mut self, reply: &str) -> Self {
        self.scoring = Some(Arc::new(ScoringClient::new(Arc::new(ScriptedModel::replying(reply)))));
        self
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let state = Arc::new(AppState {
            agents: self.backend.clone(),
            calls: self.backend.clone(),
            platform: self.platform.clone(),
            scoring: self.scoring.clone(),
        });
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = router(state).oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()));
        (status, value)
    }
}

fn create_body() -> Value {
    json!({
        "name": "Riya",
        "category": "sales",
        "language": "hi",
        "system_prompt": "You sell solar panels.",
        "first_message": "Namaste!"
    })
}

fn scorable_call(id: &str) -> leadline_core::Call {
    let now = chrono::Utc::now();
    let mut call = sample_call(id);
    call.transcript = vec![
        TranscriptMessage::system("Call connected.", now),
        TranscriptMessage::new(Role::Assistant, "Hi!", now),
        TranscriptMessage::new(Role::User, "Hello, go on.", now),
    ];
    call
}

#[tokio::test]
async fn test_health() {
    let (status, body) = Harness::new().send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));
}

#[tokio::test]
async fn test_create_agent_returns_created_record() {
    let h = Harness::new();
    let (status, body) = h.send(Method::POST, "/agents", Some(create_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["vapi_assistant_id"], "asst-1");
    assert_eq!(h.platform.created()[0]["voice"]["voiceId"], "hi-IN-SwaraNeural");

    let (status, list) = h.send(Method::GET, "/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_create_agent_passes_remote_status_through() {
    let h = Harness::new();
    h.platform.fail("create_assistant", 422);
    let (status, body) = h.send(Method::POST, "/agents", Some(create_body())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("Vapi error (422)"));
    assert!(h.backend.ops().is_empty());
}

#[tokio::test]
async fn test_create_agent_local_failure_is_500() {
    let h = Harness::new();
    h.backend.fail("save_agent");
    let (status, body) = h.send(Method::POST, "/agents", Some(create_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("DB save failed"));
}

#[tokio::test]
async fn test_update_agent_pushes_then_writes_locally() {
    let h = Harness::new();
    h.backend.insert_agent(sample_agent("a1", "asst-1"));
    h.platform.insert_assistant(assistant("asst-1", "Riya", "Hi", "old"));
    let (status, body) = h
        .send(Method::PATCH, "/agents/a1", Some(json!({ "name": "Maya", "vapi_assistant_id": "asst-1" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Maya");
    assert_eq!(h.platform.updates()[0].1, json!({ "name": "Maya" }));
}

#[tokio::test]
async fn test_delete_agent_messages() {
    let h = Harness::new();
    let (status, body) = h.send(Method::DELETE, "/agents/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Agent not found" }));

    h.backend.insert_agent(sample_agent("a1", "asst-1"));
    let (status, body) = h.send(Method::DELETE, "/agents/a1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Agent deleted" }));

    h.backend.insert_agent(sample_agent("a2", ""));
    h.backend.fail("delete_agent");
    let (status, body) = h.send(Method::DELETE, "/agents/a2", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to delete from database" }));
}

#[tokio::test]
async fn test_delete_agent_lookup_failure_is_404() {
    let h = Harness::new();
    h.backend.insert_agent(sample_agent("a1", "asst-1"));
    h.backend.fail("get_agent");
    let (status, body) = h.send(Method::DELETE, "/agents/a1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Agent not found" }));
    assert!(h.platform.ops().is_empty());
}

#[tokio::test]
async fn test_sync_routes() {
    let h = Harness::new();
    let local = sample_agent("a1", "asst-1");
    h.backend.insert_agent(local.clone());
    h.backend.insert_agent(sample_agent("a2", ""));
    h.platform.insert_assistant(assistant("asst-1", "Renamed", &local.first_message, &local.system_prompt));
    h.platform.insert_assistant(assistant("asst-9", "Fresh", "Hi", "p"));

    let (status, body) = h.send(Method::GET, "/agents/a1/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synced"], json!(["name"]));
    assert_eq!(body["agent"]["name"], "Renamed");

    let (status, body) = h.send(Method::GET, "/agents/a2/sync", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Agent has no Vapi assistant ID");

    let (status, _) = h.send(Method::GET, "/agents/zz/sync", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.send(Method::GET, "/agents/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "asst-9");

    h.platform.fail("list_assistants", 500);
    let (status, _) = h.send(Method::GET, "/agents/sync", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_analyze_without_model_key() {
    let h = Harness::new();
    h.backend.insert_call(scorable_call("c1"));
    let (status, body) = h.send(Method::POST, "/calls/c1/analyze", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "GEMINI_API_KEY not configured");
}

#[tokio::test]
async fn test_analyze_scores_and_skips() {
    let h = Harness::new().with_model_reply("```json\n{\"score\": 88, \"summary\": \"Keen\"}\n```");
    h.backend.insert_call(scorable_call("c1"));
    h.backend.insert_call(sample_call("c2"));

    let (status, body) = h.send(Method::POST, "/calls/c1/analyze", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "score": 88, "summary": "Keen", "qualification": "qualified" }));

    let (_, body) = h.send(Method::POST, "/calls/c2/analyze", None).await;
    assert_eq!(body, json!({ "skipped": true, "reason": "Not enough transcript to analyse" }));

    let (status, _) = h.send(Method::POST, "/calls/nope/analyze", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_unparseable_reply_carries_raw() {
    let h = Harness::new().with_model_reply("I think it went well");
    h.backend.insert_call(scorable_call("c1"));
    let (status, body) = h.send(Method::POST, "/calls/c1/analyze", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({ "error": "Gemini returned unparseable JSON", "raw": "I think it went well" }));
}

#[tokio::test]
async fn test_recording_lookup() {
    let h = Harness::new();
    let mut call = sample_call("c1");
    call.provider_call_id = Some("v1".into());
    h.backend.insert_call(call);
    h.backend.insert_call(sample_call("c2"));
    h.platform.insert_call(RemoteCall { id: "v1".into(), ..RemoteCall::default() });

    let (status, body) = h.send(Method::GET, "/calls/c1/recording", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "recording_url": null, "message": "Recording not ready yet" }));

    let (status, body) = h.send(Method::GET, "/calls/c2/recording", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No Vapi call ID for this call");
}

#[tokio::test]
async fn test_sync_recordings_reports() {
    let h = Harness::new();
    let (status, body) = h.send(Method::POST, "/calls/sync-recordings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "updated": 0, "message": "All calls already have recordings" }));

    let mut call = sample_call("c1");
    call.provider_call_id = Some("v1".into());
    h.backend.insert_call(call);
    h.platform.insert_call(RemoteCall {
        id: "v1".into(),
        recording_url: Some("https://r/v1.wav".into()),
        artifact: None,
    });
    let (_, body) = h.send(Method::POST, "/calls/sync-recordings", None).await;
    assert_eq!(body, json!({ "updated": 1, "checked": 1 }));

    h.backend.insert_call(sample_call("c3"));
    h.platform.fail("list_calls", 500);
    let (status, _) = h.send(Method::POST, "/calls/sync-recordings", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_options_require_valid_credential() {
    let h = Harness::new();
    let (status, body) = h.send(Method::GET, "/vapi/options?language=hi", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["voices"][0]["voiceId"], "hi-IN-SwaraNeural");
    assert!(body["models"].as_array().is_some_and(|m| !m.is_empty()));

    let (_, body) = h.send(Method::GET, "/vapi/options?language=xx", None).await;
    assert_eq!(body["voices"][0]["provider"], "openai");

    h.platform.fail("list_assistants", 401);
    let (status, body) = h.send(Method::GET, "/vapi/options", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Vapi API key is invalid or unreachable");
}

#[tokio::test]
async fn test_providers_pass_ping_status_through() {
    let h = Harness::new();
    let (status, body) = h.send(Method::GET, "/providers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["voice"]["en"].is_array());

    h.platform.fail("list_assistants", 403);
    let (status, body) = h.send(Method::GET, "/providers", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Vapi key invalid or unreachable (403)");
}
