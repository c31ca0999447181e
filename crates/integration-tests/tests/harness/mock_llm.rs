//! Mock vendor backend for integration tests
//!
//! Serves canned streams for the Anthropic Messages, `OpenAI` Chat
//! Completions, `OpenAI` Responses and Ollama chat endpoints, and records
//! every request it receives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Text every successful mock stream produces
pub const MOCK_TEXT: &str = "Hello from mock";

/// Arguments every mock tool call carries
pub const MOCK_ARGUMENTS: &str = r#"{"location":"Paris"}"#;

/// Request captured by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Mock vendor backend returning predictable streams
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    /// Requests still to be failed before streams are served
    fail_count: AtomicU32,
    fail_status: StatusCode,
    /// Frames to send before dropping the connection
    abort_after: Option<usize>,
    /// Serve Ollama answers as one JSON body instead of NDJSON
    ollama_single: bool,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlm {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, StatusCode::INTERNAL_SERVER_ERROR, None, false).await
    }

    /// Start a mock server that fails the first `n` requests with `status`
    pub async fn start_failing(n: u32, status: StatusCode) -> anyhow::Result<Self> {
        Self::start_inner(n, status, None, false).await
    }

    /// Start a mock server that drops each stream after `frames` frames
    pub async fn start_aborting(frames: usize) -> anyhow::Result<Self> {
        Self::start_inner(0, StatusCode::INTERNAL_SERVER_ERROR, Some(frames), false).await
    }

    /// Start a mock server answering Ollama requests with a single JSON body
    pub async fn start_single_shot() -> anyhow::Result<Self> {
        Self::start_inner(0, StatusCode::INTERNAL_SERVER_ERROR, None, true).await
    }

    async fn start_inner(
        fail_count: u32,
        fail_status: StatusCode,
        abort_after: Option<usize>,
        ollama_single: bool,
    ) -> anyhow::Result<Self> {
        super::init_tracing();

        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            fail_status,
            abort_after,
            ollama_single,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/messages", routing::post(handle_messages))
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/responses", routing::post(handle_responses))
            .route("/api/chat", routing::post(handle_ollama_chat))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for the hosted vendors, including `/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for the local server, without a version segment
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests received, failed ones included
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("mock received no request")
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockLlmState {
    /// Record the request and return an error response while failures remain
    fn record(&self, uri: &Uri, headers: HeaderMap, body: Value) -> Option<Response> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().unwrap().push(RecordedRequest {
            path: uri.path().to_owned(),
            headers,
            body,
        });

        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining == 0 {
            return None;
        }
        self.fail_count.fetch_sub(1, Ordering::Relaxed);

        Some(
            (
                self.fail_status,
                Json(json!({
                    "error": {
                        "message": "mock server intentional failure",
                        "type": "server_error"
                    }
                })),
            )
                .into_response(),
        )
    }

    /// Stream `frames`, cutting the connection early when configured
    fn stream(&self, content_type: &'static str, frames: Vec<String>) -> Response {
        let body = match self.abort_after {
            None => Body::from(frames.concat()),
            Some(limit) => {
                let sent = frames
                    .into_iter()
                    .take(limit)
                    .map(|frame| Ok::<_, std::io::Error>(Bytes::from(frame)));
                // pause before failing so the sent frames are flushed first
                let reset = futures_util::stream::once(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(std::io::Error::other("mock connection reset"))
                });
                Body::from_stream(futures_util::stream::iter(sent).chain(reset))
            }
        };

        (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
    }
}

fn sse(data: &Value) -> String {
    format!("data: {data}\n\n")
}

fn named_sse(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

fn model_of(body: &Value) -> String {
    body["model"].as_str().unwrap_or_default().to_owned()
}

fn first_tool_name(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer).and_then(Value::as_str).map(str::to_owned)
}

// -- Handlers --

async fn handle_messages(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.record(&uri, headers, body.clone()) {
        return failure;
    }

    let model = model_of(&body);
    let mut frames = vec![
        named_sse(
            "message_start",
            &json!({"type": "message_start", "message": {
                "id": "msg_mock", "type": "message", "role": "assistant", "model": model,
                "content": [], "usage": {"input_tokens": 10, "output_tokens": 1}
            }}),
        ),
        named_sse(
            "content_block_start",
            &json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        named_sse(
            "content_block_delta",
            &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hello"}}),
        ),
        named_sse(
            "content_block_delta",
            &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " from mock"}}),
        ),
        named_sse("content_block_stop", &json!({"type": "content_block_stop", "index": 0})),
    ];

    let stop_reason = match first_tool_name(&body, "/tools/0/name") {
        Some(name) => {
            frames.extend([
                named_sse(
                    "content_block_start",
                    &json!({"type": "content_block_start", "index": 1, "content_block": {
                        "type": "tool_use", "id": "toolu_mock", "name": name, "input": {}
                    }}),
                ),
                named_sse(
                    "content_block_delta",
                    &json!({"type": "content_block_delta", "index": 1,
                            "delta": {"type": "input_json_delta", "partial_json": "{\"location\":"}}),
                ),
                named_sse(
                    "content_block_delta",
                    &json!({"type": "content_block_delta", "index": 1,
                            "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}}),
                ),
                named_sse("content_block_stop", &json!({"type": "content_block_stop", "index": 1})),
            ]);
            "tool_use"
        }
        None => "end_turn",
    };

    frames.extend([
        named_sse(
            "message_delta",
            &json!({"type": "message_delta", "delta": {"stop_reason": stop_reason}, "usage": {"output_tokens": 7}}),
        ),
        named_sse("message_stop", &json!({"type": "message_stop"})),
    ]);

    state.stream("text/event-stream", frames)
}

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.record(&uri, headers, body.clone()) {
        return failure;
    }

    let model = model_of(&body);
    let chunk = |delta: Value, finish_reason: Option<&str>| {
        sse(&json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}],
        }))
    };

    let mut frames = vec![chunk(json!({"role": "assistant", "content": ""}), None)];
    for word in ["Hello", " from", " mock"] {
        frames.push(chunk(json!({"content": word}), None));
    }

    let finish_reason = match first_tool_name(&body, "/tools/0/function/name") {
        Some(name) => {
            frames.push(chunk(
                json!({"tool_calls": [{"index": 0, "id": "call_mock", "type": "function",
                                       "function": {"name": name, "arguments": ""}}]}),
                None,
            ));
            frames.push(chunk(
                json!({"tool_calls": [{"index": 0, "function": {"arguments": MOCK_ARGUMENTS}}]}),
                None,
            ));
            "tool_calls"
        }
        None => "stop",
    };

    frames.push(chunk(json!({}), Some(finish_reason)));
    frames.push(sse(&json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": model,
        "choices": [],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })));
    frames.push("data: [DONE]\n\n".to_owned());

    state.stream("text/event-stream", frames)
}

async fn handle_responses(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.record(&uri, headers, body.clone()) {
        return failure;
    }

    let model = model_of(&body);
    let event = |kind: &str, mut data: Value| {
        data["type"] = json!(kind);
        named_sse(kind, &data)
    };

    let mut frames = vec![
        event(
            "response.created",
            json!({"response": {"id": "resp_mock", "model": model, "status": "in_progress", "output": []}}),
        ),
        event(
            "response.output_item.added",
            json!({"output_index": 0, "item": {"type": "message", "id": "msg_mock", "role": "assistant", "content": []}}),
        ),
        event("response.output_text.delta", json!({"item_id": "msg_mock", "delta": "Hello"})),
        event("response.output_text.delta", json!({"item_id": "msg_mock", "delta": " from mock"})),
        event(
            "response.output_item.done",
            json!({"output_index": 0, "item": {"type": "message", "id": "msg_mock", "role": "assistant",
                   "content": [{"type": "output_text", "text": MOCK_TEXT, "annotations": []}]}}),
        ),
    ];

    if let Some(name) = first_tool_name(&body, "/tools/0/name") {
        frames.extend([
            event(
                "response.output_item.added",
                json!({"output_index": 1, "item": {"type": "function_call", "id": "fc_mock",
                       "call_id": "call_mock", "name": name, "arguments": ""}}),
            ),
            event(
                "response.function_call_arguments.delta",
                json!({"item_id": "fc_mock", "delta": MOCK_ARGUMENTS}),
            ),
            event(
                "response.output_item.done",
                json!({"output_index": 1, "item": {"type": "function_call", "id": "fc_mock",
                       "call_id": "call_mock", "name": name, "arguments": MOCK_ARGUMENTS}}),
            ),
        ]);
    }

    // output left empty so the client rebuilds it from the streamed items
    frames.push(event(
        "response.completed",
        json!({"response": {"id": "resp_mock", "model": model, "status": "completed",
               "created_at": 1_700_000_000, "output": []}}),
    ));

    state.stream("text/event-stream", frames)
}

async fn handle_ollama_chat(
    State(state): State<Arc<MockLlmState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.record(&uri, headers, body.clone()) {
        return failure;
    }

    let model = model_of(&body);
    let tool = first_tool_name(&body, "/tools/0/function/name");

    if state.ollama_single {
        return Json(json!({
            "model": model,
            "message": {"role": "assistant", "content": MOCK_TEXT},
            "done": true,
            "done_reason": "stop",
        }))
        .into_response();
    }

    let line = |value: Value| format!("{value}\n");
    let mut frames = vec![
        line(json!({"model": model, "message": {"role": "assistant", "content": "Hello"}, "done": false})),
        line(json!({"model": model, "message": {"role": "assistant", "content": " from mock"}, "done": false})),
    ];
    if let Some(name) = tool {
        frames.push(line(json!({"model": model, "message": {"role": "assistant", "content": "",
            "tool_calls": [{"function": {"name": name, "arguments": {"location": "Paris"}}}]}, "done": false})));
    }
    frames.push(line(
        json!({"model": model, "message": {"role": "assistant", "content": ""}, "done": true, "done_reason": "stop"}),
    ));

    state.stream("application/x-ndjson", frames)
}
