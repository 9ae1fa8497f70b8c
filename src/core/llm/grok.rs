use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    Completion, CompletionBackend, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ExecuteOptions,
    ExecutionError, ExecutionResult, TokenUsage,
};
use crate::core::storage::types::{ApiConfig, DEFAULT_MODEL};

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    // Some providers send `null` content alongside tool or refusal fields.
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for Grok and other OpenAI-compatible endpoints.
#[derive(Clone, Default)]
pub struct GrokClient {
    client: Client,
}

impl GrokClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn endpoint(api_base: &str) -> String {
        format!("{}/chat/completions", api_base.trim_end_matches('/'))
    }

    async fn send(&self, prompt: &str, config: &ApiConfig, options: ExecuteOptions) -> ExecutionResult {
        if !config.is_ready() {
            return Err(ExecutionError::MissingConfig);
        }

        let model = if config.model.is_empty() {
            DEFAULT_MODEL
        } else {
            config.model.as_str()
        };
        let req = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let url = Self::endpoint(&config.api_base);
        debug!("POST {} (model: {})", url, model);

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let server_message = res.json::<Value>().await.ok().and_then(|body| {
                body.get("error")
                    .and_then(|err| err.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            let message = server_message.unwrap_or_else(|| {
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
            });
            return Err(ExecutionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = res
            .text()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ExecutionError::MalformedResponse("no choices returned".to_string()))?;

        Ok(Completion {
            content,
            usage: parsed.usage,
        })
    }
}

#[async_trait]
impl CompletionBackend for GrokClient {
    async fn execute(
        &self,
        prompt: &str,
        config: &ApiConfig,
        options: ExecuteOptions,
    ) -> ExecutionResult {
        info!("Executing prompt against {}", config.api_base);
        let result = self.send(prompt, config, options).await;
        match &result {
            Ok(completion) => info!(
                "Task completed successfully ({} tokens)",
                completion.usage.map(|u| u.total_tokens).unwrap_or(0)
            ),
            Err(e) => warn!("Task failed: {}", e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header},
        response::IntoResponse,
        routing::post,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[derive(Clone)]
    struct MockState {
        status: StatusCode,
        body: String,
        requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    }

    async fn mock_chat_completion(
        State(state): State<MockState>,
        headers: HeaderMap,
        Json(payload): Json<Value>,
    ) -> impl IntoResponse {
        state
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((headers, payload));
        (
            state.status,
            [(header::CONTENT_TYPE, "application/json")],
            state.body.clone(),
        )
    }

    /// Completions endpoint answering every request with a fixed status and body.
    struct MockCompletions {
        port: u16,
        requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
        shutdown_tx: Option<oneshot::Sender<()>>,
    }

    impl MockCompletions {
        async fn start(status: StatusCode, body: Value) -> Self {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let state = MockState {
                status,
                body: body.to_string(),
                requests: Arc::clone(&requests),
            };
            let app = Router::new()
                .route("/v1/chat/completions", post(mock_chat_completion))
                .with_state(state);

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            tokio::spawn(async move {
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });

            Self {
                port,
                requests,
                shutdown_tx: Some(shutdown_tx),
            }
        }

        fn api_base(&self) -> String {
            format!("http://127.0.0.1:{}/v1", self.port)
        }

        fn hits(&self) -> usize {
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
        }

        fn last_request(&self) -> (HeaderMap, Value) {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .last()
                .cloned()
                .expect("no request recorded")
        }
    }

    impl Drop for MockCompletions {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    fn config_for(api_base: String) -> ApiConfig {
        ApiConfig {
            api_key: "sk-test".to_string(),
            api_base,
            model: "grok-test".to_string(),
        }
    }

    fn ok_body(content: &str) -> Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2 }
        })
    }

    #[tokio::test]
    async fn missing_config_fails_without_network_call() {
        let server = MockCompletions::start(StatusCode::OK, ok_body("hi")).await;
        let client = GrokClient::new();

        let empty = ApiConfig {
            api_key: String::new(),
            api_base: String::new(),
            model: String::new(),
        };
        let res = client.execute("", &empty, ExecuteOptions::default()).await;
        assert_eq!(res, Err(ExecutionError::MissingConfig));

        let keyless = ApiConfig {
            api_key: String::new(),
            ..config_for(server.api_base())
        };
        let res = client.execute("hello", &keyless, ExecuteOptions::default()).await;
        assert_eq!(res, Err(ExecutionError::MissingConfig));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn success_returns_content_and_usage() {
        let server = MockCompletions::start(StatusCode::OK, ok_body("hi")).await;
        let client = GrokClient::new();

        let completion = client
            .execute("say hi", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "hi");
        assert_eq!(completion.usage.unwrap().total_tokens, 2);
    }

    #[tokio::test]
    async fn request_carries_bearer_token_and_default_sampling() {
        let server = MockCompletions::start(StatusCode::OK, ok_body("ok")).await;
        let client = GrokClient::new();

        client
            .execute("the prompt", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap();

        let (headers, body) = server.last_request();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
        assert!(
            headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("application/json")
        );
        assert_eq!(body["model"], "grok-test");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "the prompt");
        assert_eq!(body["max_tokens"], 4000);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_model_falls_back_to_default_and_options_apply() {
        let server = MockCompletions::start(StatusCode::OK, ok_body("ok")).await;
        let client = GrokClient::new();
        let config = ApiConfig {
            model: String::new(),
            ..config_for(format!("{}/", server.api_base()))
        };
        let options = ExecuteOptions {
            temperature: Some(0.2),
            max_tokens: Some(128),
        };

        client.execute("p", &config, options).await.unwrap();

        let (_, body) = server.last_request();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 128);
    }

    #[tokio::test]
    async fn rejected_request_uses_server_error_message() {
        let server = MockCompletions::start(
            StatusCode::UNAUTHORIZED,
            json!({ "error": { "message": "bad key" } }),
        )
        .await;
        let client = GrokClient::new();

        let err = client
            .execute("p", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Rejected {
                status: 401,
                message: "bad key".to_string()
            }
        );
        assert_eq!(err.to_string(), "bad key");
    }

    #[tokio::test]
    async fn rejected_request_without_message_uses_status_line() {
        let server =
            MockCompletions::start(StatusCode::SERVICE_UNAVAILABLE, json!({ "detail": "x" })).await;
        let client = GrokClient::new();

        let err = client
            .execute("p", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_typed_failure() {
        let server = MockCompletions::start(StatusCode::OK, json!({ "choices": [] })).await;
        let client = GrokClient::new();

        let err = client
            .execute("p", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = GrokClient::new();
        let err = client
            .execute(
                "p",
                &config_for(format!("http://127.0.0.1:{}/v1", port)),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            ExecutionError::Transport(msg) => assert!(!msg.is_empty()),
            other => panic!("expected transport failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn null_content_and_partial_usage_still_succeed() {
        let server = MockCompletions::start(
            StatusCode::OK,
            json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }],
                "usage": { "total_tokens": 9 }
            }),
        )
        .await;
        let client = GrokClient::new();

        let completion = client
            .execute("p", &config_for(server.api_base()), ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.content, "");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.total_tokens, 9);
        assert_eq!(usage.prompt_tokens, 0);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            GrokClient::endpoint("https://api.x.ai/v1/"),
            "https://api.x.ai/v1/chat/completions"
        );
        assert_eq!(
            GrokClient::endpoint("https://api.x.ai/v1"),
            "https://api.x.ai/v1/chat/completions"
        );
    }
}
