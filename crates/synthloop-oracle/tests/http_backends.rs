//! LlmOracle against a local one-shot HTTP server.

use std::time::Duration;

use synthloop_core::{ExecutionResult, GenerationError, Oracle, Specification};
use synthloop_oracle::{Backend, LlmOracle, OracleConfig, PromptProfile};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with `status` and `body`; the task yields the raw request.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}

fn oracle(backend: Backend, endpoint: &str, profile: PromptProfile) -> LlmOracle {
    let config = OracleConfig::new(backend, "test-key")
        .with_endpoint(endpoint)
        .with_request_timeout(Duration::from_secs(10));
    LlmOracle::new(config, profile).unwrap()
}

#[tokio::test]
async fn test_anthropic_test_generation_strips_fences() {
    let body = serde_json::json!({
        "content": [{ "type": "text", "text": "```python\ndef test_add():\n    assert add(1, 2) == 3\n```" }]
    })
    .to_string();
    let (endpoint, server) = serve_once("200 OK", body).await;

    let text = oracle(Backend::Anthropic, &endpoint, PromptProfile::General)
        .produce_test(&Specification::new("add two numbers"))
        .await
        .unwrap();

    assert_eq!(text, "def test_add():\n    assert add(1, 2) == 3");
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /messages"));
    assert!(request.to_ascii_lowercase().contains("x-api-key: test-key"));
    assert!(request.contains("anthropic-version"));
    assert!(request.contains("Write pytest tests for: add two numbers"));
}

#[tokio::test]
async fn test_openai_implementation_carries_context() {
    let body = serde_json::json!({
        "choices": [{ "message": { "content": "def add(a, b):\n    return a + b" } }]
    })
    .to_string();
    let (endpoint, server) = serve_once("200 OK", body).await;

    let text = oracle(Backend::OpenAi, &endpoint, PromptProfile::General)
        .produce_implementation(
            &Specification::new("add two numbers"),
            "def test_add(): assert add(1, 2) == 3",
            "This is the first attempt.",
        )
        .await
        .unwrap();

    assert_eq!(text, "def add(a, b):\n    return a + b");
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /chat/completions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
    assert!(request.contains("This is the first attempt."));
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let (endpoint, _server) =
        serve_once("401 Unauthorized", r#"{"error":"invalid x-api-key"}"#.to_string()).await;

    let err = oracle(Backend::Anthropic, &endpoint, PromptProfile::General)
        .produce_test(&Specification::new("anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn test_rate_limit_maps_to_quota_error() {
    let (endpoint, _server) =
        serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#.to_string()).await;

    let err = oracle(Backend::OpenAi, &endpoint, PromptProfile::General)
        .produce_test(&Specification::new("anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Quota(_)), "{err:?}");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (endpoint, _server) = serve_once("200 OK", "not json".to_string()).await;

    let err = oracle(Backend::Anthropic, &endpoint, PromptProfile::General)
        .produce_test(&Specification::new("anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = oracle(Backend::OpenAi, &format!("http://{addr}"), PromptProfile::General)
        .produce_test(&Specification::new("anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Request(_)), "{err:?}");
}

#[tokio::test]
async fn test_manim_diagnosis_is_free_text() {
    let body = serde_json::json!({
        "content": [{ "type": "text", "text": "  Call self.play(Transform(circle, square)).  " }]
    })
    .to_string();
    let (endpoint, server) = serve_once("200 OK", body).await;

    let failing = ExecutionResult::new(
        "E   AssertionError: no Transform played",
        vec!["test_candidate.py::test_transform".into()],
        Duration::from_millis(40),
        Vec::new(),
    );
    let text = oracle(Backend::Anthropic, &endpoint, PromptProfile::Manim)
        .produce_diagnosis(&failing)
        .await
        .unwrap();

    assert_eq!(text, "Call self.play(Transform(circle, square)).");
    let request = server.await.unwrap();
    assert!(request.contains("You are a Manim expert"));
    assert!(request.contains("test_candidate.py::test_transform"));
}
