use super::*;
use crate::config::{GeneratorBackend, GeneratorConfig};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> OllamaGenerator {
    OllamaGenerator::new(&GeneratorConfig {
        backend: GeneratorBackend::Ollama,
        url: Url::parse(&server.uri()).expect("mock uri should parse"),
        model: "test-llm".to_string(),
        max_new_tokens: 32,
        ..GeneratorConfig::default()
    })
    .expect("generator should build")
}

#[test]
fn generator_configuration() {
    let generator = OllamaGenerator::new(&GeneratorConfig::default())
        .expect("generator should build")
        .with_timeout(Duration::from_secs(5));

    assert_eq!(generator.model, "llama3.2:latest");
    assert_eq!(generator.max_new_tokens, 256);
    assert_eq!(generator.base_url.port(), Some(11434));
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_posts_non_streaming_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-llm",
            "prompt": "Say hi",
            "stream": false,
            "options": { "num_predict": 32 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "test-llm",
            "response": "  Hi there.\n",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = tokio::task::spawn_blocking(move || generator.generate("Say hi"))
        .await
        .expect("task should join")
        .expect("generation should succeed");

    // Whitespace is passed through untouched
    assert_eq!(answer, "  Hi there.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_reports_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate("Say hi"))
        .await
        .expect("task should join");

    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "x" })))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let result = tokio::task::spawn_blocking(move || generator.generate("Say hi"))
        .await
        .expect("task should join");

    assert!(matches!(result, Err(RagError::Generation(_))));
}
