mod common;

use brochure_common::BrochureError;
use brochure_llm::anthropic::AnthropicClient;
use brochure_llm::ollama::OllamaClient;
use brochure_llm::openai::OpenAiClient;
use brochure_llm::traits::{collect_stream, ChatEvent, ChatRequest, LlmClient};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn joke_request() -> ChatRequest {
    ChatRequest::system_user(
        "You are an assistant that is great at telling jokes",
        "Tell a light-hearted joke for an audience of Data Scientists",
    )
    .with_temperature(0.7)
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

#[tokio::test]
async fn openai_whole_reply() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Why did the data scientist..."}}],
            "usage": {"total_tokens": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url(
        "sk-test".into(),
        "gpt-4o-mini".into(),
        &format!("{}/v1", server.uri()),
    )
    .unwrap();
    let resp = client.chat(&joke_request()).await.unwrap();
    assert_eq!(resp.text, "Why did the data scientist...");
    assert_eq!(resp.tokens_used, Some(42));
}

#[tokio::test]
async fn openai_stream_yields_fragments_then_done() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"# Acme\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" brochure\"}}]}\n\n",
            "data: [DONE]\n\n",
        )))
        .mount(&server)
        .await;

    let client =
        OpenAiClient::with_base_url("sk-test".into(), "m".into(), &format!("{}/v1/", server.uri()))
            .unwrap();
    let events: Vec<ChatEvent> = client
        .chat_stream(&joke_request())
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;
    assert_eq!(
        events,
        vec![
            ChatEvent::Delta("# Acme".into()),
            ChatEvent::Delta(" brochure".into()),
            ChatEvent::Done,
        ]
    );
}

#[tokio::test]
async fn openai_stream_cut_short_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n"))
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-test".into(), "m".into(), &server.uri()).unwrap();
    let stream = client.chat_stream(&joke_request()).await.unwrap();
    assert!(matches!(
        collect_stream(stream).await,
        Err(BrochureError::Stream(_))
    ));
}

#[tokio::test]
async fn openai_rejected_key_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-bad".into(), "m".into(), &server.uri()).unwrap();
    let err = client.chat(&joke_request()).await.unwrap_err();
    assert!(matches!(err, BrochureError::Llm(ref m) if m.contains("Incorrect API key")));
    assert!(client.chat_stream(&joke_request()).await.is_err());
}

#[tokio::test]
async fn ollama_chat_and_ndjson_stream() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3.2:latest"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "yield from delegates"},
            "done": true,
            "eval_count": 7
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"yield \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"from\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        )))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "llama3.2".into()).await.unwrap();

    let whole = client.chat(&joke_request()).await.unwrap();
    assert_eq!(whole.text, "yield from delegates");
    assert_eq!(whole.tokens_used, Some(7));

    let streamed = collect_stream(client.chat_stream(&joke_request()).await.unwrap())
        .await
        .unwrap();
    assert_eq!(streamed, "yield from");
}

#[tokio::test]
async fn ollama_pulls_a_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(json!({"model": "llama3.2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    OllamaClient::new(server.uri(), "llama3.2".into()).await.unwrap();
}

#[tokio::test]
async fn ollama_unreachable_server_is_reported() {
    // Port 9 (discard) is not an Ollama server.
    let result = OllamaClient::new("http://127.0.0.1:9".into(), "llama3.2".into()).await;
    assert!(matches!(result, Err(BrochureError::Llm(ref m)) if m.contains("ollama serve")));
}

#[tokio::test]
async fn anthropic_headers_and_streamed_deltas() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "stream": true,
            "max_tokens": 200,
            "system": "You are an assistant that is great at telling jokes"
        })))
        .respond_with(sse(concat!(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0}\n\n",
            "event: ping\ndata: {\"type\":\"ping\"}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Why do \"}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"statisticians...\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        )))
        .mount(&server)
        .await;

    let client =
        AnthropicClient::with_base_url("sk-ant-test".into(), "claude".into(), &server.uri()).unwrap();
    let text = collect_stream(
        client
            .chat_stream(&joke_request().with_max_tokens(200))
            .await
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(text, "Why do statisticians...");
}

#[tokio::test]
async fn anthropic_whole_reply_and_error_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude",
            "content": [{"type": "text", "text": "A joke."}],
            "usage": {"input_tokens": 10, "output_tokens": 3}
        })))
        .mount(&server)
        .await;

    let client =
        AnthropicClient::with_base_url("sk-ant-test".into(), "claude".into(), &server.uri()).unwrap();

    let whole = client.chat(&joke_request()).await.unwrap();
    assert_eq!(whole.text, "A joke.");
    assert_eq!(whole.tokens_used, Some(13));

    let stream = client.chat_stream(&joke_request()).await.unwrap();
    let err = collect_stream(stream).await.unwrap_err();
    assert!(matches!(err, BrochureError::Llm(ref m) if m.contains("Overloaded")));
}
