use brochure_app::cli::{BrochureArgs, ExplainArgs, JokeArgs};
use brochure_app::commands;
use brochure_config::{BrochureSettings, ComposeSettings, FetchSettings, LlmSettings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(llm_server: &MockServer) -> BrochureSettings {
    BrochureSettings {
        llm: LlmSettings::Openai {
            model: "gpt-4o-mini".into(),
            auth_token: "sk-test".into(),
            temperature: None,
            max_tokens: None,
            endpoint: format!("{}/v1", llm_server.uri()),
        },
        fetch: FetchSettings {
            pacing_ms: 0,
            ..Default::default()
        },
        compose: ComposeSettings::default(),
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "gpt-4o-mini",
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

async fn mount_site(site: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Acme</title></head><body><p>Anvils.</p>\
             <a href=\"/about\">About</a><a href=\"/privacy\">Privacy</a></body></html>",
        ))
        .expect(1)
        .mount(site)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>About Acme</title></head><body>Founded in 1949.</body></html>",
        ))
        .expect(1)
        .mount(site)
        .await;
    Mock::given(method("GET"))
        .and(path("/privacy"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(site)
        .await;
}

async fn mount_link_selection(llm: &MockServer, site: &MockServer) {
    let links = json!({"links": [{"type": "about page", "url": format!("{}/about", site.uri())}]});
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("list of links found on a webpage"))
        .respond_with(completion(&links.to_string()))
        .expect(1)
        .mount(llm)
        .await;
}

#[tokio::test]
async fn brochure_is_printed_whole() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;
    mount_site(&site).await;
    mount_link_selection(&llm, &site).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You are looking at a company called: Acme"))
        .and(body_string_contains("Founded in 1949."))
        .respond_with(completion("# Acme\nAnvils since 1949."))
        .expect(1)
        .mount(&llm)
        .await;

    let args = BrochureArgs {
        company: "Acme".into(),
        url: format!("{}/", site.uri()),
        stream: false,
    };
    let mut out = Vec::new();
    commands::brochure::run(&args, &settings_for(&llm), &mut out)
        .await
        .unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\n=== Generated Brochure ===\n\n# Acme\nAnvils since 1949.\n"
    );
}

#[tokio::test]
async fn brochure_is_streamed() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;
    mount_site(&site).await;
    mount_link_selection(&llm, &site).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"# Acme\\n\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Anvils since 1949.\"}}]}\n\n",
                    "data: [DONE]\n\n",
                )),
        )
        .expect(1)
        .mount(&llm)
        .await;

    let args = BrochureArgs {
        company: "Acme".into(),
        url: format!("{}/", site.uri()),
        stream: true,
    };
    let mut out = Vec::new();
    commands::brochure::run(&args, &settings_for(&llm), &mut out)
        .await
        .unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\n=== Streaming Brochure ===\n\n# Acme\nAnvils since 1949.\n"
    );
}

#[tokio::test]
async fn oracle_failure_is_an_error() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Acme</title>"))
        .mount(&site)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "You exceeded your current quota"}
        })))
        .mount(&llm)
        .await;

    let args = BrochureArgs {
        company: "Acme".into(),
        url: site.uri(),
        stream: false,
    };
    let mut out = Vec::new();
    let err = commands::brochure::run(&args, &settings_for(&llm), &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("quota"), "{err:#}");
    assert!(out.is_empty());
}

#[tokio::test]
async fn explain_falls_back_and_reports_local_failure() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "stream backend down"}
        })))
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("expert programmer"))
        .respond_with(completion("It yields each distinct author."))
        .mount(&llm)
        .await;

    let args = ExplainArgs {
        question: None,
        openai_key: Some("sk-test".into()),
        openai_base_url: format!("{}/v1", llm.uri()),
        ollama_url: "http://127.0.0.1:9".into(),
    };
    let mut out = Vec::new();
    commands::explain::run(&args, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("=== GPT-4o mini Explanation (Streaming) ==="));
    assert!(text.contains("Error during streaming:"));
    assert!(text.contains("=== GPT-4o mini Explanation (Non-Streaming) ===\n\nIt yields each distinct author."));
    assert!(text.contains("=== Llama 3.2 Explanation ==="));
    assert!(text.contains("Make sure Ollama is running and Llama 3.2 is installed"));
}

#[tokio::test]
async fn joke_asks_openai_then_streams_claude() {
    let openai = MockServer::start().await;
    let anthropic = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Data Scientists"))
        .respond_with(completion("Why did the data scientist break up with the spreadsheet?"))
        .expect(1)
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(body_partial_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 200,
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(concat!(
                    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Too many \"}}\n\n",
                    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"outliers.\"}}\n\n",
                    "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
                )),
        )
        .expect(1)
        .mount(&anthropic)
        .await;

    let args = JokeArgs {
        openai_key: Some("sk-test".into()),
        anthropic_key: Some("sk-ant-test".into()),
        openai_base_url: format!("{}/v1", openai.uri()),
        anthropic_base_url: anthropic.uri(),
    };
    let mut out = Vec::new();
    commands::joke::run(&args, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let openai_at = text.find("Why did the data scientist").unwrap();
    let claude_at = text.find("Too many outliers.").unwrap();
    assert!(openai_at < claude_at);
    assert!(text.ends_with("Claude response completed\n==================================================\n"));
}

#[tokio::test]
async fn joke_requires_both_keys() {
    let args = JokeArgs {
        openai_key: Some("sk-test".into()),
        anthropic_key: None,
        openai_base_url: "http://127.0.0.1:9/v1".into(),
        anthropic_base_url: "http://127.0.0.1:9".into(),
    };
    let mut out = Vec::new();
    let err = commands::joke::run(&args, &mut out).await.unwrap_err();
    assert_eq!(err.to_string(), "Anthropic API Key not set");
    assert!(out.is_empty());
}
