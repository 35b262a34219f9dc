use std::io::Write;

use anyhow::Result;
use brochure_llm::credentials::report_openai_key;
use brochure_llm::ollama::OllamaClient;
use brochure_llm::openai::OpenAiClient;
use brochure_llm::traits::{ChatRequest, LlmClient, LlmResponse};
use brochure_llm::{DEFAULT_OLLAMA_MODEL, DEFAULT_OPENAI_MODEL};

use crate::cli::ExplainArgs;
use crate::output::print_stream;

pub const EXPLAIN_SYSTEM_PROMPT: &str = "
You are an expert programmer who explains technical concepts clearly and concisely.
When explaining code, you should:
1. Break down what the code does step by step
2. Explain why this approach might be used
3. Mention any potential pitfalls or alternatives
";

pub const EXPLAIN_QUESTION: &str = r#"
    Please explain what this code does and why:
    yield from {book.get("author") for book in books if book.get("author")}
    "#;

/// Ask both providers in turn. A provider failure is reported in the
/// output and does not stop the other.
pub async fn run<W: Write>(args: &ExplainArgs, out: &mut W) -> Result<()> {
    report_openai_key(args.openai_key.as_deref());

    let question = args.question.as_deref().unwrap_or(EXPLAIN_QUESTION);
    let request = ChatRequest::system_user(EXPLAIN_SYSTEM_PROMPT, question);

    let api_key = args.openai_key.clone().unwrap_or_default();
    match OpenAiClient::with_base_url(api_key, DEFAULT_OPENAI_MODEL.to_string(), &args.openai_base_url) {
        Ok(client) => explain_hosted(&client, &request, out).await?,
        Err(e) => writeln!(out, "Error with GPT-4o mini: {e}")?,
    }

    writeln!(out, "\n=== Llama 3.2 Explanation ===\n")?;
    match explain_local(&args.ollama_url, &request).await {
        Ok(reply) => writeln!(out, "{}\n", reply.text)?,
        Err(e) => {
            tracing::warn!(error = %e, "explain.local_failed");
            writeln!(out, "Error with Llama: {e}")?;
            writeln!(out, "Make sure Ollama is running and Llama 3.2 is installed")?;
        }
    }
    out.flush()?;
    Ok(())
}

async fn explain_local(base_url: &str, request: &ChatRequest) -> brochure_common::Result<LlmResponse> {
    let client = OllamaClient::new(base_url.to_string(), DEFAULT_OLLAMA_MODEL.to_string()).await?;
    client.chat(request).await
}

/// Stream first; if that fails at any point, ask again for the whole reply.
async fn explain_hosted<W: Write>(client: &dyn LlmClient, request: &ChatRequest, out: &mut W) -> Result<()> {
    writeln!(out, "\n=== GPT-4o mini Explanation (Streaming) ===\n")?;
    let streamed = match client.chat_stream(request).await {
        Ok(stream) => print_stream(out, stream).await,
        Err(e) => Err(e),
    };
    match streamed {
        Ok(_) => {
            writeln!(out, "\n")?;
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(error = %e, "explain.stream_failed");
            writeln!(out, "Error during streaming: {e}")?;
        }
    }

    writeln!(out, "\n=== GPT-4o mini Explanation (Non-Streaming) ===\n")?;
    match client.chat(request).await {
        Ok(reply) => writeln!(out, "{}\n", reply.text)?,
        Err(e) => {
            tracing::warn!(error = %e, "explain.hosted_failed");
            writeln!(out, "Error with GPT-4o mini: {e}")?;
        }
    }
    Ok(())
}
