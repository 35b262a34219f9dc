use std::io::Write;

use anyhow::{Result, bail};
use brochure_llm::anthropic::AnthropicClient;
use brochure_llm::credentials::key_preview;
use brochure_llm::openai::OpenAiClient;
use brochure_llm::traits::{ChatRequest, LlmClient};
use brochure_llm::{DEFAULT_ANTHROPIC_MODEL, DEFAULT_OPENAI_MODEL};

use crate::cli::JokeArgs;
use crate::output::{banner, print_stream};

pub const JOKE_SYSTEM_PROMPT: &str = "You are an assistant that is great at telling jokes";
pub const JOKE_USER_PROMPT: &str = "Tell a light-hearted joke for an audience of Data Scientists";

const JOKE_TEMPERATURE: f32 = 0.7;
const CLAUDE_MAX_TOKENS: u32 = 200;

pub async fn run<W: Write>(args: &JokeArgs, out: &mut W) -> Result<()> {
    let Some(openai_key) = present(&args.openai_key) else {
        bail!("OpenAI API Key not set");
    };
    tracing::info!("OpenAI API Key exists and begins {}", key_preview(openai_key, 8));
    let Some(anthropic_key) = present(&args.anthropic_key) else {
        bail!("Anthropic API Key not set");
    };
    tracing::info!("Anthropic API Key exists and begins {}", key_preview(anthropic_key, 7));

    let request =
        ChatRequest::system_user(JOKE_SYSTEM_PROMPT, JOKE_USER_PROMPT).with_temperature(JOKE_TEMPERATURE);

    banner(out, "Requesting response from OpenAI GPT-4...")?;
    let openai = OpenAiClient::with_base_url(
        openai_key.to_string(),
        DEFAULT_OPENAI_MODEL.to_string(),
        &args.openai_base_url,
    )?;
    let reply = openai.chat(&request).await?;
    writeln!(out, "{}", reply.text)?;
    banner(out, "OpenAI response completed")?;

    banner(out, "Requesting response from Anthropic Claude...")?;
    let claude = AnthropicClient::with_base_url(
        anthropic_key.to_string(),
        DEFAULT_ANTHROPIC_MODEL.to_string(),
        &args.anthropic_base_url,
    )?;
    let stream = claude
        .chat_stream(&request.clone().with_max_tokens(CLAUDE_MAX_TOKENS))
        .await?;
    print_stream(out, stream).await?;

    let rule = "=".repeat(50);
    writeln!(out, "\n{rule}\nClaude response completed\n{rule}")?;
    out.flush()?;
    Ok(())
}

fn present(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}
