use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use brochure_config::{BrochureSettings, LlmSettings};
use brochure_llm::credentials::report_openai_key;
use brochure_llm::ensure_llm_ready;
use brochure_llm::traits::Sampling;
use brochure_pipeline::{BrochurePipeline, BrochureText, DeliveryMode};
use brochure_web::HttpPageFetcher;
use brochure_web::fetcher::FetchOptions;

use crate::cli::BrochureArgs;
use crate::output::print_stream;

pub async fn run<W: Write>(args: &BrochureArgs, settings: &BrochureSettings, out: &mut W) -> Result<()> {
    if let LlmSettings::Openai { auth_token, .. } = &settings.llm {
        report_openai_key(Some(auth_token.as_str()));
    }

    let llm = ensure_llm_ready(&settings.llm.to_llm_config())
        .await
        .context("failed to initialise the LLM client")?;

    let mut options = FetchOptions {
        timeout: settings.fetch.timeout(),
        ..Default::default()
    };
    if let Some(user_agent) = &settings.fetch.user_agent {
        options.user_agent = user_agent.clone();
    }
    let fetcher = HttpPageFetcher::new(options).context("failed to build the page fetcher")?;

    let sampling = Sampling {
        temperature: settings.llm.temperature(),
        max_tokens: settings.llm.max_tokens(),
    };
    let pipeline = BrochurePipeline::with_sampling(llm, Arc::new(fetcher), sampling)
        .with_pacing(settings.fetch.pacing())
        .with_max_prompt_chars(settings.compose.max_prompt_chars);

    let mode = if args.stream {
        DeliveryMode::Streaming
    } else {
        DeliveryMode::Whole
    };
    tracing::info!(company = %args.company, url = %args.url, ?mode, "brochure.start");

    let text = pipeline.run(&args.company, &args.url, mode).await?;
    write_brochure(out, text).await?;

    tracing::info!(company = %args.company, "brochure.done");
    Ok(())
}

/// Whole replies are printed at once; streamed ones fragment by fragment.
pub async fn write_brochure<W: Write>(out: &mut W, text: BrochureText) -> Result<()> {
    match text {
        BrochureText::Whole(text) => {
            writeln!(out, "\n=== Generated Brochure ===\n")?;
            writeln!(out, "{text}")?;
        }
        BrochureText::Fragments(stream) => {
            writeln!(out, "\n=== Streaming Brochure ===\n")?;
            print_stream(out, stream).await?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
