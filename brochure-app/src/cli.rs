use std::path::PathBuf;

use brochure_llm::anthropic::ANTHROPIC_API_BASE;
use brochure_llm::ollama::OLLAMA_API_BASE;
use brochure_llm::openai::OPENAI_API_BASE;
use clap::{ArgAction, Args, Parser, Subcommand};

/// Generate a company brochure from its website, or run the chat demos.
#[derive(Debug, Parser)]
#[command(name = "brochure", version, about)]
pub struct Cli {
    /// Settings file; `brochure.yaml` in the working directory is used if present.
    #[arg(long, global = true, env = "BROCHURE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the default `brochure` command.
    #[command(flatten)]
    pub brochure: BrochureArgs,
}

impl Cli {
    /// The command to run; no subcommand means `brochure` with the
    /// top-level arguments. A top-level `--stream` also applies to an
    /// explicit `brochure` subcommand.
    pub fn into_command(self) -> Command {
        match self.command {
            None => Command::Brochure(self.brochure),
            Some(Command::Brochure(mut args)) => {
                args.stream |= self.brochure.stream;
                Command::Brochure(args)
            }
            Some(other) => other,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a markdown brochure for a company website (default).
    Brochure(BrochureArgs),
    /// Ask a hosted and a local model to explain a snippet of code.
    Explain(ExplainArgs),
    /// Ask OpenAI and Anthropic for a joke.
    Joke(JokeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BrochureArgs {
    #[arg(long, env = "COMPANY_NAME", default_value = "edward donner")]
    pub company: String,

    #[arg(long, env = "COMPANY_URL", default_value = "https://edwarddonner.com")]
    pub url: String,

    /// Print the brochure as it is generated. Only the value `true`
    /// (any case) enables it; an explicit value needs `--stream=<value>`.
    #[arg(
        long,
        env = "USE_STREAMING",
        action = ArgAction::Set,
        value_parser = parse_use_streaming,
        default_value = "false",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
    )]
    pub stream: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ExplainArgs {
    /// Question to ask instead of the built-in `yield from` example.
    #[arg(long)]
    pub question: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_API_BASE, hide = true)]
    pub openai_base_url: String,

    #[arg(long, env = "OLLAMA_HOST", default_value = OLLAMA_API_BASE)]
    pub ollama_url: String,
}

#[derive(Debug, Clone, Args)]
pub struct JokeArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_API_BASE, hide = true)]
    pub openai_base_url: String,

    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = ANTHROPIC_API_BASE, hide = true)]
    pub anthropic_base_url: String,
}

fn parse_use_streaming(raw: &str) -> Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}
