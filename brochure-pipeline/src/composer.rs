use std::sync::Arc;

use brochure_common::Result;
use brochure_llm::traits::{collect_stream, ChatRequest, ChatStream, LlmClient, Sampling};

use crate::dossier::AggregatedDossier;

pub const BROCHURE_SYSTEM_PROMPT: &str = concat!(
    "You are an assistant that analyzes the contents of several relevant pages from a company website ",
    "and creates a short brochure about the company for prospective customers, investors and recruits. ",
    "Respond in markdown. Include details of company culture, customers and careers/jobs if you have the information.",
);

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Whole,
    Streaming,
}

/// The generated brochure, either complete or still arriving.
pub enum BrochureText {
    Whole(String),
    Fragments(ChatStream),
}

impl BrochureText {
    /// Wait for the full text. A stream that breaks off is an error.
    pub async fn collect(self) -> Result<String> {
        match self {
            Self::Whole(text) => Ok(text),
            Self::Fragments(stream) => collect_stream(stream).await,
        }
    }
}

impl std::fmt::Debug for BrochureText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Whole(text) => f.debug_tuple("Whole").field(&text.len()).finish(),
            Self::Fragments(_) => f.write_str("Fragments(..)"),
        }
    }
}

pub struct BrochureComposer {
    llm: Arc<dyn LlmClient>,
    max_prompt_chars: usize,
    sampling: Sampling,
}

impl BrochureComposer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            sampling: Sampling::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub async fn compose(
        &self,
        company_name: &str,
        dossier: &AggregatedDossier,
        mode: DeliveryMode,
    ) -> Result<BrochureText> {
        let user = brochure_user_prompt(company_name, dossier, self.max_prompt_chars);
        tracing::info!(
            company = company_name,
            ?mode,
            prompt_chars = user.chars().count(),
            model = self.llm.model_name(),
            "compose.start"
        );
        let request = ChatRequest::system_user(BROCHURE_SYSTEM_PROMPT, user).with_sampling(self.sampling);

        match mode {
            DeliveryMode::Whole => {
                let reply = self.llm.chat(&request).await?;
                Ok(BrochureText::Whole(reply.text))
            }
            DeliveryMode::Streaming => Ok(BrochureText::Fragments(self.llm.chat_stream(&request).await?)),
        }
    }
}

pub fn brochure_user_prompt(company_name: &str, dossier: &AggregatedDossier, max_chars: usize) -> String {
    let mut prompt = format!("You are looking at a company called: {company_name}\n");
    prompt.push_str(
        "Here are the contents of its landing page and other relevant pages; \
         use this information to build a short brochure of the company in markdown.\n",
    );
    prompt.push_str(&dossier.render());
    truncate_chars(&mut prompt, max_chars);
    prompt
}

/// Keep at most `max` characters, cutting only on a char boundary.
fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}
