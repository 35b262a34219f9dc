use std::sync::{Arc, LazyLock};

use brochure_common::{Degradable, Result};
use brochure_llm::traits::{ChatRequest, LlmClient, Sampling};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const LINK_SYSTEM_PROMPT: &str = concat!(
    "You are provided with a list of links found on a webpage. ",
    "You are able to decide which of the links would be most relevant to include in a brochure about the company, ",
    "such as links to an About page, or a Company page, or Careers/Jobs pages.\n",
    "You should respond in JSON as in this example:\n",
    "{\n",
    "    \"links\": [\n",
    "        {\"type\": \"about page\", \"url\": \"https://full.url/goes/here/about\"},\n",
    "        {\"type\": \"careers page\", \"url\": \"https://another.full.url/careers\"}\n",
    "    ]\n",
    "}\n",
);

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("static regex"));
static BARE_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("static regex"));

/// One link the oracle judged relevant, e.g. `{"type": "about page", "url": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSelection {
    #[serde(rename = "type")]
    pub category: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct LinkReply {
    #[serde(default)]
    links: Vec<LinkSelection>,
}

/// Asks the oracle which of a page's links belong in a brochure.
#[derive(Clone)]
pub struct LinkSelector {
    llm: Arc<dyn LlmClient>,
    sampling: Sampling,
}

impl LinkSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            sampling: Sampling::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// An unusable reply degrades to an empty selection; a failed oracle
    /// call is an error.
    pub async fn select(
        &self,
        page_url: &str,
        candidates: &[String],
    ) -> Result<Degradable<Vec<LinkSelection>>> {
        let request =
            ChatRequest::system_user(LINK_SYSTEM_PROMPT, links_user_prompt(page_url, candidates))
                .with_sampling(self.sampling);
        let reply = self.llm.chat(&request).await?;
        tracing::debug!(page_url, reply = %reply.text, "select.reply");

        let selection = parse_link_reply(&reply.text);
        match selection.reason() {
            Some(reason) => tracing::warn!(page_url, reason, "select.degraded"),
            None => {
                tracing::info!(page_url, selected = selection.value().len(), "select.ok");
                warn_untrusted(selection.value(), candidates);
            }
        }
        Ok(selection)
    }
}

pub fn links_user_prompt(page_url: &str, candidates: &[String]) -> String {
    let mut prompt = format!(
        "Here is the list of links on the website of {page_url} - \
         please decide which of these are relevant web links for a brochure about the company, \
         respond with the full https URL in JSON format. Do not include Terms of Service, Privacy, or email links.\n\
         Links (some might be relative links):\n"
    );
    prompt.push_str(&candidates.join("\n"));
    prompt
}

/// Decode the oracle's reply. Prose or code fences around the JSON object
/// are tolerated; anything that still fails to decode degrades to empty.
pub fn parse_link_reply(text: &str) -> Degradable<Vec<LinkSelection>> {
    let text = text.trim();
    let json = extract_json_block(text).unwrap_or(text);
    match serde_json::from_str::<LinkReply>(json) {
        Ok(reply) => Degradable::complete(reply.links),
        Err(e) => Degradable::degraded(Vec::new(), format!("link reply is not valid JSON: {e}")),
    }
}

fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    BARE_JSON
        .captures(text)
        .and_then(|c| c.get(1).map(|m| m.as_str()))
}

/// Selected URLs are used as given; flag the ones that look wrong.
fn warn_untrusted(selection: &[LinkSelection], candidates: &[String]) {
    for link in selection {
        let absolute = Url::parse(&link.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !absolute {
            tracing::warn!(url = %link.url, category = %link.category, "select.relative_url");
        } else if !candidates.iter().any(|c| c == &link.url) {
            tracing::warn!(url = %link.url, category = %link.category, "select.unlisted_url");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_reply() {
        let got = parse_link_reply(
            r#"{"links": [{"type": "about page", "url": "https://acme.example/about"}]}"#,
        );
        assert_eq!(
            got,
            Degradable::complete(vec![LinkSelection {
                category: "about page".into(),
                url: "https://acme.example/about".into(),
            }])
        );
    }

    #[test]
    fn fenced_reply_with_prose() {
        let text = "Sure! Here you go:\n```json\n{\"links\": [{\"type\": \"careers page\", \"url\": \"https://acme.example/careers\"}]}\n```\nHope that helps.";
        let got = parse_link_reply(text);
        assert!(!got.is_degraded());
        assert_eq!(got.value()[0].category, "careers page");
    }

    #[test]
    fn missing_links_key_is_an_empty_selection() {
        let got = parse_link_reply(r#"{"pages": []}"#);
        assert_eq!(got, Degradable::complete(vec![]));
    }

    #[test]
    fn prose_reply_degrades_to_empty() {
        let got = parse_link_reply("I could not find any relevant links.");
        assert!(got.is_degraded());
        assert!(got.into_inner().is_empty());
    }

    #[test]
    fn user_prompt_lists_candidates_one_per_line() {
        let prompt = links_user_prompt(
            "https://acme.example",
            &["/about".to_string(), "/careers".to_string()],
        );
        assert!(prompt.starts_with("Here is the list of links on the website of https://acme.example - please decide"));
        assert!(prompt.ends_with("Links (some might be relative links):\n/about\n/careers"));
    }

    #[test]
    fn system_prompt_carries_the_json_example() {
        assert!(LINK_SYSTEM_PROMPT.contains(r#"{"type": "about page", "url": "https://full.url/goes/here/about"},"#));
        assert!(LINK_SYSTEM_PROMPT.ends_with("    ]\n}\n"));
    }
}
