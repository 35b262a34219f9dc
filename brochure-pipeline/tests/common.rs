use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use brochure_common::{BrochureError, Degradable, Result};
use brochure_llm::traits::{ChatEvent, ChatRequest, ChatStream, LlmClient, LlmResponse};
use brochure_web::{FetchedPage, PageFetcher};
use futures::stream;

/// Oracle that replays canned replies in order and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[allow(dead_code)]
impl ScriptedLlm {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(BrochureError::Llm("quota exceeded".into()))])),
            requests: Mutex::default(),
        }
    }

    pub fn request(&self, n: usize) -> ChatRequest {
        self.requests.lock().unwrap()[n].clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BrochureError::Llm("script exhausted".into())))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        Ok(LlmResponse {
            text: self.next(request)?,
            model: Some("scripted".into()),
            tokens_used: None,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let text = self.next(request)?;
        // Three-character fragments, so multi-fragment delivery is exercised.
        let chars: Vec<char> = text.chars().collect();
        let mut events: Vec<Result<ChatEvent>> = chars
            .chunks(3)
            .map(|c| Ok(ChatEvent::Delta(c.iter().collect())))
            .collect();
        events.push(Ok(ChatEvent::Done));
        Ok(Box::pin(stream::iter(events)))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Serves pages from a map; unknown URLs behave like unreachable sites.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, FetchedPage>,
    pub fetched: Mutex<Vec<(String, tokio::time::Instant)>>,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn with_page(mut self, url: &str, title: &str, text: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: url.to_string(),
                title: Some(title.to_string()),
                text: text.to_string(),
                links: links.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Degradable<FetchedPage> {
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), tokio::time::Instant::now()));
        match self.pages.get(url) {
            Some(page) => Degradable::complete(page.clone()),
            None => Degradable::degraded(FetchedPage::unreachable(url), "connection refused"),
        }
    }
}
