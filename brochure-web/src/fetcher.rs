use std::time::Duration;

use async_trait::async_trait;
use brochure_common::Degradable;
use brochure_http::header::{HeaderMap, HeaderValue, USER_AGENT};
use brochure_http::{HttpClient, HttpError, RequestOpts};
use serde::Serialize;

use crate::extract::extract_page;

/// Desktop Chrome user agent; some sites refuse requests without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const NO_TITLE: &str = "No title found";
const ERROR_TITLE: &str = "Error fetching page";

/// A single web page reduced to its title, visible text and outbound links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    /// `href` values in document order, exactly as written.
    pub links: Vec<String>,
}

impl FetchedPage {
    /// Placeholder used when a page could not be retrieved.
    pub fn unreachable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: Some(ERROR_TITLE.to_string()),
            text: String::new(),
            links: Vec::new(),
        }
    }

    /// The page as it appears in the dossier.
    pub fn contents(&self) -> String {
        format!(
            "Webpage Title:\n{}\nWebpage Contents:\n{}\n\n",
            self.title.as_deref().unwrap_or(NO_TITLE),
            self.text
        )
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieve and parse `url`. Never fails: transport problems yield a
    /// degraded, empty page.
    async fn fetch(&self, url: &str) -> Degradable<FetchedPage>;
}

/// Fetch settings; `Default` gives the desktop user agent and a 10 s timeout.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// [`PageFetcher`] backed by a single GET per page, no retries.
pub struct HttpPageFetcher {
    client: HttpClient,
    user_agent: HeaderValue,
}

impl HttpPageFetcher {
    pub fn new(options: FetchOptions) -> Result<Self, HttpError> {
        let user_agent = HeaderValue::from_str(&options.user_agent)
            .map_err(|e| HttpError::Build(format!("invalid user agent: {e}")))?;
        let client = HttpClient::detached()?
            .with_timeout(options.timeout)
            .with_retries(0);
        Ok(Self { client, user_agent })
    }

    async fn get(&self, url: &str) -> Result<String, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());
        self.client
            .get_text(
                url,
                RequestOpts {
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Degradable<FetchedPage> {
        match self.get(url).await {
            Ok(html) => {
                let page = extract_page(url, &html);
                tracing::info!(url, title = ?page.title, links = page.links.len(), "fetch.ok");
                Degradable::complete(page)
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "fetch.degraded");
                Degradable::degraded(FetchedPage::unreachable(url), err.to_string())
            }
        }
    }
}
