//! Brochure generation: fetch a company's landing page, let the oracle pick
//! the pages worth reading, gather them, and have the oracle write a
//! markdown brochure from what was gathered.
//!
//! The stages run strictly in sequence:
//!
//! 1. [`ContentAggregator`] fetches the landing page through a
//!    [`brochure_web::PageFetcher`].
//! 2. [`LinkSelector`] asks the oracle which outbound links matter.
//! 3. The aggregator fetches each selected page, pausing before every fetch.
//! 4. [`BrochureComposer`] turns the [`AggregatedDossier`] into
//!    [`BrochureText`], whole or streamed.

pub mod aggregator;
pub mod composer;
pub mod dossier;
pub mod selector;

use std::sync::Arc;

use brochure_common::Result;
use brochure_llm::traits::{LlmClient, Sampling};
use brochure_web::PageFetcher;

pub use aggregator::ContentAggregator;
pub use composer::{BrochureComposer, BrochureText, DeliveryMode};
pub use dossier::AggregatedDossier;
pub use selector::{LinkSelection, LinkSelector};

/// Aggregation and composition wired to one oracle and one fetcher.
pub struct BrochurePipeline {
    aggregator: ContentAggregator,
    composer: BrochureComposer,
}

impl BrochurePipeline {
    pub fn new(llm: Arc<dyn LlmClient>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::with_sampling(llm, fetcher, Sampling::default())
    }

    /// Like [`BrochurePipeline::new`], with sampling settings applied to both oracle calls.
    pub fn with_sampling(llm: Arc<dyn LlmClient>, fetcher: Arc<dyn PageFetcher>, sampling: Sampling) -> Self {
        let selector = LinkSelector::new(llm.clone()).with_sampling(sampling);
        Self {
            aggregator: ContentAggregator::new(fetcher, selector),
            composer: BrochureComposer::new(llm).with_sampling(sampling),
        }
    }

    pub fn with_pacing(mut self, pacing: std::time::Duration) -> Self {
        self.aggregator = self.aggregator.with_pacing(pacing);
        self
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.composer = self.composer.with_max_prompt_chars(max_prompt_chars);
        self
    }

    pub async fn run(&self, company_name: &str, url: &str, mode: DeliveryMode) -> Result<BrochureText> {
        let dossier = self.aggregator.aggregate(url).await?;
        self.composer.compose(company_name, &dossier, mode).await
    }
}
