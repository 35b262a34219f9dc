use std::sync::Arc;
use std::time::Duration;

use brochure_common::Result;
use brochure_web::PageFetcher;

use crate::dossier::AggregatedDossier;
use crate::selector::LinkSelector;

/// Pause before each secondary fetch.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Gathers the landing page and the pages the oracle selects from it.
pub struct ContentAggregator {
    fetcher: Arc<dyn PageFetcher>,
    selector: LinkSelector,
    pacing: Duration,
}

impl ContentAggregator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, selector: LinkSelector) -> Self {
        Self {
            fetcher,
            selector,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Fetches run one after another. Only a failed oracle call aborts;
    /// unreachable pages contribute empty sections.
    pub async fn aggregate(&self, url: &str) -> Result<AggregatedDossier> {
        let landing = self.fetcher.fetch(url).await;
        let landing_degraded = landing.is_degraded();
        let landing = landing.into_inner();

        let selection = self.selector.select(&landing.url, &landing.links).await?;
        let selection = selection.into_inner();
        tracing::info!(
            url,
            links = ?selection.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(),
            "aggregate.selected"
        );

        let mut dossier = AggregatedDossier::new(landing, landing_degraded);
        for link in selection {
            tokio::time::sleep(self.pacing).await;
            let page = self.fetcher.fetch(&link.url).await;
            let degraded = page.is_degraded();
            dossier.push(link.category, page.into_inner(), degraded);
        }

        tracing::info!(
            url,
            sections = dossier.sections.len() + 1,
            degraded = dossier.degraded_count(),
            "aggregate.done"
        );
        Ok(dossier)
    }
}
