use brochure_web::FetchedPage;
use serde::Serialize;

/// One secondary page, labelled with the category the oracle gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DossierSection {
    pub category: String,
    pub page: FetchedPage,
    pub degraded: bool,
}

/// Landing page plus every selected page, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedDossier {
    pub landing: FetchedPage,
    pub landing_degraded: bool,
    pub sections: Vec<DossierSection>,
}

impl AggregatedDossier {
    pub fn new(landing: FetchedPage, landing_degraded: bool) -> Self {
        Self {
            landing,
            landing_degraded,
            sections: Vec::new(),
        }
    }

    pub fn push(&mut self, category: impl Into<String>, page: FetchedPage, degraded: bool) {
        self.sections.push(DossierSection {
            category: category.into(),
            page,
            degraded,
        });
    }

    /// Pages that could not be fetched and contributed an empty section.
    pub fn degraded_count(&self) -> usize {
        usize::from(self.landing_degraded) + self.sections.iter().filter(|s| s.degraded).count()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Landing page:\n");
        out.push_str(&self.landing.contents());
        for section in &self.sections {
            out.push_str("\n\n");
            out.push_str(&section.category);
            out.push('\n');
            out.push_str(&section.page.contents());
        }
        out
    }
}
