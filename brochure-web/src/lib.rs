//! Page acquisition for the brochure pipeline.
//!
//! - [`fetcher`]: the [`PageFetcher`] seam and its HTTP implementation
//! - [`extract`]: title, visible text and link extraction (`scraper`)

pub mod extract;
pub mod fetcher;

pub use fetcher::{FetchedPage, HttpPageFetcher, PageFetcher};
