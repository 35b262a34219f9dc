//! The `brochure` command-line application.
//!
//! `brochure` (the default command) fetches a company website, lets the
//! configured model choose the relevant pages and prints a markdown
//! brochure. `explain` and `joke` are small demos of the same clients.

pub mod cli;
pub mod commands;
pub mod output;

use anyhow::Result;
use brochure_config::{BrochureConfigLoader, BrochureSettings, DEFAULT_CONFIG_FILE};
use std::path::Path;

/// An explicit path must exist; otherwise `brochure.yaml` is optional.
pub fn load_settings(path: Option<&Path>) -> Result<BrochureSettings> {
    let loader = match path {
        Some(path) => BrochureConfigLoader::new().with_file(path),
        None => BrochureConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    Ok(loader.load()?)
}
