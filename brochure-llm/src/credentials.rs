//! Advisory API key format checks.
//!
//! These heuristics never block a call; a key that fails them is reported
//! and used anyway, and the real failure (if any) surfaces from the provider.

/// Prefix every OpenAI secret key starts with.
pub const OPENAI_KEY_PREFIX: &str = "sk-";
/// A plausible OpenAI key is strictly longer than this.
pub const OPENAI_KEY_MIN_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    LooksGood,
    Missing,
    Suspicious,
}

/// Check a key against a prefix and an exclusive minimum length.
pub fn check_key(key: Option<&str>, prefix: &str, min_len: usize) -> KeyCheck {
    match key.map(str::trim) {
        None | Some("") => KeyCheck::Missing,
        Some(k) if k.starts_with(prefix) && k.chars().count() > min_len => KeyCheck::LooksGood,
        Some(_) => KeyCheck::Suspicious,
    }
}

pub fn check_openai_key(key: Option<&str>) -> KeyCheck {
    check_key(key, OPENAI_KEY_PREFIX, OPENAI_KEY_MIN_LEN)
}

/// Log the outcome of [`check_openai_key`] and hand it back.
pub fn report_openai_key(key: Option<&str>) -> KeyCheck {
    let check = check_openai_key(key);
    match check {
        KeyCheck::LooksGood => tracing::info!("API key looks good so far"),
        KeyCheck::Missing => tracing::warn!("No OpenAI API key found; set OPENAI_API_KEY"),
        KeyCheck::Suspicious => tracing::warn!(
            "There might be a problem with your API key. Please check your OpenAI API key format."
        ),
    }
    check
}

/// First `n` characters of a key, for "exists and begins ..." diagnostics.
pub fn key_preview(key: &str, n: usize) -> String {
    key.chars().take(n).collect()
}
