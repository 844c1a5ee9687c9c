//! Error types for batch image generation.

use std::time::Duration;

/// Maximum length of provider error text kept in messages.
const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Errors that can occur while generating or saving images.
#[derive(Debug, thiserror::Error)]
pub enum NanoBatchError {
    /// The batch contained no non-blank prompt.
    #[error("Add at least one prompt (one per line).")]
    NoPrompts,

    /// No credential was supplied or found in the environment.
    #[error("Missing API key. Set GEMINI_API_KEY or enter a key above.")]
    MissingApiKey,

    /// API key rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled for the key's project.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Failed to transcode image data to PNG.
    #[error("image encoding failed: {0}")]
    Encode(#[from] ::image::ImageError),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for batch generation operations.
pub type Result<T> = std::result::Result<T, NanoBatchError>;

/// Reads a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Strips API keys from provider error text and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            if let Some(pos) = word.find("key=") {
                format!("{}key=[REDACTED]", &word[..pos])
            } else if word.starts_with("AIza") && word.len() > 30 {
                "[REDACTED]".to_string()
            } else {
                word.to_string()
            }
        })
        .collect();
    truncate_chars(&redacted.join(" "), MAX_ERROR_MESSAGE_LEN)
}

/// Truncates to `max` characters, appending `...` when anything was cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
