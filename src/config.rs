//! Credential resolution and run defaults.

use std::path::PathBuf;

/// Environment variable checked first for the API key.
pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Environment variable checked second for the API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Folder name used when no output directory is given.
pub const DEFAULT_OUTPUT_DIR: &str = "nano_banana_outputs";

/// Resolves the API key from an explicit value or the process environment.
///
/// First match wins: `explicit`, then `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
/// Blank values are treated as absent.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    resolve_api_key_with(explicit, |name| std::env::var(name).ok())
}

/// Same as [`resolve_api_key`] with a caller-supplied environment lookup.
pub fn resolve_api_key_with<F>(explicit: Option<&str>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |value: String| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    explicit
        .map(str::to_string)
        .and_then(non_blank)
        .or_else(|| lookup(GOOGLE_API_KEY_VAR).and_then(non_blank))
        .or_else(|| lookup(GEMINI_API_KEY_VAR).and_then(non_blank))
}

/// Resolves the output directory, falling back to `./nano_banana_outputs`.
pub fn resolve_output_dir(explicit: Option<&str>) -> PathBuf {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_OUTPUT_DIR),
    }
}
