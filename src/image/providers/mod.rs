//! Image generation providers.

#[cfg(feature = "gemini-image")]
mod gemini;

#[cfg(feature = "gemini-image")]
pub use gemini::{GeminiProvider, GeminiProviderBuilder, MODEL_ID};
