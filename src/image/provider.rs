//! Image provider trait and factory.

use crate::error::Result;
use crate::image::types::{GenerationResult, OutputConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for image generation providers.
///
/// One call to [`generate`](ImageProvider::generate) is one remote request. Implementations do
/// not retry and return no partial result on error.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates images for a single prompt.
    async fn generate(&self, prompt: &str, config: &OutputConfig) -> Result<GenerationResult>;

    /// Returns the model identifier used for requests.
    fn model(&self) -> &str;
}

/// Builds a provider once the run's credential is known.
pub trait ProviderFactory: Send + Sync + 'static {
    /// Creates a provider authenticated with `api_key`.
    fn connect(&self, api_key: &str) -> Result<Arc<dyn ImageProvider>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&str) -> Result<Arc<dyn ImageProvider>> + Send + Sync + 'static,
{
    fn connect(&self, api_key: &str) -> Result<Arc<dyn ImageProvider>> {
        self(api_key)
    }
}
