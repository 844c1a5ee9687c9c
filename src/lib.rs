#![warn(missing_docs)]
//! nanobatch - batch image generation with Gemini.
//!
//! Submit a list of prompts, get numbered PNG files back. Prompts run one at a time on a single
//! background worker; a failing prompt is logged and skipped, never aborting the run.
//!
//! # Quick Start
//!
//! ```no_run
//! use nanobatch::{BatchJob, BatchRunner, GeminiProviderBuilder, ProgressEvent, ProgressSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, mut events) = ProgressSink::channel(64);
//!     let runner = BatchRunner::new(GeminiProviderBuilder::new(), sink);
//!
//!     let job = BatchJob::from_text("a golden retriever puppy\na red fox in snow")
//!         .with_api_key(std::env::var("GEMINI_API_KEY").unwrap_or_default())
//!         .with_output_dir("out");
//!     let handle = runner.start(job).expect("runner is idle");
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ProgressEvent::Log(line) => println!("{line}"),
//!             ProgressEvent::Finished => break,
//!             ProgressEvent::Started => {}
//!         }
//!     }
//!     let report = handle.await.expect("worker panicked");
//!     println!("{} file(s) saved", report.saved_count());
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini provider (`gemini-3-pro-image-preview`)
//! - `cli`: the `nanobatch` command-line front end

pub mod batch;
pub mod config;
mod error;
pub mod image;

// Re-export error types at crate root
pub use error::{NanoBatchError, Result};

pub use batch::{
    BatchJob, BatchReport, BatchRunner, ProgressEvent, ProgressSink, PromptOutcome, PromptStatus,
    ResultWriter, SavedFile,
};
pub use crate::image::{
    AspectRatio, GenerationResult, ImageProvider, OutputConfig, ProviderFactory, Resolution,
    ResponsePart,
};

#[cfg(feature = "gemini-image")]
pub use crate::image::providers::{GeminiProvider, GeminiProviderBuilder, MODEL_ID};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::batch::{BatchJob, BatchReport, BatchRunner, ProgressEvent, ProgressSink};
    pub use crate::error::{NanoBatchError, Result};
    pub use crate::image::{AspectRatio, ImageProvider, OutputConfig, Resolution};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
