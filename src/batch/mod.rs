//! Batch execution: one worker, prompts in order, failures isolated per prompt.

mod job;
mod progress;
mod runner;
mod writer;

pub use job::{parse_prompts, prompt_label, BatchJob};
pub use progress::{ProgressEvent, ProgressSink, DEFAULT_CAPACITY};
pub use runner::{BatchReport, BatchRunner, PromptOutcome, PromptStatus};
pub use writer::{output_file_name, prompt_stub, ResultWriter, SavedFile};
