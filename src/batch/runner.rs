//! Sequential batch worker.

use crate::batch::job::{prompt_label, BatchJob};
use crate::batch::progress::{ProgressEvent, ProgressSink};
use crate::batch::writer::{ResultWriter, SavedFile};
use crate::error::{sanitize_error_message, NanoBatchError};
use crate::image::{ImageProvider, OutputConfig, ProviderFactory};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromptStatus {
    /// At least one image was written.
    Saved {
        /// Files written, in part order.
        files: Vec<SavedFile>,
    },
    /// The call succeeded but returned no image.
    Empty {
        /// Text the model returned instead.
        text: Option<String>,
        /// Finish reason reported by the service.
        finish_reason: Option<String>,
    },
    /// The call or the write failed.
    Failed {
        /// Sanitized error text, as logged.
        error: String,
    },
}

/// Outcome of one prompt of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptOutcome {
    /// 1-based position in the batch.
    pub index: usize,
    /// The prompt as sent.
    pub prompt: String,
    /// What happened.
    #[serde(flatten)]
    pub status: PromptStatus,
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// One entry per prompt, in prompt order.
    pub outcomes: Vec<PromptOutcome>,
    /// Set when the run was rejected before any request was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

impl BatchReport {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            outcomes: Vec::new(),
            rejected: Some(reason.into()),
        }
    }

    /// Returns true if the run never reached the prompt loop.
    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }

    /// All files written during the run.
    pub fn saved_files(&self) -> impl Iterator<Item = &SavedFile> {
        self.outcomes.iter().flat_map(|o| match &o.status {
            PromptStatus::Saved { files } => files.as_slice(),
            _ => &[][..],
        })
    }

    /// Number of files written during the run.
    pub fn saved_count(&self) -> usize {
        self.saved_files().count()
    }

    /// Number of prompts whose call or write failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PromptStatus::Failed { .. }))
            .count()
    }
}

/// Owns the single background worker and the `running` flag.
///
/// At most one run is active at a time. [`start`](BatchRunner::start) never blocks and never
/// queues; calling it during a run does nothing.
pub struct BatchRunner {
    factory: Arc<dyn ProviderFactory>,
    progress: ProgressSink,
    running: Arc<AtomicBool>,
}

impl BatchRunner {
    /// Creates an idle runner.
    pub fn new(factory: impl ProviderFactory, progress: ProgressSink) -> Self {
        Self {
            factory: Arc::new(factory),
            progress,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true while a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Launches a run for `job` and returns its handle, or `None` if a run is already active.
    ///
    /// Must be called from within a Tokio runtime. Errors never surface here: they are written
    /// to the progress log and recorded in the returned [`BatchReport`].
    pub fn start(&self, job: BatchJob) -> Option<JoinHandle<BatchReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("batch already running; start ignored");
            return None;
        }

        let guard = RunGuard(Arc::clone(&self.running));
        let factory = Arc::clone(&self.factory);
        let progress = self.progress.clone();

        Some(tokio::spawn(async move {
            progress.emit(ProgressEvent::Started).await;
            let worker = tokio::spawn({
                let progress = progress.clone();
                async move { run_batch(factory.as_ref(), &progress, job).await }
            });
            let outcome = worker.await;

            drop(guard);
            progress.emit(ProgressEvent::Finished).await;

            match outcome {
                Ok(report) => report,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    tracing::warn!(error = %e, "batch worker cancelled");
                    BatchReport::rejected(format!("Batch stopped: {e}"))
                }
            }
        }))
    }
}

/// Clears the `running` flag when the run ends, including when its handle is aborted.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn run_batch(
    factory: &dyn ProviderFactory,
    progress: &ProgressSink,
    job: BatchJob,
) -> BatchReport {
    let prompts = job.normalized_prompts();
    if prompts.is_empty() {
        return reject(progress, NanoBatchError::NoPrompts.to_string()).await;
    }

    let Some(api_key) = job.credential() else {
        return reject(progress, NanoBatchError::MissingApiKey.to_string()).await;
    };

    let provider = match factory.connect(api_key) {
        Ok(provider) => provider,
        Err(e) => {
            let message = sanitize_error_message(&e.to_string());
            return reject(progress, format!("Could not create client: {message}")).await;
        }
    };

    let writer = ResultWriter::new(&job.output_dir, progress.clone());
    if let Err(e) = writer.ensure_output_dir().await {
        let message = format!(
            "Could not create output folder {}: {e}",
            writer.output_dir().display()
        );
        return reject(progress, message).await;
    }

    let total = prompts.len();
    tracing::info!(
        total,
        model = provider.model(),
        output_dir = %writer.output_dir().display(),
        "starting batch"
    );

    let mut outcomes = Vec::with_capacity(total);
    for (index, prompt) in (1..).zip(prompts) {
        progress
            .log(format!("[{index}/{total}] {}", prompt_label(&prompt)))
            .await;
        let status =
            run_prompt(provider.as_ref(), &writer, progress, &job.config, index, &prompt).await;
        outcomes.push(PromptOutcome {
            index,
            prompt,
            status,
        });
    }

    let report = BatchReport {
        outcomes,
        rejected: None,
    };
    tracing::info!(
        saved = report.saved_count(),
        failed = report.failed_count(),
        "batch finished"
    );
    report
}

async fn run_prompt(
    provider: &dyn ImageProvider,
    writer: &ResultWriter,
    progress: &ProgressSink,
    config: &OutputConfig,
    index: usize,
    prompt: &str,
) -> PromptStatus {
    let result = match provider.generate(prompt, config).await {
        Ok(result) => result,
        Err(e) => return fail(progress, index, e).await,
    };

    let files = match writer.save(&result, index, prompt).await {
        Ok(files) => files,
        Err(e) => return fail(progress, index, e).await,
    };
    if !files.is_empty() {
        return PromptStatus::Saved { files };
    }

    let text = result.text();
    let finish_reason = result.finish_reason;
    let message = match (&text, finish_reason.as_deref()) {
        (Some(text), _) => format!("  No image returned. Text response: {text}"),
        (None, Some(reason)) if reason != "STOP" => {
            format!("  No image returned (finish reason: {reason}).")
        }
        (None, _) => "  No image returned.".to_string(),
    };
    progress.log(message).await;

    PromptStatus::Empty {
        text,
        finish_reason,
    }
}

async fn fail(progress: &ProgressSink, index: usize, error: NanoBatchError) -> PromptStatus {
    tracing::warn!(index, error = %error, "prompt failed");
    let error = sanitize_error_message(&error.to_string());
    progress.log(format!("  Error: {error}")).await;
    PromptStatus::Failed { error }
}

async fn reject(progress: &ProgressSink, message: String) -> BatchReport {
    tracing::warn!(reason = %message, "batch rejected");
    progress.log(message.clone()).await;
    BatchReport::rejected(message)
}
