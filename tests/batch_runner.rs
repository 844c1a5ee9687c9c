//! End-to-end runs of `BatchRunner` against a scripted in-memory provider.

use async_trait::async_trait;
use nanobatch::batch::{BatchJob, BatchRunner, ProgressEvent, ProgressSink, PromptStatus};
use nanobatch::image::{GenerationResult, ImageProvider, OutputConfig, ResponsePart};
use nanobatch::NanoBatchError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 7];

type Respond = dyn Fn(usize, &str) -> nanobatch::Result<GenerationResult> + Send + Sync;

/// Provider that records every prompt and answers from a closure.
struct ScriptedProvider {
    calls: Mutex<Vec<String>>,
    respond: Box<Respond>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedProvider {
    fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(usize, &str) -> nanobatch::Result<GenerationResult> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            gate: None,
        })
    }

    fn gated<F>(gate: Arc<Semaphore>, respond: F) -> Arc<Self>
    where
        F: Fn(usize, &str) -> nanobatch::Result<GenerationResult> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            gate: Some(gate),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &str,
        _config: &OutputConfig,
    ) -> nanobatch::Result<GenerationResult> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(prompt.to_string());
            calls.len()
        };
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        (self.respond)(call, prompt)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn image_result() -> GenerationResult {
    GenerationResult::new(vec![ResponsePart::Image {
        mime_type: "image/png".into(),
        data: PNG_BYTES.to_vec(),
    }])
}

fn runner_for(
    provider: &Arc<ScriptedProvider>,
) -> (BatchRunner, mpsc::Receiver<ProgressEvent>, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let (sink, rx) = ProgressSink::channel(256);
    let provider = Arc::clone(provider);
    let counter = Arc::clone(&connects);
    let factory = move |_api_key: &str| -> nanobatch::Result<Arc<dyn ImageProvider>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(provider.clone() as Arc<dyn ImageProvider>)
    };
    (BatchRunner::new(factory, sink), rx, connects)
}

fn job(prompts: &[&str], dir: &Path) -> BatchJob {
    BatchJob::new(prompts.iter().copied())
        .with_output_dir(dir)
        .with_api_key("test-key")
}

fn drain(rx: &mut mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn log_lines(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|call, _| {
        if call == 2 {
            Err(NanoBatchError::Api {
                status: 500,
                message: "upstream exploded".into(),
            })
        } else {
            Ok(image_result())
        }
    });
    let (runner, mut rx, _) = runner_for(&provider);

    let report = runner
        .start(job(&["first cat", "second cat", "third cat"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(provider.calls(), vec!["first cat", "second cat", "third cat"]);
    assert!(!runner.is_running());

    let indexes: Vec<usize> = report.saved_files().map(|f| f.index).collect();
    assert_eq!(indexes, vec![1, 3]);
    assert_eq!(report.failed_count(), 1);
    assert!(dir.path().join("01_first_cat_1.png").is_file());
    assert!(!dir.path().join("02_second_cat_1.png").exists());
    assert!(dir.path().join("03_third_cat_1.png").is_file());

    let logs = log_lines(&drain(&mut rx));
    assert!(logs.contains(&"  Error: API error: 500 - upstream exploded".to_string()));
    assert!(logs.contains(&"[3/3] third cat".to_string()));
}

#[tokio::test]
async fn test_start_while_running_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let provider = ScriptedProvider::gated(Arc::clone(&gate), |_, _| Ok(image_result()));
    let (runner, _rx, connects) = runner_for(&provider);

    let handle = runner.start(job(&["one", "two"], dir.path())).unwrap();
    assert!(runner.is_running());

    assert!(runner.start(job(&["intruder"], dir.path())).is_none());

    gate.add_permits(2);
    let report = handle.await.unwrap();

    assert_eq!(provider.calls(), vec!["one", "two"]);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes.len(), 2);
    assert!(!runner.is_running());

    // Idle again: a new run is accepted.
    gate.add_permits(1);
    let report = runner
        .start(job(&["three"], dir.path()))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(report.saved_count(), 1);
}

#[tokio::test]
async fn test_blank_prompts_make_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|_, _| Ok(image_result()));
    let (runner, mut rx, connects) = runner_for(&provider);

    let report = runner
        .start(job(&["", "   ", "\t"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert!(provider.calls().is_empty());
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert!(report.is_rejected());
    assert_eq!(
        log_lines(&drain(&mut rx)),
        vec!["Add at least one prompt (one per line).".to_string()]
    );
    assert!(!runner.is_running());
}

#[tokio::test]
async fn test_missing_api_key_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|_, _| Ok(image_result()));
    let (runner, mut rx, connects) = runner_for(&provider);

    let job = BatchJob::new(["a cat"]).with_output_dir(dir.path());
    let report = runner.start(job).unwrap().await.unwrap();

    assert!(provider.calls().is_empty());
    assert_eq!(connects.load(Ordering::SeqCst), 0);
    assert_eq!(
        report.rejected.as_deref(),
        Some("Missing API key. Set GEMINI_API_KEY or enter a key above.")
    );
    assert_eq!(log_lines(&drain(&mut rx)).len(), 1);
}

#[tokio::test]
async fn test_text_only_response_logs_fallback_text() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|_, _| {
        Ok(GenerationResult::new(vec![ResponsePart::Text(
            "blocked by policy".into(),
        )]))
    });
    let (runner, mut rx, _) = runner_for(&provider);

    let report = runner
        .start(job(&["something"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.saved_count(), 0);
    assert_eq!(report.failed_count(), 0);
    assert!(matches!(
        &report.outcomes[0].status,
        PromptStatus::Empty { text: Some(t), .. } if t == "blocked by policy"
    ));
    let logs = log_lines(&drain(&mut rx));
    assert!(logs
        .iter()
        .any(|l| l == "  No image returned. Text response: blocked by policy"));
}

#[tokio::test]
async fn test_empty_response_logs_generic_notice() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|call, _| {
        if call == 1 {
            Ok(GenerationResult::default())
        } else {
            Ok(GenerationResult::default().with_finish_reason("IMAGE_SAFETY"))
        }
    });
    let (runner, mut rx, _) = runner_for(&provider);

    runner
        .start(job(&["a", "b"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    let logs = log_lines(&drain(&mut rx));
    assert_eq!(
        logs,
        vec![
            "[1/2] a".to_string(),
            "  No image returned.".to_string(),
            "[2/2] b".to_string(),
            "  No image returned (finish reason: IMAGE_SAFETY).".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_file_names_use_prompt_and_part_position() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|call, _| {
        if call == 7 {
            Ok(GenerationResult::new(vec![
                ResponsePart::Text("here is your cat".into()),
                ResponsePart::Image {
                    mime_type: "image/png".into(),
                    data: PNG_BYTES.to_vec(),
                },
            ]))
        } else {
            Ok(GenerationResult::default())
        }
    });
    let (runner, _rx, _) = runner_for(&provider);

    let prompts = ["p1", "p2", "p3", "p4", "p5", "p6", "cat"];
    let report = runner
        .start(job(&prompts, dir.path()))
        .unwrap()
        .await
        .unwrap();

    let files: Vec<_> = report.saved_files().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, dir.path().join("07_cat_2.png"));
    assert_eq!(std::fs::read(&files[0].path).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_events_bracket_the_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|_, _| Ok(image_result()));
    let (runner, mut rx, _) = runner_for(&provider);

    let long_prompt = "x".repeat(100);
    runner
        .start(job(&[long_prompt.as_str(), "dog"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&ProgressEvent::Started));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished));

    let logs = log_lines(&events);
    assert_eq!(logs[0], format!("[1/2] {}...", "x".repeat(80)));
    assert!(logs[1].starts_with("  Saved "));
    assert_eq!(logs[2], "[2/2] dog");
    assert!(logs[3].ends_with("02_dog_1.png"));
}

#[tokio::test]
async fn test_output_dir_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("runs").join("today");
    let provider = ScriptedProvider::new(|_, _| Ok(image_result()));
    let (runner, _rx, _) = runner_for(&provider);

    let report = runner
        .start(job(&["bird"], &nested))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.saved_count(), 1);
    assert!(nested.join("01_bird_1.png").is_file());
}

#[tokio::test]
async fn test_connect_failure_rejects_run() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ProgressSink::channel(16);
    let factory = |_: &str| -> nanobatch::Result<Arc<dyn ImageProvider>> {
        Err(NanoBatchError::Auth("nope".into()))
    };
    let runner = BatchRunner::new(factory, sink);

    let report = runner
        .start(job(&["a"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert!(report.is_rejected());
    assert_eq!(
        log_lines(&drain(&mut rx)),
        vec!["Could not create client: authentication failed: nope".to_string()]
    );
}

#[tokio::test]
async fn test_panicking_worker_releases_running_flag() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|call, _| {
        if call == 1 {
            panic!("provider bug");
        }
        Ok(image_result())
    });
    let (runner, mut rx, _) = runner_for(&provider);

    let outcome = runner.start(job(&["boom"], dir.path())).unwrap().await;
    assert!(outcome.unwrap_err().is_panic());
    assert!(!runner.is_running());

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ProgressEvent::Started,
            ProgressEvent::Log("[1/1] boom".into()),
            ProgressEvent::Finished,
        ]
    );

    let report = runner
        .start(job(&["fine"], dir.path()))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(report.saved_count(), 1);
}

#[tokio::test]
async fn test_write_failure_fails_only_that_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("01_a_1.png")).unwrap();
    let provider = ScriptedProvider::new(|_, _| Ok(image_result()));
    let (runner, mut rx, _) = runner_for(&provider);

    let report = runner
        .start(job(&["a", "b"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(provider.calls(), vec!["a", "b"]);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.saved_count(), 1);
    assert!(matches!(
        &report.outcomes[0].status,
        PromptStatus::Failed { error } if error.starts_with("I/O error")
    ));
    assert!(dir.path().join("02_b_1.png").is_file());

    let logs = log_lines(&drain(&mut rx));
    assert_eq!(logs.len(), 4);
    assert!(logs[1].starts_with("  Error: I/O error"));
    assert_eq!(logs[2], "[2/2] b");
    assert!(logs[3].ends_with("02_b_1.png"));
}

#[tokio::test]
async fn test_undecodable_image_fails_only_that_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(|call, _| {
        if call == 1 {
            Ok(GenerationResult::new(vec![ResponsePart::Image {
                mime_type: "image/jpeg".into(),
                data: b"definitely not a jpeg payload".to_vec(),
            }]))
        } else {
            Ok(image_result())
        }
    });
    let (runner, mut rx, _) = runner_for(&provider);

    let report = runner
        .start(job(&["broken", "fine"], dir.path()))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.saved_count(), 1);
    assert!(!dir.path().join("01_broken_1.png").exists());
    assert!(dir.path().join("02_fine_1.png").is_file());

    let logs = log_lines(&drain(&mut rx));
    assert!(logs[1].starts_with("  Error: image encoding failed"));
    assert_eq!(logs[2], "[2/2] fine");
}
