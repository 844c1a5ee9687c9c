//! Batch generation example.
//!
//! Run with: `cargo run --example generate_batch`
//!
//! Requires `GOOGLE_API_KEY` or `GEMINI_API_KEY` environment variable.

use nanobatch::config::resolve_api_key;
use nanobatch::{
    AspectRatio, BatchJob, BatchRunner, GeminiProviderBuilder, OutputConfig, ProgressEvent,
    ProgressSink, Resolution,
};

#[tokio::main]
async fn main() {
    let (sink, mut events) = ProgressSink::channel(64);
    let runner = BatchRunner::new(GeminiProviderBuilder::new(), sink);

    let mut job = BatchJob::from_text(
        "A golden retriever puppy playing in snow\n\
         A lighthouse on a cliff at dusk, oil painting",
    )
    .with_config(OutputConfig::new(AspectRatio::Landscape16x9, Resolution::OneK))
    .with_output_dir("demo_outputs");
    job.api_key = resolve_api_key(None);

    let Some(handle) = runner.start(job) else {
        return;
    };

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Log(line) => println!("{line}"),
            ProgressEvent::Finished => break,
            ProgressEvent::Started => {}
        }
    }

    match handle.await {
        Ok(report) => println!("Saved {} image(s)", report.saved_count()),
        Err(e) => eprintln!("worker failed: {e}"),
    }
}
