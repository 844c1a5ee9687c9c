//! CLI for nanobatch - batch image generation with Gemini.

use clap::{Args, Parser, Subcommand, ValueEnum};
use nanobatch::batch::{parse_prompts, BatchJob, BatchRunner, ProgressEvent, ProgressSink};
use nanobatch::config::{
    resolve_api_key, resolve_output_dir, DEFAULT_OUTPUT_DIR, GEMINI_API_KEY_VAR,
    GOOGLE_API_KEY_VAR,
};
use nanobatch::image::{AspectRatio, OutputConfig, Resolution};
use nanobatch::{GeminiProviderBuilder, MODEL_ID};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nanobatch")]
#[command(about = "Generate images for a batch of prompts via Gemini (Nano Banana Pro)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images for each prompt, one after another
    Generate(GenerateArgs),

    /// List the model and the accepted settings
    Options,
}

#[derive(Args)]
struct GenerateArgs {
    /// Prompts; each line of each argument is one prompt
    prompts: Vec<String>,

    /// File with one prompt per line ("-" reads stdin)
    #[arg(short = 'f', long)]
    prompts_file: Option<PathBuf>,

    /// API key (blank uses GOOGLE_API_KEY / GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Aspect ratio of every image
    #[arg(long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Resolution tier of every image
    #[arg(long, value_enum, default_value = "1K")]
    resolution: ResolutionArg,

    /// Output folder (created if missing)
    #[arg(short, long)]
    output_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "2:3")]
    Portrait2x3,
    #[value(name = "3:2")]
    Landscape3x2,
    #[value(name = "3:4")]
    Portrait3x4,
    #[value(name = "4:3")]
    Landscape4x3,
    #[value(name = "4:5")]
    Portrait4x5,
    #[value(name = "5:4")]
    Landscape5x4,
    #[value(name = "9:16")]
    Portrait9x16,
    #[value(name = "16:9")]
    Landscape16x9,
    #[value(name = "21:9")]
    Ultrawide,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Portrait2x3 => AspectRatio::Portrait2x3,
            AspectRatioArg::Landscape3x2 => AspectRatio::Landscape3x2,
            AspectRatioArg::Portrait3x4 => AspectRatio::Portrait3x4,
            AspectRatioArg::Landscape4x3 => AspectRatio::Landscape4x3,
            AspectRatioArg::Portrait4x5 => AspectRatio::Portrait4x5,
            AspectRatioArg::Landscape5x4 => AspectRatio::Landscape5x4,
            AspectRatioArg::Portrait9x16 => AspectRatio::Portrait9x16,
            AspectRatioArg::Landscape16x9 => AspectRatio::Landscape16x9,
            AspectRatioArg::Ultrawide => AspectRatio::Ultrawide,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResolutionArg {
    #[value(name = "1K")]
    OneK,
    #[value(name = "2K")]
    TwoK,
    #[value(name = "4K")]
    FourK,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::OneK => Resolution::OneK,
            ResolutionArg::TwoK => Resolution::TwoK,
            ResolutionArg::FourK => Resolution::FourK,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            generate(args, cli.json).await?;
        }
        Commands::Options => {
            list_options(cli.json)?;
        }
    }

    Ok(())
}

async fn read_prompts(args: &GenerateArgs) -> anyhow::Result<Vec<String>> {
    let mut prompts: Vec<String> = args.prompts.iter().flat_map(|p| parse_prompts(p)).collect();

    if let Some(ref path) = args.prompts_file {
        let text = if path.as_os_str() == "-" {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        } else {
            tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow::anyhow!("failed to read prompts file {}: {e}", path.display())
            })?
        };
        prompts.extend(parse_prompts(&text));
    }

    Ok(prompts)
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let prompts = read_prompts(&args).await?;

    let mut job = BatchJob::new(prompts)
        .with_config(OutputConfig::new(
            args.aspect_ratio.into(),
            args.resolution.into(),
        ))
        .with_output_dir(resolve_output_dir(args.output_dir.as_deref()));
    job.api_key = resolve_api_key(args.api_key.as_deref());

    let (sink, mut events) = ProgressSink::channel(nanobatch::batch::DEFAULT_CAPACITY);
    let runner = BatchRunner::new(GeminiProviderBuilder::new(), sink);
    let handle = runner
        .start(job)
        .ok_or_else(|| anyhow::anyhow!("a batch is already running"))?;

    // The log goes to stdout unless stdout carries the JSON report.
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Started => {}
            ProgressEvent::Log(line) if json_output => eprintln!("{line}"),
            ProgressEvent::Log(line) => println!("{line}"),
            ProgressEvent::Finished => break,
        }
    }

    let report = handle.await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !report.is_rejected() {
        println!(
            "Done: {} image(s) saved, {} prompt(s) failed",
            report.saved_count(),
            report.failed_count()
        );
    }

    Ok(())
}

fn list_options(json_output: bool) -> anyhow::Result<()> {
    let aspect_ratios: Vec<&str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
    let resolutions: Vec<&str> = Resolution::ALL.iter().map(|r| r.as_str()).collect();

    if json_output {
        let options = serde_json::json!({
            "model": MODEL_ID,
            "aspect_ratios": aspect_ratios,
            "resolutions": resolutions,
            "api_key_env": [GOOGLE_API_KEY_VAR, GEMINI_API_KEY_VAR],
            "default_output_dir": DEFAULT_OUTPUT_DIR,
        });
        println!("{}", serde_json::to_string_pretty(&options)?);
    } else {
        println!("Model: {MODEL_ID}");
        println!("Aspect ratios: {}", aspect_ratios.join(", "));
        println!("Resolutions: {}", resolutions.join(", "));
        println!("API key: --api-key, {GOOGLE_API_KEY_VAR} or {GEMINI_API_KEY_VAR}");
        println!("Default output folder: ./{DEFAULT_OUTPUT_DIR}");
    }

    Ok(())
}
