use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use slidecast_core::{
    ElevenLabsProvider, Pipeline, PipelineConfig, ProfileKind, Quality, RenderRequest, Script,
    SlidecastError, SpeechProvider, SystemRunner, Theme, cancel_pair, format_outcome, format_plan,
};
use tokio::{io::AsyncReadExt, sync::mpsc};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::format_duration;

mod progress;

/// CLI wrapper for Theme (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliTheme {
    #[default]
    Dark,
    Light,
}

impl From<CliTheme> for Theme {
    fn from(cli: CliTheme) -> Self {
        match cli {
            CliTheme::Dark => Theme::Dark,
            CliTheme::Light => Theme::Light,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl From<CliQuality> for Quality {
    fn from(cli: CliQuality) -> Self {
        match cli {
            CliQuality::Low => Quality::Low,
            CliQuality::Medium => Quality::Medium,
            CliQuality::High => Quality::High,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliProfile {
    Podcast,
    Educational,
    Marketing,
    Meditation,
    #[default]
    Narration,
}

impl From<CliProfile> for ProfileKind {
    fn from(cli: CliProfile) -> Self {
        match cli {
            CliProfile::Podcast => ProfileKind::Podcast,
            CliProfile::Educational => ProfileKind::Educational,
            CliProfile::Marketing => ProfileKind::Marketing,
            CliProfile::Meditation => ProfileKind::Meditation,
            CliProfile::Narration => ProfileKind::Narration,
        }
    }
}

#[derive(Parser)]
#[command(name = "slidecast", version)]
#[command(about = "Turn a narration script or markdown outline into a narrated 1080p slide video")]
struct Cli {
    /// Script file, literal script text, or "-" for stdin
    #[arg(short, long)]
    script: String,

    /// Deck title, used when the script has no heading of its own
    #[arg(short, long)]
    title: Option<String>,

    #[arg(long, value_enum, default_value = "dark")]
    theme: CliTheme,

    #[arg(short, long, value_enum, default_value = "high")]
    quality: CliQuality,

    /// Upper bound on the number of slides (1-7)
    #[arg(long)]
    max_slides: Option<usize>,

    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// TTS voice profile
    #[arg(short, long, value_enum, default_value = "narration")]
    profile: CliProfile,

    /// Fixed duration for one slide as INDEX=MS (zero-based index); repeatable
    #[arg(long = "slide-duration", value_name = "INDEX=MS", value_parser = parse_slide_duration)]
    slide_durations: Vec<(usize, u64)>,

    /// SRT file muxed into the MP4 as a soft subtitle track
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Root for per-script working directories
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Re-render frames and narration even if cached
    #[arg(short, long)]
    force: bool,

    /// Delete the working directory when the job ends, whatever the outcome
    #[arg(long)]
    purge: bool,

    /// Print the slide plan without rendering anything
    #[arg(long)]
    dry_run: bool,

    /// Print machine-readable JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// Run the browser without its sandbox (needed in most containers)
    #[arg(long)]
    no_sandbox: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_slide_duration(value: &str) -> std::result::Result<(usize, u64), String> {
    let (index, ms) = value
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=MS, got '{value}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("invalid slide index '{index}'"))?;
    let ms = ms
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{ms}' (milliseconds)"))?;
    Ok((index, ms))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn read_script(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read script from stdin")?;
        return Ok(text);
    }
    let path = Path::new(arg);
    if path.is_file() {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read script {}", path.display()));
    }
    Ok(arg.to_string())
}

fn build_request(cli: &Cli, text: String) -> RenderRequest {
    let mut script = Script::new(text);
    if let Some(title) = &cli.title {
        script = script.with_title(title);
    }
    for &(index, ms) in &cli.slide_durations {
        script = script.with_duration_hint(index, ms);
    }

    let mut request = RenderRequest::new(script, &cli.output);
    request.theme = cli.theme.into();
    request.quality = cli.quality.into();
    request.max_slides = cli.max_slides;
    request.profile = cli.profile.into();
    request.captions = cli.captions.clone();
    request
}

fn build_config(cli: &Cli) -> PipelineConfig {
    let mut config = PipelineConfig::from_env();
    if let Some(dir) = &cli.work_dir {
        config = config.with_work_root(dir);
    }
    config.force = cli.force;
    config.purge = cli.purge;
    config.browser_sandbox = !cli.no_sandbox;
    config
}

async fn run(cli: Cli) -> Result<()> {
    let text = read_script(&cli.script).await?;
    let request = build_request(&cli, text);

    let specs = Pipeline::plan(&request)?;
    if cli.dry_run {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&specs)?);
        } else {
            print!("{}", format_plan(&specs));
        }
        return Ok(());
    }

    let provider: Arc<dyn SpeechProvider> = Arc::new(ElevenLabsProvider::from_env()?);
    let config = build_config(&cli);
    debug!(work_root = %config.work_root.display(), "starting render");

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = Arc::new(SystemRunner::with_grace(config.timeouts.grace));
    let pipeline = Pipeline::new(config, runner, Some(provider));
    let pipeline = if cli.json {
        drop(tx);
        pipeline
    } else {
        println!(
            "\n{}  {}\n",
            style("slidecast").cyan().bold(),
            style(format!("{} slides", specs.len())).dim()
        );
        pipeline.with_events(tx)
    };
    let view = progress::spawn(rx);

    let started = Instant::now();
    let result = pipeline.render(&request, &cancel).await;
    drop(pipeline);
    let _ = view.await;
    let outcome = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.manifest)?);
        return Ok(());
    }

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(started.elapsed())).cyan().bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_outcome(&outcome));
    Ok(())
}

/// Pipeline errors carry their own exit code; anything else is a bad argument.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SlidecastError>()
        .map(SlidecastError::exit_code)
        .unwrap_or(2)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}
