//! Headless production CLI
//!
//! Runs one product image through the full workflow against a live backend
//! and writes the approved images (and optionally their videos) to disk.
//!
//! Usage:
//!   studio --image mic.png --endpoint https://.../gemini-service [OPTIONS]

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use contentstudio::media::media_type_for_extension;
use contentstudio::{
    AspectRatio, FlowMode, GatewayConfig, HttpGateway, ImageStatus, UploadedFile, Workflow,
    WorkflowConfig, WorkflowPhase, WorkflowSnapshot,
};

#[derive(Parser)]
#[command(
    name = "studio",
    about = "Generate product photos and videos from a single product image",
    version
)]
struct Args {
    /// Product image to analyze
    #[arg(short = 'i', long)]
    image: PathBuf,

    /// Flow: "video" (script approval + videos) or "photos"
    #[arg(short = 'm', long, default_value = "video")]
    mode: FlowMode,

    /// Number of scenes to plan
    #[arg(short = 'n', long, default_value_t = contentstudio::workflow::DEFAULT_SCENE_COUNT)]
    count: u32,

    /// Output aspect ratio (1:1, 9:16, 16:9)
    #[arg(short = 'a', long, default_value = "9:16")]
    aspect: AspectRatio,

    /// Backend function URL (or set STUDIO_ENDPOINT env var)
    #[arg(short = 'e', long, env = "STUDIO_ENDPOINT")]
    endpoint: Option<String>,

    /// Backend API key (or set STUDIO_API_KEY env var)
    #[arg(short = 'k', long, env = "STUDIO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Read gateway settings from a JSON file instead
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Video poll interval in seconds
    #[arg(long, env = "STUDIO_POLL_SECS", default_value_t = 10)]
    poll_secs: u64,

    /// Approve images the reviewer rejected as well
    #[arg(long)]
    approve_all: bool,

    /// Retry failed images up to this many times
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Animate every approved image
    #[arg(long)]
    videos: bool,

    /// Output directory
    #[arg(short = 'o', long, default_value = "studio-out")]
    out: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("contentstudio={level},studio={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn gateway_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    if let Some(path) = &args.config {
        return GatewayConfig::load(path).context("loading gateway config");
    }
    let Some(endpoint) = &args.endpoint else {
        bail!("Backend endpoint is required. Use --endpoint, --config or set STUDIO_ENDPOINT.");
    };
    let mut config = GatewayConfig::new(endpoint.clone());
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(config)
}

fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let Some(media_type) = media_type_for_extension(ext) else {
        bail!("Unsupported file type: {}", path.display());
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(UploadedFile::new(bytes, media_type))
}

/// Fails the run when the workflow landed in its error phase.
fn check(workflow: &Workflow, step: &str) -> anyhow::Result<WorkflowSnapshot> {
    let snapshot = workflow.snapshot();
    if snapshot.phase == WorkflowPhase::Error {
        bail!(
            "{step} failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(snapshot)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let gateway = HttpGateway::new(&gateway_config(&args)?).context("building gateway")?;
    let config = WorkflowConfig::default()
        .with_poll_interval(Duration::from_secs(args.poll_secs.max(1)))
        .with_default_aspect_ratio(args.aspect);
    let workflow = Workflow::with_config(Arc::new(gateway), config);

    // Upload & analysis
    workflow.select_mode(args.mode)?;
    let pb = spinner("Analyzing product");
    workflow.upload_image(read_upload(&args.image)?).await?;
    pb.finish_and_clear();
    let snapshot = check(&workflow, "Analysis")?;
    if snapshot.original_image.is_none() {
        bail!("{} is not an image", args.image.display());
    }
    if let Some(analysis) = &snapshot.analysis {
        println!("{}", render::analysis(analysis));
    }

    // Planning
    let pb = spinner("Planning scenes");
    workflow
        .confirm_setup(snapshot.context_items, args.count, args.aspect)
        .await?;
    pb.finish_and_clear();
    let snapshot = check(&workflow, "Planning")?;
    println!("{}", render::script(&snapshot.script));

    // Generation & review
    if snapshot.phase == WorkflowPhase::ScriptApproval {
        let pb = spinner("Generating and reviewing images");
        workflow.confirm_script().await?;
        pb.finish_and_clear();
    }
    check(&workflow, "Generation")?;

    for _ in 0..args.retries {
        let failed: Vec<String> = workflow
            .snapshot()
            .cards()
            .into_iter()
            .filter(|card| card.can_retry)
            .map(|card| card.image_id)
            .collect();
        if failed.is_empty() {
            break;
        }
        let pb = spinner(&format!("Retrying {} failed images", failed.len()));
        futures::future::join_all(failed.iter().map(|id| workflow.retry(id))).await;
        pb.finish_and_clear();
    }

    // Approval
    for card in workflow.snapshot().cards() {
        let wanted = card.status == ImageStatus::AiApproved || args.approve_all;
        if card.can_approve && wanted {
            workflow.approve(&card.image_id)?;
        }
    }

    // Videos
    if args.videos && args.mode == FlowMode::Video {
        let approved: Vec<String> = workflow
            .snapshot()
            .approved_images()
            .into_iter()
            .map(|img| img.id.clone())
            .collect();
        for id in &approved {
            if let Err(e) = workflow.request_video(id).await {
                eprintln!("Cannot animate {id}: {e}");
            }
        }
        let pb = spinner(&format!("Rendering {} videos", approved.len()));
        while workflow.is_polling() {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        pb.finish_with_message("Videos done");
    }

    workflow.finish()?;
    let snapshot = workflow.snapshot();

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let written = write_outputs(&workflow, &snapshot, &args.out)?;

    println!("{}", render::summary(&snapshot));
    println!("Wrote {written} files to {}", args.out.display());

    if snapshot.approved_images().is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn write_outputs(workflow: &Workflow, snapshot: &WorkflowSnapshot, dir: &Path) -> anyhow::Result<usize> {
    let mut written = 0;
    for card in snapshot.cards() {
        if card.status != ImageStatus::UserApproved {
            continue;
        }
        let stem = format!("scene-{}", card.scene_number.unwrap_or_default());

        if let Some(data) = snapshot
            .image(&card.image_id)
            .and_then(|img| img.image_data.as_ref())
        {
            let path = dir.join(format!("{stem}.{}", data.extension()));
            std::fs::write(&path, data.decode()?)
                .with_context(|| format!("writing {}", path.display()))?;
            written += 1;
        }

        if let Some(blob) = card.video_url.as_deref().and_then(|url| workflow.blob(url)) {
            let path = dir.join(format!("{stem}.{}", blob.extension()));
            std::fs::write(&path, &blob.bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            written += 1;
        }
    }
    Ok(written)
}
