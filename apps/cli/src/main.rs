use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stretch_core::engine::image::{decode_image, image_canvas, load_thumbnail, THUMBNAIL_SIZE};
use stretch_core::engine::video::plan_stretch;
use stretch_core::{
    spawn_batch, AspectRatio, BatchItem, BatchProcessor, BatchReport, DirectoryLibrary,
    FfmpegBackend, FsAssetSource, ImageAsset, MediaKind, StretchConfig, StretchEngine, VideoAsset,
    VideoBackend,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stretch")]
#[command(version, about = "Stretch photos and videos to a new aspect ratio without cropping")]
struct Args {
    /// Photos and videos to stretch
    #[arg(required_unless_present = "list_ratios")]
    inputs: Vec<PathBuf>,

    /// Target aspect ratio, e.g. 16:9, 1:1 or 9x16
    #[arg(short, long, default_value = "16:9")]
    ratio: AspectRatio,

    /// Library directory that receives the stretched files
    #[arg(short, long, default_value = "stretched")]
    output: PathBuf,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the encoder CRF
    #[arg(long)]
    crf: Option<u32>,

    /// Use the hardware video encoder
    #[arg(long)]
    hardware_accel: bool,

    /// Round image canvases up to even sizes
    #[arg(long)]
    even_images: bool,

    /// Directory for in-flight video exports
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    /// Print the planned output sizes without writing anything
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, also write preview thumbnails into this directory
    #[arg(long, requires = "dry_run")]
    thumbnails: Option<PathBuf>,

    /// List the available aspect ratios and exit
    #[arg(long)]
    list_ratios: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info,stretch=debug" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if args.list_ratios {
        println!("Available aspect ratios:");
        for ratio in AspectRatio::ALL {
            println!("  {:<5} {}", ratio.label(), ratio.display_name());
        }
        return Ok(());
    }

    info!("Starting Stretch v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    if args.dry_run {
        return dry_run(&args, config).await;
    }

    let engine = StretchEngine::with_ffmpeg(config);
    let library = Arc::new(DirectoryLibrary::new(&args.output));
    let processor = Arc::new(BatchProcessor::new(
        engine,
        Arc::new(FsAssetSource::new()),
        library.clone(),
        library,
    ));

    let items: Vec<BatchItem> = args.inputs.iter().map(BatchItem::new).collect();
    let handle = spawn_batch(processor, items, args.ratio);

    let cancel = handle.cancel_token().clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling after the current item");
            cancel.cancel();
        }
    });

    let mut progress = handle.progress();
    while progress.changed().await.is_ok() {
        let current = *progress.borrow_and_update();
        info!(
            "Progress: {}/{} ({:.0}%)",
            current.processed,
            current.total,
            current.fraction() * 100.0
        );
    }

    match handle.wait().await {
        Ok(report) => print_report(&report, &args.output),
        Err(e) if e.is_batch_fatal() => {
            eprintln!("Failed to process the selected items: {}", e);
            bail!("batch aborted ({})", e.category())
        }
        Err(e) => Err(e).context("batch failed"),
    }
}

fn load_config(args: &Args) -> Result<StretchConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(StretchConfig::default_path);
    let mut config = StretchConfig::load_from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    if let Some(crf) = args.crf {
        config.video.crf = crf;
    }
    if args.hardware_accel {
        config.video.hardware_accel = true;
    }
    if args.even_images {
        config.image.even_dimensions = true;
    }
    if let Some(temp_dir) = &args.temp_dir {
        config.video.temp_dir = Some(temp_dir.clone());
    }
    config.validate().context("invalid settings")?;

    if args.save_config {
        config
            .save_to_file(&path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
    }

    Ok(config)
}

fn print_report(report: &BatchReport, output: &Path) -> Result<()> {
    println!("{}", report.summary());
    for failure in &report.failures {
        println!(
            "  #{} {}: {}",
            failure.index + 1,
            failure.path.display(),
            failure.message
        );
        if let Some(kept) = &failure.retained_output {
            println!("     export kept at {}", kept.display());
        }
    }

    if !report.is_success() {
        bail!("no items were saved");
    }
    println!("Output: {}", output.display());
    Ok(())
}

/// Report planned sizes, and optionally write previews, without exporting
async fn dry_run(args: &Args, config: StretchConfig) -> Result<()> {
    let backend = FfmpegBackend::new(config.video.clone());
    if let Some(dir) = &args.thumbnails {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    for path in &args.inputs {
        let item = BatchItem::new(path);
        let result = match item.kind() {
            MediaKind::Image => plan_image(args, &config, path).await,
            MediaKind::Video => plan_video(args, &backend, path).await,
        };
        if let Err(e) = result {
            println!("{}: {:#}", path.display(), e);
        }
    }
    Ok(())
}

async fn plan_image(args: &Args, config: &StretchConfig, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let asset = decode_image(&bytes)?;
    let (width, height) = image_canvas(&asset, args.ratio, &config.image)?;
    println!(
        "{}: image {}x{} -> {}x{}",
        path.display(),
        asset.width(),
        asset.height(),
        width,
        height
    );

    if let Some(dir) = &args.thumbnails {
        let thumbnail = load_thumbnail(&bytes, THUMBNAIL_SIZE)?;
        save_thumbnail(dir, path, &thumbnail)?;
    }
    Ok(())
}

async fn plan_video(args: &Args, backend: &FfmpegBackend, path: &Path) -> Result<()> {
    let asset = VideoAsset::new(path);
    let tracks = backend.load_tracks(&asset).await?;
    let track = tracks
        .video
        .as_ref()
        .with_context(|| format!("no video track in {}", path.display()))?;
    let plan = plan_stretch(track, args.ratio)?;
    println!(
        "{}: video {}x{}{} {} -> {}x{}{}",
        path.display(),
        plan.oriented_size.width,
        plan.oriented_size.height,
        if plan.orientation.is_portrait() { " (rotated)" } else { "" },
        tracks.formatted_duration(),
        plan.render_width,
        plan.render_height,
        if tracks.audio.is_some() { "" } else { ", silent" }
    );

    if let Some(dir) = &args.thumbnails {
        let thumbnail = backend.generate_thumbnail(&asset, THUMBNAIL_SIZE).await?;
        save_thumbnail(dir, path, &thumbnail)?;
    }
    Ok(())
}

fn save_thumbnail(dir: &Path, source: &Path, thumbnail: &ImageAsset) -> Result<()> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string());
    let target = dir.join(format!("{}-thumb.png", stem));
    thumbnail
        .image()
        .save(&target)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(())
}
