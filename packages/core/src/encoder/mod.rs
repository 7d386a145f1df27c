//! Video backend using ffmpeg-sidecar for probing and MP4 export
//!
//! Compositions are lowered to a single ffmpeg invocation: the layer
//! transform becomes a transpose/flip filter plus a `scale` to the render
//! size, and samples are read with `-noautorotate` so the transform alone
//! decides orientation.

use crate::config::VideoSettings;
use crate::engine::ExportJob;
use crate::error::{StretchError, StretchResult};
use crate::transform::{QuarterTurn, Reorientation};
use std::path::Path;

pub mod probe;

fn path_arg(path: &Path) -> StretchResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        StretchError::Configuration(format!("Path is not valid UTF-8: {:?}", path))
    })
}

/// ffmpeg filter that re-arranges pixels the way `reorientation` does
pub fn reorientation_filter(reorientation: Reorientation) -> Option<&'static str> {
    match reorientation {
        Reorientation::None => None,
        Reorientation::Rotate(QuarterTurn::Clockwise) => Some("transpose=clock"),
        Reorientation::Rotate(QuarterTurn::CounterClockwise) => Some("transpose=cclock"),
        Reorientation::HalfTurn => Some("hflip,vflip"),
        Reorientation::HorizontalFlip => Some("hflip"),
        Reorientation::VerticalFlip => Some("vflip"),
        Reorientation::Transpose => Some("transpose=cclock_flip"),
        Reorientation::AntiTranspose => Some("transpose=clock_flip"),
    }
}

/// Filter graph for the composition's video layer
pub fn video_filter(job: &ExportJob) -> StretchResult<String> {
    let track = job.composition.video_track().ok_or_else(|| {
        StretchError::Composition("Composition has no video track".to_string())
    })?;
    let transform = job
        .video_composition
        .initial_transform(track.id)
        .ok_or_else(|| {
            StretchError::Composition(format!("No layer instruction for track {}", track.id))
        })?;

    let vc = &job.video_composition;
    let mut filters = Vec::new();
    if let Some(filter) = reorientation_filter(transform.reorientation()) {
        filters.push(filter.to_string());
    }
    filters.push(format!(
        "scale={}:{}:flags=lanczos",
        vc.render_width, vc.render_height
    ));
    filters.push("setsar=1".to_string());

    Ok(filters.join(","))
}

/// Frame rate as ffmpeg expects it: integers and NTSC rates as exact
/// rationals, anything else with microsecond precision
pub fn frame_rate_arg(fps: f64) -> String {
    let rounded = fps.round();
    if (fps - rounded).abs() < 1e-4 {
        return format!("{}", rounded as u64);
    }

    let ntsc = (fps * 1001.0).round();
    if (fps * 1001.0 - ntsc).abs() < 0.01 && ntsc as u64 % 1000 == 0 {
        return format!("{}/1001", ntsc as u64);
    }

    format!("{:.6}", fps)
}

/// Full ffmpeg argument list for an export job
pub fn build_export_args(job: &ExportJob, settings: &VideoSettings) -> StretchResult<Vec<String>> {
    let composition = &job.composition;
    let video = composition.video_track().ok_or_else(|| {
        StretchError::Composition("Composition has no video track".to_string())
    })?;

    // The filter graph does the turning; the source display matrix must not
    // reach the output or players rotate the frames a second time
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-noautorotate".into(),
        "-display_rotation:v:0".into(),
        "0".into(),
    ];

    if !video.source_range.start.is_zero() {
        args.extend([
            "-ss".into(),
            format!("{:.6}", video.source_range.start.as_secs_f64()),
        ]);
    }
    args.extend(["-i".into(), path_arg(composition.source())?]);

    args.extend(["-map".into(), format!("0:{}", video.source_index)]);
    if let Some(audio) = composition.audio_track() {
        args.extend(["-map".into(), format!("0:{}", audio.source_index)]);
    }

    args.extend([
        "-t".into(),
        format!("{:.6}", composition.duration().as_secs_f64()),
    ]);
    args.extend(["-vf".into(), video_filter(job)?]);
    args.extend([
        "-r".into(),
        frame_rate_arg(job.video_composition.frame_rate()),
    ]);

    args.extend([
        "-c:v".into(),
        settings.codec.as_encoder(settings.hardware_accel).into(),
    ]);
    if settings.hardware_accel {
        // VideoToolbox uses a different quality scale
        args.extend(["-q:v".into(), (settings.crf * 2).to_string()]);
    } else {
        args.extend(["-preset".into(), settings.preset.clone()]);
        args.extend(["-crf".into(), settings.crf.to_string()]);
    }
    args.extend(["-pix_fmt".into(), "yuv420p".into()]);

    if composition.audio_track().is_some() {
        args.extend(["-c:a".into(), "aac".into()]);
        args.extend([
            "-b:a".into(),
            format!("{}k", settings.audio_bitrate / 1000),
        ]);
    } else {
        args.push("-an".into());
    }

    args.extend(["-movflags".into(), "+faststart".into()]);
    args.push(path_arg(&job.output)?);

    Ok(args)
}

/// Arguments that write the first frame of `path` to stdout as PNG
pub fn thumbnail_args(path: &Path, max_size: u32) -> StretchResult<Vec<String>> {
    Ok(vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        path_arg(path)?,
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        format!(
            "scale={0}:{0}:force_original_aspect_ratio=decrease",
            max_size
        ),
        "-f".into(),
        "image2pipe".into(),
        "-vcodec".into(),
        "png".into(),
        "-".into(),
    ])
}

#[cfg(feature = "encoding")]
mod sidecar_backend {
    use super::{build_export_args, probe, thumbnail_args};
    use crate::config::VideoSettings;
    use crate::engine::{ExportJob, VideoBackend};
    use crate::error::{StretchError, StretchResult};
    use crate::media::{ImageAsset, VideoAsset, VideoTracks};
    use async_trait::async_trait;
    use ffmpeg_sidecar::command::FfmpegCommand;
    use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Probes with ffprobe and exports with ffmpeg
    #[derive(Debug, Clone, Default)]
    pub struct FfmpegBackend {
        settings: VideoSettings,
    }

    impl FfmpegBackend {
        pub fn new(settings: VideoSettings) -> Self {
            Self { settings }
        }

        /// Ensure ffmpeg is available, download if needed
        pub fn ensure_ffmpeg() -> StretchResult<()> {
            use ffmpeg_sidecar::download::auto_download;

            if ffmpeg_sidecar::command::ffmpeg_is_installed() {
                tracing::debug!("FFmpeg is already installed");
                return Ok(());
            }

            tracing::info!("FFmpeg not found, downloading...");
            auto_download().map_err(|e| {
                StretchError::export(format!("Failed to download FFmpeg: {}", e))
            })?;

            tracing::info!("FFmpeg downloaded successfully");
            Ok(())
        }

        /// First frame of `asset`, display-oriented and fitted in a square box
        pub async fn generate_thumbnail(
            &self,
            asset: &VideoAsset,
            max_size: u32,
        ) -> StretchResult<ImageAsset> {
            let args = thumbnail_args(asset.path(), max_size)?;
            ensure_ffmpeg_ready().await?;
            let output = tokio::process::Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
                .args(&args)
                .output()
                .await
                .map_err(|e| StretchError::decode(format!("Failed to run ffmpeg: {}", e)))?;

            if !output.status.success() {
                return Err(StretchError::decode(format!(
                    "Thumbnail extraction failed for {:?}: {}",
                    asset.path(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }

            let image = image::load_from_memory(&output.stdout)
                .map_err(|e| StretchError::decode(e.to_string()))?;
            Ok(ImageAsset::new(image))
        }
    }

    async fn ensure_ffmpeg_ready() -> StretchResult<()> {
        tokio::task::spawn_blocking(FfmpegBackend::ensure_ffmpeg)
            .await
            .map_err(|e| StretchError::export(format!("FFmpeg setup task failed: {}", e)))?
    }

    /// Run ffmpeg to completion, killing it if `cancel` fires
    fn run_export(
        args: Vec<String>,
        total: Duration,
        cancel: CancellationToken,
    ) -> StretchResult<()> {
        FfmpegBackend::ensure_ffmpeg()?;

        let mut child = FfmpegCommand::new()
            .args(&args)
            .spawn()
            .map_err(|e| StretchError::export(format!("Failed to start FFmpeg: {}", e)))?;

        let events = child
            .iter()
            .map_err(|e| StretchError::export(format!("Failed to read FFmpeg output: {}", e)))?;

        let mut last_error: Option<String> = None;
        for event in events {
            if cancel.is_cancelled() {
                tracing::info!("Export cancelled, stopping FFmpeg");
                let _ = child.kill();
                let _ = child.wait();
                return Err(StretchError::Cancelled);
            }

            match event {
                FfmpegEvent::Progress(progress) => {
                    tracing::debug!(
                        "Export progress: frame {} at {} of {:.1}s ({}x)",
                        progress.frame,
                        progress.time,
                        total.as_secs_f64(),
                        progress.speed
                    );
                }
                FfmpegEvent::Error(message)
                | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                    tracing::warn!("FFmpeg: {}", message);
                    last_error = Some(message);
                }
                _ => {}
            }
        }

        let status = child
            .wait()
            .map_err(|e| StretchError::export(format!("FFmpeg process failed: {}", e)))?;

        if cancel.is_cancelled() {
            return Err(StretchError::Cancelled);
        }
        if !status.success() {
            return Err(StretchError::export(match last_error {
                Some(message) => format!("FFmpeg exited with status {}: {}", status, message),
                None => format!("FFmpeg exited with status {}", status),
            }));
        }

        Ok(())
    }

    #[async_trait]
    impl VideoBackend for FfmpegBackend {
        async fn load_tracks(&self, asset: &VideoAsset) -> StretchResult<VideoTracks> {
            ensure_ffmpeg_ready().await?;
            let output = tokio::process::Command::new(ffmpeg_sidecar::ffprobe::ffprobe_path())
                .args(probe::PROBE_ARGS)
                .arg(asset.path())
                .output()
                .await
                .map_err(|e| StretchError::decode(format!("Failed to execute ffprobe: {}", e)))?;

            if !output.status.success() {
                return Err(StretchError::decode(format!(
                    "ffprobe could not read {:?}: {}",
                    asset.path(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }

            let tracks = probe::parse_probe_output(asset.path(), &output.stdout)?;
            tracing::debug!(
                "Probed {:?}: video={:?} audio={} duration={}",
                asset.path(),
                tracks.video.as_ref().map(|v| v.natural_size),
                tracks.audio.is_some(),
                tracks.formatted_duration()
            );
            Ok(tracks)
        }

        async fn export(&self, job: &ExportJob, cancel: &CancellationToken) -> StretchResult<()> {
            let args = build_export_args(job, &self.settings)?;
            tracing::debug!("ffmpeg {}", args.join(" "));

            let total = job.composition.duration();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || run_export(args, total, cancel))
                .await
                .map_err(|e| StretchError::export(format!("Export task failed: {}", e)))?
        }
    }
}

#[cfg(feature = "encoding")]
pub use sidecar_backend::*;

// Stub implementation when encoding feature is not enabled
#[cfg(not(feature = "encoding"))]
mod stub_backend {
    use crate::config::VideoSettings;
    use crate::engine::{ExportJob, VideoBackend};
    use crate::error::{StretchError, StretchResult};
    use crate::media::{VideoAsset, VideoTracks};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    /// Backend stub (encoding feature not enabled)
    #[derive(Debug, Clone, Default)]
    pub struct FfmpegBackend {
        _settings: VideoSettings,
    }

    impl FfmpegBackend {
        pub fn new(settings: VideoSettings) -> Self {
            Self {
                _settings: settings,
            }
        }
    }

    #[async_trait]
    impl VideoBackend for FfmpegBackend {
        async fn load_tracks(&self, _asset: &VideoAsset) -> StretchResult<VideoTracks> {
            Err(StretchError::decode(
                "Encoding feature not enabled. Rebuild with --features encoding",
            ))
        }

        async fn export(&self, _job: &ExportJob, _cancel: &CancellationToken) -> StretchResult<()> {
            Err(StretchError::export("Encoding feature not enabled"))
        }
    }
}

#[cfg(not(feature = "encoding"))]
pub use stub_backend::*;
