//! Video stretching: orientation, composition and export
//!
//! The pipeline is strictly linear: load tracks, work out orientation,
//! size the canvas, assemble a composition, attach a single layer
//! instruction carrying the stretch transform, then export to a temporary
//! MP4. Any failure ends the pipeline for this asset.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::composition::{
    Composition, CompositionInstruction, ExportJob, ExportPreset, LayerInstruction, TimeRange,
    TrackKind, VideoComposition,
};
use super::VideoBackend;
use crate::aspect_ratio::AspectRatio;
use crate::config::VideoSettings;
use crate::error::{StretchError, StretchResult};
use crate::media::{VideoAsset, VideoTrackInfo, VideoTracks};
use crate::sizing::{compute_video_canvas, Dimensions};
use crate::transform::{AffineTransform, QuarterTurn};

/// How the stored samples relate to the displayed picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    /// Samples are stored sideways and must be turned for display
    Portrait(QuarterTurn),
}

impl Orientation {
    pub fn from_transform(transform: &AffineTransform) -> Self {
        match transform.quarter_turn_direction() {
            Some(turn) => Orientation::Portrait(turn),
            None => Orientation::Landscape,
        }
    }

    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Portrait(_))
    }

    /// Display size for samples of `natural` size
    pub fn oriented(&self, natural: Dimensions) -> Dimensions {
        if self.is_portrait() {
            natural.swapped()
        } else {
            natural
        }
    }
}

/// Geometry of one video stretch
#[derive(Debug, Clone, PartialEq)]
pub struct StretchPlan {
    pub orientation: Orientation,
    /// Source size as displayed
    pub oriented_size: Dimensions,
    pub render_width: u32,
    pub render_height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Maps stored samples onto the render canvas
    pub transform: AffineTransform,
}

/// Work out orientation, canvas and layer transform for `track`
pub fn plan_stretch(track: &VideoTrackInfo, target: AspectRatio) -> StretchResult<StretchPlan> {
    if !track.natural_size.is_positive() {
        return Err(StretchError::decode(format!(
            "Video track {} has invalid size {}x{}",
            track.index, track.natural_size.width, track.natural_size.height
        )));
    }

    let orientation = Orientation::from_transform(&track.preferred_transform);
    let oriented_size = orientation.oriented(track.natural_size);
    let (render_width, render_height) = compute_video_canvas(oriented_size, target);

    let scale_x = render_width as f64 / oriented_size.width;
    let scale_y = render_height as f64 / oriented_size.height;
    let transform = stretch_transform(
        orientation,
        scale_x,
        scale_y,
        render_width as f64,
        render_height as f64,
    );

    Ok(StretchPlan {
        orientation,
        oriented_size,
        render_width,
        render_height,
        scale_x,
        scale_y,
        transform,
    })
}

/// Layer transform for a stretch of `(scale_x, scale_y)` onto a
/// `new_width` x `new_height` canvas.
///
/// Sideways samples are scaled with the axes swapped, since the quarter turn
/// exchanges the roles of width and height, then turned and shifted back
/// into the canvas.
pub fn stretch_transform(
    orientation: Orientation,
    scale_x: f64,
    scale_y: f64,
    new_width: f64,
    new_height: f64,
) -> AffineTransform {
    match orientation {
        Orientation::Landscape => AffineTransform::scale(scale_x, scale_y),
        Orientation::Portrait(QuarterTurn::Clockwise) => {
            AffineTransform::quarter_turn(QuarterTurn::Clockwise)
                .translated_by(0.0, -new_width)
                .scaled_by(scale_y, scale_x)
        }
        Orientation::Portrait(QuarterTurn::CounterClockwise) => {
            AffineTransform::quarter_turn(QuarterTurn::CounterClockwise)
                .translated_by(-new_height, 0.0)
                .scaled_by(scale_y, scale_x)
        }
    }
}

/// Copy the full video track, and the audio track when possible, into a
/// new composition at time zero.
pub fn build_composition(asset: &VideoAsset, tracks: &VideoTracks) -> StretchResult<Composition> {
    let video = tracks
        .video
        .as_ref()
        .ok_or_else(|| StretchError::TrackMissing(asset.path().display().to_string()))?;

    let range = TimeRange::from_zero(tracks.duration);
    let mut composition = Composition::new(asset.path());

    composition.insert_time_range(
        TrackKind::Video,
        video.index,
        range,
        video.duration,
        Duration::ZERO,
    )?;

    if let Some(audio) = &tracks.audio {
        if let Err(e) = composition.insert_time_range(
            TrackKind::Audio,
            audio.index,
            range,
            audio.duration,
            Duration::ZERO,
        ) {
            warn!("Dropping audio for {:?}: {}", asset.path(), e);
        }
    }

    Ok(composition)
}

/// Single full-length instruction applying the plan's transform
pub fn build_video_composition(
    plan: &StretchPlan,
    composition: &Composition,
    frame_rate: f64,
) -> StretchResult<VideoComposition> {
    let track = composition.video_track().ok_or_else(|| {
        StretchError::Composition("Composition has no video track".to_string())
    })?;

    Ok(VideoComposition {
        render_width: plan.render_width,
        render_height: plan.render_height,
        frame_duration: Duration::from_secs_f64(1.0 / frame_rate),
        instructions: vec![CompositionInstruction {
            time_range: TimeRange::from_zero(composition.duration()),
            layers: vec![LayerInstruction {
                track_id: track.id,
                transform: plan.transform,
                at: Duration::ZERO,
            }],
        }],
    })
}

/// Stretch `asset` and export it to a new temporary MP4.
///
/// On success the caller owns the returned file and must delete it once
/// persisted. On failure any partial output has already been removed.
pub async fn stretch_and_export_video(
    backend: &dyn VideoBackend,
    settings: &VideoSettings,
    asset: &VideoAsset,
    target: AspectRatio,
    cancel: &CancellationToken,
) -> StretchResult<PathBuf> {
    if cancel.is_cancelled() {
        return Err(StretchError::Cancelled);
    }

    let tracks = backend.load_tracks(asset).await?;
    let video = tracks
        .video
        .as_ref()
        .ok_or_else(|| StretchError::TrackMissing(asset.path().display().to_string()))?;

    let plan = plan_stretch(video, target)?;
    info!(
        "Stretching {:?}: {}x{} ({:?}) -> {}x{} ({})",
        asset.path(),
        plan.oriented_size.width,
        plan.oriented_size.height,
        plan.orientation,
        plan.render_width,
        plan.render_height,
        target
    );

    let composition = build_composition(asset, &tracks)?;
    if composition.audio_track().is_none() {
        debug!("No audio in composition, exporting silent video");
    }

    let frame_rate = video.frame_rate_or(settings.default_frame_rate);
    let video_composition = build_video_composition(&plan, &composition, frame_rate)?;

    let temp_dir = settings.temp_dir();
    tokio::fs::create_dir_all(&temp_dir).await.map_err(|e| {
        StretchError::export(format!(
            "Cannot create export directory {:?}: {}",
            temp_dir, e
        ))
    })?;
    let output = temp_dir.join(format!("{}.mp4", Uuid::new_v4()));
    let job = ExportJob {
        composition,
        video_composition,
        preset: ExportPreset::HighestQuality,
        output: output.clone(),
    };

    if let Err(e) = backend.export(&job, cancel).await {
        remove_partial_output(&output).await;
        return Err(e);
    }

    if tokio::fs::metadata(&output).await.is_err() {
        return Err(StretchError::export(format!(
            "Exporter reported success but {:?} was not written",
            output
        )));
    }

    info!("Exported stretched video to {:?}", output);
    Ok(output)
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial export {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial export {:?}: {}", path, e),
    }
}
