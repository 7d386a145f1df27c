//! Media assets handed to the transform engine
//!
//! An asset is either a decoded raster image or a handle to a video file
//! whose tracks are read lazily by a [`VideoBackend`](crate::engine::VideoBackend).

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sizing::Dimensions;
use crate::transform::AffineTransform;

/// Frame rate assumed when a track does not report one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Decoded still image
#[derive(Debug, Clone)]
pub struct ImageAsset {
    image: DynamicImage,
}

impl ImageAsset {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Intrinsic pixel size
    pub fn natural_size(&self) -> Dimensions {
        Dimensions::from_pixels(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

impl From<DynamicImage> for ImageAsset {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Handle to a decodable video file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    path: PathBuf,
}

impl VideoAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Properties of the first video track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackInfo {
    /// Stream index inside the container
    pub index: usize,
    /// Stored sample size, before the preferred transform
    pub natural_size: Dimensions,
    /// Display transform stored with the track
    pub preferred_transform: AffineTransform,
    /// Nominal frames per second, if the container reports one
    pub nominal_frame_rate: Option<f64>,
    /// Length of the track itself, when known separately from the asset
    pub duration: Option<Duration>,
}

impl VideoTrackInfo {
    /// Nominal frame rate, or `fallback` for missing or bogus values
    pub fn frame_rate_or(&self, fallback: f64) -> f64 {
        self.nominal_frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    pub index: usize,
    pub duration: Option<Duration>,
}

/// Track set loaded from a [`VideoAsset`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTracks {
    pub video: Option<VideoTrackInfo>,
    pub audio: Option<AudioTrackInfo>,
    pub duration: Duration,
}

impl VideoTracks {
    /// Duration as `m:ss`, as shown on grid thumbnails
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Anything the engine can stretch
#[derive(Debug, Clone)]
pub enum MediaAsset {
    Image(ImageAsset),
    Video(VideoAsset),
}

impl MediaAsset {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaAsset::Image(_) => MediaKind::Image,
            MediaAsset::Video(_) => MediaKind::Video,
        }
    }
}

/// Product of a successful stretch; the caller owns it from here on
#[derive(Debug, Clone)]
pub enum StretchOutput {
    Image(ImageAsset),
    /// Temporary file that the caller must delete once persisted
    Video(PathBuf),
}

impl StretchOutput {
    pub fn kind(&self) -> MediaKind {
        match self {
            StretchOutput::Image(_) => MediaKind::Image,
            StretchOutput::Video(_) => MediaKind::Video,
        }
    }
}
