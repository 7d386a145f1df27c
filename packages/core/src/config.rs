//! Configuration for the stretch engine
//!
//! Settings are stored as JSON in the user's config directory. A missing
//! file yields the defaults; an invalid one is rejected by [`StretchConfig::validate`].

use crate::error::{StretchError, StretchResult};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Resampling filter used when re-rendering still images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    pub fn as_filter_type(&self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Video codec to use for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoCodec {
    /// H.264/AVC - widely compatible
    #[default]
    H264,
    /// H.265/HEVC - better compression, newer
    H265,
}

impl VideoCodec {
    pub fn as_encoder(&self, hardware_accel: bool) -> &'static str {
        match (self, hardware_accel) {
            // macOS VideoToolbox hardware encoding
            (VideoCodec::H264, true) => "h264_videotoolbox",
            (VideoCodec::H265, true) => "hevc_videotoolbox",
            // Software encoding
            (VideoCodec::H264, false) => "libx264",
            (VideoCodec::H265, false) => "libx265",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub filter: ResampleFilter,
    /// Round image canvases up to even sizes like video canvases
    pub even_dimensions: bool,
    /// Largest canvas (in pixels) the renderer will allocate
    pub max_canvas_pixels: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            filter: ResampleFilter::Lanczos3,
            even_dimensions: false,
            max_canvas_pixels: 400_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub codec: VideoCodec,
    /// CRF quality (0-51, lower = better quality)
    pub crf: u32,
    /// Encoder preset (ultrafast ... veryslow)
    pub preset: String,
    pub hardware_accel: bool,
    /// Audio bitrate in bits per second
    pub audio_bitrate: u64,
    /// Frame rate used when the source does not report one
    pub default_frame_rate: f64,
    /// Where exported files are written before persisting (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        // Highest quality: near-transparent CRF with a slow preset
        Self {
            codec: VideoCodec::H264,
            crf: 17,
            preset: "slow".to_string(),
            hardware_accel: false,
            audio_bitrate: 256_000,
            default_frame_rate: crate::media::DEFAULT_FRAME_RATE,
            temp_dir: None,
        }
    }
}

impl VideoSettings {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum number of items accepted in one selection
    pub max_selection: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_selection: 50 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    pub image: ImageSettings,
    pub video: VideoSettings,
    pub batch: BatchSettings,
}

impl StretchConfig {
    /// Default config directory for this application
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("app", "stretch", "Stretch")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("stretch"))
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(CONFIG_FILE)
    }

    /// Load from the default location
    pub fn load() -> StretchResult<Self> {
        Self::load_from_file(&Self::default_path())
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load_from_file(path: &Path) -> StretchResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        let config: StretchConfig = serde_json::from_str(&json)?;
        config.validate()?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> StretchResult<()> {
        self.save_to_file(&Self::default_path())
    }

    pub fn save_to_file(&self, path: &Path) -> StretchResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> StretchResult<()> {
        if self.video.crf > 51 {
            return Err(StretchError::Configuration(format!(
                "CRF must be between 0 and 51, got {}",
                self.video.crf
            )));
        }
        if !(self.video.default_frame_rate.is_finite() && self.video.default_frame_rate > 0.0) {
            return Err(StretchError::Configuration(
                "Default frame rate must be positive".to_string(),
            ));
        }
        if self.video.preset.trim().is_empty() {
            return Err(StretchError::Configuration(
                "Encoder preset must not be empty".to_string(),
            ));
        }
        if self.image.max_canvas_pixels == 0 {
            return Err(StretchError::Configuration(
                "Maximum canvas size must be non-zero".to_string(),
            ));
        }
        if self.batch.max_selection == 0 {
            return Err(StretchError::Configuration(
                "Maximum selection must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
