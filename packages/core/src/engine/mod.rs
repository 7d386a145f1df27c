//! Media transform engine
//!
//! Dispatches a [`MediaAsset`] to the image or video path. Images are
//! re-rendered in memory; videos are composed and exported through a
//! [`VideoBackend`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::aspect_ratio::AspectRatio;
use crate::config::StretchConfig;
use crate::error::{StretchError, StretchResult};
use crate::media::{ImageAsset, MediaAsset, StretchOutput, VideoAsset, VideoTracks};

pub mod composition;
pub mod image;
pub mod video;

pub use composition::{Composition, ExportJob, ExportPreset, TimeRange, VideoComposition};
pub use video::{Orientation, StretchPlan};

/// Track loading and export for video assets
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Read the first video track, first audio track and duration
    async fn load_tracks(&self, asset: &VideoAsset) -> StretchResult<VideoTracks>;

    /// Encode `job` to `job.output`.
    ///
    /// Must stop and return [`StretchError::Cancelled`] once `cancel` fires.
    /// Partial output is cleaned up by the caller.
    async fn export(&self, job: &ExportJob, cancel: &CancellationToken) -> StretchResult<()>;
}

/// Stretches assets to a target aspect ratio
#[derive(Clone)]
pub struct StretchEngine {
    config: Arc<StretchConfig>,
    backend: Arc<dyn VideoBackend>,
}

impl StretchEngine {
    pub fn new(config: StretchConfig, backend: Arc<dyn VideoBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    /// Engine backed by the bundled ffmpeg
    #[cfg(feature = "encoding")]
    pub fn with_ffmpeg(config: StretchConfig) -> Self {
        let backend = crate::encoder::FfmpegBackend::new(config.video.clone());
        Self::new(config, Arc::new(backend))
    }

    pub fn config(&self) -> &StretchConfig {
        &self.config
    }

    /// Stretch a still image in memory
    pub fn stretch_image(&self, asset: &ImageAsset, target: AspectRatio) -> StretchResult<ImageAsset> {
        image::stretch_image(asset, target, &self.config.image)
    }

    /// Stretch a video and export it to a temporary file owned by the caller
    pub async fn stretch_and_export_video(
        &self,
        asset: &VideoAsset,
        target: AspectRatio,
        cancel: &CancellationToken,
    ) -> StretchResult<PathBuf> {
        video::stretch_and_export_video(
            self.backend.as_ref(),
            &self.config.video,
            asset,
            target,
            cancel,
        )
        .await
    }

    /// Stretch any asset. Image rendering runs on the blocking pool so the
    /// calling task is never stalled by a large resample.
    pub async fn stretch(
        &self,
        asset: MediaAsset,
        target: AspectRatio,
        cancel: &CancellationToken,
    ) -> StretchResult<StretchOutput> {
        match asset {
            MediaAsset::Image(image) => {
                let settings = self.config.image.clone();
                let stretched = tokio::task::spawn_blocking(move || {
                    image::stretch_image(&image, target, &settings)
                })
                .await
                .map_err(|e| StretchError::Render(format!("Render task failed: {}", e)))??;
                Ok(StretchOutput::Image(stretched))
            }
            MediaAsset::Video(video) => {
                let path = self.stretch_and_export_video(&video, target, cancel).await?;
                Ok(StretchOutput::Video(path))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory video backend for tests

    use super::*;
    use std::sync::Mutex;

    pub struct FakeBackend {
        pub tracks: StretchResult<VideoTracks>,
        pub fail_export: bool,
        /// Sources whose export fails even when `fail_export` is off
        pub failing_sources: Vec<PathBuf>,
        pub jobs: Mutex<Vec<ExportJob>>,
    }

    impl FakeBackend {
        pub fn new(tracks: VideoTracks) -> Self {
            Self {
                tracks: Ok(tracks),
                fail_export: false,
                failing_sources: Vec::new(),
                jobs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoBackend for FakeBackend {
        async fn load_tracks(&self, asset: &VideoAsset) -> StretchResult<VideoTracks> {
            match &self.tracks {
                Ok(tracks) => Ok(tracks.clone()),
                Err(_) => Err(StretchError::decode(asset.path().display().to_string())),
            }
        }

        async fn export(&self, job: &ExportJob, cancel: &CancellationToken) -> StretchResult<()> {
            self.jobs.lock().unwrap().push(job.clone());
            tokio::fs::write(&job.output, b"partial").await?;
            if cancel.is_cancelled() {
                return Err(StretchError::Cancelled);
            }
            let source = job.composition.source();
            if self.fail_export || self.failing_sources.iter().any(|p| p == source) {
                return Err(StretchError::export("encoder crashed"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;
    use crate::media::{AudioTrackInfo, VideoTrackInfo};
    use crate::sizing::Dimensions;
    use crate::transform::AffineTransform;
    use ::image::DynamicImage;
    use std::time::Duration;

    fn sample_tracks() -> VideoTracks {
        VideoTracks {
            video: Some(VideoTrackInfo {
                index: 0,
                natural_size: Dimensions::new(1920.0, 1080.0),
                preferred_transform: AffineTransform::new(0.0, 1.0, -1.0, 0.0, 1080.0, 0.0),
                nominal_frame_rate: None,
                duration: None,
            }),
            audio: Some(AudioTrackInfo {
                index: 1,
                duration: None,
            }),
            duration: Duration::from_secs(4),
        }
    }

    fn engine(backend: FakeBackend, temp: &std::path::Path) -> (StretchEngine, Arc<FakeBackend>) {
        let mut config = StretchConfig::default();
        config.video.temp_dir = Some(temp.to_path_buf());
        let backend = Arc::new(backend);
        (StretchEngine::new(config, backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_video_export_success() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (engine, backend) = engine(FakeBackend::new(sample_tracks()), temp_dir.path());

        let output = engine
            .stretch_and_export_video(
                &VideoAsset::new("portrait.mov"),
                AspectRatio::Ratio1x1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(output.exists());
        assert_eq!(output.extension().unwrap(), "mp4");
        assert!(output.starts_with(temp_dir.path()));

        let jobs = backend.jobs.lock().unwrap();
        let job = &jobs[0];
        assert_eq!(job.preset, ExportPreset::HighestQuality);
        assert_eq!(
            (job.video_composition.render_width, job.video_composition.render_height),
            (1920, 1920)
        );
        // No nominal rate reported: 30 fps
        assert!((job.video_composition.frame_rate() - 30.0).abs() < 1e-6);
        assert!(job.composition.audio_track().is_some());
    }

    #[tokio::test]
    async fn test_missing_export_dir_is_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("not").join("yet");
        let (engine, _) = engine(FakeBackend::new(sample_tracks()), &nested);

        let output = engine
            .stretch_and_export_video(
                &VideoAsset::new("portrait.mov"),
                AspectRatio::Ratio3x4,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(nested.is_dir());
        assert!(output.starts_with(&nested));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_video_export_failure_removes_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(sample_tracks());
        backend.fail_export = true;
        let (engine, backend) = engine(backend, temp_dir.path());

        let result = engine
            .stretch_and_export_video(
                &VideoAsset::new("portrait.mov"),
                AspectRatio::Ratio16x9,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(StretchError::Export(_))));
        let output = backend.jobs.lock().unwrap()[0].output.clone();
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_video_without_track() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracks = sample_tracks();
        tracks.video = None;
        let (engine, backend) = engine(FakeBackend::new(tracks), temp_dir.path());

        let result = engine
            .stretch_and_export_video(
                &VideoAsset::new("audio-only.m4a"),
                AspectRatio::Ratio16x9,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(StretchError::TrackMissing(_))));
        assert!(backend.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (engine, backend) = engine(FakeBackend::new(sample_tracks()), temp_dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine
            .stretch(
                MediaAsset::Video(VideoAsset::new("clip.mov")),
                AspectRatio::Ratio4x3,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(StretchError::Cancelled)));
        assert!(backend.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_image() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine(FakeBackend::new(sample_tracks()), temp_dir.path());

        let output = engine
            .stretch(
                MediaAsset::Image(ImageAsset::new(DynamicImage::new_rgb8(90, 160))),
                AspectRatio::Ratio1x1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match output {
            StretchOutput::Image(image) => assert_eq!((image.width(), image.height()), (160, 160)),
            other => panic!("expected image output, got {:?}", other.kind()),
        }
    }
}
