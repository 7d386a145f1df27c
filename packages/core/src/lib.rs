//! Stretch core: aspect-ratio stretching for still images and videos.
//!
//! Sizing is pure ([`sizing`]); the [`engine`] re-renders images in memory
//! and exports videos through a [`VideoBackend`]; [`batch`] runs a selection
//! through the engine into a library.

pub mod aspect_ratio;
pub mod batch;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod library;
pub mod media;
pub mod sizing;
pub mod transform;

pub use aspect_ratio::{AspectRatio, RatioOrientation};
pub use batch::{spawn_batch, BatchHandle, BatchProcessor, BatchProgress, BatchReport, ItemFailure};
pub use config::{BatchSettings, ImageSettings, ResampleFilter, StretchConfig, VideoCodec, VideoSettings};
pub use encoder::FfmpegBackend;
pub use engine::{StretchEngine, VideoBackend};
pub use error::{ErrorCategory, StretchError, StretchResult};
pub use library::{
    AssetSource, BatchItem, DirectoryLibrary, FsAssetSource, LibraryAccess, LibraryToken,
    PersistenceSink,
};
pub use media::{ImageAsset, MediaAsset, MediaKind, StretchOutput, VideoAsset, VideoTracks};
pub use sizing::{compute_stretched_size, compute_video_canvas, Dimensions};
pub use transform::{AffineTransform, QuarterTurn};
