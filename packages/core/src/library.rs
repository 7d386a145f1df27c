//! Collaborators around the engine: where assets come from, where results
//! go, and whether we may write there at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::image::decode_image;
use crate::error::{StretchError, StretchResult};
use crate::media::{ImageAsset, MediaAsset, MediaKind, VideoAsset};

/// Extensions decoded as still images; everything else is treated as video
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp", "tga", "ico", "pnm", "qoi",
    "heic", "heif",
];

/// Still-image containers listed as images but without a decoder
const UNDECODABLE_IMAGE_EXTENSIONS: &[&str] = &["heic", "heif"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// One entry of a user selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub path: PathBuf,
}

impl BatchItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Media kind guessed from the file extension
    pub fn kind(&self) -> MediaKind {
        let is_image = extension_of(&self.path)
            .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false);

        if is_image {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }
}

/// Proof that the library accepted a write authorization
#[derive(Debug, Clone)]
pub struct LibraryToken {
    pub location: PathBuf,
    pub granted_at: DateTime<Utc>,
}

impl LibraryToken {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            granted_at: Utc::now(),
        }
    }
}

/// Turns a selection entry into something the engine can stretch
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn load(&self, item: &BatchItem) -> StretchResult<MediaAsset>;
}

/// Receives finished artifacts
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn persist_image(&self, image: &ImageAsset) -> StretchResult<()>;

    /// Store a copy of the exported file; the caller still owns `path`
    async fn persist_video(&self, path: &Path) -> StretchResult<()>;
}

/// Write permission gate, checked once before a batch starts
#[async_trait]
pub trait LibraryAccess: Send + Sync {
    async fn authorize(&self) -> StretchResult<LibraryToken>;
}

/// Loads selection entries from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsAssetSource;

impl FsAssetSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn load(&self, item: &BatchItem) -> StretchResult<MediaAsset> {
        match item.kind() {
            MediaKind::Image => {
                if let Some(ext) = extension_of(&item.path)
                    .filter(|e| UNDECODABLE_IMAGE_EXTENSIONS.contains(&e.as_str()))
                {
                    return Err(StretchError::decode(format!(
                        "{:?}: {} images are not supported, convert to JPEG or PNG first",
                        item.path,
                        ext.to_ascii_uppercase()
                    )));
                }
                let bytes = tokio::fs::read(&item.path).await.map_err(|e| {
                    StretchError::decode(format!("Failed to read {:?}: {}", item.path, e))
                })?;
                let image = tokio::task::spawn_blocking(move || decode_image(&bytes))
                    .await
                    .map_err(|e| StretchError::decode(format!("Decode task failed: {}", e)))??;
                debug!("Loaded image {:?} ({}x{})", item.path, image.width(), image.height());
                Ok(MediaAsset::Image(image))
            }
            MediaKind::Video => {
                let metadata = tokio::fs::metadata(&item.path).await.map_err(|e| {
                    StretchError::decode(format!("Failed to open {:?}: {}", item.path, e))
                })?;
                if !metadata.is_file() {
                    return Err(StretchError::decode(format!(
                        "{:?} is not a file",
                        item.path
                    )));
                }
                Ok(MediaAsset::Video(VideoAsset::new(&item.path)))
            }
        }
    }
}

/// Output "library" backed by a plain directory
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    dir: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self, extension: &str) -> PathBuf {
        self.dir
            .join(format!("stretched-{}.{}", Uuid::new_v4(), extension))
    }
}

#[async_trait]
impl LibraryAccess for DirectoryLibrary {
    async fn authorize(&self) -> StretchResult<LibraryToken> {
        let denied = |e: std::io::Error| {
            StretchError::PermissionDenied(format!("{}: {}", self.dir.display(), e))
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(denied)?;

        let metadata = tokio::fs::metadata(&self.dir).await.map_err(denied)?;
        if !metadata.is_dir() {
            return Err(StretchError::PermissionDenied(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(StretchError::PermissionDenied(format!(
                "{} is read-only",
                self.dir.display()
            )));
        }

        // Permission bits are not the whole story (mounts, ACLs)
        let check = self.dir.join(format!(".stretch-write-{}", Uuid::new_v4()));
        tokio::fs::write(&check, b"").await.map_err(denied)?;
        if let Err(e) = tokio::fs::remove_file(&check).await {
            warn!("Failed to remove write check file {}: {}", check.display(), e);
        }

        info!("Library authorized at {}", self.dir.display());
        Ok(LibraryToken::new(&self.dir))
    }
}

#[async_trait]
impl PersistenceSink for DirectoryLibrary {
    async fn persist_image(&self, image: &ImageAsset) -> StretchResult<()> {
        let path = self.next_path("png");
        let image = image.clone();
        let target = path.clone();

        tokio::task::spawn_blocking(move || {
            image
                .image()
                .save_with_format(&target, ::image::ImageFormat::Png)
        })
        .await
        .map_err(|e| StretchError::persist(format!("Save task failed: {}", e)))?
        .map_err(|e| StretchError::persist(format!("Failed to write {:?}: {}", path, e)))?;

        info!("Saved image to {}", path.display());
        Ok(())
    }

    async fn persist_video(&self, source: &Path) -> StretchResult<()> {
        let path = self.next_path("mp4");
        tokio::fs::copy(source, &path).await.map_err(|e| {
            StretchError::persist(format!("Failed to copy {:?} to {:?}: {}", source, path, e))
        })?;

        info!("Saved video to {}", path.display());
        Ok(())
    }
}
