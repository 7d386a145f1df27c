//! Sequential batch pipeline
//!
//! Loads, stretches and persists a selection one item at a time. Per-item
//! failures are recorded and the batch moves on; only the up-front checks
//! (selection size, library authorization) abort the whole run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aspect_ratio::AspectRatio;
use crate::engine::StretchEngine;
use crate::error::{ErrorCategory, StretchError, StretchResult};
use crate::library::{AssetSource, BatchItem, LibraryAccess, PersistenceSink};
use crate::media::{MediaKind, StretchOutput};

/// Items finished so far, successful or not
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total,
        }
    }

    /// Completion in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Position in the selection
    pub index: usize,
    pub path: PathBuf,
    /// Unknown when the item could not be loaded
    pub kind: Option<MediaKind>,
    pub category: ErrorCategory,
    pub message: String,
    /// Exported file left on disk after the library rejected it
    pub retained_output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub images_saved: usize,
    pub videos_saved: usize,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn start(total: usize) -> Self {
        let now = Utc::now();
        Self {
            total,
            images_saved: 0,
            videos_saved: 0,
            failures: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn saved(&self) -> usize {
        self.images_saved + self.videos_saved
    }

    pub fn is_success(&self) -> bool {
        self.saved() > 0
    }

    pub fn failures_by_category(&self) -> BTreeMap<ErrorCategory, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.category).or_insert(0) += 1;
        }
        counts
    }

    /// One line for the user: what was saved, or a generic failure notice,
    /// followed by an error count per category
    pub fn summary(&self) -> String {
        let mut summary = if self.is_success() {
            format!(
                "Saved {} and {}",
                plural(self.images_saved, "image"),
                plural(self.videos_saved, "video")
            )
        } else {
            "Failed to process the selected items".to_string()
        };

        if !self.failures.is_empty() {
            let categories: Vec<String> = self
                .failures_by_category()
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            summary.push_str(&format!(
                " ({} failed; {})",
                self.failures.len(),
                categories.join(", ")
            ));
        }
        if self.cancelled {
            summary.push_str(" [cancelled]");
        }
        summary
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Error for a single item, with whatever was learned before it failed
struct ItemError {
    error: StretchError,
    kind: Option<MediaKind>,
    retained_output: Option<PathBuf>,
}

impl ItemError {
    fn new(error: StretchError, kind: Option<MediaKind>) -> Self {
        Self {
            error,
            kind,
            retained_output: None,
        }
    }
}

/// Runs selections through the engine into the library
pub struct BatchProcessor {
    engine: StretchEngine,
    source: Arc<dyn AssetSource>,
    sink: Arc<dyn PersistenceSink>,
    access: Arc<dyn LibraryAccess>,
}

impl BatchProcessor {
    pub fn new(
        engine: StretchEngine,
        source: Arc<dyn AssetSource>,
        sink: Arc<dyn PersistenceSink>,
        access: Arc<dyn LibraryAccess>,
    ) -> Self {
        Self {
            engine,
            source,
            sink,
            access,
        }
    }

    /// Process `items` in order, publishing progress after every item.
    ///
    /// Returns an error only when the batch could not start. Cancellation
    /// stops before the next item and yields a report marked `cancelled`.
    pub async fn run(
        &self,
        items: &[BatchItem],
        target: AspectRatio,
        progress: &watch::Sender<BatchProgress>,
        cancel: &CancellationToken,
    ) -> StretchResult<BatchReport> {
        let max_selection = self.engine.config().batch.max_selection;
        if items.is_empty() {
            return Err(StretchError::Configuration("No items selected".to_string()));
        }
        if items.len() > max_selection {
            return Err(StretchError::Configuration(format!(
                "Selected {} items, at most {} are allowed",
                items.len(),
                max_selection
            )));
        }

        let token = self.access.authorize().await?;
        debug!("Library access granted at {}", token.granted_at);

        let total = items.len();
        let mut report = BatchReport::start(total);
        progress.send_replace(BatchProgress::new(total));
        info!("Stretching {} items to {}", total, target.display_name());

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.process_item(item, target, cancel).await {
                Ok(MediaKind::Image) => report.images_saved += 1,
                Ok(MediaKind::Video) => report.videos_saved += 1,
                Err(ItemError {
                    error: StretchError::Cancelled,
                    ..
                }) => {
                    report.cancelled = true;
                    break;
                }
                Err(failure) => {
                    warn!(
                        "Item {} ({}) failed: {}",
                        index,
                        item.path.display(),
                        failure.error
                    );
                    report.failures.push(ItemFailure {
                        index,
                        path: item.path.clone(),
                        kind: failure.kind,
                        category: failure.error.category(),
                        message: failure.error.to_string(),
                        retained_output: failure.retained_output,
                    });
                }
            }

            progress.send_replace(BatchProgress {
                processed: index + 1,
                total,
            });
        }

        report.finished_at = Utc::now();
        if report.cancelled {
            info!("Batch cancelled: {}", report.summary());
        } else {
            info!("Batch finished: {}", report.summary());
        }
        Ok(report)
    }

    async fn process_item(
        &self,
        item: &BatchItem,
        target: AspectRatio,
        cancel: &CancellationToken,
    ) -> Result<MediaKind, ItemError> {
        let asset = self
            .source
            .load(item)
            .await
            .map_err(|e| ItemError::new(e, None))?;
        let kind = asset.kind();

        let output = self
            .engine
            .stretch(asset, target, cancel)
            .await
            .map_err(|e| ItemError::new(e, Some(kind)))?;

        match output {
            StretchOutput::Image(image) => {
                self.sink
                    .persist_image(&image)
                    .await
                    .map_err(|e| ItemError::new(e, Some(kind)))?;
            }
            StretchOutput::Video(path) => {
                if let Err(error) = self.sink.persist_video(&path).await {
                    return Err(ItemError {
                        error,
                        kind: Some(kind),
                        retained_output: Some(path),
                    });
                }
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove temporary file {}: {}", path.display(), e);
                }
            }
        }

        debug!("Stretched {} ({})", item.path.display(), kind);
        Ok(kind)
    }
}

/// A batch running on its own task
pub struct BatchHandle {
    progress: watch::Receiver<BatchProgress>,
    cancel: CancellationToken,
    task: JoinHandle<StretchResult<BatchReport>>,
}

impl BatchHandle {
    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop after the current item and abort any running export
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> StretchResult<BatchReport> {
        self.task.await.map_err(|e| {
            if e.is_cancelled() {
                StretchError::Cancelled
            } else {
                StretchError::Io(std::io::Error::other(format!("Batch task failed: {}", e)))
            }
        })?
    }
}

/// Run `items` through `processor` on a dedicated task
pub fn spawn_batch(
    processor: Arc<BatchProcessor>,
    items: Vec<BatchItem>,
    target: AspectRatio,
) -> BatchHandle {
    let (tx, rx) = watch::channel(BatchProgress::new(items.len()));
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        processor.run(&items, target, &tx, &task_cancel).await
    });

    BatchHandle {
        progress: rx,
        cancel,
        task,
    }
}
