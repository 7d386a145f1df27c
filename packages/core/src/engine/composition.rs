//! Editable composition and render instructions for video export
//!
//! A [`Composition`] is a timeline of source track segments; a
//! [`VideoComposition`] describes how the video track is drawn onto the
//! output canvas while exporting.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StretchError, StretchResult};
use crate::transform::AffineTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeRange {
    pub const fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// Range starting at zero
    pub const fn from_zero(duration: Duration) -> Self {
        Self::new(Duration::ZERO, duration)
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A segment of a source track placed on the composition timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionTrack {
    /// Position of this track inside the composition
    pub id: usize,
    pub kind: TrackKind,
    /// Stream index in the source container
    pub source_index: usize,
    pub source_range: TimeRange,
    pub insert_at: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    source: PathBuf,
    tracks: Vec<CompositionTrack>,
}

impl Composition {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            tracks: Vec::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Insert `range` of a source track at `at`.
    ///
    /// `track_duration` is the length of the source track when known. Ranges
    /// that overrun it are clamped to its end; empty ranges and ranges that
    /// start past the end are rejected.
    pub fn insert_time_range(
        &mut self,
        kind: TrackKind,
        source_index: usize,
        range: TimeRange,
        track_duration: Option<Duration>,
        at: Duration,
    ) -> StretchResult<&CompositionTrack> {
        if range.is_empty() {
            return Err(StretchError::Composition(format!(
                "Cannot insert an empty {:?} range from stream {}",
                kind, source_index
            )));
        }

        let range = match track_duration {
            Some(limit) if range.start >= limit => {
                return Err(StretchError::Composition(format!(
                    "{:?} range starting at {:?} is past the end of stream {} ({:?})",
                    kind, range.start, source_index, limit
                )));
            }
            Some(limit) if range.end() > limit => {
                TimeRange::new(range.start, limit - range.start)
            }
            _ => range,
        };

        let id = self.tracks.len();
        self.tracks.push(CompositionTrack {
            id,
            kind,
            source_index,
            source_range: range,
            insert_at: at,
        });
        Ok(&self.tracks[id])
    }

    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    pub fn video_track(&self) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_track(&self) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Audio)
    }

    /// End of the last segment on the timeline
    pub fn duration(&self) -> Duration {
        self.tracks
            .iter()
            .map(|t| t.insert_at + t.source_range.duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

/// Transform applied to one composition track from `at` onwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInstruction {
    pub track_id: usize,
    pub transform: AffineTransform,
    pub at: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionInstruction {
    pub time_range: TimeRange,
    pub layers: Vec<LayerInstruction>,
}

/// Render settings used while exporting a composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoComposition {
    pub render_width: u32,
    pub render_height: u32,
    pub frame_duration: Duration,
    pub instructions: Vec<CompositionInstruction>,
}

impl VideoComposition {
    pub fn frame_rate(&self) -> f64 {
        1.0 / self.frame_duration.as_secs_f64()
    }

    /// The transform in effect for `track_id` at time zero
    pub fn initial_transform(&self, track_id: usize) -> Option<AffineTransform> {
        self.instructions
            .iter()
            .filter(|i| i.time_range.start.is_zero())
            .flat_map(|i| i.layers.iter())
            .find(|l| l.track_id == track_id && l.at.is_zero())
            .map(|l| l.transform)
    }
}

/// Quality preset requested from the exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportPreset {
    #[default]
    HighestQuality,
}

/// Everything an exporter needs to write one output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub composition: Composition,
    pub video_composition: VideoComposition,
    pub preset: ExportPreset,
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_insert_video_and_audio() {
        let mut comp = Composition::new("in.mp4");
        comp.insert_time_range(
            TrackKind::Video,
            0,
            TimeRange::from_zero(secs(10)),
            Some(secs(10)),
            Duration::ZERO,
        )
        .unwrap();
        comp.insert_time_range(
            TrackKind::Audio,
            1,
            TimeRange::from_zero(secs(10)),
            None,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(comp.tracks().len(), 2);
        assert_eq!(comp.video_track().unwrap().id, 0);
        assert_eq!(comp.audio_track().unwrap().source_index, 1);
        assert_eq!(comp.duration(), secs(10));
    }

    #[test]
    fn test_overrun_is_clamped() {
        let mut comp = Composition::new("in.mp4");
        let track = comp
            .insert_time_range(
                TrackKind::Audio,
                1,
                TimeRange::from_zero(secs(10)),
                Some(Duration::from_millis(9_950)),
                Duration::ZERO,
            )
            .unwrap();
        assert_eq!(track.source_range.duration, Duration::from_millis(9_950));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let mut comp = Composition::new("in.mp4");
        let empty = comp.insert_time_range(
            TrackKind::Video,
            0,
            TimeRange::from_zero(Duration::ZERO),
            None,
            Duration::ZERO,
        );
        assert!(matches!(empty, Err(StretchError::Composition(_))));

        let past_end = comp.insert_time_range(
            TrackKind::Video,
            0,
            TimeRange::new(secs(5), secs(1)),
            Some(secs(5)),
            Duration::ZERO,
        );
        assert!(past_end.is_err());
        assert!(comp.tracks().is_empty());
        assert_eq!(comp.duration(), Duration::ZERO);
    }

    #[test]
    fn test_initial_transform_lookup() {
        let transform = AffineTransform::scale(2.0, 1.0);
        let vc = VideoComposition {
            render_width: 100,
            render_height: 50,
            frame_duration: Duration::from_secs_f64(1.0 / 25.0),
            instructions: vec![CompositionInstruction {
                time_range: TimeRange::from_zero(secs(3)),
                layers: vec![LayerInstruction {
                    track_id: 0,
                    transform,
                    at: Duration::ZERO,
                }],
            }],
        };
        assert_eq!(vc.initial_transform(0), Some(transform));
        assert_eq!(vc.initial_transform(1), None);
        assert!((vc.frame_rate() - 25.0).abs() < 1e-6);
    }
}
