//! Track metadata from `ffprobe` JSON output

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{StretchError, StretchResult};
use crate::media::{AudioTrackInfo, VideoTrackInfo, VideoTracks};
use crate::sizing::Dimensions;
use crate::transform::AffineTransform;

/// Arguments passed to ffprobe before the input path
pub const PROBE_ARGS: [&str; 7] = [
    "-v",
    "error",
    "-print_format",
    "json",
    "-show_streams",
    "-show_format",
    "-i",
];

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

impl FfprobeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    /// Clockwise display rotation in degrees, normalised to 0..360
    fn clockwise_rotation(&self) -> i64 {
        // Display matrix rotation is counter-clockwise; the legacy tag is clockwise
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|ccw| -ccw)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }

    fn frame_rate(&self) -> Option<f64> {
        self.avg_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .or_else(|| self.r_frame_rate.as_deref().and_then(parse_rational))
    }
}

/// Parse `"30000/1001"` or `"25"`; zero denominators yield `None`
pub fn parse_rational(value: &str) -> Option<f64> {
    let parsed = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}

fn parse_duration(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Preferred transform for samples of `width` x `height` that must be turned
/// `degrees` clockwise for display
pub fn transform_for_rotation(degrees: i64, width: f64, height: f64) -> AffineTransform {
    match degrees.rem_euclid(360) {
        90 => AffineTransform::new(0.0, 1.0, -1.0, 0.0, height, 0.0),
        180 => AffineTransform::new(-1.0, 0.0, 0.0, -1.0, width, height),
        270 => AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, width),
        _ => AffineTransform::IDENTITY,
    }
}

/// Build [`VideoTracks`] from raw ffprobe JSON
pub fn parse_probe_output(path: &Path, json: &[u8]) -> StretchResult<VideoTracks> {
    let output: FfprobeOutput = serde_json::from_slice(json).map_err(|e| {
        StretchError::decode(format!("Failed to parse ffprobe output for {:?}: {}", path, e))
    })?;

    let video = output
        .streams
        .iter()
        .find(|s| s.is("video") && s.disposition.attached_pic == 0)
        .and_then(|s| {
            let (width, height) = (s.width?, s.height?);
            let natural_size = Dimensions::from_pixels(width, height);
            Some(VideoTrackInfo {
                index: s.index,
                natural_size,
                preferred_transform: transform_for_rotation(
                    s.clockwise_rotation(),
                    natural_size.width,
                    natural_size.height,
                ),
                nominal_frame_rate: s.frame_rate(),
                duration: parse_duration(s.duration.as_deref()),
            })
        });

    let audio = output
        .streams
        .iter()
        .find(|s| s.is("audio"))
        .map(|s| AudioTrackInfo {
            index: s.index,
            duration: parse_duration(s.duration.as_deref()),
        });

    let duration = parse_duration(output.format.as_ref().and_then(|f| f.duration.as_deref()))
        .or_else(|| video.as_ref().and_then(|v| v.duration))
        .unwrap_or(Duration::ZERO);

    Ok(VideoTracks {
        video,
        audio,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::QuarterTurn;

    const PHONE_CLIP: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30000/1001",
                "r_frame_rate": "30/1",
                "duration": "12.012000",
                "side_data_list": [
                    { "side_data_type": "Display Matrix", "rotation": -90 }
                ]
            },
            {
                "index": 1,
                "codec_type": "audio",
                "duration": "12.000000"
            }
        ],
        "format": { "duration": "12.012000" }
    }"#;

    #[test]
    fn test_parse_phone_clip() {
        let tracks = parse_probe_output(Path::new("clip.mov"), PHONE_CLIP.as_bytes()).unwrap();
        let video = tracks.video.as_ref().unwrap();
        assert_eq!(video.index, 0);
        assert_eq!(video.natural_size, Dimensions::new(1920.0, 1080.0));
        assert!((video.nominal_frame_rate.unwrap() - 29.97).abs() < 0.001);
        assert_eq!(
            video.preferred_transform.quarter_turn_direction(),
            Some(QuarterTurn::Clockwise)
        );
        assert_eq!(tracks.audio.as_ref().unwrap().index, 1);
        assert!((tracks.duration.as_secs_f64() - 12.012).abs() < 1e-6);
        assert_eq!(tracks.formatted_duration(), "0:12");
    }

    #[test]
    fn test_legacy_rotate_tag() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "video", "width": 640, "height": 480,
                  "avg_frame_rate": "0/0", "r_frame_rate": "25/1",
                  "tags": { "rotate": "270" } }
            ],
            "format": {}
        }"#;
        let tracks = parse_probe_output(Path::new("old.mp4"), json.as_bytes()).unwrap();
        let video = tracks.video.unwrap();
        assert_eq!(video.nominal_frame_rate, Some(25.0));
        assert_eq!(
            video.preferred_transform.quarter_turn_direction(),
            Some(QuarterTurn::CounterClockwise)
        );
        assert!(tracks.audio.is_none());
        assert_eq!(tracks.duration, Duration::ZERO);
    }

    #[test]
    fn test_no_video_track() {
        let json = r#"{
            "streams": [
                { "index": 0, "codec_type": "audio", "duration": "3.0" },
                { "index": 1, "codec_type": "video", "width": 600, "height": 600,
                  "disposition": { "attached_pic": 1 } }
            ],
            "format": { "duration": "3.0" }
        }"#;
        let tracks = parse_probe_output(Path::new("song.m4a"), json.as_bytes()).unwrap();
        assert!(tracks.video.is_none());
        assert!(tracks.audio.is_some());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = parse_probe_output(Path::new("x"), b"not json");
        assert!(matches!(result, Err(StretchError::Decode(_))));
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("30/1"), Some(30.0));
        assert_eq!(parse_rational("24"), Some(24.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }

    #[test]
    fn test_transform_for_rotation() {
        assert!(transform_for_rotation(0, 10.0, 20.0).is_identity());
        assert!(transform_for_rotation(-90, 10.0, 20.0).is_quarter_turn());
        let half = transform_for_rotation(180, 10.0, 20.0);
        assert!(!half.is_quarter_turn());
        assert_eq!(half.apply(0.0, 0.0), (10.0, 20.0));
        // Clockwise turn keeps the picture in the positive quadrant
        let cw = transform_for_rotation(90, 1920.0, 1080.0);
        assert_eq!(cw.apply(0.0, 0.0), (1080.0, 0.0));
        assert_eq!(cw.apply(1920.0, 1080.0), (0.0, 1920.0));
    }
}
