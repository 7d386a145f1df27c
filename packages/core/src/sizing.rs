//! Canvas sizing for aspect-ratio stretches
//!
//! A stretch only ever grows one side of the canvas until the requested
//! ratio is reached; neither side is ever reduced, so no content is lost.

use serde::{Deserialize, Serialize};

use crate::aspect_ratio::AspectRatio;

/// Width and height in pixels (not necessarily integral)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// Width divided by height
    pub fn ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Width and height exchanged, as seen after a quarter turn
    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Round both sides up to the nearest even integer
    pub fn even_ceil(&self) -> Self {
        Self::new(even_ceil(self.width), even_ceil(self.height))
    }

    /// Whole-pixel size used by renderers (each side at least 1)
    pub fn to_pixels(&self) -> (u32, u32) {
        let clamp = |v: f64| v.round().clamp(1.0, u32::MAX as f64) as u32;
        (clamp(self.width), clamp(self.height))
    }
}

/// Compute the canvas that stretches `original_width` x `original_height`
/// to `target_ratio` (width / height).
///
/// A source wider than the target keeps its width and gains height; a
/// taller source keeps its height and gains width. Matching ratios are
/// returned unchanged.
///
/// # Examples
/// ```
/// use stretch_core::sizing::compute_stretched_size;
///
/// let size = compute_stretched_size(4000.0, 3000.0, 16.0 / 9.0);
/// assert_eq!(size.height, 3000.0);
/// assert!((size.width - 5333.333).abs() < 0.001);
/// ```
pub fn compute_stretched_size(
    original_width: f64,
    original_height: f64,
    target_ratio: f64,
) -> Dimensions {
    let original_ratio = original_width / original_height;

    if original_ratio > target_ratio {
        Dimensions::new(original_width, original_width / target_ratio)
    } else if original_ratio < target_ratio {
        Dimensions::new(original_height * target_ratio, original_height)
    } else {
        Dimensions::new(original_width, original_height)
    }
}

/// Stretched size for a named ratio
pub fn stretched_size(original: Dimensions, target: AspectRatio) -> Dimensions {
    compute_stretched_size(original.width, original.height, target.value())
}

/// Round up to the nearest even integer, as required by 4:2:0 video encoders
pub fn even_ceil(value: f64) -> f64 {
    (value / 2.0).ceil() * 2.0
}

/// Encoder-safe canvas for a video frame: stretched, then rounded up to even
/// integers on both sides.
pub fn compute_video_canvas(original: Dimensions, target: AspectRatio) -> (u32, u32) {
    let canvas = stretched_size(original, target).even_ceil();
    (canvas.width as u32, canvas.height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_ratio(size: Dimensions, ratio: f64) {
        assert!(
            (size.ratio() - ratio).abs() < EPS,
            "ratio {} != {}",
            size.ratio(),
            ratio
        );
    }

    #[test]
    fn test_landscape_to_wider_grows_width() {
        let size = compute_stretched_size(4000.0, 3000.0, AspectRatio::Ratio16x9.value());
        assert_eq!(size.height, 3000.0);
        assert!((size.width - 5333.333_333).abs() < 0.001);
        assert_ratio(size, 16.0 / 9.0);
    }

    #[test]
    fn test_portrait_to_square_grows_width() {
        let size = compute_stretched_size(1080.0, 1920.0, AspectRatio::Ratio1x1.value());
        assert_eq!(size, Dimensions::new(1920.0, 1920.0));
    }

    #[test]
    fn test_wide_to_portrait_grows_height() {
        let size = compute_stretched_size(1920.0, 1080.0, AspectRatio::Ratio9x16.value());
        assert_eq!(size.width, 1920.0);
        assert!((size.height - 3413.333_333).abs() < 0.001);
    }

    #[test]
    fn test_matching_ratio_is_unchanged() {
        let size = compute_stretched_size(1920.0, 1080.0, 16.0 / 9.0);
        assert_eq!(size, Dimensions::new(1920.0, 1080.0));
    }

    #[test]
    fn test_never_shrinks_and_hits_ratio() {
        let sides = [1.0, 3.0, 17.0, 480.0, 1079.0, 1080.0, 1920.0, 4032.0, 7999.5];
        for &w in &sides {
            for &h in &sides {
                for ratio in AspectRatio::ALL {
                    let size = compute_stretched_size(w, h, ratio.value());
                    assert!(size.width >= w, "{}x{} -> {:?}", w, h, size);
                    assert!(size.height >= h, "{}x{} -> {:?}", w, h, size);
                    assert_ratio(size, ratio.value());
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        for ratio in AspectRatio::ALL {
            let once = compute_stretched_size(1234.0, 987.0, ratio.value());
            let twice = compute_stretched_size(once.width, once.height, ratio.value());
            assert!((once.width - twice.width).abs() < EPS);
            assert!((once.height - twice.height).abs() < EPS);
        }
    }

    #[test]
    fn test_even_ceil() {
        assert_eq!(even_ceil(0.0), 0.0);
        assert_eq!(even_ceil(1.0), 2.0);
        assert_eq!(even_ceil(2.0), 2.0);
        assert_eq!(even_ceil(5333.33), 5334.0);
        assert_eq!(even_ceil(1079.0), 1080.0);
    }

    #[test]
    fn test_video_canvas_is_even() {
        let sides = [1u32, 2, 3, 99, 101, 720, 1079, 1080, 1081, 1920, 3840];
        for &w in &sides {
            for &h in &sides {
                for ratio in AspectRatio::ALL {
                    let (cw, ch) = compute_video_canvas(Dimensions::from_pixels(w, h), ratio);
                    assert_eq!(cw % 2, 0, "{}x{} {} -> {}x{}", w, h, ratio, cw, ch);
                    assert_eq!(ch % 2, 0, "{}x{} {} -> {}x{}", w, h, ratio, cw, ch);
                    assert!(cw >= w && ch >= h);
                }
            }
        }
    }

    #[test]
    fn test_video_canvas_scenario() {
        let canvas = compute_video_canvas(Dimensions::from_pixels(4000, 3000), AspectRatio::Ratio16x9);
        assert_eq!(canvas, (5334, 3000));
    }

    #[test]
    fn test_dimensions_helpers() {
        let d = Dimensions::new(1920.4, 1079.6);
        assert_eq!(d.to_pixels(), (1920, 1080));
        assert_eq!(d.swapped(), Dimensions::new(1079.6, 1920.4));
        assert!(d.is_positive());
        assert!(!Dimensions::new(0.0, 10.0).is_positive());
        assert_eq!(Dimensions::new(0.2, 0.1).to_pixels(), (1, 1));
    }
}
