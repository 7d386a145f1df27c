//! Target aspect ratios offered for stretching
//!
//! The set is fixed: four landscape-or-square shapes and their portrait
//! counterparts. Each ratio carries its numeric value (width / height),
//! a short label used on the wire and a human display name.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::StretchError;

/// Supported target aspect ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape
    #[default]
    #[serde(rename = "16:9")]
    Ratio16x9,
    /// 3:2 landscape
    #[serde(rename = "3:2")]
    Ratio3x2,
    /// 4:3 landscape
    #[serde(rename = "4:3")]
    Ratio4x3,
    /// 1:1 square
    #[serde(rename = "1:1")]
    Ratio1x1,
    /// 3:4 portrait
    #[serde(rename = "3:4")]
    Ratio3x4,
    /// 2:3 portrait
    #[serde(rename = "2:3")]
    Ratio2x3,
    /// 9:16 portrait
    #[serde(rename = "9:16")]
    Ratio9x16,
}

/// Overall shape of a ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioOrientation {
    Landscape,
    Square,
    Portrait,
}

impl AspectRatio {
    /// Every ratio, in display order
    pub const ALL: [AspectRatio; 7] = [
        AspectRatio::Ratio16x9,
        AspectRatio::Ratio3x2,
        AspectRatio::Ratio4x3,
        AspectRatio::Ratio1x1,
        AspectRatio::Ratio3x4,
        AspectRatio::Ratio2x3,
        AspectRatio::Ratio9x16,
    ];

    /// Width and height terms of the ratio
    pub const fn terms(&self) -> (u32, u32) {
        match self {
            AspectRatio::Ratio16x9 => (16, 9),
            AspectRatio::Ratio3x2 => (3, 2),
            AspectRatio::Ratio4x3 => (4, 3),
            AspectRatio::Ratio1x1 => (1, 1),
            AspectRatio::Ratio3x4 => (3, 4),
            AspectRatio::Ratio2x3 => (2, 3),
            AspectRatio::Ratio9x16 => (9, 16),
        }
    }

    /// Get the ratio as a floating point value (width / height)
    pub fn value(&self) -> f64 {
        let (w, h) = self.terms();
        w as f64 / h as f64
    }

    /// Short label, e.g. `"16:9"`
    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Ratio16x9 => "16:9",
            AspectRatio::Ratio3x2 => "3:2",
            AspectRatio::Ratio4x3 => "4:3",
            AspectRatio::Ratio1x1 => "1:1",
            AspectRatio::Ratio3x4 => "3:4",
            AspectRatio::Ratio2x3 => "2:3",
            AspectRatio::Ratio9x16 => "9:16",
        }
    }

    /// Human readable name shown in pickers
    pub fn display_name(&self) -> String {
        let shape = match self.orientation() {
            RatioOrientation::Landscape => "Landscape",
            RatioOrientation::Square => "Square",
            RatioOrientation::Portrait => "Portrait",
        };
        format!("{} {}", self.label(), shape)
    }

    pub fn orientation(&self) -> RatioOrientation {
        let (w, h) = self.terms();
        match w.cmp(&h) {
            std::cmp::Ordering::Greater => RatioOrientation::Landscape,
            std::cmp::Ordering::Equal => RatioOrientation::Square,
            std::cmp::Ordering::Less => RatioOrientation::Portrait,
        }
    }

    /// Size of the small preview box drawn for this ratio
    ///
    /// The long side is 40 points; the square preview is shrunk to 80% so it
    /// does not look larger than its neighbours.
    pub fn preview_size(&self) -> (f64, f64) {
        const BASE: f64 = 40.0;
        match self.orientation() {
            RatioOrientation::Landscape => (BASE, BASE / self.value()),
            RatioOrientation::Square => (BASE * 0.8, BASE * 0.8),
            RatioOrientation::Portrait => (BASE * self.value(), BASE),
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for AspectRatio {
    type Err = StretchError;

    /// Accepts `"16:9"`, `"16x9"` and `"16/9"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['x', 'X', '/'], ":");
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.label() == normalized)
            .ok_or_else(|| {
                StretchError::Configuration(format!(
                    "Unsupported aspect ratio '{}' (expected one of {})",
                    s,
                    AspectRatio::ALL
                        .iter()
                        .map(|r| r.label())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
