//! 2D affine transforms for video layer placement
//!
//! Transforms use the row-vector convention common to video containers:
//!
//! ```text
//! x' = a*x + c*y + tx
//! y' = b*x + d*y + ty
//! ```
//!
//! `t1.concat(&t2)` applies `t1` first and then `t2`. The `*_by` builders
//! prepend their operation, so `rotation.translated_by(..).scaled_by(..)`
//! scales a point first, then translates it, then rotates it.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direction of a quarter turn, in y-down display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuarterTurn {
    /// 90 degrees: right becomes down
    Clockwise,
    /// 270 degrees: right becomes up
    CounterClockwise,
}

/// Pixel re-arrangement implied by the linear part of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reorientation {
    None,
    Rotate(QuarterTurn),
    HalfTurn,
    HorizontalFlip,
    VerticalFlip,
    /// Mirror across the main diagonal
    Transpose,
    /// Mirror across the anti-diagonal
    AntiTranspose,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Exact quarter-turn rotation; clockwise turns right into down
    pub const fn quarter_turn(turn: QuarterTurn) -> Self {
        match turn {
            QuarterTurn::Clockwise => Self::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0),
            QuarterTurn::CounterClockwise => Self::new(0.0, -1.0, 1.0, 0.0, 0.0, 0.0),
        }
    }

    /// Apply `self`, then `other`
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }

    pub fn translated_by(&self, tx: f64, ty: f64) -> Self {
        Self::translation(tx, ty).concat(self)
    }

    pub fn scaled_by(&self, sx: f64, sy: f64) -> Self {
        Self::scale(sx, sy).concat(self)
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn is_identity(&self) -> bool {
        approx_eq(self.a, 1.0)
            && approx_eq(self.b, 0.0)
            && approx_eq(self.c, 0.0)
            && approx_eq(self.d, 1.0)
            && approx_eq(self.tx, 0.0)
            && approx_eq(self.ty, 0.0)
    }

    /// A transform whose main diagonal is zero swaps the roles of width and
    /// height, i.e. the samples are stored sideways.
    pub fn is_quarter_turn(&self) -> bool {
        approx_eq(self.a, 0.0) && approx_eq(self.d, 0.0)
    }

    /// Direction of the quarter turn, if this is one
    ///
    /// A degenerate all-zero linear part is reported as clockwise.
    pub fn quarter_turn_direction(&self) -> Option<QuarterTurn> {
        if !self.is_quarter_turn() {
            return None;
        }
        if self.b < -EPSILON {
            Some(QuarterTurn::CounterClockwise)
        } else {
            Some(QuarterTurn::Clockwise)
        }
    }

    /// Classify the linear part by sign pattern, ignoring magnitudes
    pub fn reorientation(&self) -> Reorientation {
        if self.is_quarter_turn() {
            let b_pos = self.b > EPSILON;
            let c_pos = self.c > EPSILON;
            return match (b_pos, c_pos) {
                (true, false) => Reorientation::Rotate(QuarterTurn::Clockwise),
                (false, true) => Reorientation::Rotate(QuarterTurn::CounterClockwise),
                (true, true) => Reorientation::Transpose,
                (false, false) if self.b < -EPSILON && self.c < -EPSILON => {
                    Reorientation::AntiTranspose
                }
                _ => Reorientation::Rotate(QuarterTurn::Clockwise),
            };
        }

        match (self.a < -EPSILON, self.d < -EPSILON) {
            (true, true) => Reorientation::HalfTurn,
            (true, false) => Reorientation::HorizontalFlip,
            (false, true) => Reorientation::VerticalFlip,
            (false, false) => Reorientation::None,
        }
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}
