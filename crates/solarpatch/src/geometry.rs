//! Patch placement on the canvas.
//!
//! A patch's absolute rectangle is derived from the canvas frame and the
//! patch's own reference pixel:
//!
//! ```text
//! y1 = round(S - CRPIX2_canvas - CRPIX2_patch),  y2 = y1 + H
//! x1 = round(S - CRPIX1_canvas - CRPIX1_patch),  x2 = x1 + W
//! ```
//!
//! The vertical origin of the observation frame is flipped with respect to
//! canvas storage, hence the subtraction from the side length `S`. Rounding
//! is half-to-even so half-pixel offsets do not drift in one direction.

use crate::error::GeometryError;
use crate::frame::ReferenceFrame;
use crate::patch::Patch;

/// Absolute canvas bounds of one patch: rows `y1..y2`, columns `x1..x2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResolvedRectangle {
    pub y1: i64,
    pub y2: i64,
    pub x1: i64,
    pub x2: i64,
    pub region_id: i64,
}

impl ResolvedRectangle {
    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    /// True when every covered pixel lies in `[0, side)` on both axes.
    pub fn is_within(&self, side: u32) -> bool {
        let side = i64::from(side);
        self.y1 >= 0 && self.x1 >= 0 && self.y2 <= side && self.x2 <= side
    }

    /// `(y1, y2, x1, x2)`.
    pub fn bounds(&self) -> (i64, i64, i64, i64) {
        (self.y1, self.y2, self.x1, self.x2)
    }
}

/// A rectangle together with the frame it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: ResolvedRectangle,
    pub frame: ReferenceFrame,
}

/// Resolve the canvas rectangle of `patch` in `frame` (the frame of canvas
/// `canvas_id`).
pub fn resolve_rectangle(
    canvas_id: &str,
    frame: &ReferenceFrame,
    patch: &Patch,
) -> Result<Placement, GeometryError> {
    let region_id = patch.region_id();
    let (h, w) = patch.shape();
    let side = f64::from(frame.side);

    let round = |value: f64, keyword: &'static str| {
        round_pixel(value).ok_or_else(|| GeometryError::NonFiniteOffset {
            canvas_id: canvas_id.to_string(),
            region_id,
            keyword,
            value,
        })
    };
    let y1 = round(side - frame.crpix2 - patch.crpix2(), "CRPIX2")?;
    let x1 = round(side - frame.crpix1 - patch.crpix1(), "CRPIX1")?;

    Ok(Placement {
        rect: ResolvedRectangle {
            y1,
            y2: y1 + i64::from(h),
            x1,
            x2: x1 + i64::from(w),
            region_id,
        },
        frame: *frame,
    })
}

fn round_pixel(value: f64) -> Option<i64> {
    let rounded = value.round_ties_even();
    // Anything this far out cannot address a real canvas anyway.
    if !rounded.is_finite() || rounded.abs() > i32::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

/// Check that `placement` targets the canvas described by `frame`/`canvas_id`
/// and that a bitmap of `(height, width)` fills it exactly.
pub fn validate_placement(
    canvas_id: &str,
    frame: &ReferenceFrame,
    placement: &Placement,
    (height, width): (u32, u32),
) -> Result<(), GeometryError> {
    let rect = &placement.rect;
    if placement.frame != *frame {
        return Err(GeometryError::FrameMismatch {
            canvas_id: canvas_id.to_string(),
            region_id: rect.region_id,
            rect_crpix1: placement.frame.crpix1,
            rect_crpix2: placement.frame.crpix2,
            rect_side: placement.frame.side,
            crpix1: frame.crpix1,
            crpix2: frame.crpix2,
            side: frame.side,
        });
    }
    if rect.height() != i64::from(height) || rect.width() != i64::from(width) {
        return Err(GeometryError::ShapeMismatch {
            canvas_id: canvas_id.to_string(),
            region_id: rect.region_id,
            width,
            height,
            rect_width: rect.width(),
            rect_height: rect.height(),
        });
    }
    if !rect.is_within(frame.side) {
        return Err(GeometryError::OutOfBounds {
            canvas_id: canvas_id.to_string(),
            rect: *rect,
            side: frame.side,
        });
    }
    Ok(())
}
