//! Merge patch bitmaps into the canvas.
//!
//! Foreground (non-zero) patch pixels replace the canvas value with
//! `max(canvas, patch)`, with `NaN` ranking below every code. Background
//! pixels never write. The rule is commutative and associative, so the
//! final canvas does not depend on the order patches are merged in.

use crate::canvas::Canvas;
use crate::error::GeometryError;
use crate::geometry::{validate_placement, Placement};
use crate::patch::CodeBitmap;

/// Merged value of one canvas cell and one foreground code.
#[inline]
pub fn merge_value(current: f32, code: u16) -> f32 {
    let code = f32::from(code);
    if current.is_nan() || code > current {
        code
    } else {
        current
    }
}

/// Statistics of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Foreground pixels in the patch.
    pub foreground: usize,
    /// Canvas cells whose value changed.
    pub changed: usize,
}

/// Merge `bitmap` into `canvas` at `placement`.
///
/// Fails without touching the canvas if the placement was resolved in a
/// different frame, lies outside the canvas, or does not match the bitmap
/// shape.
pub fn composite_patch(
    canvas: &mut Canvas,
    placement: &Placement,
    bitmap: &CodeBitmap,
) -> Result<MergeStats, GeometryError> {
    validate_placement(
        canvas.id(),
        canvas.frame(),
        placement,
        (bitmap.height(), bitmap.width()),
    )?;

    // Bounds were checked above, so the origin is non-negative and in range.
    let x0 = placement.rect.x1 as u32;
    let y0 = placement.rect.y1 as u32;
    let data = canvas.buffer_mut();

    let mut stats = MergeStats::default();
    for (x, y, px) in bitmap.enumerate_pixels() {
        let code = px[0];
        if code == 0 {
            continue;
        }
        stats.foreground += 1;
        let cell = data.get_pixel_mut(x0 + x, y0 + y);
        let merged = merge_value(cell[0], code);
        if merged.to_bits() != cell[0].to_bits() {
            cell[0] = merged;
            stats.changed += 1;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DISK_VALUE;
    use crate::geometry::resolve_rectangle;
    use crate::test_utils::{frame, keys_centered, patch_at, uniform_patch};

    fn scenario_canvas() -> Canvas {
        Canvas::synthetic("scenario", &keys_centered(5.0, 5.0, 3.0), 10).expect("canvas")
    }

    #[test]
    fn merge_value_orders_nan_below_codes() {
        assert_eq!(merge_value(f32::NAN, 1), 1.0);
        assert_eq!(merge_value(1.0, 2), 2.0);
        assert_eq!(merge_value(33.0, 2), 33.0);
    }

    #[test]
    fn foreground_overwrites_and_background_is_ignored() {
        let mut canvas = scenario_canvas();
        let patch = patch_at(canvas.frame(), 1, 4, 4, &[vec![2, 2], vec![2, 0]]);
        let placement = resolve_rectangle(canvas.id(), canvas.frame(), &patch).unwrap();
        assert_eq!(placement.rect.bounds(), (4, 6, 4, 6));

        let stats = composite_patch(&mut canvas, &placement, patch.bitmap()).unwrap();
        assert_eq!(stats.foreground, 3);
        assert_eq!(stats.changed, 3);
        assert_eq!(canvas.get(4, 4), Some(2.0));
        assert_eq!(canvas.get(4, 5), Some(2.0));
        assert_eq!(canvas.get(5, 4), Some(2.0));
        assert_eq!(canvas.get(5, 5), Some(DISK_VALUE));
    }

    #[test]
    fn higher_code_wins_in_either_order() {
        let frame = *scenario_canvas().frame();
        let low = patch_at(&frame, 1, 4, 4, &[vec![2, 2], vec![2, 0]]);
        let high = patch_at(&frame, 2, 4, 4, &[vec![3, 3], vec![3, 0]]);

        let mut a = scenario_canvas();
        let mut b = scenario_canvas();
        for p in [&low, &high] {
            let pl = resolve_rectangle("scenario", &frame, p).unwrap();
            composite_patch(&mut a, &pl, p.bitmap()).unwrap();
        }
        for p in [&high, &low] {
            let pl = resolve_rectangle("scenario", &frame, p).unwrap();
            composite_patch(&mut b, &pl, p.bitmap()).unwrap();
        }
        for (row, col) in [(4, 4), (4, 5), (5, 4)] {
            assert_eq!(a.get(row, col), Some(3.0));
            assert_eq!(b.get(row, col), Some(3.0));
        }
        assert_eq!(a.get(5, 5), Some(DISK_VALUE));
        assert_eq!(
            a.buffer().as_raw().iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.buffer().as_raw().iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn off_disk_cells_accept_foreground() {
        let mut canvas = scenario_canvas();
        assert!(canvas.get(0, 0).unwrap().is_nan());
        let patch = patch_at(canvas.frame(), 9, 0, 0, &[vec![1]]);
        let pl = resolve_rectangle(canvas.id(), canvas.frame(), &patch).unwrap();
        composite_patch(&mut canvas, &pl, patch.bitmap()).unwrap();
        assert_eq!(canvas.get(0, 0), Some(1.0));
    }

    #[test]
    fn equal_code_leaves_cell_unchanged() {
        let mut canvas = scenario_canvas();
        let patch = patch_at(canvas.frame(), 3, 5, 5, &[vec![1]]);
        let pl = resolve_rectangle(canvas.id(), canvas.frame(), &patch).unwrap();
        let stats = composite_patch(&mut canvas, &pl, patch.bitmap()).unwrap();
        assert_eq!(stats.foreground, 1);
        assert_eq!(stats.changed, 0);
    }

    #[test]
    fn out_of_bounds_leaves_canvas_untouched() {
        let mut canvas = scenario_canvas();
        let before = canvas.buffer().clone();
        // x1 = 10 - 5 - (-2) = 7, width 4 -> x2 = 11
        let patch = uniform_patch(77, -2.0, 4.0, 2, 4, 2);
        let pl = resolve_rectangle(canvas.id(), canvas.frame(), &patch).unwrap();
        let err = composite_patch(&mut canvas, &pl, patch.bitmap()).unwrap_err();
        assert!(matches!(err, GeometryError::OutOfBounds { .. }));
        assert_eq!(
            canvas.buffer().as_raw().iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            before.as_raw().iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn placement_from_foreign_frame_is_rejected() {
        let mut canvas = scenario_canvas();
        let foreign = frame(4.0, 5.0, 10);
        let patch = uniform_patch(8, 1.0, 1.0, 2, 2, 2);
        let pl = resolve_rectangle("foreign", &foreign, &patch).unwrap();
        assert!(matches!(
            composite_patch(&mut canvas, &pl, patch.bitmap()),
            Err(GeometryError::FrameMismatch { .. })
        ));
    }
}
