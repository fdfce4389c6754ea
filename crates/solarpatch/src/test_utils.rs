//! Shared fixtures for canvas and patch unit tests.

use rand::Rng;

use crate::frame::{DiskKeys, ReferenceFrame};
use crate::patch::{CodeBitmap, Patch};

/// Disk keys with a plate scale of one pixel per arcsecond, so
/// `radius` is both `RSUN_OBS` and the disk radius in pixels.
pub(crate) fn keys_centered(crpix1: f64, crpix2: f64, radius: f64) -> DiskKeys {
    DiskKeys {
        crpix1,
        crpix2,
        rsun_obs: radius,
        cdelt1: 1.0,
        t_obs: None,
    }
}

pub(crate) fn frame(crpix1: f64, crpix2: f64, side: u32) -> ReferenceFrame {
    ReferenceFrame {
        crpix1,
        crpix2,
        side,
    }
}

/// Row-major rows to a code bitmap.
pub(crate) fn bitmap(rows: &[Vec<u16>]) -> CodeBitmap {
    let h = rows.len() as u32;
    let w = rows.first().map_or(0, Vec::len) as u32;
    CodeBitmap::from_fn(w, h, |x, y| image::Luma([rows[y as usize][x as usize]]))
}

/// `h x w` patch filled with `value`.
pub(crate) fn uniform_patch(
    region_id: i64,
    crpix1: f64,
    crpix2: f64,
    h: u32,
    w: u32,
    value: u16,
) -> Patch {
    Patch::new(
        region_id,
        crpix1,
        crpix2,
        CodeBitmap::from_pixel(w, h, image::Luma([value])),
    )
    .expect("non-empty patch")
}

/// Patch whose rectangle in `frame` starts at row `y1`, column `x1`.
pub(crate) fn patch_at(
    frame: &ReferenceFrame,
    region_id: i64,
    y1: i64,
    x1: i64,
    rows: &[Vec<u16>],
) -> Patch {
    let side = f64::from(frame.side);
    let crpix2 = side - frame.crpix2 - y1 as f64;
    let crpix1 = side - frame.crpix1 - x1 as f64;
    Patch::from_rows(region_id, crpix1, crpix2, rows).expect("valid rows")
}

/// `count` in-bounds patches with distinct region ids, random extents up to
/// `max_side` and codes in `0..=max_code` (about a third background).
pub(crate) fn random_patches<R: Rng>(
    rng: &mut R,
    frame: &ReferenceFrame,
    count: usize,
    max_side: u32,
    max_code: u16,
) -> Vec<Patch> {
    let max_side = max_side.clamp(1, frame.side);
    (0..count)
        .map(|i| {
            let h = rng.gen_range(1..=max_side);
            let w = rng.gen_range(1..=max_side);
            let y1 = rng.gen_range(0..=frame.side - h);
            let x1 = rng.gen_range(0..=frame.side - w);
            let rows: Vec<Vec<u16>> = (0..h)
                .map(|_| {
                    (0..w)
                        .map(|_| {
                            if rng.gen_bool(0.35) {
                                0
                            } else {
                                rng.gen_range(1..=max_code)
                            }
                        })
                        .collect()
                })
                .collect();
            patch_at(frame, 1000 + i as i64, i64::from(y1), i64::from(x1), &rows)
        })
        .collect()
}
