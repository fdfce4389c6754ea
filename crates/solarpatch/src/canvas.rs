//! Full-disk canvas and the synthetic disk mask.
//!
//! The canvas stores one `f32` per pixel: an integer category code, or `NaN`
//! for "outside disk / unobserved". Storage is an `image` buffer indexed as
//! `(x, y) = (col, row)`.

use std::collections::BTreeMap;

use image::{ImageBuffer, Luma};

use crate::error::ConfigurationError;
use crate::frame::{DiskKeys, ReferenceFrame};

/// Canvas pixel storage.
pub type CanvasBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 16-bit category-code image.
pub type CodeImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Value of an on-disk pixel before any patch is composited.
pub const DISK_VALUE: f32 = 1.0;

/// Generate the baseline disk mask.
///
/// Cell `(row, col)` is [`DISK_VALUE`] when
/// `(col - CRPIX2)^2 + (row - CRPIX1)^2 < radius^2`, `NaN` otherwise. Pixels
/// exactly on the radius are outside.
pub fn disk_mask(keys: &DiskKeys, side: u32) -> Result<CanvasBuffer, ConfigurationError> {
    if side == 0 {
        return Err(ConfigurationError::EmptyCanvas);
    }
    let radius = keys.radius_px()?;
    let r2 = radius * radius;

    let mut data = CanvasBuffer::from_pixel(side, side, Luma([f32::NAN]));
    for (col, row, px) in data.enumerate_pixels_mut() {
        let dx = col as f64 - keys.crpix2;
        let dy = row as f64 - keys.crpix1;
        if dx * dx + dy * dy < r2 {
            px[0] = DISK_VALUE;
        }
    }
    Ok(data)
}

/// `NaN` or an integer category code representable in a [`CodeImage`].
fn is_cell_value(v: f32) -> bool {
    v.is_nan() || (v >= 0.0 && v <= f32::from(u16::MAX) && v.fract() == 0.0)
}

/// Per-code pixel counts of a canvas.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CodeHistogram {
    /// Integer code -> number of pixels.
    pub codes: BTreeMap<u16, usize>,
    /// Pixels holding `NaN`.
    pub no_data: usize,
}

/// A full-disk grid owned by one compositing session.
#[derive(Debug, Clone)]
pub struct Canvas {
    id: String,
    frame: ReferenceFrame,
    data: CanvasBuffer,
}

impl Canvas {
    /// Build a synthetic canvas from full-disk keys.
    pub fn synthetic(
        id: impl Into<String>,
        keys: &DiskKeys,
        side: u32,
    ) -> Result<Self, ConfigurationError> {
        let id = id.into();
        let data = disk_mask(keys, side)?;
        tracing::info!(
            "Synthetic canvas '{}': {}x{} px, disk radius {:.2} px at (CRPIX1={:.2}, CRPIX2={:.2})",
            id,
            side,
            side,
            keys.radius_px()?,
            keys.crpix1,
            keys.crpix2,
        );
        Ok(Self {
            id,
            frame: keys.reference_frame(side),
            data,
        })
    }

    /// Wrap an existing grid. It must be square with side `frame.side`, and
    /// every cell must be `NaN` or a non-negative integer code that fits in
    /// 16 bits.
    pub fn from_buffer(
        id: impl Into<String>,
        frame: ReferenceFrame,
        data: CanvasBuffer,
    ) -> Result<Self, ConfigurationError> {
        let id = id.into();
        if frame.side == 0 {
            return Err(ConfigurationError::EmptyCanvas);
        }
        let (w, h) = data.dimensions();
        if w != frame.side || h != frame.side {
            return Err(ConfigurationError::CanvasShape {
                canvas_id: id,
                expected: frame.side,
                width: w,
                height: h,
            });
        }
        let bad = data
            .enumerate_pixels()
            .find(|(_, _, px)| !is_cell_value(px[0]));
        if let Some((col, row, px)) = bad {
            return Err(ConfigurationError::InvalidCanvasValue {
                canvas_id: id,
                row,
                col,
                value: px[0],
            });
        }
        Ok(Self { id, frame, data })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frame(&self) -> &ReferenceFrame {
        &self.frame
    }

    pub fn side(&self) -> u32 {
        self.frame.side
    }

    /// Value at `(row, col)`, or `None` outside the canvas.
    pub fn get(&self, row: u32, col: u32) -> Option<f32> {
        self.data.get_pixel_checked(col, row).map(|p| p[0])
    }

    pub fn buffer(&self) -> &CanvasBuffer {
        &self.data
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut CanvasBuffer {
        &mut self.data
    }

    pub fn into_buffer(self) -> CanvasBuffer {
        self.data
    }

    /// Count pixels per category code.
    pub fn code_histogram(&self) -> CodeHistogram {
        let mut hist = CodeHistogram::default();
        for px in self.data.pixels() {
            let v = px[0];
            if v.is_nan() {
                hist.no_data += 1;
            } else {
                *hist.codes.entry(v as u16).or_insert(0) += 1;
            }
        }
        hist
    }

    /// Export as a 16-bit code image; `NaN` becomes 0.
    pub fn to_code_image(&self) -> CodeImage {
        let side = self.side();
        CodeImage::from_fn(side, side, |x, y| {
            let v = self.data.get_pixel(x, y)[0];
            Luma([if v.is_nan() { 0 } else { v as u16 }])
        })
    }
}
