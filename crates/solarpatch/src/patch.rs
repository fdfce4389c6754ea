//! Region-of-interest patches and their wire form.

use image::{ImageBuffer, Luma};

use crate::error::GeometryError;

/// Per-pixel category codes of one patch, indexed `(x, y) = (col, row)`.
pub type CodeBitmap = ImageBuffer<Luma<u16>, Vec<u16>>;

/// One rectangular region of interest. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Patch {
    region_id: i64,
    crpix1: f64,
    crpix2: f64,
    bitmap: CodeBitmap,
}

impl Patch {
    /// Build a patch from an existing bitmap. Empty bitmaps are rejected.
    pub fn new(
        region_id: i64,
        crpix1: f64,
        crpix2: f64,
        bitmap: CodeBitmap,
    ) -> Result<Self, GeometryError> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(GeometryError::EmptyPatch { region_id });
        }
        Ok(Self {
            region_id,
            crpix1,
            crpix2,
            bitmap,
        })
    }

    /// Build a patch from row-major nested rows.
    pub fn from_rows(
        region_id: i64,
        crpix1: f64,
        crpix2: f64,
        rows: &[Vec<u16>],
    ) -> Result<Self, GeometryError> {
        let bitmap = bitmap_from_rows(region_id, rows)?;
        Self::new(region_id, crpix1, crpix2, bitmap)
    }

    /// Region identifier (HARP or TARP number).
    pub fn region_id(&self) -> i64 {
        self.region_id
    }

    pub fn crpix1(&self) -> f64 {
        self.crpix1
    }

    pub fn crpix2(&self) -> f64 {
        self.crpix2
    }

    pub fn bitmap(&self) -> &CodeBitmap {
        &self.bitmap
    }

    /// `(height, width)` of the bitmap.
    pub fn shape(&self) -> (u32, u32) {
        (self.bitmap.height(), self.bitmap.width())
    }
}

/// Patch as delivered by the metadata layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatchRecord {
    pub region_id: i64,
    #[serde(rename = "CRPIX1")]
    pub crpix1: f64,
    #[serde(rename = "CRPIX2")]
    pub crpix2: f64,
    /// Row-major category codes.
    pub bitmap: Vec<Vec<u16>>,
}

impl TryFrom<&PatchRecord> for Patch {
    type Error = GeometryError;

    fn try_from(rec: &PatchRecord) -> Result<Self, Self::Error> {
        Patch::from_rows(rec.region_id, rec.crpix1, rec.crpix2, &rec.bitmap)
    }
}

impl TryFrom<PatchRecord> for Patch {
    type Error = GeometryError;

    fn try_from(rec: PatchRecord) -> Result<Self, Self::Error> {
        Patch::try_from(&rec)
    }
}

fn bitmap_from_rows(region_id: i64, rows: &[Vec<u16>]) -> Result<CodeBitmap, GeometryError> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if height == 0 || width == 0 {
        return Err(GeometryError::EmptyPatch { region_id });
    }
    let mut raw = Vec::with_capacity(width * height);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(GeometryError::RaggedBitmap {
                region_id,
                row,
                expected: width,
                found: values.len(),
            });
        }
        raw.extend_from_slice(values);
    }
    CodeBitmap::from_raw(width as u32, height as u32, raw)
        .ok_or(GeometryError::EmptyPatch { region_id })
}
