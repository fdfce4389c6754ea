//! Per-session record of composited patch rectangles.

use std::collections::HashMap;

use crate::error::IdentifierCollisionError;
use crate::geometry::ResolvedRectangle;

/// Insertion-ordered rectangles keyed by region identifier.
///
/// The registry never merges entries: a second rectangle for a region
/// identifier already present is an [`IdentifierCollisionError`].
#[derive(Debug, Clone)]
pub struct BoundingBoxRegistry {
    canvas_id: String,
    entries: Vec<ResolvedRectangle>,
    /// region_id -> (index into `entries`, caller's patch index)
    by_region: HashMap<i64, (usize, usize)>,
}

impl BoundingBoxRegistry {
    pub fn new(canvas_id: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            entries: Vec::new(),
            by_region: HashMap::new(),
        }
    }

    /// Record the rectangle of the patch at `patch_index` in the caller's input.
    pub fn insert(
        &mut self,
        patch_index: usize,
        rect: ResolvedRectangle,
    ) -> Result<(), IdentifierCollisionError> {
        if let Some(&(_, first_index)) = self.by_region.get(&rect.region_id) {
            return Err(IdentifierCollisionError {
                canvas_id: self.canvas_id.clone(),
                region_id: rect.region_id,
                first_index,
                second_index: patch_index,
            });
        }
        self.by_region
            .insert(rect.region_id, (self.entries.len(), patch_index));
        self.entries.push(rect);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, region_id: i64) -> Option<&ResolvedRectangle> {
        self.by_region
            .get(&region_id)
            .map(|&(idx, _)| &self.entries[idx])
    }

    /// Rectangles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedRectangle> + '_ {
        self.entries.iter()
    }

    /// `(y1, y2, x1, x2, region_id)` records in insertion order.
    pub fn bounding_boxes(&self) -> Vec<ResolvedRectangle> {
        self.entries.clone()
    }
}
