//! One compositing session: a canvas, its registry, and the worker pool.
//!
//! Stages per call to [`CompositingSession::composite`]:
//!
//! 1. **Prepare** (parallel, no shared mutable state): resolve each patch's
//!    rectangle, validate it against the canvas, recode secondary bitmaps.
//! 2. **Register** (serial, input order): record rectangles, rejecting
//!    duplicate region identifiers.
//! 3. **Merge**: write foreground pixels with the max rule, either from a
//!    single writer or from the pool under a canvas-wide lock.
//!
//! Stages 1 and 2 complete for every patch before the canvas is written, so
//! geometry and identifier errors leave the canvas untouched.

use std::borrow::Cow;
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;

use crate::canvas::Canvas;
use crate::compositor::{composite_patch, MergeStats};
use crate::config::{MergeStrategy, SessionConfig};
use crate::error::{CompositeError, ConfigurationError, GeometryError, RecodeCoverageWarning};
use crate::frame::ReferenceFrame;
use crate::geometry::{resolve_rectangle, validate_placement, Placement, ResolvedRectangle};
use crate::instrument::InstrumentProvider;
use crate::patch::{CodeBitmap, Patch};
use crate::recode::RecodeTable;
use crate::registry::BoundingBoxRegistry;

/// Summary of everything composited so far in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionReport {
    /// Patches merged into the canvas.
    pub patches: usize,
    /// Foreground pixels across all merged patches.
    pub foreground_pixels: usize,
    /// Canvas cells whose value changed.
    pub changed_pixels: usize,
    /// Codes the recode table did not claim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RecodeCoverageWarning>,
}

impl SessionReport {
    fn absorb(&mut self, stats: MergeStats) {
        self.patches += 1;
        self.foreground_pixels += stats.foreground;
        self.changed_pixels += stats.changed;
    }
}

/// Final canvas and its labeled rectangles.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub canvas: Canvas,
    /// `(y1, y2, x1, x2, region_id)` in patch input order.
    pub bounding_boxes: Vec<ResolvedRectangle>,
}

struct PreparedPatch<'a> {
    index: usize,
    placement: Placement,
    bitmap: Cow<'a, CodeBitmap>,
    warnings: Vec<RecodeCoverageWarning>,
}

/// One canvas being composited. Not shared across threads; see [`MergeStrategy`].
pub struct CompositingSession {
    canvas: Canvas,
    registry: BoundingBoxRegistry,
    recode: Option<RecodeTable>,
    merge: MergeStrategy,
    pool: rayon::ThreadPool,
    next_index: usize,
    report: SessionReport,
}

impl CompositingSession {
    /// Start a session on `canvas` for patches from `provider`.
    ///
    /// The canvas side must match the provider's canvas side.
    pub fn new(
        canvas: Canvas,
        provider: &InstrumentProvider,
        config: &SessionConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if canvas.side() != provider.canvas_side {
            return Err(ConfigurationError::CanvasShape {
                canvas_id: canvas.id().to_string(),
                expected: provider.canvas_side,
                width: canvas.side(),
                height: canvas.side(),
            });
        }
        Self::with_recode(canvas, provider.recode.clone(), config)
    }

    /// Start a session without an instrument provider.
    pub fn with_recode(
        canvas: Canvas,
        recode: Option<RecodeTable>,
        config: &SessionConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("solarpatch-worker-{i}"))
            .build()
            .map_err(|e| ConfigurationError::WorkerPool(e.to_string()))?;
        Ok(Self {
            registry: BoundingBoxRegistry::new(canvas.id()),
            canvas,
            recode,
            merge: config.merge,
            pool,
            next_index: 0,
            report: SessionReport::default(),
        })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn registry(&self) -> &BoundingBoxRegistry {
        &self.registry
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Composite a batch of patches. May be called repeatedly.
    ///
    /// On error the canvas state is undefined and the session should be
    /// dropped.
    pub fn composite(&mut self, patches: &[Patch]) -> Result<&SessionReport, CompositeError> {
        let frame = *self.canvas.frame();
        let canvas_id = self.canvas.id().to_string();
        let recode = self.recode.as_ref();
        let base_index = self.next_index;

        tracing::info!(
            "Compositing {} patches onto '{}' ({} workers, {:?})",
            patches.len(),
            canvas_id,
            self.pool.current_num_threads(),
            self.merge,
        );

        let prepared: Vec<PreparedPatch<'_>> = self.pool.install(|| {
            patches
                .par_iter()
                .enumerate()
                .map(|(i, patch)| prepare_patch(base_index + i, patch, &frame, &canvas_id, recode))
                .collect::<Result<Vec<_>, GeometryError>>()
        })?;
        self.next_index += patches.len();

        for p in &prepared {
            self.registry.insert(p.index, p.placement.rect)?;
        }

        let stats: Vec<MergeStats> = match self.merge {
            MergeStrategy::SingleWriter => prepared
                .iter()
                .map(|p| composite_patch(&mut self.canvas, &p.placement, &p.bitmap))
                .collect::<Result<_, _>>()?,
            MergeStrategy::SharedLock => {
                let canvas = Mutex::new(&mut self.canvas);
                self.pool.install(|| {
                    prepared
                        .par_iter()
                        .map(|p| {
                            let mut guard = canvas.lock().unwrap_or_else(PoisonError::into_inner);
                            composite_patch(&mut **guard, &p.placement, &p.bitmap)
                        })
                        .collect::<Result<Vec<_>, GeometryError>>()
                })?
            }
        };

        for (p, s) in prepared.into_iter().zip(stats) {
            self.report.absorb(s);
            self.report.warnings.extend(p.warnings);
        }

        tracing::info!(
            "Canvas '{}': {} patches, {} foreground px, {} cells changed",
            canvas_id,
            self.report.patches,
            self.report.foreground_pixels,
            self.report.changed_pixels,
        );
        Ok(&self.report)
    }

    /// End the session and hand out the canvas and its rectangles.
    pub fn finish(self) -> CompositeResult {
        CompositeResult {
            bounding_boxes: self.registry.bounding_boxes(),
            canvas: self.canvas,
        }
    }
}

fn prepare_patch<'a>(
    index: usize,
    patch: &'a Patch,
    frame: &ReferenceFrame,
    canvas_id: &str,
    recode: Option<&RecodeTable>,
) -> Result<PreparedPatch<'a>, GeometryError> {
    let placement = resolve_rectangle(canvas_id, frame, patch)?;
    validate_placement(canvas_id, frame, &placement, patch.shape())?;

    let (bitmap, warnings) = match recode {
        Some(table) => {
            let out = table.recode(patch.region_id(), patch.bitmap());
            (Cow::Owned(out.bitmap), out.warnings)
        }
        None => (Cow::Borrowed(patch.bitmap()), Vec::new()),
    };

    tracing::debug!(
        "Patch #{} region {}: rows {}..{}, cols {}..{}{}",
        index,
        patch.region_id(),
        placement.rect.y1,
        placement.rect.y2,
        placement.rect.x1,
        placement.rect.x2,
        if recode.is_some() { " (recoded)" } else { "" },
    );

    Ok(PreparedPatch {
        index,
        placement,
        bitmap,
        warnings,
    })
}
