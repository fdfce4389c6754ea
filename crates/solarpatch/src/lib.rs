//! solarpatch — composite solar active-region patches onto a full-disk canvas.
//!
//! Patch bitmaps (HARP/TARP regions) are positioned on a square full-disk
//! grid from their header reference pixels and merged with an
//! order-independent max rule. The stages are:
//!
//! 1. **Disk mask** – synthetic canvas from `CRPIX1`, `CRPIX2`, `RSUN_OBS`,
//!    `CDELT1`: on-disk cells hold `1`, everything else `NaN`.
//! 2. **Placement** – each patch's absolute rectangle from the canvas and
//!    patch reference pixels, with bounds checks.
//! 3. **Recode** – secondary-instrument codes rewritten into the primary
//!    vocabulary.
//! 4. **Composite** – foreground pixels merged with `max`, rectangles
//!    recorded per region identifier.
//!
//! # Public API
//! - [`Compositor`] and [`Observation`] as primary entry points
//! - [`SessionConfig`] and [`ProviderTable`] for tuning and instrument tables
//! - [`CompositingSession`] for incremental or custom-canvas use
//!
//! Fetching data from the archive and rendering images are left to callers.

mod api;
mod canvas;
mod compositor;
mod config;
mod error;
mod frame;
mod geometry;
mod instrument;
mod patch;
mod recode;
mod registry;
mod session;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{CompositeOutput, Compositor, Observation};
pub use canvas::{disk_mask, Canvas, CanvasBuffer, CodeHistogram, CodeImage, DISK_VALUE};
pub use compositor::{composite_patch, merge_value, MergeStats};
pub use config::{MergeStrategy, SessionConfig};
pub use error::{
    CompositeError, ConfigurationError, GeometryError, IdentifierCollisionError,
    RecodeCoverageWarning,
};
pub use frame::{
    format_observation_date, parse_observation_date, DiskHeader, DiskKeys, ReferenceFrame,
    REQUIRED_KEYWORDS,
};
pub use geometry::{resolve_rectangle, validate_placement, Placement, ResolvedRectangle};
pub use instrument::{
    default_hmi, default_mdi, default_smarp_recode, sharp_category_labels, InstrumentProvider,
    InstrumentRole, ObservingRange, ProviderTable,
};
pub use patch::{CodeBitmap, Patch, PatchRecord};
pub use recode::{RecodeGroup, RecodeOutcome, RecodeTable};
pub use registry::BoundingBoxRegistry;
pub use session::{CompositeResult, CompositingSession, SessionReport};
