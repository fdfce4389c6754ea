//! Error taxonomy for canvas compositing.
//!
//! All fatal errors are returned synchronously and carry enough context
//! (canvas id, region identifier, offending values) to diagnose a bad
//! session without re-running it. Once a [`CompositeError`] is returned
//! mid-session the canvas content is undefined and must be discarded.

use crate::geometry::ResolvedRectangle;

/// Missing or unusable metadata that prevents building a canvas or a table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("required header keyword {keyword} is missing")]
    MissingKeyword { keyword: &'static str },

    #[error("header keyword {keyword} has unusable value {value}")]
    InvalidKeyword { keyword: &'static str, value: f64 },

    #[error("CDELT1 is {cdelt1}; cannot derive a disk radius from RSUN_OBS={rsun_obs}")]
    DegeneratePlateScale { cdelt1: f64, rsun_obs: f64 },

    #[error("canvas '{canvas_id}' must be square with side {expected}, got {width}x{height}")]
    CanvasShape {
        canvas_id: String,
        expected: u32,
        width: u32,
        height: u32,
    },

    #[error("canvas '{canvas_id}' cell ({row}, {col}) holds {value}, not a category code or NaN")]
    InvalidCanvasValue {
        canvas_id: String,
        row: u32,
        col: u32,
        value: f32,
    },

    #[error("canvas side must be > 0")]
    EmptyCanvas,

    #[error("invalid recode table: {0}")]
    RecodeTable(String),

    #[error("invalid provider table: {0}")]
    ProviderTable(String),

    #[error("no instrument provider covers observation date {date}")]
    NoProviderForDate { date: chrono::NaiveDateTime },

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("cannot parse observation date '{0}'")]
    ObservationDate(String),

    #[error("worker pool: {0}")]
    WorkerPool(String),

    #[error("unsupported config schema '{found}' (expected '{expected}')")]
    Schema {
        found: String,
        expected: &'static str,
    },
}

/// Patch placement that disagrees with the canvas it targets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error(
        "patch {region_id} resolves to rows {y1}..{y2}, cols {x1}..{x2}, outside canvas '{canvas_id}' of side {side}",
        y1 = .rect.y1, y2 = .rect.y2, x1 = .rect.x1, x2 = .rect.x2,
        region_id = .rect.region_id
    )]
    OutOfBounds {
        canvas_id: String,
        rect: ResolvedRectangle,
        side: u32,
    },

    #[error(
        "patch {region_id} bitmap is {width}x{height} but its rectangle on canvas '{canvas_id}' spans {rect_width}x{rect_height}"
    )]
    ShapeMismatch {
        canvas_id: String,
        region_id: i64,
        width: u32,
        height: u32,
        rect_width: i64,
        rect_height: i64,
    },

    #[error(
        "patch {region_id} was resolved against frame (CRPIX1={rect_crpix1}, CRPIX2={rect_crpix2}, side={rect_side}) but canvas '{canvas_id}' uses (CRPIX1={crpix1}, CRPIX2={crpix2}, side={side})"
    )]
    FrameMismatch {
        canvas_id: String,
        region_id: i64,
        rect_crpix1: f64,
        rect_crpix2: f64,
        rect_side: u32,
        crpix1: f64,
        crpix2: f64,
        side: u32,
    },

    #[error("patch {region_id} has an unusable {keyword} offset ({value}) on canvas '{canvas_id}'")]
    NonFiniteOffset {
        canvas_id: String,
        region_id: i64,
        keyword: &'static str,
        value: f64,
    },

    #[error("patch {region_id} has an empty bitmap")]
    EmptyPatch { region_id: i64 },

    #[error("patch {region_id} bitmap row {row} has {found} columns, expected {expected}")]
    RaggedBitmap {
        region_id: i64,
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Two patches in one session reported the same region identifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "region {region_id} reported twice on canvas '{canvas_id}' (patches #{first_index} and #{second_index})"
)]
pub struct IdentifierCollisionError {
    pub canvas_id: String,
    pub region_id: i64,
    pub first_index: usize,
    pub second_index: usize,
}

/// Any fatal compositing failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    IdentifierCollision(#[from] IdentifierCollisionError),
}

/// Non-fatal: a patch pixel code that no recode group claims.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecodeCoverageWarning {
    pub region_id: i64,
    /// Source code as found in the secondary bitmap.
    pub code: u16,
    /// Code written to the recoded bitmap.
    pub recoded_as: u16,
    /// Number of pixels carrying `code`.
    pub pixel_count: usize,
}
