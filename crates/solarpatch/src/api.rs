//! High-level compositing API.
//!
//! [`Compositor`] is the main entry point. It wraps a [`SessionConfig`] and
//! turns one [`Observation`] (full-disk header plus patch records) into a
//! composited canvas:
//!
//! 1. validate the header keywords,
//! 2. pick the instrument provider by date (or by name when forced),
//! 3. generate the synthetic disk canvas,
//! 4. composite every patch in one session.
//!
//! # Examples
//!
//! ```no_run
//! use solarpatch::{Compositor, Observation};
//! use std::path::Path;
//!
//! let observation = Observation::from_json_file(Path::new("session.json")).unwrap();
//! let out = Compositor::default().composite_observation(&observation).unwrap();
//! println!("{}: {} patches", out.canvas.id(), out.bounding_boxes.len());
//! ```

use std::path::Path;

use chrono::NaiveDateTime;

use crate::canvas::Canvas;
use crate::config::SessionConfig;
use crate::error::{CompositeError, ConfigurationError};
use crate::frame::{parse_observation_date, DiskHeader, DiskKeys};
use crate::geometry::ResolvedRectangle;
use crate::instrument::InstrumentProvider;
use crate::patch::{Patch, PatchRecord};
use crate::session::{CompositingSession, SessionReport};

/// One observation as delivered by the metadata layer.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Observation {
    /// Date the caller asked for. Used when the header has no `T_OBS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Force a provider by name instead of selecting by date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    pub header: DiskHeader,
    #[serde(default)]
    pub patches: Vec<PatchRecord>,
}

impl Observation {
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Result of compositing one observation.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    /// Name of the provider that supplied the patches.
    pub instrument: String,
    pub observation_date: NaiveDateTime,
    pub canvas: Canvas,
    /// `(y1, y2, x1, x2, region_id)` in patch input order.
    pub bounding_boxes: Vec<ResolvedRectangle>,
    pub report: SessionReport,
}

/// Compositing interface. Create once, composite many observations.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: SessionConfig,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Load a config JSON file and create a compositor in one step.
    pub fn from_config_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_config(SessionConfig::from_json_file(path)?))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Provider for `date`, or the named one when `instrument` is given.
    pub fn select_provider(
        &self,
        date: &NaiveDateTime,
        instrument: Option<&str>,
    ) -> Result<&InstrumentProvider, ConfigurationError> {
        match instrument {
            Some(name) => self.config.providers.by_name(name),
            None => self.config.providers.select(date),
        }
    }

    /// Composite every patch of `observation` onto a fresh synthetic canvas.
    pub fn composite_observation(
        &self,
        observation: &Observation,
    ) -> Result<CompositeOutput, CompositeError> {
        let keys = observation.header.clone().into_keys()?;
        let date = resolve_observation_date(&keys, observation.date.as_deref())?;
        let provider = self.select_provider(&date, observation.instrument.as_deref())?;

        let patches = observation
            .patches
            .iter()
            .map(Patch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        self.composite_patches(provider, &keys, &date, &patches)
    }

    /// Composite `patches` onto a synthetic canvas generated from `keys` at
    /// the provider's canvas side.
    pub fn composite_patches(
        &self,
        provider: &InstrumentProvider,
        keys: &DiskKeys,
        date: &NaiveDateTime,
        patches: &[Patch],
    ) -> Result<CompositeOutput, CompositeError> {
        let canvas = Canvas::synthetic(provider.canvas_id(date), keys, provider.canvas_side)?;
        let mut session = CompositingSession::new(canvas, provider, &self.config)?;
        let report = session.composite(patches)?.clone();
        let result = session.finish();

        Ok(CompositeOutput {
            instrument: provider.name.clone(),
            observation_date: *date,
            canvas: result.canvas,
            bounding_boxes: result.bounding_boxes,
            report,
        })
    }
}

/// `T_OBS` when present, else the requested date.
fn resolve_observation_date(
    keys: &DiskKeys,
    requested: Option<&str>,
) -> Result<NaiveDateTime, ConfigurationError> {
    let requested = requested.map(parse_observation_date).transpose()?;
    match (keys.observation_date().transpose()?, requested) {
        (Some(t_obs), Some(req)) => {
            if t_obs != req {
                tracing::warn!(
                    "Header T_OBS {} differs from requested date {}; using T_OBS",
                    t_obs,
                    req,
                );
            }
            Ok(t_obs)
        }
        (Some(t_obs), None) => Ok(t_obs),
        (None, Some(req)) => Ok(req),
        (None, None) => Err(ConfigurationError::MissingKeyword { keyword: "T_OBS" }),
    }
}
