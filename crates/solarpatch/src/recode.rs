//! Category-code harmonization between instrument vocabularies.
//!
//! A [`RecodeTable`] rewrites a secondary-instrument bitmap into the primary
//! vocabulary before compositing. Per pixel:
//!
//! - `0` (background) stays `0`;
//! - a code claimed by a group becomes that group's target;
//! - any other code in `offset..2 * offset` has `offset` subtracted;
//! - every other code passes through.
//!
//! Table validation keeps every source `>= offset` and every target
//! `< offset`. Shifted codes land below `offset`, where no source lives, so
//! a second pass over a recoded bitmap leaves it unchanged.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::error::{ConfigurationError, RecodeCoverageWarning};
use crate::patch::CodeBitmap;

/// Secondary codes that all map to one primary code.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecodeGroup {
    pub sources: Vec<u16>,
    pub target: u16,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RecodeTableSpec {
    groups: Vec<RecodeGroup>,
    offset: u16,
    #[serde(default)]
    primary_codes: Vec<u16>,
}

/// Validated, immutable recode table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecodeTable {
    groups: Vec<RecodeGroup>,
    offset: u16,
    primary_codes: BTreeSet<u16>,
    #[serde(skip)]
    lookup: HashMap<u16, u16>,
}

impl<'de> serde::Deserialize<'de> for RecodeTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = RecodeTableSpec::deserialize(deserializer)?;
        RecodeTable::new(spec.groups, spec.offset, spec.primary_codes)
            .map_err(serde::de::Error::custom)
    }
}

/// Recoded bitmap plus the codes no group claimed.
#[derive(Debug, Clone)]
pub struct RecodeOutcome {
    pub bitmap: CodeBitmap,
    pub warnings: Vec<RecodeCoverageWarning>,
}

impl RecodeTable {
    /// Build and validate a table.
    ///
    /// `primary_codes` lists codes that already belong to the primary
    /// vocabulary; they pass without a coverage warning.
    pub fn new(
        groups: Vec<RecodeGroup>,
        offset: u16,
        primary_codes: impl IntoIterator<Item = u16>,
    ) -> Result<Self, ConfigurationError> {
        if offset == 0 {
            return Err(ConfigurationError::RecodeTable(
                "offset must be > 0".to_string(),
            ));
        }
        let mut lookup = HashMap::new();
        for group in &groups {
            if group.sources.is_empty() {
                return Err(ConfigurationError::RecodeTable(format!(
                    "group targeting {} has no source codes",
                    group.target
                )));
            }
            if group.target >= offset {
                return Err(ConfigurationError::RecodeTable(format!(
                    "target {} must be below offset {}",
                    group.target, offset
                )));
            }
            for &src in &group.sources {
                if src < offset {
                    return Err(ConfigurationError::RecodeTable(format!(
                        "source code {} must be >= offset {}",
                        src, offset
                    )));
                }
                if let Some(prev) = lookup.insert(src, group.target) {
                    return Err(ConfigurationError::RecodeTable(format!(
                        "source code {} claimed by groups targeting {} and {}",
                        src, prev, group.target
                    )));
                }
            }
        }
        let primary_codes: BTreeSet<u16> = primary_codes.into_iter().collect();
        if let Some(&bad) = primary_codes.iter().find(|&&c| c >= offset) {
            return Err(ConfigurationError::RecodeTable(format!(
                "primary code {} must be below offset {}",
                bad, offset
            )));
        }
        Ok(Self {
            groups,
            offset,
            primary_codes,
            lookup,
        })
    }

    /// Load a table from JSON (`{"groups": [...], "offset": N, "primary_codes": [...]}`).
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn groups(&self) -> &[RecodeGroup] {
        &self.groups
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn primary_codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.primary_codes.iter().copied()
    }

    /// Recode one pixel. Returns `(code, covered)`.
    pub fn recode_code(&self, code: u16) -> (u16, bool) {
        if code == 0 {
            return (0, true);
        }
        if let Some(&target) = self.lookup.get(&code) {
            return (target, true);
        }
        let covered = self.primary_codes.contains(&code);
        let shifted = code >= self.offset && u32::from(code) < 2 * u32::from(self.offset);
        if shifted {
            (code - self.offset, covered)
        } else {
            (code, covered)
        }
    }

    /// Recode a patch bitmap. The input is left untouched.
    pub fn recode(&self, region_id: i64, bitmap: &CodeBitmap) -> RecodeOutcome {
        let mut uncovered: BTreeMap<u16, (u16, usize)> = BTreeMap::new();
        let mut out = bitmap.clone();
        for px in out.pixels_mut() {
            let (code, covered) = self.recode_code(px[0]);
            if !covered {
                uncovered.entry(px[0]).or_insert((code, 0)).1 += 1;
            }
            px[0] = code;
        }

        let warnings: Vec<RecodeCoverageWarning> = uncovered
            .into_iter()
            .map(|(code, (recoded_as, pixel_count))| RecodeCoverageWarning {
                region_id,
                code,
                recoded_as,
                pixel_count,
            })
            .collect();
        for w in &warnings {
            tracing::warn!(
                "Region {}: code {} not covered by the recode table ({} px, written as {})",
                w.region_id,
                w.code,
                w.pixel_count,
                w.recoded_as,
            );
        }

        RecodeOutcome {
            bitmap: out,
            warnings,
        }
    }
}
