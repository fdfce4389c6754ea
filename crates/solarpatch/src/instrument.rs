//! Instrument providers and the date-based provider factory.
//!
//! Exactly two roles exist: the primary instrument, whose category codes are
//! the reference vocabulary, and the secondary instrument, whose bitmaps are
//! recoded before compositing. Providers are plain values held in an
//! explicit [`ProviderTable`]; nothing registers itself implicitly.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ConfigurationError;
use crate::frame::REQUIRED_KEYWORDS;
use crate::recode::{RecodeGroup, RecodeTable};

/// Role of an instrument in the vocabulary harmonization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentRole {
    /// Reference vocabulary; bitmaps are composited as-is.
    Primary,
    /// Bitmaps are recoded into the primary vocabulary first.
    Secondary,
}

/// Inclusive observing interval. `end: None` means still operating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObservingRange {
    pub start: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
}

impl ObservingRange {
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.start && self.end.map_or(true, |end| *date <= end)
    }
}

/// Everything the compositing core needs to know about one instrument.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentProvider {
    /// Short instrument name, e.g. `HMI`.
    pub name: String,
    pub role: InstrumentRole,
    /// Full-disk canvas side in pixels.
    pub canvas_side: u32,
    /// Header keyword carrying the region identifier (`HARPNUM`, `TARPNUM`).
    pub region_keyword: String,
    /// Archive series holding the full-disk header.
    pub fulldisk_series: String,
    /// Archive series holding the patch bitmaps.
    pub patch_series: String,
    /// Full-disk keywords a synthetic canvas needs.
    pub required_keywords: Vec<String>,
    pub observing: ObservingRange,
    /// Human-readable names of the category codes this provider emits.
    #[serde(default)]
    pub category_labels: BTreeMap<u16, String>,
    /// Secondary-to-primary code translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recode: Option<RecodeTable>,
}

impl InstrumentProvider {
    /// Canvas id for an observation, e.g. `HMI 2012.07.12_00:00:00`.
    pub fn canvas_id(&self, date: &NaiveDateTime) -> String {
        format!("{} {}", self.name, crate::frame::format_observation_date(date))
    }

    pub fn is_primary(&self) -> bool {
        self.role == InstrumentRole::Primary
    }
}

/// Immutable lookup table of the available providers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProviderTable {
    providers: Vec<InstrumentProvider>,
    #[serde(skip)]
    primary: usize,
    #[serde(skip)]
    secondary: usize,
}

impl<'de> serde::Deserialize<'de> for ProviderTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            providers: Vec<InstrumentProvider>,
        }
        let raw = Raw::deserialize(deserializer)?;
        ProviderTable::new(raw.providers).map_err(serde::de::Error::custom)
    }
}

impl ProviderTable {
    /// Validate and build a table: one primary, one secondary, the secondary
    /// carrying a recode table and the primary none.
    pub fn new(providers: Vec<InstrumentProvider>) -> Result<Self, ConfigurationError> {
        let err = |msg: String| Err(ConfigurationError::ProviderTable(msg));

        let mut by_role = [None, None];
        for role in [InstrumentRole::Primary, InstrumentRole::Secondary] {
            let n = providers.iter().filter(|p| p.role == role).count();
            if n != 1 {
                return err(format!("expected exactly one {role:?} provider, found {n}"));
            }
            by_role[role as usize] = providers.iter().position(|p| p.role == role);
        }
        for (i, p) in providers.iter().enumerate() {
            if p.name.trim().is_empty() {
                return err(format!("provider #{i} has an empty name"));
            }
            if providers[..i]
                .iter()
                .any(|q| q.name.eq_ignore_ascii_case(&p.name))
            {
                return err(format!("duplicate provider name '{}'", p.name));
            }
            if p.canvas_side == 0 {
                return err(format!("{}: canvas_side must be > 0", p.name));
            }
            if let Some(end) = p.observing.end {
                if end < p.observing.start {
                    return err(format!("{}: observing range ends before it starts", p.name));
                }
            }
            match (p.role, p.recode.is_some()) {
                (InstrumentRole::Primary, true) => {
                    return err(format!("{}: primary provider must not recode", p.name));
                }
                (InstrumentRole::Secondary, false) => {
                    return err(format!("{}: secondary provider needs a recode table", p.name));
                }
                _ => {}
            }
        }
        let [Some(primary), Some(secondary)] = by_role else {
            return err("provider roles unresolved".to_string());
        };
        Ok(Self {
            providers,
            primary,
            secondary,
        })
    }

    pub fn providers(&self) -> &[InstrumentProvider] {
        &self.providers
    }

    /// The provider for an observation date.
    ///
    /// When observing ranges overlap the primary instrument wins.
    pub fn select(&self, date: &NaiveDateTime) -> Result<&InstrumentProvider, ConfigurationError> {
        self.providers
            .iter()
            .filter(|p| p.observing.contains(date))
            .min_by_key(|p| p.role != InstrumentRole::Primary)
            .ok_or(ConfigurationError::NoProviderForDate { date: *date })
    }

    /// Case-insensitive lookup by instrument name.
    pub fn by_name(&self, name: &str) -> Result<&InstrumentProvider, ConfigurationError> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ConfigurationError::UnknownInstrument(name.to_string()))
    }

    pub fn primary(&self) -> &InstrumentProvider {
        &self.providers[self.primary]
    }

    pub fn secondary(&self) -> &InstrumentProvider {
        &self.providers[self.secondary]
    }
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self::new(vec![default_hmi(), default_mdi()]).expect("built-in provider table must be valid")
    }
}

fn datetime(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|day| day.and_hms_opt(hh, mm, ss))
        .expect("built-in date must be valid")
}

/// Labels of the SHARP bitmap vocabulary.
pub fn sharp_category_labels() -> BTreeMap<u16, String> {
    [
        (1, "QUIET"),
        (2, "ACTIVE"),
        (33, "ON PATCH & WEAK"),
        (34, "ON PATCH & ACTIVE"),
    ]
    .into_iter()
    .map(|(code, label)| (code, label.to_string()))
    .collect()
}

/// Built-in SMARP -> SHARP bitmap translation.
///
/// SMARP codes carry the high byte bit (`128`) on top of the SHARP layout,
/// with two field-strength variants per class.
pub fn default_smarp_recode() -> RecodeTable {
    let group = |sources: &[u16], target| RecodeGroup {
        sources: sources.to_vec(),
        target,
    };
    RecodeTable::new(
        vec![
            group(&[129, 133], 1),
            group(&[130, 134], 2),
            group(&[161, 165], 33),
            group(&[162, 166], 34),
        ],
        128,
        sharp_category_labels().into_keys(),
    )
    .expect("built-in recode table must be valid")
}

fn required_keywords() -> Vec<String> {
    REQUIRED_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// SDO/HMI with SHARP patches.
pub fn default_hmi() -> InstrumentProvider {
    InstrumentProvider {
        name: "HMI".to_string(),
        role: InstrumentRole::Primary,
        canvas_side: 4096,
        region_keyword: "HARPNUM".to_string(),
        fulldisk_series: "hmi.M_720s".to_string(),
        patch_series: "hmi.sharp_720s".to_string(),
        required_keywords: required_keywords(),
        observing: ObservingRange {
            start: datetime(2009, 4, 13, 21, 48, 0),
            end: None,
        },
        category_labels: sharp_category_labels(),
        recode: None,
    }
}

/// SOHO/MDI with SMARP patches.
pub fn default_mdi() -> InstrumentProvider {
    InstrumentProvider {
        name: "MDI".to_string(),
        role: InstrumentRole::Secondary,
        canvas_side: 1024,
        region_keyword: "TARPNUM".to_string(),
        fulldisk_series: "mdi.fd_M_96m_lev182".to_string(),
        patch_series: "mdi.smarp_96m".to_string(),
        required_keywords: required_keywords(),
        observing: ObservingRange {
            start: datetime(1996, 4, 23, 0, 0, 0),
            end: Some(datetime(2010, 10, 27, 22, 24, 0)),
        },
        category_labels: sharp_category_labels(),
        recode: Some(default_smarp_recode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_secondary_before_primary_launch() {
        let table = ProviderTable::default();
        let p = table.select(&datetime(2003, 10, 28, 11, 0, 0)).unwrap();
        assert_eq!(p.name, "MDI");
        assert_eq!(p.canvas_side, 1024);
        assert!(p.recode.is_some());
    }

    #[test]
    fn primary_wins_in_overlap() {
        let table = ProviderTable::default();
        // Both instruments were observing on this date.
        let p = table.select(&datetime(2010, 7, 14, 11, 0, 8)).unwrap();
        assert_eq!(p.name, "HMI");
        assert!(p.is_primary());
    }

    #[test]
    fn primary_range_is_open_ended() {
        let table = ProviderTable::default();
        let p = table.select(&datetime(2024, 5, 10, 16, 0, 0)).unwrap();
        assert_eq!(p.region_keyword, "HARPNUM");
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let table = ProviderTable::default();
        assert_eq!(
            table.select(&datetime(1996, 4, 23, 0, 0, 0)).unwrap().name,
            "MDI"
        );
        assert_eq!(
            table.select(&datetime(2009, 4, 13, 21, 48, 0)).unwrap().name,
            "HMI"
        );
    }

    #[test]
    fn date_before_any_instrument_fails() {
        let table = ProviderTable::default();
        assert!(matches!(
            table.select(&datetime(1990, 1, 1, 0, 0, 0)),
            Err(ConfigurationError::NoProviderForDate { .. })
        ));
    }

    #[test]
    fn lookup_by_name_ignores_case() {
        let table = ProviderTable::default();
        assert_eq!(table.by_name("mdi").unwrap().name, "MDI");
        assert!(table.by_name("aia").is_err());
        assert_eq!(table.primary().name, "HMI");
        assert_eq!(table.secondary().name, "MDI");
    }

    #[test]
    fn table_requires_one_provider_per_role() {
        let err = ProviderTable::new(vec![default_hmi()]).unwrap_err();
        assert!(err.to_string().contains("Secondary"));

        let mut primary_with_recode = default_hmi();
        primary_with_recode.recode = Some(default_smarp_recode());
        assert!(ProviderTable::new(vec![primary_with_recode, default_mdi()]).is_err());
    }

    #[test]
    fn table_round_trips_through_json() {
        let table = ProviderTable::default();
        let json = serde_json::to_string(&table).expect("serialize");
        let back: ProviderTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, table);
    }

    #[test]
    fn builtin_tables_are_valid() {
        let recode = default_smarp_recode();
        let rebuilt =
            RecodeTable::new(recode.groups().to_vec(), recode.offset(), recode.primary_codes());
        assert_eq!(rebuilt, Ok(recode));
        assert!(ProviderTable::new(vec![default_hmi(), default_mdi()]).is_ok());
        assert_eq!(datetime(2010, 10, 27, 22, 24, 0).to_string(), "2010-10-27 22:24:00");
    }

    #[test]
    fn canvas_id_uses_archive_date_format() {
        let id = default_hmi().canvas_id(&datetime(2012, 7, 12, 0, 0, 0));
        assert_eq!(id, "HMI 2012.07.12_00:00:00");
    }
}
