//! Full-disk header keywords and the canvas reference frame.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::ConfigurationError;

/// Header keywords a synthetic canvas is generated from.
pub const REQUIRED_KEYWORDS: [&str; 4] = ["RSUN_OBS", "CDELT1", "CRPIX1", "CRPIX2"];

const JSOC_DATE_FORMAT: &str = "%Y.%m.%d_%H:%M:%S";
// `%.f` also accepts a missing fraction.
const JSOC_PARSE_FORMAT: &str = "%Y.%m.%d_%H:%M:%S%.f";
const ISO_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Full-disk placement and scaling keywords.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DiskKeys {
    #[serde(rename = "CRPIX1")]
    pub crpix1: f64,
    #[serde(rename = "CRPIX2")]
    pub crpix2: f64,
    /// Observed solar radius (arcsec).
    #[serde(rename = "RSUN_OBS")]
    pub rsun_obs: f64,
    /// Plate scale (arcsec / pixel).
    #[serde(rename = "CDELT1")]
    pub cdelt1: f64,
    /// Raw observation timestamp as reported by the archive.
    #[serde(rename = "T_OBS", default, skip_serializing_if = "Option::is_none")]
    pub t_obs: Option<String>,
}

/// Header as it arrives from the metadata layer: any keyword may be absent.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiskHeader {
    #[serde(rename = "CRPIX1", default)]
    pub crpix1: Option<f64>,
    #[serde(rename = "CRPIX2", default)]
    pub crpix2: Option<f64>,
    #[serde(rename = "RSUN_OBS", default)]
    pub rsun_obs: Option<f64>,
    #[serde(rename = "CDELT1", default)]
    pub cdelt1: Option<f64>,
    #[serde(rename = "T_OBS", default)]
    pub t_obs: Option<String>,
}

impl DiskHeader {
    /// Validate presence and finiteness of every required keyword.
    pub fn into_keys(self) -> Result<DiskKeys, ConfigurationError> {
        let keys = DiskKeys {
            crpix1: finite_keyword("CRPIX1", self.crpix1)?,
            crpix2: finite_keyword("CRPIX2", self.crpix2)?,
            rsun_obs: finite_keyword("RSUN_OBS", self.rsun_obs)?,
            cdelt1: finite_keyword("CDELT1", self.cdelt1)?,
            t_obs: self.t_obs,
        };
        // Surface the plate-scale problem here rather than at mask time.
        keys.radius_px()?;
        Ok(keys)
    }
}

fn finite_keyword(keyword: &'static str, value: Option<f64>) -> Result<f64, ConfigurationError> {
    let value = value.ok_or(ConfigurationError::MissingKeyword { keyword })?;
    if !value.is_finite() {
        return Err(ConfigurationError::InvalidKeyword { keyword, value });
    }
    Ok(value)
}

impl DiskKeys {
    /// Build keys from a flat keyword map (e.g. one row of a header query).
    pub fn from_keyword_map(map: &HashMap<String, f64>) -> Result<Self, ConfigurationError> {
        let get = |k: &str| map.get(k).copied();
        DiskHeader {
            crpix1: get("CRPIX1"),
            crpix2: get("CRPIX2"),
            rsun_obs: get("RSUN_OBS"),
            cdelt1: get("CDELT1"),
            t_obs: None,
        }
        .into_keys()
    }

    /// Disk radius in pixels, `RSUN_OBS / CDELT1`.
    pub fn radius_px(&self) -> Result<f64, ConfigurationError> {
        if self.cdelt1 == 0.0 || !self.cdelt1.is_finite() || !self.rsun_obs.is_finite() {
            return Err(ConfigurationError::DegeneratePlateScale {
                cdelt1: self.cdelt1,
                rsun_obs: self.rsun_obs,
            });
        }
        Ok(self.rsun_obs / self.cdelt1)
    }

    /// Parsed `T_OBS`, if present.
    pub fn observation_date(&self) -> Option<Result<NaiveDateTime, ConfigurationError>> {
        self.t_obs.as_deref().map(parse_observation_date)
    }

    pub fn reference_frame(&self, side: u32) -> ReferenceFrame {
        ReferenceFrame {
            crpix1: self.crpix1,
            crpix2: self.crpix2,
            side,
        }
    }
}

/// The canvas's own placement metadata. Immutable once a canvas exists.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceFrame {
    pub crpix1: f64,
    pub crpix2: f64,
    /// Canvas side length in pixels.
    pub side: u32,
}

/// Parse an archive timestamp.
///
/// Accepts the JSOC form `2012.07.12_00:00:00` (optionally with fractional
/// seconds and a `_TAI`/`_UTC` scale suffix) and plain ISO-8601 forms.
pub fn parse_observation_date(raw: &str) -> Result<NaiveDateTime, ConfigurationError> {
    let trimmed = raw.trim();
    let base = trimmed
        .strip_suffix("_TAI")
        .or_else(|| trimmed.strip_suffix("_UTC"))
        .unwrap_or(trimmed);
    if let Ok(date) = NaiveDateTime::parse_from_str(base, JSOC_PARSE_FORMAT) {
        return Ok(date);
    }
    for fmt in ISO_DATE_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(base, fmt) {
            return Ok(date);
        }
    }
    if let Ok(day) = chrono::NaiveDate::parse_from_str(base, "%Y-%m-%d") {
        return Ok(day.and_time(chrono::NaiveTime::MIN));
    }
    Err(ConfigurationError::ObservationDate(raw.to_string()))
}

/// Format a timestamp the way the archive prints `T_OBS`.
pub fn format_observation_date(date: &NaiveDateTime) -> String {
    date.format(JSOC_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|day| day.and_hms_opt(hh, mm, ss))
            .expect("valid date")
    }

    #[test]
    fn missing_keyword_is_reported_by_name() {
        let mut map = HashMap::new();
        map.insert("CRPIX1".to_string(), 2048.0);
        map.insert("CRPIX2".to_string(), 2048.0);
        map.insert("RSUN_OBS".to_string(), 950.0);
        let err = DiskKeys::from_keyword_map(&map).expect_err("CDELT1 missing");
        assert_eq!(err, ConfigurationError::MissingKeyword { keyword: "CDELT1" });
    }

    #[test]
    fn zero_plate_scale_is_rejected() {
        let header = DiskHeader {
            crpix1: Some(5.0),
            crpix2: Some(5.0),
            rsun_obs: Some(3.0),
            cdelt1: Some(0.0),
            t_obs: None,
        };
        assert!(matches!(
            header.into_keys(),
            Err(ConfigurationError::DegeneratePlateScale { .. })
        ));
    }

    #[test]
    fn nan_keyword_is_invalid() {
        let header = DiskHeader {
            crpix1: Some(f64::NAN),
            crpix2: Some(5.0),
            rsun_obs: Some(3.0),
            cdelt1: Some(1.0),
            t_obs: None,
        };
        assert!(matches!(
            header.into_keys(),
            Err(ConfigurationError::InvalidKeyword {
                keyword: "CRPIX1",
                ..
            })
        ));
    }

    #[test]
    fn header_deserializes_from_upper_case_keywords() {
        let raw = r#"{"CRPIX1": 2048.5, "CRPIX2": 2047.5, "RSUN_OBS": 953.2, "CDELT1": 0.504,
                      "T_OBS": "2012.07.12_00:00:00_TAI"}"#;
        let header: DiskHeader = serde_json::from_str(raw).expect("valid json");
        let keys = header.into_keys().expect("complete header");
        assert_eq!(keys.crpix1, 2048.5);
        approx::assert_relative_eq!(keys.radius_px().unwrap(), 953.2 / 0.504);
        assert_eq!(
            keys.observation_date().unwrap().unwrap(),
            date(2012, 7, 12, 0, 0, 0)
        );
    }

    #[test]
    fn parses_jsoc_and_iso_dates() {
        assert_eq!(
            parse_observation_date("2010.07.14_11:00:08_TAI").unwrap(),
            date(2010, 7, 14, 11, 0, 8)
        );
        let fractional = parse_observation_date("2010.07.14_11:00:08.25_TAI").unwrap();
        assert_eq!(
            fractional,
            NaiveDate::from_ymd_opt(2010, 7, 14)
                .and_then(|d| d.and_hms_milli_opt(11, 0, 8, 250))
                .unwrap()
        );
        assert_eq!(
            parse_observation_date("2003-10-28T11:00:00").unwrap(),
            date(2003, 10, 28, 11, 0, 0)
        );
        assert_eq!(
            parse_observation_date("2003-10-28").unwrap(),
            date(2003, 10, 28, 0, 0, 0)
        );
        assert!(parse_observation_date("yesterday").is_err());
    }

    #[test]
    fn format_round_trips_jsoc_form() {
        let d = date(2014, 1, 7, 18, 24, 0);
        assert_eq!(format_observation_date(&d), "2014.01.07_18:24:00");
    }
}
