//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables, which
//! keeps behaviour consistent across threads and test harnesses.

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_MAX_VALUE, DEFAULT_NORMAL_THRESHOLD, DEFAULT_SEVERE_THRESHOLD,
};
use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Clinical classification thresholds, in centimetres.
///
/// `[severe, normal)` is the moderate band. Values at or above `normal` are normal, values
/// below `severe` are severe, and only values in `(0, max_value]` may be classified at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    severe: f64,
    normal: f64,
    max_value: f64,
}

impl Thresholds {
    /// The official MUAC cut-offs for children aged 6–59 months.
    pub const OFFICIAL: Thresholds = Thresholds {
        severe: DEFAULT_SEVERE_THRESHOLD,
        normal: DEFAULT_NORMAL_THRESHOLD,
        max_value: DEFAULT_MAX_VALUE,
    };

    /// Creates a threshold set.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` unless `0 < severe < normal <= max_value` and all
    /// three values are finite.
    pub fn new(severe: f64, normal: f64, max_value: f64) -> CoreResult<Self> {
        if !(severe.is_finite() && normal.is_finite() && max_value.is_finite()) {
            return Err(CoreError::InvalidInput(
                "thresholds must be finite numbers".into(),
            ));
        }
        if !(0.0 < severe && severe < normal && normal <= max_value) {
            return Err(CoreError::InvalidInput(format!(
                "thresholds must satisfy 0 < severe < normal <= max (got severe={severe}, normal={normal}, max={max_value})"
            )));
        }
        Ok(Self {
            severe,
            normal,
            max_value,
        })
    }

    /// Lower bound of the moderate band.
    pub fn severe(&self) -> f64 {
        self.severe
    }

    /// Lower bound of the normal band (and upper bound of the moderate band).
    pub fn normal(&self) -> f64 {
        self.normal
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::OFFICIAL
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    thresholds: Thresholds,
}

impl CoreConfig {
    pub fn new(data_dir: PathBuf, thresholds: Thresholds) -> Self {
        Self {
            data_dir,
            thresholds,
        }
    }

    /// Root directory of the file store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

/// Resolve the data directory from an optional string value.
///
/// `None` or an empty/whitespace value falls back to [`DEFAULT_DATA_DIR`].
pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from)
}

/// Parse the classification thresholds from optional string values.
///
/// Each argument that is `None` or empty/whitespace falls back to the official value.
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` if a value is not a number or the resulting set is not
/// ordered (see [`Thresholds::new`]).
pub fn thresholds_from_env_values(
    severe: Option<String>,
    normal: Option<String>,
    max_value: Option<String>,
) -> CoreResult<Thresholds> {
    fn parse(name: &str, value: Option<String>, default: f64) -> CoreResult<f64> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        match value {
            None => Ok(default),
            Some(v) => v.parse::<f64>().map_err(|_| {
                CoreError::InvalidInput(format!("{name} must be a decimal number, got '{v}'"))
            }),
        }
    }

    Thresholds::new(
        parse("MUAC_SEVERE_THRESHOLD", severe, DEFAULT_SEVERE_THRESHOLD)?,
        parse("MUAC_NORMAL_THRESHOLD", normal, DEFAULT_NORMAL_THRESHOLD)?,
        parse("MUAC_MAX_VALUE", max_value, DEFAULT_MAX_VALUE)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_from_env_value() {
        assert_eq!(data_dir_from_env_value(None), PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(data_dir_from_env_value(Some(" ".into())), PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(
            data_dir_from_env_value(Some("/srv/muac".into())),
            PathBuf::from("/srv/muac")
        );
    }

    #[test]
    fn test_thresholds_default_to_official_values() {
        let thresholds = thresholds_from_env_values(None, Some("  ".into()), None)
            .expect("defaults should be valid");
        assert_eq!(thresholds, Thresholds::OFFICIAL);
        assert_eq!(thresholds.severe(), 11.5);
        assert_eq!(thresholds.normal(), 12.5);
        assert_eq!(thresholds.max_value(), 50.0);
    }

    #[test]
    fn test_thresholds_accept_overrides() {
        let thresholds =
            thresholds_from_env_values(Some("11.0".into()), Some("12.0".into()), None)
                .expect("overrides should be valid");
        assert_eq!(thresholds.severe(), 11.0);
        assert_eq!(thresholds.normal(), 12.0);
    }

    #[test]
    fn test_thresholds_reject_non_numeric() {
        let err = thresholds_from_env_values(Some("eleven".into()), None, None)
            .expect_err("non-numeric should fail");
        match err {
            CoreError::InvalidInput(msg) => assert!(msg.contains("MUAC_SEVERE_THRESHOLD")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_thresholds_reject_unordered() {
        assert!(Thresholds::new(12.5, 11.5, 50.0).is_err());
        assert!(Thresholds::new(0.0, 12.5, 50.0).is_err());
        assert!(Thresholds::new(11.5, 60.0, 50.0).is_err());
        assert!(Thresholds::new(f64::NAN, 12.5, 50.0).is_err());
    }
}
