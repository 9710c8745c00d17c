//! Constants used throughout the MUAC core crate.
//!
//! Clinical thresholds, report defaults and on-disk layout names live here so that the
//! classifier, the reports and the file store agree on them.

/// Measurements below this value (cm) are severe acute malnutrition.
pub const DEFAULT_SEVERE_THRESHOLD: f64 = 11.5;

/// Measurements at or above this value (cm) are normal.
pub const DEFAULT_NORMAL_THRESHOLD: f64 = 12.5;

/// Largest plausible arm circumference (cm); anything above is a data-entry error.
pub const DEFAULT_MAX_VALUE: f64 = 50.0;

/// Maximum accepted length of a measurement note, in characters.
pub const MAX_NOTE_LEN: usize = 500;

/// Default directory for the file store when none is configured.
pub const DEFAULT_DATA_DIR: &str = "muac_data";

/// Report window used when the caller does not supply one.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Upper bound on any report window.
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Upper bound on any report row limit.
pub const MAX_REPORT_LIMIT: usize = 1000;

/// Default window for the recent measurements feed.
pub const RECENT_DEFAULT_DAYS: u32 = 7;

/// Default row limit for the recent measurements feed.
pub const RECENT_DEFAULT_LIMIT: usize = 50;

/// Default row limit for the at-risk patient list.
pub const AT_RISK_DEFAULT_LIMIT: usize = 100;

/// Fixed rolling window for operator weekly activity counts.
pub const OPERATOR_ACTIVITY_DAYS: i64 = 7;

/// Earth radius used by the haversine distance, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Search radius applied when the caller supplies a non-positive one.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Directory name for measurement records in the file store.
pub const MEASUREMENTS_DIR_NAME: &str = "measurements";

/// Directory name for label rows in the file store.
pub const LABELS_DIR_NAME: &str = "labels";

/// Directory name for the read-only projections of the external directory.
pub const DIRECTORY_DIR_NAME: &str = "directory";

pub const PATIENTS_FILENAME: &str = "patients.yaml";
pub const OPERATORS_FILENAME: &str = "operators.yaml";
pub const REGIONS_FILENAME: &str = "regions.yaml";
pub const LOCATIONS_FILENAME: &str = "locations.yaml";
