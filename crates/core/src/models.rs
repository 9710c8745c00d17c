//! Records handled by the core.
//!
//! Measurements and the two label kinds are owned by the core. Patients, operators, regions
//! and locations are read-only projections of the external CRUD layer and are only referenced
//! by [`RecordId`].

use crate::id::RecordId;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use muac_types::{NonEmptyText, Priority, SeverityCode};
use serde::{Deserialize, Serialize};

// ============================================================================
// MEASUREMENTS
// ============================================================================

/// One arm-circumference observation by a health worker.
///
/// Label references are weak: label rows are shared by many measurements and are only
/// re-pointed, never owned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: RecordId,
    /// Circumference in centimetres.
    pub value: f64,
    #[serde(default)]
    pub note: String,
    pub patient_id: RecordId,
    pub operator_id: RecordId,
    #[serde(default)]
    pub severity_label_id: Option<RecordId>,
    #[serde(default)]
    pub recommendation_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

/// Raw input to [`crate::measurements::MeasurementService::create_classified`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewMeasurement {
    pub value: f64,
    pub note: Option<String>,
    pub patient_id: RecordId,
    pub operator_id: RecordId,
}

// ============================================================================
// LABELS
// ============================================================================

/// Severity label ("tag") attached to a measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeverityLabel {
    pub id: RecordId,
    pub name: NonEmptyText,
    #[serde(default)]
    pub description: String,
    pub color_hex: String,
    /// `None` only on legacy rows that predate the code column.
    #[serde(default)]
    pub severity_code: Option<SeverityCode>,
    pub priority: Priority,
    pub active: bool,
}

/// Follow-up guidance attached to a measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecordId,
    pub name: NonEmptyText,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    pub priority: Priority,
    pub color_hex: String,
    #[serde(default)]
    pub severity_code: Option<SeverityCode>,
    pub active: bool,
}

impl Recommendation {
    /// True if `value` lies in `[min_value, max_value)`; a missing bound is open.
    pub fn is_applicable(&self, value: f64) -> bool {
        let above_min = self.min_value.map_or(true, |min| value >= min);
        let below_max = self.max_value.map_or(true, |max| value < max);
        above_min && below_max
    }
}

// ============================================================================
// DIRECTORY PROJECTIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub region_id: Option<RecordId>,
}

impl Patient {
    /// Age in whole months at `now`, if the birth date is known and not in the future.
    pub fn age_months(&self, now: DateTime<Utc>) -> Option<u32> {
        let birth = self.birth_date?;
        let today = now.date_naive();
        if birth > today {
            return None;
        }
        let mut months = (today.year() - birth.year()) * 12 + today.month() as i32
            - birth.month() as i32;
        if today.day() < birth.day() {
            months -= 1;
        }
        u32::try_from(months.max(0)).ok()
    }
}

/// A health worker who takes measurements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub region_id: Option<RecordId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RecordId,
    pub name: String,
}

/// A registered locality. Coordinates are stored as text and parsed at query time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: RecordId,
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    #[serde(default)]
    pub description: String,
}
