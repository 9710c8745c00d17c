//! Risk reports.
//!
//! Every distribution counts **one measurement per patient**, the most recent by creation
//! time. A patient measured at 15.0 last month and 10.0 today is severe, not half normal.
//!
//! Reports are read-only. They classify values under the configured [`Thresholds`], the same
//! set the measurement service classifies with, so a changed threshold shows up in reports
//! straight away.
//!
//! `region_id` restricts to patients and operators of that region, and `window_days` (when
//! set) to measurements created within that many days. Both apply before the latest row per
//! patient is picked.
//!
//! `operator_id` applies after it. Distributions and the at-risk list keep the patients whose
//! latest measurement that operator took, so an operator's older reading never stands in for
//! a patient's current status. Row-level reports keep that operator's measurements.
//!
//! [`Thresholds`]: crate::config::Thresholds

pub mod activity;
pub mod feeds;
pub mod summary;

pub use activity::OperatorActivity;
pub use feeds::{AtRiskPatient, AtRiskReport, RecentMeasurement};
pub use summary::{Bucket, DashboardSummary, Distribution, RegionBreakdown};

use crate::config::CoreConfig;
use crate::constants::{MAX_REPORT_LIMIT, MAX_WINDOW_DAYS};
use crate::error::CoreResult;
use crate::id::RecordId;
use crate::models::{Measurement, Operator, Patient, Region};
use crate::store::{latest_per_patient, Stores};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-side filters shared by all reports. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub region_id: Option<RecordId>,
    #[serde(default)]
    pub operator_id: Option<RecordId>,
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ReportFilters {
    /// The requested window, clamped to `1..=365` days.
    pub fn window(&self) -> Option<u32> {
        self.window_days.map(|days| days.clamp(1, MAX_WINDOW_DAYS))
    }

    /// The requested window, or `default` when none was given.
    pub fn window_or(&self, default: u32) -> u32 {
        self.window().unwrap_or(default)
    }

    /// The requested limit clamped to `1..=1000`, or `default` when none was given.
    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_REPORT_LIMIT)
    }
}

/// `100 * count / total`, rounded to two decimals. Zero when `total` is zero.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = 100.0 * count as f64 / total as f64;
    (raw * 100.0).round() / 100.0
}

// ============================================================================
// REPORT SERVICE
// ============================================================================

/// Builds reports from the measurement store and the directory.
#[derive(Clone)]
pub struct ReportService {
    cfg: Arc<CoreConfig>,
    stores: Stores,
}

impl ReportService {
    /// Creates a report service.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration supplying the classification thresholds
    /// * `stores` - Storage backends; only read from
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self { cfg, stores }
    }

    /// Loads the directory and the measurements matching the region filter, windowed by
    /// `window`. The operator filter is carried on the context, not applied to the rows.
    fn context(&self, filters: &ReportFilters, window: Option<u32>) -> CoreResult<ReportContext> {
        let now = Utc::now();
        let in_region = |region: Option<RecordId>| match filters.region_id {
            Some(wanted) => region == Some(wanted),
            None => true,
        };

        let patients: HashMap<RecordId, Patient> = self
            .stores
            .directory
            .patients()?
            .into_iter()
            .filter(|p| in_region(p.region_id))
            .map(|p| (p.id, p))
            .collect();
        let operators: HashMap<RecordId, Operator> = self
            .stores
            .directory
            .operators()?
            .into_iter()
            .filter(|o| in_region(o.region_id))
            .filter(|o| filters.operator_id.map_or(true, |wanted| o.id == wanted))
            .map(|o| (o.id, o))
            .collect();
        let regions: Vec<Region> = self
            .stores
            .directory
            .regions()?
            .into_iter()
            .filter(|r| in_region(Some(r.id)))
            .collect();

        let since = window.map(|days| now - Duration::days(i64::from(days)));
        let measurements: Vec<Measurement> = self
            .stores
            .measurements
            .list()?
            .into_iter()
            .filter(|m| filters.region_id.is_none() || patients.contains_key(&m.patient_id))
            .filter(|m| since.map_or(true, |since| m.created_at >= since))
            .collect();

        Ok(ReportContext {
            now,
            operator_id: filters.operator_id,
            patients,
            operators,
            regions,
            measurements,
        })
    }
}

/// Directory snapshot plus the filtered measurements a report works on.
struct ReportContext {
    now: DateTime<Utc>,
    operator_id: Option<RecordId>,
    patients: HashMap<RecordId, Patient>,
    operators: HashMap<RecordId, Operator>,
    regions: Vec<Region>,
    measurements: Vec<Measurement>,
}

impl ReportContext {
    /// True if `measurement` passes the operator filter.
    fn by_operator(&self, measurement: &Measurement) -> bool {
        self.operator_id
            .map_or(true, |wanted| measurement.operator_id == wanted)
    }

    /// Measurements passing the operator filter.
    fn operator_measurements(&self) -> impl Iterator<Item = &Measurement> + '_ {
        self.measurements.iter().filter(|m| self.by_operator(m))
    }

    /// Each patient's latest measurement, kept only if it passes the operator filter.
    fn latest(&self) -> Vec<Measurement> {
        latest_per_patient(self.measurements.clone())
            .into_iter()
            .filter(|m| self.by_operator(m))
            .collect()
    }

    fn region_name(&self, patient: Option<&Patient>) -> Option<String> {
        let region_id = patient?.region_id?;
        self.regions
            .iter()
            .find(|r| r.id == region_id)
            .map(|r| r.name.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(3, 12), 25.0);
        assert_eq!(percentage(1, 3), 33.33);
    }

    #[test]
    fn test_filters_clamp_window_and_limit() {
        let filters = ReportFilters {
            window_days: Some(10_000),
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(filters.window(), Some(MAX_WINDOW_DAYS));
        assert_eq!(filters.limit_or(50), 1);

        let defaults = ReportFilters::default();
        assert_eq!(defaults.window(), None);
        assert_eq!(defaults.window_or(7), 7);
        assert_eq!(defaults.limit_or(50), 50);
        assert_eq!(
            ReportFilters {
                limit: Some(5_000),
                ..Default::default()
            }
            .limit_or(50),
            MAX_REPORT_LIMIT
        );
    }
}
