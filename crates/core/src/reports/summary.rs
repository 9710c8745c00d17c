//! Dashboard and per-region summaries.

use super::{percentage, ReportFilters, ReportService};
use crate::config::Thresholds;
use crate::constants::DEFAULT_WINDOW_DAYS;
use crate::error::CoreResult;
use crate::id::RecordId;
use crate::models::Measurement;
use chrono::Duration;
use muac_types::SeverityCode;
use serde::Serialize;

/// A count with its share of the total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub count: usize,
    pub percentage: f64,
}

impl Bucket {
    fn of(count: usize, total: usize) -> Self {
        Self {
            count,
            percentage: percentage(count, total),
        }
    }
}

/// Nutritional status of a set of patients, from each patient's latest measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Distribution {
    /// Patients with at least one measurement.
    pub total: usize,
    pub normal: Bucket,
    pub moderate: Bucket,
    pub severe: Bucket,
    /// Moderate plus severe.
    pub at_risk: Bucket,
}

impl Distribution {
    /// Builds the distribution of `latest`, which must hold one row per patient.
    pub fn from_latest(thresholds: &Thresholds, latest: &[Measurement]) -> Self {
        let (mut normal, mut moderate, mut severe, mut at_risk) = (0, 0, 0, 0);
        for measurement in latest {
            let code = thresholds.classify(measurement.value).code;
            match code {
                SeverityCode::Green => normal += 1,
                SeverityCode::Yellow => moderate += 1,
                SeverityCode::Red => severe += 1,
            }
            if code.is_at_risk() {
                at_risk += 1;
            }
        }
        let total = latest.len();
        Self {
            total,
            normal: Bucket::of(normal, total),
            moderate: Bucket::of(moderate, total),
            severe: Bucket::of(severe, total),
            at_risk: Bucket::of(at_risk, total),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_patients: usize,
    /// Measurements matching the filters, including the window when one is set.
    pub total_measurements: usize,
    pub total_operators: usize,
    /// Length of the activity window below; the requested window, or 30 days.
    pub window_days: u32,
    pub measurements_in_window: usize,
    pub distribution: Distribution,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionBreakdown {
    pub region_id: RecordId,
    pub region_name: String,
    pub total_patients: usize,
    pub distribution: Distribution,
}

impl ReportService {
    /// Headline counts and the overall nutritional distribution.
    ///
    /// # Errors
    ///
    /// Returns store errors from reading measurements or the directory.
    pub fn dashboard(&self, filters: &ReportFilters) -> CoreResult<DashboardSummary> {
        let ctx = self.context(filters, filters.window())?;
        let window_days = filters.window_or(DEFAULT_WINDOW_DAYS);
        let window_start = ctx.now - Duration::days(i64::from(window_days));

        let total_measurements = ctx.operator_measurements().count();
        let measurements_in_window = ctx
            .operator_measurements()
            .filter(|m| m.created_at >= window_start)
            .count();
        let latest = ctx.latest();

        Ok(DashboardSummary {
            total_patients: ctx.patients.len(),
            total_measurements,
            total_operators: ctx.operators.len(),
            window_days,
            measurements_in_window,
            distribution: Distribution::from_latest(self.cfg.thresholds(), &latest),
        })
    }

    /// The distribution per region. Regions without measurements are listed with zero counts.
    ///
    /// Rows are ordered by region name.
    pub fn by_region(&self, filters: &ReportFilters) -> CoreResult<Vec<RegionBreakdown>> {
        let ctx = self.context(filters, filters.window())?;
        let latest = ctx.latest();

        let mut rows: Vec<RegionBreakdown> = ctx
            .regions
            .iter()
            .map(|region| {
                let in_region = |patient_id: &RecordId| {
                    ctx.patients
                        .get(patient_id)
                        .is_some_and(|p| p.region_id == Some(region.id))
                };
                let region_latest: Vec<Measurement> = latest
                    .iter()
                    .filter(|m| in_region(&m.patient_id))
                    .cloned()
                    .collect();
                RegionBreakdown {
                    region_id: region.id,
                    region_name: region.name.clone(),
                    total_patients: ctx.patients.keys().filter(|id| in_region(*id)).count(),
                    distribution: Distribution::from_latest(self.cfg.thresholds(), &region_latest),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.region_name.cmp(&b.region_name));
        Ok(rows)
    }
}
