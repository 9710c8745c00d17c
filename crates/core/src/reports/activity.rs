//! Operator activity.

use super::{ReportFilters, ReportService};
use crate::constants::OPERATOR_ACTIVITY_DAYS;
use crate::error::CoreResult;
use crate::id::RecordId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperatorActivity {
    pub operator_id: RecordId,
    pub operator_name: String,
    pub region_id: Option<RecordId>,
    /// Distinct patients measured.
    pub total_patients: usize,
    pub total_measurements: usize,
    pub last_activity: Option<DateTime<Utc>>,
    /// Measurements in the last 7 days, whatever window the filters set.
    pub measurements_last_7_days: usize,
}

impl ReportService {
    /// Per-operator activity, most active first.
    ///
    /// Operators without any measurement are included with zero counts.
    pub fn operator_activity(&self, filters: &ReportFilters) -> CoreResult<Vec<OperatorActivity>> {
        // The weekly count reads every row; only the totals honour the window.
        let ctx = self.context(filters, None)?;
        let recent_start = ctx.now - Duration::days(OPERATOR_ACTIVITY_DAYS);
        let window_start = filters
            .window()
            .map(|days| ctx.now - Duration::days(i64::from(days)));

        let mut rows: Vec<OperatorActivity> = ctx
            .operators
            .values()
            .map(|operator| {
                let all_taken: Vec<_> = ctx
                    .measurements
                    .iter()
                    .filter(|m| m.operator_id == operator.id)
                    .collect();
                let taken: Vec<_> = all_taken
                    .iter()
                    .copied()
                    .filter(|m| window_start.map_or(true, |start| m.created_at >= start))
                    .collect();
                let patients: HashSet<RecordId> = taken.iter().map(|m| m.patient_id).collect();
                OperatorActivity {
                    operator_id: operator.id,
                    operator_name: operator.name.clone(),
                    region_id: operator.region_id,
                    total_patients: patients.len(),
                    total_measurements: taken.len(),
                    last_activity: taken.iter().map(|m| m.created_at).max(),
                    measurements_last_7_days: all_taken
                        .iter()
                        .filter(|m| m.created_at >= recent_start)
                        .count(),
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.total_measurements
                .cmp(&a.total_measurements)
                .then_with(|| a.operator_name.cmp(&b.operator_name))
        });
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::ReportFixture;

    #[test]
    fn test_operator_activity_counts_patients_and_recent_week() {
        let f = ReportFixture::new();
        let wanjiru = f.operator("Wanjiru", None);
        let juma = f.operator("Juma", None);
        let idle = f.operator("Idle", None);
        let amina = f.patient("Amina", None);
        let baraka = f.patient("Baraka", None);
        f.measure(amina, wanjiru, 12.0, 20);
        f.measure(amina, wanjiru, 12.2, 3);
        let latest = f.measure(baraka, wanjiru, 11.0, 1);
        f.measure(baraka, juma, 13.0, 10);

        let rows = f.service.operator_activity(&ReportFilters::default()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].operator_id, wanjiru);
        assert_eq!(rows[0].total_patients, 2);
        assert_eq!(rows[0].total_measurements, 3);
        assert_eq!(rows[0].measurements_last_7_days, 2);
        assert_eq!(rows[0].last_activity, Some(latest.created_at));
        assert_eq!(rows[1].operator_id, juma);
        assert_eq!(rows[1].measurements_last_7_days, 0);
        assert_eq!(rows[2].operator_id, idle);
        assert_eq!(rows[2].total_measurements, 0);
        assert_eq!(rows[2].last_activity, None);
    }

    #[test]
    fn test_operator_activity_week_count_ignores_wider_window() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        let amina = f.patient("Amina", None);
        f.measure(amina, op, 12.0, 30);
        f.measure(amina, op, 12.0, 2);

        let rows = f
            .service
            .operator_activity(&ReportFilters {
                window_days: Some(90),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows[0].total_measurements, 2);
        assert_eq!(rows[0].measurements_last_7_days, 1);
    }

    #[test]
    fn test_operator_activity_week_count_ignores_narrower_window() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        let amina = f.patient("Amina", None);
        f.measure(amina, op, 12.0, 5);
        let latest = f.measure(amina, op, 12.0, 1);

        let rows = f
            .service
            .operator_activity(&ReportFilters {
                window_days: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows[0].total_measurements, 1);
        assert_eq!(rows[0].total_patients, 1);
        assert_eq!(rows[0].last_activity, Some(latest.created_at));
        assert_eq!(rows[0].measurements_last_7_days, 2);
    }
}
