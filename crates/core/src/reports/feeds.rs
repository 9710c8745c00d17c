//! Measurement feeds: the recent-measurements list and the at-risk patient list.

use super::{ReportContext, ReportFilters, ReportService};
use crate::constants::{AT_RISK_DEFAULT_LIMIT, RECENT_DEFAULT_DAYS, RECENT_DEFAULT_LIMIT};
use crate::error::CoreResult;
use crate::id::RecordId;
use crate::models::Measurement;
use chrono::{DateTime, Utc};
use muac_types::SeverityCode;
use serde::Serialize;

/// One row of the recent-measurements feed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecentMeasurement {
    pub measurement_id: RecordId,
    pub patient_id: RecordId,
    pub patient_name: Option<String>,
    pub age_months: Option<u32>,
    pub value: f64,
    pub severity_code: SeverityCode,
    pub color_hex: &'static str,
    pub operator_id: RecordId,
    pub operator_name: Option<String>,
    pub region_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AtRiskPatient {
    pub patient_id: RecordId,
    pub patient_name: Option<String>,
    pub age_months: Option<u32>,
    pub region_name: Option<String>,
    pub measurement_id: RecordId,
    pub value: f64,
    pub severity_code: SeverityCode,
    pub color_hex: &'static str,
    pub measured_at: DateTime<Utc>,
    pub days_since: i64,
}

/// Patients whose latest measurement is below the normal threshold.
///
/// Both buckets are sorted by value, lowest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AtRiskReport {
    pub severe: Vec<AtRiskPatient>,
    pub moderate: Vec<AtRiskPatient>,
}

impl AtRiskReport {
    pub fn total(&self) -> usize {
        self.severe.len() + self.moderate.len()
    }
}

fn by_value(a: &Measurement, b: &Measurement) -> std::cmp::Ordering {
    a.value.total_cmp(&b.value).then(a.created_at.cmp(&b.created_at))
}

impl ReportService {
    /// The most recent measurements, newest first. Not deduplicated per patient.
    ///
    /// Defaults to the last 7 days and 50 rows.
    ///
    /// # Errors
    ///
    /// Returns store errors from reading measurements or the directory.
    pub fn recent(&self, filters: &ReportFilters) -> CoreResult<Vec<RecentMeasurement>> {
        let mut ctx = self.context(filters, Some(filters.window_or(RECENT_DEFAULT_DAYS)))?;
        let limit = filters.limit_or(RECENT_DEFAULT_LIMIT);

        let mut measurements = std::mem::take(&mut ctx.measurements);
        measurements.retain(|m| ctx.by_operator(m));
        measurements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        measurements.truncate(limit);

        Ok(measurements
            .into_iter()
            .map(|m| {
                let classification = self.cfg.thresholds().classify(m.value);
                let patient = ctx.patients.get(&m.patient_id);
                RecentMeasurement {
                    measurement_id: m.id,
                    patient_id: m.patient_id,
                    patient_name: patient.map(|p| p.name.clone()),
                    age_months: patient.and_then(|p| p.age_months(ctx.now)),
                    value: m.value,
                    severity_code: classification.code,
                    color_hex: classification.color_hex,
                    operator_id: m.operator_id,
                    operator_name: ctx.operators.get(&m.operator_id).map(|o| o.name.clone()),
                    region_name: ctx.region_name(patient),
                    created_at: m.created_at,
                }
            })
            .collect())
    }

    /// Patients at risk, split into severe and moderate.
    ///
    /// The limit (default 100) applies to both buckets together: the lowest values are kept.
    pub fn at_risk(&self, filters: &ReportFilters) -> CoreResult<AtRiskReport> {
        let ctx = self.context(filters, filters.window())?;
        let thresholds = *self.cfg.thresholds();

        let mut at_risk: Vec<Measurement> = ctx
            .latest()
            .into_iter()
            .filter(|m| thresholds.classify(m.value).code.is_at_risk())
            .collect();
        at_risk.sort_by(by_value);
        at_risk.truncate(filters.limit_or(AT_RISK_DEFAULT_LIMIT));

        let mut report = AtRiskReport::default();
        for measurement in at_risk {
            let row = at_risk_row(&ctx, thresholds.classify(measurement.value).code, measurement);
            match row.severity_code {
                SeverityCode::Red => report.severe.push(row),
                _ => report.moderate.push(row),
            }
        }
        Ok(report)
    }
}

fn at_risk_row(ctx: &ReportContext, code: SeverityCode, m: Measurement) -> AtRiskPatient {
    let patient = ctx.patients.get(&m.patient_id);
    AtRiskPatient {
        patient_id: m.patient_id,
        patient_name: patient.map(|p| p.name.clone()),
        age_months: patient.and_then(|p| p.age_months(ctx.now)),
        region_name: ctx.region_name(patient),
        measurement_id: m.id,
        value: m.value,
        severity_code: code,
        color_hex: code.color_hex(),
        measured_at: m.created_at,
        days_since: (ctx.now - m.created_at).num_days(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::test_support::ReportFixture;
    use crate::models::Patient;
    use chrono::NaiveDate;

    #[test]
    fn test_recent_is_newest_first_and_not_deduplicated() {
        let f = ReportFixture::new();
        let north = f.region("North");
        let op = f.operator("Wanjiru", Some(north));
        let amina = f.patient("Amina", Some(north));
        let older = f.measure(amina, op, 12.0, 3);
        let newer = f.measure(amina, op, 11.0, 1);

        let rows = f.service.recent(&ReportFilters::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement_id, newer.id);
        assert_eq!(rows[1].measurement_id, older.id);
        assert_eq!(rows[0].severity_code, SeverityCode::Red);
        assert_eq!(rows[0].color_hex, "#F44336");
        assert_eq!(rows[0].patient_name.as_deref(), Some("Amina"));
        assert_eq!(rows[0].operator_name.as_deref(), Some("Wanjiru"));
        assert_eq!(rows[0].region_name.as_deref(), Some("North"));
    }

    #[test]
    fn test_recent_defaults_to_seven_days_and_honours_limit() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        let amina = f.patient("Amina", None);
        f.measure(amina, op, 12.0, 10);
        for days in 0..4 {
            f.measure(amina, op, 13.0, days);
        }

        assert_eq!(f.service.recent(&ReportFilters::default()).unwrap().len(), 4);
        let limited = ReportFilters {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(f.service.recent(&limited).unwrap().len(), 2);
        let wide = ReportFilters {
            window_days: Some(30),
            ..Default::default()
        };
        assert_eq!(f.service.recent(&wide).unwrap().len(), 5);
    }

    #[test]
    fn test_recent_reports_age_in_months() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        let patient = Patient {
            id: RecordId::new(),
            name: "Amina".into(),
            birth_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            region_id: None,
        };
        f.memory.insert_patient(patient.clone()).unwrap();
        f.measure(patient.id, op, 12.0, 0);

        let rows = f.service.recent(&ReportFilters::default()).unwrap();
        assert_eq!(rows[0].age_months, patient.age_months(Utc::now()));
        assert!(rows[0].age_months.is_some());
    }

    #[test]
    fn test_at_risk_uses_latest_measurement_and_splits_buckets() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        let amina = f.patient("Amina", None);
        let baraka = f.patient("Baraka", None);
        let chiku = f.patient("Chiku", None);
        let dalia = f.patient("Dalia", None);
        f.measure(amina, op, 15.0, 5);
        f.measure(amina, op, 10.0, 2);
        f.measure(baraka, op, 11.0, 1);
        f.measure(chiku, op, 12.0, 0);
        f.measure(dalia, op, 10.0, 9);
        f.measure(dalia, op, 12.6, 1);

        let report = f.service.at_risk(&ReportFilters::default()).unwrap();

        assert_eq!(report.total(), 3);
        let severe: Vec<RecordId> = report.severe.iter().map(|r| r.patient_id).collect();
        assert_eq!(severe, vec![amina, baraka], "sorted by value ascending");
        assert_eq!(report.severe[0].days_since, 2);
        assert_eq!(report.moderate.len(), 1);
        assert_eq!(report.moderate[0].patient_id, chiku);
        assert_eq!(report.moderate[0].severity_code, SeverityCode::Yellow);
    }

    #[test]
    fn test_at_risk_limit_keeps_lowest_values() {
        let f = ReportFixture::new();
        let op = f.operator("Wanjiru", None);
        for value in [12.2, 9.0, 11.8, 10.5] {
            let patient = f.patient("P", None);
            f.measure(patient, op, value, 1);
        }

        let report = f
            .service
            .at_risk(&ReportFilters {
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();

        let values: Vec<f64> = report.severe.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![9.0, 10.5]);
        assert!(report.moderate.is_empty());
    }

    #[test]
    fn test_at_risk_operator_filter_uses_patients_true_latest_measurement() {
        let f = ReportFixture::new();
        let wanjiru = f.operator("Wanjiru", None);
        let juma = f.operator("Juma", None);
        let amina = f.patient("Amina", None);
        let baraka = f.patient("Baraka", None);
        f.measure(amina, wanjiru, 10.0, 2);
        f.measure(amina, juma, 15.0, 1);
        f.measure(baraka, wanjiru, 11.0, 1);

        let report = f
            .service
            .at_risk(&ReportFilters {
                operator_id: Some(wanjiru),
                ..Default::default()
            })
            .unwrap();

        let severe: Vec<RecordId> = report.severe.iter().map(|r| r.patient_id).collect();
        assert_eq!(severe, vec![baraka], "Amina's latest reading is normal");
        assert!(report.moderate.is_empty());
    }

    #[test]
    fn test_recent_operator_filter_keeps_that_operators_rows() {
        let f = ReportFixture::new();
        let wanjiru = f.operator("Wanjiru", None);
        let juma = f.operator("Juma", None);
        let amina = f.patient("Amina", None);
        let older = f.measure(amina, wanjiru, 10.0, 2);
        f.measure(amina, juma, 15.0, 1);

        let rows = f
            .service
            .recent(&ReportFilters {
                operator_id: Some(wanjiru),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].measurement_id, older.id);
        assert_eq!(rows[0].operator_name.as_deref(), Some("Wanjiru"));
    }
}
