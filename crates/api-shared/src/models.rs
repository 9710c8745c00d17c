//! Wire types for the MUAC APIs.
//!
//! Identifiers travel as 32-character lowercase hex strings and timestamps as RFC 3339 strings.
//! Request types parse into core values with the `into_*`/`to_*` methods, which report bad
//! input as `CoreError::InvalidInput` so every surface maps it to the same status.

use muac_core::measurements::{ClassifiedMeasurement, CreatedLabels};
use muac_core::proximity::NearbyLocation;
use muac_core::reports::{
    AtRiskPatient, AtRiskReport, Bucket, DashboardSummary, Distribution, OperatorActivity,
    RecentMeasurement, RegionBreakdown,
};
use muac_core::{
    Classification, CoreError, CoreResult, Measurement, NewMeasurement, Recommendation,
    RecordId, ReportFilters, SeverityLabel,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn parse_id(field: &str, value: &str) -> CoreResult<RecordId> {
    RecordId::parse(value.trim())
        .map_err(|_| CoreError::InvalidInput(format!("{field} is not a valid id: '{value}'")))
}

fn parse_optional_id(field: &str, value: Option<&str>) -> CoreResult<Option<RecordId>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_id(field, v).map(Some),
        None => Ok(None),
    }
}

/// Error body returned with every non-2xx status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassifyQuery {
    /// Arm circumference in centimetres.
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassificationRes {
    /// `GREEN`, `YELLOW` or `RED`.
    pub code: String,
    /// `normal`, `moderate` or `severe`.
    pub category: String,
    pub color_hex: String,
    /// `urgent`, `attention` or `normal`.
    pub priority: String,
    /// 1 is most urgent.
    pub priority_rank: u8,
}

impl From<Classification> for ClassificationRes {
    fn from(c: Classification) -> Self {
        Self {
            code: c.code.as_str().to_string(),
            category: c.code.category().to_string(),
            color_hex: c.color_hex.to_string(),
            priority: c.priority.as_str().to_string(),
            priority_rank: c.priority_rank(),
        }
    }
}

// ============================================================================
// MEASUREMENTS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMeasurementReq {
    /// Arm circumference in centimetres, `0 < value <= 50`.
    pub value: f64,
    #[serde(default)]
    pub note: Option<String>,
    pub patient_id: String,
    pub operator_id: String,
}

impl CreateMeasurementReq {
    /// Parses the request into a core input.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if either id is not a canonical UUID.
    pub fn into_new_measurement(self) -> CoreResult<NewMeasurement> {
        Ok(NewMeasurement {
            value: self.value,
            note: self.note,
            patient_id: parse_id("patient_id", &self.patient_id)?,
            operator_id: parse_id("operator_id", &self.operator_id)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeasurementRes {
    pub id: String,
    pub value: f64,
    pub note: String,
    pub patient_id: String,
    pub operator_id: String,
    pub severity_label_id: Option<String>,
    pub recommendation_id: Option<String>,
    pub created_at: String,
}

impl From<Measurement> for MeasurementRes {
    fn from(m: Measurement) -> Self {
        Self {
            id: m.id.to_string(),
            value: m.value,
            note: m.note,
            patient_id: m.patient_id.to_string(),
            operator_id: m.operator_id.to_string(),
            severity_label_id: m.severity_label_id.map(|id| id.to_string()),
            recommendation_id: m.recommendation_id.map(|id| id.to_string()),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeverityLabelRes {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color_hex: String,
    pub severity_code: Option<String>,
    pub priority: String,
    pub priority_rank: u8,
    pub active: bool,
}

impl From<SeverityLabel> for SeverityLabelRes {
    fn from(label: SeverityLabel) -> Self {
        Self {
            id: label.id.to_string(),
            name: label.name.into_string(),
            description: label.description,
            color_hex: label.color_hex,
            severity_code: label.severity_code.map(|c| c.as_str().to_string()),
            priority: label.priority.as_str().to_string(),
            priority_rank: label.priority.rank(),
            active: label.active,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecommendationRes {
    pub id: String,
    pub name: String,
    pub body_text: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub color_hex: String,
    pub severity_code: Option<String>,
    pub priority: String,
    pub priority_rank: u8,
    pub active: bool,
}

impl From<Recommendation> for RecommendationRes {
    fn from(rec: Recommendation) -> Self {
        Self {
            id: rec.id.to_string(),
            name: rec.name.into_string(),
            body_text: rec.body_text,
            min_value: rec.min_value,
            max_value: rec.max_value,
            color_hex: rec.color_hex,
            severity_code: rec.severity_code.map(|c| c.as_str().to_string()),
            priority: rec.priority.as_str().to_string(),
            priority_rank: rec.priority.rank(),
            active: rec.active,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreatedLabelsRes {
    pub severity_label: bool,
    pub recommendation: bool,
}

impl From<CreatedLabels> for CreatedLabelsRes {
    fn from(c: CreatedLabels) -> Self {
        Self {
            severity_label: c.severity_label,
            recommendation: c.recommendation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassifiedMeasurementRes {
    pub measurement: MeasurementRes,
    pub classification: ClassificationRes,
    pub severity_label: SeverityLabelRes,
    pub recommendation: RecommendationRes,
    /// Labels this request created as a byproduct.
    pub created_labels: CreatedLabelsRes,
}

impl From<ClassifiedMeasurement> for ClassifiedMeasurementRes {
    fn from(c: ClassifiedMeasurement) -> Self {
        Self {
            measurement: c.measurement.into(),
            classification: c.classification.into(),
            severity_label: c.severity_label.into(),
            recommendation: c.recommendation.into(),
            created_labels: c.created_labels.into(),
        }
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Restrict to patients and operators of this region.
    pub region_id: Option<String>,
    /// Restrict to measurements taken by this operator.
    pub operator_id: Option<String>,
    /// Window in days, at most 365.
    pub days: Option<u32>,
    /// Row limit, at most 1000.
    pub limit: Option<usize>,
}

impl ReportQuery {
    /// Parses the query into report filters.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if an id is not a canonical UUID.
    pub fn to_filters(&self) -> CoreResult<ReportFilters> {
        Ok(ReportFilters {
            region_id: parse_optional_id("region_id", self.region_id.as_deref())?,
            operator_id: parse_optional_id("operator_id", self.operator_id.as_deref())?,
            window_days: self.days,
            limit: self.limit,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BucketRes {
    pub count: usize,
    pub percentage: f64,
}

impl From<Bucket> for BucketRes {
    fn from(b: Bucket) -> Self {
        Self {
            count: b.count,
            percentage: b.percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DistributionRes {
    /// Patients with at least one measurement.
    pub total: usize,
    pub normal: BucketRes,
    pub moderate: BucketRes,
    pub severe: BucketRes,
    pub at_risk: BucketRes,
}

impl From<Distribution> for DistributionRes {
    fn from(d: Distribution) -> Self {
        Self {
            total: d.total,
            normal: d.normal.into(),
            moderate: d.moderate.into(),
            severe: d.severe.into(),
            at_risk: d.at_risk.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardRes {
    pub total_patients: usize,
    pub total_measurements: usize,
    pub total_operators: usize,
    pub window_days: u32,
    pub measurements_in_window: usize,
    pub distribution: DistributionRes,
}

impl From<DashboardSummary> for DashboardRes {
    fn from(s: DashboardSummary) -> Self {
        Self {
            total_patients: s.total_patients,
            total_measurements: s.total_measurements,
            total_operators: s.total_operators,
            window_days: s.window_days,
            measurements_in_window: s.measurements_in_window,
            distribution: s.distribution.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionBreakdownRes {
    pub region_id: String,
    pub region_name: String,
    pub total_patients: usize,
    pub distribution: DistributionRes,
}

impl From<RegionBreakdown> for RegionBreakdownRes {
    fn from(r: RegionBreakdown) -> Self {
        Self {
            region_id: r.region_id.to_string(),
            region_name: r.region_name,
            total_patients: r.total_patients,
            distribution: r.distribution.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionsRes {
    pub regions: Vec<RegionBreakdownRes>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentMeasurementRes {
    pub measurement_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub age_months: Option<u32>,
    pub value: f64,
    pub severity_code: String,
    pub color_hex: String,
    pub operator_id: String,
    pub operator_name: Option<String>,
    pub region_name: Option<String>,
    pub created_at: String,
}

impl From<RecentMeasurement> for RecentMeasurementRes {
    fn from(r: RecentMeasurement) -> Self {
        Self {
            measurement_id: r.measurement_id.to_string(),
            patient_id: r.patient_id.to_string(),
            patient_name: r.patient_name,
            age_months: r.age_months,
            value: r.value,
            severity_code: r.severity_code.as_str().to_string(),
            color_hex: r.color_hex.to_string(),
            operator_id: r.operator_id.to_string(),
            operator_name: r.operator_name,
            region_name: r.region_name,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentRes {
    pub measurements: Vec<RecentMeasurementRes>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AtRiskPatientRes {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub age_months: Option<u32>,
    pub region_name: Option<String>,
    pub measurement_id: String,
    pub value: f64,
    pub severity_code: String,
    pub color_hex: String,
    pub measured_at: String,
    pub days_since: i64,
}

impl From<AtRiskPatient> for AtRiskPatientRes {
    fn from(p: AtRiskPatient) -> Self {
        Self {
            patient_id: p.patient_id.to_string(),
            patient_name: p.patient_name,
            age_months: p.age_months,
            region_name: p.region_name,
            measurement_id: p.measurement_id.to_string(),
            value: p.value,
            severity_code: p.severity_code.as_str().to_string(),
            color_hex: p.color_hex.to_string(),
            measured_at: p.measured_at.to_rfc3339(),
            days_since: p.days_since,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AtRiskRes {
    pub total: usize,
    pub severe: Vec<AtRiskPatientRes>,
    pub moderate: Vec<AtRiskPatientRes>,
}

impl From<AtRiskReport> for AtRiskRes {
    fn from(r: AtRiskReport) -> Self {
        Self {
            total: r.total(),
            severe: r.severe.into_iter().map(Into::into).collect(),
            moderate: r.moderate.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OperatorActivityRes {
    pub operator_id: String,
    pub operator_name: String,
    pub region_id: Option<String>,
    pub total_patients: usize,
    pub total_measurements: usize,
    pub last_activity: Option<String>,
    pub measurements_last_7_days: usize,
}

impl From<OperatorActivity> for OperatorActivityRes {
    fn from(a: OperatorActivity) -> Self {
        Self {
            operator_id: a.operator_id.to_string(),
            operator_name: a.operator_name,
            region_id: a.region_id.map(|id| id.to_string()),
            total_patients: a.total_patients,
            total_measurements: a.total_measurements,
            last_activity: a.last_activity.map(|t| t.to_rfc3339()),
            measurements_last_7_days: a.measurements_last_7_days,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OperatorsRes {
    pub operators: Vec<OperatorActivityRes>,
}

// ============================================================================
// LOCATIONS
// ============================================================================

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Search radius; 10 km when absent or not positive.
    pub radius_km: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NearbyLocationRes {
    pub id: String,
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    pub description: String,
    pub distance_km: f64,
}

impl From<NearbyLocation> for NearbyLocationRes {
    fn from(n: NearbyLocation) -> Self {
        Self {
            id: n.location.id.to_string(),
            name: n.location.name,
            latitude: n.location.latitude,
            longitude: n.location.longitude,
            description: n.location.description,
            distance_km: n.distance_km,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NearbyRes {
    pub locations: Vec<NearbyLocationRes>,
}
