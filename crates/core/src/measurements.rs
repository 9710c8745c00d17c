//! Measurement orchestration.
//!
//! [`MeasurementService`] turns a raw arm-circumference reading into a stored, classified
//! measurement:
//!
//! 1. validate the input before touching any store;
//! 2. check that the patient and operator exist in the directory;
//! 3. classify the value under the configured thresholds;
//! 4. resolve a severity label and a recommendation, creating either on first use;
//! 5. persist the measurement with both label references.
//!
//! Label rows created in step 4 are shared by every later measurement with the same code, so
//! recording the same kind of value twice never creates a second row.

use crate::classifier::Classification;
use crate::config::CoreConfig;
use crate::constants::MAX_NOTE_LEN;
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::labels::LabelResolver;
use crate::models::{Measurement, NewMeasurement, Recommendation, SeverityLabel};
use crate::store::Stores;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Which labels a call created as a byproduct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CreatedLabels {
    pub severity_label: bool,
    pub recommendation: bool,
}

/// A stored measurement composed with its classification and label rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassifiedMeasurement {
    pub measurement: Measurement,
    pub classification: Classification,
    pub severity_label: SeverityLabel,
    pub recommendation: Recommendation,
    pub created_labels: CreatedLabels,
}

// ============================================================================
// MEASUREMENT SERVICE
// ============================================================================

/// Records and classifies measurements.
#[derive(Clone)]
pub struct MeasurementService {
    cfg: Arc<CoreConfig>,
    stores: Stores,
    resolver: LabelResolver,
}

impl MeasurementService {
    /// Creates a measurement service.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration supplying the classification thresholds
    /// * `stores` - Storage backends for measurements, labels and the directory
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        let resolver = LabelResolver::new(
            *cfg.thresholds(),
            stores.severity_labels.clone(),
            stores.recommendations.clone(),
        );
        Self {
            cfg,
            stores,
            resolver,
        }
    }

    /// Validates, classifies and stores a new measurement.
    ///
    /// # Arguments
    ///
    /// * `input` - The raw reading with its patient and operator references
    ///
    /// # Returns
    ///
    /// The stored measurement, its classification, both resolved labels and which of them
    /// this call created.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidInput` if the value is outside `(0, max_value]`, a reference is
    ///   nil, or the note is too long. Nothing is read or written in that case.
    /// - `CoreError::NotFound` if the patient or operator does not exist.
    /// - Store errors from label resolution or the measurement write.
    pub fn create_classified(&self, input: NewMeasurement) -> CoreResult<ClassifiedMeasurement> {
        let note = self.validate(&input)?;

        if self.stores.directory.patient(input.patient_id)?.is_none() {
            return Err(CoreError::not_found("patient", input.patient_id));
        }
        if self.stores.directory.operator(input.operator_id)?.is_none() {
            return Err(CoreError::not_found("operator", input.operator_id));
        }

        let classification = self.cfg.thresholds().classify(input.value);
        let severity_label = self.resolver.resolve_severity_label(classification.code)?;
        let recommendation = self
            .resolver
            .resolve_recommendation(classification.code, input.value)?;

        let measurement = self.stores.measurements.create(Measurement {
            id: RecordId::new(),
            value: input.value,
            note,
            patient_id: input.patient_id,
            operator_id: input.operator_id,
            severity_label_id: Some(severity_label.label.id),
            recommendation_id: Some(recommendation.label.id),
            created_at: Utc::now(),
        })?;

        tracing::info!(
            id = %measurement.id,
            patient = %measurement.patient_id,
            value = measurement.value,
            code = %classification.code,
            "recorded measurement"
        );

        Ok(ClassifiedMeasurement {
            measurement,
            classification,
            severity_label: severity_label.label,
            recommendation: recommendation.label,
            created_labels: CreatedLabels {
                severity_label: severity_label.created,
                recommendation: recommendation.created,
            },
        })
    }

    /// Loads a stored measurement with its labels.
    ///
    /// The classification reported is the one the stored severity label stands for, so it
    /// stays stable if the thresholds change later. See [`MeasurementService::reclassify`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the measurement or either referenced label is missing.
    pub fn get_classified(&self, id: RecordId) -> CoreResult<ClassifiedMeasurement> {
        let measurement = self
            .stores
            .measurements
            .get(id)?
            .ok_or_else(|| CoreError::not_found("measurement", id))?;

        let severity_label = measurement
            .severity_label_id
            .and_then(|label_id| self.stores.severity_labels.get(label_id).transpose())
            .transpose()?
            .ok_or_else(|| {
                CoreError::not_found(
                    "severity label",
                    measurement.severity_label_id.unwrap_or_else(RecordId::nil),
                )
            })?;
        let recommendation = measurement
            .recommendation_id
            .and_then(|rec_id| self.stores.recommendations.get(rec_id).transpose())
            .transpose()?
            .ok_or_else(|| {
                CoreError::not_found(
                    "recommendation",
                    measurement.recommendation_id.unwrap_or_else(RecordId::nil),
                )
            })?;

        let classification = match severity_label.severity_code {
            Some(code) => Classification::for_code(code),
            None => self.cfg.thresholds().classify(measurement.value),
        };

        Ok(ClassifiedMeasurement {
            measurement,
            classification,
            severity_label,
            recommendation,
            created_labels: CreatedLabels::default(),
        })
    }

    /// Re-runs classification under the current thresholds and re-points the label references.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the measurement does not exist, or store errors from
    /// label resolution or the update.
    pub fn reclassify(&self, id: RecordId) -> CoreResult<ClassifiedMeasurement> {
        let existing = self
            .stores
            .measurements
            .get(id)?
            .ok_or_else(|| CoreError::not_found("measurement", id))?;

        let classification = self.cfg.thresholds().classify(existing.value);
        let severity_label = self.resolver.resolve_severity_label(classification.code)?;
        let recommendation = self
            .resolver
            .resolve_recommendation(classification.code, existing.value)?;

        let measurement = self.stores.measurements.update_labels(
            id,
            Some(severity_label.label.id),
            Some(recommendation.label.id),
        )?;

        if existing.severity_label_id != measurement.severity_label_id
            || existing.recommendation_id != measurement.recommendation_id
        {
            tracing::info!(id = %id, code = %classification.code, "reclassified measurement");
        }

        Ok(ClassifiedMeasurement {
            measurement,
            classification,
            severity_label: severity_label.label,
            recommendation: recommendation.label,
            created_labels: CreatedLabels {
                severity_label: severity_label.created,
                recommendation: recommendation.created,
            },
        })
    }

    /// Checks a raw reading without store access and returns the normalized note.
    fn validate(&self, input: &NewMeasurement) -> CoreResult<String> {
        let thresholds = self.cfg.thresholds();
        if !thresholds.is_valid_value(input.value) {
            return Err(CoreError::InvalidInput(format!(
                "value must be greater than 0 and at most {} cm, got {}",
                thresholds.max_value(),
                input.value
            )));
        }
        if input.operator_id.is_nil() {
            return Err(CoreError::InvalidInput("operator_id is required".into()));
        }
        if input.patient_id.is_nil() {
            return Err(CoreError::InvalidInput("patient_id is required".into()));
        }

        let note = input
            .note
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(CoreError::InvalidInput(format!(
                "note must be at most {MAX_NOTE_LEN} characters"
            )));
        }
        Ok(note)
    }
}
