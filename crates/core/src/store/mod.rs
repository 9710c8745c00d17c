//! Storage interfaces consumed by the core.
//!
//! The core never talks to a database directly. It consumes these traits, and the REST server
//! and CLI pick an implementation at startup:
//!
//! - [`memory`]: process-local tables, used by tests and embedded callers
//! - [`file`]: YAML records under the configured data directory
//!
//! All coordination between concurrent requests happens inside the store. The only invariant
//! the core relies on is that [`LabelStore::create`] refuses a second active row with the same
//! [`Label::unique_key`] and reports it as [`CoreError::Conflict`].

pub mod file;
pub mod memory;

use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::labels::Label;
use crate::models::{Location, Measurement, Operator, Patient, Recommendation, Region, SeverityLabel};
use muac_types::SeverityCode;
use std::collections::HashMap;
use std::sync::Arc;

pub use file::{FileLabelStore, FileStore};
pub use memory::{MemoryLabelStore, MemoryStore};

/// Persistence for measurements.
pub trait MeasurementStore: Send + Sync {
    /// Persists a new measurement. An existing id is a [`CoreError::Conflict`].
    fn create(&self, measurement: Measurement) -> CoreResult<Measurement>;

    fn get(&self, id: RecordId) -> CoreResult<Option<Measurement>>;

    fn list(&self) -> CoreResult<Vec<Measurement>>;

    /// Re-points a measurement's label references and returns the updated row.
    fn update_labels(
        &self,
        id: RecordId,
        severity_label_id: Option<RecordId>,
        recommendation_id: Option<RecordId>,
    ) -> CoreResult<Measurement>;

    /// The most recent measurement of every patient.
    ///
    /// Stores with a native "latest row per group" query should override this.
    fn latest_per_patient(&self) -> CoreResult<Vec<Measurement>> {
        Ok(latest_per_patient(self.list()?))
    }
}

/// Persistence for one label kind.
pub trait LabelStore<L: Label>: Send + Sync {
    /// Persists a new label row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] if an active row with the same unique key exists.
    fn create(&self, label: L) -> CoreResult<L>;

    /// All rows, active or not.
    fn list(&self) -> CoreResult<Vec<L>>;

    /// Overwrites an existing row matched by id.
    fn update(&self, label: &L) -> CoreResult<()>;

    fn get(&self, id: RecordId) -> CoreResult<Option<L>> {
        Ok(self.list()?.into_iter().find(|label| label.id() == id))
    }

    /// Active rows carrying `code`.
    ///
    /// The default scans [`LabelStore::list`]; stores with an index on the code override it.
    fn find_by_code(&self, code: SeverityCode) -> CoreResult<Vec<L>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|label| label.is_active() && label.severity_code() == Some(code))
            .collect())
    }
}

/// Read-only view of the patient, operator and region records owned by the CRUD layer.
pub trait Directory: Send + Sync {
    fn patients(&self) -> CoreResult<Vec<Patient>>;
    fn operators(&self) -> CoreResult<Vec<Operator>>;
    fn regions(&self) -> CoreResult<Vec<Region>>;

    fn patient(&self, id: RecordId) -> CoreResult<Option<Patient>> {
        Ok(self.patients()?.into_iter().find(|p| p.id == id))
    }

    fn operator(&self, id: RecordId) -> CoreResult<Option<Operator>> {
        Ok(self.operators()?.into_iter().find(|o| o.id == id))
    }
}

pub trait LocationStore: Send + Sync {
    fn list_locations(&self) -> CoreResult<Vec<Location>>;
}

/// The set of stores a service needs, bundled for wiring.
#[derive(Clone)]
pub struct Stores {
    pub measurements: Arc<dyn MeasurementStore>,
    pub severity_labels: Arc<dyn LabelStore<SeverityLabel>>,
    pub recommendations: Arc<dyn LabelStore<Recommendation>>,
    pub directory: Arc<dyn Directory>,
    pub locations: Arc<dyn LocationStore>,
}

impl Stores {
    /// Wires a [`MemoryStore`] with fresh in-memory label tables.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            measurements: store.clone(),
            severity_labels: Arc::new(MemoryLabelStore::<SeverityLabel>::new()),
            recommendations: Arc::new(MemoryLabelStore::<Recommendation>::new()),
            directory: store.clone(),
            locations: store,
        }
    }

    /// Wires a [`FileStore`] with label tables rooted in the same data directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageDirCreation`] if the label directories cannot be created.
    pub fn file(store: Arc<FileStore>) -> CoreResult<Self> {
        let severity_labels = FileLabelStore::<SeverityLabel>::open(store.root())?;
        let recommendations = FileLabelStore::<Recommendation>::open(store.root())?;
        Ok(Self {
            measurements: store.clone(),
            severity_labels: Arc::new(severity_labels),
            recommendations: Arc::new(recommendations),
            directory: store.clone(),
            locations: store,
        })
    }
}

/// Keeps the most recent measurement of each patient.
///
/// Ties on `created_at` are broken by the larger id so the result is deterministic.
pub fn latest_per_patient(measurements: Vec<Measurement>) -> Vec<Measurement> {
    let mut latest: HashMap<RecordId, Measurement> = HashMap::new();
    for measurement in measurements {
        match latest.get(&measurement.patient_id) {
            Some(current)
                if (current.created_at, current.id) >= (measurement.created_at, measurement.id) => {}
            _ => {
                latest.insert(measurement.patient_id, measurement);
            }
        }
    }
    let mut rows: Vec<Measurement> = latest.into_values().collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows
}

pub(crate) fn lock_poisoned<T>(_: T) -> CoreError {
    CoreError::LockPoisoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn measurement(patient_id: RecordId, value: f64, minutes_ago: i64) -> Measurement {
        Measurement {
            id: RecordId::new(),
            value,
            note: String::new(),
            patient_id,
            operator_id: RecordId::new(),
            severity_label_id: None,
            recommendation_id: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_latest_per_patient_keeps_newest_row() {
        let amina = RecordId::new();
        let baraka = RecordId::new();
        let rows = vec![
            measurement(amina, 15.0, 60),
            measurement(amina, 10.0, 5),
            measurement(baraka, 12.0, 30),
            measurement(baraka, 13.0, 90),
        ];

        let latest = latest_per_patient(rows);

        assert_eq!(latest.len(), 2);
        let amina_latest = latest.iter().find(|m| m.patient_id == amina).unwrap();
        assert_eq!(amina_latest.value, 10.0);
        let baraka_latest = latest.iter().find(|m| m.patient_id == baraka).unwrap();
        assert_eq!(baraka_latest.value, 12.0);
        assert_eq!(latest[0].patient_id, amina, "newest first");
    }

    #[test]
    fn test_latest_per_patient_empty() {
        assert!(latest_per_patient(Vec::new()).is_empty());
    }
}
