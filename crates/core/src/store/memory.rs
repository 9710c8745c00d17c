//! In-memory store.
//!
//! Every table sits behind its own lock. Label uniqueness is checked and the row inserted under
//! the same lock acquisition, which makes [`LabelStore::create`] atomic with respect to other
//! writers.

use super::{lock_poisoned, Directory, LabelStore, LocationStore, MeasurementStore};
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::labels::Label;
use crate::models::{Location, Measurement, Operator, Patient, Region};
use std::sync::{Mutex, RwLock};

/// Measurements plus the directory projections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    measurements: RwLock<Vec<Measurement>>,
    patients: RwLock<Vec<Patient>>,
    operators: RwLock<Vec<Operator>>,
    regions: RwLock<Vec<Region>>,
    locations: RwLock<Vec<Location>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_patient(&self, patient: Patient) -> CoreResult<()> {
        upsert(&self.patients, patient, |a, b| a.id == b.id)
    }

    pub fn insert_operator(&self, operator: Operator) -> CoreResult<()> {
        upsert(&self.operators, operator, |a, b| a.id == b.id)
    }

    pub fn insert_region(&self, region: Region) -> CoreResult<()> {
        upsert(&self.regions, region, |a, b| a.id == b.id)
    }

    pub fn insert_location(&self, location: Location) -> CoreResult<()> {
        upsert(&self.locations, location, |a, b| a.id == b.id)
    }
}

fn upsert<T>(table: &RwLock<Vec<T>>, row: T, same: impl Fn(&T, &T) -> bool) -> CoreResult<()> {
    let mut rows = table.write().map_err(lock_poisoned)?;
    match rows.iter().position(|existing| same(existing, &row)) {
        Some(index) => rows[index] = row,
        None => rows.push(row),
    }
    Ok(())
}

fn snapshot<T: Clone>(table: &RwLock<Vec<T>>) -> CoreResult<Vec<T>> {
    Ok(table.read().map_err(lock_poisoned)?.clone())
}

impl MeasurementStore for MemoryStore {
    fn create(&self, measurement: Measurement) -> CoreResult<Measurement> {
        let mut rows = self.measurements.write().map_err(lock_poisoned)?;
        if rows.iter().any(|m| m.id == measurement.id) {
            return Err(CoreError::Conflict(format!(
                "measurement {} already exists",
                measurement.id
            )));
        }
        rows.push(measurement.clone());
        Ok(measurement)
    }

    fn get(&self, id: RecordId) -> CoreResult<Option<Measurement>> {
        let rows = self.measurements.read().map_err(lock_poisoned)?;
        Ok(rows.iter().find(|m| m.id == id).cloned())
    }

    fn list(&self) -> CoreResult<Vec<Measurement>> {
        snapshot(&self.measurements)
    }

    fn update_labels(
        &self,
        id: RecordId,
        severity_label_id: Option<RecordId>,
        recommendation_id: Option<RecordId>,
    ) -> CoreResult<Measurement> {
        let mut rows = self.measurements.write().map_err(lock_poisoned)?;
        let row = rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| CoreError::not_found("measurement", id))?;
        row.severity_label_id = severity_label_id;
        row.recommendation_id = recommendation_id;
        Ok(row.clone())
    }
}

impl Directory for MemoryStore {
    fn patients(&self) -> CoreResult<Vec<Patient>> {
        snapshot(&self.patients)
    }

    fn operators(&self) -> CoreResult<Vec<Operator>> {
        snapshot(&self.operators)
    }

    fn regions(&self) -> CoreResult<Vec<Region>> {
        snapshot(&self.regions)
    }
}

impl LocationStore for MemoryStore {
    fn list_locations(&self) -> CoreResult<Vec<Location>> {
        snapshot(&self.locations)
    }
}

/// One label kind held in memory, in insertion order.
#[derive(Debug)]
pub struct MemoryLabelStore<L> {
    rows: Mutex<Vec<L>>,
}

impl<L> MemoryLabelStore<L> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

impl<L> Default for MemoryLabelStore<L> {
    fn default() -> Self {
        Self::new()
    }
}

fn key_taken<L: Label>(rows: &[L], candidate: &L) -> bool {
    let Some(key) = candidate.unique_key() else {
        return false;
    };
    candidate.is_active()
        && rows.iter().any(|row| {
            row.id() != candidate.id() && row.is_active() && row.unique_key().as_ref() == Some(&key)
        })
}

impl<L: Label> LabelStore<L> for MemoryLabelStore<L> {
    fn create(&self, label: L) -> CoreResult<L> {
        let mut rows = self.rows.lock().map_err(lock_poisoned)?;
        if rows.iter().any(|row| row.id() == label.id()) {
            return Err(CoreError::Conflict(format!(
                "{} {} already exists",
                L::KIND.as_str(),
                label.id()
            )));
        }
        if key_taken(rows.as_slice(), &label) {
            return Err(CoreError::Conflict(format!(
                "an active {} with key {} already exists",
                L::KIND.as_str(),
                label.unique_key().unwrap_or_default()
            )));
        }
        rows.push(label.clone());
        Ok(label)
    }

    fn list(&self) -> CoreResult<Vec<L>> {
        Ok(self.rows.lock().map_err(lock_poisoned)?.clone())
    }

    fn update(&self, label: &L) -> CoreResult<()> {
        let mut rows = self.rows.lock().map_err(lock_poisoned)?;
        if key_taken(rows.as_slice(), label) {
            return Err(CoreError::Conflict(format!(
                "an active {} with key {} already exists",
                L::KIND.as_str(),
                label.unique_key().unwrap_or_default()
            )));
        }
        let row = rows
            .iter_mut()
            .find(|row| row.id() == label.id())
            .ok_or_else(|| CoreError::not_found(L::KIND.as_str(), label.id()))?;
        *row = label.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::templates;
    use crate::models::SeverityLabel;
    use chrono::Utc;
    use muac_types::SeverityCode;

    #[test]
    fn test_label_create_rejects_second_active_row_for_code() {
        let store = MemoryLabelStore::<SeverityLabel>::new();
        store
            .create(templates::severity_label(SeverityCode::Green).unwrap())
            .expect("first create should succeed");

        let err = store
            .create(templates::severity_label(SeverityCode::Green).unwrap())
            .expect_err("duplicate code should conflict");

        assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_label_create_allows_code_when_existing_row_inactive() {
        let store = MemoryLabelStore::<SeverityLabel>::new();
        let mut retired = templates::severity_label(SeverityCode::Green).unwrap();
        retired.active = false;
        store.create(retired).unwrap();

        store
            .create(templates::severity_label(SeverityCode::Green).unwrap())
            .expect("inactive rows do not hold the key");

        assert_eq!(store.find_by_code(SeverityCode::Green).unwrap().len(), 1);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_update_labels_repoints_references() {
        let store = MemoryStore::new();
        let measurement = Measurement {
            id: RecordId::new(),
            value: 12.0,
            note: String::new(),
            patient_id: RecordId::new(),
            operator_id: RecordId::new(),
            severity_label_id: None,
            recommendation_id: None,
            created_at: Utc::now(),
        };
        store.create(measurement.clone()).unwrap();

        let tag = RecordId::new();
        let updated = store
            .update_labels(measurement.id, Some(tag), None)
            .expect("update should succeed");

        assert_eq!(updated.severity_label_id, Some(tag));
        assert_eq!(store.get(measurement.id).unwrap().unwrap().severity_label_id, Some(tag));
        assert!(matches!(
            store.update_labels(RecordId::new(), None, None),
            Err(CoreError::NotFound { .. })
        ));
    }
}
