//! YAML file store.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   measurements/
//!     <s1>/<s2>/<id>.yaml          # one file per measurement
//!   labels/
//!     severity/
//!       key_<unique key>.yaml      # active rows that carry a severity code
//!       id_<id>.yaml               # legacy rows without a code, and retired rows
//!     recommendations/
//!       ...                        # same scheme
//!   directory/
//!     patients.yaml                # projections exported by the CRUD layer
//!     operators.yaml
//!     regions.yaml
//!     locations.yaml
//! ```
//!
//! New files are written to a temporary name and then hard-linked into place. The link fails
//! if the target exists, so publishing a file is an atomic create-if-absent. Naming active label
//! rows after their unique key turns that into the uniqueness constraint the label resolver
//! relies on: two processes creating the same label race on one file name and one of them gets
//! [`CoreError::Conflict`].

use super::{Directory, LabelStore, LocationStore, MeasurementStore};
use crate::constants::{
    DIRECTORY_DIR_NAME, LABELS_DIR_NAME, LOCATIONS_FILENAME, MEASUREMENTS_DIR_NAME,
    OPERATORS_FILENAME, PATIENTS_FILENAME, REGIONS_FILENAME,
};
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::labels::Label;
use crate::models::{Location, Measurement, Operator, Patient, Region};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

// ============================================================================
// FILE HELPERS
// ============================================================================

fn read_yaml<T: DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let contents = fs::read_to_string(path).map_err(CoreError::FileRead)?;
    serde_yaml::from_str(&contents).map_err(CoreError::YamlDeserialization)
}

fn to_yaml<T: Serialize>(value: &T) -> CoreResult<String> {
    serde_yaml::to_string(value).map_err(CoreError::YamlSerialization)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    path.with_file_name(format!(".{name}.{}.tmp", RecordId::new()))
}

/// Replaces `path` with `contents`.
fn write_atomic(path: &Path, contents: &str) -> CoreResult<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, contents).map_err(CoreError::FileWrite)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CoreError::FileWrite(e)
    })
}

/// Creates `path` with `contents` unless it already exists.
///
/// Returns `Ok(false)` if another writer got there first.
fn publish_new(path: &Path, contents: &str) -> CoreResult<bool> {
    let tmp = temp_path(path);
    fs::write(&tmp, contents).map_err(CoreError::FileWrite)?;
    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(CoreError::FileWrite(e)),
    }
}

fn yaml_files(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(CoreError::FileRead(e)),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ============================================================================
// MEASUREMENTS AND DIRECTORY
// ============================================================================

/// Measurements and directory projections stored under one data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and if needed creates) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageDirCreation`] if the directory tree cannot be created.
    pub fn open(root: &Path) -> CoreResult<Self> {
        for dir in [
            root.to_path_buf(),
            root.join(MEASUREMENTS_DIR_NAME),
            root.join(DIRECTORY_DIR_NAME),
        ] {
            fs::create_dir_all(&dir).map_err(CoreError::StorageDirCreation)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn measurements_dir(&self) -> PathBuf {
        self.root.join(MEASUREMENTS_DIR_NAME)
    }

    fn directory_file(&self, filename: &str) -> PathBuf {
        self.root.join(DIRECTORY_DIR_NAME).join(filename)
    }

    fn read_directory<T: DeserializeOwned>(&self, filename: &str) -> CoreResult<Vec<T>> {
        let path = self.directory_file(filename);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        read_yaml(&path)
    }

    fn upsert_directory<T>(&self, filename: &str, row: T, id: fn(&T) -> RecordId) -> CoreResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut rows: Vec<T> = self.read_directory(filename)?;
        match rows.iter().position(|existing| id(existing) == id(&row)) {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }
        write_atomic(&self.directory_file(filename), &to_yaml(&rows)?)
    }

    pub fn add_patient(&self, patient: Patient) -> CoreResult<()> {
        self.upsert_directory(PATIENTS_FILENAME, patient, |p| p.id)
    }

    pub fn add_operator(&self, operator: Operator) -> CoreResult<()> {
        self.upsert_directory(OPERATORS_FILENAME, operator, |o| o.id)
    }

    pub fn add_region(&self, region: Region) -> CoreResult<()> {
        self.upsert_directory(REGIONS_FILENAME, region, |r| r.id)
    }

    pub fn add_location(&self, location: Location) -> CoreResult<()> {
        self.upsert_directory(LOCATIONS_FILENAME, location, |l| l.id)
    }
}

impl MeasurementStore for FileStore {
    fn create(&self, measurement: Measurement) -> CoreResult<Measurement> {
        let path = measurement.id.sharded_file(&self.measurements_dir(), "yaml");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;
        }
        if !publish_new(&path, &to_yaml(&measurement)?)? {
            return Err(CoreError::Conflict(format!(
                "measurement {} already exists",
                measurement.id
            )));
        }
        Ok(measurement)
    }

    fn get(&self, id: RecordId) -> CoreResult<Option<Measurement>> {
        let path = id.sharded_file(&self.measurements_dir(), "yaml");
        if !path.is_file() {
            return Ok(None);
        }
        read_yaml(&path).map(Some)
    }

    /// Walks `measurements/<s1>/<s2>/`. Files that fail to parse are logged and skipped.
    fn list(&self) -> CoreResult<Vec<Measurement>> {
        let mut measurements = Vec::new();

        let s1_iter = match fs::read_dir(self.measurements_dir()) {
            Ok(it) => it,
            Err(_) => return Ok(measurements),
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                for path in yaml_files(&s2_path)? {
                    match read_yaml::<Measurement>(&path) {
                        Ok(measurement) => measurements.push(measurement),
                        Err(e) => {
                            tracing::warn!(
                                "failed to parse measurement: {} - {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        Ok(measurements)
    }

    fn update_labels(
        &self,
        id: RecordId,
        severity_label_id: Option<RecordId>,
        recommendation_id: Option<RecordId>,
    ) -> CoreResult<Measurement> {
        let mut measurement = self
            .get(id)?
            .ok_or_else(|| CoreError::not_found("measurement", id))?;
        measurement.severity_label_id = severity_label_id;
        measurement.recommendation_id = recommendation_id;
        let path = id.sharded_file(&self.measurements_dir(), "yaml");
        write_atomic(&path, &to_yaml(&measurement)?)?;
        Ok(measurement)
    }
}

impl Directory for FileStore {
    fn patients(&self) -> CoreResult<Vec<Patient>> {
        self.read_directory(PATIENTS_FILENAME)
    }

    fn operators(&self) -> CoreResult<Vec<Operator>> {
        self.read_directory(OPERATORS_FILENAME)
    }

    fn regions(&self) -> CoreResult<Vec<Region>> {
        self.read_directory(REGIONS_FILENAME)
    }
}

impl LocationStore for FileStore {
    fn list_locations(&self) -> CoreResult<Vec<Location>> {
        self.read_directory(LOCATIONS_FILENAME)
    }
}

// ============================================================================
// LABELS
// ============================================================================

/// One label kind stored as one YAML file per row.
#[derive(Debug)]
pub struct FileLabelStore<L> {
    dir: PathBuf,
    _label: PhantomData<fn() -> L>,
}

impl<L: Label> FileLabelStore<L> {
    /// Opens the label directory for `L` under `data_dir`.
    pub fn open(data_dir: &Path) -> CoreResult<Self> {
        let dir = data_dir.join(LABELS_DIR_NAME).join(L::KIND.dir_name());
        fs::create_dir_all(&dir).map_err(CoreError::StorageDirCreation)?;
        Ok(Self {
            dir,
            _label: PhantomData,
        })
    }

    /// Active keyed rows live at their key; everything else lives at its id.
    fn path_for(&self, label: &L) -> PathBuf {
        match label.unique_key().filter(|_| label.is_active()) {
            Some(key) => self.dir.join(format!("key_{}.yaml", sanitize(&key))),
            None => self.dir.join(format!("id_{}.yaml", label.id())),
        }
    }

    fn rows_with_paths(&self) -> CoreResult<Vec<(PathBuf, L)>> {
        let mut rows: Vec<(PathBuf, L)> = Vec::new();
        for path in yaml_files(&self.dir)? {
            match read_yaml::<L>(&path) {
                // A row being moved between names can briefly exist twice.
                Ok(label) if rows.iter().any(|(_, seen)| seen.id() == label.id()) => {}
                Ok(label) => rows.push((path, label)),
                Err(e) => {
                    tracing::warn!(
                        "failed to parse {}: {} - {}",
                        L::KIND.as_str(),
                        path.display(),
                        e
                    );
                }
            }
        }
        Ok(rows)
    }

    fn conflict(label: &L) -> CoreError {
        CoreError::Conflict(format!(
            "an active {} with key {} already exists",
            L::KIND.as_str(),
            label.unique_key().unwrap_or_default()
        ))
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl<L: Label> LabelStore<L> for FileLabelStore<L> {
    fn create(&self, label: L) -> CoreResult<L> {
        if self.rows_with_paths()?.iter().any(|(_, row)| row.id() == label.id()) {
            return Err(CoreError::Conflict(format!(
                "{} {} already exists",
                L::KIND.as_str(),
                label.id()
            )));
        }
        if !publish_new(&self.path_for(&label), &to_yaml(&label)?)? {
            return Err(Self::conflict(&label));
        }
        Ok(label)
    }

    fn list(&self) -> CoreResult<Vec<L>> {
        Ok(self
            .rows_with_paths()?
            .into_iter()
            .map(|(_, label)| label)
            .collect())
    }

    fn update(&self, label: &L) -> CoreResult<()> {
        let current = self
            .rows_with_paths()?
            .into_iter()
            .find(|(_, row)| row.id() == label.id())
            .map(|(path, _)| path)
            .ok_or_else(|| CoreError::not_found(L::KIND.as_str(), label.id()))?;
        let target = self.path_for(label);
        let contents = to_yaml(label)?;

        if target == current {
            return write_atomic(&target, &contents);
        }
        if label.is_active() && label.unique_key().is_some() {
            if !publish_new(&target, &contents)? {
                return Err(Self::conflict(label));
            }
        } else {
            write_atomic(&target, &contents)?;
        }
        fs::remove_file(&current).map_err(CoreError::FileWrite)
    }
}
