//! # MUAC Core
//!
//! Core business logic for MUAC nutrition surveillance.
//!
//! This crate contains the classification engine and the reports built on it:
//! - Threshold classification of arm-circumference measurements ([`classifier`])
//! - Race-tolerant get-or-create of severity labels and recommendations ([`labels`])
//! - Recording and reclassifying measurements ([`measurements`])
//! - Risk reports keyed off each patient's latest measurement ([`reports`])
//! - Nearby-location search ([`proximity`])
//! - Storage traits with in-memory and YAML file implementations ([`store`])
//!
//! **No API concerns**: HTTP servers, DTOs and CLI parsing belong in `api-rest`, `api-shared`
//! and `muac-cli`.

pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod id;
pub mod labels;
pub mod measurements;
pub mod models;
pub mod proximity;
pub mod reports;
pub mod store;

pub use classifier::{classify, is_valid_value, Classification};
pub use config::{data_dir_from_env_value, thresholds_from_env_values, CoreConfig, Thresholds};
pub use error::{CoreError, CoreResult};
pub use id::RecordId;
pub use labels::migration::{run_label_migration, MigrationReport};
pub use measurements::{ClassifiedMeasurement, CreatedLabels, MeasurementService};
pub use models::{
    Location, Measurement, NewMeasurement, Operator, Patient, Recommendation, Region,
    SeverityLabel,
};
pub use proximity::{find_nearby, NearbyLocation, ProximityService};
pub use reports::{percentage, ReportFilters, ReportService};
pub use store::Stores;

pub use muac_types::{NonEmptyText, Priority, SeverityCode, TypeError};
