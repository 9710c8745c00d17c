//! Record identifiers.
//!
//! Every record handled by the core (measurements, labels, and the patient, operator, region
//! and location rows owned by the external directory) is identified by a UUID in canonical
//! form: **32 lowercase hexadecimal characters**, no hyphens. The nil UUID
//! (`00000000000000000000000000000000`) is the "zero" reference and means *missing*.
//!
//! The file store shards measurement files by the first four hex characters:
//! `parent_dir/<id[0..2]>/<id[2..4]>/<id>.yaml`.

use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Canonical record identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Allocates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The zero reference.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// Hyphenated or upper-case forms are rejected rather than normalised so that every
    /// surface (CLI, REST, file names) agrees on one spelling.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> CoreResult<Self> {
        if !Self::is_canonical(input) {
            return Err(CoreError::InvalidInput(format!(
                "identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| CoreError::InvalidInput(format!("invalid identifier '{input}': {e}")))
    }

    /// Returns true if `input` is exactly 32 lowercase hex characters.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>.<extension>`.
    pub fn sharded_file(&self, parent_dir: &Path, extension: &str) -> PathBuf {
        let canonical = self.to_string();
        parent_dir
            .join(&canonical[0..2])
            .join(&canonical[2..4])
            .join(format!("{canonical}.{extension}"))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = RecordId::new();
        assert!(RecordId::is_canonical(&id.to_string()));
        assert!(!id.is_nil());
    }

    #[test]
    fn test_parse_rejects_hyphenated_and_uppercase() {
        assert!(RecordId::parse("550e8400-e29b-41d4-a716-446655440000").is_err());
        assert!(RecordId::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(RecordId::parse("").is_err());
    }

    #[test]
    fn test_parse_accepts_nil_as_zero_reference() {
        let id = RecordId::parse("00000000000000000000000000000000").unwrap();
        assert!(id.is_nil());
        assert_eq!(id, RecordId::nil());
    }

    #[test]
    fn test_sharded_file_layout() {
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let path = id.sharded_file(Path::new("/data/measurements"), "yaml");
        assert_eq!(
            path,
            PathBuf::from("/data/measurements/55/0e/550e8400e29b41d4a716446655440000.yaml")
        );
    }
}
