//! Shared value types for the MUAC workspace.
//!
//! These types carry no storage or API concerns. They are shared by `muac-core`, the API
//! crates and the CLI so that severity codes and validated text mean the same thing everywhere.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input did not name a known severity code
    #[error("unknown severity code: '{0}'")]
    UnknownSeverityCode(String),
}

// ============================================================================
// SEVERITY
// ============================================================================

/// Clinical severity of a single arm-circumference measurement.
///
/// The wire form is the upper-case colour name (`GREEN`, `YELLOW`, `RED`), which is also the
/// value persisted on label rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityCode {
    Green,
    Yellow,
    Red,
}

impl SeverityCode {
    /// All codes, ordered from best to worst.
    pub const ALL: [SeverityCode; 3] = [SeverityCode::Green, SeverityCode::Yellow, SeverityCode::Red];

    /// Returns the canonical upper-case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityCode::Green => "GREEN",
            SeverityCode::Yellow => "YELLOW",
            SeverityCode::Red => "RED",
        }
    }

    /// Returns the clinical category name used in reports.
    pub fn category(&self) -> &'static str {
        match self {
            SeverityCode::Green => "normal",
            SeverityCode::Yellow => "moderate",
            SeverityCode::Red => "severe",
        }
    }

    /// Display colour for this code.
    pub fn color_hex(&self) -> &'static str {
        match self {
            SeverityCode::Green => "#4CAF50",
            SeverityCode::Yellow => "#FFC107",
            SeverityCode::Red => "#F44336",
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            SeverityCode::Green => Priority::Normal,
            SeverityCode::Yellow => Priority::Attention,
            SeverityCode::Red => Priority::Urgent,
        }
    }

    /// True for moderate and severe codes.
    pub fn is_at_risk(&self) -> bool {
        !matches!(self, SeverityCode::Green)
    }
}

impl fmt::Display for SeverityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityCode {
    type Err = TypeError;

    /// Accepts the colour code or the category name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" | "normal" => Ok(SeverityCode::Green),
            "yellow" | "moderate" => Ok(SeverityCode::Yellow),
            "red" | "severe" => Ok(SeverityCode::Red),
            _ => Err(TypeError::UnknownSeverityCode(s.to_string())),
        }
    }
}

/// Follow-up priority attached to a severity code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Attention,
    Normal,
}

impl Priority {
    /// Sort rank; lower ranks are handled first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Urgent => 1,
            Priority::Attention => 2,
            Priority::Normal => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Attention => "attention",
            Priority::Normal => "normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TEXT
// ============================================================================

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_code_parses_codes_and_categories() {
        assert_eq!("GREEN".parse::<SeverityCode>(), Ok(SeverityCode::Green));
        assert_eq!("moderate".parse::<SeverityCode>(), Ok(SeverityCode::Yellow));
        assert_eq!(" Red ".parse::<SeverityCode>(), Ok(SeverityCode::Red));
        assert_eq!(
            "purple".parse::<SeverityCode>(),
            Err(TypeError::UnknownSeverityCode("purple".into()))
        );
    }

    #[test]
    fn test_severity_code_serializes_upper_case() {
        let json = serde_json::to_string(&SeverityCode::Yellow).unwrap();
        assert_eq!(json, "\"YELLOW\"");
        let back: SeverityCode = serde_json::from_str("\"RED\"").unwrap();
        assert_eq!(back, SeverityCode::Red);
    }

    #[test]
    fn test_priority_follows_severity() {
        assert_eq!(SeverityCode::Red.priority(), Priority::Urgent);
        assert_eq!(SeverityCode::Yellow.priority(), Priority::Attention);
        assert_eq!(SeverityCode::Green.priority(), Priority::Normal);
        assert!(Priority::Urgent.rank() < Priority::Normal.rank());
        assert!(!SeverityCode::Green.is_at_risk());
        assert!(SeverityCode::Yellow.is_at_risk());
    }

    #[test]
    fn test_non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Tag  ").unwrap().as_str(), "Tag");
        assert_eq!(NonEmptyText::new("   "), Err(TypeError::Empty));
    }

    #[test]
    fn test_non_empty_text_deserialize_rejects_empty() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
