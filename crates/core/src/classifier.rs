//! Threshold classification of arm-circumference measurements.
//!
//! Classification is a pure function of the value and a [`Thresholds`] set. Bounds are checked
//! from the highest down, so a value sitting exactly on a cut-off lands in the better category:
//! `12.5` is normal and `11.5` is moderate under the official thresholds.

use crate::config::Thresholds;
use muac_types::{Priority, SeverityCode};

/// Outcome of classifying one measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Classification {
    pub code: SeverityCode,
    pub color_hex: &'static str,
    pub priority: Priority,
}

impl Classification {
    /// The classification a stored label code stands for.
    pub fn for_code(code: SeverityCode) -> Self {
        Self {
            code,
            color_hex: code.color_hex(),
            priority: code.priority(),
        }
    }

    pub fn priority_rank(&self) -> u8 {
        self.priority.rank()
    }
}

impl Thresholds {
    /// Maps a value to its severity. Callers must gate on [`Thresholds::is_valid_value`].
    pub fn classify(&self, value: f64) -> Classification {
        let code = if value >= self.normal() {
            SeverityCode::Green
        } else if value >= self.severe() {
            SeverityCode::Yellow
        } else {
            SeverityCode::Red
        };
        Classification::for_code(code)
    }

    /// True iff `0 < value <= max_value`. NaN is never valid.
    pub fn is_valid_value(&self, value: f64) -> bool {
        value > 0.0 && value <= self.max_value()
    }
}

/// Classifies `value` under the official thresholds.
pub fn classify(value: f64) -> Classification {
    Thresholds::OFFICIAL.classify(value)
}

/// Validity gate under the official thresholds.
pub fn is_valid_value(value: f64) -> bool {
    Thresholds::OFFICIAL.is_valid_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_resolve_to_better_category() {
        assert_eq!(classify(12.5).code, SeverityCode::Green);
        assert_eq!(classify(12.499).code, SeverityCode::Yellow);
        assert_eq!(classify(11.5).code, SeverityCode::Yellow);
        assert_eq!(classify(11.499).code, SeverityCode::Red);
    }

    #[test]
    fn test_classification_carries_color_and_priority() {
        let severe = classify(9.8);
        assert_eq!(severe.code, SeverityCode::Red);
        assert_eq!(severe.priority, Priority::Urgent);
        assert_eq!(severe.color_hex, "#F44336");

        let normal = classify(13.0);
        assert_eq!(normal.priority, Priority::Normal);
        assert_eq!(normal.priority_rank(), 3);
    }

    #[test]
    fn test_severity_never_improves_as_value_decreases() {
        let mut previous = classify(50.0).code;
        let mut value = 50.0;
        while value > 0.0 {
            let current = classify(value).code;
            assert!(current >= previous, "severity improved at {value}");
            previous = current;
            value -= 0.05;
        }
    }

    #[test]
    fn test_is_valid_value_range() {
        assert!(!is_valid_value(0.0));
        assert!(!is_valid_value(-1.0));
        assert!(!is_valid_value(50.01));
        assert!(!is_valid_value(f64::NAN));
        assert!(is_valid_value(0.01));
        assert!(is_valid_value(50.0));
    }

    #[test]
    fn test_custom_thresholds_are_honoured() {
        let thresholds = Thresholds::new(11.0, 12.0, 30.0).unwrap();
        assert_eq!(thresholds.classify(12.2).code, SeverityCode::Green);
        assert_eq!(thresholds.classify(11.2).code, SeverityCode::Yellow);
        assert!(!thresholds.is_valid_value(31.0));
    }
}
