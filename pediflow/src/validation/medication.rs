//! Format checks for medication entries.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{Severity, ValidationResult};

static DOSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(\.\d+)?\s*(mg|ml|mcg|g|kg|drops|puffs|units)$").ok()
});

static DURATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\s*(days|weeks|months|years)$").ok());

const STANDARD_FREQUENCIES: [&str; 11] = [
    "once daily",
    "twice daily",
    "three times daily",
    "four times daily",
    "every 4 hours",
    "every 6 hours",
    "every 8 hours",
    "every 12 hours",
    "as needed",
    "before meals",
    "after meals",
];

/// A medication entry as extracted from free text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    /// Drug name.
    #[serde(default)]
    pub name: String,
    /// Dose with unit, e.g. "5 ml".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    /// How often, e.g. "every 8 hours".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// How long, e.g. "5 days".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

fn matches(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text.trim()))
}

/// Checks dose, frequency and duration formats.
///
/// A present but empty or malformed dose is an error. An unrecognised
/// frequency or malformed duration is a warning. Absent fields are skipped.
#[must_use]
pub fn validate_medication(medication: &Medication) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Some(dose) = medication.dose.as_deref() {
        if dose.trim().is_empty() {
            result.record(Severity::Error, "Dose not specified");
        } else if !matches(&DOSE, dose) {
            result.record(Severity::Error, format!("Invalid dose format: '{dose}'"));
        }
    }

    if let Some(frequency) = medication.frequency.as_deref() {
        let lower = frequency.to_lowercase();
        if !STANDARD_FREQUENCIES.iter().any(|f| lower.contains(f)) {
            result.record(Severity::Warning, "Non-standard medication frequency");
        }
    }

    if let Some(duration) = medication.duration.as_deref() {
        if !matches(&DURATION, duration) {
            result.record(Severity::Warning, "Treatment duration not specified correctly");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn med(dose: &str, frequency: &str, duration: &str) -> Medication {
        Medication {
            name: "paracetamol".to_string(),
            dose: Some(dose.to_string()),
            frequency: Some(frequency.to_string()),
            duration: Some(duration.to_string()),
        }
    }

    #[test]
    fn test_well_formed_medication() {
        let result = validate_medication(&med("2.5 ml", "Every 8 hours as needed", "5 days"));
        assert!(result.is_valid);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bad_dose_is_error() {
        let result = validate_medication(&med("a spoonful", "twice daily", "3 DAYS"));
        assert_eq!(result.errors.len(), 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_dose_is_error() {
        let result = validate_medication(&med("  ", "once daily", "1 weeks"));
        assert_eq!(result.errors, vec!["Dose not specified".to_string()]);
    }

    #[test]
    fn test_frequency_and_duration_warnings() {
        let result = validate_medication(&med("10mg", "whenever", "a while"));
        assert_eq!(result.warnings.len(), 2);
        assert!((result.confidence - 0.64).abs() < 1e-12);
    }

    #[test]
    fn test_absent_fields_skipped() {
        let result = validate_medication(&Medication {
            name: "vitamin d".to_string(),
            ..Medication::default()
        });
        assert!(result.is_valid);
    }
}
