//! Static validation rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::GrowthMetric;

/// Which bucket a violated rule lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth monitoring.
    Warning,
    /// Likely a data or measurement error.
    Error,
    /// Needs professional attention now.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An absolute range check on one field, optionally refined by age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// Field name looked up in the value mapping.
    pub field: String,
    /// Inclusive lower bound.
    pub min_value: f64,
    /// Inclusive upper bound.
    pub max_value: f64,
    /// Unit of the bounds.
    pub unit: String,
    /// Bucket for violations.
    pub severity: Severity,
    /// Message recorded when the absolute range is violated.
    pub message: String,
    /// Provenance of the bounds.
    pub source: String,
    /// Growth table for the age-conditioned check, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_check: Option<GrowthMetric>,
}

impl ValidationRule {
    /// Creates a rule without an age check.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        min_value: f64,
        max_value: f64,
        unit: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let field = field.into();
        let unit = unit.into();
        let message = format!("{field} outside the normal range ({min_value}-{max_value} {unit})");
        Self {
            field,
            min_value,
            max_value,
            unit,
            severity,
            message,
            source: String::new(),
            age_check: None,
        }
    }

    /// Sets the violation message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the provenance string.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Enables the age-conditioned percentile check.
    #[must_use]
    pub fn with_age_check(mut self, metric: GrowthMetric) -> Self {
        self.age_check = Some(metric);
        self
    }

    /// Returns true if `value` lies within `[min_value, max_value]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }
}

/// The built-in pediatric ruleset.
#[must_use]
pub fn default_rules() -> Vec<ValidationRule> {
    const WHO: &str = "WHO Growth Standards";
    const AAP: &str = "AAP Guidelines";

    vec![
        ValidationRule::new("weight", 0.5, 50.0, "kg", Severity::Error)
            .with_message("Weight outside the normal range for infants (0.5-50 kg)")
            .with_source(WHO)
            .with_age_check(GrowthMetric::Weight),
        ValidationRule::new("height", 30.0, 150.0, "cm", Severity::Error)
            .with_message("Height outside the normal range for infants (30-150 cm)")
            .with_source(WHO)
            .with_age_check(GrowthMetric::Height),
        ValidationRule::new("temperature", 35.0, 42.0, "°C", Severity::Critical)
            .with_message("Temperature outside the normal range (35-42 °C)")
            .with_source(AAP),
        ValidationRule::new("headCircumference", 25.0, 60.0, "cm", Severity::Warning)
            .with_message("Head circumference outside the normal range (25-60 cm)")
            .with_source(WHO),
        ValidationRule::new("heartRate", 60.0, 200.0, "bpm", Severity::Critical)
            .with_message("Heart rate outside the normal range (60-200 bpm)")
            .with_source(AAP),
        ValidationRule::new("bloodPressureSystolic", 50.0, 140.0, "mmHg", Severity::Critical)
            .with_message("Systolic blood pressure outside the normal range (50-140 mmHg)")
            .with_source(AAP),
    ]
}
