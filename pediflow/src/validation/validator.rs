//! The medical value validator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{default_rules, Severity, ValidationRule};

/// Multiplicative confidence discount applied per violation.
pub const VIOLATION_DISCOUNT: f64 = 0.8;

/// Confidence below which a measurement recheck is recommended.
pub const RECHECK_THRESHOLD: f64 = 0.8;

/// Recommendation when critical alerts are present.
pub const RECOMMEND_ESCALATE: &str = "Consult a pediatrician immediately";
/// Recommendation when errors are present.
pub const RECOMMEND_VERIFY: &str = "Verify the data with a medical professional";
/// Recommendation when warnings are present.
pub const RECOMMEND_MONITOR: &str = "Monitor these values in upcoming measurements";
/// Recommendation when confidence is low.
pub const RECOMMEND_RECHECK: &str = "Recheck measurement accuracy";

/// Verdict of applying the ruleset to a value mapping.
///
/// `recommendations` is always derived from the buckets and the confidence;
/// every mutation goes through [`ValidationResult::record`] or
/// [`ValidationResult::merge`], which keep it in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True when no rule was violated.
    pub is_valid: bool,
    /// Warning-severity messages.
    pub warnings: Vec<String>,
    /// Error-severity messages.
    pub errors: Vec<String>,
    /// Critical-severity messages.
    pub critical_alerts: Vec<String>,
    /// Starts at 1.0, multiplied by 0.8 per violation.
    pub confidence: f64,
    /// Derived advice.
    pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            critical_alerts: Vec::new(),
            confidence: 1.0,
            recommendations: Vec::new(),
        }
    }
}

impl ValidationResult {
    /// A clean result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one violation.
    pub fn record(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Warning => self.warnings.push(message),
            Severity::Error => self.errors.push(message),
            Severity::Critical => self.critical_alerts.push(message),
        }
        self.is_valid = false;
        self.confidence *= VIOLATION_DISCOUNT;
        self.derive_recommendations();
    }

    /// Combines two verdicts: buckets concatenated, confidences multiplied.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid &= other.is_valid;
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
        self.critical_alerts.extend(other.critical_alerts);
        self.confidence *= other.confidence;
        self.derive_recommendations();
        self
    }

    /// Total number of recorded violations.
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.warnings.len() + self.errors.len() + self.critical_alerts.len()
    }

    fn derive_recommendations(&mut self) {
        let mut recs = Vec::new();
        if !self.critical_alerts.is_empty() {
            recs.push(RECOMMEND_ESCALATE.to_string());
        }
        if !self.errors.is_empty() {
            recs.push(RECOMMEND_VERIFY.to_string());
        }
        if !self.warnings.is_empty() {
            recs.push(RECOMMEND_MONITOR.to_string());
        }
        if self.confidence < RECHECK_THRESHOLD {
            recs.push(RECOMMEND_RECHECK.to_string());
        }
        self.recommendations = recs;
    }
}

/// Extracts a number from a bare number or a `{ "value": n }` object.
#[must_use]
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("value").and_then(Value::as_f64),
        _ => None,
    }
}

/// Table-driven checker of physiological values. Pure and stateless apart
/// from its immutable rule list.
#[derive(Debug, Clone)]
pub struct MedicalValidator {
    rules: Vec<ValidationRule>,
}

impl Default for MedicalValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl MedicalValidator {
    /// Creates a validator with the built-in ruleset.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Creates a validator with a custom ruleset.
    #[must_use]
    pub fn with_rules(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// The rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Validates a field mapping.
    ///
    /// Each rule whose field holds a numeric value records at most one
    /// violation: the absolute range first, then (for rules with an age
    /// table, when `age_months` is given) the percentile band. Missing and
    /// non-numeric values are skipped.
    #[must_use]
    pub fn validate(&self, values: &Map<String, Value>, age_months: Option<f64>) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in &self.rules {
            let Some(value) = values.get(&rule.field).and_then(numeric_value) else {
                continue;
            };

            if !rule.contains(value) {
                result.record(rule.severity, rule.message.clone());
                continue;
            }

            if let (Some(metric), Some(age)) = (rule.age_check, age_months) {
                let band = metric.band_for(age);
                if value < band.p3 {
                    result.record(
                        rule.severity,
                        format!("{metric} below the 3rd percentile for age ({age} months)"),
                    );
                } else if value > band.p97 {
                    result.record(
                        rule.severity,
                        format!("{metric} above the 97th percentile for age ({age} months)"),
                    );
                }
            }
        }

        result
    }

    /// Validates an arbitrary JSON value. Non-objects have no fields and
    /// therefore always pass.
    #[must_use]
    pub fn validate_value(&self, values: &Value, age_months: Option<f64>) -> ValidationResult {
        values
            .as_object()
            .map_or_else(ValidationResult::new, |map| self.validate(map, age_months))
    }
}
