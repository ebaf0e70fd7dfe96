//! Auxiliary data supplied alongside a run's input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional context for a run, e.g. `{ "patientAge": 12 }`.
///
/// Unknown keys are kept verbatim and forwarded to prompts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Patient age in months. Zero is a valid age.
    #[serde(
        default,
        rename = "patientAge",
        alias = "patientAgeMonths",
        skip_serializing_if = "Option::is_none"
    )]
    pub patient_age_months: Option<f64>,
    /// Everything else the caller supplied.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the patient age in months.
    #[must_use]
    pub fn with_patient_age(mut self, months: f64) -> Self {
        self.patient_age_months = Some(months);
        self
    }

    /// Adds an extra entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The context as a JSON value, for prompt rendering.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if let Some(age) = self.patient_age_months {
            map.insert("patientAge".to_string(), Value::from(age));
        }
        Value::Object(map)
    }
}
