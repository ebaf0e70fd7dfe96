//! Validation ruleset for pediatric measurements and medications.
//!
//! A table-driven, side-effect-free checker. The pipeline's validation step
//! and the conversation's deliberation phase both call into it directly
//! without touching the completion gateway.

mod medication;
mod percentiles;
mod rules;
mod validator;

pub use medication::{validate_medication, Medication};
pub use percentiles::{GrowthMetric, PercentileBand};
pub use rules::{default_rules, Severity, ValidationRule};
pub use validator::{
    numeric_value, MedicalValidator, ValidationResult, RECHECK_THRESHOLD, RECOMMEND_ESCALATE,
    RECOMMEND_MONITOR, RECOMMEND_RECHECK, RECOMMEND_VERIFY, VIOLATION_DISCOUNT,
};
