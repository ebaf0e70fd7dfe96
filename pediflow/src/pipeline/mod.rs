//! Pipeline definition, validation and execution.
//!
//! This module provides:
//! - Pipeline definitions and the validating builder
//! - The registry of named pipelines
//! - Per-task retry policy
//! - Run state, consolidation and fallback strategies
//! - The coordinator that ties them together

mod builder;
mod consolidate;
mod coordinator;
mod fallback;
mod registry;
mod retry;
mod run;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use consolidate::{consolidate, ConsolidatedData, ConsolidatedResult};
pub use coordinator::PipelineCoordinator;
pub use fallback::{RunFailure, SIMPLIFIED_CONFIDENCE};
pub use registry::{medical_analysis, PipelineRegistry, MEDICAL_ANALYSIS};
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
pub use run::PipelineRun;
pub use spec::{FallbackStrategy, PipelineDefinition};
