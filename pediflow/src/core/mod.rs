//! Core domain model types for pediflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Task kind, priority and run status enums
//! - The task definition and its result record
//! - Typed payloads decoded from completion text
//! - Run context

mod context;
mod payload;
mod result;
mod status;
mod task;

pub use context::RunContext;
pub use payload::{
    AnalysisPayload, ClassificationPayload, RecommendationPayload, TaskPayload, ValidationPayload,
};
pub use result::{TaskResult, ERROR_AGENT};
pub use status::{RunStatus, TaskKind, TaskPriority};
pub use task::{Task, DEFAULT_TASK_TIMEOUT_MS};
