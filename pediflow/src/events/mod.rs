//! Lifecycle events.
//!
//! The coordinator and the conversation system report progress through an
//! injected [`EventSink`]. Event names are stable strings, listed below.

mod sink;

pub use sink::{EventSink, LoggingEventSink, NoOpEventSink};

/// A pipeline run started.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A pipeline run finished processing every task.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// A pipeline run failed before finishing.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// A fallback strategy was applied to a failed run.
pub const PIPELINE_FALLBACK: &str = "pipeline.fallback";
/// A task attempt is about to start.
pub const TASK_STARTED: &str = "task.started";
/// A task succeeded.
pub const TASK_COMPLETED: &str = "task.completed";
/// A task failed.
pub const TASK_FAILED: &str = "task.failed";
/// A failed task is about to be retried.
pub const TASK_RETRYING: &str = "task.retrying";
/// A task failed on every allowed attempt.
pub const TASK_RETRY_EXHAUSTED: &str = "task.retry_exhausted";
/// A task was not run because a dependency failed.
pub const TASK_DEPENDENCIES_UNMET: &str = "task.dependencies_unmet";
/// A conversation session started.
pub const SESSION_STARTED: &str = "session.started";
/// A conversation session entered a new phase.
pub const SESSION_PHASE: &str = "session.phase";
/// A conversation session completed.
pub const SESSION_COMPLETED: &str = "session.completed";
/// A conversation session ended in error.
pub const SESSION_ERROR: &str = "session.error";
