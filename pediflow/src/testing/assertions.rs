//! Assertions for task results and recorded events.

use super::RecordingEventSink;
use crate::core::TaskResult;
use crate::errors::TaskErrorKind;

/// Asserts that the result succeeded.
pub fn assert_task_succeeded(result: &TaskResult) {
    assert!(
        result.success,
        "Expected task '{}' to succeed, got error: {:?}",
        result.task_id,
        result.error_message()
    );
}

/// Asserts that the result failed with `kind`.
pub fn assert_task_failed_with(result: &TaskResult, kind: TaskErrorKind) {
    assert!(
        !result.success,
        "Expected task '{}' to fail with {kind:?}, but it succeeded",
        result.task_id
    );
    assert_eq!(
        result.error.as_ref().map(|e| e.kind),
        Some(kind),
        "Task '{}' failed with the wrong kind",
        result.task_id
    );
}

/// Asserts that `name` was emitted at least once.
pub fn assert_event_emitted(sink: &RecordingEventSink, name: &str) {
    assert!(
        sink.count(name) > 0,
        "Expected event '{name}', recorded: {:?}",
        sink.names()
    );
}

/// Asserts that two floats are within 1e-9 of each other.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "Expected {expected}, got {actual}"
    );
}
