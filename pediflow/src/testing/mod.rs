//! Testing utilities for pediflow.
//!
//! Compiled for this crate's tests and behind the `testing` feature.
//!
//! This module provides:
//! - A scripted completion gateway and a recording event sink
//! - Canned completion replies
//! - Assertions for task results and events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_close, assert_event_emitted, assert_task_failed_with, assert_task_succeeded,
};
pub use fixtures::{
    conversation_gateway, pipeline_gateway, ANALYSIS_JSON, CLASSIFICATION_JSON,
    CRITICAL_ANALYSIS_JSON, EXTRACTION_JSON, RECOMMENDATION_JSON, SAFETY_JSON, SYNTHESIS_JSON,
};
pub use mocks::{RecordingEventSink, ScriptedGateway};
