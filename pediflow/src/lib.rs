//! # Pediflow
//!
//! Multi-step LLM orchestration for pediatric health records.
//!
//! A parent's free-form text (or a structured record) goes through an ordered
//! set of tasks: classify it, extract medical data, validate the values
//! against pediatric reference ranges, and generate recommendations. The
//! result is one consolidated object a UI can render.
//!
//! - **Pipelines**: declarative task lists with dependencies, validated when
//!   they are defined, run by a [`PipelineCoordinator`](pipeline::PipelineCoordinator)
//!   with per-task retries and a whole-run fallback
//! - **Validation ruleset**: deterministic range and growth-percentile checks
//!   that never call a model
//! - **Gateway seam**: every model call goes through a
//!   [`CompletionGateway`](gateway::CompletionGateway), guarded by a shared
//!   rate limiter, quota flag and circuit breaker
//! - **Conversations**: the same problem framed as a four-phase exchange
//!   between specialist agents
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pediflow::prelude::*;
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(OpenAiGateway::new(&config.gateway)?);
//! let coordinator = PipelineCoordinator::new(TaskExecutor::new(gateway));
//!
//! let result = coordinator
//!     .process_input(json!("Weighed 7.8 kg today"), RunContext::new().with_patient_age(12.0))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod conversation;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod observability;
pub mod pipeline;
pub mod prompts;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PediflowConfig;
    pub use crate::conversation::{ConversationSystem, Session, SessionStatus};
    pub use crate::core::{
        RunContext, RunStatus, Task, TaskKind, TaskPayload, TaskPriority, TaskResult,
    };
    pub use crate::errors::{PediflowError, PipelineValidationError, TaskError, TaskErrorKind};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{StepInput, TaskExecutor};
    pub use crate::gateway::{
        ChatMessage, CircuitBreaker, CompletionGateway, GatewayError, GuardedGateway, RateLimiter,
    };
    #[cfg(feature = "openai")]
    pub use crate::gateway::OpenAiGateway;
    pub use crate::pipeline::{
        ConsolidatedResult, FallbackStrategy, PipelineBuilder, PipelineCoordinator,
        PipelineDefinition, PipelineRegistry, RetryPolicy,
    };
    pub use crate::validation::{MedicalValidator, ValidationResult};
}
