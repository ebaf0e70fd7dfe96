//! Multi-agent conversation sessions.
//!
//! The same orchestration problem as the pipeline, framed as a team of
//! agents exchanging messages over four phases. See [`ConversationSystem`].

mod message;
mod participants;
mod payloads;
mod session;
mod system;


pub use message::{ConversationMessage, MessageType};
pub use participants::{
    default_participants, Participant, CLASSIFIER, DATA_EXTRACTOR, EMERGENCY_ADVISOR,
    MEDICAL_ANALYZER, SAFETY_VALIDATOR, SYNTHESIZER, SYSTEM,
};
pub use payloads::{
    critical_measurements, CriticalMeasurement, ExtractedMeasurement, ExtractionPayload,
    FinalResult, SafetyReviewPayload, SafetyStatus, SynthesisPayload,
};
pub use session::{Session, SessionStatus, SessionStore};
pub use system::{AgentError, ConversationSystem, DEFAULT_AGENT_TIMEOUT_MS, DEFAULT_TOPIC};
