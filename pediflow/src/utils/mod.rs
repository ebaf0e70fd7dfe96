//! Utility functions for ids, timestamps, JSON envelopes and panic payloads.

mod ids;
mod json;
mod panic;
pub mod timestamps;

pub use ids::{generate_uuid, prefixed_id};
pub use json::{parse_json_block, strip_code_fences};
pub use panic::panic_message;
pub use timestamps::{duration_ms, iso_timestamp, now_utc, saturating_ms, Timestamp};
