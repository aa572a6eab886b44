//! # AI Dog request governance
//!
//! The core every chat message passes through:
//!
//! - [`RateLimiter`]: per-identity sliding-window admission control
//! - [`Persona`]: prompt template, input sanitizing, reply cleanup
//! - [`InferenceClient`]: prompt dispatch with fallback mapping
//! - [`RequestPipeline`]: ties them to the conversation store and statistics
//!
//! Conversation storage lives in `aidog-memory`, statistics in
//! `aidog-telemetry`.

pub mod client;
pub mod persona;
pub mod pipeline;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use client::{InferenceClient, InferenceResult, InferenceSettings};
pub use persona::{Persona, PersonaError, sanitize_input};
pub use pipeline::{Admitted, Governance, Outcome, RequestPipeline, SetupError, truncate_reply};
pub use rate_limit::{Admission, RateLimiter};
