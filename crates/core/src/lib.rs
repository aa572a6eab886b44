//! # AI Dog Core
//!
//! Domain types, traits, and error definitions for the AI Dog chat bot.
//! This crate has **no framework dependencies**; it defines the domain model
//! that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external seam is a trait here: the inference endpoint
//! ([`InferenceBackend`]), its health probe ([`HealthProbe`]), the
//! conversation persistence layer ([`HistoryBackend`]) and the chat platform
//! ([`Channel`]). Implementations live in their respective crates, which
//! keeps the request-governance core testable with in-process stubs.

pub mod channel;
pub mod error;
pub mod health;
pub mod history;
pub mod inference;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelMessage};
pub use error::{ChannelError, CommandError, HistoryError, ProviderError};
pub use health::{HealthHandle, HealthProbe, HealthStatus, ProbeOutcome};
pub use history::HistoryBackend;
pub use inference::{GenerateRequest, GenerateResponse, InferenceBackend, SamplingOptions};
pub use message::{ConversationTurn, Identity, Role};
