//! Inference endpoint client for AI Dog.
//!
//! [`OllamaProvider`] implements both `aidog_core::InferenceBackend` (the
//! generate call) and `aidog_core::HealthProbe` (the root-path probe), so
//! one instance serves the request pipeline and the health monitor.

pub mod ollama;

pub use ollama::OllamaProvider;
