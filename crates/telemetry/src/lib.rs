//! Request statistics for AI Dog.
//!
//! [`BotStats`] keeps monotonic counters updated once per completed
//! inference attempt. Everything derived from them (success rate, average
//! latency, uptime) is computed when a [`StatsSnapshot`] is taken.

pub mod model;
pub mod stats;

pub use model::{StatsSnapshot, format_uptime};
pub use stats::BotStats;
