//! Built-in commands.

pub mod clear;
pub mod help;
pub mod reload;
pub mod stats;
pub mod weather;

use crate::command::CommandRegistry;
use std::sync::Arc;

pub use clear::ClearCommand;
pub use help::HelpCommand;
pub use reload::ReloadConfigCommand;
pub use stats::StatsCommand;
pub use weather::WeatherCommand;

/// A registry holding every built-in command.
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(HelpCommand));
    registry.register(Arc::new(StatsCommand));
    registry.register(Arc::new(ClearCommand));
    registry.register(Arc::new(ReloadConfigCommand));
    registry.register(Arc::new(WeatherCommand::new()));
    registry
}
