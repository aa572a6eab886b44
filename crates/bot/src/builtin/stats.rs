use crate::command::{Command, CommandContext};
use aidog_core::error::CommandError;
use async_trait::async_trait;

/// Reports model, inference server status and request statistics.
pub struct StatsCommand;

#[async_trait]
impl Command for StatsCommand {
    fn name(&self) -> &str {
        "stats"
    }

    fn description(&self) -> &str {
        "Shows AI Dog's statistics"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &str) -> Result<String, CommandError> {
        let pipeline = ctx.state.pipeline();
        let snapshot = pipeline.stats().snapshot();
        Ok(format!(
            "📊 **AI Dog stats**\n\
             Model: {model}\n\
             Inference server: {health}\n\
             Uptime: {uptime}\n\
             Requests: {total} ({succeeded} ok, {failed} failed)\n\
             Success rate: {rate}\n\
             Average response time: {latency}",
            model = pipeline.current().model(),
            health = pipeline.health().get(),
            uptime = snapshot.uptime_display(),
            total = snapshot.total,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            rate = snapshot.success_rate_display(),
            latency = snapshot.average_latency_display(),
        ))
    }
}
