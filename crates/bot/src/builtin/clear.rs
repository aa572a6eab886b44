use crate::command::{Command, CommandContext};
use aidog_core::error::CommandError;
use async_trait::async_trait;

/// Forgets the invoker's conversation history.
pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn description(&self) -> &str {
        "Forgets our conversation so far"
    }

    async fn execute(&self, ctx: &CommandContext, _args: &str) -> Result<String, CommandError> {
        let removed = ctx
            .state
            .pipeline()
            .current()
            .store()
            .clear_history(ctx.invoker)
            .await;

        Ok(if removed == 0 {
            "There was nothing to forget, woof!".to_string()
        } else {
            format!("Done! I forgot {removed} messages from our conversation, woof!")
        })
    }
}
