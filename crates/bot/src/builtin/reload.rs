use crate::command::{Command, CommandContext};
use aidog_core::error::CommandError;
use async_trait::async_trait;

/// Longest change report sent back to chat, in characters.
pub const MAX_REPORT_CHARS: usize = 3500;

/// Re-reads the configuration and swaps the pipeline governance.
pub struct ReloadConfigCommand;

#[async_trait]
impl Command for ReloadConfigCommand {
    fn name(&self) -> &str {
        "reloadcfg"
    }

    fn description(&self) -> &str {
        "Reloads the configuration"
    }

    fn admin_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &CommandContext, _args: &str) -> Result<String, CommandError> {
        let changes = match ctx.state.reload().await {
            Ok(changes) => changes,
            Err(CommandError::ExecutionFailed { reason, .. }) => {
                return Ok(format!(
                    "Reload failed, the running configuration is unchanged.\n```\n{reason}\n```"
                ));
            }
            Err(e) => return Err(e),
        };

        if changes.is_empty() {
            return Ok("Configuration reloaded: no changes.".to_string());
        }
        Ok(format!(
            "Configuration reloaded.\n```\n{}\n```",
            cap_report(&changes.join("\n"), MAX_REPORT_CHARS)
        ))
    }
}

fn cap_report(report: &str, max_chars: usize) -> String {
    match report.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n…", &report[..idx]),
        None => report.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;
    use crate::state::BotState;
    use crate::testing::{FixedBackend, pipeline, test_config};
    use aidog_core::message::Identity;
    use std::sync::Arc;

    fn write_config(path: &std::path::Path, rate_limit: usize) {
        std::fs::write(
            path,
            format!(
                r#"
admin_user_ids = [1]

[ollama]
model = "llama3"
api_url = "http://127.0.0.1:11434/api/generate"

[conversation]
backend = "memory"

[limits]
rate_limit_per_user = {rate_limit}
"#
            ),
        )
        .unwrap();
    }

    fn context(path: &std::path::Path) -> CommandContext {
        let mut config = test_config();
        config.admin_user_ids = vec![1];
        let pipeline = pipeline(&config, FixedBackend::new("woof"));
        CommandContext {
            state: Arc::new(BotState::new(config, path, pipeline).with_env(Arc::new(|_| None))),
            invoker: Identity(1),
            catalog: CommandRegistry::new().catalog(),
        }
    }

    #[tokio::test]
    async fn reports_changed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aidog.toml");
        write_config(&path, 9);
        let ctx = context(&path);

        let text = ReloadConfigCommand.execute(&ctx, "").await.unwrap();
        assert!(text.contains("limits.rate_limit_per_user: 5 -> 9"), "{text}");
        assert_eq!(ctx.state.config().limits.rate_limit_per_user, 9);

        let again = ReloadConfigCommand.execute(&ctx, "").await.unwrap();
        assert_eq!(again, "Configuration reloaded: no changes.");
    }

    #[tokio::test]
    async fn invalid_file_keeps_running_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aidog.toml");
        write_config(&path, 0);
        let ctx = context(&path);

        let text = ReloadConfigCommand.execute(&ctx, "").await.unwrap();
        assert!(text.starts_with("Reload failed"));
        assert_eq!(ctx.state.config().limits.rate_limit_per_user, 5);
    }

    #[test]
    fn long_reports_are_capped() {
        let report = "x".repeat(5000);
        let capped = cap_report(&report, MAX_REPORT_CHARS);
        assert_eq!(capped.chars().count(), MAX_REPORT_CHARS + 2);
        assert_eq!(cap_report("short", MAX_REPORT_CHARS), "short");
    }
}
