use std::time::Duration;

use beacon_core::config::{AppConfig, LoadOptions};
use beacon_modules::send_reminder;
use beacon_slack::HttpSlackClient;
use chrono::NaiveDate;

use crate::commands::{exit, CommandResult};

pub fn run(channel: Option<String>, date: Option<NaiveDate>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "remind",
                "config_validation",
                format!("configuration issue: {error}"),
                exit::CONFIG,
            );
        }
    };
    let channel = resolve_channel(channel, &config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "remind",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                exit::RUNTIME,
            );
        }
    };

    let slack = match HttpSlackClient::with_api_base(
        config.slack.bot_token.clone(),
        config.slack.api_base_url.as_str(),
        Duration::from_secs(config.server.request_timeout_secs),
    ) {
        Ok(slack) => slack,
        Err(error) => {
            return CommandResult::failure("remind", "slack_client", error.to_string(), exit::CLIENT);
        }
    };

    match runtime.block_on(send_reminder(&slack, &channel, date)) {
        Ok(date) => CommandResult::success(
            "remind",
            format!("posted in-person reminder for {} to #{channel}", date.format("%-m/%-d")),
        ),
        Err(error) => CommandResult::failure("remind", "slack_api", error.to_string(), exit::SLACK),
    }
}

fn resolve_channel(channel: Option<String>, config: &AppConfig) -> String {
    channel
        .map(|channel| channel.trim().trim_start_matches('#').to_string())
        .filter(|channel| !channel.is_empty())
        .unwrap_or_else(|| config.slack.checkins_channel.clone())
}

#[cfg(test)]
mod tests {
    use beacon_core::config::AppConfig;

    use super::resolve_channel;

    #[test]
    fn explicit_channel_wins_over_config() {
        let mut config = AppConfig::default();
        config.slack.checkins_channel = "hack-night".to_string();

        assert_eq!(resolve_channel(Some("#general".to_string()), &config), "general");
        assert_eq!(resolve_channel(Some("  ".to_string()), &config), "hack-night");
        assert_eq!(resolve_channel(None, &config), "hack-night");
        assert_eq!(resolve_channel(None, &AppConfig::default()), "beacon-test");
    }
}
