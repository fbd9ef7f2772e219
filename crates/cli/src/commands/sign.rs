use beacon_core::config::{AppConfig, LoadOptions};
use beacon_core::signature::{signature_header, unix_now, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use crate::commands::{exit, CommandResult};

/// Signs `body` the way Slack does, for replaying requests against a local
/// server. Without `--secret` the configured signing secret is used.
pub fn run(body: &str, timestamp: Option<i64>, secret: Option<String>) -> CommandResult {
    let secret = match secret.filter(|secret| !secret.trim().is_empty()) {
        Some(secret) => secret,
        None => match configured_secret() {
            Ok(secret) => secret,
            Err(result) => return result,
        },
    };

    let timestamp = timestamp.unwrap_or_else(unix_now);
    CommandResult::success_with_detail(
        "sign",
        format!("signed {} byte body", body.len()),
        Some(signed_headers(body, timestamp, &secret)),
    )
}

fn configured_secret() -> Result<String, CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            "sign",
            "config_validation",
            format!("configuration issue: {error}"),
            exit::CONFIG,
        )
    })?;

    config
        .slack
        .signing_secret
        .as_ref()
        .map(|secret| secret.expose_secret().to_string())
        .filter(|secret| !secret.trim().is_empty())
        .ok_or_else(|| {
            CommandResult::failure(
                "sign",
                "missing_secret",
                "no --secret given and slack.signing_secret is not configured",
                exit::USAGE,
            )
        })
}

pub fn signed_headers(body: &str, timestamp: i64, secret: &str) -> Value {
    let timestamp = timestamp.to_string();
    let signature = signature_header(&timestamp, body.as_bytes(), secret);
    let mut headers = Map::new();
    headers.insert(TIMESTAMP_HEADER.to_string(), Value::String(timestamp));
    headers.insert(SIGNATURE_HEADER.to_string(), Value::String(signature));
    Value::Object(headers)
}
