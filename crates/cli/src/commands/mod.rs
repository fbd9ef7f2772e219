pub mod config;
pub mod remind;
pub mod sign;

use serde::Serialize;
use serde_json::Value;

/// Exit codes shared by every command.
pub mod exit {
    pub const CONFIG: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const CLIENT: u8 = 4;
    pub const SLACK: u8 = 5;
    pub const USAGE: u8 = 64;
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_detail(command, message, None)
    }

    pub fn success_with_detail(
        command: &str,
        message: impl Into<String>,
        detail: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            detail,
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
            detail: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        serde_json::json!({
            "command": payload.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
