use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const BLOCK_ACTIONS_TYPE: &str = "block_actions";
pub const MEMBER_JOINED_CHANNEL_TYPE: &str = "member_joined_channel";

/// A slash command invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    #[serde(deserialize_with = "lenient_string")]
    pub command: String,
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(deserialize_with = "lenient_string")]
    pub response_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub trigger_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub team_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub channel_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub user_name: String,
}

/// One interactive element activation inside a block-actions payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockAction {
    pub action_id: String,
    pub block_id: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub action_type: String,
    pub action_ts: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionUser {
    pub id: String,
    pub username: String,
    pub team_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionTeam {
    pub id: String,
    pub domain: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionChannel {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockActionEvent {
    pub user: ActionUser,
    pub team: Option<ActionTeam>,
    pub channel: Option<ActionChannel>,
    pub trigger_id: String,
    pub response_url: String,
    pub actions: Vec<BlockAction>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberJoinedEvent {
    pub user: String,
    pub channel: String,
    pub channel_type: String,
    pub team: String,
    pub inviter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    MemberJoinedChannel(MemberJoinedEvent),
    Other { event_type: String },
}

/// Every inbound shape the relay understands.
///
/// Produced once by [`SlackMessage::classify`]; both the synchronous
/// acknowledgement and the queued dispatch read the same classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackMessage {
    Command(Command),
    BlockActions(BlockActionEvent),
    Event(SlackEvent),
    Unsupported { reason: String },
}

impl SlackMessage {
    pub fn classify(body: &Value) -> Self {
        let Some(fields) = body.as_object() else {
            return Self::unsupported("body is not an object");
        };

        if fields.get("command").is_some_and(is_truthy) {
            return match Command::deserialize(body) {
                Ok(command) => Self::Command(command),
                Err(error) => Self::unsupported(format!("malformed command: {error}")),
            };
        }

        if fields.get("type").and_then(Value::as_str) == Some(BLOCK_ACTIONS_TYPE) {
            return match BlockActionEvent::deserialize(body) {
                Ok(event) => Self::BlockActions(event),
                Err(error) => Self::unsupported(format!("malformed block actions: {error}")),
            };
        }

        if let Some(event) = fields.get("event").filter(|event| event.is_object()) {
            return Self::Event(classify_event(event));
        }

        Self::unsupported("neither a command, block actions nor an event callback")
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::BlockActions(_) => "block_actions",
            Self::Event(_) => "event",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported { reason: reason.into() }
    }
}

fn classify_event(event: &Value) -> SlackEvent {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
    if event_type == MEMBER_JOINED_CHANNEL_TYPE {
        if let Ok(joined) = MemberJoinedEvent::deserialize(event) {
            return SlackEvent::MemberJoinedChannel(joined);
        }
    }
    SlackEvent::Other { event_type: event_type.to_owned() }
}

/// Form fields are always strings; JSON senders sometimes send other scalars.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Loose presence test for body fields: `null`, `false` and `""` are absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}
