use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SLACK_MESSAGE_TOPIC: &str = "slack-message";
pub const SLACK_QUEUE_GROUP: &str = "slack-queue";
pub const TOPIC_ATTRIBUTE: &str = "topic";

/// One unit of queued work: the JSON text of a Slack body plus routing data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub body: String,
    pub group_id: String,
    pub attributes: BTreeMap<String, String>,
    pub published_at: DateTime<Utc>,
}

impl QueuedMessage {
    /// Builds a message on the bot's single ordered lane.
    pub fn slack(body: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(TOPIC_ATTRIBUTE.to_owned(), SLACK_MESSAGE_TOPIC.to_owned());

        Self {
            id: Uuid::new_v4(),
            body: body.into(),
            group_id: SLACK_QUEUE_GROUP.to_owned(),
            attributes,
            published_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.attributes.get(TOPIC_ATTRIBUTE).map(String::as_str)
    }
}
