//! Feature modules: project listings, in-person check-in and the attendance
//! spreadsheet they write to.
//!
//! [`BeaconMessageHandler`] is what the queue consumer calls for every
//! classified message.

use std::sync::Arc;

use async_trait::async_trait;
use beacon_queue::MessageHandler;
use beacon_slack::{
    events::{SlackEvent, MEMBER_JOINED_CHANNEL_TYPE},
    registry::DispatchError,
    CommandRegistry, HandlerContext, SlackApi, SlackMessage,
};
use tracing::debug;

pub mod checkin;
pub mod projects;
pub mod sheets;

#[cfg(test)]
mod testing;

pub use checkin::{send_reminder, CheckIn};
pub use projects::{HttpProjectFeed, ProjectCache, ProjectsModule};
pub use sheets::{HttpSheetsClient, SheetsClient};

/// Registers every module's commands and block actions.
pub fn register_all(registry: &mut CommandRegistry, projects: &ProjectsModule, checkin: &CheckIn) {
    projects.register(registry);
    checkin.register(registry);
}

pub struct BeaconMessageHandler {
    registry: Arc<CommandRegistry>,
    projects: ProjectsModule,
    slack: Arc<dyn SlackApi>,
}

impl BeaconMessageHandler {
    pub fn new(
        registry: Arc<CommandRegistry>,
        projects: ProjectsModule,
        slack: Arc<dyn SlackApi>,
    ) -> Self {
        Self { registry, projects, slack }
    }
}

#[async_trait]
impl MessageHandler for BeaconMessageHandler {
    async fn handle_message(
        &self,
        message: &SlackMessage,
        correlation_id: &str,
    ) -> Result<(), DispatchError> {
        let ctx = HandlerContext::new(Arc::clone(&self.slack), correlation_id);
        match message {
            SlackMessage::Event(SlackEvent::MemberJoinedChannel(event)) => {
                self.projects.welcome_member(event, &ctx).await.map_err(|source| {
                    DispatchError::Event { event_type: MEMBER_JOINED_CHANNEL_TYPE.to_owned(), source }
                })
            }
            SlackMessage::Event(SlackEvent::Other { event_type }) => {
                debug!(
                    event_name = "modules.event.ignored",
                    event_type = %event_type,
                    correlation_id,
                    "no module handles this event"
                );
                Ok(())
            }
            _ => self.registry.dispatch(message, &ctx).await.map(|_| ()),
        }
    }
}
