use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    client::{SlackApi, SlackApiError},
    events::{BlockAction, BlockActionEvent, Command, SlackMessage},
};

/// Acknowledgement returned when a handler configured no text of its own.
pub const DEFAULT_ACK: &str = "...";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("handler is misconfigured: {0}")]
    Configuration(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command `{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: HandlerError,
    },
    #[error("block action `{action_id}` failed: {source}")]
    BlockAction {
        action_id: String,
        #[source]
        source: HandlerError,
    },
    #[error("event `{event_type}` failed: {source}")]
    Event {
        event_type: String,
        #[source]
        source: HandlerError,
    },
}

/// Shared state handed to every handler invocation.
#[derive(Clone)]
pub struct HandlerContext {
    pub slack: Arc<dyn SlackApi>,
    pub correlation_id: String,
}

impl HandlerContext {
    pub fn new(slack: Arc<dyn SlackApi>, correlation_id: impl Into<String>) -> Self {
        Self { slack, correlation_id: correlation_id.into() }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait BlockActionHandler: Send + Sync {
    async fn handle(
        &self,
        event: &BlockActionEvent,
        action: &BlockAction,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError>;
}

#[derive(Clone)]
pub struct CommandConfig {
    handler: Arc<dyn CommandHandler>,
    ack_message: Option<String>,
}

impl CommandConfig {
    pub fn new<H>(handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        Self { handler: Arc::new(handler), ack_message: None }
    }

    pub fn ack_message(mut self, text: impl Into<String>) -> Self {
        self.ack_message = Some(text.into());
        self
    }
}

#[derive(Clone)]
pub struct BlockActionConfig {
    handler: Arc<dyn BlockActionHandler>,
    ack_message: Option<String>,
}

impl BlockActionConfig {
    pub fn new<H>(handler: H) -> Self
    where
        H: BlockActionHandler + 'static,
    {
        Self { handler: Arc::new(handler), ack_message: None }
    }

    pub fn ack_message(mut self, text: impl Into<String>) -> Self {
        self.ack_message = Some(text.into());
        self
    }
}

/// Summary of one dispatch call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub invoked: usize,
}

impl DispatchOutcome {
    pub fn is_ignored(&self) -> bool {
        self.invoked == 0
    }
}

/// Lowercases a command name and strips any leading slashes.
pub fn normalize_command(command: &str) -> String {
    command.trim_start_matches('/').to_lowercase()
}

/// Startup-built table of command and block-action handlers.
///
/// Registration replaces any earlier entry under the same key. Once built the
/// registry is shared read-only behind an `Arc`.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandConfig>,
    block_actions: HashMap<String, BlockActionConfig>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&mut self, name: &str, config: CommandConfig) {
        let key = normalize_command(name);
        if self.commands.insert(key.clone(), config).is_some() {
            debug!(event_name = "registry.command.replaced", command = %key, "replaced command");
        }
    }

    pub fn register_block_action(&mut self, action_id: &str, config: BlockActionConfig) {
        if self.block_actions.insert(action_id.to_owned(), config).is_some() {
            debug!(
                event_name = "registry.block_action.replaced",
                action_id,
                "replaced block action"
            );
        }
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn block_action_count(&self) -> usize {
        self.block_actions.len()
    }

    fn command(&self, name: &str) -> Option<&CommandConfig> {
        self.commands.get(&normalize_command(name))
    }

    /// Text to answer the synchronous request with, if any.
    pub fn ack_message(&self, message: &SlackMessage) -> Option<String> {
        match message {
            SlackMessage::Command(command) => Some(
                self.command(&command.command)
                    .and_then(|config| config.ack_message.clone())
                    .unwrap_or_else(|| DEFAULT_ACK.to_owned()),
            ),
            SlackMessage::BlockActions(event) => Some(
                event
                    .actions
                    .iter()
                    .find_map(|action| {
                        self.block_actions
                            .get(&action.action_id)
                            .and_then(|config| config.ack_message.clone())
                    })
                    .unwrap_or_else(|| DEFAULT_ACK.to_owned()),
            ),
            SlackMessage::Event(_) | SlackMessage::Unsupported { .. } => None,
        }
    }

    pub fn ack_message_for(&self, body: &Value) -> Option<String> {
        self.ack_message(&SlackMessage::classify(body))
    }

    /// Runs the handlers for a message.
    ///
    /// Unknown commands and unregistered actions are skipped. The first
    /// handler failure stops the dispatch and is returned.
    pub async fn dispatch(
        &self,
        message: &SlackMessage,
        ctx: &HandlerContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        match message {
            SlackMessage::Command(command) => self.dispatch_command(command, ctx).await,
            SlackMessage::BlockActions(event) => self.dispatch_block_actions(event, ctx).await,
            SlackMessage::Event(_) | SlackMessage::Unsupported { .. } => {
                debug!(
                    event_name = "registry.dispatch.skipped",
                    kind = message.kind(),
                    correlation_id = %ctx.correlation_id,
                    "message has no registry handler"
                );
                Ok(DispatchOutcome::default())
            }
        }
    }

    async fn dispatch_command(
        &self,
        command: &Command,
        ctx: &HandlerContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(config) = self.command(&command.command) else {
            warn!(
                event_name = "registry.command.unrecognized",
                command = %command.command,
                user_id = %command.user_id,
                correlation_id = %ctx.correlation_id,
                "unrecognized command"
            );
            return Ok(DispatchOutcome::default());
        };

        info!(
            event_name = "registry.command.dispatch",
            command = %command.command,
            correlation_id = %ctx.correlation_id,
            "handling command"
        );
        config.handler.handle(command, ctx).await.map_err(|source| DispatchError::Command {
            command: command.command.clone(),
            source,
        })?;
        Ok(DispatchOutcome { invoked: 1 })
    }

    async fn dispatch_block_actions(
        &self,
        event: &BlockActionEvent,
        ctx: &HandlerContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut outcome = DispatchOutcome::default();

        for action in &event.actions {
            let Some(config) = self.block_actions.get(&action.action_id) else {
                debug!(
                    event_name = "registry.block_action.unrecognized",
                    action_id = %action.action_id,
                    correlation_id = %ctx.correlation_id,
                    "no handler for block action"
                );
                continue;
            };

            info!(
                event_name = "registry.block_action.dispatch",
                action_id = %action.action_id,
                user_id = %event.user.id,
                correlation_id = %ctx.correlation_id,
                "handling block action"
            );
            config.handler.handle(event, action, ctx).await.map_err(|source| {
                DispatchError::BlockAction { action_id: action.action_id.clone(), source }
            })?;
            outcome.invoked += 1;
        }

        Ok(outcome)
    }
}
