//! Slack-facing side of beacon.
//!
//! - **Events** (`events`) - typed inbound messages and their single classification step
//! - **Registry** (`registry`) - command and block-action handlers plus acknowledgement text
//! - **Block Kit** (`blocks`) - message builders
//! - **Client** (`client`) - Slack Web API access behind the `SlackApi` trait
//!
//! ```text
//! decoded body -> SlackMessage::classify -> CommandRegistry::{ack_message, dispatch} -> handler
//! ```

pub mod blocks;
pub mod client;
pub mod events;
pub mod registry;

pub use client::{HttpSlackClient, SlackApi, SlackApiError};
pub use events::SlackMessage;
pub use registry::{CommandRegistry, HandlerContext, HandlerError};
