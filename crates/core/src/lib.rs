//! Shared building blocks for the beacon Slack relay: configuration, error
//! taxonomy, request authentication and body decoding.

pub mod body;
pub mod config;
pub mod errors;
pub mod request;
pub mod signature;

pub use body::{decode_body, BodyDecodeError};
pub use errors::{ApplicationError, InterfaceError};
pub use request::{Headers, InboundRequest};
pub use signature::SlackVerifier;
