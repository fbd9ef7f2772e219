//! Slack request signature verification.
//!
//! Slack signs every webhook with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! using the app's signing secret and sends the result as
//! `x-slack-signature: v0=<hex>` next to `x-slack-request-timestamp`.
//! Requests outside the replay window are rejected even when the MAC matches.
//!
//! Verification never errors: every failure mode returns `false` and logs a
//! warning with the reason.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::warn;

use crate::request::Headers;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_VERSION: &str = "v0";
pub const REPLAY_WINDOW_SECS: i64 = 60 * 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    MissingSecret,
    MissingSignature,
    MalformedSignature,
    MissingTimestamp,
    MalformedTimestamp,
    Expired,
    Mismatch,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSecret => "signing secret is unset",
            Self::MissingSignature => "missing x-slack-signature header",
            Self::MalformedSignature => "malformed x-slack-signature header",
            Self::MissingTimestamp => "missing x-slack-request-timestamp header",
            Self::MalformedTimestamp => "malformed x-slack-request-timestamp header",
            Self::Expired => "timestamp outside replay window",
            Self::Mismatch => "signature mismatch",
        }
    }
}

/// Verifies inbound requests against the app's signing secret.
#[derive(Clone)]
pub struct SlackVerifier {
    signing_secret: Option<SecretString>,
}

impl std::fmt::Debug for SlackVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackVerifier")
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SlackVerifier {
    pub fn new(signing_secret: Option<SecretString>) -> Self {
        Self { signing_secret }
    }

    /// Returns `true` when the request is authentic and fresh.
    pub fn verify(&self, headers: &Headers, raw_body: &[u8]) -> bool {
        self.verify_at(headers, raw_body, unix_now())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(&self, headers: &Headers, raw_body: &[u8], now_secs: i64) -> bool {
        match self.check(headers, raw_body, now_secs) {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    event_name = "ingress.slack.signature_rejected",
                    reason = reason.as_str(),
                    "rejecting slack request"
                );
                false
            }
        }
    }

    pub fn check(
        &self,
        headers: &Headers,
        raw_body: &[u8],
        now_secs: i64,
    ) -> Result<(), RejectionReason> {
        let secret = self
            .signing_secret
            .as_ref()
            .map(|secret| secret.expose_secret())
            .filter(|secret| !secret.is_empty())
            .ok_or(RejectionReason::MissingSecret)?;

        let header = headers.get(SIGNATURE_HEADER).ok_or(RejectionReason::MissingSignature)?;
        let (version, digest) = parse_signature_header(header)?;

        let timestamp = headers.get(TIMESTAMP_HEADER).ok_or(RejectionReason::MissingTimestamp)?;
        let timestamp_secs =
            timestamp.trim().parse::<i64>().map_err(|_| RejectionReason::MalformedTimestamp)?;

        if now_secs.saturating_sub(timestamp_secs).abs() > REPLAY_WINDOW_SECS {
            return Err(RejectionReason::Expired);
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| RejectionReason::MissingSecret)?;
        mac.update(version.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(raw_body);

        // verify_slice compares in constant time
        mac.verify_slice(&digest).map_err(|_| RejectionReason::Mismatch)
    }
}

fn parse_signature_header(header: &str) -> Result<(&str, Vec<u8>), RejectionReason> {
    let (version, hex_digest) =
        header.split_once('=').ok_or(RejectionReason::MalformedSignature)?;
    if version.is_empty() {
        return Err(RejectionReason::MalformedSignature);
    }
    let digest = hex::decode(hex_digest).map_err(|_| RejectionReason::MalformedSignature)?;
    Ok((version, digest))
}

/// Hex HMAC-SHA256 of `{version}:{timestamp}:{body}`.
pub fn compute_signature(version: &str, timestamp: &str, raw_body: &[u8], secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(format!("{version}:{timestamp}:").as_bytes());
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the `x-slack-signature` value Slack would send for this body.
pub fn signature_header(timestamp: &str, raw_body: &[u8], secret: &str) -> String {
    format!(
        "{SIGNATURE_VERSION}={}",
        compute_signature(SIGNATURE_VERSION, timestamp, raw_body, secret)
    )
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
