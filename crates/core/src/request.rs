use std::collections::HashMap;

use serde_json::Value;

/// Header map with case-insensitive lookup.
///
/// API gateways, load balancers and test harnesses disagree on header casing,
/// so the original spelling is kept for display but never used for lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.entries.get(name) {
            return Some(value.as_str());
        }

        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// One inbound webhook invocation: the exact bytes Slack signed, the headers,
/// and the decoded body.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundRequest {
    pub raw_body: String,
    pub headers: Headers,
    pub body: Value,
}

impl InboundRequest {
    pub fn new(raw_body: impl Into<String>, headers: Headers, body: Value) -> Self {
        Self { raw_body: raw_body.into(), headers, body }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::Headers;

    #[test]
    fn header_lookup_ignores_case() {
        let headers = Headers::new()
            .with("Content-Type", "application/json")
            .with("X-Slack-Signature", "v0=abc");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("x-slack-signature"), Some("v0=abc"));
        assert_eq!(headers.get("X-SLACK-SIGNATURE"), Some("v0=abc"));
        assert_eq!(headers.get("x-slack-request-timestamp"), None);
    }

    #[test]
    fn exact_match_wins_over_case_folded_match() {
        let headers = Headers::from_iter([("x-test", "lower"), ("X-Test", "upper")]);

        assert_eq!(headers.get("X-Test"), Some("upper"));
        assert_eq!(headers.get("x-test"), Some("lower"));
    }
}
