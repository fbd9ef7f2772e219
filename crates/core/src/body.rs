use serde_json::{Map, Value};
use thiserror::Error;

use crate::request::Headers;

pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Error)]
pub enum BodyDecodeError {
    #[error("request body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a raw webhook body according to its content type.
///
/// JSON bodies are parsed, form bodies become a flat string map (the last
/// duplicate key wins) and anything else is returned as a JSON string.
pub fn decode_body(headers: &Headers, raw_body: &str) -> Result<Value, BodyDecodeError> {
    let content_type =
        headers.get(CONTENT_TYPE_HEADER).map(|value| value.trim().to_ascii_lowercase());

    match content_type.as_deref() {
        Some(value) if value.starts_with(JSON_CONTENT_TYPE) => {
            Ok(serde_json::from_str(raw_body)?)
        }
        Some(value) if value.starts_with(FORM_CONTENT_TYPE) => {
            Ok(Value::Object(decode_form(raw_body)))
        }
        _ => Ok(Value::String(raw_body.to_owned())),
    }
}

pub fn decode_form(raw_body: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in form_urlencoded::parse(raw_body.as_bytes()) {
        fields.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    fields
}

pub fn encode_form<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish()
}
