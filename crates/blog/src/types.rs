//! Blog API payloads. Every response is wrapped in `{"tistory": {...}}`.

use serde::{Deserialize, Deserializer, Serialize};

/// A blog post as returned by `post/read`.
///
/// The API encodes most numbers as strings; both forms are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category_id: String,
    pub post_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub visibility: String,
    #[serde(deserialize_with = "lenient_string")]
    pub accept_comment: String,
    #[serde(deserialize_with = "lenient_string")]
    pub accept_trackback: String,
    #[serde(deserialize_with = "lenient_string")]
    pub comments: String,
    #[serde(deserialize_with = "lenient_string")]
    pub trackbacks: String,
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
}

/// An uploaded file. `replacer` is the markup the provider expects in post bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub url: String,
    pub replacer: String,
}

#[derive(Deserialize)]
pub(crate) struct Envelope<T> {
    pub tistory: T,
}

#[derive(Deserialize)]
pub(crate) struct ItemBody<T> {
    pub item: T,
}

#[derive(Deserialize)]
pub(crate) struct UrlBody {
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default)]
    error_message: String,
}

/// Turn an error response body into `code {status}: {message}`.
///
/// Falls back to the raw body when it is not the usual error envelope.
pub fn parse_error(body: &str) -> String {
    match serde_json::from_str::<Envelope<ErrorBody>>(body) {
        Ok(Envelope { tistory }) => format!("code {}: {}", tistory.status, tistory.error_message),
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
