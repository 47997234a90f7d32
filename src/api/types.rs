//! Wire types for the chat platform API.
//!
//! Only the fields the bot reads are modelled. An [`Update`] keeps its payload
//! as raw JSON so that a malformed item still makes it through the queue and
//! is rejected at the dispatcher instead of failing the whole fetch.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Response envelope shared by every API method.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

/// One item from getUpdates.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Typed view of an update payload.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    InlineQuery(InlineQuery),
    Message(Message),
    /// Any payload the bot does not handle (edited messages, callbacks, ...)
    Unsupported(String),
}

impl Update {
    /// Classify the payload by its tag field and decode the matching branch.
    pub fn kind(&self) -> Result<UpdateKind, serde_json::Error> {
        if let Some(query) = self.payload.get("inline_query") {
            return InlineQuery::deserialize(query).map(UpdateKind::InlineQuery);
        }
        if let Some(message) = self.payload.get("message") {
            return Message::deserialize(message).map(UpdateKind::Message);
        }
        let tag = self
            .payload
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "<empty>".to_string());
        Ok(UpdateKind::Unsupported(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

/// Parameters of getUpdates.
#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesParams {
    pub offset: i64,
    pub timeout: u64,
}

/// Parameters of sendMessage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

/// Parameters of answerInlineQuery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerInlineQuery {
    pub inline_query_id: String,
    pub results: Vec<InlineQueryResultArticle>,
}

/// An `article` inline result that posts its title as the message body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineQueryResultArticle {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub title: String,
    pub description: String,
    pub input_message_content: InputTextMessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputTextMessageContent {
    pub message_text: String,
}

impl InlineQueryResultArticle {
    pub fn new(text: &str, description: &str) -> Self {
        Self {
            kind: "article",
            id: article_id(text),
            title: text.to_string(),
            description: description.to_string(),
            input_message_content: InputTextMessageContent {
                message_text: text.to_string(),
            },
        }
    }
}

/// Stable result id: base64 of the SHA-256 of the text.
pub fn article_id(text: &str) -> String {
    STANDARD.encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn article_id_is_base64_sha256() {
        // sha256("") is e3b0c442...; its base64 form is well known
        assert_eq!(
            article_id(""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
        assert_eq!(article_id("你好"), article_id("你好"));
        assert_ne!(article_id("你好"), article_id("您好"));
    }

    #[test]
    fn inline_query_update_is_classified() {
        let upd = update(json!({
            "update_id": 5,
            "inline_query": {"id": "q1", "query": "pinyin", "offset": ""}
        }));

        assert_eq!(upd.update_id, 5);
        match upd.kind().unwrap() {
            UpdateKind::InlineQuery(q) => {
                assert_eq!(q.id, "q1");
                assert_eq!(q.query, "pinyin");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn message_without_text_is_still_a_message() {
        let upd = update(json!({
            "update_id": 7,
            "message": {"message_id": 3, "chat": {"id": 10, "type": "private"}}
        }));

        match upd.kind().unwrap() {
            UpdateKind::Message(m) => {
                assert!(m.chat.is_private());
                assert_eq!(m.text, None);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn sender_details_are_not_required() {
        let upd = update(json!({
            "update_id": 6,
            "message": {
                "message_id": 4,
                "from": {"id": 1, "is_bot": false, "first_name": "A"},
                "chat": {"id": 1, "type": "private"},
                "text": "hao"
            }
        }));
        assert!(matches!(upd.kind().unwrap(), UpdateKind::Message(m) if m.text.as_deref() == Some("hao")));

        let me: User =
            serde_json::from_value(json!({"id": 9, "is_bot": true, "username": "ime_bot"})).unwrap();
        assert_eq!(
            me,
            User {
                id: 9,
                username: Some("ime_bot".to_string())
            }
        );
    }

    #[test]
    fn inline_query_missing_fields_is_an_error() {
        let upd = update(json!({"update_id": 8, "inline_query": {"id": "q"}}));
        assert!(upd.kind().is_err());
    }

    #[test]
    fn unknown_payload_is_unsupported() {
        let upd = update(json!({"update_id": 9, "edited_message": {}}));
        assert_eq!(
            upd.kind().unwrap(),
            UpdateKind::Unsupported("edited_message".to_string())
        );
    }

    #[test]
    fn article_serializes_with_type_tag() {
        let article = InlineQueryResultArticle::new("拼音", "Rime");
        let value = serde_json::to_value(&article).unwrap();

        assert_eq!(value["type"], "article");
        assert_eq!(value["title"], "拼音");
        assert_eq!(value["input_message_content"]["message_text"], "拼音");
        assert_eq!(value["id"], article_id("拼音"));
    }
}
