//! Telegram Bot API long-poll transport
//!
//! Owner identity is the chat username as delivered by Telegram. Updates are
//! handled one after another, which keeps each owner's messages ordered.

use crate::dispatcher::Dispatcher;
use crate::error::BotError;
use crate::models::{ReplyMode, ReplyPayload, ReportFile};
use crate::Result;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://api.telegram.org";
const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BotUser {
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        Self::with_base_url(API_BASE, token, poll_timeout)
    }

    pub fn with_base_url(base: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        // The HTTP timeout has to outlive the long poll itself
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", base.trim_end_matches('/'), token),
            poll_timeout,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?;

        unwrap_envelope(method, response.json::<ApiEnvelope<T>>().await?)
    }

    pub async fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", &json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    /// Deliver a reply descriptor as a message or a document upload
    pub async fn send_reply(&self, chat_id: i64, reply_to: i64, reply: &ReplyPayload) -> Result<()> {
        match &reply.file {
            Some(file) => self.send_document(chat_id, reply_to, file).await,
            None => {
                let _: Value = self
                    .call("sendMessage", &send_message_body(chat_id, reply_to, reply))
                    .await?;
                Ok(())
            }
        }
    }

    async fn send_document(&self, chat_id: i64, reply_to: i64, file: &ReportFile) -> Result<()> {
        let part = Part::bytes(file.content.clone())
            .file_name(file.name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("reply_to_message_id", reply_to.to_string())
            .part("document", part);

        let response = self
            .client
            .post(format!("{}/sendDocument", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let _: Value = unwrap_envelope("sendDocument", response.json().await?)?;
        Ok(())
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiEnvelope<T>) -> Result<T> {
    match envelope {
        ApiEnvelope {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiEnvelope { description, .. } => Err(BotError::TransportError(format!(
            "{} failed: {}",
            method,
            description.unwrap_or_else(|| "no description".to_string())
        ))),
    }
}

/// Keyboard or keyboard removal in Bot API shape
pub fn reply_markup(reply: &ReplyPayload) -> Option<Value> {
    if reply.remove_keyboard {
        return Some(json!({ "remove_keyboard": true, "selective": true }));
    }

    reply.keyboard.as_ref().map(|rows| {
        let keyboard: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
            .collect();

        json!({
            "keyboard": keyboard,
            "resize_keyboard": true,
            "one_time_keyboard": true,
            "selective": true,
        })
    })
}

pub fn send_message_body(chat_id: i64, reply_to: i64, reply: &ReplyPayload) -> Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": reply.body,
        "reply_to_message_id": reply_to,
    });

    if reply.mode == ReplyMode::Markdown {
        body["parse_mode"] = json!("Markdown");
    }
    if let Some(markup) = reply_markup(reply) {
        body["reply_markup"] = markup;
    }

    body
}

/// A text message ready for the dispatcher
#[derive(Debug, Clone, PartialEq)]
struct Incoming {
    chat_id: i64,
    message_id: i64,
    owner: String,
    text: String,
}

/// Advance `offset` past a batch and keep the messages that carry text
fn accept_batch(offset: i64, updates: Vec<Update>) -> (i64, Vec<Incoming>) {
    let mut next = offset;
    let mut incoming = Vec::with_capacity(updates.len());

    for update in updates {
        next = next.max(update.update_id + 1);

        let Some(message) = update.message else {
            continue;
        };
        let Some(text) = message.text else {
            debug!(update_id = update.update_id, "Skipping message without text");
            continue;
        };

        incoming.push(Incoming {
            chat_id: message.chat.id,
            message_id: message.message_id,
            owner: message.chat.username.unwrap_or_default(),
            text,
        });
    }

    (next, incoming)
}

/// Poll for updates forever, answering each text message in arrival order
pub async fn run(dispatcher: Arc<Dispatcher>, client: TelegramClient) -> Result<()> {
    let me = client.get_me().await?;
    info!(
        "Authorized on account {}",
        me.username.unwrap_or_else(|| "<unnamed>".to_string())
    );

    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(error = %error, "Polling for updates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        let (next, messages) = accept_batch(offset, updates);
        offset = next;

        for message in messages {
            let reply = dispatcher.respond(&message.owner, &message.text).await;

            if let Err(error) = client
                .send_reply(message.chat_id, message.message_id, &reply)
                .await
            {
                warn!(chat_id = message.chat_id, error = %error, "Failed to send reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_parsing_tolerates_missing_fields() {
        let raw = json!({
            "ok": true,
            "result": [
                { "update_id": 7, "message": {
                    "message_id": 3,
                    "chat": { "id": 42, "username": "alice", "type": "private" },
                    "text": "/start"
                }},
                { "update_id": 8, "edited_message": {} }
            ]
        });

        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_value(raw).unwrap();
        let updates = unwrap_envelope("getUpdates", envelope).unwrap();
        assert_eq!(updates.len(), 2);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.username.as_deref(), Some("alice"));
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_failed_envelope_is_transport_error() {
        let envelope: ApiEnvelope<Value> = serde_json::from_value(json!({
            "ok": false,
            "description": "Unauthorized"
        }))
        .unwrap();

        let err = unwrap_envelope("getMe", envelope).unwrap_err();
        assert!(matches!(err, BotError::TransportError(ref m) if m.contains("Unauthorized")));
    }

    #[test]
    fn test_markdown_keyboard_message() {
        let reply = ReplyPayload::markdown("hi")
            .with_keyboard(vec![vec!["food".to_string(), "Done".to_string()]]);
        let body = send_message_body(42, 3, &reply);

        assert_eq!(body["parse_mode"], "Markdown");
        assert_eq!(body["reply_to_message_id"], 3);
        assert_eq!(body["reply_markup"]["keyboard"][0][1]["text"], "Done");
        assert_eq!(body["reply_markup"]["one_time_keyboard"], true);
    }

    #[test]
    fn test_plain_reply_removing_keyboard() {
        let reply = ReplyPayload::plain("Ok, done!").removing_keyboard();
        let body = send_message_body(42, 3, &reply);

        assert!(body.get("parse_mode").is_none());
        assert_eq!(body["reply_markup"]["remove_keyboard"], true);
    }

    #[test]
    fn test_plain_reply_without_markup() {
        let body = send_message_body(1, 2, &ReplyPayload::plain("x"));
        assert!(body.get("reply_markup").is_none());
    }

    fn update(update_id: i64, username: Option<&str>, text: Option<&str>) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id * 10,
                chat: Chat {
                    id: 42,
                    username: username.map(str::to_string),
                },
                text: text.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_batch_advances_offset_past_skipped_updates() {
        let updates = vec![
            update(7, Some("alice"), Some("/start")),
            update(8, Some("alice"), None),
            Update {
                update_id: 9,
                message: None,
            },
        ];

        let (offset, incoming) = accept_batch(0, updates);
        assert_eq!(offset, 10);
        assert_eq!(
            incoming,
            vec![Incoming {
                chat_id: 42,
                message_id: 70,
                owner: "alice".to_string(),
                text: "/start".to_string(),
            }]
        );
    }

    #[test]
    fn test_batch_keeps_order_and_offset() {
        let updates = vec![
            update(11, Some("bob"), Some("/addentry")),
            update(12, None, Some("5 lunch")),
        ];

        let (offset, incoming) = accept_batch(11, updates);
        assert_eq!(offset, 13);
        let texts: Vec<&str> = incoming.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["/addentry", "5 lunch"]);
        assert_eq!(incoming[1].owner, "");

        let (unchanged, none) = accept_batch(13, Vec::new());
        assert_eq!(unchanged, 13);
        assert!(none.is_empty());
    }
}
