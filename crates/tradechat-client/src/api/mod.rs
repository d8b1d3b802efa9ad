//! REST API seam for the conversation subsystem.
//!
//! The engine and pipeline only ever talk to [`ChatApi`]; the reqwest-backed
//! implementation lives in [`http`]. Tests swap in counting mocks.

pub mod http;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tradechat_model::{Attachment, Conversation, ConversationKind, Message, MessageKind};

pub use http::HttpChatApi;

/// One fetched page of messages, oldest to newest.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
}

/// Body for `POST /messages/send`. Exactly one of `order_id` / `inquiry_id`
/// is set, matching the conversation kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry_id: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl SendRequest {
    #[must_use]
    pub fn for_conversation(
        conversation: &Conversation,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        let content = content.into();
        let kind = MessageKind::derive(&content, &attachments);
        let (order_id, inquiry_id) = match conversation.kind {
            ConversationKind::Order => (Some(conversation.id.clone()), None),
            ConversationKind::Inquiry => (None, Some(conversation.id.clone())),
        };
        Self {
            order_id,
            inquiry_id,
            content,
            kind,
            attachments,
        }
    }
}

/// What the user picked in the file dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

/// Raw file handed to the upload pipeline.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub kind: UploadKind,
}

impl UploadFile {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Asynchronous messaging API. All network traffic of the subsystem goes
/// through this seam.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /{order|inquiry}/{id}/messages?page=&limit=`
    async fn fetch_messages(
        &self,
        kind: ConversationKind,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage>;

    /// `POST /messages/send`
    async fn send_message(&self, request: &SendRequest) -> Result<Message>;

    /// `POST /messages/upload` (multipart)
    async fn upload_attachment(&self, file: &UploadFile) -> Result<Attachment>;

    /// `POST /messages/{id}/read`
    async fn mark_read(&self, message_id: &str) -> Result<()>;
}
