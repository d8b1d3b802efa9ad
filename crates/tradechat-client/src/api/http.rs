//! reqwest-backed implementation of [`ChatApi`].

use super::{ChatApi, MessagePage, Pagination, SendRequest, UploadFile};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use tradechat_model::{Attachment, ConversationKind, Message};

/// Standard `{ success, data }` response envelope of the messaging API.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, context: &str) -> std::result::Result<T, String> {
        if !self.success {
            return Err(self
                .message
                .unwrap_or_else(|| format!("{context}: server reported failure")));
        }
        self.data
            .ok_or_else(|| format!("{context}: missing data in response"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesData {
    messages: Vec<Message>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct SendData {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    attachment: UploadedAttachment,
}

/// Upload endpoint names its fields differently from message attachments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedAttachment {
    url: String,
    file_name: String,
    size: u64,
    #[serde(rename = "type")]
    mime_type: String,
}

impl From<UploadedAttachment> for Attachment {
    fn from(uploaded: UploadedAttachment) -> Self {
        Attachment {
            url: uploaded.url,
            original_name: uploaded.file_name,
            size: uploaded.size,
            mime_type: uploaded.mime_type,
        }
    }
}

pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ChatError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_messages(
        &self,
        kind: ConversationKind,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage> {
        let url = self.url(&format!(
            "/{}/{}/messages",
            kind.root_path(),
            conversation_id
        ));
        debug!(%url, page, limit, "fetching message page");

        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
            .map_err(|e| ChatError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::FetchFailed(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let envelope: Envelope<MessagesData> = response
            .json()
            .await
            .map_err(|e| ChatError::FetchFailed(e.to_string()))?;
        let data = envelope
            .into_data("fetch messages")
            .map_err(ChatError::FetchFailed)?;

        Ok(MessagePage {
            messages: data.messages,
            pagination: data.pagination,
        })
    }

    async fn send_message(&self, request: &SendRequest) -> Result<Message> {
        let url = self.url("/messages/send");
        info!(%url, attachments = request.attachments.len(), "sending message");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::SendFailed(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let envelope: Envelope<SendData> = response
            .json()
            .await
            .map_err(|e| ChatError::SendFailed(e.to_string()))?;
        let data = envelope
            .into_data("send message")
            .map_err(ChatError::SendFailed)?;
        Ok(data.message)
    }

    async fn upload_attachment(&self, file: &UploadFile) -> Result<Attachment> {
        let url = self.url("/messages/upload");
        info!(%url, name = %file.name, size = file.size(), "uploading attachment");

        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| ChatError::UploadFailed(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::UploadFailed(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let envelope: Envelope<UploadData> = response
            .json()
            .await
            .map_err(|e| ChatError::UploadFailed(e.to_string()))?;
        let data = envelope
            .into_data("upload attachment")
            .map_err(ChatError::UploadFailed)?;
        Ok(data.attachment.into())
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let url = self.url(&format!("/messages/{message_id}/read"));
        debug!(%url, "marking message read");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Internal(format!(
                "mark read returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
