//! Two-phase attachment upload pipeline.
//!
//! `Idle -> Selected -> PreviewShown -> Uploading -> Sent`, with `cancel()`
//! returning to `Idle` from any state. Cancelling mid-upload lets the
//! in-flight request finish in the background with its result discarded.
//! The upload must fully succeed before the combined send call is issued; a
//! failure of either call reverts to `PreviewShown` so the user can retry
//! without re-selecting the file.

use crate::api::{ChatApi, SendRequest, UploadFile, UploadKind};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::render::PreviewStore;
use crate::sync::ConversationSyncEngine;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use tradechat_model::{Conversation, Message};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Selected,
    PreviewShown,
    Uploading,
    Sent,
}

/// Transient job tracking one file from selection through confirmed send.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: Uuid,
    pub file: UploadFile,
    pub preview_url: Option<String>,
}

struct PipelineState {
    state: UploadState,
    job: Option<UploadJob>,
}

pub struct AttachmentUploadPipeline {
    conversation: Conversation,
    api: Arc<dyn ChatApi>,
    previews: Arc<dyn PreviewStore>,
    engine: Arc<ConversationSyncEngine>,
    max_image_bytes: u64,
    max_document_bytes: u64,
    inner: Mutex<PipelineState>,
}

impl AttachmentUploadPipeline {
    pub fn new(
        conversation: Conversation,
        api: Arc<dyn ChatApi>,
        previews: Arc<dyn PreviewStore>,
        engine: Arc<ConversationSyncEngine>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            conversation,
            api,
            previews,
            engine,
            max_image_bytes: config.max_image_bytes,
            max_document_bytes: config.max_document_bytes,
            inner: Mutex::new(PipelineState {
                state: UploadState::Idle,
                job: None,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> UploadState {
        self.inner.lock().state
    }

    fn validate(&self, file: &UploadFile) -> Result<()> {
        match file.kind {
            UploadKind::Image => {
                if !file.mime_type.starts_with("image/") {
                    return Err(ChatError::ValidationFailed(format!(
                        "expected an image, got {}",
                        file.mime_type
                    )));
                }
                if file.size() > self.max_image_bytes {
                    return Err(ChatError::ValidationFailed(format!(
                        "image exceeds {} byte limit",
                        self.max_image_bytes
                    )));
                }
            }
            UploadKind::Document => {
                if file.size() > self.max_document_bytes {
                    return Err(ChatError::ValidationFailed(format!(
                        "document exceeds {} byte limit",
                        self.max_document_bytes
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates and stages a file. A rejected file does not transition
    /// state and never reaches the upload endpoint. Selecting while a job
    /// is pending replaces it after revoking its preview URL.
    pub fn select(&self, file: UploadFile) -> Result<Uuid> {
        self.validate(&file)?;

        let mut inner = self.inner.lock();
        if let Some(previous) = inner.job.take() {
            if let Some(url) = previous.preview_url {
                self.previews.revoke(&url);
            }
        }

        let job = UploadJob {
            id: Uuid::new_v4(),
            file,
            preview_url: None,
        };
        let job_id = job.id;
        info!(job = %job_id, name = %job.file.name, "file selected");
        inner.job = Some(job);
        inner.state = UploadState::Selected;
        Ok(job_id)
    }

    /// Derives a local preview URL for immediate display. No network.
    pub fn show_preview(&self) -> Result<String> {
        let mut inner = self.inner.lock();
        if inner.state != UploadState::Selected {
            return Err(ChatError::InvalidState(
                "no freshly selected file to preview".into(),
            ));
        }
        let job = inner
            .job
            .as_mut()
            .ok_or_else(|| ChatError::Internal("selected state without a job".into()))?;
        let url = self
            .previews
            .create(&job.id.to_string(), &job.file.bytes, &job.file.mime_type);
        job.preview_url = Some(url.clone());
        inner.state = UploadState::PreviewShown;
        Ok(url)
    }

    /// Releases the preview resource and returns to `Idle`. Safe from any
    /// state; a cancel during `Uploading` orphans the in-flight request and
    /// its result is discarded when it lands.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.job.take() {
            if let Some(url) = job.preview_url {
                self.previews.revoke(&url);
            }
        }
        inner.state = UploadState::Idle;
    }

    /// Composer entry point: sends pending text, the pending attachment, or
    /// both as a single mixed message.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let attachment_pending = { self.inner.lock().state == UploadState::PreviewShown };
        if attachment_pending {
            return self.confirm_and_send(content).await;
        }
        self.send_text(content).await
    }

    /// Text-only send. Empty content with no pending attachment is a local
    /// validation failure and never hits the network.
    pub async fn send_text(&self, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(ChatError::ValidationFailed("empty message".into()));
        }
        let request = SendRequest::for_conversation(&self.conversation, content, vec![]);
        let message = self.api.send_message(&request).await?;
        self.engine.record_local(message.clone());
        Ok(message)
    }

    /// `PreviewShown -> Uploading -> Sent`. Uploads the raw file, then sends
    /// one message carrying `content` plus the uploaded attachment. Both
    /// calls must succeed; either failure reverts to `PreviewShown`. If the
    /// job was cancelled or superseded while a call was in flight, its
    /// result is discarded.
    pub async fn confirm_and_send(&self, content: &str) -> Result<Message> {
        let (job_id, file) = {
            let mut inner = self.inner.lock();
            if inner.state != UploadState::PreviewShown {
                return Err(ChatError::InvalidState(
                    "confirm requires a previewed file".into(),
                ));
            }
            let job = inner
                .job
                .as_ref()
                .ok_or_else(|| ChatError::Internal("preview state without a job".into()))?;
            let (job_id, file) = (job.id, job.file.clone());
            inner.state = UploadState::Uploading;
            (job_id, file)
        };

        let attachment = match self.api.upload_attachment(&file).await {
            Ok(attachment) => attachment,
            Err(err) => {
                warn!(error = %err, "attachment upload failed, job back to preview");
                self.revert_if_current(job_id);
                return Err(err);
            }
        };

        if !self.is_current(job_id) {
            info!(job = %job_id, "job cancelled mid-upload, result discarded");
            return Err(ChatError::InvalidState("upload job was cancelled".into()));
        }

        let request = SendRequest::for_conversation(&self.conversation, content, vec![attachment]);
        let message = match self.api.send_message(&request).await {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "send failed after upload, job back to preview");
                self.revert_if_current(job_id);
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock();
            let still_current = inner.job.as_ref().is_some_and(|j| j.id == job_id);
            if !still_current {
                // The server accepted the message; the next merge will pick
                // it up. This view stopped caring when it cancelled.
                info!(job = %job_id, "job cancelled mid-send, result discarded");
                return Err(ChatError::InvalidState("upload job was cancelled".into()));
            }
            if let Some(job) = inner.job.take() {
                if let Some(url) = job.preview_url {
                    self.previews.revoke(&url);
                }
            }
            inner.state = UploadState::Sent;
        }

        info!(message = %message.id, kind = ?message.kind, "attachment message sent");
        self.engine.record_local(message.clone());
        Ok(message)
    }

    fn is_current(&self, job_id: Uuid) -> bool {
        let inner = self.inner.lock();
        inner.state == UploadState::Uploading
            && inner.job.as_ref().is_some_and(|j| j.id == job_id)
    }

    /// Reverts to `PreviewShown` after a failed call, unless the job was
    /// cancelled or replaced in the meantime.
    fn revert_if_current(&self, job_id: Uuid) {
        let mut inner = self.inner.lock();
        if inner.state == UploadState::Uploading
            && inner.job.as_ref().is_some_and(|j| j.id == job_id)
        {
            inner.state = UploadState::PreviewShown;
        }
    }
}
