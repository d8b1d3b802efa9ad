//! UI-facing sink traits.
//!
//! The subsystem never touches a DOM. Rendering, preview object URLs and
//! user notifications are pluggable sinks the embedding view supplies;
//! everything it receives is a pure view-model projection.

use crate::error::ChatError;
use bytes::Bytes;
use tradechat_model::MessageView;

/// Paints message view-models. Append-only: the engine never asks a
/// renderer to reorder or rewrite an already painted message; the only
/// post-paint mutation is the read marker.
pub trait Renderer: Send + Sync {
    fn append(&self, view: MessageView);
    fn mark_read(&self, message_id: &str);
    fn show_typing(&self, user_id: &str);
    fn clear_typing(&self, user_id: &str);
}

/// Issues and revokes local preview URLs for files awaiting upload. The
/// preview URL is the one local resource the pipeline must release
/// explicitly.
pub trait PreviewStore: Send + Sync {
    fn create(&self, job_id: &str, bytes: &Bytes, mime_type: &str) -> String;
    fn revoke(&self, url: &str);
}

/// Non-blocking user-visible notifications. Validation problems go inline
/// next to the composer; network failures get a dismissible notice with a
/// retry affordance.
pub trait Notifier: Send + Sync {
    fn inline(&self, text: &str);
    fn notify(&self, error: &ChatError);
}

/// Routes an error to the right notifier surface.
pub fn surface(notifier: &dyn Notifier, error: &ChatError) {
    if error.is_validation() {
        notifier.inline(&error.to_string());
    } else {
        notifier.notify(error);
    }
}
