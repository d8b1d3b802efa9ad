//! Conversation sync client for order/inquiry messaging.
//!
//! The moving parts of a chat view between a manufacturer and a trading
//! partner: a merge engine that reconciles server pages against what is
//! already painted without ever destroying it, a two-phase
//! upload-then-send attachment pipeline, a debounced typing indicator, and
//! a poll loop gated by an external circuit breaker. Rendering, preview
//! URLs and notifications are pluggable sinks; all network traffic goes
//! through the [`api::ChatApi`] seam.

pub mod api;
pub mod config;
pub mod error;
pub mod poller;
pub mod render;
pub mod session;
pub mod sync;
pub mod typing;
pub mod upload;

pub use api::{ChatApi, HttpChatApi, MessagePage, SendRequest, UploadFile, UploadKind};
pub use config::ClientConfig;
pub use error::{ChatError, Result};
pub use poller::{CircuitBreakerProbe, PollingScheduler};
pub use render::{Notifier, PreviewStore, Renderer};
pub use session::ConversationSession;
pub use sync::{ConversationSyncEngine, MergeResult};
pub use typing::TypingIndicatorController;
pub use upload::{AttachmentUploadPipeline, UploadJob, UploadState};
