//! Per-view conversation session.
//!
//! One `ConversationSession` is constructed when a chat view mounts and
//! torn down when it unmounts. It owns every background task the subsystem
//! spawns (socket pump, poll loop, debounce and resume timers), so an
//! unmounted view can never keep mutating a model nobody is listening to.
//! There is deliberately no ambient global state; everything reaches the
//! components by reference through this object.

use crate::api::ChatApi;
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::poller::{CircuitBreakerProbe, PollingScheduler};
use crate::render::{surface, Notifier, PreviewStore, Renderer};
use crate::sync::{ConversationSyncEngine, MergeResult};
use crate::typing::TypingIndicatorController;
use crate::upload::AttachmentUploadPipeline;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tradechat_model::{Conversation, Message, SocketEvent};

pub struct ConversationSession {
    conversation: Conversation,
    local_user_id: String,
    api: Arc<dyn ChatApi>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
    engine: Arc<ConversationSyncEngine>,
    pipeline: AttachmentUploadPipeline,
    typing: TypingIndicatorController,
    scheduler: Arc<PollingScheduler>,
    bus: broadcast::Sender<SocketEvent>,
    poll_interval: Duration,
    page_limit: u32,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ConversationSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversation: Conversation,
        local_user_id: impl Into<String>,
        api: Arc<dyn ChatApi>,
        renderer: Arc<dyn Renderer>,
        previews: Arc<dyn PreviewStore>,
        notifier: Arc<dyn Notifier>,
        breaker: Arc<dyn CircuitBreakerProbe>,
        bus: broadcast::Sender<SocketEvent>,
        config: &ClientConfig,
    ) -> Arc<Self> {
        let local_user_id = local_user_id.into();
        let engine = Arc::new(ConversationSyncEngine::new(
            conversation.clone(),
            api.clone(),
            renderer.clone(),
        ));
        let pipeline = AttachmentUploadPipeline::new(
            conversation.clone(),
            api.clone(),
            previews,
            engine.clone(),
            config,
        );
        let typing = TypingIndicatorController::new(
            conversation.id.clone(),
            local_user_id.clone(),
            bus.clone(),
            Duration::from_millis(config.typing_debounce_ms),
        );
        let scheduler = Arc::new(PollingScheduler::new(
            engine.clone(),
            breaker,
            notifier.clone(),
            config.page_limit,
            Duration::from_millis(config.resume_grace_ms),
        ));

        Arc::new(Self {
            conversation,
            local_user_id,
            api,
            renderer,
            notifier,
            engine,
            pipeline,
            typing,
            scheduler,
            bus,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            page_limit: config.page_limit,
            pump: Mutex::new(None),
        })
    }

    /// Registers the socket handlers (once) and, for order conversations,
    /// starts background polling. Inquiry conversations stay point-in-time.
    pub fn connect(self: &Arc<Self>) {
        self.spawn_pump();
        if self.conversation.kind.polls() {
            self.scheduler.start(self.poll_interval);
        } else {
            debug!(
                conversation = %self.conversation.id,
                "inquiry conversation, background polling disabled"
            );
        }
    }

    /// Initial page load; also the retry entry point behind the renderer's
    /// retry affordance.
    pub async fn load_initial(&self) -> Result<MergeResult> {
        match self.engine.fetch_and_merge(1, self.page_limit).await {
            Ok(result) => Ok(result),
            Err(err) => {
                surface(self.notifier.as_ref(), &err);
                Err(err)
            }
        }
    }

    /// Composer send: text, pending attachment, or both as one message.
    pub async fn send(&self, content: &str) -> Result<Message> {
        match self.pipeline.send(content).await {
            Ok(message) => Ok(message),
            Err(err) => {
                surface(self.notifier.as_ref(), &err);
                Err(err)
            }
        }
    }

    /// Marks a message read server-side and locally.
    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        if let Err(err) = self.api.mark_read(message_id).await {
            surface(self.notifier.as_ref(), &err);
            return Err(err);
        }
        self.engine.mark_read(message_id, Utc::now());
        Ok(())
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<ConversationSyncEngine> {
        &self.engine
    }

    #[must_use]
    pub fn pipeline(&self) -> &AttachmentUploadPipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn typing(&self) -> &TypingIndicatorController {
        &self.typing
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<PollingScheduler> {
        &self.scheduler
    }

    fn spawn_pump(self: &Arc<Self>) {
        let mut pump = self.pump.lock();
        if let Some(previous) = pump.take() {
            previous.abort();
        }

        let this = Arc::clone(self);
        let mut rx = self.bus.subscribe();
        *pump = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => this.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "socket pump lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Typing indicators silently stop working; the
                        // reconnect policy belongs to the channel owner.
                        debug!(error = %ChatError::ConnectionLost, "socket channel closed");
                        break;
                    }
                }
            }
        }));
    }

    fn handle_event(&self, event: SocketEvent) {
        match event {
            SocketEvent::Typing {
                conversation_id,
                user_id,
            } => {
                if conversation_id == self.conversation.id && user_id != self.local_user_id {
                    self.renderer.show_typing(&user_id);
                }
            }
            SocketEvent::StopTyping {
                conversation_id,
                user_id,
            } => {
                if conversation_id == self.conversation.id && user_id != self.local_user_id {
                    self.renderer.clear_typing(&user_id);
                }
            }
            SocketEvent::Message(message) => {
                if message.conversation_id != self.conversation.id {
                    return;
                }
                // A message from a sender implicitly ends their typing.
                self.renderer.clear_typing(&message.sender_id);
                self.engine.record_local(message);
            }
            SocketEvent::MessageRead { message_id } => {
                self.engine.mark_read(&message_id, Utc::now());
            }
        }
    }

    /// View unmount. Aborts every background task this session spawned and
    /// emits a final `stop-typing` if the user was mid-composition.
    pub fn teardown(&self) {
        info!(conversation = %self.conversation.id, "session teardown");
        self.scheduler.stop();
        self.typing.stop();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.scheduler.stop();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}
