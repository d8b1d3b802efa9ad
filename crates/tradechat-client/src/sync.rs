//! Conversation sync engine: fetch, merge, dedup, append.

use crate::api::ChatApi;
use crate::error::Result;
use crate::render::Renderer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};
use tradechat_model::{
    view_model, Conversation, Message, MessageModel, RenderedSet, UpsertOutcome,
};

/// Outcome of one merge pass.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// How many messages were newly appended to the renderer.
    pub appended: usize,
    /// The appended messages, in append order.
    pub messages: Vec<Message>,
}

impl MergeResult {
    fn empty() -> Self {
        Self {
            appended: 0,
            messages: Vec::new(),
        }
    }
}

struct SyncState {
    model: MessageModel,
    rendered: RenderedSet,
}

/// Merges server-fetched message pages into the live view without ever
/// destroying what is already painted.
///
/// The merge is append-only: if the fetched page is no longer than the
/// rendered set, nothing is appended or rewritten (this is what protects
/// optimistic local appends and rich mixed-message markup from a naive
/// re-render); read markers for already-painted messages may still advance.
/// When the page has grown, only messages whose ids have never been
/// rendered are appended, in fetch order — dedup is by id, not by count,
/// so an optimistic append racing a poll can never be double-painted.
pub struct ConversationSyncEngine {
    conversation: Conversation,
    api: Arc<dyn ChatApi>,
    renderer: Arc<dyn Renderer>,
    state: Mutex<SyncState>,
}

impl ConversationSyncEngine {
    pub fn new(
        conversation: Conversation,
        api: Arc<dyn ChatApi>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            conversation,
            api,
            renderer,
            state: Mutex::new(SyncState {
                model: MessageModel::new(),
                rendered: RenderedSet::new(),
            }),
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Fetches one page and merges it. A failed fetch commits nothing.
    pub async fn fetch_and_merge(&self, page: u32, limit: u32) -> Result<MergeResult> {
        let fetched = self
            .api
            .fetch_messages(self.conversation.kind, &self.conversation.id, page, limit)
            .await?;
        Ok(self.merge(fetched.messages))
    }

    /// Merge a fetched page (oldest to newest) against the rendered set.
    pub fn merge(&self, fetched: Vec<Message>) -> MergeResult {
        let mut state = self.state.lock();
        let current = state.rendered.len();

        if fetched.len() <= current {
            // No growth: nothing appended. Only read transitions for
            // messages we already hold are applied, and those reach the
            // painted read marker.
            debug!(
                conversation = %self.conversation.id,
                fetched = fetched.len(),
                rendered = current,
                "merge skipped, no growth"
            );
            for message in fetched {
                if state.model.has(&message.id) {
                    let id = message.id.clone();
                    if state.model.upsert(message) == UpsertOutcome::ReadAtUpdated {
                        self.renderer.mark_read(&id);
                    }
                }
            }
            return MergeResult::empty();
        }

        let mut appended = Vec::new();
        for message in fetched {
            if state.rendered.contains(&message.id) {
                // Already painted (possibly an optimistic local append the
                // server is now echoing back); read marker may still move.
                let id = message.id.clone();
                if state.model.upsert(message) == UpsertOutcome::ReadAtUpdated {
                    self.renderer.mark_read(&id);
                }
                continue;
            }
            state.model.upsert(message.clone());
            state.rendered.record(message.id.clone());
            self.renderer.append(view_model(&message));
            appended.push(message);
        }

        info!(
            conversation = %self.conversation.id,
            appended = appended.len(),
            rendered = state.rendered.len(),
            "merged message page"
        );
        MergeResult {
            appended: appended.len(),
            messages: appended,
        }
    }

    /// Appends a server-confirmed message that arrived outside the poll
    /// path (upload pipeline result or socket push). Id-deduplicated, so a
    /// later poll echoing the same message is a no-op.
    pub fn record_local(&self, message: Message) -> bool {
        let mut state = self.state.lock();
        if state.rendered.contains(&message.id) {
            let id = message.id.clone();
            if state.model.upsert(message) == UpsertOutcome::ReadAtUpdated {
                self.renderer.mark_read(&id);
            }
            return false;
        }
        state.model.upsert(message.clone());
        state.rendered.record(message.id.clone());
        self.renderer.append(view_model(&message));
        true
    }

    /// Unread -> read transition, reflected in the renderer when it lands.
    pub fn mark_read(&self, message_id: &str, at: DateTime<Utc>) -> bool {
        let transitioned = self.state.lock().model.mark_read(message_id, at);
        if transitioned {
            self.renderer.mark_read(message_id);
        }
        transitioned
    }

    #[must_use]
    pub fn rendered_count(&self) -> usize {
        self.state.lock().rendered.len()
    }

    #[must_use]
    pub fn rendered_ids(&self) -> Vec<String> {
        self.state.lock().rendered.ids().to_vec()
    }

    /// Snapshot of the model in creation order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().model.list().into_iter().cloned().collect()
    }
}
