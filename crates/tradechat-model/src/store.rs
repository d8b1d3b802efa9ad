use crate::message::Message;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Outcome of a [`MessageModel::upsert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this id was seen.
    Inserted,
    /// Same id, only the read marker advanced.
    ReadAtUpdated,
    /// Identical payload, nothing changed.
    Unchanged,
}

/// Normalized in-memory message store for one conversation.
///
/// Append-only: messages are never removed during a session, matching the
/// server's append-only semantics. Content and attachments are write-once
/// per id; only `read_at` may transition after insert.
#[derive(Debug, Default)]
pub struct MessageModel {
    order: Vec<String>,
    by_id: HashMap<String, Message>,
}

impl MessageModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert-or-update. Re-inserting an identical message is a
    /// no-op; a changed `read_at` on a known id updates only that field.
    pub fn upsert(&mut self, message: Message) -> UpsertOutcome {
        match self.by_id.get_mut(&message.id) {
            None => {
                self.order.push(message.id.clone());
                self.by_id.insert(message.id.clone(), message);
                UpsertOutcome::Inserted
            }
            Some(existing) => {
                if existing.read_at.is_none() {
                    if let Some(at) = message.read_at {
                        existing.read_at = Some(at);
                        return UpsertOutcome::ReadAtUpdated;
                    }
                }
                UpsertOutcome::Unchanged
            }
        }
    }

    /// Unread -> read transition for a known message.
    pub fn mark_read(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        self.by_id.get_mut(id).is_some_and(|m| m.mark_read(at))
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.by_id.get(id)
    }

    /// Messages in insertion (creation-time) order.
    #[must_use]
    pub fn list(&self) -> Vec<&Message> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Ordered set of message ids currently painted by the renderer. The merge
/// baseline: grows monotonically during a session, reset only on
/// conversation switch.
#[derive(Debug, Default)]
pub struct RenderedSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl RenderedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an id as rendered. Returns false if it was already present.
    pub fn record(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push(id);
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Conversation switch: forget everything.
    pub fn reset(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Attachment, MessageKind};

    fn message(id: &str, content: &str) -> Message {
        Message::new(id, "c1", "u1", "u2", content, vec![], Utc::now())
    }

    #[test]
    fn upsert_identical_is_noop() {
        let mut model = MessageModel::new();
        let msg = message("m1", "hello");
        assert_eq!(model.upsert(msg.clone()), UpsertOutcome::Inserted);
        assert_eq!(model.upsert(msg), UpsertOutcome::Unchanged);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn upsert_updates_read_at_only() {
        let mut model = MessageModel::new();
        let msg = message("m1", "hello");
        model.upsert(msg.clone());

        let mut changed = message("m1", "REWRITTEN");
        changed.read_at = Some(Utc::now());
        assert_eq!(model.upsert(changed), UpsertOutcome::ReadAtUpdated);

        let stored = model.get("m1").unwrap();
        // content is write-once, only the read marker moved
        assert_eq!(stored.content, "hello");
        assert!(stored.read_at.is_some());
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut model = MessageModel::new();
        model.upsert(message("m2", "b"));
        model.upsert(message("m1", "a"));
        model.upsert(message("m3", "c"));
        let ids: Vec<&str> = model.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1", "m3"]);
    }

    #[test]
    fn mixed_message_round_trips_through_upsert() {
        let att = Attachment {
            url: "/files/x.png".into(),
            original_name: "x.png".into(),
            size: 10,
            mime_type: "image/png".into(),
        };
        let msg = Message::new("m1", "c1", "u1", "u2", "caption", vec![att], Utc::now());
        assert_eq!(msg.kind, MessageKind::Mixed);

        let mut model = MessageModel::new();
        model.upsert(msg.clone());
        model.upsert(msg);

        let stored = model.get("m1").unwrap();
        assert_eq!(stored.kind, MessageKind::Mixed);
        assert_eq!(stored.content, "caption");
        assert_eq!(stored.attachments.len(), 1);
    }

    #[test]
    fn rendered_set_dedups_and_resets() {
        let mut set = RenderedSet::new();
        assert!(set.record("m1"));
        assert!(!set.record("m1"));
        assert!(set.record("m2"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.ids(), &["m1".to_string(), "m2".to_string()]);

        set.reset();
        assert!(set.is_empty());
        assert!(set.record("m1"));
    }
}
