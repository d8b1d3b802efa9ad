use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation is bound to either a marketplace order or a product
/// inquiry. Immutable for the lifetime of a chat view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub participant_a_id: String,
    pub participant_b_id: String,
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        kind: ConversationKind,
        participant_a_id: impl Into<String>,
        participant_b_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            participant_a_id: participant_a_id.into(),
            participant_b_id: participant_b_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Order,
    Inquiry,
}

impl ConversationKind {
    /// Path segment the REST API roots message endpoints under.
    #[must_use]
    pub fn root_path(&self) -> &'static str {
        match self {
            ConversationKind::Order => "order",
            ConversationKind::Inquiry => "inquiry",
        }
    }

    /// Inquiry conversations are point-in-time loads; only order
    /// conversations run background polling.
    #[must_use]
    pub fn polls(&self) -> bool {
        matches!(self, ConversationKind::Order)
    }
}

/// File attached to a message. Owned by exactly one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
}

impl Attachment {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Derived message kind. Never hand-set: `mixed` iff both text and
/// attachments are present, `image`/`file` iff attachments only, `text`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Mixed,
}

impl MessageKind {
    #[must_use]
    pub fn derive(content: &str, attachments: &[Attachment]) -> Self {
        match (!content.is_empty(), !attachments.is_empty()) {
            (true, true) => MessageKind::Mixed,
            (false, true) => {
                if attachments.iter().all(Attachment::is_image) {
                    MessageKind::Image
                } else {
                    MessageKind::File
                }
            }
            _ => MessageKind::Text,
        }
    }
}

/// A single chat message. Append-only from the client's point of view: the
/// id is stable once rendered and only `read_at` may transition afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MessageWire")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let kind = MessageKind::derive(&content, &attachments);
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            content,
            attachments,
            created_at,
            read_at: None,
            kind,
        }
    }

    #[must_use]
    pub fn with_read_at(mut self, read_at: Option<DateTime<Utc>>) -> Self {
        self.read_at = read_at;
        self
    }

    /// Unread -> read transition. Returns false if the message was already
    /// read (the first timestamp wins).
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(at);
        true
    }
}

/// Wire shape for a message. The server may carry its own `type` field; it
/// is ignored and the kind is re-derived so it can never disagree with the
/// content/attachment invariant.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageWire {
    id: String,
    conversation_id: String,
    sender_id: String,
    recipient_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    read_at: Option<DateTime<Utc>>,
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        Message::new(
            wire.id,
            wire.conversation_id,
            wire.sender_id,
            wire.recipient_id,
            wire.content,
            wire.attachments,
            wire.created_at,
        )
        .with_read_at(wire.read_at)
    }
}

/// Render-ready projection of a message. The only thing a renderer sink
/// consumes; keeps the model testable without any UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub body: String,
    pub attachments: Vec<AttachmentView>,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentView {
    pub url: String,
    pub label: String,
    pub is_image: bool,
}

/// Pure `Message -> MessageView` projection.
#[must_use]
pub fn view_model(message: &Message) -> MessageView {
    MessageView {
        id: message.id.clone(),
        sender_id: message.sender_id.clone(),
        body: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| AttachmentView {
                url: a.url.clone(),
                label: a.original_name.clone(),
                is_image: a.is_image(),
            })
            .collect(),
        sent_at: message.created_at,
        read: message.read_at.is_some(),
        kind: message.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str) -> Attachment {
        Attachment {
            url: "/files/a1".into(),
            original_name: "a1.bin".into(),
            size: 128,
            mime_type: mime.into(),
        }
    }

    #[test]
    fn kind_derivation_is_total() {
        assert_eq!(MessageKind::derive("", &[]), MessageKind::Text);
        assert_eq!(MessageKind::derive("hi", &[]), MessageKind::Text);
        assert_eq!(
            MessageKind::derive("", &[attachment("image/png")]),
            MessageKind::Image
        );
        assert_eq!(
            MessageKind::derive("", &[attachment("application/pdf")]),
            MessageKind::File
        );
        assert_eq!(
            MessageKind::derive("hi", &[attachment("image/png")]),
            MessageKind::Mixed
        );
    }

    #[test]
    fn mixed_attachment_set_is_file() {
        let atts = vec![attachment("image/png"), attachment("application/zip")];
        assert_eq!(MessageKind::derive("", &atts), MessageKind::File);
    }

    #[test]
    fn wire_deserialization_rederives_kind() {
        let json = r#"{
            "id": "m1",
            "conversationId": "c1",
            "senderId": "u1",
            "recipientId": "u2",
            "content": "here is the invoice",
            "attachments": [{
                "url": "/files/inv.pdf",
                "originalName": "inv.pdf",
                "size": 2048,
                "mimeType": "application/pdf"
            }],
            "createdAt": "2026-01-10T12:00:00Z",
            "readAt": null
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Mixed);
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.content, "here is the invoice");
    }

    #[test]
    fn mark_read_is_first_write_wins() {
        let mut msg = Message::new("m1", "c1", "u1", "u2", "hi", vec![], Utc::now());
        let first = Utc::now();
        assert!(msg.mark_read(first));
        assert!(!msg.mark_read(Utc::now()));
        assert_eq!(msg.read_at, Some(first));
    }

    #[test]
    fn view_model_projects_mixed_parts() {
        let msg = Message::new(
            "m1",
            "c1",
            "u1",
            "u2",
            "spec sheet attached",
            vec![attachment("image/jpeg")],
            Utc::now(),
        );
        let view = view_model(&msg);
        assert_eq!(view.kind, MessageKind::Mixed);
        assert_eq!(view.body, "spec sheet attached");
        assert_eq!(view.attachments.len(), 1);
        assert!(view.attachments[0].is_image);
        assert!(!view.read);
    }
}
