//! Data model for the trade chat subsystem.
//!
//! Pure types shared between the sync client and whatever UI layer consumes
//! it: conversations, messages, attachments, the in-memory message store and
//! the socket event vocabulary. No I/O happens in this crate.

pub mod events;
pub mod message;
pub mod store;

pub use events::{BreakerState, BreakerStatus, SocketEvent};
pub use message::{
    view_model, Attachment, AttachmentView, Conversation, ConversationKind, Message, MessageKind,
    MessageView,
};
pub use store::{MessageModel, RenderedSet, UpsertOutcome};
