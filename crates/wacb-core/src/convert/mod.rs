//! Translation between cloud messages and room messages.

pub mod inbound;
pub mod outbound;

use chrono::{DateTime, Utc};

use crate::{
    domain::{MessageId, UserId},
    media::MediaDescriptor,
    router::MessageKind,
};

pub use inbound::InboundMeta;
pub use outbound::{OutboundKind, OutboundSender, RoomMessage, SendReceipt};

/// Protocol-neutral inbound message, handed to the room event queue once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// `<chat>:<sender>:<remote id>`.
    pub id: MessageId,
    pub kind: MessageKind,
    pub sender: UserId,
    pub sender_name: Option<String>,
    pub sender_device_id: u16,
    /// Cloud-assigned message id.
    pub remote_id: String,
    pub timestamp: DateTime<Utc>,
    /// Text body, media caption, or notice text.
    pub body: String,
    pub file_name: Option<String>,
    pub media: Option<MediaDescriptor>,
}
