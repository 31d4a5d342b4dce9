use chrono::{DateTime, TimeZone, Utc};

use crate::{
    domain::{ChatId, UserId},
    formatting::UNKNOWN_MESSAGE_NOTICE,
    identity::{make_message_id, make_user_id, sender_device_id},
    media::MediaDescriptor,
    router::{MediaKind, MessageKind},
    webhook::envelope::{CloudMessage, MediaObject},
};

use super::NormalizedMessage;

/// Fields shared by every inbound conversion of one cloud message.
#[derive(Clone, Debug)]
pub struct InboundMeta {
    pub chat: ChatId,
    pub sender: UserId,
    pub sender_name: Option<String>,
    pub remote_id: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundMeta {
    pub fn new(chat: &ChatId, message: &CloudMessage, sender_name: Option<&str>) -> Self {
        Self {
            chat: chat.clone(),
            sender: make_user_id(&message.from),
            sender_name: sender_name.filter(|n| !n.trim().is_empty()).map(str::to_string),
            remote_id: message.id.clone(),
            timestamp: parse_timestamp(&message.timestamp),
        }
    }

    fn build(&self, kind: MessageKind, body: String) -> NormalizedMessage {
        NormalizedMessage {
            id: make_message_id(&self.chat, &self.sender, &self.remote_id),
            kind,
            sender: self.sender.clone(),
            sender_name: self.sender_name.clone(),
            sender_device_id: sender_device_id(self.sender.as_str()),
            remote_id: self.remote_id.clone(),
            timestamp: self.timestamp,
            body,
            file_name: None,
            media: None,
        }
    }
}

/// RFC 3339 first, then unix seconds (what the cloud actually sends).
///
/// Anything else yields the zero time; a bad timestamp never rejects a message.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}

pub fn convert_text(meta: &InboundMeta, body: &str) -> NormalizedMessage {
    meta.build(MessageKind::Text, body.to_string())
}

/// Build the message for an attachment already relayed to the room store.
pub fn convert_media(
    meta: &InboundMeta,
    kind: MediaKind,
    media: &MediaObject,
    mut descriptor: MediaDescriptor,
) -> NormalizedMessage {
    let body = media.caption.clone().unwrap_or_default();

    let source_name = media
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let file_name = match (kind, source_name) {
        (MediaKind::Document, Some(name)) => name.to_string(),
        _ => format!("{}.{}", kind.label(), descriptor.extension),
    };

    if descriptor.declared_mime.is_none() {
        descriptor.declared_mime = media.mime_type.clone();
    }

    let mut msg = meta.build(kind.into(), body);
    msg.file_name = Some(file_name);
    msg.media = Some(descriptor);
    msg
}

/// Notice pointing the user at the native app.
pub fn convert_unknown(meta: &InboundMeta) -> NormalizedMessage {
    meta.build(MessageKind::Unknown, UNKNOWN_MESSAGE_NOTICE.to_string())
}
