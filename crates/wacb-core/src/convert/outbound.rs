use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::{
    config::Config,
    domain::{ChatKey, ContentHandle, LoginSession, MessageId, RoomTarget, UserId},
    errors::Error,
    identity::{make_message_id, make_user_id},
    media::{MediaRelay, RelayDirection},
    ports::{CloudApi, OutboundPayload},
    Result,
};

pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Outbound kinds the cloud API accepts from the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutboundKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl OutboundKind {
    /// Cloud `type` tag and payload key.
    pub fn as_str(self) -> &'static str {
        match self {
            OutboundKind::Text => "text",
            OutboundKind::Image => "image",
            OutboundKind::Video => "video",
            OutboundKind::Audio => "audio",
            OutboundKind::Document => "document",
        }
    }

    pub fn is_media(self) -> bool {
        !matches!(self, OutboundKind::Text)
    }
}

impl TryFrom<&str> for OutboundKind {
    type Error = Error;

    /// Room-protocol message type tag (`m.text`, `m.image`, ...).
    fn try_from(msgtype: &str) -> Result<Self> {
        match msgtype {
            "m.text" => Ok(OutboundKind::Text),
            "m.image" => Ok(OutboundKind::Image),
            "m.video" => Ok(OutboundKind::Video),
            "m.audio" => Ok(OutboundKind::Audio),
            "m.file" => Ok(OutboundKind::Document),
            other => Err(Error::UnsupportedMessageType(other.to_string())),
        }
    }
}

/// A message posted in a portal room, on its way to the cloud.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomMessage {
    pub event_id: String,
    /// Room-side sender (may contain `:`; never part of a composite id).
    pub sender: String,
    pub msgtype: String,
    pub body: String,
    pub file_name: Option<String>,
    pub url: Option<ContentHandle>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    /// `<chat>:<phone id>:<cloud id>`.
    pub message_id: MessageId,
    pub cloud_id: String,
    pub kind: OutboundKind,
    pub room_sender: String,
}

pub fn text_payload(to: &str, body: &str) -> OutboundPayload {
    build_payload(
        to,
        OutboundKind::Text,
        json!({ "preview_url": false, "body": body }),
    )
}

pub fn media_payload(
    to: &str,
    kind: OutboundKind,
    media_id: &str,
    caption: Option<&str>,
    file_name: Option<&str>,
) -> OutboundPayload {
    let mut data = Map::new();
    data.insert("id".to_string(), Value::from(media_id));
    // Voice notes and audio clips cannot carry a caption.
    if kind != OutboundKind::Audio {
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            data.insert("caption".to_string(), Value::from(caption));
        }
    }
    if kind == OutboundKind::Document {
        if let Some(name) = file_name.filter(|n| !n.is_empty()) {
            data.insert("filename".to_string(), Value::from(name));
        }
    }
    build_payload(to, kind, Value::Object(data))
}

fn build_payload(to: &str, kind: OutboundKind, data: Value) -> OutboundPayload {
    let mut body = Map::new();
    body.insert("messaging_product".to_string(), Value::from("whatsapp"));
    body.insert("recipient_type".to_string(), Value::from("individual"));
    body.insert("to".to_string(), Value::from(to));
    body.insert("type".to_string(), Value::from(kind.as_str()));
    body.insert(kind.as_str().to_string(), data);
    OutboundPayload {
        to: to.to_string(),
        kind: kind.as_str(),
        body: Value::Object(body),
    }
}

pub struct OutboundSender {
    cloud: Arc<dyn CloudApi>,
    relay: MediaRelay,
    disable_status_broadcast_send: bool,
}

impl OutboundSender {
    pub fn new(cloud: Arc<dyn CloudApi>, relay: MediaRelay, config: &Config) -> Self {
        Self {
            cloud,
            relay,
            disable_status_broadcast_send: config.disable_status_broadcast_send,
        }
    }

    /// Build the cloud request body, relaying media first when needed.
    ///
    /// A relay failure posts a notice into `room` and aborts the conversion.
    pub async fn convert(
        &self,
        msg: &RoomMessage,
        chat: &ChatKey,
        session: &LoginSession,
        room: &RoomTarget,
    ) -> Result<(OutboundKind, OutboundPayload)> {
        let kind = OutboundKind::try_from(msg.msgtype.as_str())?;

        if self.disable_status_broadcast_send && chat.receiver == STATUS_BROADCAST {
            return Err(Error::StatusBroadcastDisabled);
        }

        if !kind.is_media() {
            return Ok((kind, text_payload(&chat.receiver, &msg.body)));
        }

        let Some(handle) = msg.url.as_ref().filter(|h| !h.as_str().is_empty()) else {
            let err = Error::MissingField("url");
            self.relay
                .notify_failure(room, RelayDirection::ToCloud, &err)
                .await;
            return Err(err);
        };

        let media_id = match self.relay.relay_handle_to_cloud(handle, session).await {
            Ok((media_id, _)) => media_id,
            Err(err) => {
                self.relay
                    .notify_failure(room, RelayDirection::ToCloud, &err)
                    .await;
                return Err(err);
            }
        };

        let payload = media_payload(
            &chat.receiver,
            kind,
            &media_id,
            Some(msg.body.as_str()),
            msg.file_name.as_deref(),
        );
        Ok((kind, payload))
    }

    pub async fn send(
        &self,
        msg: &RoomMessage,
        chat: &ChatKey,
        session: &LoginSession,
        room: &RoomTarget,
    ) -> Result<SendReceipt> {
        let (kind, payload) = self.convert(msg, chat, session, room).await?;

        let cloud_id = self
            .cloud
            .send_message(session, &payload)
            .await
            .inspect_err(|e| {
                error!(
                    event_id = %msg.event_id,
                    to = %chat.receiver,
                    error = %e,
                    "cloud send failed"
                )
            })?;

        let sender: UserId = make_user_id(&session.phone_id);
        let message_id = make_message_id(&chat.chat_id, &sender, &cloud_id);
        info!(
            event_id = %msg.event_id,
            message_id = %message_id,
            kind = kind.as_str(),
            "sent message to cloud"
        );

        Ok(SendReceipt {
            message_id,
            cloud_id,
            kind,
            room_sender: msg.sender.clone(),
        })
    }
}
