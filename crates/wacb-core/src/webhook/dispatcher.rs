use std::{collections::HashMap, sync::Arc};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, PowerLevelDefaults},
    convert::{
        inbound::{convert_media, convert_text, convert_unknown, InboundMeta},
        NormalizedMessage,
    },
    domain::{LoginSession, MessageId, RoomTarget},
    errors::Error,
    formatting::{render_displayname, DisplaynameParams},
    identity::{make_chat_key, make_user_id},
    media::{MediaRelay, RelayDirection},
    ports::{PortalRequest, RoomEventQueue, RoomStore, SessionStore},
    router::{self, MediaKind, Route},
    Result,
};

use super::envelope::{ChangeValue, CloudMessage, WebhookEnvelope};

/// Result of one webhook delivery.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub business_id: Option<String>,
    /// Messages handed to the room event queue, in batch order.
    pub queued: Vec<MessageId>,
    /// Why processing stopped, if it did.
    pub error: Option<Error>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// HTTP response for the webhook sender. Always 200 so the sender never retries.
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookAck {
    pub status: u16,
    pub body: serde_json::Value,
}

pub struct WebhookEventDispatcher {
    sessions: Arc<dyn SessionStore>,
    rooms: Arc<dyn RoomStore>,
    queue: Arc<dyn RoomEventQueue>,
    relay: MediaRelay,
    displayname_template: String,
    power_levels: PowerLevelDefaults,
    default_user_level: i64,
    cancel: CancellationToken,
}

/// A single-entry, single-change envelope with at least one message.
struct ValidatedChange {
    business_id: String,
    value: ChangeValue,
}

impl WebhookEventDispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rooms: Arc<dyn RoomStore>,
        queue: Arc<dyn RoomEventQueue>,
        relay: MediaRelay,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            rooms,
            queue,
            relay,
            displayname_template: config.displayname_template.clone(),
            power_levels: config.power_levels.clone(),
            default_user_level: config.default_user_level,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight media fetches when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle a delivery and build the acknowledgement.
    pub async fn receive(&self, body: &[u8]) -> WebhookAck {
        let outcome = self.dispatch(body).await;
        let message = match &outcome.error {
            None => format!("dispatched {} message(s)", outcome.queued.len()),
            Some(e) => e.to_string(),
        };
        WebhookAck {
            status: 200,
            body: json!({ "message": message }),
        }
    }

    pub async fn dispatch(&self, body: &[u8]) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let change = match validate(body) {
            Ok(change) => change,
            Err(e) => {
                log_failure(&e, None);
                outcome.error = Some(e);
                return outcome;
            }
        };
        outcome.business_id = Some(change.business_id.clone());

        let session = match self.resolve_session(&change.business_id).await {
            Ok(session) => session,
            Err(e) => {
                log_failure(&e, Some(&change.business_id));
                outcome.error = Some(e);
                return outcome;
            }
        };

        let mut portals: HashMap<String, RoomTarget> = HashMap::new();
        for message in &change.value.messages {
            match self
                .handle_message(&session, &change.value, message, &mut portals)
                .await
            {
                Ok(id) => outcome.queued.push(id),
                Err(e) => {
                    log_failure(&e, Some(&change.business_id));
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        info!(
            business_id = %change.business_id,
            queued = outcome.queued.len(),
            total = change.value.messages.len(),
            "webhook dispatched"
        );
        outcome
    }

    async fn resolve_session(&self, business_id: &str) -> Result<LoginSession> {
        if business_id.trim().is_empty() {
            return Err(Error::UnregisteredAccount(business_id.to_string()));
        }
        self.sessions
            .find_by_business_id(business_id)
            .await?
            .ok_or_else(|| Error::UnregisteredAccount(business_id.to_string()))
    }

    async fn handle_message(
        &self,
        session: &LoginSession,
        value: &ChangeValue,
        message: &CloudMessage,
        portals: &mut HashMap<String, RoomTarget>,
    ) -> Result<MessageId> {
        if message.id.trim().is_empty() {
            return Err(Error::EmptyMessageData);
        }
        let route = router::route(&message.message_type)?;
        debug!(
            message_id = %message.id,
            kind = %message.message_type,
            from = %message.from,
            "routing message"
        );

        // Unlisted senders get their own chat and no profile name.
        let wa_id = message.from.as_str();
        let profile_name = value
            .contact_for(wa_id)
            .map(|c| c.profile.name.as_str())
            .filter(|n| !n.is_empty());

        let room = match portals.get(wa_id) {
            Some(room) => room.clone(),
            None => {
                let room = self
                    .ensure_portal(session, wa_id, &message.from, profile_name)
                    .await?;
                portals.insert(wa_id.to_string(), room.clone());
                room
            }
        };

        let chat = make_chat_key(wa_id);
        let meta = InboundMeta::new(&chat.chat_id, message, profile_name);
        let normalized = match route {
            Route::Text => match &message.text {
                Some(text) => convert_text(&meta, &text.body),
                None => convert_unknown(&meta),
            },
            Route::Media(kind) => self.relay_media(session, message, kind, &meta, &room).await?,
        };

        let id = normalized.id.clone();
        self.queue.queue(&room, normalized).await?;
        debug!(message_id = %id, room = %room, "queued message");
        Ok(id)
    }

    async fn relay_media(
        &self,
        session: &LoginSession,
        message: &CloudMessage,
        kind: MediaKind,
        meta: &InboundMeta,
        room: &RoomTarget,
    ) -> Result<NormalizedMessage> {
        let Some(media) = message.media(kind).filter(|m| !m.id.trim().is_empty()) else {
            warn!(
                message_id = %message.id,
                kind = kind.label(),
                "media message without media object"
            );
            return Ok(convert_unknown(meta));
        };

        let relayed = async {
            let bytes = self.relay.fetch(&media.id, session, &self.cancel).await?;
            self.relay.relay_to_room_store(bytes, room).await
        }
        .await;

        match relayed {
            Ok(descriptor) => Ok(convert_media(meta, kind, media, descriptor)),
            Err(e) => {
                if e.is_media_failure() {
                    self.relay
                        .notify_failure(room, RelayDirection::ToRoom, &e)
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn ensure_portal(
        &self,
        session: &LoginSession,
        wa_id: &str,
        from: &str,
        profile_name: Option<&str>,
    ) -> Result<RoomTarget> {
        let name = render_displayname(
            &self.displayname_template,
            &DisplaynameParams::for_contact(wa_id, profile_name),
        );
        let req = PortalRequest {
            chat: make_chat_key(wa_id),
            name,
            remote_user: make_user_id(from),
            remote_name: profile_name.map(str::to_string),
            login: session.bridge_identity.clone(),
            power_levels: self.power_levels.clone(),
            default_user_level: self.default_user_level,
        };
        self.rooms.ensure_portal(&req).await
    }
}

/// Envelope checks, in order: JSON, one entry, one change, some messages.
fn validate(body: &[u8]) -> Result<ValidatedChange> {
    let envelope: WebhookEnvelope =
        serde_json::from_slice(body).map_err(|e| Error::MalformedPayload(e.to_string()))?;

    let [entry] = <[_; 1]>::try_from(envelope.entry).map_err(|_| Error::MultipleEntries)?;
    let [change] = <[_; 1]>::try_from(entry.changes).map_err(|_| Error::MultipleChanges)?;
    if change.value.messages.is_empty() {
        return Err(Error::NoMessages);
    }

    Ok(ValidatedChange {
        business_id: entry.id,
        value: change.value,
    })
}

fn log_failure(err: &Error, business_id: Option<&str>) {
    let business_id = business_id.unwrap_or("-");
    if err.is_webhook_noise() {
        warn!(business_id, error = %err, "ignoring webhook");
    } else if matches!(err, Error::UnsupportedMessageType(_) | Error::EmptyMessageData) {
        warn!(business_id, error = %err, "stopped webhook batch");
    } else {
        error!(business_id, error = %err, "webhook dispatch failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        router::MessageKind,
        store::MemorySessionStore,
        testing::{session, FakeCloud, FakeQueue, FakeRooms, JPEG},
    };

    struct Harness {
        cloud: Arc<FakeCloud>,
        rooms: Arc<FakeRooms>,
        queue: Arc<FakeQueue>,
        dispatcher: WebhookEventDispatcher,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemorySessionStore::default());
        store.insert(session()).await.unwrap();
        let cloud = Arc::new(FakeCloud::default());
        let rooms = Arc::new(FakeRooms::default());
        let queue = Arc::new(FakeQueue::default());
        let config = Config::default();
        let relay = MediaRelay::new(cloud.clone(), rooms.clone(), config.max_file_size);
        let dispatcher =
            WebhookEventDispatcher::new(store, rooms.clone(), queue.clone(), relay, &config);
        Harness {
            cloud,
            rooms,
            queue,
            dispatcher,
        }
    }

    fn envelope(business_id: &str, messages: serde_json::Value) -> Vec<u8> {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": business_id,
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15550000000",
                            "phone_number_id": "P1"
                        },
                        "contacts": [{"profile": {"name": "Ada Lovelace"}, "wa_id": "5550001"}],
                        "messages": messages
                    }
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn text_message_end_to_end() {
        let h = harness().await;
        let body = envelope(
            "W1",
            json!([{"from":"5550001","id":"MID1","type":"text","text":{"body":"hi"}}]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        let queued = h.queue.messages();
        assert_eq!(queued.len(), 1);
        let (room, msg) = &queued[0];
        assert_eq!(room, "!5550001@s.whatsapp.net");
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.id.as_str(), "5550001@s.whatsapp.net:5550001:MID1");
        assert_eq!(outcome.queued, vec![msg.id.clone()]);

        let portals = h.rooms.portals();
        assert_eq!(portals.len(), 1);
        assert_eq!(portals[0].name, "Ada Lovelace (+5550001)");
        assert_eq!(portals[0].login, "@agent:example.org");
    }

    #[tokio::test]
    async fn media_message_fetches_then_relays() {
        let h = harness().await;
        h.cloud.put_media("MEDIA1", JPEG.to_vec());
        let body = envelope(
            "W1",
            json!([{"from":"5550001","id":"MID2","type":"image",
                    "image":{"id":"MEDIA1","mime_type":"image/jpeg"}}]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(
            h.cloud.calls(),
            vec![
                "media_url MEDIA1".to_string(),
                "download https://cdn.test/MEDIA1".to_string()
            ]
        );
        assert_eq!(h.rooms.uploads().len(), 1);

        let queued = h.queue.messages();
        assert_eq!(queued.len(), 1);
        let msg = &queued[0].1;
        assert_eq!(msg.kind, MessageKind::Image);
        let media = msg.media.as_ref().unwrap();
        assert_eq!(media.mime_type, "image/jpeg");
        assert!(media.content_handle().is_some());
    }

    #[tokio::test]
    async fn failed_room_upload_emits_notice_not_message() {
        let h = harness().await;
        h.cloud.put_media("MEDIA1", JPEG.to_vec());
        h.rooms.fail_uploads();
        let body = envelope(
            "W1",
            json!([{"from":"5550001","id":"MID2","type":"image",
                    "image":{"id":"MEDIA1","mime_type":"image/jpeg"}}]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(matches!(outcome.error, Some(Error::MediaUploadFailed(_))));
        assert!(h.queue.messages().is_empty());
        let notices = h.rooms.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, "!5550001@s.whatsapp.net");
        assert!(notices[0].1.starts_with("Failed to upload media from WhatsApp: "));
    }

    #[tokio::test]
    async fn two_entries_are_rejected_before_any_dispatch() {
        let h = harness().await;
        let text = |id: &str| json!({"from": "1", "id": id, "type": "text", "text": {"body": id}});
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [
                {"id": "W1", "changes": [{"value": {"messages": [text("A")]}}]},
                {"id": "W1", "changes": [{"value": {"messages": [text("B")]}}]}
            ]
        })
        .to_string();

        let outcome = h.dispatcher.dispatch(body.as_bytes()).await;

        assert!(matches!(outcome.error, Some(Error::MultipleEntries)));
        assert!(h.queue.messages().is_empty());
        assert!(h.rooms.portals().is_empty());
    }

    #[tokio::test]
    async fn shape_rejections() {
        let h = harness().await;

        let outcome = h.dispatcher.dispatch(&envelope("W1", json!([]))).await;
        assert!(matches!(outcome.error, Some(Error::NoMessages)));

        let outcome = h.dispatcher.dispatch(b"{not json").await;
        assert!(matches!(outcome.error, Some(Error::MalformedPayload(_))));

        let two_changes = json!({"entry": [{"id": "W1", "changes": [{}, {}]}]}).to_string();
        let outcome = h.dispatcher.dispatch(two_changes.as_bytes()).await;
        assert!(matches!(outcome.error, Some(Error::MultipleChanges)));

        let outcome = h.dispatcher.dispatch(br#"{"entry": []}"#).await;
        assert!(matches!(outcome.error, Some(Error::MultipleEntries)));
    }

    #[tokio::test]
    async fn unknown_account_is_acknowledged() {
        let h = harness().await;
        let body = envelope(
            "W9",
            json!([{"from":"5550001","id":"MID1","type":"text","text":{"body":"hi"}}]),
        );

        let ack = h.dispatcher.receive(&body).await;

        assert_eq!(ack.status, 200);
        assert_eq!(
            ack.body["message"],
            "no session registered for business account W9"
        );
        assert!(h.queue.messages().is_empty());
    }

    #[tokio::test]
    async fn unsupported_type_keeps_earlier_messages() {
        let h = harness().await;
        let body = envelope(
            "W1",
            json!([
                {"from":"5550001","id":"MID1","type":"text","text":{"body":"one"}},
                {"from":"5550001","id":"MID2","type":"reaction"},
                {"from":"5550001","id":"MID3","type":"text","text":{"body":"three"}}
            ]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(matches!(
            &outcome.error,
            Some(Error::UnsupportedMessageType(t)) if t == "reaction"
        ));
        assert_eq!(outcome.queued.len(), 1);
        let queued = h.queue.messages();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].1.body, "one");
    }

    #[tokio::test]
    async fn empty_message_id_stops_the_batch() {
        let h = harness().await;
        let body = envelope(
            "W1",
            json!([{"from":"5550001","id":"","type":"text","text":{"body":"hi"}}]),
        );
        let outcome = h.dispatcher.dispatch(&body).await;
        assert!(matches!(outcome.error, Some(Error::EmptyMessageData)));
        assert!(h.queue.messages().is_empty());
    }

    #[tokio::test]
    async fn media_without_object_becomes_notice() {
        let h = harness().await;
        let body = envelope("W1", json!([{"from":"5550001","id":"MID5","type":"video"}]));

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(outcome.is_success());
        let queued = h.queue.messages();
        assert_eq!(queued[0].1.kind, MessageKind::Unknown);
        assert!(h.cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn portal_is_resolved_once_per_batch() {
        let h = harness().await;
        let body = envelope(
            "W1",
            json!([
                {"from":"5550001","id":"MID1","type":"text","text":{"body":"a"}},
                {"from":"5550001","id":"MID2","type":"text","text":{"body":"b"}}
            ]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert_eq!(outcome.queued.len(), 2);
        assert_eq!(h.rooms.portals().len(), 1);
        let bodies: Vec<String> =
            h.queue.messages().into_iter().map(|(_, m)| m.body).collect();
        assert_eq!(bodies, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unlisted_sender_gets_own_portal_without_a_name() {
        let h = harness().await;
        let body = envelope(
            "W1",
            json!([
                {"from":"5550001","id":"MID1","type":"text","text":{"body":"from ada"}},
                {"from":"5559999","id":"MID2","type":"text","text":{"body":"from stranger"}}
            ]),
        );

        let outcome = h.dispatcher.dispatch(&body).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        let queued = h.queue.messages();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].0, "!5550001@s.whatsapp.net");
        assert_eq!(queued[0].1.sender_name.as_deref(), Some("Ada Lovelace"));

        let (room, msg) = &queued[1];
        assert_eq!(room, "!5559999@s.whatsapp.net");
        assert_eq!(msg.id.as_str(), "5559999@s.whatsapp.net:5559999:MID2");
        assert_eq!(msg.sender_name, None);

        let portals = h.rooms.portals();
        assert_eq!(portals.len(), 2);
        assert_eq!(portals[1].chat.receiver, "5559999");
        assert_eq!(portals[1].name, "+5559999");
        assert_eq!(portals[1].remote_name, None);
    }

    #[tokio::test]
    async fn cancelled_dispatch_aborts_media_fetch() {
        let h = harness().await;
        h.cloud.put_media("MEDIA1", JPEG.to_vec());
        let token = CancellationToken::new();
        token.cancel();
        let dispatcher = h.dispatcher.with_cancellation(token);
        let body = envelope(
            "W1",
            json!([{"from":"5550001","id":"MID2","type":"image","image":{"id":"MEDIA1"}}]),
        );

        let outcome = dispatcher.dispatch(&body).await;

        assert!(matches!(outcome.error, Some(Error::MediaFetchFailed { .. })));
        assert!(h.cloud.calls().is_empty());
        assert!(h.queue.messages().is_empty());
        assert_eq!(h.rooms.notices().len(), 1);
    }
}
