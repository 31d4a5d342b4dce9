//! Webhook JSON shape.
//!
//! Everything is `#[serde(default)]`: the sender is not under our control, and
//! shape validation happens in the dispatcher rather than in deserialization.

use serde::Deserialize;

use crate::router::MediaKind;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookEnvelope {
    pub object: String,
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Entry {
    /// Business account id.
    pub id: String,
    pub changes: Vec<Change>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeValue {
    pub messaging_product: String,
    pub metadata: Option<Metadata>,
    pub contacts: Vec<Contact>,
    pub messages: Vec<CloudMessage>,
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub profile: Profile,
    pub wa_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CloudMessage {
    pub from: String,
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub image: Option<MediaObject>,
    pub video: Option<MediaObject>,
    pub audio: Option<MediaObject>,
    pub document: Option<MediaObject>,
    pub sticker: Option<MediaObject>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextBody {
    pub body: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaObject {
    pub id: String,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
    pub animated: Option<bool>,
    pub voice: Option<bool>,
}

impl CloudMessage {
    /// The attachment object matching `kind`, if the sender included one.
    pub fn media(&self, kind: MediaKind) -> Option<&MediaObject> {
        match kind {
            MediaKind::Image => self.image.as_ref(),
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Document => self.document.as_ref(),
            MediaKind::Sticker => self.sticker.as_ref(),
        }
    }
}

impl ChangeValue {
    /// Contact profile whose `wa_id` is exactly `from`.
    pub fn contact_for(&self, from: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.wa_id == from)
    }
}
