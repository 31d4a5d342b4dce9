//! Hexagonal ports.
//!
//! The room protocol, the cloud HTTP API and session storage all live behind
//! these traits; adapter crates implement them.

use async_trait::async_trait;

use crate::{
    config::PowerLevelDefaults,
    convert::NormalizedMessage,
    domain::{ChatKey, ContentHandle, LoginSession, RoomTarget, UserId},
    Result,
};

/// Response of the media metadata lookup (`GET /{media_id}`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaUrl {
    pub url: String,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub file_size: Option<u64>,
}

/// Multipart upload to the cloud media store.
#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Detected MIME type; sent as the file part's content type.
    pub mime_type: String,
    /// Coarse category sent as the `type` form field.
    pub category: String,
}

/// Fully built `POST /{phone_id}/messages` body.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundPayload {
    pub to: String,
    pub kind: &'static str,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn media_url(&self, session: &LoginSession, media_id: &str) -> Result<MediaUrl>;

    async fn download_media(&self, session: &LoginSession, url: &str) -> Result<Vec<u8>>;

    /// Returns the cloud media id.
    async fn upload_media(&self, session: &LoginSession, upload: MediaUpload) -> Result<String>;

    /// Returns the cloud-assigned message id.
    async fn send_message(&self, session: &LoginSession, payload: &OutboundPayload)
        -> Result<String>;
}

/// What the room store needs to find or create the room for a chat.
#[derive(Clone, Debug)]
pub struct PortalRequest {
    pub chat: ChatKey,
    pub name: String,
    pub remote_user: UserId,
    pub remote_name: Option<String>,
    pub login: String,
    pub power_levels: PowerLevelDefaults,
    pub default_user_level: i64,
}

#[derive(Clone, Debug)]
pub struct RoomUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Find the room bound to a chat, creating it exactly once if missing.
    async fn ensure_portal(&self, req: &PortalRequest) -> Result<RoomTarget>;

    async fn upload(&self, room: &RoomTarget, upload: RoomUpload) -> Result<ContentHandle>;

    async fn download(&self, handle: &ContentHandle) -> Result<Vec<u8>>;

    /// Post a human-visible notice into a room.
    async fn send_notice(&self, room: &RoomTarget, body: &str) -> Result<()>;
}

/// Per-room event queue that receives each converted message exactly once.
#[async_trait]
pub trait RoomEventQueue: Send + Sync {
    async fn queue(&self, room: &RoomTarget, message: NormalizedMessage) -> Result<()>;
}

/// Session persistence.
///
/// `insert` must enforce uniqueness of both business id and phone id at the
/// storage layer and fail with `Error::UniqueViolation` on conflict. Lookups
/// reject blank keys with `Error::MissingField`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_by_business_id(&self, business_id: &str) -> Result<Option<LoginSession>>;

    async fn find_by_phone_id(&self, phone_id: &str) -> Result<Option<LoginSession>>;

    async fn find_by_bridge_identity(&self, identity: &str) -> Result<Option<LoginSession>>;

    async fn insert(&self, session: LoginSession) -> Result<LoginSession>;

    /// Drop the session for `business_id`. Removing an absent session is not an error.
    async fn remove(&self, business_id: &str) -> Result<()>;
}

/// Binds a stored session to its bridge identity so dispatch can use it.
#[async_trait]
pub trait LoginBinder: Send + Sync {
    async fn bind(&self, session: &LoginSession) -> Result<()>;
}
