use std::fmt;

/// Which of the two media download round trips failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStep {
    /// `GET /{media_id}` resolving the short-lived download URL.
    Metadata,
    /// `GET <url>` retrieving the bytes.
    Content,
}

impl fmt::Display for FetchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStep::Metadata => f.write_str("metadata lookup"),
            FetchStep::Content => f.write_str("content download"),
        }
    }
}

/// Core error type for the bridge.
///
/// Adapter crates map their transport errors into this type so the dispatcher
/// can decide between "acknowledge and log" and "surface to a human".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Webhook shape.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("webhook must carry exactly one entry")]
    MultipleEntries,

    #[error("webhook entry must carry exactly one change")]
    MultipleChanges,

    #[error("webhook change contains no messages")]
    NoMessages,

    #[error("message data is empty")]
    EmptyMessageData,

    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("no session registered for business account {0}")]
    UnregisteredAccount(String),

    // Media.
    #[error("media fetch failed during {step}: {reason}")]
    MediaFetchFailed { step: FetchStep, reason: String },

    #[error("media upload failed: {0}")]
    MediaUploadFailed(String),

    #[error("media data is empty")]
    EmptyMedia,

    #[error("media is too large: {size} bytes (max {max})")]
    MediaTooLarge { size: usize, max: usize },

    // Identifiers.
    #[error("invalid message id format: {0}")]
    InvalidFormat(String),

    #[error("synthetic message id: {0}")]
    SyntheticId(String),

    // Registration.
    #[error("business account id and phone id cannot be the same")]
    IdentityCollision,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    // Outbound.
    #[error("sending to status broadcast is disabled")]
    StatusBroadcastDisabled,

    #[error("webhook verification failed: {0}")]
    VerificationFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors that are expected steady-state noise from the webhook sender.
    ///
    /// These are acknowledged with a success status and logged at WARN.
    pub fn is_webhook_noise(&self) -> bool {
        matches!(
            self,
            Error::MalformedPayload(_)
                | Error::MultipleEntries
                | Error::MultipleChanges
                | Error::NoMessages
                | Error::UnregisteredAccount(_)
        )
    }

    /// Errors that lose content for a human and must be announced in the room.
    pub fn is_media_failure(&self) -> bool {
        matches!(
            self,
            Error::MediaFetchFailed { .. }
                | Error::MediaUploadFailed(_)
                | Error::EmptyMedia
                | Error::MediaTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
