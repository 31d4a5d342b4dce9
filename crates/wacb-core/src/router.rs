//! Message kind classification.
//!
//! Classification only looks at the explicit `type` tag; the payload shape is
//! never sniffed to guess a kind.

use std::fmt;

use crate::{errors::Error, Result};

/// Kinds of inbound cloud messages the bridge understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    /// Converted into a notice pointing at the native app.
    Unknown,
}

/// Kinds that carry an attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// Coarse media tag required by the cloud upload / send APIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

/// Conversion path picked for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Text,
    Media(MediaKind),
}

pub fn route(message_type: &str) -> Result<Route> {
    match message_type {
        "text" => Ok(Route::Text),
        "image" => Ok(Route::Media(MediaKind::Image)),
        "video" => Ok(Route::Media(MediaKind::Video)),
        "audio" => Ok(Route::Media(MediaKind::Audio)),
        "document" => Ok(Route::Media(MediaKind::Document)),
        "sticker" => Ok(Route::Media(MediaKind::Sticker)),
        other => Err(Error::UnsupportedMessageType(other.to_string())),
    }
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }

    /// Stickers are shown as images on the room side.
    pub fn category(self) -> MediaCategory {
        match self {
            MediaKind::Image | MediaKind::Sticker => MediaCategory::Image,
            MediaKind::Video => MediaCategory::Video,
            MediaKind::Audio => MediaCategory::Audio,
            MediaKind::Document => MediaCategory::Document,
        }
    }
}

impl From<MediaKind> for MessageKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => MessageKind::Image,
            MediaKind::Video => MessageKind::Video,
            MediaKind::Audio => MessageKind::Audio,
            MediaKind::Document => MessageKind::Document,
            MediaKind::Sticker => MessageKind::Sticker,
        }
    }
}

impl MediaCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Document => "document",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
