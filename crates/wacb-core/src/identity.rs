//! Composite identifiers shared by both sides of the bridge.
//!
//! Nothing here is persisted as an object; ids are recomputed on demand and
//! must stay stable across restarts.

use crate::{
    domain::{ChatId, ChatKey, MessageId, UserId},
    errors::Error,
    Result,
};

pub const DELIMITER: char = ':';
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Local ids starting with this marker belong to synthetic/test messages.
const SYNTHETIC_MARKER: &str = "fake";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMessageId {
    pub chat: ChatId,
    pub sender: UserId,
    pub local_id: String,
}

pub fn make_chat_id(account_key: &str) -> ChatId {
    ChatId(format!("{account_key}@{USER_SERVER}"))
}

pub fn make_chat_key(account_key: &str) -> ChatKey {
    ChatKey {
        chat_id: make_chat_id(account_key),
        receiver: account_key.to_string(),
    }
}

/// Recover the raw account key from a chat id built by [`make_chat_id`].
pub fn parse_chat_id(chat: &ChatId) -> &str {
    chat.0
        .strip_suffix(USER_SERVER)
        .and_then(|s| s.strip_suffix('@'))
        .unwrap_or(&chat.0)
}

pub fn make_user_id(raw: &str) -> UserId {
    UserId(raw.to_string())
}

/// Join `(chat, sender, local id)` into one id.
///
/// Callers guarantee none of the parts contains [`DELIMITER`]; ids issued by the
/// Cloud API never do.
pub fn make_message_id(chat: &ChatId, sender: &UserId, local_id: &str) -> MessageId {
    MessageId(format!(
        "{}{DELIMITER}{}{DELIMITER}{local_id}",
        chat.0, sender.0
    ))
}

pub fn parse_message_id(id: &MessageId) -> Result<ParsedMessageId> {
    let parts: Vec<&str> = id.0.split(DELIMITER).collect();
    let [chat, sender, local_id] = parts.as_slice() else {
        return Err(Error::InvalidFormat(id.0.clone()));
    };

    if *chat == SYNTHETIC_MARKER || is_synthetic(local_id) {
        return Err(Error::SyntheticId(id.0.clone()));
    }

    Ok(ParsedMessageId {
        chat: ChatId(chat.to_string()),
        sender: UserId(sender.to_string()),
        local_id: local_id.to_string(),
    })
}

fn is_synthetic(local_id: &str) -> bool {
    local_id
        .get(..SYNTHETIC_MARKER.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SYNTHETIC_MARKER))
}

/// Sender ordinal stored with each message; 0 unless the sender is a small number.
pub fn sender_device_id(sender: &str) -> u16 {
    sender.trim().parse::<u16>().unwrap_or(0)
}
