use std::fmt;

/// Chat / portal identifier (`<wa_id>@s.whatsapp.net`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

/// Remote participant id. For the Cloud API this is the raw phone-style id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Composite message id: `<chat>:<sender>:<local id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// A chat plus the raw id outbound messages are addressed `to`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatKey {
    pub chat_id: ChatId,
    pub receiver: String,
}

/// Room on the chat-protocol side a portal is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoomTarget(pub String);

/// Handle to content stored in the room-side media store (e.g. an `mxc://` URI).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentHandle(pub String);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl $ty {
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }
        )*
    };
}

display_inner!(ChatId, UserId, MessageId, RoomTarget, ContentHandle);

/// The registered binding between one cloud business account and one bridge identity.
///
/// Token fields are fixed at registration; rotation is not handled here.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub business_id: String,
    pub phone_id: String,
    pub access_token: String,
    pub app_name: String,
    pub bridge_identity: String,
    pub notice_room: Option<String>,
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("business_id", &self.business_id)
            .field("phone_id", &self.phone_id)
            .field("access_token", &mask_token(&self.access_token))
            .field("app_name", &self.app_name)
            .field("bridge_identity", &self.bridge_identity)
            .field("notice_room", &self.notice_room)
            .finish()
    }
}

/// Keep the first and last four characters of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}
