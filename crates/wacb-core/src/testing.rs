//! Hand-written port fakes shared by the unit tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    convert::NormalizedMessage,
    domain::{ContentHandle, LoginSession, RoomTarget},
    errors::Error,
    ports::{
        CloudApi, LoginBinder, MediaUpload, MediaUrl, OutboundPayload, PortalRequest,
        RoomEventQueue, RoomStore, RoomUpload,
    },
    Result,
};

/// A JFIF header; enough for sniffing.
pub const JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01,
];

pub fn session() -> LoginSession {
    LoginSession {
        business_id: "W1".into(),
        phone_id: "P1".into(),
        access_token: "EAAGtokentokentoken".into(),
        app_name: "Support line".into(),
        bridge_identity: "@agent:example.org".into(),
        notice_room: None,
    }
}

#[derive(Default)]
pub struct FakeCloud {
    media: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<MediaUpload>>,
    sent: Mutex<Vec<OutboundPayload>>,
    fail_downloads: Mutex<bool>,
}

impl FakeCloud {
    pub fn put_media(&self, id: &str, bytes: Vec<u8>) {
        self.media.lock().unwrap().insert(id.to_string(), bytes);
    }

    pub fn fail_downloads(&self) {
        *self.fail_downloads.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<MediaUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<OutboundPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn media_url(&self, _session: &LoginSession, media_id: &str) -> Result<MediaUrl> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("media_url {media_id}"));
        let media = self.media.lock().unwrap();
        let bytes = media
            .get(media_id)
            .ok_or_else(|| Error::External(format!("unknown media id {media_id}")))?;
        Ok(MediaUrl {
            url: format!("https://cdn.test/{media_id}"),
            mime_type: None,
            sha256: None,
            file_size: Some(bytes.len() as u64),
        })
    }

    async fn download_media(&self, _session: &LoginSession, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(format!("download {url}"));
        if *self.fail_downloads.lock().unwrap() {
            return Err(Error::External("status 500".into()));
        }
        let id = url.rsplit('/').next().unwrap_or_default();
        self.media
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::External("status 404".into()))
    }

    async fn upload_media(&self, _session: &LoginSession, upload: MediaUpload) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(upload);
        Ok(format!("UPLOADED{}", uploads.len()))
    }

    async fn send_message(
        &self,
        _session: &LoginSession,
        payload: &OutboundPayload,
    ) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(payload.clone());
        Ok(format!("wamid.SENT{}", sent.len()))
    }
}

#[derive(Default)]
pub struct FakeRooms {
    portals: Mutex<Vec<PortalRequest>>,
    uploads: Mutex<Vec<RoomUpload>>,
    content: Mutex<HashMap<String, Vec<u8>>>,
    notices: Mutex<Vec<(String, String)>>,
    fail_uploads: Mutex<bool>,
}

impl FakeRooms {
    pub fn put_content(&self, handle: &str, bytes: Vec<u8>) {
        self.content
            .lock()
            .unwrap()
            .insert(handle.to_string(), bytes);
    }

    pub fn fail_uploads(&self) {
        *self.fail_uploads.lock().unwrap() = true;
    }

    pub fn portals(&self) -> Vec<PortalRequest> {
        self.portals.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RoomUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(String, String)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoomStore for FakeRooms {
    async fn ensure_portal(&self, req: &PortalRequest) -> Result<RoomTarget> {
        self.portals.lock().unwrap().push(req.clone());
        Ok(RoomTarget(format!("!{}", req.chat.chat_id)))
    }

    async fn upload(&self, _room: &RoomTarget, upload: RoomUpload) -> Result<ContentHandle> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(Error::External("upload refused".into()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(upload);
        Ok(ContentHandle(format!("mxc://example.org/{}", uploads.len())))
    }

    async fn download(&self, handle: &ContentHandle) -> Result<Vec<u8>> {
        self.content
            .lock()
            .unwrap()
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| Error::External(format!("no content at {handle}")))
    }

    async fn send_notice(&self, room: &RoomTarget, body: &str) -> Result<()> {
        self.notices
            .lock()
            .unwrap()
            .push((room.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeQueue {
    messages: Mutex<Vec<(String, NormalizedMessage)>>,
}

impl FakeQueue {
    pub fn messages(&self) -> Vec<(String, NormalizedMessage)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoomEventQueue for FakeQueue {
    async fn queue(&self, room: &RoomTarget, message: NormalizedMessage) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((room.to_string(), message));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBinder {
    bound: Mutex<Vec<String>>,
    fail_binds: Mutex<bool>,
}

impl FakeBinder {
    pub fn bound(&self) -> Vec<String> {
        self.bound.lock().unwrap().clone()
    }

    pub fn fail_binds(&self) {
        *self.fail_binds.lock().unwrap() = true;
    }
}

#[async_trait]
impl LoginBinder for FakeBinder {
    async fn bind(&self, session: &LoginSession) -> Result<()> {
        if *self.fail_binds.lock().unwrap() {
            return Err(Error::External("bind down".into()));
        }
        self.bound
            .lock()
            .unwrap()
            .push(session.business_id.clone());
        Ok(())
    }
}
