use std::{fmt::Write as _, sync::Arc};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    domain::{ContentHandle, LoginSession, RoomTarget},
    errors::{Error, FetchStep},
    ports::{CloudApi, MediaUpload, RoomStore, RoomUpload},
    router::MediaCategory,
    Result,
};

use super::sniff::{category_for, detect_type, extension_for};

/// Where the bytes of an attachment live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaSource {
    Inline(Vec<u8>),
    Remote(ContentHandle),
}

/// Metadata plus location of one attachment.
///
/// `mime_type` is always sniffed from the content; `declared_mime` is whatever
/// the sender claimed and is kept for logging only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub source: MediaSource,
    pub mime_type: String,
    pub extension: String,
    pub category: MediaCategory,
    pub size: usize,
    pub sha256: String,
    pub declared_mime: Option<String>,
}

impl MediaDescriptor {
    pub fn inline(bytes: Vec<u8>) -> Self {
        let mut desc = Self::describe(&bytes);
        desc.source = MediaSource::Inline(bytes);
        desc
    }

    fn describe(bytes: &[u8]) -> Self {
        let mime_type = detect_type(bytes).to_string();
        Self {
            source: MediaSource::Inline(Vec::new()),
            extension: extension_for(&mime_type),
            category: category_for(&mime_type),
            mime_type,
            size: bytes.len(),
            sha256: sha256_hex(bytes),
            declared_mime: None,
        }
    }

    pub fn content_handle(&self) -> Option<&ContentHandle> {
        match &self.source {
            MediaSource::Remote(handle) => Some(handle),
            MediaSource::Inline(_) => None,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Which way media was travelling when a failure notice is posted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayDirection {
    ToRoom,
    ToCloud,
}

#[derive(Clone)]
pub struct MediaRelay {
    cloud: Arc<dyn CloudApi>,
    rooms: Arc<dyn RoomStore>,
    max_file_size: usize,
}

impl MediaRelay {
    pub fn new(cloud: Arc<dyn CloudApi>, rooms: Arc<dyn RoomStore>, max_file_size: usize) -> Self {
        Self {
            cloud,
            rooms,
            max_file_size,
        }
    }

    /// Download cloud media: metadata lookup for the ephemeral URL, then the content.
    ///
    /// Cancelling `cancel` aborts whichever request is in flight; the request
    /// future is dropped, which releases its connection.
    pub async fn fetch(
        &self,
        media_id: &str,
        session: &LoginSession,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let meta = tokio::select! {
          biased;
          _ = cancel.cancelled() => return Err(cancelled(FetchStep::Metadata)),
          res = self.cloud.media_url(session, media_id) => {
            res.map_err(|e| fetch_failed(FetchStep::Metadata, e))?
          }
        };

        if meta.url.trim().is_empty() {
            return Err(Error::MediaFetchFailed {
                step: FetchStep::Metadata,
                reason: "response carried no download url".to_string(),
            });
        }
        if let Some(size) = meta.file_size {
            let size = usize::try_from(size).unwrap_or(usize::MAX);
            if size > self.max_file_size {
                return Err(Error::MediaTooLarge {
                    size,
                    max: self.max_file_size,
                });
            }
        }

        let bytes = tokio::select! {
          biased;
          _ = cancel.cancelled() => return Err(cancelled(FetchStep::Content)),
          res = self.cloud.download_media(session, &meta.url) => {
            res.map_err(|e| fetch_failed(FetchStep::Content, e))?
          }
        };

        self.check_size(bytes.len())?;
        debug!(media_id, size = bytes.len(), "fetched cloud media");
        Ok(bytes)
    }

    /// Upload bytes to the room-side media store.
    pub async fn relay_to_room_store(
        &self,
        bytes: Vec<u8>,
        room: &RoomTarget,
    ) -> Result<MediaDescriptor> {
        if bytes.is_empty() {
            return Err(Error::EmptyMedia);
        }
        self.check_size(bytes.len())?;

        let mut desc = MediaDescriptor::describe(&bytes);
        let upload = RoomUpload {
            file_name: format!("whatsapp-media-{}.{}", bytes.len(), desc.extension),
            mime_type: desc.mime_type.clone(),
            bytes,
        };

        let handle = self
            .rooms
            .upload(room, upload)
            .await
            .map_err(upload_failed)?;

        info!(
            room = %room,
            handle = %handle,
            mime = %desc.mime_type,
            "relayed media to room store"
        );
        desc.source = MediaSource::Remote(handle);
        Ok(desc)
    }

    /// Upload bytes to the cloud media store and return the cloud media id.
    pub async fn relay_to_cloud(
        &self,
        bytes: Vec<u8>,
        session: &LoginSession,
        mime_type: &str,
        category: MediaCategory,
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::EmptyMedia);
        }
        self.check_size(bytes.len())?;

        let upload = MediaUpload {
            file_name: format!("media.{}", extension_for(mime_type)),
            mime_type: mime_type.to_string(),
            category: category.as_str().to_string(),
            bytes,
        };

        let media_id = self
            .cloud
            .upload_media(session, upload)
            .await
            .map_err(upload_failed)?;
        if media_id.trim().is_empty() {
            return Err(Error::MediaUploadFailed(
                "cloud returned an empty media id".to_string(),
            ));
        }

        info!(phone_id = %session.phone_id, media_id = %media_id, "relayed media to cloud");
        Ok(media_id)
    }

    /// Download room-side content, sniff it, and upload it to the cloud.
    pub async fn relay_handle_to_cloud(
        &self,
        handle: &ContentHandle,
        session: &LoginSession,
    ) -> Result<(String, MediaDescriptor)> {
        let bytes = self
            .rooms
            .download(handle)
            .await
            .map_err(|e| fetch_failed(FetchStep::Content, e))?;

        let mut desc = MediaDescriptor::describe(&bytes);
        desc.source = MediaSource::Remote(handle.clone());
        let media_id = self
            .relay_to_cloud(bytes, session, &desc.mime_type, desc.category)
            .await?;
        Ok((media_id, desc))
    }

    /// Post the user-visible notice for a lost attachment.
    ///
    /// The notice is best effort: failing to post it is logged, not returned.
    pub async fn notify_failure(&self, room: &RoomTarget, direction: RelayDirection, err: &Error) {
        let reason = err.to_string();
        error!(room = %room, ?direction, error = %reason, "media relay failed");

        let body = match direction {
            RelayDirection::ToRoom => crate::formatting::inbound_media_failure_notice(&reason),
            RelayDirection::ToCloud => crate::formatting::outbound_media_failure_notice(&reason),
        };
        if let Err(e) = self.rooms.send_notice(room, &body).await {
            error!(room = %room, error = %e, "failed to post media failure notice");
        }
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_file_size {
            return Err(Error::MediaTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}

fn cancelled(step: FetchStep) -> Error {
    Error::MediaFetchFailed {
        step,
        reason: "cancelled".to_string(),
    }
}

fn fetch_failed(step: FetchStep, err: Error) -> Error {
    match err {
        Error::MediaFetchFailed { .. } | Error::MediaTooLarge { .. } => err,
        other => Error::MediaFetchFailed {
            step,
            reason: other.to_string(),
        },
    }
}

fn upload_failed(err: Error) -> Error {
    match err {
        Error::MediaUploadFailed(_) => err,
        other => Error::MediaUploadFailed(other.to_string()),
    }
}
