//! WhatsApp Cloud API adapter (Graph API over HTTPS).
//!
//! Implements the core `CloudApi` port: media metadata lookup, media download,
//! media upload, and message send.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use wacb_core::{
    config::{Config, DEFAULT_MAX_FILE_SIZE},
    domain::LoginSession,
    errors::Error,
    ports::{CloudApi, MediaUpload, MediaUrl, OutboundPayload},
    Result,
};

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone, Debug)]
pub struct GraphApiClient {
    base_url: String,
    version: String,
    max_download_size: usize,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MediaUrlResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl GraphApiClient {
    pub fn new(
        base_url: impl Into<String>,
        version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: version.into(),
            max_download_size: DEFAULT_MAX_FILE_SIZE,
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.cloud_api_url.clone(),
            config.cloud_api_version.clone(),
            config.http_timeout,
        )?
        .with_max_download_size(config.max_file_size))
    }

    /// Largest media body `download_media` will read.
    pub fn with_max_download_size(mut self, max: usize) -> Self {
        self.max_download_size = max;
        self
    }

    fn phone_url(&self, phone_id: &str, endpoint: &str) -> String {
        format!("{}/{}/{phone_id}/{endpoint}", self.base_url, self.version)
    }
}

/// Turn a non-2xx response into an error message with a truncated body.
async fn status_error(what: &str, resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!(
        "{what} failed: {status} {}",
        body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
    )
}

#[async_trait]
impl CloudApi for GraphApiClient {
    async fn media_url(&self, session: &LoginSession, media_id: &str) -> Result<MediaUrl> {
        let url = format!("{}/{media_id}", self.base_url);
        debug!(media_id, "resolving cloud media url");

        let resp = self
            .http
            .get(&url)
            .query(&[("access_token", session.access_token.as_str())])
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| Error::External(format!("media lookup request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(status_error("media lookup", resp).await));
        }

        let parsed: MediaUrlResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("media lookup json error: {e}")))?;

        if let Some(err) = parsed.error.filter(|e| !e.is_null()) {
            return Err(Error::External(format!("media lookup returned error: {err}")));
        }
        let Some(url) = parsed.url.filter(|u| !u.is_empty()) else {
            return Err(Error::External("media lookup returned no url".to_string()));
        };

        Ok(MediaUrl {
            url,
            mime_type: parsed.mime_type,
            sha256: parsed.sha256,
            file_size: parsed.file_size,
        })
    }

    async fn download_media(&self, session: &LoginSession, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| Error::External(format!("media download request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(status_error("media download", resp).await));
        }

        let max = self.max_download_size;
        if let Some(size) = resp.content_length() {
            let size = usize::try_from(size).unwrap_or(usize::MAX);
            if size > max {
                return Err(Error::MediaTooLarge { size, max });
            }
        }

        let mut resp = resp;
        let mut bytes = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::External(format!("media download read error: {e}")))?
        {
            if bytes.len() + chunk.len() > max {
                return Err(Error::MediaTooLarge {
                    size: bytes.len() + chunk.len(),
                    max,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn upload_media(&self, session: &LoginSession, upload: MediaUpload) -> Result<String> {
        let size = upload.bytes.len();
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| Error::MediaUploadFailed(format!("multipart error: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", upload.category.clone())
            .part("file", part);

        debug!(
            phone_id = %session.phone_id,
            file_name = %upload.file_name,
            mime = %upload.mime_type,
            size,
            "uploading media to cloud"
        );

        let resp = self
            .http
            .post(self.phone_url(&session.phone_id, "media"))
            .bearer_auth(&session.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::MediaUploadFailed(format!("request error: {e}")))?;

        if !resp.status().is_success() {
            let msg = status_error("media upload", resp).await;
            error!(phone_id = %session.phone_id, error = %msg, "cloud media upload failed");
            return Err(Error::MediaUploadFailed(msg));
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| Error::MediaUploadFailed(format!("json error: {e}")))?;
        if parsed.id.is_empty() {
            return Err(Error::MediaUploadFailed(
                "upload response carried no media id".to_string(),
            ));
        }
        Ok(parsed.id)
    }

    async fn send_message(
        &self,
        session: &LoginSession,
        payload: &OutboundPayload,
    ) -> Result<String> {
        debug!(
            phone_id = %session.phone_id,
            to = %payload.to,
            kind = payload.kind,
            "sending cloud message"
        );

        let resp = self
            .http
            .post(self.phone_url(&session.phone_id, "messages"))
            .bearer_auth(&session.access_token)
            .json(&payload.body)
            .send()
            .await
            .map_err(|e| Error::External(format!("send request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(status_error("send message", resp).await));
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("send json error: {e}")))?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::External("send response carried no message id".to_string()))
    }
}
