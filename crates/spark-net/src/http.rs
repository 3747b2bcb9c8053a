//! `reqwest` implementation of the REST seams.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | method | path                  | seam                          |
//! |--------|-----------------------|-------------------------------|
//! | POST   | `messages`            | [`ChatApi::send_message`]     |
//! | GET    | `messages/{user}`     | [`ChatApi::fetch_messages`]   |
//! | GET    | `conversations`       | [`ChatApi::fetch_conversations`] |
//! | PUT    | `messages/read`       | [`ChatApi::mark_read`]        |
//! | GET    | `users/{user}`        | [`UserLookup::resolve`]       |
//! | POST   | `upload`              | [`UploadClient::upload`]      |
//!
//! Every response body is the `{success, data | error}` envelope.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use spark_shared::constants::UPLOAD_CHUNK_SIZE;
use spark_shared::protocol::{ApiResponse, ConversationRecord, OutgoingMessage, ReadReceiptRequest};
use spark_shared::{
    ApiError, FileAttachment, Message, MessageId, OutgoingFile, UploadError, UploadProgress, UserId,
    UserProfile,
};

use crate::api::{ChatApi, ProgressFn, UploadClient, UserLookup};

/// Header carrying the original file name on uploads.
const FILE_NAME_HEADER: &str = "x-file-name";

/// Longest slice of a non-JSON error body kept in an error reason.
const MAX_REASON_LEN: usize = 200;

#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        decode_envelope(status, &body)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.fetch_envelope(request).await?.into_result()
    }
}

/// Decode an envelope, folding non-2xx statuses into [`ApiError::Status`].
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<ApiResponse<T>, ApiError> {
    let ok_status = (200..300).contains(&status);
    match serde_json::from_slice::<ApiResponse<T>>(body) {
        Ok(envelope) if ok_status || envelope.success => Ok(envelope),
        Ok(envelope) => Err(ApiError::Status {
            status,
            reason: envelope
                .error
                .unwrap_or_else(|| "request failed".to_string()),
        }),
        Err(_) if !ok_status => {
            let text = String::from_utf8_lossy(body);
            let reason: String = text.chars().take(MAX_REASON_LEN).collect();
            Err(ApiError::Status { status, reason })
        }
        Err(e) => Err(ApiError::Decode(e.to_string())),
    }
}

/// Split `bytes` into upload chunks, reporting progress as each chunk is
/// handed to the HTTP body.
fn progress_chunks(
    bytes: Bytes,
    progress: ProgressFn,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    let total = bytes.len() as u64;
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(bytes.len())))
        .collect();
    let mut sent = 0u64;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(UploadProgress { sent, total });
        Ok(chunk)
    }))
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, ApiError> {
        debug!(token = %message.client_token, kind = %message.kind, "POST messages");
        self.execute(self.client.post(self.url("messages")).json(message))
            .await
    }

    async fn fetch_messages(&self, counterparty: &UserId) -> Result<Vec<Message>, ApiError> {
        self.execute(self.client.get(self.url(&format!("messages/{counterparty}"))))
            .await
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError> {
        self.execute(self.client.get(self.url("conversations")))
            .await
    }

    async fn mark_read(&self, counterparty: &UserId, ids: &[MessageId]) -> Result<(), ApiError> {
        let body = ReadReceiptRequest {
            counterparty: counterparty.clone(),
            message_ids: ids.to_vec(),
        };
        self.fetch_envelope::<serde_json::Value>(self.client.put(self.url("messages/read")).json(&body))
            .await?
            .into_ack()
    }
}

#[async_trait]
impl UserLookup for HttpApi {
    async fn resolve(&self, id: &UserId) -> Result<UserProfile, ApiError> {
        self.execute(self.client.get(self.url(&format!("users/{id}"))))
            .await
    }
}

#[async_trait]
impl UploadClient for HttpApi {
    async fn upload(
        &self,
        file: OutgoingFile,
        progress: ProgressFn,
    ) -> Result<FileAttachment, UploadError> {
        let size = file.size();
        debug!(name = %file.file_name, size, mime = %file.mime_type, "Uploading attachment");

        let body = reqwest::Body::wrap_stream(progress_chunks(file.bytes, progress));
        let request = self
            .client
            .post(self.url("upload"))
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .header(CONTENT_LENGTH, size)
            .header(FILE_NAME_HEADER, file.file_name.as_str())
            .body(body);

        self.execute(request).await.map_err(|e| {
            warn!(error = %e, "Attachment upload failed");
            UploadError::Failed(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_url_joining() {
        let api = HttpApi::new("https://api.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.base_url(), "https://api.example.com/v1");
        assert_eq!(api.url("/messages"), "https://api.example.com/v1/messages");
        assert_eq!(api.url("users/abc"), "https://api.example.com/v1/users/abc");
    }

    #[test]
    fn test_decode_envelope_success() {
        let env: ApiResponse<u32> = decode_envelope(200, br#"{"success":true,"data":3}"#).unwrap();
        assert_eq!(env.into_result(), Ok(3));
    }

    #[test]
    fn test_decode_envelope_error_status() {
        let err = decode_envelope::<u32>(403, br#"{"success":false,"error":"blocked user"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 403,
                reason: "blocked user".into()
            }
        );

        let err = decode_envelope::<u32>(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 502, .. }));
    }

    #[test]
    fn test_decode_envelope_garbage_on_success_status() {
        let err = decode_envelope::<u32>(200, b"not json").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_progress_chunks_reports_every_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

        let bytes = Bytes::from(vec![0u8; UPLOAD_CHUNK_SIZE * 2 + 10]);
        let chunks: Vec<_> = progress_chunks(bytes, progress).collect().await;
        assert_eq!(chunks.len(), 3);

        let seen = seen.lock().unwrap();
        let total = (UPLOAD_CHUNK_SIZE * 2 + 10) as u64;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].sent, UPLOAD_CHUNK_SIZE as u64);
        assert_eq!(seen[2], UploadProgress { sent: total, total });
    }
}
