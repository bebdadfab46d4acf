//! HTTP implementation of the [`Transport`] trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use quill_core::ids::SessionId;

use crate::chunk::ChunkDecoder;
use crate::error::{ClientError, ClientResult};
use crate::transport::{
    ChatStream, ChatStreamRequest, ProgressFn, RemoteMessage, RemoteSession, Transport, UploadFile,
};
use crate::upload::{DEFAULT_CHUNK_SIZE, progress_body};

/// JSON shape of a generate-title response.
#[derive(serde::Deserialize)]
struct TitleResponse {
    title: String,
}

/// HTTP client for the chat backend.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the given base URL (no trailing slash needed).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing HTTP connection pool.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }
        Self { base_url, http }
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into an [`ClientError::Api`] carrying the
    /// body text when one was available.
    async fn check(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut message = response.text().await.unwrap_or_default();
        if message.is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned();
        }
        error!(status = status.as_u16(), %message, "api request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Parse a JSON response body through our own error type.
    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let text = response.text().await.map_err(ClientError::Http)?;
        serde_json::from_str(&text).map_err(ClientError::Json)
    }
}

#[async_trait]
impl Transport for ApiClient {
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    async fn stream_chat(&self, request: ChatStreamRequest) -> ClientResult<ChatStream> {
        debug!(query_len = request.query.len(), "opening chat stream");
        let response = self
            .http
            .post(self.url("/chat/stream"))
            .json(&request)
            .send()
            .await
            .map_err(ClientError::Http)?;

        let response = Self::check(response).await?;
        if response.content_length() == Some(0) {
            return Err(ClientError::EmptyBody);
        }
        Ok(decode_stream(response.bytes_stream()))
    }

    #[instrument(skip_all, fields(session_id = %session_id, file = %file.name))]
    async fn upload_document(
        &self,
        user_id: &str,
        session_id: SessionId,
        file: &UploadFile,
        progress: ProgressFn,
    ) -> ClientResult<Value> {
        let total = file.content.len();
        debug!(bytes = total, "uploading document");

        let body = progress_body(file.content.clone(), DEFAULT_CHUNK_SIZE, progress);
        let part = multipart::Part::stream_with_length(body, total as u64)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")
            .map_err(ClientError::Http)?;
        let form = multipart::Form::new()
            .text("user_id", user_id.to_owned())
            .text("session_id", session_id.to_string())
            .part("file", part);

        let response = self
            .http
            .post(self.url("/upload/"))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::Http)?;

        let response = Self::check(response).await?;
        Self::parse_json(response).await
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn generate_title(&self, session_id: SessionId) -> ClientResult<String> {
        let response = self
            .http
            .post(self.url(&format!("/sessions/{session_id}/generate-title")))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let response = Self::check(response).await?;
        let parsed: TitleResponse = Self::parse_json(response).await?;
        Ok(parsed.title)
    }

    async fn create_session(&self, user_id: &str, title: &str) -> ClientResult<RemoteSession> {
        let response = self
            .http
            .post(self.url("/sessions/create"))
            .json(&json!({ "user_id": user_id, "title": title }))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let response = Self::check(response).await?;
        Self::parse_json(response).await
    }

    async fn list_sessions(&self, user_id: &str) -> ClientResult<Vec<RemoteSession>> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/list/{user_id}")))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let response = Self::check(response).await?;
        Self::parse_json(response).await
    }

    async fn fetch_messages(&self, session_id: SessionId) -> ClientResult<Vec<RemoteMessage>> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}/messages")))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let response = Self::check(response).await?;
        Self::parse_json(response).await
    }

    async fn update_title(&self, session_id: SessionId, title: &str) -> ClientResult<()> {
        let response = self
            .http
            .patch(self.url(&format!("/sessions/{session_id}/title")))
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let _ = Self::check(response).await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> ClientResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(ClientError::Http)?;
        let _ = Self::check(response).await?;
        Ok(())
    }
}

/// Decode a response byte stream into text fragments.
///
/// A stream that ends without a single decoded byte surfaces as
/// [`ClientError::EmptyBody`]: a chunked response carries no Content-Length
/// to catch up front, so the required-body check has to happen at
/// end-of-stream too.
fn decode_stream<S>(bytes: S) -> ChatStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = ChunkDecoder::new();
        let mut yielded = false;
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    let text = decoder.decode(&buf);
                    if !text.is_empty() {
                        yielded = true;
                        yield Ok(text);
                    }
                }
                Err(e) => {
                    yield Err(ClientError::Http(e));
                    return;
                }
            }
        }
        if let Some(tail) = decoder.finish() {
            yielded = true;
            yield Ok(tail);
        }
        if !yielded {
            yield Err(ClientError::EmptyBody);
        }
    };
    Box::pin(stream)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_with_no_bytes_at_all_is_empty_body() {
        let mut stream = decode_stream(futures::stream::iter(Vec::<reqwest::Result<Bytes>>::new()));
        assert!(matches!(stream.next().await, Some(Err(ClientError::EmptyBody))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_with_content_never_reports_empty_body() {
        let chunks: Vec<reqwest::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"Hel")), Ok(Bytes::from_static(b"lo"))];
        let mut stream = decode_stream(futures::stream::iter(chunks));

        let mut out = String::new();
        while let Some(fragment) = stream.next().await {
            out.push_str(&fragment.unwrap());
        }
        assert_eq!(out, "Hello");
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/chat/stream"), "http://localhost:8000/chat/stream");
    }

    #[test]
    fn base_url_without_slash_unchanged() {
        let client = ApiClient::new("http://localhost:8000");
        assert_eq!(client.url("/upload/"), "http://localhost:8000/upload/");
    }

    #[test]
    fn chat_request_serializes_required_fields() {
        let request = ChatStreamRequest {
            user_id: "u1".into(),
            session_id: SessionId::new(),
            query: "what is this?".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("user_id").is_some());
        assert!(json.get("session_id").is_some());
        assert_eq!(json["query"], "what is this?");
    }
}
