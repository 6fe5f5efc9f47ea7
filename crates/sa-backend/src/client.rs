//! HTTP client for the chat backend.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use sa_protocol::{
    ChatRequest, ChatResponse, DocumentInfo, DocumentListResponse, ErrorBody, MessageInfo,
    SessionInfo, SessionListResponse, SessionMessagesResponse, StatusMessage, StreamOutcome,
    StreamSink,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::consumer::consume_stream;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status}{}", detail_suffix(.detail))]
    Api { status: u16, detail: String },
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

/// Client for the chat, session and document endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: Url,
    http: Client,
}

/// Build an HTTP client for long-lived streaming bodies.
///
/// Only the connect phase is bounded; a streamed answer may take arbitrarily long.
fn build_http_client(connect_timeout: Duration) -> Result<Client, ClientError> {
    let client = Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(2)
        .build()?;
    Ok(client)
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_connect_timeout(base_url, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(
        base_url: &str,
        connect_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http: build_http_client(connect_timeout)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Open `POST /chat/stream` and return the response body as a byte stream.
    pub async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, ClientError> {
        let url = self.endpoint(&["chat", "stream"])?;
        debug!(%url, session_id = %request.session_id, "opening chat stream");

        let response = self.http.post(url).json(request).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes_stream())
    }

    /// Send a message and stream the answer into `sink`.
    ///
    /// Never returns an error: failing to open the stream yields
    /// [`StreamOutcome::Failed`], and cancellation while connecting yields
    /// [`StreamOutcome::Cancelled`].
    pub async fn stream_chat<K: StreamSink + ?Sized>(
        &self,
        request: &ChatRequest,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            opened = self.open_stream(request) => opened,
        };

        match opened {
            Ok(body) => consume_stream(body, sink, cancel).await,
            Err(e) => {
                warn!(error = %e, "chat stream request failed");
                StreamOutcome::Failed(e.to_string())
            }
        }
    }

    /// Send a message to `POST /chat` and return the whole answer.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ClientError> {
        let url = self.endpoint(&["chat"])?;
        let response = self.http.post(url).json(request).send().await?;
        let resp: ChatResponse = read_json(response).await?;
        Ok(resp.response)
    }

    /// Sessions of a user, most recently updated first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionInfo>, ClientError> {
        let url = self.endpoint(&["sessions", user_id])?;
        let response = self.http.get(url).send().await?;
        let list: SessionListResponse = read_json(response).await?;
        Ok(list.sessions)
    }

    pub async fn session_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<MessageInfo>, ClientError> {
        let url = self.endpoint(&["sessions", user_id, session_id])?;
        let response = self.http.get(url).send().await?;
        let resp: SessionMessagesResponse = read_json(response).await?;
        Ok(resp.messages)
    }

    pub async fn delete_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<StatusMessage, ClientError> {
        let url = self.endpoint(&["sessions", user_id, session_id])?;
        let response = self.http.delete(url).send().await?;
        read_status(response).await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>, ClientError> {
        let url = self.endpoint(&["documents"])?;
        let response = self.http.get(url).send().await?;
        let list: DocumentListResponse = read_json(response).await?;
        Ok(list.documents)
    }

    /// Upload a file to the knowledge base as multipart field `file`.
    pub async fn upload_document(&self, path: &Path) -> Result<StatusMessage, ClientError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?;
        let contents = tokio::fs::read(path).await?;
        debug!(%filename, bytes = contents.len(), "uploading document");

        let form = Form::new().part("file", Part::bytes(contents).file_name(filename));
        let url = self.endpoint(&["documents", "upload"])?;
        let response = self.http.post(url).multipart(form).send().await?;
        read_status(response).await
    }

    pub async fn delete_document(&self, filename: &str) -> Result<StatusMessage, ClientError> {
        let url = self.endpoint(&["documents", filename])?;
        let response = self.http.delete(url).send().await?;
        read_status(response).await
    }
}

/// Pass 2xx responses through; turn anything else into [`ClientError::Api`].
///
/// The detail is the JSON `detail` field when the body is JSON and has one,
/// otherwise the body text as is.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let body = response.text().await.unwrap_or_default();
    let detail = if is_json {
        serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.detail)
            .unwrap_or(body)
    } else {
        body
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        detail: detail.trim().to_string(),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Like [`read_json`] for status replies, tolerating an empty or non-JSON body.
async fn read_status(response: Response) -> Result<StatusMessage, ClientError> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_segments() {
        let client = ChatClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["chat", "stream"]).unwrap().as_str(),
            "http://localhost:8000/chat/stream"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = ChatClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(
            client.endpoint(&["sessions", "user_1"]).unwrap().as_str(),
            "http://localhost:8000/api/sessions/user_1"
        );
    }

    #[test]
    fn endpoint_encodes_filenames() {
        let client = ChatClient::new("http://localhost:8000").unwrap();
        let url = client.endpoint(&["documents", "年报 2024/v2.pdf"]).unwrap();
        assert_eq!(
            url.path(),
            "/documents/%E5%B9%B4%E6%8A%A5%202024%2Fv2.pdf"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ChatClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            ChatClient::new("mailto:someone@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn api_error_display() {
        let bare = ClientError::Api {
            status: 500,
            detail: String::new(),
        };
        assert_eq!(bare.to_string(), "HTTP 500");

        let detailed = ClientError::Api {
            status: 429,
            detail: "rate limited".to_string(),
        };
        assert_eq!(detailed.to_string(), "HTTP 429: rate limited");
    }
}
