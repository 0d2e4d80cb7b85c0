//! Typed HTTP client for the paper API.
//!
//! Every call reads the bearer token from a [`TokenStore`] and attaches it.
//! A 401 clears the stored token and notifies the [`SessionListener`] the
//! caller registered, then surfaces as [`ClientError::SessionExpired`].

pub mod tokens;

use std::sync::Arc;

use qpaper_shared::types::{
    DownloadPaperResponse, EvaluatePaperRequest, Paper, PaperQuery, SubmitPaperResponse,
    UpdateUserRequest, User,
};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use tokens::{FileTokenStore, MemoryTokenStore, TokenStore};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token store failed: {0}")]
    Tokens(#[from] std::io::Error),
    #[error("session expired")]
    SessionExpired,
    #[error("invalid base URL: {0}")]
    BaseUrl(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Told when the API rejects the stored token.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

impl<F> SessionListener for F
where
    F: Fn() + Send + Sync,
{
    fn session_expired(&self) {
        self()
    }
}

pub struct PaperClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl PaperClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            tokens,
            listener: None,
        }
    }

    pub fn on_session_expired(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Each segment is percent-encoded, so ids containing `/` or `?` stay one segment.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::BaseUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::BaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.http.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let builder = match self.tokens.load()? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("API rejected the session token; clearing it");
            if let Err(e) = self.tokens.clear() {
                tracing::error!("Could not clear the stored token: {}", e);
            }
            if let Some(listener) = &self.listener {
                listener.session_expired();
            }
            return Err(ClientError::SessionExpired);
        }

        if !status.is_success() {
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(if status == StatusCode::NOT_FOUND {
                ClientError::NotFound(message)
            } else {
                ClientError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(resp.json().await?)
    }

    /// Payload is merged over the server's user defaults.
    pub async fn create_user<T: Serialize + ?Sized>(&self, user: &T) -> Result<User, ClientError> {
        self.send(self.request(Method::POST, &["users"])?.json(user)).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ClientError> {
        self.send(self.request(Method::GET, &["users", user_id])?).await
    }

    pub async fn list_users(&self, role: Option<&str>) -> Result<Vec<User>, ClientError> {
        let mut builder = self.request(Method::GET, &["users"])?;
        if let Some(role) = role {
            builder = builder.query(&[("role", role)]);
        }
        self.send(builder).await
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        patch: &UpdateUserRequest,
    ) -> Result<User, ClientError> {
        self.send(
            self.request(Method::PATCH, &["users", user_id])?
                .json(patch),
        )
        .await
    }

    pub async fn submit_paper<T: Serialize + ?Sized>(
        &self,
        paper_data: &T,
        file_key: &str,
    ) -> Result<SubmitPaperResponse, ClientError> {
        let body = serde_json::json!({
            "paperData": paper_data,
            "fileKey": file_key,
        });
        self.send(self.request(Method::POST, &["papers"])?.json(&body))
            .await
    }

    pub async fn evaluate_paper(
        &self,
        paper_id: &str,
        evaluation: &EvaluatePaperRequest,
    ) -> Result<Paper, ClientError> {
        self.send(
            self.request(Method::PUT, &["papers", paper_id])?
                .json(evaluation),
        )
        .await
    }

    /// Presigned download URL for the paper's file.
    pub async fn download_paper(&self, paper_id: &str) -> Result<String, ClientError> {
        let resp: DownloadPaperResponse = self
            .send(self.request(Method::GET, &["papers", paper_id])?)
            .await?;
        Ok(resp.download_url)
    }

    pub async fn list_papers(&self, query: &PaperQuery) -> Result<Vec<Paper>, ClientError> {
        let mut params = vec![];
        if let Some(status) = &query.status {
            params.push(("status", status.as_str()));
        }
        if let Some(submitted_by) = &query.submitted_by {
            params.push(("submittedBy", submitted_by.as_str()));
        }
        if let Some(requested_by) = &query.requested_by {
            params.push(("requestedBy", requested_by.as_str()));
        }
        self.send(self.request(Method::GET, &["papers"])?.query(&params))
            .await
    }

    /// PUT the file to a presigned upload URL. The bearer token is not sent;
    /// the URL carries its own signature.
    pub async fn upload_file(&self, upload_url: &str, bytes: Vec<u8>) -> Result<(), ClientError> {
        let resp = self.http.put(upload_url).body(bytes).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one connection per canned response, returning the raw requests.
    async fn serve(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status_line, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let raw = read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                seen.push(raw);
            }
            seen
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn paper_json(id: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "subject": "Math",
            "submittedBy": null,
            "requestedBy": null,
            "fileKey": format!("{id}.pdf"),
            "status": status,
            "submittedDate": "2026-10-18T09:00:00Z",
            "examDate": null
        })
    }

    #[tokio::test]
    async fn token_is_read_fresh_for_every_call() {
        let user = serde_json::json!({
            "id": "u1", "email": "e", "role": "admin", "name": "A",
            "createdAt": "2026-10-18T09:00:00Z", "isVerified": true
        })
        .to_string();
        let (base, server) = serve(vec![("200 OK", user.clone()), ("200 OK", user)]).await;

        let tokens = Arc::new(MemoryTokenStore::new(Some("first")));
        let client = PaperClient::new(base, tokens.clone());

        let fetched = client.get_user("u1").await.unwrap();
        assert_eq!(fetched.id, "u1");

        tokens.set("second");
        client.get_user("u1").await.unwrap();

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /users/u1 "));
        assert!(seen[0].to_lowercase().contains("authorization: bearer first"));
        assert!(seen[1].to_lowercase().contains("authorization: bearer second"));
    }

    #[tokio::test]
    async fn unauthorized_clears_token_and_notifies() {
        let (base, server) = serve(vec![("401 Unauthorized", r#"{"error":"expired"}"#.to_string())]).await;

        let tokens = Arc::new(MemoryTokenStore::new(Some("stale")));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let client = PaperClient::new(base, tokens.clone()).on_session_expired(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let err = client.download_paper("p1").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.load().unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_paper_maps_to_not_found() {
        let (base, server) = serve(vec![("404 Not Found", r#"{"error":"Paper not found"}"#.to_string())]).await;
        let client = PaperClient::new(base, Arc::new(MemoryTokenStore::default()));

        let err = client.download_paper("ghost").await.unwrap_err();
        match err {
            ClientError::NotFound(message) => assert_eq!(message, "Paper not found"),
            other => panic!("unexpected error: {other:?}"),
        }

        let seen = server.await.unwrap();
        assert!(!seen[0].to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn submit_sends_envelope_and_reads_upload_url() {
        let body = serde_json::json!({
            "paper": paper_json("p1", "pending"),
            "uploadUrl": "https://bucket.s3.amazonaws.com/p1.pdf?X-Amz-Signature=abc"
        })
        .to_string();
        let (base, server) = serve(vec![("200 OK", body)]).await;
        let client = PaperClient::new(base, Arc::new(MemoryTokenStore::new(Some("t"))));

        let submitted = client
            .submit_paper(&serde_json::json!({"id": "p1", "subject": "Math"}), "p1.pdf")
            .await
            .unwrap();
        assert_eq!(submitted.paper.status, qpaper_shared::types::PaperStatus::Pending);
        assert!(submitted.upload_url.contains("p1.pdf"));

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("POST /papers "));
        assert!(seen[0].contains(r#""fileKey":"p1.pdf""#));
        assert!(seen[0].contains(r#""paperData":{"#));
    }

    #[tokio::test]
    async fn server_failure_surfaces_generic_message() {
        let (base, server) = serve(vec![("500 Internal Server Error", r#"{"error":"Internal server error"}"#.to_string())]).await;
        let client = PaperClient::new(base, Arc::new(MemoryTokenStore::default()));

        let err = client
            .evaluate_paper(
                "p1",
                &EvaluatePaperRequest {
                    rating: 8.0,
                    feedback: "ok".into(),
                    status: qpaper_shared::types::PaperStatus::Evaluated,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, ref message } if message == "Internal server error"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn list_papers_passes_filters_as_query() {
        let body = serde_json::json!([paper_json("a", "pending")]).to_string();
        let (base, server) = serve(vec![("200 OK", body)]).await;
        let client = PaperClient::new(base, Arc::new(MemoryTokenStore::default()));

        let query = PaperQuery {
            status: Some("pending".into()),
            requested_by: Some("boss".into()),
            ..Default::default()
        };
        let papers = client.list_papers(&query).await.unwrap();
        assert_eq!(papers.len(), 1);

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /papers?status=pending&requestedBy=boss "));
    }

    /// Token store whose file can no longer be removed.
    struct StuckTokenStore;

    impl TokenStore for StuckTokenStore {
        fn load(&self) -> std::io::Result<Option<String>> {
            Ok(Some("stale".into()))
        }

        fn clear(&self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[tokio::test]
    async fn listener_hears_expiry_even_when_token_cannot_be_cleared() {
        let (base, server) = serve(vec![("401 Unauthorized", r#"{"error":"expired"}"#.to_string())]).await;

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let client = PaperClient::new(base, Arc::new(StuckTokenStore)).on_session_expired(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let err = client.get_user("u1").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn ids_are_percent_encoded_as_one_segment() {
        let body = serde_json::json!({"downloadUrl": "memory://bucket/x.pdf"}).to_string();
        let (base, server) = serve(vec![("200 OK", body)]).await;
        let client = PaperClient::new(format!("{base}/"), Arc::new(MemoryTokenStore::default()));

        let url = client.download_paper("term 1/p?2").await.unwrap();
        assert_eq!(url, "memory://bucket/x.pdf");

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /papers/term%201%2Fp%3F2 "), "{}", seen[0]);
    }
}
