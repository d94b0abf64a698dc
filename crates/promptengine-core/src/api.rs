use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::{Mode, ModelId};
use crate::error::ApiError;
use crate::session::Session;
use crate::state::{ChatMessage, Document, HistoryRecord};
use crate::upload::UploadFile;

pub const DEFAULT_DOCUMENT_LIMIT: usize = 100;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub query: String,
    pub model: ModelId,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefineRequest {
    pub current_prompt: String,
    pub instruction: String,
    pub chat_history: Vec<ChatMessage>,
    pub model: ModelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefineResponse {
    pub ai_response: String,
    pub refined_prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub extracted_text_preview: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "GitHub",
            OAuthProvider::Google => "Google",
        }
    }
}

/// Client for the prompt engine HTTP API.
///
/// All requests go through `send`, which attaches the bearer token when the
/// session has one and invalidates the session on a 401.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Join the base URL and a path, adding the leading slash if missing
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn oauth_login_url(&self, provider: OAuthProvider) -> String {
        self.api_url(&format!("/api/auth/login/{}", provider.as_str()))
    }

    /// Exchange credentials for a token and store it in the session
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        tracing::debug!("POST /api/login");
        let response = self
            .client
            .post(self.api_url("/api/login"))
            .json(&Credentials { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Login rejected with status {}", response.status());
            return Err(ApiError::InvalidCredentials);
        }

        let login: LoginResponse = decode(response).await?;
        self.session.store_token(&login.access_token)?;
        tracing::info!("Logged in");
        Ok(())
    }

    /// Create an account. The backend answers 400 when the email is taken.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        tracing::debug!("POST /api/register");
        let response = self
            .client
            .post(self.api_url("/api/register"))
            .json(&Credentials { email, password })
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let message = error_message(response).await;
            return Err(ApiError::Rejected(if message.is_empty() {
                "An account with this email already exists.".to_string()
            } else {
                message
            }));
        }
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let response = self
            .send(self.client.post(self.api_url("/api/generate")).json(request))
            .await?;
        decode(response).await
    }

    pub async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, ApiError> {
        let response = self
            .send(self.client.post(self.api_url("/api/refine")).json(request))
            .await?;
        decode(response).await
    }

    /// Upload a batch of files in a single multipart request (repeated `file` parts)
    pub async fn ingest_files(&self, files: &[UploadFile]) -> Result<IngestResponse, ApiError> {
        if files.is_empty() {
            return Err(ApiError::Validation("No files to upload".to_string()));
        }

        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(file.mime)?;
            form = form.part("file", part);
        }

        let response = self
            .send(self.client.post(self.api_url("/api/ingest/file")).multipart(form))
            .await?;
        let body: IngestResponse = decode(response).await?;
        if body.error {
            return Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        Ok(body)
    }

    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<IngestResponse, ApiError> {
        let response = self
            .send(
                self.client
                    .post(self.api_url("/api/ingest/text"))
                    .form(&[("text", text), ("source", source)]),
            )
            .await?;
        decode(response).await
    }

    pub async fn list_documents(&self, limit: Option<usize>) -> Result<DocumentList, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_DOCUMENT_LIMIT);
        let response = self
            .send(
                self.client
                    .get(self.api_url("/api/documents"))
                    .query(&[("limit", limit)]),
            )
            .await?;
        decode(response).await
    }

    pub async fn history(&self) -> Result<Vec<HistoryRecord>, ApiError> {
        let response = self
            .send(self.client.get(self.api_url("/api/history")))
            .await?;
        // `null` is treated as an empty history
        let records: Option<Vec<HistoryRecord>> = decode(response).await?;
        Ok(records.unwrap_or_default())
    }

    pub async fn history_entry(&self, id: &str) -> Result<HistoryRecord, ApiError> {
        let response = self
            .send(self.client.get(self.api_url(&format!("/api/history/{}", id))))
            .await?;
        decode(response).await
    }

    /// The single place where the authorization header is attached and
    /// unauthorized responses are handled.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.token();
        let request = match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request failed: {}", e);
            ApiError::from(e)
        })?;
        tracing::debug!(status = %response.status(), url = %response.url().path(), "Response");

        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            tracing::warn!("Unauthorized response, ending session");
            self.session.invalidate();
            return Err(ApiError::Unauthorized);
        }

        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response).await;
    tracing::warn!("Request failed with status {}: {}", status, message);
    Err(ApiError::Status { status, message })
}

/// Best-effort message from an error body: `message`, then FastAPI's `detail`, then raw text
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
        for key in ["message", "detail"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    text.chars().take(200).collect::<String>().trim().to_string()
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!("Could not decode response body: {}", e);
        ApiError::Decode(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Session::in_memory())
    }

    #[test]
    fn api_url_adds_missing_slash() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.api_url("/api/generate"), "http://localhost:8000/api/generate");
        assert_eq!(api.api_url("api/history"), "http://localhost:8000/api/history");
    }

    #[test]
    fn oauth_urls() {
        let api = client("http://h");
        assert_eq!(
            api.oauth_login_url(OAuthProvider::GitHub),
            "http://h/api/auth/login/github"
        );
        assert_eq!(
            api.oauth_login_url(OAuthProvider::Google),
            "http://h/api/auth/login/google"
        );
    }

    #[test]
    fn generate_body_matches_wire_shape() {
        let request = GenerateRequest {
            query: "Write a product description for a smartwatch".to_string(),
            model: ModelId::Gemini25Flash,
            mode: Mode::Engineer,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"query":"Write a product description for a smartwatch","model":"gemini-2.5-flash","mode":"engineer"}"#
        );
    }

    #[test]
    fn generate_response_tolerates_missing_lists() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"response":"Draft..."}"#).unwrap();
        assert_eq!(parsed.response, "Draft...");
        assert!(parsed.sources.is_empty());
        assert!(parsed.context.is_empty());
    }
}
