//! Client flows against an in-process fake of the prompt engine backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

use promptengine_core::gallery::GalleryPoller;
use promptengine_core::session::LogoutReason;
use promptengine_core::upload::{upload_paths, UploadBanner};
use promptengine_core::{
    ApiClient, ApiError, GalleryState, Mode, ModelId, Session, SessionEvent, Workspace,
};

const TOKEN: &str = "tok-123";

#[derive(Default)]
struct Backend {
    /// Answer 401 to every authenticated request
    expired: AtomicBool,
    generate_calls: AtomicUsize,
    document_calls: AtomicUsize,
    last_generate: Mutex<Option<Value>>,
    last_refine: Mutex<Option<Value>>,
    uploaded: Mutex<Vec<String>>,
    notes: Mutex<Vec<HashMap<String, String>>>,
    document_limits: Mutex<Vec<String>>,
}

type Shared = Arc<Backend>;

fn authorized(state: &Backend, headers: &HeaderMap) -> bool {
    if state.expired.load(Ordering::SeqCst) {
        return false;
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({"access_token": TOKEN, "token_type": "bearer"})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid credentials"}))).into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@example.com" {
        (StatusCode::BAD_REQUEST, Json(json!({"detail": "Email already registered"}))).into_response()
    } else {
        Json(json!({"message": "User created"})).into_response()
    }
}

async fn generate(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    *state.last_generate.lock().unwrap() = Some(body);
    Json(json!({
        "response": "Draft...",
        "sources": ["doc1.pdf"],
        "context": ["chunk text"]
    }))
    .into_response()
}

async fn refine(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    *state.last_refine.lock().unwrap() = Some(body.clone());
    if body["instruction"] == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({
        "ai_response": "Made it shorter.",
        "refined_prompt": format!("{} (refined)", body["current_prompt"].as_str().unwrap_or_default())
    }))
    .into_response()
}

async fn ingest_file(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut names = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        assert_eq!(field.name(), Some("file"));
        names.push(field.file_name().unwrap_or_default().to_string());
        let _ = field.bytes().await.unwrap();
    }
    let failed = names.iter().any(|n| n == "blank.png");
    state.uploaded.lock().unwrap().extend(names.clone());
    if failed {
        Json(json!({"message": "Failed to extract text", "error": true})).into_response()
    } else {
        Json(json!({"message": format!("{} file(s) ingested", names.len())})).into_response()
    }
}

async fn ingest_text(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.notes.lock().unwrap().push(form);
    Json(json!({"message": "Text ingested"})).into_response()
}

async fn documents(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Response {
    let n = state.document_calls.fetch_add(1, Ordering::SeqCst);
    state
        .document_limits
        .lock()
        .unwrap()
        .push(params.get("limit").cloned().unwrap_or_default());
    Json(json!({
        "count": 1,
        "documents": [{
            "id": n,
            "metadata": {"source": "guide.pdf", "type": "application/pdf", "page": 1},
            "preview": "Prompting guide..."
        }]
    }))
    .into_response()
}

async fn history() -> Response {
    Json(json!([
        {"id": 1, "user": "A", "ai": "B", "timestamp": "2024-01-01T00:00:00Z"}
    ]))
    .into_response()
}

async fn history_entry(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({"id": id, "user": "A", "ai": "B"})).into_response()
}

/// Test fixture for client flows
struct TestFixture {
    state: Shared,
    base_url: String,
}

impl TestFixture {
    async fn new() -> Self {
        let state: Shared = Arc::new(Backend::default());
        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/register", post(register))
            .route("/api/generate", post(generate))
            .route("/api/refine", post(refine))
            .route("/api/ingest/file", post(ingest_file))
            .route("/api/ingest/text", post(ingest_text))
            .route("/api/documents", get(documents))
            .route("/api/history", get(history))
            .route("/api/history/{id}", get(history_entry))
            .with_state(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestFixture {
            state,
            base_url: format!("http://{}", addr),
        }
    }

    fn client(&self, session: Session) -> ApiClient {
        ApiClient::new(&self.base_url, session)
    }

    fn logged_in(&self) -> ApiClient {
        let session = Session::in_memory();
        session.store_token(TOKEN).unwrap();
        self.client(session)
    }
}

#[tokio::test]
async fn test_login_stores_token() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());

    client.login("me@example.com", "secret").await.unwrap();
    assert_eq!(client.session().token().as_deref(), Some(TOKEN));
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let fixture = TestFixture::new().await;
    let session = Session::in_memory();
    let mut events = session.subscribe();
    let client = fixture.client(session);

    let err = client.login("me@example.com", "nope").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));
    assert_eq!(err.user_message(), "Login failed. Please check your credentials.");
    assert!(!client.session().is_authenticated());
    // A failed login is not a forced logout
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_register_reports_taken_email() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());

    client.register("new@example.com", "pw").await.unwrap();
    let err = client.register("taken@example.com", "pw").await.unwrap_err();
    assert_eq!(err.user_message(), "Email already registered");
}

#[tokio::test]
async fn test_generate_sends_exact_body_with_bearer() {
    let fixture = TestFixture::new().await;
    let client = fixture.logged_in();

    let mut workspace = Workspace::new(ModelId::Gemini25Flash, Mode::Engineer);
    workspace.query = "Write a product description for a smartwatch".to_string();
    let request = workspace.begin_generate().unwrap();
    let result = client.generate(&request).await;
    workspace.finish_generate(result);

    assert_eq!(
        fixture.state.last_generate.lock().unwrap().clone().unwrap(),
        json!({
            "query": "Write a product description for a smartwatch",
            "model": "gemini-2.5-flash",
            "mode": "engineer"
        })
    );
    assert!(workspace.is_active());
    assert_eq!(workspace.result.draft, "Draft...");
    assert_eq!(workspace.result.sources, vec!["doc1.pdf"]);
    assert_eq!(workspace.result.context, vec!["chunk text"]);
}

#[tokio::test]
async fn test_blank_query_never_reaches_server() {
    let fixture = TestFixture::new().await;
    let _client = fixture.logged_in();

    let mut workspace = Workspace::default();
    workspace.query = "   ".to_string();
    assert!(workspace.begin_generate().is_none());
    assert_eq!(fixture.state.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refine_round_trip_and_fallback() {
    let fixture = TestFixture::new().await;
    let client = fixture.logged_in();

    let mut workspace = Workspace::default();
    workspace.query = "smartwatch copy".to_string();
    let request = workspace.begin_generate().unwrap();
    let result = client.generate(&request).await;
    workspace.finish_generate(result);

    let pending = workspace.begin_refine("shorter").unwrap();
    let result = client.refine(&pending.request).await;
    workspace.finish_refine(pending.epoch, result);

    let sent = fixture.state.last_refine.lock().unwrap().clone().unwrap();
    assert_eq!(sent["current_prompt"], "Draft...");
    assert_eq!(sent["instruction"], "shorter");
    assert_eq!(sent["chat_history"], json!([]));
    assert_eq!(sent["model"], "gemini-2.5-flash");
    assert_eq!(workspace.result.draft, "Draft... (refined)");
    assert_eq!(workspace.transcript.len(), 2);

    let pending = workspace.begin_refine("fail").unwrap();
    let result = client.refine(&pending.request).await;
    assert!(result.is_err());
    workspace.finish_refine(pending.epoch, result);
    assert_eq!(workspace.transcript.len(), 4);
    assert_eq!(
        workspace.transcript[3].content,
        promptengine_core::workspace::REFINE_FALLBACK
    );
}

#[tokio::test]
async fn test_unauthorized_logs_out_exactly_once() {
    let fixture = TestFixture::new().await;
    let client = fixture.logged_in();
    let mut events = client.session().subscribe();
    fixture.state.expired.store(true, Ordering::SeqCst);

    let request = promptengine_core::GenerateRequest {
        query: "q".to_string(),
        model: ModelId::default(),
        mode: Mode::default(),
    };
    let (a, b, c) = tokio::join!(
        client.generate(&request),
        client.generate(&request),
        client.history_entry("1"),
    );
    assert!(matches!(a, Err(ApiError::Unauthorized)));
    assert!(matches!(b, Err(ApiError::Unauthorized)));
    assert!(matches!(c, Err(ApiError::Unauthorized)));

    assert!(!client.session().is_authenticated());
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::Unauthorized
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_upload_batches_files_in_one_request() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());
    let dir = TempDir::new().unwrap();

    let pdf = dir.path().join("guide.pdf");
    let png = dir.path().join("scan.png");
    let txt = dir.path().join("notes.txt");
    for path in [&pdf, &png, &txt] {
        std::fs::write(path, b"data").unwrap();
    }

    let banner = upload_paths(&client, vec![pdf, png, txt]).await;
    assert_eq!(
        banner,
        Some(UploadBanner::Success("Successfully uploaded 2 file(s)!".to_string()))
    );
    assert_eq!(
        *fixture.state.uploaded.lock().unwrap(),
        vec!["guide.pdf".to_string(), "scan.png".to_string()]
    );
}

#[tokio::test]
async fn test_upload_error_flag_is_a_failure() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());
    let dir = TempDir::new().unwrap();
    let blank = dir.path().join("blank.png");
    std::fs::write(&blank, b"").unwrap();

    let banner = upload_paths(&client, vec![blank]).await;
    assert_eq!(
        banner,
        Some(UploadBanner::Error("Failed to extract text".to_string()))
    );
}

#[tokio::test]
async fn test_missing_file_gives_error_banner() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());

    let banner = upload_paths(&client, vec![PathBuf::from("/definitely/not/here.pdf")]).await;
    assert_eq!(banner, Some(UploadBanner::Error("Error uploading file.".to_string())));
    assert!(fixture.state.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_and_entry() {
    let fixture = TestFixture::new().await;
    let client = fixture.logged_in();

    let records = client.history().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user, "A");
    assert_eq!(records[0].timestamp, "2024-01-01T00:00:00Z");

    let entry = client.history_entry("1").await.unwrap();
    assert_eq!(entry.ai, "B");
}

#[tokio::test]
async fn test_poller_polls_until_dropped() {
    let fixture = TestFixture::new().await;
    let client = fixture.client(Session::in_memory());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut state = GalleryState::default();
    let generation = state.restart();
    let poller = GalleryPoller::spawn(client, Duration::from_millis(50), generation, tx);
    for _ in 0..3 {
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.generation, generation);
        state.apply(update);
    }
    assert_eq!(state.documents.len(), 1);
    assert_eq!(state.total, Some(1));
    assert_eq!(state.documents[0].metadata.source, "guide.pdf");
    assert!(fixture
        .state
        .document_limits
        .lock()
        .unwrap()
        .iter()
        .all(|limit| limit == "100"));

    poller.stop();
    // Every sender goes away once in-flight polls finish
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_ingest_text_sends_form_fields() {
    let fixture = TestFixture::new().await;
    let client = fixture.logged_in();

    let response = client
        .ingest_text("Always state the audience.", "terminal-note")
        .await
        .unwrap();
    assert_eq!(response.message.as_deref(), Some("Text ingested"));

    let notes = fixture.state.notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].get("text").map(String::as_str), Some("Always state the audience."));
    assert_eq!(notes[0].get("source").map(String::as_str), Some("terminal-note"));
}
