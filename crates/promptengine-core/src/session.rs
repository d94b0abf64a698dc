//! Session token handling and the login guard
//!
//! The bearer token is the only piece of client state that outlives the
//! process. Every request-issuing component receives a `Session` instead of
//! reading storage itself, and every unauthorized response funnels into
//! `Session::invalidate`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;
use url::Url;

use crate::error::ApiError;

/// Fixed key the token is stored under
pub const TOKEN_KEY: &str = "token";

/// Persistent storage for the session token
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ApiError>;
    fn save(&self, token: &str) -> Result<(), ApiError>;
    fn clear(&self) -> Result<(), ApiError>;
}

/// JSON object on disk, token under `TOKEN_KEY`
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, ApiError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .read_map()?
            .remove(TOKEN_KEY)
            .filter(|t| !t.is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), ApiError> {
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), token.to_string());
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), ApiError> {
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        Ok(self.token.lock().map_err(poisoned)?.clone())
    }

    fn save(&self, token: &str) -> Result<(), ApiError> {
        *self.token.lock().map_err(poisoned)? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        *self.token.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Storage("token store lock poisoned".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    User,
    /// The server answered 401 to an authenticated request
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedOut { reason: LogoutReason },
}

/// Result of the startup guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// A token is available. `cleaned_url` is the callback URL with its
    /// query string removed when the token came from an OAuth redirect.
    Authenticated { cleaned_url: Option<String> },
    RedirectToLogin,
}

struct SessionInner {
    store: Box<dyn TokenStore>,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Shared session context handed to every request-issuing component
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wrap a store, reading any token it already holds
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let token = match store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Could not read stored session token: {}", e);
                None
            }
        };
        let (events, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                token: RwLock::new(token),
                events,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryTokenStore::new())
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn store_token(&self, token: &str) -> Result<(), ApiError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::Validation("Empty session token".to_string()));
        }
        self.inner.store.save(token)?;
        let mut slot = self.inner.token.write().map_err(poisoned)?;
        *slot = Some(token.to_string());
        tracing::info!("Session token stored");
        Ok(())
    }

    pub fn logout(&self) -> bool {
        self.end(LogoutReason::User)
    }

    /// Clear the token after an unauthorized response.
    ///
    /// Only the call that actually removes the token emits `LoggedOut`, so a
    /// burst of concurrent 401s produces a single event.
    pub fn invalidate(&self) -> bool {
        self.end(LogoutReason::Unauthorized)
    }

    fn end(&self, reason: LogoutReason) -> bool {
        let previous = match self.inner.token.write() {
            Ok(mut slot) => slot.take(),
            Err(_) => return false,
        };
        if previous.is_none() {
            return false;
        }

        if let Err(e) = self.inner.store.clear() {
            tracing::warn!("Could not clear stored session token: {}", e);
        }
        tracing::info!(?reason, "Session ended");
        // No receivers is fine (e.g. headless use)
        let _ = self.inner.events.send(SessionEvent::LoggedOut { reason });
        true
    }

    /// Startup check: harvest a token from an OAuth callback URL, else use the
    /// stored one, else send the user to the login screen.
    pub fn guard(&self, callback_url: Option<&str>) -> GuardOutcome {
        if let Some(raw) = callback_url {
            match extract_callback_token(raw) {
                Some((token, cleaned)) => match self.store_token(&token) {
                    Ok(()) => {
                        return GuardOutcome::Authenticated {
                            cleaned_url: Some(cleaned),
                        }
                    }
                    Err(e) => tracing::warn!("Could not persist callback token: {}", e),
                },
                None => tracing::debug!("Callback URL carried no token"),
            }
        }

        if self.is_authenticated() {
            GuardOutcome::Authenticated { cleaned_url: None }
        } else {
            GuardOutcome::RedirectToLogin
        }
    }
}

/// Pull a non-empty `token` query parameter out of a callback URL and return
/// it together with the URL minus its query string.
pub fn extract_callback_token(raw: &str) -> Option<(String, String)> {
    let mut url = Url::parse(raw.trim()).ok()?;
    let token = url
        .query_pairs()
        .find(|(key, _)| key == TOKEN_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())?;

    url.set_query(None);
    Some((token, url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_under_fixed_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let store = FileTokenStore::new(&path);

        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap(), Some("abc".to_string()));

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("token").map(String::as_str), Some("abc"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn session_reads_existing_token() {
        let session = Session::new(MemoryTokenStore::with_token("t1"));
        assert_eq!(session.token(), Some("t1".to_string()));
        assert_eq!(
            session.guard(None),
            GuardOutcome::Authenticated { cleaned_url: None }
        );
    }

    #[test]
    fn guard_without_token_redirects() {
        let session = Session::in_memory();
        assert_eq!(session.guard(None), GuardOutcome::RedirectToLogin);
        assert_eq!(
            session.guard(Some("http://localhost:3000/?code=1")),
            GuardOutcome::RedirectToLogin
        );
    }

    #[test]
    fn guard_harvests_callback_token_and_clears_query() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let session = Session::new(FileTokenStore::new(&path));

        let outcome = session.guard(Some("http://localhost:3000/?token=xyz"));
        assert_eq!(
            outcome,
            GuardOutcome::Authenticated {
                cleaned_url: Some("http://localhost:3000/".to_string())
            }
        );
        assert_eq!(session.token(), Some("xyz".to_string()));

        // Persisted, so a fresh session sees it
        let reopened = Session::new(FileTokenStore::new(&path));
        assert_eq!(reopened.token(), Some("xyz".to_string()));
    }

    #[test]
    fn empty_callback_token_is_ignored() {
        assert_eq!(extract_callback_token("http://h/?token="), None);
        assert_eq!(extract_callback_token("not a url"), None);
    }

    #[test]
    fn invalidate_emits_exactly_once() {
        let session = Session::new(MemoryTokenStore::with_token("t"));
        let mut rx = session.subscribe();

        assert!(session.invalidate());
        assert!(!session.invalidate());
        assert!(!session.logout());

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::Unauthorized
            }
        );
        assert!(rx.try_recv().is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn store_token_rejects_blank() {
        let session = Session::in_memory();
        assert!(session.store_token("   ").is_err());
        assert!(!session.is_authenticated());
    }
}
