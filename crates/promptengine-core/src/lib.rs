pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gallery;
pub mod history;
pub mod session;
pub mod state;
pub mod upload;
pub mod voice;
pub mod workspace;

// Re-export main types for convenience
pub use api::{ApiClient, GenerateRequest, GenerateResponse, OAuthProvider, RefineRequest, RefineResponse};
pub use catalog::{Mode, ModelId};
pub use config::Config;
pub use error::ApiError;
pub use gallery::{GalleryPoller, GalleryState, GalleryUpdate};
pub use history::HistoryView;
pub use session::{FileTokenStore, GuardOutcome, MemoryTokenStore, Session, SessionEvent};
pub use state::{ChatMessage, ChatRole, Document, GenerationResult, HistoryRecord};
pub use upload::UploadBanner;
pub use voice::{VoiceEvent, VoiceInput};
pub use workspace::{PendingRefine, Phase, Workspace};
